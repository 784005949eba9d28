// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Top-level egui application shell hosting the workflow's nodes.
//! Handles layout, the node frames, and wiring to the background workers.

pub mod components;

use std::rc::Rc;

use eframe::egui;

use crate::config::StackerConfig;
use crate::logic::candidates::CandidateCatalog;
use crate::models::workflow::{ensure_extension, suggested_workflow_name};
use crate::mvu::{self, AppModel, Command, Msg, WorkflowNode};
use crate::ui::components::{concat, stacker};

/// Stateful egui application for editing LoRA stack workflows.
pub struct LoraStackApp {
    model: AppModel,
    inbox: Vec<Msg>,
    cmd_tx: crossbeam_channel::Sender<Command>,
    msg_rx: crossbeam_channel::Receiver<Msg>,
}

impl LoraStackApp {
    /// Start the worker threads and queue the one-off LoRA name fetch.
    pub fn new(config: &StackerConfig) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<Command>();
        let (msg_tx, msg_rx) = crossbeam_channel::unbounded::<Msg>();

        let threads = std::thread::available_parallelism()
            .map(|n| n.get().clamp(2, 4))
            .unwrap_or(2);
        for _ in 0..threads {
            let cmd_rx = cmd_rx.clone();
            let msg_tx = msg_tx.clone();
            std::thread::spawn(move || {
                for cmd in cmd_rx.iter() {
                    let msg = mvu::run_command(cmd);
                    let _ = msg_tx.send(msg);
                }
            });
        }

        let mut model = AppModel::new(
            Rc::new(config.backup_cache()),
            Rc::new(CandidateCatalog::new()),
        );
        if cmd_tx
            .send(Command::FetchCandidates(config.candidate_source()))
            .is_ok()
        {
            model.pending_commands += 1;
        }
        model.status = Some(format!("Scanning {}", config.lora_dir.display()));

        Self {
            model,
            inbox: Vec::new(),
            cmd_tx,
            msg_rx,
        }
    }
}

impl eframe::App for LoraStackApp {
    /// Drains worker results, applies queued messages, then renders the top bar,
    /// error modal, status bar and node list. Views append new messages to the
    /// inbox for the next frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_spacing(ctx);

        // Pull messages produced by the command workers.
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.model.pending_commands = self.model.pending_commands.saturating_sub(1);
            self.inbox.push(msg);
        }

        for msg in std::mem::take(&mut self.inbox) {
            let mut commands = Vec::new();
            mvu::update(&mut self.model, msg, &mut commands);
            for cmd in commands {
                if self.cmd_tx.send(cmd).is_ok() {
                    self.model.pending_commands += 1;
                }
            }
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                self.render_add_buttons(ui);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.add_space(2.0);
                    egui::widgets::global_theme_preference_switch(ui);
                    ui.separator();
                    self.render_save_button(ui);
                    self.render_open_button(ui);
                });
            });
            ui.add_space(4.0);
        });

        self.render_error_modal(ctx);

        egui::TopBottomPanel::bottom("status_panel")
            .resizable(false)
            .show(ctx, |ui| {
                self.render_status(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(8.0);
            egui::ScrollArea::vertical().show(ui, |ui| {
                if self.model.nodes.is_empty() {
                    ui.label(
                        egui::RichText::new("Add a node or open a workflow to get started.")
                            .color(egui::Color32::from_gray(110)),
                    );
                }
                self.render_nodes(ui);
            });
        });
    }

    /// Required by eframe 0.34; all rendering happens in `update`, which
    /// eframe still invokes before this method each frame.
    fn ui(&mut self, _ui: &mut egui::Ui, _frame: &mut eframe::Frame) {}
}

impl LoraStackApp {
    fn ensure_spacing(&self, ctx: &egui::Context) {
        ctx.style_mut(|style| {
            style.spacing.item_spacing = egui::vec2(6.0, 4.0);
        });
    }

    fn render_add_buttons(&mut self, ui: &mut egui::Ui) {
        if ui
            .button(format!("{} Add LoRA Stacker", egui_phosphor::regular::STACK))
            .clicked()
        {
            self.inbox.push(Msg::AddStacker);
        }
        if ui
            .button(format!(
                "{} Add Text Concatenator",
                egui_phosphor::regular::TEXT_AA
            ))
            .clicked()
        {
            self.inbox.push(Msg::AddConcat);
        }
    }

    fn render_open_button(&mut self, ui: &mut egui::Ui) {
        if ui
            .button(format!("{} Open workflow", egui_phosphor::regular::FOLDER_OPEN))
            .clicked()
        {
            let dialog = rfd::FileDialog::new()
                .set_title("Open workflow")
                .add_filter("Workflow", &["json"]);
            match dialog.pick_file() {
                Some(path) => self.inbox.push(Msg::OpenRequested(path)),
                None => self.inbox.push(Msg::OpenCancelled),
            }
        }
    }

    /// Save dialog suggesting the current file name, or a default one.
    fn render_save_button(&mut self, ui: &mut egui::Ui) {
        let button = egui::Button::new(format!(
            "{} Save workflow",
            egui_phosphor::regular::FLOPPY_DISK
        ));
        if ui
            .add_enabled(!self.model.nodes.is_empty(), button)
            .on_disabled_hover_text("Add at least one node first")
            .clicked()
        {
            let default_name = self
                .model
                .workflow_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| suggested_workflow_name("lora stack"));
            let dialog = rfd::FileDialog::new()
                .set_title("Save workflow")
                .add_filter("Workflow", &["json"])
                .set_file_name(&default_name);

            if let Some(path) = dialog.save_file() {
                self.inbox
                    .push(Msg::SaveRequested(ensure_extension(path, "json")));
            } else {
                self.inbox.push(Msg::SaveCancelled);
            }
        }
    }

    /// One framed block per node with its header and body.
    fn render_nodes(&mut self, ui: &mut egui::Ui) {
        let mut msgs = Vec::new();
        for node in &self.model.nodes {
            let id = node.id();
            egui::Frame::group(ui.style()).show(ui, |ui| {
                if let WorkflowNode::Stacker(stacker) = node {
                    ui.set_min_width(stacker.size()[0]);
                }
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(format!("#{id} {}", node.title())).strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .button(egui_phosphor::regular::X)
                            .on_hover_text("Remove node")
                            .clicked()
                        {
                            msgs.push(Msg::RemoveNode(id));
                        }
                    });
                });
                ui.separator();
                match node {
                    WorkflowNode::Stacker(stacker) => msgs.extend(
                        stacker::view(ui, stacker)
                            .into_iter()
                            .map(|msg| Msg::Stacker { node: id, msg }),
                    ),
                    WorkflowNode::Concat(concat) => msgs.extend(
                        concat::view(ui, concat)
                            .into_iter()
                            .map(|msg| Msg::Concat { node: id, msg }),
                    ),
                }
            });
            ui.add_space(8.0);
        }
        self.inbox.extend(msgs);
    }

    /// Render a simple modal window for error messages.
    fn render_error_modal(&mut self, ctx: &egui::Context) {
        if let Some(message) = self.model.error.clone() {
            egui::Window::new("Workflow error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        self.inbox.push(Msg::DismissError);
                    }
                });
        }
    }

    /// Render latest status message when present.
    fn render_status(&self, ui: &mut egui::Ui) {
        if let Some(text) = &self.model.status {
            let display = if self.model.pending_commands > 0 {
                format!("{}  ({} working…)", text, self.model.pending_commands)
            } else {
                text.to_string()
            };
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(display).color(egui::Color32::from_gray(68)));
                if self.model.pending_commands > 0 {
                    ui.add(egui::Spinner::new().size(14.0))
                        .on_hover_text(format!(
                            "{} task(s) running in background",
                            self.model.pending_commands
                        ));
                }
            });
        }
    }
}
