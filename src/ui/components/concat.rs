// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Text concatenator editor: delimiter, index, linked text inputs and a live output preview.

use eframe::egui;

use crate::logic::concat::{ConcatNode, MAX_INDEX};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConcatMsg {
    DelimiterChanged(String),
    IndexChanged(u64),
    Connect(usize),
    TextChanged { socket: usize, text: String },
    Disconnect(usize),
}

pub fn update(node: &mut ConcatNode, msg: ConcatMsg) -> bool {
    match msg {
        ConcatMsg::DelimiterChanged(delimiter) => {
            node.set_delimiter(delimiter);
            true
        }
        ConcatMsg::IndexChanged(index) => {
            node.set_index(index);
            true
        }
        ConcatMsg::Connect(socket) => node.connect(socket, String::new()),
        ConcatMsg::TextChanged { socket, text } => node.set_text(socket, text),
        ConcatMsg::Disconnect(socket) => node.disconnect(socket),
    }
}

pub fn view(ui: &mut egui::Ui, node: &ConcatNode) -> Vec<ConcatMsg> {
    let mut msgs = Vec::new();

    ui.label("delimiter");
    let mut delimiter = node.delimiter().to_string();
    if ui
        .add(egui::TextEdit::multiline(&mut delimiter).desired_rows(1))
        .changed()
    {
        msgs.push(ConcatMsg::DelimiterChanged(delimiter));
    }

    ui.horizontal(|ui| {
        ui.label("index");
        let mut index = node.index();
        if ui
            .add(
                egui::DragValue::new(&mut index)
                    .range(0..=MAX_INDEX)
                    .clamp_existing_to_range(true),
            )
            .changed()
        {
            msgs.push(ConcatMsg::IndexChanged(index));
        }
    });

    ui.add_space(4.0);
    for (socket, input) in node.inputs().iter().enumerate() {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format!("{} ({})", input.name, input.socket_type)).monospace(),
            );
            if input.link.is_some() {
                let mut text = input.text.clone();
                if ui.text_edit_singleline(&mut text).changed() {
                    msgs.push(ConcatMsg::TextChanged { socket, text });
                }
                if ui
                    .button(egui_phosphor::regular::LINK_BREAK)
                    .on_hover_text("Disconnect")
                    .clicked()
                {
                    msgs.push(ConcatMsg::Disconnect(socket));
                }
            } else if ui
                .button(format!("{} Connect", egui_phosphor::regular::LINK))
                .clicked()
            {
                msgs.push(ConcatMsg::Connect(socket));
            }
        });
    }

    let (combined, indexed) = node.outputs();
    ui.add_space(4.0);
    ui.label(
        egui::RichText::new(format!("combined: {combined}"))
            .small()
            .color(egui::Color32::from_gray(110)),
    );
    ui.label(
        egui::RichText::new(format!("indexed: {indexed}"))
            .small()
            .color(egui::Color32::from_gray(110)),
    );

    msgs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_then_type_feeds_output() {
        let mut node = ConcatNode::new(2);
        assert!(update(&mut node, ConcatMsg::Connect(0)));
        assert!(update(
            &mut node,
            ConcatMsg::TextChanged {
                socket: 0,
                text: "portrait".into()
            }
        ));
        assert!(update(&mut node, ConcatMsg::Connect(1)));
        update(
            &mut node,
            ConcatMsg::TextChanged {
                socket: 1,
                text: "oil".into(),
            },
        );
        update(&mut node, ConcatMsg::DelimiterChanged(" + ".into()));

        assert_eq!(node.outputs().0, "portrait + oil");
    }

    #[test]
    fn typing_into_unlinked_socket_is_rejected() {
        let mut node = ConcatNode::new(2);
        assert!(!update(
            &mut node,
            ConcatMsg::TextChanged {
                socket: 0,
                text: "x".into()
            }
        ));
    }
}
