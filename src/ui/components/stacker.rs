// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Renders a stacker node's control list and routes user edits back to the node.

use eframe::egui;

use crate::logic::layout;
use crate::logic::node::StackerNode;
use crate::logic::reconcile::{Control, ControlKind, ControlTag, ControlValue, Role};
use crate::ui::components::toggle_switch;

/// Messages emitted by the stacker view, addressed by control tag.
#[derive(Clone, Debug, PartialEq)]
pub enum StackerMsg {
    Edit { tag: ControlTag, value: ControlValue },
    Activate(ControlTag),
}

/// Apply a message to the node. Returns `false` when it no longer applies.
pub fn update(node: &mut StackerNode, msg: StackerMsg) -> bool {
    match msg {
        StackerMsg::Edit {
            tag,
            value: ControlValue::Bool(collapsed),
        } if tag.role == Role::GroupCollapse => match tag.group {
            Some(group) if node.is_collapsed(group) != collapsed => node.toggle_collapse(group),
            _ => false,
        },
        StackerMsg::Edit { tag, value } => node.edit(tag, value),
        StackerMsg::Activate(tag) => node.activate(tag),
    }
}

/// Render the visible controls of `node`.
pub fn view(ui: &mut egui::Ui, node: &StackerNode) -> Vec<StackerMsg> {
    let mut msgs = Vec::new();

    for control in node.controls().controls() {
        if !layout::is_visible(control, node.collapsed()) {
            continue;
        }
        if control.tag.role == Role::ItemName {
            ui.separator();
        }
        ui.horizontal(|ui| {
            ui.set_min_height(layout::CONTROL_HEIGHT);
            if control.tag.item.is_some() && control.tag.group.is_some() {
                ui.add_space(16.0);
            }
            render_control(ui, node, control, &mut msgs);
        });
    }

    msgs
}

fn render_control(
    ui: &mut egui::Ui,
    node: &StackerNode,
    control: &Control,
    msgs: &mut Vec<StackerMsg>,
) {
    let tag = control.tag;
    match (&control.kind, &control.value) {
        (ControlKind::Integer, ControlValue::Integer(current)) => {
            ui.label(&control.label);
            let mut value = *current;
            if ui
                .add(egui::DragValue::new(&mut value).speed(1.0))
                .changed()
            {
                msgs.push(StackerMsg::Edit {
                    tag,
                    value: ControlValue::Integer(value),
                });
            }
        }
        (ControlKind::Number { min, max, step }, ControlValue::Number(current)) => {
            ui.label(&control.label);
            let mut value = *current;
            if ui
                .add(
                    egui::DragValue::new(&mut value)
                        .range(*min..=*max)
                        .speed(*step)
                        .fixed_decimals(2),
                )
                .changed()
            {
                msgs.push(StackerMsg::Edit {
                    tag,
                    value: ControlValue::Number(value),
                });
            }
        }
        (ControlKind::Toggle, ControlValue::Bool(on)) if tag.role == Role::GroupCollapse => {
            let icon = if *on {
                egui_phosphor::regular::CARET_RIGHT
            } else {
                egui_phosphor::regular::CARET_DOWN
            };
            if ui
                .add(egui::Button::new(
                    egui::RichText::new(format!("{icon} {}", control.label)).strong(),
                ))
                .on_hover_text(if *on { "Expand group" } else { "Collapse group" })
                .clicked()
            {
                msgs.push(StackerMsg::Activate(tag));
            }
        }
        (ControlKind::Toggle, ControlValue::Bool(on)) => {
            let mut value = *on;
            if toggle_switch(ui, &mut value).clicked() {
                msgs.push(StackerMsg::Edit {
                    tag,
                    value: ControlValue::Bool(value),
                });
            }
            ui.label(&control.label);
        }
        (ControlKind::Combo { options }, ControlValue::Text(current)) => {
            ui.label(&control.label);
            let mut selected = current.clone();
            egui::ComboBox::from_id_salt(("stacker-combo", node.id(), tag))
                .width(220.0)
                .selected_text(current.as_str())
                .show_ui(ui, |ui| {
                    for option in options {
                        if ui
                            .selectable_value(&mut selected, option.clone(), option)
                            .clicked()
                        {
                            msgs.push(StackerMsg::Edit {
                                tag,
                                value: ControlValue::Text(option.clone()),
                            });
                        }
                    }
                });
        }
        (ControlKind::Button, _) => {
            let icon = match tag.role {
                Role::GroupRemove | Role::ItemRemove => egui_phosphor::regular::TRASH,
                Role::AddGroup => egui_phosphor::regular::FOLDER_PLUS,
                _ => egui_phosphor::regular::PLUS,
            };
            if ui
                .button(format!("{icon} {}", control.label))
                .clicked()
            {
                msgs.push(StackerMsg::Activate(tag));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::candidates::CandidateCatalog;
    use crate::logic::persistence::MemoryBackupCache;
    use std::rc::Rc;

    fn node() -> StackerNode {
        StackerNode::new(
            4,
            Rc::new(MemoryBackupCache::default()),
            Rc::new(CandidateCatalog::new()),
        )
    }

    #[test]
    fn activate_messages_drive_node_actions() {
        let mut node = node();
        assert!(update(
            &mut node,
            StackerMsg::Activate(ControlTag::node(Role::AddGroup))
        ));
        let group = node.store().groups()[0].id;
        assert!(update(
            &mut node,
            StackerMsg::Activate(ControlTag::group(group, Role::GroupAddItem))
        ));
        let grouped = node
            .store()
            .items_in(crate::models::stack::Membership::Group(group))
            .count();
        assert_eq!(grouped, 1);
    }

    #[test]
    fn collapse_edit_only_flips_when_state_differs() {
        let mut node = node();
        let group = node.add_group();
        let tag = ControlTag::group(group, Role::GroupCollapse);

        assert!(!update(
            &mut node,
            StackerMsg::Edit {
                tag,
                value: ControlValue::Bool(false)
            }
        ));
        assert!(update(
            &mut node,
            StackerMsg::Edit {
                tag,
                value: ControlValue::Bool(true)
            }
        ));
        assert!(node.is_collapsed(group));
    }

    #[test]
    fn stale_messages_are_ignored() {
        let mut node = node();
        assert!(!update(
            &mut node,
            StackerMsg::Activate(ControlTag::group(42, Role::GroupRemove))
        ));
    }
}
