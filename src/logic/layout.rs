// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Node sizing. Collapse is applied here as a height filter; the control list itself never shrinks.

use std::collections::BTreeSet;

use crate::logic::reconcile::{Control, ControlKind, Role};
use crate::models::stack::GroupId;

pub const CONTROL_HEIGHT: f32 = 24.0;
pub const CONTROL_SPACING: f32 = 4.0;
pub const TITLE_HEIGHT: f32 = 30.0;
pub const NODE_MIN_WIDTH: f32 = 380.0;

/// Whether a control takes up space given the collapsed groups.
pub fn is_visible(control: &Control, collapsed: &BTreeSet<GroupId>) -> bool {
    if matches!(control.kind, ControlKind::Hidden) {
        return false;
    }
    match control.tag.group {
        Some(gid) if collapsed.contains(&gid) => {
            matches!(control.tag.role, Role::GroupCollapse | Role::GroupRemove)
        }
        _ => true,
    }
}

pub fn control_height(control: &Control, collapsed: &BTreeSet<GroupId>) -> f32 {
    if is_visible(control, collapsed) {
        CONTROL_HEIGHT
    } else {
        0.0
    }
}

/// Size the node to fit its visible controls, keeping any wider user-chosen width.
pub fn fit_size(
    current: [f32; 2],
    controls: &[Control],
    collapsed: &BTreeSet<GroupId>,
) -> [f32; 2] {
    let visible = controls
        .iter()
        .filter(|c| is_visible(c, collapsed))
        .count();
    let body: f32 = controls.iter().map(|c| control_height(c, collapsed)).sum();
    let gaps = visible.saturating_sub(1) as f32 * CONTROL_SPACING;
    [current[0].max(NODE_MIN_WIDTH), TITLE_HEIGHT + body + gaps]
}
