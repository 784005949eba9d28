// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Compact on/off switch used for lock and randomize controls.

use eframe::egui;

const KNOB_RADIUS: f32 = 6.5;
const KNOB_INSET: f32 = 8.0;

/// Draw a toggle switch. A click flips `on` and marks the response changed.
pub fn toggle_switch(ui: &mut egui::Ui, on: &mut bool) -> egui::Response {
    let spacing = ui.style().spacing.interact_size;
    let desired_size = egui::vec2(spacing.x.max(32.0), spacing.y.max(18.0));
    let (rect, mut response) = ui.allocate_exact_size(desired_size, egui::Sense::click());
    if response.clicked() {
        *on = !*on;
        response.mark_changed();
    }

    if ui.is_rect_visible(rect) {
        let how_on = ui.ctx().animate_bool(response.id, *on);
        let visuals = ui.style().interact_selectable(&response, *on);
        let rail_off = ui.visuals().widgets.inactive.bg_fill;
        let fill = blend(rail_off, visuals.bg_fill, how_on);

        ui.painter()
            .rect_filled(rect.expand(visuals.expansion), rect.height() * 0.45, fill);

        let knob_x = egui::lerp((rect.left() + KNOB_INSET)..=(rect.right() - KNOB_INSET), how_on);
        ui.painter().circle(
            egui::pos2(knob_x, rect.center().y),
            KNOB_RADIUS,
            visuals.bg_fill,
            visuals.fg_stroke,
        );
    }

    response
}

/// Per-channel linear blend between two colours.
fn blend(from: egui::Color32, to: egui::Color32, t: f32) -> egui::Color32 {
    let mix = |a: u8, b: u8| egui::lerp(a as f32..=b as f32, t).round() as u8;
    egui::Color32::from_rgba_unmultiplied(
        mix(from.r(), to.r()),
        mix(from.g(), to.g()),
        mix(from.b(), to.b()),
        mix(from.a(), to.a()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_hits_both_ends() {
        let off = egui::Color32::from_rgb(10, 20, 30);
        let on = egui::Color32::from_rgb(200, 100, 0);
        assert_eq!(blend(off, on, 0.0), off);
        assert_eq!(blend(off, on, 1.0), on);
    }
}
