// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Application entry point wiring egui/eframe to launch the workflow editor.

use eframe::egui;
use egui_phosphor::Variant;

use crate::config::StackerConfig;
use crate::logic::layout::NODE_MIN_WIDTH;
use crate::ui::LoraStackApp;

/// Bootstrap the desktop application and run the main egui event loop.
pub fn run(config: StackerConfig) -> eframe::Result<()> {
    // Register Phosphor icon font.
    let mut fonts = egui::FontDefinitions::default();
    egui_phosphor::add_to_fonts(&mut fonts, Variant::Regular);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 720.0])
            .with_min_inner_size([NODE_MIN_WIDTH + 40.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "LoRA Stack",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_fonts(fonts);
            Ok(Box::new(LoraStackApp::new(&config)))
        }),
    )
}
