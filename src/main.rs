// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

mod app;
mod config;
mod logic;
mod models;
mod mvu;
mod ui;
mod utils;

use log::info;

use crate::config::StackerConfig;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = StackerConfig::load();
    info!(
        "LoRA directory {}, backup cache {}",
        config.lora_dir.display(),
        config.cache_dir.display()
    );

    app::run(config)
}
