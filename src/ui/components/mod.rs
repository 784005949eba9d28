// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Per-node egui components structured for MVU-style updates.

pub mod concat;
pub mod stacker;
pub mod toggle;

pub use toggle::toggle_switch;
