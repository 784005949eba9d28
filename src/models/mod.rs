// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Domain layer: stack data, presets and the workflow document format.

pub mod preset;
pub mod stack;
pub mod workflow;
