// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Shared helper utilities reused by UI and node logic.

pub mod sanitize_component;

/// Sanitize user-provided strings into file-name stems.
pub use sanitize_component::sanitize_component;
