// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Node behaviour: state store, persistence, control reconciliation and the
//! node types built on them.

pub mod candidates;
pub mod concat;
pub mod layout;
pub mod node;
pub mod persistence;
pub mod reconcile;
pub mod store;
