// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Workflow document: the host-side record of every node and its serialized widget values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::sanitize_component;

pub type NodeId = u64;

/// Saved workflow with one record per node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub last_node_id: NodeId,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

/// Serialized form of a single node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Primitive values of the node's serializable widgets, in widget order.
    #[serde(default)]
    pub widgets_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputRecord>,
}

/// Serialized input socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub socket_type: String,
    #[serde(default)]
    pub link: Option<u64>,
    /// Text carried by the link when the workflow was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Read and parse a workflow file.
pub fn read_workflow(path: &Path) -> Result<Workflow> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse workflow JSON: {}", path.display()))
}

/// Write a workflow file, creating parent directories when missing.
pub fn write_workflow(path: &Path, workflow: &Workflow) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(workflow).context("Failed to serialize workflow JSON")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write workflow file: {}", path.display()))
}

/// Suggest a file name for saving a workflow.
pub fn suggested_workflow_name(title: &str) -> String {
    let base = sanitize_component(title.trim()).to_lowercase();
    format!("{base}.json")
}

/// Force `extension` on `path` unless it already carries it (case-insensitive).
pub fn ensure_extension(mut path: PathBuf, extension: &str) -> PathBuf {
    let replace = !matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case(extension)
    );

    if replace {
        path.set_extension(extension);
    }
    path
}
