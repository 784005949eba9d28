// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Text concatenator node with a self-growing list of text inputs.

use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::models::workflow::{InputRecord, NodeId, NodeRecord};

pub const CONCAT_NODE_TYPE: &str = "TextConcatenator";
pub const TEXT_SOCKET_TYPE: &str = "STRING";
pub const TEXT_INPUT_BASE: &str = "text";
pub const DEFAULT_DELIMITER: &str = ", ";
pub const MAX_INDEX: u64 = 999;

/// Join `text_1`, `text_2`, … with `delimiter` and pick the entry at `index`.
///
/// Collection stops at the first missing number; inputs present without a
/// value are skipped. Returns `(combined, indexed)`, where `indexed` is empty
/// when `index` is out of range.
///
/// # Examples
///
/// ```ignore
/// let inputs = HashMap::from([
///     ("text_1".to_string(), Some("a".to_string())),
///     ("text_2".to_string(), Some("b".to_string())),
/// ]);
/// assert_eq!(concatenate(" | ", 1, &inputs), ("a | b".to_string(), "b".to_string()));
/// ```
pub fn concatenate(
    delimiter: &str,
    index: usize,
    inputs: &HashMap<String, Option<String>>,
) -> (String, String) {
    let mut texts = Vec::new();
    let mut n = 1;
    while let Some(value) = inputs.get(&format!("{TEXT_INPUT_BASE}_{n}")) {
        if let Some(text) = value {
            texts.push(text.as_str());
        }
        n += 1;
    }
    let combined = texts.join(delimiter);
    let indexed = texts.get(index).map(|t| t.to_string()).unwrap_or_default();
    (combined, indexed)
}

/// One input socket of the concatenator.
#[derive(Clone, Debug, PartialEq)]
pub struct InputSocket {
    pub name: String,
    pub socket_type: String,
    pub link: Option<u64>,
    /// Text arriving over the link.
    pub text: String,
}

impl InputSocket {
    fn empty(name: String) -> Self {
        Self {
            name,
            socket_type: TEXT_SOCKET_TYPE.to_string(),
            link: None,
            text: String::new(),
        }
    }
}

/// Normalise sockets after a connection change.
///
/// Unlinked sockets are dropped, linked ones are renumbered per base name
/// (`text_1`, `text_2`, …), and a single empty trailing socket is appended.
pub fn sync_inputs(sockets: &mut Vec<InputSocket>) {
    sockets.retain(|s| s.link.is_some());

    let mut counters: HashMap<String, u32> = HashMap::new();
    for socket in sockets.iter_mut() {
        let base = base_name(&socket.name).to_string();
        let counter = counters.entry(base.clone()).or_insert(0);
        *counter += 1;
        socket.name = format!("{base}_{counter}");
    }

    let next = counters.get(TEXT_INPUT_BASE).copied().unwrap_or(0) + 1;
    sockets.push(InputSocket::empty(format!("{TEXT_INPUT_BASE}_{next}")));
}

/// Strip a trailing `_<number>` from a socket name.
fn base_name(name: &str) -> &str {
    let base = match name.rsplit_once('_') {
        Some((base, suffix))
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    };
    if base.is_empty() { TEXT_INPUT_BASE } else { base }
}

pub struct ConcatNode {
    id: NodeId,
    delimiter: String,
    index: u64,
    inputs: Vec<InputSocket>,
    next_link: u64,
}

impl ConcatNode {
    pub fn new(id: NodeId) -> Self {
        let mut inputs = Vec::new();
        sync_inputs(&mut inputs);
        Self {
            id,
            delimiter: DEFAULT_DELIMITER.to_string(),
            index: 0,
            inputs,
            next_link: 1,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn inputs(&self) -> &[InputSocket] {
        &self.inputs
    }

    pub fn set_delimiter(&mut self, delimiter: String) {
        self.delimiter = delimiter;
    }

    pub fn set_index(&mut self, index: u64) {
        self.index = index.min(MAX_INDEX);
    }

    /// Link an empty socket, carrying `text`.
    pub fn connect(&mut self, socket: usize, text: String) -> bool {
        let link = self.next_link;
        match self.inputs.get_mut(socket) {
            Some(input) if input.link.is_none() => {
                input.link = Some(link);
                input.text = text;
            }
            _ => {
                debug!("Concat node {}: socket {socket} cannot be connected", self.id);
                return false;
            }
        }
        self.advance_link();
        sync_inputs(&mut self.inputs);
        true
    }

    /// Move the link counter on; number the links afresh once it hits the top.
    fn advance_link(&mut self) {
        match self.next_link.checked_add(1) {
            Some(next) => self.next_link = next,
            None => self.renumber_links(),
        }
    }

    fn renumber_links(&mut self) {
        let mut next = 1;
        for link in self.inputs.iter_mut().filter_map(|s| s.link.as_mut()) {
            *link = next;
            next += 1;
        }
        self.next_link = next;
    }

    /// Change the text arriving on a linked socket.
    pub fn set_text(&mut self, socket: usize, text: String) -> bool {
        match self.inputs.get_mut(socket) {
            Some(input) if input.link.is_some() => {
                input.text = text;
                true
            }
            _ => false,
        }
    }

    pub fn disconnect(&mut self, socket: usize) -> bool {
        match self.inputs.get_mut(socket) {
            Some(input) if input.link.is_some() => input.link = None,
            _ => return false,
        }
        sync_inputs(&mut self.inputs);
        true
    }

    /// `(combined_text, indexed_text)` for the current inputs.
    pub fn outputs(&self) -> (String, String) {
        let inputs: HashMap<String, Option<String>> = self
            .inputs
            .iter()
            .map(|s| (s.name.clone(), s.link.map(|_| s.text.clone())))
            .collect();
        concatenate(&self.delimiter, self.index as usize, &inputs)
    }

    /// Values the document records for this node: `[delimiter, index]`.
    pub fn widget_values(&self) -> Vec<Value> {
        vec![Value::from(self.delimiter.clone()), Value::from(self.index)]
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            node_type: CONCAT_NODE_TYPE.to_string(),
            widgets_values: self.widget_values(),
            inputs: self
                .inputs
                .iter()
                .map(|s| InputRecord {
                    name: s.name.clone(),
                    socket_type: s.socket_type.clone(),
                    link: s.link,
                    text: s.link.map(|_| s.text.clone()),
                })
                .collect(),
        }
    }

    /// Restore widgets and sockets from a document record.
    pub fn configure(&mut self, prior: &[Value], inputs: &[InputRecord]) {
        if let Some(delimiter) = prior.first().and_then(Value::as_str) {
            self.delimiter = delimiter.to_string();
        }
        if let Some(index) = prior.get(1).and_then(Value::as_u64) {
            self.set_index(index);
        }
        self.inputs = inputs
            .iter()
            .map(|record| InputSocket {
                name: record.name.clone(),
                socket_type: record.socket_type.clone(),
                link: record.link,
                text: record.text.clone().unwrap_or_default(),
            })
            .collect();
        match self.inputs.iter().filter_map(|s| s.link).max() {
            Some(max) if max < u64::MAX => self.next_link = max + 1,
            Some(_) => self.renumber_links(),
            None => self.next_link = 1,
        }
        sync_inputs(&mut self.inputs);
    }
}
