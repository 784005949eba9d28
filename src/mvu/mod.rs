// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Root Model-View-Update kernel wiring nodes, messages, and background commands.

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::logic::candidates::{CandidateCatalog, CandidateSource, DirectorySource};
use crate::logic::concat::{CONCAT_NODE_TYPE, ConcatNode};
use crate::logic::node::{STACKER_NODE_TYPE, StackerNode};
use crate::logic::persistence::{LoadSource, MemoryBackupCache, SharedCache};
use crate::models::workflow::{NodeId, NodeRecord, Workflow, read_workflow, write_workflow};
use crate::ui::components::concat::{self, ConcatMsg};
use crate::ui::components::stacker::{self, StackerMsg};

/// A node placed in the workflow.
pub enum WorkflowNode {
    Stacker(StackerNode),
    Concat(ConcatNode),
}

impl WorkflowNode {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Stacker(node) => node.id(),
            Self::Concat(node) => node.id(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Stacker(_) => "LoRA Stacker",
            Self::Concat(_) => "Text Concatenator",
        }
    }

    pub fn to_record(&self) -> NodeRecord {
        match self {
            Self::Stacker(node) => node.to_record(),
            Self::Concat(node) => node.to_record(),
        }
    }
}

/// Top-level application state.
pub struct AppModel {
    /// Nodes in display order.
    pub nodes: Vec<WorkflowNode>,
    /// Highest node id handed out so far.
    pub last_node_id: NodeId,
    /// File the workflow was last opened from or saved to.
    pub workflow_path: Option<PathBuf>,
    /// Latest status message to display.
    pub status: Option<String>,
    /// Latest error message to display in modal.
    pub error: Option<String>,
    /// Count of queued background commands.
    pub pending_commands: usize,
    cache: SharedCache,
    catalog: Rc<CandidateCatalog>,
}

impl Default for AppModel {
    fn default() -> Self {
        Self::new(
            Rc::new(MemoryBackupCache::default()),
            Rc::new(CandidateCatalog::new()),
        )
    }
}

impl AppModel {
    pub fn new(cache: SharedCache, catalog: Rc<CandidateCatalog>) -> Self {
        Self {
            nodes: Vec::new(),
            last_node_id: 0,
            workflow_path: None,
            status: None,
            error: None,
            pending_commands: 0,
            cache,
            catalog,
        }
    }

    pub fn catalog(&self) -> &CandidateCatalog {
        &self.catalog
    }

    pub fn node(&self, id: NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut WorkflowNode> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    /// Next free node id, or `None` once the id space is used up.
    fn mint_node_id(&mut self) -> Option<NodeId> {
        let id = self.last_node_id.checked_add(1)?;
        self.last_node_id = id;
        Some(id)
    }

    fn new_stacker(&self, id: NodeId) -> StackerNode {
        StackerNode::new(id, self.cache.clone(), self.catalog.clone())
    }

    /// Document form of the current nodes.
    pub fn to_workflow(&self) -> Workflow {
        Workflow {
            last_node_id: self.last_node_id,
            nodes: self.nodes.iter().map(WorkflowNode::to_record).collect(),
        }
    }

    /// Replace every node with the ones recorded in `workflow`.
    fn restore(&mut self, workflow: Workflow) -> usize {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(workflow.nodes.len());
        for record in workflow.nodes {
            if !seen.insert(record.id) {
                warn!("Skipping duplicate node id {} in workflow", record.id);
                continue;
            }
            match record.node_type.as_str() {
                STACKER_NODE_TYPE => {
                    let mut node = self.new_stacker(record.id);
                    if node.configure(&record.widgets_values) == LoadSource::Cache {
                        info!("Node {} was recovered from the backup cache", record.id);
                    }
                    nodes.push(WorkflowNode::Stacker(node));
                }
                CONCAT_NODE_TYPE => {
                    let mut node = ConcatNode::new(record.id);
                    node.configure(&record.widgets_values, &record.inputs);
                    nodes.push(WorkflowNode::Concat(node));
                }
                other => warn!("Skipping node {} of unknown type {other:?}", record.id),
            }
        }
        let highest = nodes.iter().map(WorkflowNode::id).max().unwrap_or(0);
        self.last_node_id = workflow.last_node_id.max(highest);
        self.nodes = nodes;
        self.nodes.len()
    }
}

const NODE_IDS_EXHAUSTED: &str = "No node ids left in this workflow";

/// Application messages routed through the update function.
pub enum Msg {
    AddStacker,
    AddConcat,
    RemoveNode(NodeId),
    Stacker { node: NodeId, msg: StackerMsg },
    Concat { node: NodeId, msg: ConcatMsg },
    OpenRequested(PathBuf),
    OpenCancelled,
    WorkflowLoaded(Result<(PathBuf, Workflow), String>),
    SaveRequested(PathBuf),
    SaveCancelled,
    SaveCompleted(Result<PathBuf, String>),
    CandidatesLoaded(Result<Vec<String>, String>),
    DismissError,
}

/// Commands represent side-effects executed between frames.
pub enum Command {
    FetchCandidates(DirectorySource),
    ReadWorkflow(PathBuf),
    WriteWorkflow { path: PathBuf, workflow: Workflow },
}

/// Update the application model and enqueue commands.
pub fn update(model: &mut AppModel, msg: Msg, cmds: &mut Vec<Command>) {
    match msg {
        Msg::AddStacker => match model.mint_node_id() {
            Some(id) => {
                let node = model.new_stacker(id);
                model.nodes.push(WorkflowNode::Stacker(node));
            }
            None => surface_event(model, NODE_IDS_EXHAUSTED.to_string(), true),
        },
        Msg::AddConcat => match model.mint_node_id() {
            Some(id) => model.nodes.push(WorkflowNode::Concat(ConcatNode::new(id))),
            None => surface_event(model, NODE_IDS_EXHAUSTED.to_string(), true),
        },
        Msg::RemoveNode(id) => {
            let before = model.nodes.len();
            model.nodes.retain(|n| n.id() != id);
            if model.nodes.len() < before {
                surface_event(model, format!("Removed node #{id}"), false);
            }
        }
        Msg::Stacker { node, msg } => match model.node_mut(node) {
            Some(WorkflowNode::Stacker(target)) => {
                stacker::update(target, msg);
            }
            _ => debug!("Stacker message for missing node {node} ignored"),
        },
        Msg::Concat { node, msg } => match model.node_mut(node) {
            Some(WorkflowNode::Concat(target)) => {
                concat::update(target, msg);
            }
            _ => debug!("Concat message for missing node {node} ignored"),
        },
        Msg::OpenRequested(path) => cmds.push(Command::ReadWorkflow(path)),
        Msg::OpenCancelled => surface_event(model, "Open cancelled.".to_string(), false),
        Msg::WorkflowLoaded(result) => match result {
            Ok((path, workflow)) => {
                let count = model.restore(workflow);
                surface_event(
                    model,
                    format!("Opened {} ({count} node(s))", path.display()),
                    false,
                );
                model.workflow_path = Some(path);
            }
            Err(err) => surface_event(model, format!("Failed to open workflow:\n\n{err}"), true),
        },
        Msg::SaveRequested(path) => cmds.push(Command::WriteWorkflow {
            workflow: model.to_workflow(),
            path,
        }),
        Msg::SaveCancelled => surface_event(model, "Save cancelled.".to_string(), false),
        Msg::SaveCompleted(result) => match result {
            Ok(path) => {
                surface_event(model, format!("Workflow saved: {}", path.display()), false);
                model.workflow_path = Some(path);
            }
            Err(err) => surface_event(model, format!("Failed to save workflow:\n\n{err}"), true),
        },
        Msg::CandidatesLoaded(result) => {
            let failed = result.is_err();
            if model.catalog.initialize_from(result) {
                for node in &mut model.nodes {
                    if let WorkflowNode::Stacker(stacker) = node {
                        stacker.reconcile();
                    }
                }
                let count = model.catalog.names().len() - 1;
                surface_event(model, format!("Found {count} LoRA file(s)"), false);
            } else if failed {
                surface_event(
                    model,
                    "LoRA list unavailable; only \"none\" can be selected.".to_string(),
                    false,
                );
            }
        }
        Msg::DismissError => model.error = None,
    }
}

/// Execute a command on a worker thread and return the resulting message.
pub fn run_command(cmd: Command) -> Msg {
    match cmd {
        Command::FetchCandidates(source) => {
            Msg::CandidatesLoaded(source.list().map_err(|err| err.to_string()))
        }
        Command::ReadWorkflow(path) => Msg::WorkflowLoaded(
            read_workflow(&path)
                .map(|workflow| (path, workflow))
                .map_err(|err| format!("{err:#}")),
        ),
        Command::WriteWorkflow { path, workflow } => Msg::SaveCompleted(
            write_workflow(&path, &workflow)
                .map(|_| path)
                .map_err(|err| format!("{err:#}")),
        ),
    }
}

/// Update status/error fields consistently for user feedback.
fn surface_event(model: &mut AppModel, message: String, is_error: bool) {
    if is_error {
        model.error = Some(message.clone());
    }
    model.status = Some(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::persistence::{BackupCache, cache_key};
    use crate::logic::reconcile::{ControlKind, ControlTag, ControlValue, Role};
    use crate::models::stack::Snapshot;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn stacker(model: &AppModel, id: NodeId) -> &StackerNode {
        match model.node(id) {
            Some(WorkflowNode::Stacker(node)) => node,
            _ => panic!("node {id} is not a stacker"),
        }
    }

    fn send(model: &mut AppModel, msg: Msg) -> Vec<Command> {
        let mut cmds = Vec::new();
        update(model, msg, &mut cmds);
        cmds
    }

    /// Run every queued command and feed the results back.
    fn settle(model: &mut AppModel, mut cmds: Vec<Command>) {
        while let Some(cmd) = cmds.pop() {
            let msg = run_command(cmd);
            cmds.extend(send(model, msg));
        }
    }

    #[test]
    fn node_ids_continue_after_last_node_id() {
        let mut model = AppModel::default();
        model.last_node_id = 9;
        send(&mut model, Msg::AddStacker);
        send(&mut model, Msg::AddConcat);
        let ids: Vec<NodeId> = model.nodes.iter().map(WorkflowNode::id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(model.last_node_id, 11);
    }

    #[test]
    fn add_node_reports_error_when_ids_run_out() {
        let mut model = AppModel::default();
        model.last_node_id = NodeId::MAX;
        send(&mut model, Msg::AddStacker);
        send(&mut model, Msg::AddConcat);

        assert!(model.nodes.is_empty());
        assert_eq!(model.last_node_id, NodeId::MAX);
        assert_eq!(model.error.as_deref(), Some(NODE_IDS_EXHAUSTED));
    }

    #[test]
    fn stacker_messages_reach_their_node_only() {
        let mut model = AppModel::default();
        send(&mut model, Msg::AddStacker);
        send(&mut model, Msg::AddStacker);

        send(
            &mut model,
            Msg::Stacker {
                node: 2,
                msg: StackerMsg::Activate(ControlTag::node(Role::AddItem)),
            },
        );
        send(
            &mut model,
            Msg::Stacker {
                node: 99,
                msg: StackerMsg::Activate(ControlTag::node(Role::AddItem)),
            },
        );

        assert!(stacker(&model, 1).snapshot().is_empty());
        assert_eq!(stacker(&model, 2).snapshot().loras.len(), 1);
    }

    #[test]
    fn save_then_open_restores_nodes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("flow.json");

        let mut model = AppModel::default();
        send(&mut model, Msg::AddStacker);
        send(&mut model, Msg::AddConcat);
        send(
            &mut model,
            Msg::Stacker {
                node: 1,
                msg: StackerMsg::Activate(ControlTag::node(Role::AddGroup)),
            },
        );
        send(
            &mut model,
            Msg::Concat {
                node: 2,
                msg: ConcatMsg::DelimiterChanged(" | ".into()),
            },
        );
        let cmds = send(&mut model, Msg::SaveRequested(path.clone()));
        assert_eq!(cmds.len(), 1, "save should enqueue command");
        settle(&mut model, cmds);

        assert!(model.error.is_none());
        assert!(
            model
                .status
                .as_deref()
                .is_some_and(|s| s.contains("Workflow saved"))
        );

        let mut reopened = AppModel::default();
        let cmds = send(&mut reopened, Msg::OpenRequested(path.clone()));
        settle(&mut reopened, cmds);

        assert_eq!(reopened.nodes.len(), 2);
        assert_eq!(reopened.last_node_id, 2);
        assert_eq!(stacker(&reopened, 1).snapshot().groups.len(), 1);
        match reopened.node(2) {
            Some(WorkflowNode::Concat(node)) => assert_eq!(node.delimiter(), " | "),
            _ => panic!("node 2 should be a concatenator"),
        }
        assert_eq!(reopened.workflow_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn open_skips_unknown_and_duplicate_nodes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("flow.json");
        fs::write(
            &path,
            r#"{"last_node_id": 3, "nodes": [
                {"id": 3, "type": "KSampler", "widgets_values": []},
                {"id": 5, "type": "TextConcatenator", "widgets_values": ["-", 0]},
                {"id": 5, "type": "AdvancedLoraStacker", "widgets_values": [1, ""]}
            ]}"#,
        )
        .unwrap();

        let mut model = AppModel::default();
        settle(&mut model, vec![Command::ReadWorkflow(path)]);

        assert_eq!(model.nodes.len(), 1);
        assert_eq!(model.last_node_id, 5);
        send(&mut model, Msg::AddStacker);
        assert!(model.node(6).is_some());
    }

    #[test]
    fn open_failure_sets_error() {
        let tmp = TempDir::new().unwrap();
        let mut model = AppModel::default();
        settle(
            &mut model,
            vec![Command::ReadWorkflow(tmp.path().join("missing.json"))],
        );
        assert!(
            model
                .error
                .as_deref()
                .is_some_and(|e| e.contains("Failed to open workflow"))
        );
        send(&mut model, Msg::DismissError);
        assert!(model.error.is_none());
    }

    #[test]
    fn stack_lost_from_document_comes_back_from_cache() {
        let cache: SharedCache = Rc::new(MemoryBackupCache::default());
        let catalog = Rc::new(CandidateCatalog::new());
        let saved = Snapshot::from_json(
            r#"{"groups":[{"id":1,"index":1,"max_model":1.0,"max_clip":1.0}],"loras":[]}"#,
        )
        .unwrap();
        cache
            .write(&cache_key(7), &saved.to_json().unwrap())
            .unwrap();

        let mut model = AppModel::new(cache.clone(), catalog);
        let workflow = Workflow {
            last_node_id: 7,
            nodes: vec![NodeRecord {
                id: 7,
                node_type: STACKER_NODE_TYPE.into(),
                widgets_values: vec![Value::from(3), Value::from("")],
                inputs: Vec::new(),
            }],
        };
        send(
            &mut model,
            Msg::WorkflowLoaded(Ok((PathBuf::from("flow.json"), workflow))),
        );

        let node = stacker(&model, 7);
        assert_eq!(node.snapshot(), &saved);
        assert_eq!(node.seed(), 3);
        assert!(!node.stack_data().is_empty());
    }

    #[test]
    fn candidates_refresh_existing_name_lists() {
        let mut model = AppModel::default();
        send(&mut model, Msg::AddStacker);
        send(
            &mut model,
            Msg::Stacker {
                node: 1,
                msg: StackerMsg::Activate(ControlTag::node(Role::AddItem)),
            },
        );

        send(
            &mut model,
            Msg::CandidatesLoaded(Ok(vec!["a.safetensors".into(), "b.pt".into()])),
        );

        let options = stacker(&model, 1)
            .controls()
            .controls()
            .iter()
            .find(|c| c.tag.role == Role::ItemName)
            .map(|c| c.kind.clone());
        assert_eq!(
            options,
            Some(ControlKind::Combo {
                options: vec!["none".into(), "a.safetensors".into(), "b.pt".into()]
            })
        );
        assert!(model.status.as_deref().is_some_and(|s| s.contains('2')));
    }

    #[test]
    fn failed_candidate_fetch_keeps_none_only() {
        let mut model = AppModel::default();
        send(&mut model, Msg::CandidatesLoaded(Err("offline".into())));
        assert_eq!(model.catalog().names(), ["none".to_string()]);
        assert!(model.error.is_none());
    }

    #[test]
    fn fetch_command_lists_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.safetensors"), b"").unwrap();
        let source = DirectorySource::new(tmp.path().to_path_buf(), vec!["safetensors".into()]);

        match run_command(Command::FetchCandidates(source)) {
            Msg::CandidatesLoaded(Ok(names)) => {
                assert_eq!(names, vec!["a.safetensors".to_string()])
            }
            _ => panic!("expected candidate list"),
        }
    }

    #[test]
    fn edits_are_visible_in_saved_document() {
        let mut model = AppModel::default();
        send(&mut model, Msg::AddStacker);
        send(
            &mut model,
            Msg::Stacker {
                node: 1,
                msg: StackerMsg::Edit {
                    tag: ControlTag::node(Role::Seed),
                    value: ControlValue::Integer(42),
                },
            },
        );
        let workflow = model.to_workflow();
        assert_eq!(workflow.nodes[0].widgets_values[0], Value::from(42));
    }

    #[test]
    fn remove_node_and_cancel_update_status() {
        let mut model = AppModel::default();
        send(&mut model, Msg::AddConcat);
        send(&mut model, Msg::RemoveNode(1));
        assert!(model.nodes.is_empty());
        send(&mut model, Msg::SaveCancelled);
        assert_eq!(model.status.as_deref(), Some("Save cancelled."));
        assert!(model.error.is_none());
    }
}
