// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! The LoRA stacker node: state, controls, persistence, and the operations that change them.
//!
//! Every operation mutates the store, then saves, then reshapes the control
//! list when its shape changed. Operations addressed at an id that no longer
//! exists do nothing.

use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;
use serde_json::Value;

use crate::logic::candidates::CandidateCatalog;
use crate::logic::layout;
use crate::logic::persistence::{LoadSource, PersistenceBridge, SharedCache};
use crate::logic::reconcile::{
    BuildContext, ControlSet, ControlTag, ControlValue, FullRebuild, Reconcile, Role,
};
use crate::logic::store::{FieldEdit, StateStore};
use crate::models::preset::Preset;
use crate::models::stack::{GroupId, ItemId, Membership, Snapshot};
use crate::models::workflow::{NodeId, NodeRecord};

pub const STACKER_NODE_TYPE: &str = "AdvancedLoraStacker";

/// Position of each serialized widget value.
const SEED_SLOT: usize = 0;
const STACK_DATA_SLOT: usize = 1;

pub struct StackerNode {
    id: NodeId,
    seed: u64,
    stack_data: String,
    store: StateStore,
    collapsed: BTreeSet<GroupId>,
    controls: ControlSet,
    size: [f32; 2],
    bridge: PersistenceBridge,
    catalog: Rc<CandidateCatalog>,
    reconciler: Box<dyn Reconcile>,
}

impl StackerNode {
    /// Fresh node with an empty stack.
    pub fn new(id: NodeId, cache: SharedCache, catalog: Rc<CandidateCatalog>) -> Self {
        let mut node = Self {
            id,
            seed: 0,
            stack_data: String::new(),
            store: StateStore::default(),
            collapsed: BTreeSet::new(),
            controls: ControlSet::new(0, ""),
            size: [0.0, 0.0],
            bridge: PersistenceBridge::new(id, cache),
            catalog,
            reconciler: Box::new(FullRebuild),
        };
        node.reconcile();
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn controls(&self) -> &ControlSet {
        &self.controls
    }

    pub fn collapsed(&self) -> &BTreeSet<GroupId> {
        &self.collapsed
    }

    pub fn is_collapsed(&self, group: GroupId) -> bool {
        self.collapsed.contains(&group)
    }

    /// Value of the document-visible stack-data field.
    pub fn stack_data(&self) -> &str {
        &self.stack_data
    }

    pub fn size(&self) -> [f32; 2] {
        self.size
    }

    pub fn add_group(&mut self) -> GroupId {
        let id = self.store.add_group();
        if let Some(group) = self.store.group(id) {
            let names = self.catalog.names();
            let ctx = BuildContext {
                snapshot: self.store.snapshot(),
                collapsed: &self.collapsed,
                candidates: names,
            };
            self.controls.insert_group(group, &ctx);
        }
        self.refit();
        self.save();
        id
    }

    pub fn remove_group(&mut self, id: GroupId) -> bool {
        if !self.store.remove_group(id) {
            debug!("Node {}: remove for unknown group {id} ignored", self.id);
            return false;
        }
        self.collapsed.remove(&id);
        self.reconcile();
        self.save();
        true
    }

    /// Flip a group between collapsed and expanded. Presentation only, nothing is saved.
    pub fn toggle_collapse(&mut self, id: GroupId) -> bool {
        if self.store.group(id).is_none() {
            debug!("Node {}: collapse for unknown group {id} ignored", self.id);
            return false;
        }
        if !self.collapsed.remove(&id) {
            self.collapsed.insert(id);
        }
        self.reconcile();
        true
    }

    pub fn add_item(&mut self, group: Option<GroupId>) -> Option<ItemId> {
        let Some(id) = self.store.add_item(Membership::from_group(group)) else {
            debug!("Node {}: add to unknown group {group:?} ignored", self.id);
            return None;
        };
        let inserted = match self.store.item(id) {
            Some(item) => {
                let names = self.catalog.names();
                let ctx = BuildContext {
                    snapshot: self.store.snapshot(),
                    collapsed: &self.collapsed,
                    candidates: names,
                };
                self.controls.insert_item(item, &ctx)
            }
            None => false,
        };
        if inserted {
            self.refit();
        } else {
            self.reconcile();
        }
        self.save();
        Some(id)
    }

    pub fn remove_item(&mut self, id: ItemId) -> bool {
        if !self.store.remove_item(id) {
            debug!("Node {}: remove for unknown LoRA {id} ignored", self.id);
            return false;
        }
        self.reconcile();
        self.save();
        true
    }

    /// Apply a value reported by a control.
    ///
    /// Lock and randomize switches rebuild the controls so dependent value
    /// fields appear or disappear; every other edit only updates the control
    /// in place. Returns `false` for stale tags or mismatched values.
    pub fn edit(&mut self, tag: ControlTag, value: ControlValue) -> bool {
        if tag.role == Role::Seed {
            return match value {
                ControlValue::Integer(seed) => {
                    self.set_seed(seed);
                    true
                }
                _ => false,
            };
        }

        let Some(edit) = field_edit(&tag, &value) else {
            debug!("Node {}: {:?} does not accept {value:?}", self.id, tag.role);
            return false;
        };
        if !self.store.apply(&edit) {
            debug!("Node {}: stale edit for {tag:?} ignored", self.id);
            return false;
        }

        self.controls.set_value(&tag, value);
        self.save();
        if edit.changes_shape() {
            self.reconcile();
        }
        true
    }

    /// Run the action behind a button-like control.
    pub fn activate(&mut self, tag: ControlTag) -> bool {
        match (tag.role, tag.group, tag.item) {
            (Role::AddGroup, _, _) => {
                self.add_group();
                true
            }
            (Role::AddItem, _, _) => self.add_item(None).is_some(),
            (Role::GroupAddItem, Some(group), _) => self.add_item(Some(group)).is_some(),
            (Role::GroupCollapse, Some(group), _) => self.toggle_collapse(group),
            (Role::GroupRemove, Some(group), _) => self.remove_group(group),
            (Role::ItemRemove, _, Some(item)) => self.remove_item(item),
            (role, _, _) => {
                debug!("Node {}: {role:?} is not an action", self.id);
                false
            }
        }
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.controls
            .set_value(&ControlTag::node(Role::Seed), ControlValue::Integer(seed));
    }

    /// Mirror the current snapshot into the stack-data field and the backup cache.
    pub fn save(&mut self) -> bool {
        let saved = self
            .bridge
            .save(self.store.snapshot(), &mut self.stack_data);
        if saved {
            self.controls.set_value(
                &ControlTag::node(Role::StackData),
                ControlValue::Text(self.stack_data.clone()),
            );
        }
        saved
    }

    /// Rebuild the control list from the store.
    pub fn reconcile(&mut self) {
        let names = self.catalog.names();
        let ctx = BuildContext {
            snapshot: self.store.snapshot(),
            collapsed: &self.collapsed,
            candidates: names,
        };
        self.reconciler.reconcile(&mut self.controls, &ctx);
        self.refit();
    }

    fn refit(&mut self) {
        self.size = layout::fit_size(self.size, self.controls.controls(), &self.collapsed);
    }

    /// Values the document records for this node: `[seed, stack_data]`.
    pub fn widget_values(&self) -> Vec<Value> {
        vec![Value::from(self.seed), Value::from(self.stack_data.clone())]
    }

    /// Document record of this node.
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            node_type: STACKER_NODE_TYPE.to_string(),
            widgets_values: self.widget_values(),
            inputs: Vec::new(),
        }
    }

    /// Restore the node from the values recorded at the last document save.
    ///
    /// The collapse state is reset. When the stack had to come from the backup
    /// cache it is saved straight away so the document carries it again.
    pub fn configure(&mut self, prior: &[Value]) -> LoadSource {
        if let Some(seed) = prior.get(SEED_SLOT).and_then(Value::as_u64) {
            self.set_seed(seed);
        }

        let outcome = self
            .bridge
            .load(prior, STACK_DATA_SLOT, &mut self.stack_data);
        self.store = StateStore::from_snapshot(outcome.snapshot);
        self.collapsed.clear();
        self.controls.set_value(
            &ControlTag::node(Role::StackData),
            ControlValue::Text(self.stack_data.clone()),
        );
        if outcome.source == LoadSource::Cache {
            self.save();
        }
        self.reconcile();
        outcome.source
    }
}

/// Translate a control value into a store edit. `None` when the pair makes no sense.
fn field_edit(tag: &ControlTag, value: &ControlValue) -> Option<FieldEdit> {
    let number = || match value {
        ControlValue::Number(v) => Some(*v),
        _ => None,
    };
    let flag = || match value {
        ControlValue::Bool(b) => Some(*b),
        _ => None,
    };

    if let Role::GroupCeiling(channel) = tag.role {
        return Some(FieldEdit::Ceiling {
            group: tag.group?,
            channel,
            value: number()?,
        });
    }

    let item = tag.item?;
    let edit = match tag.role {
        Role::ItemName => match value {
            ControlValue::Text(name) => FieldEdit::Name {
                item,
                name: name.clone(),
            },
            _ => return None,
        },
        Role::ItemPreset => match value {
            ControlValue::Text(label) => FieldEdit::Preset {
                item,
                preset: Preset::from_label(label)?,
            },
            _ => return None,
        },
        Role::ItemLock(channel) => FieldEdit::Lock {
            item,
            channel,
            locked: flag()?,
        },
        Role::ItemLockedValue(channel) => FieldEdit::LockedValue {
            item,
            channel,
            value: number()?,
        },
        Role::ItemStrength(channel) => FieldEdit::Strength {
            item,
            channel,
            value: number()?,
        },
        Role::ItemRandom(channel) => FieldEdit::Randomize {
            item,
            channel,
            enabled: flag()?,
        },
        Role::ItemMin(channel) => FieldEdit::RandomMin {
            item,
            channel,
            value: number()?,
        },
        Role::ItemMax(channel) => FieldEdit::RandomMax {
            item,
            channel,
            value: number()?,
        },
        _ => return None,
    };
    Some(edit)
}
