// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Builds the ordered control list of a stacker node from its snapshot.
//!
//! Every control carries a [`ControlTag`] naming the group/entry it edits and
//! its role, so callbacks never depend on labels or positions. The control list
//! always starts with the seed and the hidden stack-data field and always ends
//! with the "add LoRA" and "add group" actions.

use std::collections::BTreeSet;

use crate::models::preset::Preset;
use crate::models::stack::{Channel, Group, GroupId, Item, ItemId, Membership, Snapshot};

/// Editing range offered for strengths, ceilings and bounds.
pub const VALUE_MIN: f64 = 0.0;
pub const VALUE_MAX: f64 = 10.0;
pub const VALUE_STEP: f64 = 0.01;

/// Name of the hidden document field holding the serialized stack.
pub const STACK_DATA_FIELD: &str = "stack_data";

/// What a control does for the entity it is tagged with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Seed,
    StackData,
    AddItem,
    AddGroup,
    GroupCollapse,
    GroupRemove,
    GroupCeiling(Channel),
    GroupAddItem,
    ItemName,
    ItemPreset,
    ItemLock(Channel),
    ItemLockedValue(Channel),
    ItemStrength(Channel),
    ItemRandom(Channel),
    ItemMin(Channel),
    ItemMax(Channel),
    ItemRemove,
}

impl Role {
    /// Controls that survive [`ControlSet::clear`].
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Seed | Self::StackData | Self::AddItem | Self::AddGroup
        )
    }

    fn is_trailing(&self) -> bool {
        matches!(self, Self::AddItem | Self::AddGroup)
    }
}

/// Structured link from a control back to the state it represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ControlTag {
    pub group: Option<GroupId>,
    pub item: Option<ItemId>,
    pub role: Role,
}

impl ControlTag {
    pub const fn node(role: Role) -> Self {
        Self {
            group: None,
            item: None,
            role,
        }
    }

    pub const fn group(id: GroupId, role: Role) -> Self {
        Self {
            group: Some(id),
            item: None,
            role,
        }
    }

    pub fn item(item: &Item, role: Role) -> Self {
        Self {
            group: item.group_id(),
            item: Some(item.id),
            role,
        }
    }
}

/// Widget flavour the host should render.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlKind {
    Integer,
    Number { min: f64, max: f64, step: f64 },
    Toggle,
    Combo { options: Vec<String> },
    Button,
    Hidden,
}

/// Current value shown by a control.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlValue {
    Empty,
    Bool(bool),
    Number(f64),
    Integer(u64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Control {
    pub tag: ControlTag,
    pub label: String,
    pub kind: ControlKind,
    pub value: ControlValue,
}

impl Control {
    fn number(tag: ControlTag, label: String, value: f64) -> Self {
        Self {
            tag,
            label,
            kind: ControlKind::Number {
                min: VALUE_MIN,
                max: VALUE_MAX,
                step: VALUE_STEP,
            },
            value: ControlValue::Number(value),
        }
    }

    fn toggle(tag: ControlTag, label: String, on: bool) -> Self {
        Self {
            tag,
            label,
            kind: ControlKind::Toggle,
            value: ControlValue::Bool(on),
        }
    }

    fn button(tag: ControlTag, label: &str) -> Self {
        Self {
            tag,
            label: label.to_string(),
            kind: ControlKind::Button,
            value: ControlValue::Empty,
        }
    }
}

/// Inputs a build reads; nothing else influences the result.
pub struct BuildContext<'a> {
    pub snapshot: &'a Snapshot,
    pub collapsed: &'a BTreeSet<GroupId>,
    pub candidates: &'a [String],
}

/// Strategy turning state into controls.
pub trait Reconcile {
    fn reconcile(&self, controls: &mut ControlSet, ctx: &BuildContext<'_>);
}

/// Drop every dynamic control and build the list again from scratch.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullRebuild;

impl Reconcile for FullRebuild {
    fn reconcile(&self, controls: &mut ControlSet, ctx: &BuildContext<'_>) {
        controls.clear();
        controls.rebuild(ctx);
    }
}

/// Ordered controls of one stacker node.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlSet {
    controls: Vec<Control>,
}

impl ControlSet {
    /// Only the permanent controls.
    pub fn new(seed: u64, stack_data: &str) -> Self {
        Self {
            controls: vec![
                Control {
                    tag: ControlTag::node(Role::Seed),
                    label: "seed".to_string(),
                    kind: ControlKind::Integer,
                    value: ControlValue::Integer(seed),
                },
                Control {
                    tag: ControlTag::node(Role::StackData),
                    label: STACK_DATA_FIELD.to_string(),
                    kind: ControlKind::Hidden,
                    value: ControlValue::Text(stack_data.to_string()),
                },
                Control::button(ControlTag::node(Role::AddItem), "Add LoRA"),
                Control::button(ControlTag::node(Role::AddGroup), "Add Group"),
            ],
        }
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn tags(&self) -> Vec<ControlTag> {
        self.controls.iter().map(|c| c.tag).collect()
    }

    pub fn get(&self, tag: &ControlTag) -> Option<&Control> {
        self.controls.iter().find(|c| c.tag == *tag)
    }

    /// Write a value into an existing control without touching the layout.
    pub fn set_value(&mut self, tag: &ControlTag, value: ControlValue) -> bool {
        match self.controls.iter_mut().find(|c| c.tag == *tag) {
            Some(control) => {
                control.value = value;
                true
            }
            None => false,
        }
    }

    /// Remove every control except the permanent ones.
    pub fn clear(&mut self) {
        self.controls.retain(|c| c.tag.role.is_permanent());
    }

    /// Insert the dynamic controls for `ctx` ahead of the trailing actions.
    ///
    /// Order: each group by ascending index (header controls, then its entries
    /// in list order), then the ungrouped entries in list order.
    pub fn rebuild(&mut self, ctx: &BuildContext<'_>) {
        let mut groups: Vec<&Group> = ctx.snapshot.groups.iter().collect();
        groups.sort_by_key(|g| g.index);

        let mut built = Vec::new();
        for group in groups {
            built.extend(group_block(group, ctx));
        }
        for item in entries_in(ctx.snapshot, Membership::Ungrouped) {
            built.extend(item_controls(item, ctx.candidates));
        }

        let at = self.trailing_start();
        self.controls.splice(at..at, built);
    }

    /// Place a newly appended group where a rebuild would put it.
    pub fn insert_group(&mut self, group: &Group, ctx: &BuildContext<'_>) {
        let at = self
            .controls
            .iter()
            .position(|c| c.tag.group.is_none() && c.tag.item.is_some())
            .unwrap_or_else(|| self.trailing_start());
        self.controls.splice(at..at, group_block(group, ctx));
    }

    /// Place a newly appended entry at the end of its section.
    ///
    /// Returns `false` when the entry's group has no controls yet; the caller
    /// should fall back to a full rebuild.
    pub fn insert_item(&mut self, item: &Item, ctx: &BuildContext<'_>) -> bool {
        let at = match item.membership() {
            Membership::Ungrouped => self.trailing_start(),
            Membership::Group(gid) => {
                match self.controls.iter().rposition(|c| c.tag.group == Some(gid)) {
                    Some(last) => last + 1,
                    None => return false,
                }
            }
        };
        self.controls
            .splice(at..at, item_controls(item, ctx.candidates));
        true
    }

    fn trailing_start(&self) -> usize {
        self.controls
            .iter()
            .position(|c| c.tag.role.is_trailing())
            .unwrap_or(self.controls.len())
    }
}

fn entries_in(snapshot: &Snapshot, membership: Membership) -> impl Iterator<Item = &Item> {
    snapshot
        .loras
        .iter()
        .filter(move |item| item.membership() == membership)
}

fn group_block(group: &Group, ctx: &BuildContext<'_>) -> Vec<Control> {
    let mut out = group_controls(group, ctx.collapsed.contains(&group.id));
    for item in entries_in(ctx.snapshot, Membership::Group(group.id)) {
        out.extend(item_controls(item, ctx.candidates));
    }
    out
}

/// Header controls of a group: collapse toggle, remove, both ceilings, add-entry.
pub fn group_controls(group: &Group, collapsed: bool) -> Vec<Control> {
    let mut out = vec![
        Control::toggle(
            ControlTag::group(group.id, Role::GroupCollapse),
            format!("Group {}", group.index),
            collapsed,
        ),
        Control::button(ControlTag::group(group.id, Role::GroupRemove), "Remove Group"),
    ];
    for channel in Channel::BOTH {
        out.push(Control::number(
            ControlTag::group(group.id, Role::GroupCeiling(channel)),
            format!("Max {}", channel.label()),
            group.ceiling(channel),
        ));
    }
    out.push(Control::button(
        ControlTag::group(group.id, Role::GroupAddItem),
        "Add LoRA to Group",
    ));
    out
}

/// Controls of one entry; value controls behind an off lock/randomize switch are left out.
pub fn item_controls(item: &Item, candidates: &[String]) -> Vec<Control> {
    let mut out = vec![
        Control {
            tag: ControlTag::item(item, Role::ItemName),
            label: "LoRA".to_string(),
            kind: ControlKind::Combo {
                options: candidates.to_vec(),
            },
            value: ControlValue::Text(item.name.clone()),
        },
        Control {
            tag: ControlTag::item(item, Role::ItemPreset),
            label: "Preset".to_string(),
            kind: ControlKind::Combo {
                options: Preset::ALL
                    .iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
            },
            value: ControlValue::Text(item.preset.as_str().to_string()),
        },
    ];

    for channel in Channel::BOTH {
        let name = channel.label();
        if let Some(lock) = item.locked(channel) {
            out.push(Control::toggle(
                ControlTag::item(item, Role::ItemLock(channel)),
                format!("Lock {name}"),
                lock.locked,
            ));
            if lock.locked {
                out.push(Control::number(
                    ControlTag::item(item, Role::ItemLockedValue(channel)),
                    format!("Locked {name}"),
                    lock.value,
                ));
            }
        }
        if let Some(random) = item.random(channel) {
            out.push(Control::number(
                ControlTag::item(item, Role::ItemStrength(channel)),
                format!("{name} Strength"),
                random.strength,
            ));
            out.push(Control::toggle(
                ControlTag::item(item, Role::ItemRandom(channel)),
                format!("Random {name}"),
                random.randomize,
            ));
            if random.randomize {
                out.push(Control::number(
                    ControlTag::item(item, Role::ItemMin(channel)),
                    format!("Min {name}"),
                    random.min,
                ));
                out.push(Control::number(
                    ControlTag::item(item, Role::ItemMax(channel)),
                    format!("Max {name}"),
                    random.max,
                ));
            }
        }
    }

    out.push(Control::button(
        ControlTag::item(item, Role::ItemRemove),
        "Remove LoRA",
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::store::{FieldEdit, StateStore};

    fn candidates() -> Vec<String> {
        vec!["none".into(), "a.safetensors".into()]
    }

    fn built(store: &StateStore, collapsed: &BTreeSet<GroupId>) -> ControlSet {
        let names = candidates();
        let ctx = BuildContext {
            snapshot: store.snapshot(),
            collapsed,
            candidates: &names,
        };
        let mut controls = ControlSet::new(0, "");
        FullRebuild.reconcile(&mut controls, &ctx);
        controls
    }

    fn roles(controls: &ControlSet) -> Vec<Role> {
        controls.controls().iter().map(|c| c.tag.role).collect()
    }

    #[test]
    fn empty_store_yields_only_permanent_controls() {
        let controls = built(&StateStore::default(), &BTreeSet::new());
        assert_eq!(
            roles(&controls),
            vec![Role::Seed, Role::StackData, Role::AddItem, Role::AddGroup]
        );
    }

    #[test]
    fn build_order_is_groups_then_ungrouped_then_actions() {
        let mut store = StateStore::default();
        let loose = store.add_item(Membership::Ungrouped).unwrap();
        let g = store.add_group();
        let grouped = store.add_item(Membership::Group(g)).unwrap();

        let controls = built(&store, &BTreeSet::new());
        let tags = controls.tags();

        assert_eq!(tags[2], ControlTag::group(g, Role::GroupCollapse));
        assert_eq!(tags[3].role, Role::GroupRemove);
        assert_eq!(tags[4].role, Role::GroupCeiling(Channel::Model));
        assert_eq!(tags[5].role, Role::GroupCeiling(Channel::Clip));
        assert_eq!(tags[6].role, Role::GroupAddItem);
        assert_eq!(tags[7].item, Some(grouped));
        assert_eq!(tags[7].role, Role::ItemName);

        let first_loose = tags.iter().position(|t| t.item == Some(loose)).unwrap();
        let last_grouped = tags.iter().rposition(|t| t.item == Some(grouped)).unwrap();
        assert!(first_loose > last_grouped);

        let n = tags.len();
        assert_eq!(tags[n - 2].role, Role::AddItem);
        assert_eq!(tags[n - 1].role, Role::AddGroup);
    }

    #[test]
    fn groups_follow_index_order() {
        let mut store = StateStore::default();
        let first = store.add_group();
        let second = store.add_group();
        store.remove_group(first);
        let third = store.add_group();

        let controls = built(&store, &BTreeSet::new());
        let headers: Vec<GroupId> = controls
            .controls()
            .iter()
            .filter(|c| c.tag.role == Role::GroupCollapse)
            .filter_map(|c| c.tag.group)
            .collect();
        assert_eq!(headers, vec![second, third]);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut store = StateStore::default();
        let g = store.add_group();
        store.add_item(Membership::Group(g));
        store.add_item(Membership::Ungrouped);
        let collapsed = BTreeSet::from([g]);

        let mut controls = built(&store, &collapsed);
        let first = controls.clone();
        let names = candidates();
        let ctx = BuildContext {
            snapshot: store.snapshot(),
            collapsed: &collapsed,
            candidates: &names,
        };
        FullRebuild.reconcile(&mut controls, &ctx);

        assert_eq!(controls, first);
    }

    #[test]
    fn collapsed_group_keeps_its_controls() {
        let mut store = StateStore::default();
        let g = store.add_group();
        store.add_item(Membership::Group(g));

        let open = built(&store, &BTreeSet::new());
        let closed = built(&store, &BTreeSet::from([g]));

        assert_eq!(open.tags(), closed.tags());
        let header = ControlTag::group(g, Role::GroupCollapse);
        assert_eq!(closed.get(&header).unwrap().value, ControlValue::Bool(true));
    }

    #[test]
    fn randomize_switch_shows_and_hides_bounds() {
        let mut store = StateStore::default();
        let id = store.add_item(Membership::Ungrouped).unwrap();
        for edit in [
            FieldEdit::Randomize {
                item: id,
                channel: Channel::Clip,
                enabled: true,
            },
            FieldEdit::RandomMin {
                item: id,
                channel: Channel::Clip,
                value: 0.2,
            },
            FieldEdit::RandomMax {
                item: id,
                channel: Channel::Clip,
                value: 0.8,
            },
        ] {
            assert!(store.apply(&edit));
        }

        let shown = built(&store, &BTreeSet::new());
        let min = shown
            .controls()
            .iter()
            .find(|c| c.tag.role == Role::ItemMin(Channel::Clip))
            .unwrap();
        assert_eq!(min.label, "Min Clip");
        assert_eq!(min.value, ControlValue::Number(0.2));
        assert!(
            shown
                .controls()
                .iter()
                .any(|c| c.tag.role == Role::ItemMax(Channel::Clip))
        );
        assert!(
            !shown
                .controls()
                .iter()
                .any(|c| c.tag.role == Role::ItemMin(Channel::Model))
        );

        store.apply(&FieldEdit::Randomize {
            item: id,
            channel: Channel::Clip,
            enabled: false,
        });
        let hidden = built(&store, &BTreeSet::new());
        assert!(!hidden.controls().iter().any(|c| matches!(
            c.tag.role,
            Role::ItemMin(Channel::Clip) | Role::ItemMax(Channel::Clip)
        )));
        let clip = store.item(id).unwrap().random(Channel::Clip).unwrap();
        assert_eq!((clip.min, clip.max), (0.2, 0.8));
    }

    #[test]
    fn grouped_entries_expose_lock_controls_only() {
        let mut store = StateStore::default();
        let g = store.add_group();
        let id = store.add_item(Membership::Group(g)).unwrap();
        store.apply(&FieldEdit::Lock {
            item: id,
            channel: Channel::Model,
            locked: true,
        });

        let controls = built(&store, &BTreeSet::new());
        let item_roles: Vec<Role> = controls
            .controls()
            .iter()
            .filter(|c| c.tag.item == Some(id))
            .map(|c| c.tag.role)
            .collect();

        assert_eq!(
            item_roles,
            vec![
                Role::ItemName,
                Role::ItemPreset,
                Role::ItemLock(Channel::Model),
                Role::ItemLockedValue(Channel::Model),
                Role::ItemLock(Channel::Clip),
                Role::ItemRemove,
            ]
        );
    }

    #[test]
    fn in_place_inserts_match_a_full_rebuild() {
        let names = candidates();
        let collapsed = BTreeSet::new();
        let mut store = StateStore::default();
        let mut controls = ControlSet::new(0, "");

        let g1 = store.add_group();
        let group = store.group(g1).unwrap().clone();
        controls.insert_group(
            &group,
            &BuildContext {
                snapshot: store.snapshot(),
                collapsed: &collapsed,
                candidates: &names,
            },
        );

        let loose = store.add_item(Membership::Ungrouped).unwrap();
        let grouped = store.add_item(Membership::Group(g1)).unwrap();
        let g2 = store.add_group();
        for id in [loose, grouped] {
            let item = store.item(id).unwrap().clone();
            assert!(controls.insert_item(
                &item,
                &BuildContext {
                    snapshot: store.snapshot(),
                    collapsed: &collapsed,
                    candidates: &names,
                },
            ));
        }
        let group = store.group(g2).unwrap().clone();
        controls.insert_group(
            &group,
            &BuildContext {
                snapshot: store.snapshot(),
                collapsed: &collapsed,
                candidates: &names,
            },
        );

        assert_eq!(controls, built(&store, &collapsed));
    }

    #[test]
    fn insert_item_into_unrendered_group_requests_rebuild() {
        let names = candidates();
        let collapsed = BTreeSet::new();
        let mut store = StateStore::default();
        let g = store.add_group();
        let id = store.add_item(Membership::Group(g)).unwrap();
        let item = store.item(id).unwrap().clone();

        let mut controls = ControlSet::new(0, "");
        let ctx = BuildContext {
            snapshot: store.snapshot(),
            collapsed: &collapsed,
            candidates: &names,
        };
        assert!(!controls.insert_item(&item, &ctx));
    }

    #[test]
    fn clear_keeps_permanent_controls_in_place() {
        let mut store = StateStore::default();
        store.add_group();
        let mut controls = built(&store, &BTreeSet::new());
        controls.clear();

        assert_eq!(controls, ControlSet::new(0, ""));
    }
}
