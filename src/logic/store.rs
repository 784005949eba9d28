// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Canonical stack state of one stacker node plus its id counters.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::models::preset::Preset;
use crate::models::stack::{Channel, Group, GroupId, Item, ItemId, Membership, Snapshot};

/// A single-field change addressed by entity id.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEdit {
    Ceiling {
        group: GroupId,
        channel: Channel,
        value: f64,
    },
    Name {
        item: ItemId,
        name: String,
    },
    Preset {
        item: ItemId,
        preset: Preset,
    },
    Lock {
        item: ItemId,
        channel: Channel,
        locked: bool,
    },
    LockedValue {
        item: ItemId,
        channel: Channel,
        value: f64,
    },
    Strength {
        item: ItemId,
        channel: Channel,
        value: f64,
    },
    Randomize {
        item: ItemId,
        channel: Channel,
        enabled: bool,
    },
    RandomMin {
        item: ItemId,
        channel: Channel,
        value: f64,
    },
    RandomMax {
        item: ItemId,
        channel: Channel,
        value: f64,
    },
}

impl FieldEdit {
    /// True when the edit shows or hides dependent controls.
    pub fn changes_shape(&self) -> bool {
        matches!(self, Self::Lock { .. } | Self::Randomize { .. })
    }
}

/// Largest id kept from a loaded snapshot. Anything above is re-minted so the
/// counters always have room to grow.
pub const MAX_ID: u32 = i32::MAX as u32;

/// Owns the snapshot; every change goes through the methods below.
#[derive(Clone, Debug, PartialEq)]
pub struct StateStore {
    snapshot: Snapshot,
    next_group_id: GroupId,
    next_item_id: ItemId,
}

impl Default for StateStore {
    fn default() -> Self {
        Self {
            snapshot: Snapshot::default(),
            next_group_id: 1,
            next_item_id: 1,
        }
    }
}

impl StateStore {
    /// Adopt a loaded snapshot, repairing what a hand-edited or older payload may get wrong.
    ///
    /// - Groups are ordered by their recorded index (list order breaks ties) and
    ///   renumbered `1..=N`.
    /// - Recorded ids are kept; zero or duplicate ids are re-minted.
    /// - Entries pointing at a group that does not exist are dropped.
    /// - Counters resume after the largest id in use.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let Snapshot { mut groups, loras } = snapshot;

        groups.sort_by_key(|g| (g.index == 0, g.index));
        let (group_ids, moved) = reassign_ids(groups.iter_mut().map(|g| &mut g.id));
        for (pos, group) in groups.iter_mut().enumerate() {
            group.index = pos as u32 + 1;
        }

        let mut items: Vec<Item> = loras
            .into_iter()
            .map(|mut item| {
                if let Some(&group) = item.group_id().and_then(|gid| moved.get(&gid)) {
                    item.rename_group(group);
                }
                item
            })
            .filter(|item| match item.membership() {
                Membership::Group(gid) if !group_ids.contains(&gid) => {
                    warn!(
                        "Dropping LoRA entry {} that references missing group {gid}",
                        item.id
                    );
                    false
                }
                _ => true,
            })
            .collect();
        let (item_ids, _) = reassign_ids(items.iter_mut().map(|i| &mut i.id));

        Self {
            next_group_id: group_ids.iter().max().map_or(1, |max| max + 1),
            next_item_id: item_ids.iter().max().map_or(1, |max| max + 1),
            snapshot: Snapshot {
                groups,
                loras: items,
            },
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn groups(&self) -> &[Group] {
        &self.snapshot.groups
    }

    pub fn items(&self) -> &[Item] {
        &self.snapshot.loras
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.snapshot.groups.iter().find(|g| g.id == id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.snapshot.loras.iter().find(|i| i.id == id)
    }

    /// Entries with the given membership, in list order.
    pub fn items_in(&self, membership: Membership) -> impl Iterator<Item = &Item> {
        self.snapshot
            .loras
            .iter()
            .filter(move |item| item.membership() == membership)
    }

    /// Append a group with default ceilings and return its id.
    pub fn add_group(&mut self) -> GroupId {
        let id = mint(&mut self.next_group_id);
        let index = self.snapshot.groups.len() as u32 + 1;
        self.snapshot.groups.push(Group::new(id, index));
        id
    }

    /// Remove a group and every entry in it. Returns `false` for unknown ids.
    pub fn remove_group(&mut self, id: GroupId) -> bool {
        let Some(pos) = self.snapshot.groups.iter().position(|g| g.id == id) else {
            return false;
        };
        self.snapshot.groups.remove(pos);
        self.snapshot
            .loras
            .retain(|item| item.membership() != Membership::Group(id));
        for (pos, group) in self.snapshot.groups.iter_mut().enumerate() {
            group.index = pos as u32 + 1;
        }
        true
    }

    /// Append an entry. Returns `None` when the target group does not exist.
    pub fn add_item(&mut self, membership: Membership) -> Option<ItemId> {
        if let Membership::Group(gid) = membership
            && self.group(gid).is_none()
        {
            return None;
        }
        let id = mint(&mut self.next_item_id);
        self.snapshot.loras.push(Item::new(id, membership));
        Some(id)
    }

    pub fn remove_item(&mut self, id: ItemId) -> bool {
        let before = self.snapshot.loras.len();
        self.snapshot.loras.retain(|item| item.id != id);
        self.snapshot.loras.len() != before
    }

    /// Apply a field edit. Returns `false` when the target is gone or has the other variant.
    pub fn apply(&mut self, edit: &FieldEdit) -> bool {
        match edit {
            FieldEdit::Ceiling {
                group,
                channel,
                value,
            } => match self.snapshot.groups.iter_mut().find(|g| g.id == *group) {
                Some(group) => {
                    *group.ceiling_mut(*channel) = *value;
                    true
                }
                None => false,
            },
            FieldEdit::Name { item, name } => self.with_item(*item, |entry| {
                entry.name = name.clone();
                true
            }),
            FieldEdit::Preset { item, preset } => self.with_item(*item, |entry| {
                entry.preset = *preset;
                true
            }),
            FieldEdit::Lock {
                item,
                channel,
                locked,
            } => self.with_item(*item, |entry| {
                entry
                    .locked_mut(*channel)
                    .map(|lock| lock.locked = *locked)
                    .is_some()
            }),
            FieldEdit::LockedValue {
                item,
                channel,
                value,
            } => self.with_item(*item, |entry| {
                entry
                    .locked_mut(*channel)
                    .map(|lock| lock.value = *value)
                    .is_some()
            }),
            FieldEdit::Strength {
                item,
                channel,
                value,
            } => self.with_item(*item, |entry| {
                entry
                    .random_mut(*channel)
                    .map(|ch| ch.strength = *value)
                    .is_some()
            }),
            FieldEdit::Randomize {
                item,
                channel,
                enabled,
            } => self.with_item(*item, |entry| {
                entry
                    .random_mut(*channel)
                    .map(|ch| ch.randomize = *enabled)
                    .is_some()
            }),
            FieldEdit::RandomMin {
                item,
                channel,
                value,
            } => self.with_item(*item, |entry| {
                entry
                    .random_mut(*channel)
                    .map(|ch| ch.min = *value)
                    .is_some()
            }),
            FieldEdit::RandomMax {
                item,
                channel,
                value,
            } => self.with_item(*item, |entry| {
                entry
                    .random_mut(*channel)
                    .map(|ch| ch.max = *value)
                    .is_some()
            }),
        }
    }

    fn with_item(&mut self, id: ItemId, f: impl FnOnce(&mut Item) -> bool) -> bool {
        self.snapshot
            .loras
            .iter_mut()
            .find(|item| item.id == id)
            .is_some_and(f)
    }
}

/// Keep valid unique ids; re-mint zero, repeated or out-of-range ones after the largest kept id.
/// Returns the ids in use and the new id of each out-of-range one.
fn reassign_ids<'a>(
    ids: impl Iterator<Item = &'a mut u32>,
) -> (HashSet<u32>, HashMap<u32, u32>) {
    let ids: Vec<&mut u32> = ids.collect();
    let mut next = ids
        .iter()
        .map(|id| **id)
        .filter(|id| *id <= MAX_ID)
        .max()
        .unwrap_or(0)
        + 1;
    let mut seen = HashSet::with_capacity(ids.len());
    let mut moved = HashMap::new();
    for id in ids {
        if *id > MAX_ID {
            moved.entry(*id).or_insert(next);
        } else if *id != 0 && seen.insert(*id) {
            continue;
        }
        *id = next;
        seen.insert(next);
        next += 1;
    }
    (seen, moved)
}

/// Hand out the counter value and advance it, saturating at the top.
fn mint(counter: &mut u32) -> u32 {
    let id = *counter;
    *counter = counter.saturating_add(1);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_two_groups() -> (StateStore, GroupId, GroupId) {
        let mut store = StateStore::default();
        let a = store.add_group();
        let b = store.add_group();
        store.add_item(Membership::Group(a)).unwrap();
        store.add_item(Membership::Group(b)).unwrap();
        store.add_item(Membership::Group(a)).unwrap();
        store.add_item(Membership::Ungrouped).unwrap();
        (store, a, b)
    }

    #[test]
    fn add_group_appends_with_next_index() {
        let mut store = StateStore::default();
        let first = store.add_group();
        let second = store.add_group();

        assert_ne!(first, second);
        assert_eq!(store.groups()[0].index, 1);
        assert_eq!(store.groups()[1].index, 2);
        assert_eq!(store.groups()[1].max_model, 1.0);
        assert_eq!(store.groups()[1].max_clip, 1.0);
    }

    #[test]
    fn remove_group_cascades_only_its_items_and_renumbers() {
        let (mut store, a, b) = store_with_two_groups();
        let c = store.add_group();

        assert!(store.remove_group(a));

        assert!(store.items().iter().all(|i| i.group_id() != Some(a)));
        assert_eq!(store.items_in(Membership::Group(b)).count(), 1);
        assert_eq!(store.items_in(Membership::Ungrouped).count(), 1);
        let indices: Vec<u32> = store.groups().iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(store.groups()[1].id, c);
    }

    #[test]
    fn remove_missing_group_changes_nothing() {
        let (mut store, _, _) = store_with_two_groups();
        let before = store.clone();

        assert!(!store.remove_group(999));
        assert_eq!(store, before);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut store = StateStore::default();
        let first = store.add_item(Membership::Ungrouped).unwrap();
        assert!(store.remove_item(first));
        let second = store.add_item(Membership::Ungrouped).unwrap();
        assert!(second > first);

        let g1 = store.add_group();
        store.remove_group(g1);
        assert!(store.add_group() > g1);
    }

    #[test]
    fn add_item_to_missing_group_is_rejected() {
        let mut store = StateStore::default();
        assert_eq!(store.add_item(Membership::Group(5)), None);
        assert!(store.items().is_empty());
    }

    #[test]
    fn apply_refuses_the_other_variant_and_stale_ids() {
        let mut store = StateStore::default();
        let g = store.add_group();
        let grouped = store.add_item(Membership::Group(g)).unwrap();
        let loose = store.add_item(Membership::Ungrouped).unwrap();

        assert!(!store.apply(&FieldEdit::Randomize {
            item: grouped,
            channel: Channel::Model,
            enabled: true,
        }));
        assert!(!store.apply(&FieldEdit::Lock {
            item: loose,
            channel: Channel::Clip,
            locked: true,
        }));
        assert!(!store.apply(&FieldEdit::Name {
            item: 404,
            name: "x".into(),
        }));
        assert!(store.apply(&FieldEdit::Lock {
            item: grouped,
            channel: Channel::Clip,
            locked: true,
        }));
        assert!(store.item(grouped).unwrap().locked(Channel::Clip).unwrap().locked);
    }

    #[test]
    fn apply_ceiling_updates_only_that_channel() {
        let mut store = StateStore::default();
        let g = store.add_group();
        assert!(store.apply(&FieldEdit::Ceiling {
            group: g,
            channel: Channel::Clip,
            value: 2.5,
        }));
        let group = store.group(g).unwrap();
        assert_eq!(group.max_clip, 2.5);
        assert_eq!(group.max_model, 1.0);
    }

    #[test]
    fn from_snapshot_keeps_ids_and_resumes_counters() {
        let (store, a, _) = store_with_two_groups();
        let mut reloaded = StateStore::from_snapshot(store.snapshot().clone());

        assert_eq!(reloaded.snapshot(), store.snapshot());
        assert!(reloaded.add_group() > a);
        let next_item = reloaded.add_item(Membership::Ungrouped).unwrap();
        assert!(store.items().iter().all(|i| i.id < next_item));
    }

    #[test]
    fn from_snapshot_repairs_indices_duplicates_and_orphans() {
        let mut g1 = Group::new(3, 7);
        g1.max_model = 0.5;
        let g2 = Group::new(3, 2);
        let snapshot = Snapshot {
            groups: vec![g1, g2],
            loras: vec![
                Item::new(1, Membership::Group(3)),
                Item::new(1, Membership::Ungrouped),
                Item::new(2, Membership::Group(42)),
            ],
        };

        let store = StateStore::from_snapshot(snapshot);

        let groups = store.groups();
        assert_eq!(groups[0].index, 1);
        assert_eq!(groups[0].id, 3);
        assert_eq!(groups[1].index, 2);
        assert_eq!(groups[1].max_model, 0.5);
        assert_ne!(groups[1].id, 3);

        let ids: Vec<ItemId> = store.items().iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 2, "orphaned entry should be dropped");
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn from_snapshot_remints_ids_past_the_limit_and_keeps_counting() {
        let snapshot = Snapshot {
            groups: vec![Group::new(u32::MAX, 1), Group::new(5, 2)],
            loras: vec![
                Item::new(u32::MAX, Membership::Group(u32::MAX)),
                Item::new(MAX_ID + 1, Membership::Ungrouped),
            ],
        };

        let mut store = StateStore::from_snapshot(snapshot);

        let groups: Vec<GroupId> = store.groups().iter().map(|g| g.id).collect();
        assert_eq!(groups, vec![6, 5]);
        let items: Vec<(ItemId, Membership)> = store
            .items()
            .iter()
            .map(|i| (i.id, i.membership()))
            .collect();
        assert_eq!(
            items,
            vec![(1, Membership::Group(6)), (2, Membership::Ungrouped)]
        );

        assert_eq!(store.add_group(), 7);
        assert_eq!(store.add_item(Membership::Group(6)), Some(3));
    }
}
