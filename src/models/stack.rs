// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! LoRA stack data model: groups, entries, and the serialized snapshot.
//! The wire structs are kept lenient so partially written stack data still loads.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::preset::Preset;

pub type GroupId = u32;
pub type ItemId = u32;

/// Name shown when no LoRA file has been picked.
pub const NONE_NAME: &str = "none";
pub const DEFAULT_CEILING: f64 = 1.0;
pub const DEFAULT_STRENGTH: f64 = 1.0;
pub const DEFAULT_RANDOM_MIN: f64 = 0.0;
pub const DEFAULT_RANDOM_MAX: f64 = 1.0;

/// The two strength channels every LoRA applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Model,
    Clip,
}

impl Channel {
    pub const BOTH: [Channel; 2] = [Channel::Model, Channel::Clip];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Model => "Model",
            Self::Clip => "Clip",
        }
    }
}

/// Whether an entry belongs to a group or sits in the ungrouped section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Membership {
    Ungrouped,
    Group(GroupId),
}

impl Membership {
    pub fn from_group(group: Option<GroupId>) -> Self {
        group.map_or(Self::Ungrouped, Self::Group)
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Ungrouped => None,
            Self::Group(id) => Some(*id),
        }
    }
}

/// Named cluster of entries sharing model/clip ceilings.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub id: GroupId,
    /// 1-based display position.
    pub index: u32,
    pub max_model: f64,
    pub max_clip: f64,
}

impl Group {
    pub fn new(id: GroupId, index: u32) -> Self {
        Self {
            id,
            index,
            max_model: DEFAULT_CEILING,
            max_clip: DEFAULT_CEILING,
        }
    }

    pub fn ceiling(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Model => self.max_model,
            Channel::Clip => self.max_clip,
        }
    }

    pub fn ceiling_mut(&mut self, channel: Channel) -> &mut f64 {
        match channel {
            Channel::Model => &mut self.max_model,
            Channel::Clip => &mut self.max_clip,
        }
    }
}

/// Per-channel lock of a grouped entry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LockedChannel {
    pub locked: bool,
    pub value: f64,
}

/// Per-channel strength of an ungrouped entry, with optional randomization bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomChannel {
    pub strength: f64,
    pub randomize: bool,
    pub min: f64,
    pub max: f64,
}

impl Default for RandomChannel {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            randomize: false,
            min: DEFAULT_RANDOM_MIN,
            max: DEFAULT_RANDOM_MAX,
        }
    }
}

/// Variant-specific parameters; the variant always follows the entry's membership.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemParams {
    Grouped {
        model: LockedChannel,
        clip: LockedChannel,
    },
    Ungrouped {
        model: RandomChannel,
        clip: RandomChannel,
    },
}

impl ItemParams {
    pub fn defaults_for(membership: Membership) -> Self {
        match membership {
            Membership::Group(_) => Self::Grouped {
                model: LockedChannel::default(),
                clip: LockedChannel::default(),
            },
            Membership::Ungrouped => Self::Ungrouped {
                model: RandomChannel::default(),
                clip: RandomChannel::default(),
            },
        }
    }

    pub fn locked(&self, channel: Channel) -> Option<&LockedChannel> {
        match (self, channel) {
            (Self::Grouped { model, .. }, Channel::Model) => Some(model),
            (Self::Grouped { clip, .. }, Channel::Clip) => Some(clip),
            (Self::Ungrouped { .. }, _) => None,
        }
    }

    pub fn locked_mut(&mut self, channel: Channel) -> Option<&mut LockedChannel> {
        match (self, channel) {
            (Self::Grouped { model, .. }, Channel::Model) => Some(model),
            (Self::Grouped { clip, .. }, Channel::Clip) => Some(clip),
            (Self::Ungrouped { .. }, _) => None,
        }
    }

    pub fn random(&self, channel: Channel) -> Option<&RandomChannel> {
        match (self, channel) {
            (Self::Ungrouped { model, .. }, Channel::Model) => Some(model),
            (Self::Ungrouped { clip, .. }, Channel::Clip) => Some(clip),
            (Self::Grouped { .. }, _) => None,
        }
    }

    pub fn random_mut(&mut self, channel: Channel) -> Option<&mut RandomChannel> {
        match (self, channel) {
            (Self::Ungrouped { model, .. }, Channel::Model) => Some(model),
            (Self::Ungrouped { clip, .. }, Channel::Clip) => Some(clip),
            (Self::Grouped { .. }, _) => None,
        }
    }
}

/// One LoRA entry in the stack.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub preset: Preset,
    membership: Membership,
    params: ItemParams,
}

impl Item {
    /// Create an entry with the defaults of its membership. Membership is fixed for life.
    pub fn new(id: ItemId, membership: Membership) -> Self {
        Self {
            id,
            name: NONE_NAME.to_string(),
            preset: Preset::default(),
            membership,
            params: ItemParams::defaults_for(membership),
        }
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.membership.group_id()
    }

    /// Point a grouped entry at a group's new id. Ungrouped entries stay as they are.
    pub(crate) fn rename_group(&mut self, group: GroupId) {
        if let Membership::Group(_) = self.membership {
            self.membership = Membership::Group(group);
        }
    }

    pub fn params(&self) -> &ItemParams {
        &self.params
    }

    pub fn locked(&self, channel: Channel) -> Option<&LockedChannel> {
        self.params.locked(channel)
    }

    pub fn locked_mut(&mut self, channel: Channel) -> Option<&mut LockedChannel> {
        self.params.locked_mut(channel)
    }

    pub fn random(&self, channel: Channel) -> Option<&RandomChannel> {
        self.params.random(channel)
    }

    pub fn random_mut(&mut self, channel: Channel) -> Option<&mut RandomChannel> {
        self.params.random_mut(channel)
    }
}

/// Serializable projection of a stacker node's state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub groups: Vec<Group>,
    pub loras: Vec<Item>,
}

/// Reasons stored stack data could not be adopted.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("stack data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stack data holds no groups or LoRAs")]
    Empty,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.loras.is_empty()
    }

    /// Serialize into the `{"groups": [...], "loras": [...]}` wire form.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        let wire = SnapshotWire {
            groups: self.groups.iter().map(GroupWire::from).collect(),
            loras: self.loras.iter().map(ItemWire::from).collect(),
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse stack data written by [`Snapshot::to_json`] or an older build.
    ///
    /// Missing fields fall back to their defaults and ids may be numbers or
    /// numeric strings. Data without any group or entry is reported as
    /// [`SnapshotError::Empty`] so callers can try another source.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let snapshot = Snapshot::from_json(r#"{"groups":[],"loras":[{"id":1,"group_id":null}]}"#)?;
    /// assert_eq!(snapshot.loras.len(), 1);
    /// assert!(matches!(Snapshot::from_json("{}"), Err(SnapshotError::Empty)));
    /// ```
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        if raw.trim().is_empty() {
            return Err(SnapshotError::Empty);
        }
        let wire: SnapshotWire = serde_json::from_str(raw)?;
        if wire.groups.is_empty() && wire.loras.is_empty() {
            return Err(SnapshotError::Empty);
        }
        Ok(Self {
            groups: wire.groups.into_iter().map(Group::from).collect(),
            loras: wire
                .loras
                .into_iter()
                .filter_map(ItemWire::into_item)
                .collect(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotWire {
    #[serde(default)]
    groups: Vec<GroupWire>,
    #[serde(default)]
    loras: Vec<ItemWire>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupWire {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    index: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_model: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_clip: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ItemWire {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    group_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_model: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locked_model_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_clip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locked_clip_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    random_model: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_model: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_model: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clip_strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    random_clip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_clip: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_clip: Option<f64>,
}

impl From<&Group> for GroupWire {
    fn from(group: &Group) -> Self {
        Self {
            id: Value::from(group.id),
            index: Value::from(group.index),
            max_model: Some(group.max_model),
            max_clip: Some(group.max_clip),
        }
    }
}

impl From<GroupWire> for Group {
    fn from(wire: GroupWire) -> Self {
        let mut group = Group::new(value_to_id(&wire.id).unwrap_or(0), 0);
        group.index = value_to_id(&wire.index).unwrap_or(0);
        group.max_model = wire.max_model.unwrap_or(DEFAULT_CEILING);
        group.max_clip = wire.max_clip.unwrap_or(DEFAULT_CEILING);
        group
    }
}

impl From<&Item> for ItemWire {
    fn from(item: &Item) -> Self {
        let mut wire = ItemWire {
            id: Value::from(item.id),
            group_id: item.group_id().map_or(Value::Null, Value::from),
            name: Some(item.name.clone()),
            preset: Some(item.preset.as_str().to_string()),
            ..Default::default()
        };
        match &item.params {
            ItemParams::Grouped { model, clip } => {
                wire.lock_model = Some(model.locked);
                wire.locked_model_value = Some(model.value);
                wire.lock_clip = Some(clip.locked);
                wire.locked_clip_value = Some(clip.value);
            }
            ItemParams::Ungrouped { model, clip } => {
                wire.model_strength = Some(model.strength);
                wire.random_model = Some(model.randomize);
                wire.min_model = Some(model.min);
                wire.max_model = Some(model.max);
                wire.clip_strength = Some(clip.strength);
                wire.random_clip = Some(clip.randomize);
                wire.min_clip = Some(clip.min);
                wire.max_clip = Some(clip.max);
            }
        }
        wire
    }
}

impl ItemWire {
    /// `None` when the entry names a group that cannot be read; such an entry
    /// is dropped rather than moved out of its group.
    fn into_item(wire: Self) -> Option<Item> {
        let membership = match &wire.group_id {
            Value::Null => Membership::Ungrouped,
            other => match value_to_id(other) {
                Some(id) => Membership::Group(id),
                None => {
                    warn!(
                        "Dropping LoRA entry {} with unreadable group_id {other}",
                        wire.id
                    );
                    return None;
                }
            },
        };

        let mut item = Item::new(value_to_id(&wire.id).unwrap_or(0), membership);
        if let Some(name) = wire.name.filter(|n| !n.trim().is_empty()) {
            item.name = name;
        }
        if let Some(raw) = wire.preset.as_deref() {
            item.preset = Preset::from_label(raw).unwrap_or_else(|| {
                warn!("Unknown preset '{raw}', using {}", Preset::default().as_str());
                Preset::default()
            });
        }

        match &mut item.params {
            ItemParams::Grouped { model, clip } => {
                model.locked = wire.lock_model.unwrap_or(model.locked);
                model.value = wire.locked_model_value.unwrap_or(model.value);
                clip.locked = wire.lock_clip.unwrap_or(clip.locked);
                clip.value = wire.locked_clip_value.unwrap_or(clip.value);
            }
            ItemParams::Ungrouped { model, clip } => {
                model.strength = wire.model_strength.unwrap_or(model.strength);
                model.randomize = wire.random_model.unwrap_or(model.randomize);
                model.min = wire.min_model.unwrap_or(model.min);
                model.max = wire.max_model.unwrap_or(model.max);
                clip.strength = wire.clip_strength.unwrap_or(clip.strength);
                clip.randomize = wire.random_clip.unwrap_or(clip.randomize);
                clip.min = wire.min_clip.unwrap_or(clip.min);
                clip.max = wire.max_clip.unwrap_or(clip.max);
            }
        }
        Some(item)
    }
}

/// Read an id stored either as a JSON number or a numeric string.
fn value_to_id(val: &Value) -> Option<u32> {
    match val {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}
