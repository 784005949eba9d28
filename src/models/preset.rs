// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Closed set of LoRA category presets offered on every stack entry.

/// Category label attached to a LoRA entry; the backend uses it to pick strength curves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Preset {
    #[default]
    Full,
    Character,
    Style,
    Concept,
    FixHands,
}

impl Preset {
    /// Every preset in display order.
    pub const ALL: [Preset; 5] = [
        Preset::Full,
        Preset::Character,
        Preset::Style,
        Preset::Concept,
        Preset::FixHands,
    ];

    /// Label stored in the serialized stack and shown in the selector.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::Character => "Character",
            Self::Style => "Style",
            Self::Concept => "Concept",
            Self::FixHands => "Fix Hands",
        }
    }

    /// Map a stored label back to a preset.
    ///
    /// Matching ignores ASCII case and surrounding whitespace. Unknown labels
    /// return `None`; callers decide whether to fall back to the default.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// assert_eq!(Preset::from_label("style"), Some(Preset::Style));
    /// assert_eq!(Preset::from_label("Fix Hands"), Some(Preset::FixHands));
    /// assert_eq!(Preset::from_label("unknown"), None);
    /// ```
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(raw))
    }
}
