// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Turn cache keys and workflow titles into file-name stems.

/// Fallback stem for names that sanitize to nothing.
const FALLBACK_STEM: &str = "lora_stack";

/// Produce a file-name stem that is safe on Windows and Unix.
///
/// Unicode is transliterated with `deunicode`, everything outside ASCII
/// alphanumerics, `-` and `_` becomes `_`, runs of `_` collapse, and leading
/// or trailing `_` are trimmed. Windows device names get a `_` suffix.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_component("AdvancedLoraStacker_12"), "AdvancedLoraStacker_12");
/// assert_eq!(sanitize_component("Ölbild / Studie"), "Olbild_Studie");
/// ```
pub fn sanitize_component(value: &str) -> String {
    let transliterated = deunicode::deunicode(value);
    let mut out = String::with_capacity(transliterated.len());

    for ch in transliterated.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            ch
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        return FALLBACK_STEM.to_string();
    }

    let reserved = matches!(
        trimmed.to_ascii_uppercase().as_str(),
        "CON" | "PRN" | "AUX" | "NUL"
    ) || is_numbered_device(trimmed);

    if reserved {
        format!("{trimmed}_")
    } else {
        trimmed.to_string()
    }
}

/// `COM1`..`COM9` and `LPT1`..`LPT9`.
fn is_numbered_device(stem: &str) -> bool {
    let upper = stem.to_ascii_uppercase();
    let Some(digit) = upper
        .strip_prefix("COM")
        .or_else(|| upper.strip_prefix("LPT"))
    else {
        return false;
    };
    digit.len() == 1 && matches!(digit.as_bytes()[0], b'1'..=b'9')
}

#[cfg(test)]
mod tests {
    use super::sanitize_component;

    #[test]
    fn keeps_cache_keys_intact() {
        assert_eq!(
            sanitize_component("AdvancedLoraStacker_12"),
            "AdvancedLoraStacker_12"
        );
    }

    #[test]
    fn transliterates_and_collapses_separators() {
        assert_eq!(sanitize_component("Ölbild / Studie"), "Olbild_Studie");
        assert_eq!(sanitize_component("a...b"), "a_b");
    }

    #[test]
    fn reserved_device_names_get_suffix() {
        assert_eq!(sanitize_component("con"), "con_");
        assert_eq!(sanitize_component("LPT3"), "LPT3_");
        assert_eq!(sanitize_component("COM10"), "COM10");
    }

    #[test]
    fn empty_names_fall_back() {
        assert_eq!(sanitize_component("///"), "lora_stack");
        assert_eq!(sanitize_component(""), "lora_stack");
    }
}
