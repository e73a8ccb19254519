use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_]+$").unwrap());

static LOWER_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_]+:[a-z_]+$").unwrap());

static PROBLEM_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[=+/&<>;'"?%#$@,. \t\r\n]"#).unwrap());

/// Prefix form used while shaping: `addr:street:name` still splits into `addr` / `street:name`.
static NAMESPACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_]+:[a-z_]+").unwrap());

/// Shape class of a tag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyClass {
    Lower,
    LowerColon,
    Problem,
    Other,
}

impl KeyClass {
    pub const ALL: [KeyClass; 4] = [
        KeyClass::Lower,
        KeyClass::LowerColon,
        KeyClass::Problem,
        KeyClass::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyClass::Lower => "lower",
            KeyClass::LowerColon => "lower_colon",
            KeyClass::Problem => "problem",
            KeyClass::Other => "other",
        }
    }
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Classifies a key; the checks run in priority order and the first hit wins.
pub fn classify(key: &str) -> KeyClass {
    if LOWER.is_match(key) {
        KeyClass::Lower
    } else if LOWER_COLON.is_match(key) {
        KeyClass::LowerColon
    } else if has_problem_chars(key) {
        KeyClass::Problem
    } else {
        KeyClass::Other
    }
}

pub fn has_problem_chars(key: &str) -> bool {
    PROBLEM_CHARS.is_match(key)
}

/// Splits a namespaced key at its first colon, returning `(namespace, key)`.
pub fn split_namespace(key: &str) -> Option<(&str, &str)> {
    if NAMESPACED.is_match(key) {
        key.split_once(':')
    } else {
        None
    }
}
