//! Localized text lookup.
//!
//! The engine never owns message texts. It asks a [`TextBundle`] for them, with
//! positional `{0}`, `{1}`, ... arguments. Unknown keys come back unchanged.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Text key for the "field is read-only" violation. `{0}` is the field label.
pub const READ_ONLY_KEY: &str = "validation.message.readOnly";

/// Text key for the "field is required" violation. `{0}` is the field label.
pub const REQUIRED_KEY: &str = "validation.message.required";

static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();

fn placeholder() -> Option<&'static Regex> {
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{(\d+)\}").ok())
        .as_ref()
}

/// Replaces every `{n}` in `template` with `args[n]`.
///
/// Placeholders without a matching argument are left as they are.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let Some(re) = placeholder() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|idx| args.get(idx))
            .map_or_else(|| caps[0].to_string(), |arg| (*arg).to_string())
    })
    .into_owned()
}

/// Unwraps a metadata label reference (`{i18n>bookTitle}` -> `bookTitle`).
///
/// Plain labels pass through untouched.
#[must_use]
pub fn label_key(label: &str) -> &str {
    label
        .strip_prefix("{i18n>")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(label)
}

/// Source of user-facing messages.
pub trait TextBundle: Send + Sync {
    /// Looks up `key` and substitutes the positional arguments.
    fn get_text(&self, key: &str, args: &[&str]) -> String;
}

/// Map-backed text bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Texts {
    entries: HashMap<String, String>,
}

impl Texts {
    /// Creates an empty bundle. Every lookup falls back to its key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bundle holding the built-in English validation messages.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with(READ_ONLY_KEY, "Field {0} is read-only")
            .with(REQUIRED_KEY, "Field {0} is required")
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(key, text);
        self
    }

    /// Adds or replaces an entry in place.
    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), text.into());
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the bundle holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TextBundle for Texts {
    fn get_text(&self, key: &str, args: &[&str]) -> String {
        let template = self.entries.get(key).map_or(key, String::as_str);
        format_message(template, args)
    }
}
