//! Control levels.
//!
//! A control level classifies a field's visibility and editability. The numeric
//! values follow the OData `Common.FieldControlType` vocabulary and the ordering
//! carries meaning: `>= Optional` is editable, `<= ReadOnly` is locked.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Visibility/editability classification of a field.
///
/// # Examples
///
/// ```
/// use fieldctl::ControlLevel;
///
/// assert!(ControlLevel::Hidden < ControlLevel::ReadOnly);
/// assert!(ControlLevel::Mandatory.is_editable());
/// assert!(ControlLevel::ReadOnly.is_locked());
/// assert_eq!(ControlLevel::Optional.value(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ControlLevel {
    /// Not visible.
    Hidden = 0,
    /// Visible, not editable.
    ReadOnly = 1,
    /// Visible, editable, not required.
    Optional = 3,
    /// Visible, editable, required.
    Mandatory = 7,
}

impl ControlLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [Self::Hidden, Self::ReadOnly, Self::Optional, Self::Mandatory];

    /// Returns the numeric value written into records.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Maps a numeric value back to a level.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Hidden),
            1 => Some(Self::ReadOnly),
            3 => Some(Self::Optional),
            7 => Some(Self::Mandatory),
            _ => None,
        }
    }

    /// Reads a level from a JSON value.
    ///
    /// Accepts any JSON number with an exact level value (`3` and `3.0` both
    /// map to `Optional`). Anything else yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let n = value.as_f64()?;
        if n.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&n) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self::from_u8(n as u8)
    }

    /// Returns true for levels that allow editing (`>= Optional`).
    #[must_use]
    pub fn is_editable(self) -> bool {
        self >= Self::Optional
    }

    /// Returns true for levels that forbid editing (`<= ReadOnly`).
    #[must_use]
    pub fn is_locked(self) -> bool {
        self <= Self::ReadOnly
    }

    /// Returns a human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hidden => "Hidden",
            Self::ReadOnly => "ReadOnly",
            Self::Optional => "Optional",
            Self::Mandatory => "Mandatory",
        }
    }
}

impl Default for ControlLevel {
    fn default() -> Self {
        Self::ReadOnly
    }
}

impl fmt::Display for ControlLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.value())
    }
}

impl From<ControlLevel> for Value {
    fn from(level: ControlLevel) -> Self {
        Self::from(level.value())
    }
}

impl Serialize for ControlLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for ControlLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid control level {raw}")))
    }
}
