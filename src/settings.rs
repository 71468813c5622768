//! Entity-level settings and policy switches.
//!
//! Settings are merged from layers in precedence order: library default, global
//! setting, per-entity annotation, explicit call-site override. Later layers win;
//! `useImpl` maps merge key by key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::record::Record;

/// Annotation prefix carrying settings in host metadata.
pub const ANNOTATION_PREFIX: &str = "@FCSettings";

/// What to do with a rule whose field is missing from the entity metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownFieldPolicy {
    /// Ignore the rule.
    #[default]
    Skip,
    /// Compute it anyway, writing to the conventional `<field>_fc` binding.
    DefaultBinding,
}

/// Which record state an update's changeset is validated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationBaseline {
    /// The stored record as the editor saw it.
    #[default]
    PreImage,
    /// The pre-image, then additionally the record merged with the changeset.
    PreImageAndMerged,
}

/// How the metadata "mandatory" flag interacts with resolvers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MandatoryFlagPolicy {
    /// The flag replaces the ReadOnly default of fields without a resolver.
    #[default]
    Seed,
    /// The flag forces Mandatory whatever the resolver says.
    Override,
}

/// Policy switches for behaviors that differ between deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldControlPolicy {
    /// Unknown-field handling.
    pub unknown_field: UnknownFieldPolicy,
    /// Update validation baseline.
    pub validation_baseline: ValidationBaseline,
    /// Mandatory flag handling.
    pub mandatory_flag: MandatoryFlagPolicy,
}

/// Effective settings of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySettings {
    /// Null out edits of locked fields before saving.
    pub auto_erase: bool,
    /// Report validation errors on the request.
    pub live_validations: bool,
    /// Association name to delegated configuration key.
    pub use_impl: BTreeMap<String, String>,
    /// Policy switches.
    pub policy: FieldControlPolicy,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            auto_erase: true,
            live_validations: true,
            use_impl: BTreeMap::new(),
            policy: FieldControlPolicy::default(),
        }
    }
}

impl EntitySettings {
    /// Resolves settings from the library default and `layers`, in order.
    #[must_use]
    pub fn resolve<'a>(layers: impl IntoIterator<Item = &'a SettingsLayer>) -> Self {
        let mut settings = Self::default();
        for layer in layers {
            settings.apply(layer);
        }
        settings
    }

    /// Applies one layer on top of the current values.
    pub fn apply(&mut self, layer: &SettingsLayer) {
        if let Some(v) = layer.auto_erase {
            self.auto_erase = v;
        }
        if let Some(v) = layer.live_validations {
            self.live_validations = v;
        }
        for (association, key) in &layer.use_impl {
            self.use_impl.insert(association.clone(), key.clone());
        }
        if let Some(v) = layer.unknown_field {
            self.policy.unknown_field = v;
        }
        if let Some(v) = layer.validation_baseline {
            self.policy.validation_baseline = v;
        }
        if let Some(v) = layer.mandatory_flag {
            self.policy.mandatory_flag = v;
        }
    }
}

/// A partial set of settings. Unset values defer to earlier layers.
///
/// Deserializes from camelCase JSON, e.g.
/// `{"autoErase": false, "useImpl": {"author": "Authors"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsLayer {
    /// Overrides `auto_erase`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_erase: Option<bool>,
    /// Overrides `live_validations`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_validations: Option<bool>,
    /// Adds or replaces association delegations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub use_impl: BTreeMap<String, String>,
    /// Overrides the unknown-field policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_field: Option<UnknownFieldPolicy>,
    /// Overrides the validation baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_baseline: Option<ValidationBaseline>,
    /// Overrides the mandatory flag policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mandatory_flag: Option<MandatoryFlagPolicy>,
    /// Location of the entity's rule module, for the external loader.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SettingsLayer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the layer sets nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sets `auto_erase`.
    #[must_use]
    pub fn auto_erase(mut self, value: bool) -> Self {
        self.auto_erase = Some(value);
        self
    }

    /// Sets `live_validations`.
    #[must_use]
    pub fn live_validations(mut self, value: bool) -> Self {
        self.live_validations = Some(value);
        self
    }

    /// Delegates `association` to the configuration registered as `key`.
    #[must_use]
    pub fn use_impl(mut self, association: impl Into<String>, key: impl Into<String>) -> Self {
        self.use_impl.insert(association.into(), key.into());
        self
    }

    /// Sets the unknown-field policy.
    #[must_use]
    pub fn unknown_field(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_field = Some(policy);
        self
    }

    /// Sets the validation baseline.
    #[must_use]
    pub fn validation_baseline(mut self, baseline: ValidationBaseline) -> Self {
        self.validation_baseline = Some(baseline);
        self
    }

    /// Sets the mandatory flag policy.
    #[must_use]
    pub fn mandatory_flag(mut self, policy: MandatoryFlagPolicy) -> Self {
        self.mandatory_flag = Some(policy);
        self
    }

    /// Reads a layer from host annotations.
    ///
    /// Accepts an `@FCSettings` object as well as flat `@FCSettings.a.b` keys;
    /// flat keys are expanded into nested objects and win over the object form.
    /// Returns `Ok(None)` when the annotations carry no settings at all.
    pub fn from_annotations(annotations: &Record) -> Result<Option<Self>, ConfigError> {
        let mut nested = Map::new();
        if let Some(Value::Object(whole)) = annotations.get(ANNOTATION_PREFIX) {
            nested.extend(whole.clone());
        }

        let flat_prefix = format!("{ANNOTATION_PREFIX}.");
        for (key, value) in annotations {
            let Some(path) = key.strip_prefix(&flat_prefix) else {
                continue;
            };
            insert_nested(&mut nested, path, value.clone());
        }

        if nested.is_empty() {
            return Ok(None);
        }

        serde_json::from_value(Value::Object(nested))
            .map(Some)
            .map_err(|e| ConfigError::InvalidSettings {
                reason: e.to_string(),
            })
    }
}

fn insert_nested(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_nested(inner, rest, value);
            }
        }
    }
}
