//! Payload validation.
//!
//! Checks a changeset against a record whose control levels were resolved.
//! Per changed field, three independent checks run and every one that fires
//! adds an error:
//! - the custom validator, when the field is editable (`>= Optional`),
//! - the read-only check, when the field is locked (`<= ReadOnly`) and the
//!   changeset carries any entry for it, even `null` or `""`,
//! - the required check, when the new value is `null` and the level is Mandatory.
//!
//! Violations are data, never errors. Only a failing validator callback aborts.

use serde::{Deserialize, Serialize};

use crate::error::{FcResult, FieldControlError};
use crate::level::ControlLevel;
use crate::record::{get_path, Record};
use crate::registry::FieldControls;
use crate::rule::ValidatorHelper;
use crate::schema::FieldBinding;
use crate::text::{label_key, TextBundle, READ_ONLY_KEY, REQUIRED_KEY};

/// A field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Violating field.
    pub field_name: String,
    /// User-facing message.
    pub message: String,
}

impl ValidationError {
    /// Creates a violation.
    #[must_use]
    pub fn new(field_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            message: message.into(),
        }
    }
}

/// Ordered violations of one validation pass.
///
/// Order follows the changeset's field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Collected violations.
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Returns true if nothing was violated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns the violations of `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.errors.iter().filter(move |e| e.field_name == field)
    }

    /// Appends violations of `other` that are not already present.
    pub fn merge_unique(&mut self, other: Self) {
        for error in other.errors {
            if !self.errors.contains(&error) {
                self.errors.push(error);
            }
        }
    }
}

/// Validates changesets of one entity type.
pub struct PayloadValidator<'a> {
    controls: &'a FieldControls,
    texts: &'a dyn TextBundle,
}

impl<'a> PayloadValidator<'a> {
    /// Creates a validator using `texts` for messages and labels.
    #[must_use]
    pub fn new(controls: &'a FieldControls, texts: &'a dyn TextBundle) -> Self {
        Self { controls, texts }
    }

    /// Validates `changeset` against the control levels decorated on `resolved`.
    ///
    /// Fields without a binding are not governed and skip all checks. A governed
    /// field whose control value is missing from `resolved` counts as Hidden.
    pub fn validate_payload(&self, resolved: &Record, changeset: &Record) -> FcResult<ValidationReport> {
        let mut report = ValidationReport::default();
        let helper = ValidatorHelper::new(resolved, self.texts);

        for (key, value) in changeset {
            let Some(binding) = self.controls.binding(key) else {
                continue;
            };
            let level = get_path(resolved, &binding.path)
                .and_then(ControlLevel::from_value)
                .unwrap_or(ControlLevel::Hidden);

            let validator = self
                .controls
                .configuration()
                .rule(key)
                .and_then(|rule| rule.validator());
            if let Some(validate) = validator {
                if level.is_editable() {
                    let message = validate(value, &helper).map_err(|e| {
                        FieldControlError::rule(&self.controls.definition().name, key, e)
                    })?;
                    if let Some(message) = message.filter(|m| !m.is_empty()) {
                        report.errors.push(ValidationError::new(key, message));
                    }
                }
            }

            if level.is_locked() {
                let label = self.label(binding);
                report
                    .errors
                    .push(ValidationError::new(key, self.texts.get_text(READ_ONLY_KEY, &[&label])));
            }

            if value.is_null() && level == ControlLevel::Mandatory {
                let label = self.label(binding);
                report
                    .errors
                    .push(ValidationError::new(key, self.texts.get_text(REQUIRED_KEY, &[&label])));
            }
        }

        Ok(report)
    }

    fn label(&self, binding: &FieldBinding) -> String {
        match &binding.label {
            Some(label) => self.texts.get_text(label_key(label), &[]),
            None => binding.field.clone(),
        }
    }
}

/// Convenience wrapper: validates one changeset.
pub fn validate_payload(
    controls: &FieldControls,
    texts: &dyn TextBundle,
    resolved: &Record,
    changeset: &Record,
) -> FcResult<ValidationReport> {
    PayloadValidator::new(controls, texts).validate_payload(resolved, changeset)
}
