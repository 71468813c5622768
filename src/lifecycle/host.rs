//! Host collaborator contract and request-facing types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::record::{key_string, Record};
use crate::schema::EntityDefinition;
use crate::settings::SettingsLayer;
use crate::text::TextBundle;
use crate::validator::ValidationError;

/// HTTP-style status used for every reported field error.
pub const FIELD_ERROR_CODE: u16 = 400;

/// Services the host framework provides around an operation.
///
/// Implementations should handle concurrent access safely; one instance
/// serves all requests.
#[async_trait]
pub trait Host: Send + Sync {
    /// Reads the stored record of `entity` identified by `key`.
    async fn read_current(&self, entity: &EntityDefinition, key: &Record) -> Result<Option<Record>, StoreError>;

    /// Persists `changes` for the record identified by `key` and returns the stored result.
    async fn persist(&self, entity: &EntityDefinition, key: &Record, changes: &Record) -> Result<Value, StoreError>;

    /// Text bundle for messages and labels of the current request.
    fn texts(&self) -> &dyn TextBundle;

    /// Decides whether the errors on a request reject it before persistence.
    ///
    /// The default rejects as soon as one error is present.
    fn should_reject(&self, errors: &[ReportedError]) -> bool {
        !errors.is_empty()
    }
}

/// A field error in the shape the host surfaces to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    /// Addressable field path, `<prefix>/<field>`.
    pub target: String,
    /// User-facing message.
    pub message: String,
    /// Same as `message`.
    pub description: String,
    /// Always [`FIELD_ERROR_CODE`].
    pub code: u16,
}

impl ReportedError {
    /// Converts a violation, addressing it under `prefix`.
    #[must_use]
    pub fn from_violation(prefix: &str, violation: &ValidationError) -> Self {
        Self {
            target: format!("{prefix}/{}", violation.field_name),
            message: violation.message.clone(),
            description: violation.message.clone(),
            code: FIELD_ERROR_CODE,
        }
    }
}

/// Builds the addressing prefix `/<EntityName>(<k>=<v>,...)`.
#[must_use]
pub fn target_prefix(definition: &EntityDefinition, key: &Record) -> String {
    format!("/{}({})", definition.short_name(), key_string(key))
}

/// An update as received from the host.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Target entity name.
    pub entity: String,
    /// Key of the updated record.
    pub key: Record,
    /// Proposed changeset. Erasure rewrites it in place.
    pub data: Record,
    /// Errors reported on the request so far.
    pub errors: Vec<ReportedError>,
    /// Explicit addressing prefix for reported errors.
    pub target_prefix: Option<String>,
    /// Call-site settings override, applied last.
    pub overrides: SettingsLayer,
}

impl UpdateRequest {
    /// Creates an update request.
    #[must_use]
    pub fn new(entity: impl Into<String>, key: Record, data: Record) -> Self {
        Self {
            entity: entity.into(),
            key,
            data,
            errors: Vec::new(),
            target_prefix: None,
            overrides: SettingsLayer::default(),
        }
    }

    /// Addresses reported errors under `prefix` instead of the derived one.
    #[must_use]
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = Some(prefix.into());
        self
    }

    /// Applies call-site settings.
    #[must_use]
    pub fn with_overrides(mut self, overrides: SettingsLayer) -> Self {
        self.overrides = overrides;
        self
    }

    /// Appends violations as reported errors.
    pub fn report(&mut self, definition: &EntityDefinition, violations: &[ValidationError]) {
        let prefix = self
            .target_prefix
            .clone()
            .unwrap_or_else(|| target_prefix(definition, &self.key));
        self.errors
            .extend(violations.iter().map(|v| ReportedError::from_violation(&prefix, v)));
    }
}
