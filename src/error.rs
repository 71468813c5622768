//! Error types for fieldctl.
//!
//! Validation violations are *not* errors: they are collected as data in a
//! [`ValidationReport`](crate::validator::ValidationReport). The types here cover
//! the failures that abort an operation: broken callbacks, bad registrations and
//! host persistence problems.

use thiserror::Error;

use crate::lifecycle::ReportedError;

/// Failure raised by a user supplied callback (resolver, validator or hook).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuleError {
    message: String,
}

impl RuleError {
    /// Creates a rule error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Registration and lookup errors of the configuration registry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration already registered for '{key}'")]
    DuplicateRegistration {
        key: String,
    },

    #[error("No configuration registered for '{key}'")]
    UnknownConfiguration {
        key: String,
    },

    #[error("Invalid settings: {reason}")]
    InvalidSettings {
        reason: String,
    },

    #[error("Entity '{entity}' delegates association '{association}' to unregistered configuration '{key}'")]
    UnknownDelegate {
        entity: String,
        association: String,
        key: String,
    },
}

/// Errors reported by the host persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {entity}({key})")]
    NotFound {
        entity: String,
        key: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Top-level error type for fieldctl.
#[derive(Debug, Error)]
pub enum FieldControlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rule for {entity}.{field} failed: {source}")]
    Rule {
        entity: String,
        field: String,
        #[source]
        source: RuleError,
    },

    #[error("Hook {hook} of {entity} failed: {source}")]
    Hook {
        entity: String,
        hook: &'static str,
        #[source]
        source: RuleError,
    },

    #[error("Request rejected with {} field error(s)", .errors.len())]
    Rejected {
        errors: Vec<ReportedError>,
    },
}

impl FieldControlError {
    /// Wraps a callback failure with the entity and field it belongs to.
    #[must_use]
    pub fn rule(entity: impl Into<String>, field: impl Into<String>, source: RuleError) -> Self {
        Self::Rule {
            entity: entity.into(),
            field: field.into(),
            source,
        }
    }

    /// Wraps an entity-level hook failure.
    #[must_use]
    pub fn hook(entity: impl Into<String>, hook: &'static str, source: RuleError) -> Self {
        Self::Hook {
            entity: entity.into(),
            hook,
            source,
        }
    }

    /// Returns true if a user callback (field rule or hook) failed.
    #[must_use]
    pub const fn is_rule(&self) -> bool {
        matches!(self, Self::Rule { .. } | Self::Hook { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a host persistence error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if validation errors rejected the request.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Result type alias for fieldctl operations.
pub type FcResult<T> = Result<T, FieldControlError>;
