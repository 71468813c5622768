//! # fieldctl - Dynamic Field Control for Entity Services
//!
//! fieldctl computes, per entity field, a control level that tells a UI and the
//! service itself whether the field is hidden, read-only, optional or mandatory.
//! Levels are derived from per-field rules registered once at startup and are
//! written into records as `<field>_fc` (or an explicit binding path).
//!
//! ## Core Concepts
//!
//! - **ControlLevel**: ordered `Hidden(0) < ReadOnly(1) < Optional(3) < Mandatory(7)`
//! - **FieldRule**: resolver, validator and before-save callback of one field
//! - **ConfigurationRegistry**: write-once map from entity name to its rules, metadata and settings
//! - **PayloadValidator**: checks a changeset against resolved levels
//! - **LifecycleAdapter**: read / create / update glue driving the engine from a [`Host`]
//!
//! ## Usage
//!
//! ```rust
//! use fieldctl::{ConfigurationRegistry, ControlLevel, EntityConfiguration, EntityDefinition, FieldRule};
//! use serde_json::json;
//!
//! let books = EntityDefinition::new("CatalogService.Books").key("ID");
//! let rules = EntityConfiguration::new().field(
//!     "description",
//!     FieldRule::new().resolve(|book, _ctx| {
//!         let enabled = book.get("enableDetails").and_then(|v| v.as_bool()).unwrap_or(false);
//!         Ok(Some(if enabled { ControlLevel::Mandatory } else { ControlLevel::Hidden }))
//!     }),
//! );
//! let registry = ConfigurationRegistry::builder().register(books, rules)?.build()?;
//!
//! let mut book = json!({"ID": 1, "enableDetails": true});
//! futures::executor::block_on(registry.resolver().calculate_field_controls("Books", &mut book))?;
//! assert_eq!(book["description_fc"], json!(7));
//! # Ok::<(), fieldctl::FieldControlError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod context;
pub mod error;
pub mod level;
pub mod record;
pub mod rule;
pub mod schema;
pub mod settings;
pub mod text;

// Engine
pub mod eraser;
pub mod registry;
pub mod resolver;
pub mod validator;

// Host integration
pub mod lifecycle;

// Re-export primary types at crate root for convenience
pub use context::CalculationContext;
pub use error::{ConfigError, FcResult, FieldControlError, RuleError, StoreError};
pub use level::ControlLevel;
pub use record::{get_path, key_string, merged, set_path, Record};
pub use rule::{EntityConfiguration, FieldRule, ValidatorHelper};
pub use schema::{ElementDefinition, ElementKind, EntityDefinition, FieldBinding};
pub use settings::{
    EntitySettings, FieldControlPolicy, MandatoryFlagPolicy, SettingsLayer, UnknownFieldPolicy,
    ValidationBaseline,
};
pub use text::{TextBundle, Texts};

pub use eraser::erase_unavailable_dynamic_fields;
pub use registry::{ConfigurationRegistry, FieldControls, RegistryBuilder};
pub use resolver::ControlValueResolver;
pub use validator::{validate_payload, PayloadValidator, ValidationError, ValidationReport};

pub use lifecycle::{
    Host, InMemoryHost, LifecycleAdapter, ReportedError, UpdateOutcome, UpdatePhase, UpdateRequest,
    ValidationCheck,
};
