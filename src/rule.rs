//! Field rules and entity configurations.
//!
//! An [`EntityConfiguration`] is the Rust form of one entity's rule module: a
//! field name to [`FieldRule`] mapping plus entity-level hooks and settings.
//! It is built once by the external loader and never mutated afterwards.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::CalculationContext;
use crate::error::RuleError;
use crate::level::ControlLevel;
use crate::record::Record;
use crate::settings::SettingsLayer;
use crate::text::TextBundle;

/// Computes a field's control level. `Ok(None)` leaves the output untouched.
pub type ResolveFn =
    Arc<dyn Fn(&Record, &mut CalculationContext) -> Result<Option<ControlLevel>, RuleError> + Send + Sync>;

/// Checks a proposed value. `Ok(Some(message))` is a violation.
pub type ValidateFn =
    Arc<dyn Fn(&Value, &ValidatorHelper<'_>) -> Result<Option<String>, RuleError> + Send + Sync>;

/// Side-effecting callback run before persistence with the merged record and the changeset.
pub type BeforeSaveFn =
    Arc<dyn Fn(&Record, &mut Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync>;

/// Hook run on a record before its field resolvers.
pub type BeforeCalculateFn =
    Arc<dyn Fn(&mut Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync>;

/// Hook run after persistence with the merged record.
pub type AfterSaveFn = Arc<dyn Fn(&Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync>;

/// What a validator sees besides the new value.
pub struct ValidatorHelper<'a> {
    /// The record whose control values were resolved.
    pub entity: &'a Record,
    texts: &'a dyn TextBundle,
}

impl<'a> ValidatorHelper<'a> {
    pub(crate) fn new(entity: &'a Record, texts: &'a dyn TextBundle) -> Self {
        Self { entity, texts }
    }

    /// Looks up a localized message.
    #[must_use]
    pub fn get_text(&self, key: &str, args: &[&str]) -> String {
        self.texts.get_text(key, args)
    }
}

/// Rule set of a single field.
///
/// # Example
/// ```
/// use fieldctl::{ControlLevel, FieldRule};
///
/// let rule = FieldRule::new()
///     .resolve(|book, _ctx| {
///         let enabled = book.get("enableDetails").and_then(|v| v.as_bool()).unwrap_or(false);
///         Ok(Some(if enabled { ControlLevel::Mandatory } else { ControlLevel::Hidden }))
///     })
///     .validate(|value, helper| {
///         let short = value.as_str().map_or(true, |s| s.len() < 10);
///         Ok(short.then(|| helper.get_text("book.validation.title.minLength", &[])))
///     });
/// assert!(rule.has_resolver());
/// ```
#[derive(Clone, Default)]
pub struct FieldRule {
    resolve: Option<ResolveFn>,
    validate: Option<ValidateFn>,
    before_save: Option<BeforeSaveFn>,
}

impl FieldRule {
    /// Creates an empty rule. Without a resolver the field is ReadOnly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the control level resolver.
    #[must_use]
    pub fn resolve<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &mut CalculationContext) -> Result<Option<ControlLevel>, RuleError> + Send + Sync + 'static,
    {
        self.resolve = Some(Arc::new(f));
        self
    }

    /// Sets a resolver that always yields `level`.
    #[must_use]
    pub fn fixed(self, level: ControlLevel) -> Self {
        self.resolve(move |_, _| Ok(Some(level)))
    }

    /// Sets the value validator.
    #[must_use]
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &ValidatorHelper<'_>) -> Result<Option<String>, RuleError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Sets the before-save callback.
    #[must_use]
    pub fn before_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &mut Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        self.before_save = Some(Arc::new(f));
        self
    }

    /// Returns true if a resolver is configured.
    #[must_use]
    pub fn has_resolver(&self) -> bool {
        self.resolve.is_some()
    }

    pub(crate) fn resolver(&self) -> Option<&ResolveFn> {
        self.resolve.as_ref()
    }

    pub(crate) fn validator(&self) -> Option<&ValidateFn> {
        self.validate.as_ref()
    }

    pub(crate) fn before_save_hook(&self) -> Option<&BeforeSaveFn> {
        self.before_save.as_ref()
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("resolve", &self.resolve.is_some())
            .field("validate", &self.validate.is_some())
            .field("before_save", &self.before_save.is_some())
            .finish()
    }
}

/// Rules and hooks of one entity type.
#[derive(Clone, Default)]
pub struct EntityConfiguration {
    rules: Vec<(String, FieldRule)>,
    on_before_calculate: Option<BeforeCalculateFn>,
    on_before_save: Option<BeforeSaveFn>,
    on_after_save: Option<AfterSaveFn>,
    settings: SettingsLayer,
}

impl EntityConfiguration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the rule for `field`, replacing an earlier one in place.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        let field = field.into();
        match self.rules.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = rule,
            None => self.rules.push((field, rule)),
        }
        self
    }

    /// Sets the hook run before each record's field resolvers.
    #[must_use]
    pub fn on_before_calculate<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        self.on_before_calculate = Some(Arc::new(f));
        self
    }

    /// Sets the entity-level before-save hook.
    #[must_use]
    pub fn on_before_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &mut Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        self.on_before_save = Some(Arc::new(f));
        self
    }

    /// Sets the entity-level after-save hook.
    #[must_use]
    pub fn on_after_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &mut CalculationContext) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        self.on_after_save = Some(Arc::new(f));
        self
    }

    /// Sets the entity-level settings layer (annotation level).
    #[must_use]
    pub fn settings(mut self, settings: SettingsLayer) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the rule of `field`.
    #[must_use]
    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.rules
            .iter()
            .find_map(|(name, rule)| (name == field).then_some(rule))
    }

    /// Iterates rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    /// Returns the entity-level settings layer.
    #[must_use]
    pub fn settings_layer(&self) -> &SettingsLayer {
        &self.settings
    }

    pub(crate) fn before_calculate_hook(&self) -> Option<&BeforeCalculateFn> {
        self.on_before_calculate.as_ref()
    }

    pub(crate) fn before_save_hook(&self) -> Option<&BeforeSaveFn> {
        self.on_before_save.as_ref()
    }

    pub(crate) fn after_save_hook(&self) -> Option<&AfterSaveFn> {
        self.on_after_save.as_ref()
    }
}

impl fmt::Debug for EntityConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfiguration")
            .field("rules", &self.rules)
            .field("on_before_calculate", &self.on_before_calculate.is_some())
            .field("on_before_save", &self.on_before_save.is_some())
            .field("on_after_save", &self.on_after_save.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
