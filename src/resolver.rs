//! Control value resolution.
//!
//! For every record of a payload the resolver:
//! 1. cascades into associations delegated via `useImpl` and waits for them,
//! 2. runs the entity's `on_before_calculate` hook with a fresh context,
//! 3. evaluates each governed field's resolver and writes the level at the
//!    field's binding path. The first field to populate a path wins.
//!
//! Records are decorated in place; the payload keeps its shape.

use std::borrow::Cow;
use std::collections::HashSet;

use futures::future::{join_all, try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, trace};

use crate::context::CalculationContext;
use crate::error::{FcResult, FieldControlError};
use crate::level::ControlLevel;
use crate::record::{records_mut, set_path, strip_self_prefix, Record};
use crate::registry::{ConfigurationRegistry, FieldControls};
use crate::rule::FieldRule;
use crate::schema::FieldBinding;
use crate::settings::{MandatoryFlagPolicy, SettingsLayer};

/// Computes control levels for records of registered entities.
///
/// A call-site settings layer set with [`with_overrides`](Self::with_overrides)
/// applies to every entity looked up by name, delegates included.
#[derive(Debug, Clone, Copy)]
pub struct ControlValueResolver<'r> {
    registry: &'r ConfigurationRegistry,
    overrides: Option<&'r SettingsLayer>,
}

impl ConfigurationRegistry {
    /// Returns a resolver reading from this registry.
    #[must_use]
    pub fn resolver(&self) -> ControlValueResolver<'_> {
        ControlValueResolver::new(self)
    }
}

impl<'r> ControlValueResolver<'r> {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub const fn new(registry: &'r ConfigurationRegistry) -> Self {
        Self {
            registry,
            overrides: None,
        }
    }

    /// Applies `overrides` on top of each looked-up entity's settings.
    #[must_use]
    pub const fn with_overrides(self, overrides: &'r SettingsLayer) -> Self {
        Self {
            registry: self.registry,
            overrides: Some(overrides),
        }
    }

    fn lookup(&self, name: &str) -> FcResult<Cow<'r, FieldControls>> {
        let controls: &'r FieldControls = self.registry.controls(name)?;
        Ok(match self.overrides {
            Some(overrides) => controls.with_overrides(overrides),
            None => Cow::Borrowed(controls),
        })
    }

    /// Decorates `payload` with the control levels of `entity`.
    ///
    /// `payload` may be `null` (no-op), one record, or an array of records.
    /// Callback failures abort the call; decorations already written stay.
    pub async fn calculate_field_controls(&self, entity: &str, payload: &mut Value) -> FcResult<()> {
        let controls = self.lookup(entity)?;
        self.calculate(&controls, payload).await
    }

    /// Like [`calculate_field_controls`](Self::calculate_field_controls) for an already resolved engine instance.
    ///
    /// `controls` is used as given; scope it with [`FieldControls::with_overrides`] first.
    pub async fn calculate_with(&self, controls: &FieldControls, payload: &mut Value) -> FcResult<()> {
        self.calculate(controls, payload).await
    }

    /// Decorates a single record.
    pub async fn calculate_record(&self, controls: &FieldControls, record: &mut Record) -> FcResult<()> {
        let mut context = CalculationContext::new();

        self.cascade(controls, record, &mut context).await?;

        if let Some(hook) = controls.configuration().before_calculate_hook() {
            hook(record, &mut context)
                .map_err(|e| FieldControlError::hook(&controls.definition().name, "on_before_calculate", e))?;
        }

        let levels = resolve_levels(controls, record, &mut context)?;
        for (path, level) in levels {
            set_path(record, &path, level.into());
        }
        Ok(())
    }

    fn calculate<'a>(&'a self, controls: &'a FieldControls, payload: &'a mut Value) -> BoxFuture<'a, FcResult<()>> {
        async move {
            let records = records_mut(payload);
            if records.is_empty() {
                return Ok(());
            }

            debug!(
                entity = %controls.definition().name,
                records = records.len(),
                "calculating field controls"
            );

            try_join_all(
                records
                    .into_iter()
                    .map(|record| self.calculate_record(controls, record)),
            )
            .await?;
            Ok(())
        }
        .boxed()
    }

    /// Runs delegated resolvers on nested association values.
    ///
    /// Nested values are taken out of the record while they are processed and
    /// put back in place before any failure is reported.
    async fn cascade(
        &self,
        controls: &FieldControls,
        record: &mut Record,
        context: &mut CalculationContext,
    ) -> FcResult<()> {
        let mut delegates = Vec::new();
        for (association, key) in &controls.settings().use_impl {
            if record.get(association.as_str()).map_or(true, Value::is_null) {
                continue;
            }
            delegates.push((association.as_str(), self.lookup(key)?));
        }

        // Every lookup has succeeded before any value leaves the record.
        let mut nested: Vec<(&str, Cow<'r, FieldControls>, Value)> = delegates
            .into_iter()
            .map(|(association, delegate)| {
                let value = record.get_mut(association).map(std::mem::take).unwrap_or_default();
                (association, delegate, value)
            })
            .collect();

        if nested.is_empty() {
            return Ok(());
        }

        trace!(
            entity = %controls.definition().name,
            associations = nested.len(),
            "cascading into associations"
        );

        let results = join_all(
            nested
                .iter_mut()
                .map(|(_, delegate, value)| self.calculate(&**delegate, value)),
        )
        .await;

        for (association, _, value) in nested {
            context.record_cascade(association, value.clone());
            record.insert(association.to_string(), value);
        }

        results.into_iter().collect::<FcResult<Vec<()>>>()?;
        Ok(())
    }
}

/// Evaluates every binding of `controls` against `record`.
///
/// Returns `(path, level)` pairs in binding order, at most one per path.
fn resolve_levels(
    controls: &FieldControls,
    record: &Record,
    context: &mut CalculationContext,
) -> FcResult<Vec<(String, ControlLevel)>> {
    let mut populated: HashSet<&str> = HashSet::new();
    let mut levels = Vec::with_capacity(controls.bindings().len());

    for binding in controls.bindings() {
        let path = strip_self_prefix(&binding.path);
        if populated.contains(path) {
            trace!(field = %binding.field, path = %binding.path, "binding path already populated");
            continue;
        }

        let rule = controls.configuration().rule(&binding.field);
        let Some(level) = field_level(controls, binding, rule, record, context)? else {
            continue;
        };

        trace!(field = %binding.field, path = %binding.path, level = %level, "resolved field control");
        populated.insert(path);
        levels.push((binding.path.clone(), level));
    }

    Ok(levels)
}

fn field_level(
    controls: &FieldControls,
    binding: &FieldBinding,
    rule: Option<&FieldRule>,
    record: &Record,
    context: &mut CalculationContext,
) -> FcResult<Option<ControlLevel>> {
    let resolved = match rule.and_then(FieldRule::resolver) {
        Some(resolve) => resolve(record, context)
            .map_err(|e| FieldControlError::rule(&controls.definition().name, &binding.field, e))?,
        None if binding.mandatory => Some(ControlLevel::Mandatory),
        None => Some(ControlLevel::ReadOnly),
    };

    if binding.mandatory && controls.settings().policy.mandatory_flag == MandatoryFlagPolicy::Override {
        return Ok(Some(ControlLevel::Mandatory));
    }
    Ok(resolved)
}
