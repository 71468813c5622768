//! Lifecycle glue between the host's request handling and the engine.
//!
//! Reads and creates are decorated with control levels. Updates run a fixed
//! sequence of phases:
//!
//! ```text
//! FETCHED -> PRE_CALCULATED -> MERGED_CALCULATED -> VALIDATED -> [ERASED] -> SAVED -> POST_CALCULATED
//! ```
//!
//! Validation never blocks the save on its own. Whether reported errors reject
//! the request is decided by [`Host::should_reject`], before anything is persisted.

mod host;
mod memory;

pub use host::{target_prefix, Host, ReportedError, UpdateRequest, FIELD_ERROR_CODE};
pub use memory::InMemoryHost;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::CalculationContext;
use crate::eraser::erase_unavailable_dynamic_fields;
use crate::error::{FcResult, FieldControlError, StoreError};
use crate::record::{key_string, merged, Record};
use crate::registry::{ConfigurationRegistry, FieldControls};
use crate::settings::ValidationBaseline;
use crate::validator::{PayloadValidator, ValidationError, ValidationReport};

/// Phases an update passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatePhase {
    /// Current record read from the host.
    Fetched,
    /// Control levels computed on the current record.
    PreCalculated,
    /// Control levels computed on the current record merged with the changeset.
    MergedCalculated,
    /// Changeset checked against the computed levels.
    Validated,
    /// Locked fields nulled in the changeset.
    Erased,
    /// Changeset persisted by the host.
    Saved,
    /// Control levels computed on the persisted result.
    PostCalculated,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Decorated persisted record. `None` when the request was rejected.
    pub record: Option<Value>,
    /// Violations found, whether or not they were reported.
    pub violations: ValidationReport,
    /// Changeset fields nulled by erasure.
    pub erased: Vec<String>,
    /// Phases completed.
    pub phases: Vec<UpdatePhase>,
}

impl UpdateOutcome {
    /// Returns true if the update stopped before persistence.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.record.is_none()
    }
}

/// Images computed by [`LifecycleAdapter::validate_with_field_controls`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationCheck {
    /// Current record decorated with its control levels.
    pub current: Record,
    /// Current record merged with the changeset, decorated.
    pub merged: Record,
    /// Violations of the changeset against the merged image.
    pub violations: ValidationReport,
}

/// Drives the engine from host request handlers.
#[derive(Clone)]
pub struct LifecycleAdapter {
    registry: Arc<ConfigurationRegistry>,
    host: Arc<dyn Host>,
}

impl std::fmt::Debug for LifecycleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleAdapter")
            .field("entities", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl LifecycleAdapter {
    /// Creates an adapter over a built registry and a host.
    #[must_use]
    pub fn new(registry: Arc<ConfigurationRegistry>, host: Arc<dyn Host>) -> Self {
        Self { registry, host }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &ConfigurationRegistry {
        &self.registry
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    /// Decorates a read result in place. No validation.
    pub async fn after_read(&self, entity: &str, result: &mut Value) -> FcResult<()> {
        self.registry.resolver().calculate_field_controls(entity, result).await
    }

    /// Decorates a freshly created record in place.
    pub async fn after_create(&self, entity: &str, result: &mut Value) -> FcResult<()> {
        self.registry.resolver().calculate_field_controls(entity, result).await
    }

    /// Runs an update through all phases.
    ///
    /// `request.overrides` applies last to every setting, for this entity and
    /// for the associations it delegates to. Violations are appended to `request.errors` when live validations are on.
    /// Erasure rewrites `request.data` in place.
    pub async fn update(&self, request: &mut UpdateRequest) -> FcResult<UpdateOutcome> {
        let overrides = request.overrides.clone();
        let scoped = self.registry.controls(&request.entity)?.with_overrides(&overrides);
        let controls: &FieldControls = &scoped;
        let definition = controls.definition();
        let settings = controls.settings();
        let resolver = self.registry.resolver().with_overrides(&overrides);
        let mut phases = Vec::with_capacity(7);

        let current = self.fetch(controls, &request.key).await?;
        phases.push(UpdatePhase::Fetched);

        let mut pre_image = current.clone();
        resolver.calculate_record(controls, &mut pre_image).await?;
        phases.push(UpdatePhase::PreCalculated);

        let mut merged_image = merged(&current, &request.data);
        resolver.calculate_record(controls, &mut merged_image).await?;
        phases.push(UpdatePhase::MergedCalculated);

        let validator = PayloadValidator::new(controls, self.host.texts());
        let mut violations = validator.validate_payload(&pre_image, &request.data)?;
        if settings.policy.validation_baseline == ValidationBaseline::PreImageAndMerged {
            violations.merge_unique(validator.validate_payload(&merged_image, &request.data)?);
        }
        phases.push(UpdatePhase::Validated);
        debug!(entity = %definition.name, violations = violations.len(), "validated changeset");

        if settings.live_validations {
            request.report(definition, &violations.errors);
        }
        if self.host.should_reject(&request.errors) {
            info!(
                entity = %definition.name,
                key = %key_string(&request.key),
                errors = request.errors.len(),
                "update rejected"
            );
            return Ok(UpdateOutcome {
                record: None,
                violations,
                erased: Vec::new(),
                phases,
            });
        }

        let erased = if settings.auto_erase {
            let erased = erase_unavailable_dynamic_fields(controls, &merged_image, &mut request.data);
            phases.push(UpdatePhase::Erased);
            erased
        } else {
            Vec::new()
        };

        let mut context = CalculationContext::new();
        run_before_save(controls, &merged_image, &mut request.data, &mut context)?;

        let mut saved = self.host.persist(definition, &request.key, &request.data).await?;
        phases.push(UpdatePhase::Saved);

        if let Some(hook) = controls.configuration().after_save_hook() {
            hook(&merged_image, &mut context)
                .map_err(|e| FieldControlError::hook(&definition.name, "on_after_save", e))?;
        }

        resolver.calculate_with(controls, &mut saved).await?;
        phases.push(UpdatePhase::PostCalculated);
        debug!(entity = %definition.name, erased = erased.len(), "update completed");

        Ok(UpdateOutcome {
            record: Some(saved),
            violations,
            erased,
            phases,
        })
    }

    /// Validates `data` against the current record merged with it.
    ///
    /// Nothing is reported or persisted.
    pub async fn validate_with_field_controls(
        &self,
        entity: &str,
        key: &Record,
        data: &Record,
    ) -> FcResult<ValidationCheck> {
        let controls: &FieldControls = self.registry.controls(entity)?;
        let resolver = self.registry.resolver();

        let mut current = self.fetch(controls, key).await?;
        let mut merged_image = merged(&current, data);
        resolver.calculate_record(controls, &mut current).await?;
        resolver.calculate_record(controls, &mut merged_image).await?;

        let violations =
            PayloadValidator::new(controls, self.host.texts()).validate_payload(&merged_image, data)?;
        Ok(ValidationCheck {
            current,
            merged: merged_image,
            violations,
        })
    }

    /// Appends `violations` to the request's errors.
    pub fn report_errors(&self, request: &mut UpdateRequest, violations: &[ValidationError]) -> FcResult<()> {
        let controls = self.registry.controls(&request.entity)?;
        request.report(controls.definition(), violations);
        Ok(())
    }

    /// Reports `violations`, then fails if the request carries any error.
    pub fn ensure_no_errors(&self, request: &mut UpdateRequest, violations: &[ValidationError]) -> FcResult<()> {
        self.report_errors(request, violations)?;
        if request.errors.is_empty() {
            return Ok(());
        }
        Err(FieldControlError::Rejected {
            errors: request.errors.clone(),
        })
    }

    async fn fetch(&self, controls: &FieldControls, key: &Record) -> FcResult<Record> {
        let definition = controls.definition();
        match self.host.read_current(definition, key).await? {
            Some(record) => Ok(record),
            None => {
                warn!(entity = %definition.name, key = %key_string(key), "no current record");
                Err(StoreError::NotFound {
                    entity: definition.name.clone(),
                    key: key_string(key),
                }
                .into())
            }
        }
    }
}

/// Runs field before-save callbacks in rule order, then the entity hook.
fn run_before_save(
    controls: &FieldControls,
    merged_image: &Record,
    changeset: &mut Record,
    context: &mut CalculationContext,
) -> FcResult<()> {
    let entity = &controls.definition().name;
    for (field, rule) in controls.configuration().rules() {
        if let Some(callback) = rule.before_save_hook() {
            callback(merged_image, changeset, context).map_err(|e| FieldControlError::rule(entity, field, e))?;
        }
    }
    if let Some(hook) = controls.configuration().before_save_hook() {
        hook(merged_image, changeset, context).map_err(|e| FieldControlError::hook(entity, "on_before_save", e))?;
    }
    Ok(())
}
