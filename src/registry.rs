//! Configuration registry.
//!
//! The registry is filled once at startup through [`RegistryBuilder`] and is
//! immutable afterwards, so request-time reads need no locking. Each entry is a
//! [`FieldControls`] engine instance keyed by a stable entity name.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigError;
use crate::rule::EntityConfiguration;
use crate::schema::{EntityDefinition, FieldBinding};
use crate::settings::{EntitySettings, SettingsLayer, UnknownFieldPolicy};

/// Normalizes a registry key: qualified names resolve to their last segment.
fn registry_key(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Engine instance of one entity type: metadata, rules, effective settings
/// and the precomputed field bindings.
#[derive(Debug, Clone)]
pub struct FieldControls {
    definition: EntityDefinition,
    configuration: EntityConfiguration,
    base_layers: Vec<SettingsLayer>,
    settings: EntitySettings,
    bindings: Vec<FieldBinding>,
}

impl FieldControls {
    /// Builds the engine instance, merging `global` under the entity's own layer.
    #[must_use]
    pub fn new(
        definition: EntityDefinition,
        configuration: EntityConfiguration,
        global: &SettingsLayer,
    ) -> Self {
        let base_layers = vec![global.clone(), configuration.settings_layer().clone()];
        let settings = EntitySettings::resolve(&base_layers);
        let bindings = derive_bindings(&definition, &configuration, settings.policy.unknown_field);
        Self {
            definition,
            configuration,
            base_layers,
            settings,
            bindings,
        }
    }

    /// Returns the host metadata.
    #[must_use]
    pub fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    /// Returns the rule configuration.
    #[must_use]
    pub fn configuration(&self) -> &EntityConfiguration {
        &self.configuration
    }

    /// Returns the settings without call-site overrides.
    #[must_use]
    pub fn settings(&self) -> &EntitySettings {
        &self.settings
    }

    /// Returns the settings with a call-site override layer applied last.
    #[must_use]
    pub fn settings_with(&self, overrides: &SettingsLayer) -> EntitySettings {
        EntitySettings::resolve(self.base_layers.iter().chain(std::iter::once(overrides)))
    }

    /// Returns this instance seen through a call-site settings layer.
    ///
    /// The layer applies last. Settings and, when the unknown-field policy
    /// changes, bindings are derived again. An empty layer borrows `self`.
    #[must_use]
    pub fn with_overrides(&self, overrides: &SettingsLayer) -> Cow<'_, Self> {
        if overrides.is_empty() {
            return Cow::Borrowed(self);
        }

        let settings = self.settings_with(overrides);
        let mut base_layers = self.base_layers.clone();
        base_layers.push(overrides.clone());
        let bindings = if settings.policy.unknown_field == self.settings.policy.unknown_field {
            self.bindings.clone()
        } else {
            derive_bindings(&self.definition, &self.configuration, settings.policy.unknown_field)
        };

        Cow::Owned(Self {
            definition: self.definition.clone(),
            configuration: self.configuration.clone(),
            base_layers,
            settings,
            bindings,
        })
    }

    /// Returns the governed fields' bindings in evaluation order.
    #[must_use]
    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Returns the binding of `field`.
    #[must_use]
    pub fn binding(&self, field: &str) -> Option<&FieldBinding> {
        self.bindings.iter().find(|b| b.field == field)
    }
}

/// Derives bindings: metadata elements in declared order, then rules for
/// fields unknown to the metadata when the policy keeps them.
fn derive_bindings(
    definition: &EntityDefinition,
    configuration: &EntityConfiguration,
    unknown_field: UnknownFieldPolicy,
) -> Vec<FieldBinding> {
    let mut bindings: Vec<FieldBinding> = definition
        .elements
        .iter()
        .filter_map(|element| {
            let governed = configuration.rule(&element.name).is_some();
            FieldBinding::from_element(element, governed)
        })
        .collect();

    for (field, _) in configuration.rules() {
        if definition.get(field).is_some() {
            continue;
        }
        match unknown_field {
            UnknownFieldPolicy::Skip => {
                debug!(entity = %definition.name, field = %field, "skipping rule for unknown field");
            }
            UnknownFieldPolicy::DefaultBinding => bindings.push(FieldBinding::conventional(field)),
        }
    }

    bindings
}

/// Collects registrations at startup.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    global: SettingsLayer,
    pending: Vec<(String, EntityDefinition, EntityConfiguration)>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global settings layer (applied over library defaults).
    #[must_use]
    pub fn global(mut self, layer: SettingsLayer) -> Self {
        self.global = layer;
        self
    }

    /// Registers an entity under its unqualified name.
    pub fn register(
        self,
        definition: EntityDefinition,
        configuration: EntityConfiguration,
    ) -> Result<Self, ConfigError> {
        let key = definition.short_name().to_string();
        self.register_as(key, definition, configuration)
    }

    /// Registers an entity under an explicit key, e.g. a shared `useImpl` target.
    pub fn register_as(
        mut self,
        key: impl Into<String>,
        definition: EntityDefinition,
        configuration: EntityConfiguration,
    ) -> Result<Self, ConfigError> {
        let key = key.into();
        let key = registry_key(&key).to_string();
        if self.pending.iter().any(|(existing, _, _)| *existing == key) {
            return Err(ConfigError::DuplicateRegistration { key });
        }
        self.pending.push((key, definition, configuration));
        Ok(self)
    }

    /// Freezes the registry, checking that every delegation target exists.
    pub fn build(self) -> Result<ConfigurationRegistry, ConfigError> {
        let mut entries = HashMap::with_capacity(self.pending.len());
        for (key, definition, configuration) in self.pending {
            let controls = FieldControls::new(definition, configuration, &self.global);
            entries.insert(key, Arc::new(controls));
        }

        for (key, controls) in &entries {
            for (association, target) in &controls.settings().use_impl {
                if !entries.contains_key(registry_key(target)) {
                    return Err(ConfigError::UnknownDelegate {
                        entity: key.clone(),
                        association: association.clone(),
                        key: target.clone(),
                    });
                }
            }
        }

        debug!(entities = entries.len(), "field control registry built");
        Ok(ConfigurationRegistry { entries })
    }
}

/// Process-wide, read-only map from entity name to its engine instance.
#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    entries: HashMap<String, Arc<FieldControls>>,
}

impl ConfigurationRegistry {
    /// Starts a registration phase.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up an entity by unqualified or qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<FieldControls>> {
        self.entries.get(registry_key(name))
    }

    /// Like [`get`](Self::get), failing for unregistered names.
    pub fn controls(&self, name: &str) -> Result<&Arc<FieldControls>, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::UnknownConfiguration {
            key: name.to_string(),
        })
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::ControlLevel;
    use crate::rule::FieldRule;
    use crate::schema::ElementDefinition;
    use crate::settings::MandatoryFlagPolicy;

    fn books() -> EntityDefinition {
        EntityDefinition::new("CatalogService.Books")
            .key("ID")
            .element(ElementDefinition::attribute("title"))
            .element(ElementDefinition::attribute("description").controlled_by("desc_control"))
            .element(ElementDefinition::attribute("isbn").mandatory())
            .element(ElementDefinition::attribute("stock"))
    }

    fn books_config() -> EntityConfiguration {
        EntityConfiguration::new()
            .field("title", FieldRule::new().fixed(ControlLevel::Mandatory))
            .field("ghost", FieldRule::new().fixed(ControlLevel::Optional))
    }

    #[test]
    fn test_bindings_follow_metadata_order() {
        let controls = FieldControls::new(books(), books_config(), &SettingsLayer::new());
        let fields: Vec<_> = controls.bindings().iter().map(|b| b.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "description", "isbn"]);
        assert_eq!(controls.binding("description").unwrap().path, "desc_control");
        assert_eq!(controls.binding("title").unwrap().path, "title_fc");
        assert!(controls.binding("stock").is_none());
        assert!(controls.binding("ghost").is_none());
    }

    #[test]
    fn test_unknown_field_default_binding() {
        let config = books_config().settings(
            SettingsLayer::new().unknown_field(UnknownFieldPolicy::DefaultBinding),
        );
        let controls = FieldControls::new(books(), config, &SettingsLayer::new());
        let ghost = controls.binding("ghost").unwrap();
        assert_eq!(ghost.path, "ghost_fc");
        assert_eq!(controls.bindings().last().unwrap().field, "ghost");
    }

    #[test]
    fn test_settings_layers() {
        let global = SettingsLayer::new().auto_erase(false);
        let config = books_config().settings(SettingsLayer::new().live_validations(false));
        let controls = FieldControls::new(books(), config, &global);
        assert!(!controls.settings().auto_erase);
        assert!(!controls.settings().live_validations);

        let overridden = controls.settings_with(&SettingsLayer::new().auto_erase(true));
        assert!(overridden.auto_erase);
        assert!(!overridden.live_validations);
    }

    #[test]
    fn test_with_overrides_rederives_bindings() {
        let controls = FieldControls::new(books(), books_config(), &SettingsLayer::new());
        assert!(matches!(controls.with_overrides(&SettingsLayer::new()), Cow::Borrowed(_)));

        let scoped =
            controls.with_overrides(&SettingsLayer::new().unknown_field(UnknownFieldPolicy::DefaultBinding));
        assert_eq!(scoped.binding("ghost").unwrap().path, "ghost_fc");
        assert!(controls.binding("ghost").is_none());
    }

    #[test]
    fn test_with_overrides_applies_last() {
        let config = books_config().settings(
            SettingsLayer::new()
                .mandatory_flag(MandatoryFlagPolicy::Seed)
                .use_impl("author", "Authors"),
        );
        let controls = FieldControls::new(books(), config, &SettingsLayer::new());
        let scoped = controls.with_overrides(
            &SettingsLayer::new()
                .mandatory_flag(MandatoryFlagPolicy::Override)
                .use_impl("editor", "Editors"),
        );
        assert_eq!(scoped.settings().policy.mandatory_flag, MandatoryFlagPolicy::Override);
        assert_eq!(scoped.settings().use_impl.len(), 2);
        assert_eq!(scoped.bindings(), controls.bindings());
    }

    #[test]
    fn test_registry_lookup_by_qualified_name() {
        let registry = ConfigurationRegistry::builder()
            .register(books(), books_config())
            .unwrap()
            .build()
            .unwrap();
        assert!(registry.contains("Books"));
        assert!(registry.contains("CatalogService.Books"));
        assert!(registry.get("Authors").is_none());
        assert!(matches!(
            registry.controls("Authors"),
            Err(ConfigError::UnknownConfiguration { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration() {
        let result = ConfigurationRegistry::builder()
            .register(books(), books_config())
            .unwrap()
            .register_as("Books", books(), EntityConfiguration::new());
        assert!(matches!(result, Err(ConfigError::DuplicateRegistration { .. })));
    }

    #[test]
    fn test_unknown_delegate_rejected() {
        let config = books_config().settings(SettingsLayer::new().use_impl("author", "Authors"));
        let result = ConfigurationRegistry::builder()
            .register(books(), config)
            .unwrap()
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownDelegate { .. })));
    }
}
