//! Host metadata consumed by the engine.
//!
//! The host describes each entity once: its qualified name, key fields and
//! ordered elements. Elements carry the annotations the engine reads: where the
//! control value is bound, the "mandatory" flag and the label key.

use serde::{Deserialize, Serialize};

/// Suffix of conventional control-value bindings.
pub const CONTROL_SUFFIX: &str = "_fc";

/// Returns the conventional binding of `field` (`<field>_fc`).
#[must_use]
pub fn conventional_path(field: &str) -> String {
    format!("{field}{CONTROL_SUFFIX}")
}

/// Kind of an entity element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    /// Plain attribute stored under its own name.
    #[default]
    Attribute,
    /// Managed to-one relationship stored in generated foreign keys.
    #[serde(rename_all = "camelCase")]
    Association {
        /// Generated foreign key attributes, in declared order.
        foreign_keys: Vec<String>,
    },
    /// Contained child records.
    Composition,
}

/// One element of an entity definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    /// Element name.
    pub name: String,
    /// Element kind.
    #[serde(default)]
    pub kind: ElementKind,
    /// Explicit control-value binding path (`@Common.FieldControl: { '=': path }`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_path: Option<String>,
    /// Static "mandatory" flag.
    #[serde(default)]
    pub mandatory: bool,
    /// Label key, plain or `{i18n>key}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Virtual (not persisted) element.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

impl ElementDefinition {
    fn with_kind(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
            control_path: None,
            mandatory: false,
            label: None,
            is_virtual: false,
        }
    }

    /// Creates a plain attribute.
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::with_kind(name, ElementKind::Attribute)
    }

    /// Creates a managed association stored in `foreign_keys`.
    #[must_use]
    pub fn association<I, S>(name: impl Into<String>, foreign_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(
            name,
            ElementKind::Association {
                foreign_keys: foreign_keys.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Creates a composition.
    #[must_use]
    pub fn composition(name: impl Into<String>) -> Self {
        Self::with_kind(name, ElementKind::Composition)
    }

    /// Binds the control value to an explicit path.
    #[must_use]
    pub fn controlled_by(mut self, path: impl Into<String>) -> Self {
        self.control_path = Some(path.into());
        self
    }

    /// Marks the element as mandatory.
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Sets the label key.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the element as virtual.
    #[must_use]
    pub fn virtual_element(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Returns true for associations and compositions.
    #[must_use]
    pub const fn is_relationship(&self) -> bool {
        matches!(self.kind, ElementKind::Association { .. } | ElementKind::Composition)
    }

    /// Returns the attribute a write to this element lands in.
    ///
    /// Associations write to their first generated foreign key.
    #[must_use]
    pub fn storage_field(&self) -> &str {
        match &self.kind {
            ElementKind::Association { foreign_keys } => {
                foreign_keys.first().map_or(self.name.as_str(), String::as_str)
            }
            ElementKind::Attribute | ElementKind::Composition => &self.name,
        }
    }
}

/// Definition of an entity type as provided by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    /// Qualified name (`CatalogService.Books`).
    pub name: String,
    /// Key element names.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Elements in declared order.
    #[serde(default)]
    pub elements: Vec<ElementDefinition>,
}

impl EntityDefinition {
    /// Creates a definition without elements.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Adds a key attribute.
    #[must_use]
    pub fn key(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.elements.push(ElementDefinition::attribute(name.clone()));
        self.keys.push(name);
        self
    }

    /// Adds an element.
    #[must_use]
    pub fn element(mut self, element: ElementDefinition) -> Self {
        self.elements.push(element);
        self
    }

    /// Returns the unqualified name (last `.` segment).
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Looks up an element by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ElementDefinition> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Where a governed field's control value is written, plus what the validator
/// and eraser need to know about the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    /// Governed field.
    pub field: String,
    /// Output path of the control value.
    pub path: String,
    /// True when the path comes from metadata rather than convention.
    pub explicit: bool,
    /// Static "mandatory" flag of the field.
    pub mandatory: bool,
    /// Label key for messages.
    pub label: Option<String>,
    /// Attribute erased when the field is locked.
    pub storage_field: String,
}

impl FieldBinding {
    pub(crate) fn from_element(element: &ElementDefinition, governed: bool) -> Option<Self> {
        let (path, explicit) = match &element.control_path {
            Some(path) => (path.clone(), true),
            None if governed || element.mandatory => (conventional_path(&element.name), false),
            None => return None,
        };
        Some(Self {
            field: element.name.clone(),
            path,
            explicit,
            mandatory: element.mandatory,
            label: element.label.clone(),
            storage_field: element.storage_field().to_string(),
        })
    }

    pub(crate) fn conventional(field: &str) -> Self {
        Self {
            field: field.to_string(),
            path: conventional_path(field),
            explicit: false,
            mandatory: false,
            label: None,
            storage_field: field.to_string(),
        }
    }
}
