//! The set of applications loaded from the settings file.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::definition::{
    ApplicationDefinition, ENVIRONMENTS_KEY, LIVE_KEY, NAME_KEY, PropertyValue, SHORT_NAME_KEY,
};
use super::resolver::MAX_MODEL_DEPTH;
use super::stack_name::short_name_of;
use crate::error::{ApplicationError, AwsToolsError};

#[derive(Debug, Clone)]
struct Entry {
    definition: ApplicationDefinition,
    model: Option<usize>,
}

/// Collection of application definitions.
///
/// Names are not required to be unique: lookups return the first match in
/// load order.
#[derive(Debug, Clone, Default)]
pub struct Applications {
    entries: Vec<Entry>,
}

impl Applications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every document of a multi-document YAML stream.
    ///
    /// Model references are linked and every definition validated before the
    /// collection is returned.
    pub fn load_from_yaml(yaml: &str) -> Result<Self, ApplicationError> {
        let mut definitions = Vec::new();
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let value = serde_yaml::Value::deserialize(document)?;
            definitions.push(ApplicationDefinition::from_yaml(value)?);
        }
        Self::from_definitions(definitions)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AwsToolsError> {
        let content = fs::read_to_string(&path)?;
        let apps = Self::load_from_yaml(&content)?;
        log::debug!(
            "Loaded {} application(s) from {}",
            apps.len(),
            path.as_ref().display()
        );
        Ok(apps)
    }

    pub fn from_definitions(definitions: Vec<ApplicationDefinition>) -> Result<Self, ApplicationError> {
        let mut apps = Self {
            entries: definitions
                .into_iter()
                .map(|definition| Entry {
                    definition,
                    model: None,
                })
                .collect(),
        };
        apps.apply_models()?;
        apps.validate()?;
        Ok(apps)
    }

    /// Link each `model` reference to the first application bearing that name.
    fn apply_models(&mut self) -> Result<(), ApplicationError> {
        for index in 0..self.entries.len() {
            let Some(model_name) = self.entries[index].definition.model_ref() else {
                continue;
            };
            let model = self
                .entries
                .iter()
                .position(|e| own_name(&e.definition) == Some(model_name))
                .ok_or_else(|| {
                    ApplicationError::Invalid(format!("model '{}' is not defined", model_name))
                })?;
            self.entries[index].model = Some(model);
        }

        for start in 0..self.entries.len() {
            let mut seen = vec![false; self.entries.len()];
            let mut current = Some(start);
            while let Some(index) = current {
                if seen[index] {
                    return Err(ApplicationError::Invalid(format!(
                        "cyclic model reference involving '{}'",
                        own_name(&self.entries[start].definition).unwrap_or("<unnamed>")
                    )));
                }
                seen[index] = true;
                current = self.entries[index].model;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        for app in self.iter() {
            for key in [NAME_KEY, SHORT_NAME_KEY, LIVE_KEY] {
                if app.property(key).is_none() {
                    return Err(ApplicationError::Invalid(format!("Missing properties: {}", key)));
                }
            }
            if !app.definition().has_environments() {
                return Err(ApplicationError::Invalid(format!(
                    "Missing properties: {}",
                    ENVIRONMENTS_KEY
                )));
            }
            if app.name().is_empty() || app.short_name().is_empty() {
                return Err(ApplicationError::Invalid(format!(
                    "{} and {} must be non-empty strings",
                    NAME_KEY, SHORT_NAME_KEY
                )));
            }
            if !matches!(app.property(LIVE_KEY), Some(PropertyValue::Bool(_))) {
                return Err(ApplicationError::Invalid(format!(
                    "'{}' of application '{}' must be a boolean",
                    LIVE_KEY,
                    app.name()
                )));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = Application<'_>> {
        (0..self.entries.len()).map(move |index| Application { apps: self, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_by_name(&self, name: &str) -> Result<Application<'_>, ApplicationError> {
        self.iter()
            .find(|app| app.name() == name)
            .ok_or_else(|| ApplicationError::NotFound(format!("no application named '{}'", name)))
    }

    pub fn get_by_short_name(&self, short_name: &str) -> Result<Application<'_>, ApplicationError> {
        self.iter()
            .find(|app| app.short_name() == short_name)
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("no application with short name '{}'", short_name))
            })
    }

    /// Find the application owning a stack, by the stack name's leading token.
    pub fn get_by_stack_name(&self, stack_name: &str) -> Result<Application<'_>, ApplicationError> {
        self.get_by_short_name(short_name_of(stack_name))
    }
}

fn own_name(definition: &ApplicationDefinition) -> Option<&str> {
    definition.property(NAME_KEY).and_then(PropertyValue::as_str)
}

/// A borrowed handle on one application of a collection.
#[derive(Clone, Copy)]
pub struct Application<'a> {
    apps: &'a Applications,
    index: usize,
}

impl<'a> Application<'a> {
    pub fn definition(&self) -> &'a ApplicationDefinition {
        &self.apps.entries[self.index].definition
    }

    /// The model this application inherits from, if any.
    pub fn model(&self) -> Option<Application<'a>> {
        self.apps.entries[self.index].model.map(|index| Application {
            apps: self.apps,
            index,
        })
    }

    /// Look a property up on this application, then along its model chain.
    pub fn property(&self, key: &str) -> Option<&'a PropertyValue> {
        let mut current = Some(*self);
        for _ in 0..=MAX_MODEL_DEPTH {
            let app = current?;
            if let Some(value) = app.definition().property(key) {
                return Some(value);
            }
            current = app.model();
        }
        None
    }

    pub fn name(&self) -> &'a str {
        self.property(NAME_KEY).and_then(PropertyValue::as_str).unwrap_or_default()
    }

    pub fn short_name(&self) -> &'a str {
        self.property(SHORT_NAME_KEY)
            .and_then(PropertyValue::as_str)
            .unwrap_or_default()
    }

    pub fn is_live(&self) -> bool {
        self.property(LIVE_KEY)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    /// Environments declared by this application itself.
    pub fn environments(&self) -> impl Iterator<Item = &'a str> {
        self.definition().environment_names()
    }
}

impl fmt::Debug for Application<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Application {}>", self.name())
    }
}

impl fmt::Display for Application<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.short_name())?;
        if let Some(model) = self.model() {
            write!(f, " model:{}", model.name())?;
        }
        if self.is_live() {
            write!(f, " [live]")?;
        }
        Ok(())
    }
}

impl PartialEq for Application<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.apps, other.apps) && self.index == other.index
    }
}
