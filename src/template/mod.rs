//! CloudFormation templates and the parameters sent with them.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::application::{PropertyMap, property_to_string};
use crate::config::expand_tilde;
use crate::error::TemplateError;
use crate::provider::StackParameter;

/// Stack-info key naming the template file.
pub const TEMPLATE_KEY: &str = "template";

/// A JSON CloudFormation template read from disk.
#[derive(Debug, Clone)]
pub struct CfnTemplate {
    path: PathBuf,
    body: String,
    json: Value,
}

impl CfnTemplate {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = expand_tilde(path.as_ref());
        let body = fs::read_to_string(&path).map_err(|source| TemplateError::NotFound {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_body(path, body)
    }

    pub fn from_body(path: impl Into<PathBuf>, body: impl Into<String>) -> Result<Self, TemplateError> {
        let path = path.into();
        let body = body.into();
        let json = serde_json::from_str(&body).map_err(|source| TemplateError::Invalid {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { path, body, json })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw template text, sent as is to the provider.
    pub fn body(&self) -> &str {
        &self.body
    }

    fn keys(&self, section: &str) -> Vec<&str> {
        self.json
            .get(section)
            .and_then(Value::as_object)
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Declared parameter names; empty when the template has none.
    pub fn parameters(&self) -> Vec<&str> {
        self.keys("Parameters")
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.json
            .get("Parameters")
            .and_then(Value::as_object)
            .is_some_and(|map| map.contains_key(name))
    }

    pub fn resources(&self) -> Vec<&str> {
        self.keys("Resources")
    }

    pub fn outputs(&self) -> Vec<&str> {
        self.keys("Outputs")
    }

    pub fn description(&self) -> Option<&str> {
        self.json.get("Description").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.json.get("AWSTemplateFormatVersion").and_then(Value::as_str)
    }
}

impl fmt::Display for CfnTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<CfnTemplate[{}] {} from {}>",
            self.version().unwrap_or("-"),
            self.description().unwrap_or("-"),
            self.path.display()
        )
    }
}

/// Stack-info entries that the template declares as parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfnParameters {
    parameters: Vec<StackParameter>,
}

impl CfnParameters {
    pub fn from_stack_info(template: &CfnTemplate, stack_info: &PropertyMap) -> Self {
        let parameters = stack_info
            .iter()
            .filter(|(key, _)| template.has_parameter(key))
            .map(|(key, value)| StackParameter::new(key.clone(), property_to_string(value)))
            .collect();
        Self { parameters }
    }

    pub fn as_slice(&self) -> &[StackParameter] {
        &self.parameters
    }

    pub fn into_vec(self) -> Vec<StackParameter> {
        self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl fmt::Display for CfnParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!(" {} = {}", p.parameter_key, p.parameter_value))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Template file for a stack: the explicit override when given, otherwise the
/// stack's `template` property, relative to `template_dir`.
pub fn resolve_template_path(
    template_dir: &Path,
    override_name: Option<&str>,
    stack_info: &PropertyMap,
) -> Result<PathBuf, TemplateError> {
    let name = match override_name {
        Some(name) => name.to_string(),
        None => stack_info
            .get(TEMPLATE_KEY)
            .map(property_to_string)
            .filter(|name| !name.is_empty())
            .ok_or(TemplateError::Unspecified)?,
    };
    Ok(expand_tilde(template_dir).join(expand_tilde(Path::new(&name))))
}
