//! Application definitions as loaded from the settings file.
//!
//! One YAML document describes one application: a handful of well-known keys
//! (`Application`, `ShortName`, `live`, `model`), an `environments` table and
//! any number of extra properties that end up as stack parameters.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::error::ApplicationError;

/// A single property value. Scalars in practice, but nothing forbids more.
pub type PropertyValue = Value;

/// Flat property map, the output of a resolution.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

pub const NAME_KEY: &str = "Application";
pub const SHORT_NAME_KEY: &str = "ShortName";
pub const LIVE_KEY: &str = "live";
pub const MODEL_KEY: &str = "model";
pub const ENVIRONMENTS_KEY: &str = "environments";
pub const ENVIRONMENT_KEY: &str = "Environment";
pub const TYPE_KEY: &str = "Type";

/// What a pool entry contributes to a resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolOverride {
    /// Declared with `true`: the pool exists but only the model's properties apply.
    InheritOnly,
    /// Properties overlaid on top of the application's own.
    Properties(PropertyMap),
    /// Declared with anything else (`false`, null, a scalar). Selecting it
    /// resolves to no pool at all.
    Disabled,
}

/// Pool table of one environment, in declaration order.
///
/// Keys are either a bare pool name (`node`) or a pool name bound to a set of
/// identifiers (`node[2,3,4]`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolTable {
    entries: Vec<(String, PoolOverride)>,
}

impl PoolTable {
    pub fn new(entries: Vec<(String, PoolOverride)>) -> Self {
        Self { entries }
    }

    /// Exact key lookup (the default entry for a pool).
    pub fn get(&self, key: &str) -> Option<&PoolOverride> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Select the entry for a pool and optional identifier.
    ///
    /// An identifier listed in a `pool[...]` key takes precedence over the bare
    /// `pool` entry. When several id-lists contain the identifier, the first one
    /// in declaration order wins.
    pub fn select(&self, pool: &str, identifier: Option<&str>) -> Option<&PoolOverride> {
        let default = self.get(pool);
        let Some(identifier) = identifier else {
            return default;
        };

        self.entries
            .iter()
            .find(|(key, _)| {
                pattern_identifiers(key, pool)
                    .is_some_and(|ids| ids.iter().any(|id| *id == identifier))
            })
            .map(|(_, value)| value)
            .or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PoolOverride)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identifiers bound by a `pool[id1,id2]` key, or None when the key is not a
/// pattern for `pool`.
pub fn pattern_identifiers<'k>(key: &'k str, pool: &str) -> Option<Vec<&'k str>> {
    let inner = key
        .strip_prefix(pool)?
        .strip_prefix('[')?
        .strip_suffix(']')?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.split(',').map(str::trim).collect())
}

/// One application as written in the settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDefinition {
    properties: PropertyMap,
    environments: Option<Vec<(String, PoolTable)>>,
    model_ref: Option<String>,
}

impl ApplicationDefinition {
    /// Build a definition from a parsed YAML document.
    pub fn from_yaml(document: Value) -> Result<Self, ApplicationError> {
        let Value::Mapping(mapping) = document else {
            return Err(ApplicationError::Invalid(
                "an application definition must be a mapping".to_string(),
            ));
        };

        let mut properties = PropertyMap::new();
        let mut environments = None;

        for (key, value) in mapping {
            let key = scalar_key(&key)?;
            if key == ENVIRONMENTS_KEY {
                environments = Some(parse_environments(value)?);
            } else {
                properties.insert(key, value);
            }
        }

        let model_ref = match properties.get(MODEL_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                return Err(ApplicationError::Invalid(format!(
                    "'{}' must name another application, got {}",
                    MODEL_KEY,
                    property_to_string(other)
                )));
            }
        };

        Ok(Self {
            properties,
            environments,
            model_ref,
        })
    }

    /// Own properties, never including the `environments` table.
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn model_ref(&self) -> Option<&str> {
        self.model_ref.as_deref()
    }

    pub fn has_environments(&self) -> bool {
        self.environments.is_some()
    }

    pub fn environment(&self, name: &str) -> Option<&PoolTable> {
        self.environments
            .as_ref()?
            .iter()
            .find(|(env, _)| env == name)
            .map(|(_, table)| table)
    }

    pub fn environment_names(&self) -> impl Iterator<Item = &str> {
        self.environments
            .iter()
            .flatten()
            .map(|(name, _)| name.as_str())
    }
}

fn parse_environments(value: Value) -> Result<Vec<(String, PoolTable)>, ApplicationError> {
    let Value::Mapping(mapping) = value else {
        return Err(ApplicationError::Invalid(format!(
            "'{}' must be a mapping of environment names to pools",
            ENVIRONMENTS_KEY
        )));
    };

    let mut environments = Vec::with_capacity(mapping.len());
    for (env, pools) in mapping {
        let env = scalar_key(&env)?;
        let table = match pools {
            Value::Null => PoolTable::default(),
            Value::Mapping(pools) => {
                let mut entries = Vec::with_capacity(pools.len());
                for (pool, entry) in pools {
                    let pool = scalar_key(&pool)?;
                    let entry = parse_pool_override(&env, &pool, entry)?;
                    entries.push((pool, entry));
                }
                PoolTable::new(entries)
            }
            _ => {
                return Err(ApplicationError::Invalid(format!(
                    "environment '{}' must be a mapping of pools",
                    env
                )));
            }
        };
        environments.push((env, table));
    }
    Ok(environments)
}

fn parse_pool_override(env: &str, pool: &str, value: Value) -> Result<PoolOverride, ApplicationError> {
    match value {
        Value::Bool(true) => Ok(PoolOverride::InheritOnly),
        Value::Mapping(mapping) => {
            let mut properties = PropertyMap::new();
            for (key, value) in mapping {
                properties.insert(scalar_key(&key)?, value);
            }
            Ok(PoolOverride::Properties(properties))
        }
        other => {
            log::debug!("Pool '{}' of environment '{}' is disabled ({:?})", pool, env, other);
            Ok(PoolOverride::Disabled)
        }
    }
}

fn scalar_key(key: &Value) -> Result<String, ApplicationError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ApplicationError::Invalid(format!(
            "keys must be scalars, got {:?}",
            key
        ))),
    }
}

/// Render a property the way it is handed to CloudFormation.
pub fn property_to_string(value: &PropertyValue) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Read a property as an unsigned integer, accepting numeric strings.
pub fn property_as_u32(value: &PropertyValue) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
