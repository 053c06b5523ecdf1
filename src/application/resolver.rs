//! Stack information resolution.
//!
//! Merges, from least to most specific: the model's resolution for the same
//! environment/pool, the application's own properties, the selected pool
//! entry, and finally `Environment`/`Type`.

use serde_yaml::Value;

use super::collection::Application;
use super::definition::{ENVIRONMENT_KEY, PoolOverride, PropertyMap, TYPE_KEY};
use super::stack_name::StackName;
use crate::error::ApplicationError;

/// Longest model chain followed before giving up.
pub const MAX_MODEL_DEPTH: usize = 16;

impl<'a> Application<'a> {
    /// Resolve the stack properties for an environment, pool and optional
    /// identifier.
    pub fn stack_info(
        &self,
        environment: &str,
        pool: &str,
        identifier: Option<&str>,
    ) -> Result<PropertyMap, ApplicationError> {
        self.stack_info_at_depth(environment, pool, identifier, 0)
    }

    /// Resolve the stack properties from a stack name like `tt-python-production`.
    pub fn stack_info_from_stack_name(&self, stack_name: &str) -> Result<PropertyMap, ApplicationError> {
        let parsed = StackName::parse(stack_name)?;
        if parsed.short_name != self.short_name() {
            return Err(ApplicationError::WrongApplication {
                stack_name: stack_name.to_string(),
                short_name: self.short_name().to_string(),
            });
        }
        self.stack_info(&parsed.environment, &parsed.pool, parsed.identifier.as_deref())
    }

    fn stack_info_at_depth(
        &self,
        environment: &str,
        pool: &str,
        identifier: Option<&str>,
        depth: usize,
    ) -> Result<PropertyMap, ApplicationError> {
        if depth > MAX_MODEL_DEPTH {
            return Err(ApplicationError::Invalid(format!(
                "model chain of '{}' is deeper than {} levels",
                self.name(),
                MAX_MODEL_DEPTH
            )));
        }

        let definition = self.definition();
        let pools = definition
            .environment(environment)
            .ok_or_else(|| ApplicationError::EnvironmentNotFound(environment.to_string()))?;

        let mut stack_info = match self.model() {
            Some(model) => match model.stack_info_at_depth(environment, pool, identifier, depth + 1) {
                Ok(inherited) => inherited,
                Err(ApplicationError::EnvironmentNotFound(_)) => {
                    log::debug!(
                        "Model '{}' of '{}' has no environment '{}', nothing inherited",
                        model.name(),
                        self.name(),
                        environment
                    );
                    PropertyMap::new()
                }
                Err(e) => return Err(e),
            },
            None => PropertyMap::new(),
        };

        stack_info.extend(
            definition
                .properties()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        match pools.select(pool, identifier) {
            Some(PoolOverride::Properties(properties)) => {
                stack_info.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(PoolOverride::InheritOnly) => {}
            Some(PoolOverride::Disabled) | None => return Err(ApplicationError::PoolNotFound(pool.to_string())),
        }

        stack_info.insert(ENVIRONMENT_KEY.to_string(), Value::String(environment.to_string()));
        stack_info.insert(TYPE_KEY.to_string(), Value::String(pool.to_string()));

        log::debug!(
            "Resolved {} properties for {}/{}/{}{}",
            stack_info.len(),
            self.name(),
            environment,
            pool,
            identifier.map(|id| format!("[{}]", id)).unwrap_or_default()
        );
        Ok(stack_info)
    }
}
