//! Stack name parsing: `shortname-pool-environment[-identifier]`.

use std::fmt;
use std::str::FromStr;

use crate::error::ApplicationError;

/// The parts of a stack name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackName {
    pub short_name: String,
    pub pool: String,
    pub environment: String,
    pub identifier: Option<String>,
}

impl StackName {
    /// Split a stack name on hyphens. The first three tokens are mandatory,
    /// the fourth is the optional identifier and anything after it is ignored.
    pub fn parse(stack_name: &str) -> Result<Self, ApplicationError> {
        let mut parts = stack_name.split('-');
        let mut mandatory = || {
            parts
                .next()
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ApplicationError::InvalidStackName(format!(
                        "'{}' is not of the form shortname-pool-environment[-identifier]",
                        stack_name
                    ))
                })
        };

        let short_name = mandatory()?;
        let pool = mandatory()?;
        let environment = mandatory()?;
        let identifier = parts.next().filter(|id| !id.is_empty()).map(str::to_string);

        Ok(Self {
            short_name,
            pool,
            environment,
            identifier,
        })
    }
}

impl FromStr for StackName {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.short_name, self.pool, self.environment)?;
        if let Some(id) = &self.identifier {
            write!(f, "-{}", id)?;
        }
        Ok(())
    }
}

/// Leading token of a stack name, used to pick the owning application.
pub fn short_name_of(stack_name: &str) -> &str {
    stack_name.split('-').next().unwrap_or(stack_name)
}
