//! Error types for awstools
//!
//! Centralized error handling using thiserror. Each layer has its own enum
//! (application settings, cloud provider, templates, migration) and they all
//! convert into `AwsToolsError`.

use thiserror::Error;

/// Errors raised while loading or resolving application definitions.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Malformed definition, missing required property or bad model reference
    #[error("Invalid application: {0}")]
    Invalid(String),

    /// No application matches the lookup
    #[error("Application not found: {0}")]
    NotFound(String),

    /// The environment is not declared by the application
    #[error("No such environment: {0}")]
    EnvironmentNotFound(String),

    /// Neither a default pool entry nor an identifier pattern matched
    #[error("No such pool: {0}")]
    PoolNotFound(String),

    /// Stack name prefix does not match the application's short name
    #[error("Wrong application: stack '{stack_name}' does not belong to '{short_name}'")]
    WrongApplication { stack_name: String, short_name: String },

    /// Stack name is not of the form shortname-pool-environment[-identifier]
    #[error("Invalid stack name: {0}")]
    InvalidStackName(String),

    /// The settings stream is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ApplicationError {
    /// True for the lookup family (application, environment or pool not found).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApplicationError::NotFound(_)
                | ApplicationError::EnvironmentNotFound(_)
                | ApplicationError::PoolNotFound(_)
        )
    }
}

/// Errors surfaced by a cloud provider implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An AWS SDK call failed, with the full error chain rendered
    #[error("{operation} failed: {message}")]
    Sdk { operation: String, message: String },

    /// A stack, group or resource lookup did not yield exactly one match
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// The remote API rejected the call
    #[error("API error: {0}")]
    Api(String),
}

/// Errors raised by CloudFormation template handling.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found at {path}: {source}")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Template {path} is not valid JSON: {source}")]
    Invalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No template configured for this stack (missing 'template' property)")]
    Unspecified,
}

/// Errors raised by the capacity migration procedure.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Precondition failure, raised before any mutation
    #[error("The group is not stable: {0}")]
    UnstableGroup(String),

    /// The operator declined to start the migration
    #[error("Migration aborted")]
    Aborted,

    /// The poll loop hit its cap; capacity is left doubled
    #[error("The group did not converge after {polls} polls; its capacity remains doubled at {target}")]
    PollLimitReached { polls: u32, target: u32 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// All error types that can occur in awstools
#[derive(Debug, Error)]
pub enum AwsToolsError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for awstools operations
pub type Result<T> = std::result::Result<T, AwsToolsError>;
