//! Cloud provider capability: CloudFormation stacks, AutoScaling groups and
//! load balancer health.
//!
//! Everything that talks to the cloud goes through `CloudProvider`.
//! `AwsSdkProvider` implements it with the AWS SDK clients; `MockProvider`
//! keeps everything in memory for tests.

mod aws_sdk;
mod mock;

pub use aws_sdk::{AwsSdkConfig, AwsSdkProvider, METRICS_GRANULARITY};
pub use mock::MockProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::autoscale::{GroupState, GroupUpdate, LbInstanceHealth, MigrationTarget};
use crate::error::ProviderError;

pub const RES_TYPE_ASG: &str = "AWS::AutoScaling::AutoScalingGroup";
pub const RES_TYPE_ELB: &str = "AWS::ElasticLoadBalancing::LoadBalancer";

/// Stack statuses hidden from listings unless explicitly requested.
pub const STACK_IGNORE_STATUS: &[&str] = &["DELETE_COMPLETE"];

/// Capabilities acknowledged on every create and update.
pub const STACK_CAPABILITIES: &[&str] = &["CAPABILITY_IAM"];

/// A CloudFormation stack, as listed or described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackSummary {
    pub stack_name: String,
    #[serde(default)]
    pub stack_id: String,
    pub stack_status: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    /// `Description` when described, `TemplateDescription` when listed.
    #[serde(default, alias = "TemplateDescription")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<StackParameter>,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl StackSummary {
    pub fn new(stack_name: impl Into<String>, stack_status: impl Into<String>) -> Self {
        let stack_name = stack_name.into();
        Self {
            stack_id: format!("arn:aws:cloudformation:stack/{}", stack_name),
            stack_name,
            stack_status: stack_status.into(),
            creation_time: None,
            description: None,
            parameters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_ignored(&self) -> bool {
        STACK_IGNORE_STATUS.contains(&self.stack_status.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackParameter {
    pub parameter_key: String,
    pub parameter_value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter_key: key.into(),
            parameter_value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackResource {
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: String,
    pub resource_type: String,
    pub resource_status: String,
}

impl StackResource {
    pub fn new(logical_id: impl Into<String>, physical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_resource_id: logical_id.into(),
            physical_resource_id: physical_id.into(),
            resource_type: resource_type.into(),
            resource_status: "CREATE_COMPLETE".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackEvent {
    pub timestamp: DateTime<Utc>,
    pub resource_type: String,
    pub logical_resource_id: String,
    pub resource_status: String,
    #[serde(default)]
    pub resource_status_reason: Option<String>,
}

/// Everything needed to create or update a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<String>,
}

impl StackRequest {
    pub fn new(stack_name: impl Into<String>, template_body: impl Into<String>, parameters: Vec<StackParameter>) -> Self {
        Self {
            stack_name: stack_name.into(),
            template_body: template_body.into(),
            parameters,
            capabilities: STACK_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Capabilities required from the cloud.
///
/// Implementations are used strictly sequentially: each call completes before
/// the next one is issued.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn list_stacks(&self) -> Result<Vec<StackSummary>, ProviderError>;

    /// Full description of one stack, with parameters and outputs.
    async fn describe_stack(&self, stack_name: &str) -> Result<StackSummary, ProviderError>;

    async fn stack_resources(&self, stack_name: &str) -> Result<Vec<StackResource>, ProviderError>;

    /// Stack events, most recent first.
    async fn stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, ProviderError>;

    /// Returns the new stack id.
    async fn create_stack(&self, request: &StackRequest) -> Result<String, ProviderError>;

    async fn update_stack(&self, request: &StackRequest) -> Result<String, ProviderError>;

    async fn delete_stack(&self, stack_name: &str) -> Result<(), ProviderError>;

    async fn group_state(&self, group_id: &str) -> Result<GroupState, ProviderError>;

    async fn apply_group_update(&self, group_id: &str, update: &GroupUpdate) -> Result<(), ProviderError>;

    /// Start or stop collecting the group metrics.
    async fn set_metrics_collection(&self, group_id: &str, enabled: bool) -> Result<(), ProviderError>;

    async fn load_balancer_health(&self, load_balancer_id: &str) -> Result<Vec<LbInstanceHealth>, ProviderError>;
}

/// Stacks whose name contains `pattern`, sorted by name.
pub async fn find_stacks<P: CloudProvider + ?Sized>(
    provider: &P,
    pattern: Option<&str>,
    include_deleted: bool,
) -> Result<Vec<StackSummary>, ProviderError> {
    let mut stacks: Vec<StackSummary> = provider
        .list_stacks()
        .await?
        .into_iter()
        .filter(|s| pattern.is_none_or(|p| s.stack_name.contains(p)))
        .filter(|s| include_deleted || !s.is_ignored())
        .collect();
    stacks.sort_by(|a, b| a.stack_name.cmp(&b.stack_name));
    Ok(stacks)
}

/// The single stack matching `pattern`. An exact name match always wins.
pub async fn find_one_stack<P: CloudProvider + ?Sized>(
    provider: &P,
    pattern: &str,
    include_deleted: bool,
) -> Result<StackSummary, ProviderError> {
    let mut stacks = find_stacks(provider, Some(pattern), include_deleted).await?;

    if let Some(pos) = stacks.iter().position(|s| s.stack_name == pattern) {
        return Ok(stacks.swap_remove(pos));
    }
    match stacks.len() {
        0 => Err(ProviderError::Lookup(format!("No stack found with pattern: {}", pattern))),
        1 => Ok(stacks.remove(0)),
        _ => Err(ProviderError::Lookup(format!(
            "More than one stack matched this pattern: {}",
            pattern
        ))),
    }
}

/// The single resource of `resource_type` in a stack.
pub fn find_one_resource<'a>(
    resources: &'a [StackResource],
    resource_type: &str,
) -> Result<&'a StackResource, ProviderError> {
    let mut matching = resources.iter().filter(|r| r.resource_type == resource_type);
    match (matching.next(), matching.next()) {
        (Some(resource), None) => Ok(resource),
        (None, _) => Err(ProviderError::Lookup(format!("This stack contains no {}", resource_type))),
        (Some(_), Some(_)) => Err(ProviderError::Lookup(format!(
            "This stack contains more than one {}",
            resource_type
        ))),
    }
}

/// Locate the group and load balancer of a stack.
pub async fn find_migration_target<P: CloudProvider + ?Sized>(
    provider: &P,
    stack_name: &str,
) -> Result<MigrationTarget, ProviderError> {
    let resources = provider.stack_resources(stack_name).await?;
    let group = find_one_resource(&resources, RES_TYPE_ASG)?;
    let load_balancer = find_one_resource(&resources, RES_TYPE_ELB)?;
    Ok(MigrationTarget {
        group_id: group.physical_resource_id.clone(),
        load_balancer_id: load_balancer.physical_resource_id.clone(),
    })
}
