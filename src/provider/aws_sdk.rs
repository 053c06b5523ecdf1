//! `CloudProvider` backed by the AWS SDK.
//!
//! One client per service, all built from the same shared configuration. SDK
//! outputs are mapped into the provider types here and nowhere else.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_autoscaling as autoscaling;
use aws_sdk_cloudformation as cloudformation;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::primitives::DateTime as SdkDateTime;
use aws_sdk_elasticloadbalancing as elb;
use chrono::{DateTime, Utc};

use super::{CloudProvider, StackEvent, StackOutput, StackParameter, StackRequest, StackResource, StackSummary};
use crate::autoscale::{GroupInstance, GroupState, GroupUpdate, LbInstanceHealth};
use crate::error::ProviderError;

/// Granularity requested when enabling group metrics collection.
pub const METRICS_GRANULARITY: &str = "1Minute";

/// Region and profile overriding the SDK's default resolution chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSdkConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwsSdkProvider {
    cloudformation: cloudformation::Client,
    autoscaling: autoscaling::Client,
    elb: elb::Client,
}

impl AwsSdkProvider {
    /// Resolve credentials and region the usual SDK way, `config` taking precedence.
    pub async fn load(config: &AwsSdkConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(cloudformation::config::Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;
        log::debug!("AWS region: {:?}", sdk_config.region());
        Self::from_sdk_config(&sdk_config)
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self {
            cloudformation: cloudformation::Client::new(sdk_config),
            autoscaling: autoscaling::Client::new(sdk_config),
            elb: elb::Client::new(sdk_config),
        }
    }
}

fn sdk_error<E>(operation: &str, error: E) -> ProviderError
where
    E: std::error::Error + 'static,
{
    let message = DisplayErrorContext(error).to_string();
    log::warn!("{} failed: {}", operation, message);
    ProviderError::Sdk {
        operation: operation.to_string(),
        message,
    }
}

// Members are optional or required depending on the service model; these
// accept both shapes.

fn text<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

fn opt_text<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    value.into().map(str::to_string)
}

fn enum_text<'a, E: AsRef<str> + 'a>(value: impl Into<Option<&'a E>>) -> String {
    value.into().map(|e| e.as_ref().to_string()).unwrap_or_default()
}

fn size(value: impl Into<Option<i32>>) -> u32 {
    value.into().and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn sdk_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn timestamp<'a>(value: impl Into<Option<&'a SdkDateTime>>) -> Option<DateTime<Utc>> {
    value
        .into()
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn stack_from_summary(summary: &cloudformation::types::StackSummary) -> StackSummary {
    StackSummary {
        stack_name: text(summary.stack_name()),
        stack_id: text(summary.stack_id()),
        stack_status: enum_text(summary.stack_status()),
        creation_time: timestamp(summary.creation_time()),
        description: opt_text(summary.template_description()),
        parameters: Vec::new(),
        outputs: Vec::new(),
    }
}

fn parameter_from_sdk(parameter: &cloudformation::types::Parameter) -> StackParameter {
    StackParameter::new(text(parameter.parameter_key()), text(parameter.parameter_value()))
}

fn output_from_sdk(output: &cloudformation::types::Output) -> StackOutput {
    StackOutput {
        output_key: text(output.output_key()),
        output_value: text(output.output_value()),
        description: opt_text(output.description()),
    }
}

fn stack_from_description(stack: &cloudformation::types::Stack) -> StackSummary {
    StackSummary {
        stack_name: text(stack.stack_name()),
        stack_id: text(stack.stack_id()),
        stack_status: enum_text(stack.stack_status()),
        creation_time: timestamp(stack.creation_time()),
        description: opt_text(stack.description()),
        parameters: stack.parameters().iter().map(parameter_from_sdk).collect(),
        outputs: stack.outputs().iter().map(output_from_sdk).collect(),
    }
}

fn resource_from_sdk(resource: &cloudformation::types::StackResource) -> StackResource {
    StackResource {
        logical_resource_id: text(resource.logical_resource_id()),
        physical_resource_id: text(resource.physical_resource_id()),
        resource_type: text(resource.resource_type()),
        resource_status: enum_text(resource.resource_status()),
    }
}

fn event_from_sdk(event: &cloudformation::types::StackEvent) -> StackEvent {
    StackEvent {
        timestamp: timestamp(event.timestamp()).unwrap_or_default(),
        resource_type: text(event.resource_type()),
        logical_resource_id: text(event.logical_resource_id()),
        resource_status: enum_text(event.resource_status()),
        resource_status_reason: opt_text(event.resource_status_reason()),
    }
}

fn instance_from_sdk(instance: &autoscaling::types::Instance) -> GroupInstance {
    GroupInstance {
        instance_id: text(instance.instance_id()),
        health_status: text(instance.health_status()),
        lifecycle_state: enum_text(instance.lifecycle_state()),
        launch_config_name: opt_text(instance.launch_configuration_name()),
    }
}

fn group_from_sdk(group: &autoscaling::types::AutoScalingGroup) -> GroupState {
    GroupState {
        name: text(group.auto_scaling_group_name()),
        min_size: size(group.min_size()),
        max_size: size(group.max_size()),
        desired_capacity: size(group.desired_capacity()),
        termination_policies: group.termination_policies().to_vec(),
        instances: group.instances().iter().map(instance_from_sdk).collect(),
        enabled_metrics: group
            .enabled_metrics()
            .iter()
            .filter_map(|m| m.metric().map(str::to_string))
            .collect(),
    }
}

fn lb_health_from_sdk(state: &elb::types::InstanceState) -> LbInstanceHealth {
    LbInstanceHealth {
        instance_id: text(state.instance_id()),
        state: text(state.state()),
        reason_code: opt_text(state.reason_code()),
        description: opt_text(state.description()),
    }
}

fn sdk_parameters(parameters: &[StackParameter]) -> Vec<cloudformation::types::Parameter> {
    parameters
        .iter()
        .map(|p| {
            cloudformation::types::Parameter::builder()
                .parameter_key(&p.parameter_key)
                .parameter_value(&p.parameter_value)
                .build()
        })
        .collect()
}

fn sdk_capabilities(capabilities: &[String]) -> Vec<cloudformation::types::Capability> {
    capabilities
        .iter()
        .map(|c| cloudformation::types::Capability::from(c.as_str()))
        .collect()
}

#[async_trait]
impl CloudProvider for AwsSdkProvider {
    async fn list_stacks(&self) -> Result<Vec<StackSummary>, ProviderError> {
        let mut stacks = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .cloudformation
                .list_stacks()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| sdk_error("ListStacks", e))?;
            stacks.extend(output.stack_summaries().iter().map(stack_from_summary));
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        log::debug!("Listed {} stacks", stacks.len());
        Ok(stacks)
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<StackSummary, ProviderError> {
        let output = self
            .cloudformation
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeStacks", e))?;
        output
            .stacks()
            .first()
            .map(stack_from_description)
            .ok_or_else(|| ProviderError::Lookup(format!("Stack not found: {}", stack_name)))
    }

    async fn stack_resources(&self, stack_name: &str) -> Result<Vec<StackResource>, ProviderError> {
        let output = self
            .cloudformation
            .describe_stack_resources()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeStackResources", e))?;
        Ok(output.stack_resources().iter().map(resource_from_sdk).collect())
    }

    async fn stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, ProviderError> {
        // First page only: the most recent events
        let output = self
            .cloudformation
            .describe_stack_events()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeStackEvents", e))?;
        Ok(output.stack_events().iter().map(event_from_sdk).collect())
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        log::info!("Creating stack {}", request.stack_name);
        let output = self
            .cloudformation
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(sdk_parameters(&request.parameters)))
            .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
            .send()
            .await
            .map_err(|e| sdk_error("CreateStack", e))?;
        Ok(text(output.stack_id()))
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        log::info!("Updating stack {}", request.stack_name);
        let output = self
            .cloudformation
            .update_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(sdk_parameters(&request.parameters)))
            .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
            .send()
            .await
            .map_err(|e| sdk_error("UpdateStack", e))?;
        Ok(text(output.stack_id()))
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), ProviderError> {
        log::info!("Deleting stack {}", stack_name);
        self.cloudformation
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteStack", e))?;
        Ok(())
    }

    async fn group_state(&self, group_id: &str) -> Result<GroupState, ProviderError> {
        let output = self
            .autoscaling
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(group_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeAutoScalingGroups", e))?;
        output
            .auto_scaling_groups()
            .first()
            .map(group_from_sdk)
            .ok_or_else(|| ProviderError::Lookup(format!("The AutoScale physical id doesn't exist: {}", group_id)))
    }

    async fn apply_group_update(&self, group_id: &str, update: &GroupUpdate) -> Result<(), ProviderError> {
        self.autoscaling
            .update_auto_scaling_group()
            .auto_scaling_group_name(group_id)
            .set_min_size(update.min_size.map(sdk_size))
            .set_max_size(update.max_size.map(sdk_size))
            .set_desired_capacity(update.desired_capacity.map(sdk_size))
            .set_termination_policies(update.termination_policies.clone())
            .send()
            .await
            .map_err(|e| sdk_error("UpdateAutoScalingGroup", e))?;
        Ok(())
    }

    async fn set_metrics_collection(&self, group_id: &str, enabled: bool) -> Result<(), ProviderError> {
        log::info!("Metrics collection of {} enabled: {}", group_id, enabled);
        if enabled {
            self.autoscaling
                .enable_metrics_collection()
                .auto_scaling_group_name(group_id)
                .granularity(METRICS_GRANULARITY)
                .send()
                .await
                .map_err(|e| sdk_error("EnableMetricsCollection", e))?;
        } else {
            self.autoscaling
                .disable_metrics_collection()
                .auto_scaling_group_name(group_id)
                .send()
                .await
                .map_err(|e| sdk_error("DisableMetricsCollection", e))?;
        }
        Ok(())
    }

    async fn load_balancer_health(&self, load_balancer_id: &str) -> Result<Vec<LbInstanceHealth>, ProviderError> {
        let output = self
            .elb
            .describe_instance_health()
            .load_balancer_name(load_balancer_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeInstanceHealth", e))?;
        Ok(output.instance_states().iter().map(lb_health_from_sdk).collect())
    }
}
