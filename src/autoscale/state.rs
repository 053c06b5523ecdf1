//! AutoScaling group and load balancer state as reported by the provider.

use serde::{Deserialize, Serialize};

/// Health status of a group instance that counts as healthy.
pub const HEALTHY: &str = "Healthy";

/// Load balancer state of an instance that receives traffic.
pub const IN_SERVICE: &str = "InService";

/// Working copy of an AutoScaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupState {
    #[serde(rename = "AutoScalingGroupName")]
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    #[serde(default)]
    pub termination_policies: Vec<String>,
    #[serde(default)]
    pub instances: Vec<GroupInstance>,
    /// Names of the group metrics being collected.
    #[serde(default)]
    pub enabled_metrics: Vec<String>,
}

impl GroupState {
    pub fn new(name: impl Into<String>, min_size: u32, max_size: u32, desired_capacity: u32) -> Self {
        Self {
            name: name.into(),
            min_size,
            max_size,
            desired_capacity,
            termination_policies: vec!["Default".to_string()],
            instances: Vec::new(),
            enabled_metrics: Vec::new(),
        }
    }

    pub fn with_instances(mut self, instances: Vec<GroupInstance>) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_termination_policies(mut self, policies: Vec<String>) -> Self {
        self.termination_policies = policies;
        self
    }

    pub fn with_enabled_metrics(mut self, metrics: Vec<String>) -> Self {
        self.enabled_metrics = metrics;
        self
    }

    /// Instances not reporting `Healthy`.
    pub fn unhealthy_instances(&self) -> impl Iterator<Item = &GroupInstance> {
        self.instances.iter().filter(|i| !i.is_healthy())
    }

    pub fn all_healthy(&self) -> bool {
        self.unhealthy_instances().next().is_none()
    }
}

/// One instance of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupInstance {
    pub instance_id: String,
    pub health_status: String,
    pub lifecycle_state: String,
    #[serde(rename = "LaunchConfigurationName", default)]
    pub launch_config_name: Option<String>,
}

impl GroupInstance {
    /// A healthy in-service instance.
    pub fn healthy(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            health_status: HEALTHY.to_string(),
            lifecycle_state: "InService".to_string(),
            launch_config_name: None,
        }
    }

    pub fn unhealthy(instance_id: impl Into<String>) -> Self {
        Self {
            health_status: "Unhealthy".to_string(),
            ..Self::healthy(instance_id)
        }
    }

    pub fn with_launch_config(mut self, name: impl Into<String>) -> Self {
        self.launch_config_name = Some(name.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.health_status == HEALTHY
    }
}

/// Health of an instance registered with a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LbInstanceHealth {
    pub instance_id: String,
    pub state: String,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LbInstanceHealth {
    pub fn in_service(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            state: IN_SERVICE.to_string(),
            reason_code: None,
            description: None,
        }
    }

    pub fn out_of_service(instance_id: impl Into<String>, reason_code: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            state: "OutOfService".to_string(),
            reason_code: Some(reason_code.into()),
            description: None,
        }
    }

    pub fn is_in_service(&self) -> bool {
        self.state == IN_SERVICE
    }
}

/// Fields to change on a group. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
    pub desired_capacity: Option<u32>,
    pub termination_policies: Option<Vec<String>>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.min_size.is_none()
            && self.max_size.is_none()
            && self.desired_capacity.is_none()
            && self.termination_policies.is_none()
    }

    /// Apply the update to a local copy of the group.
    pub fn apply_to(&self, group: &mut GroupState) {
        if let Some(min) = self.min_size {
            group.min_size = min;
        }
        if let Some(max) = self.max_size {
            group.max_size = max;
        }
        if let Some(desired) = self.desired_capacity {
            group.desired_capacity = desired;
        }
        if let Some(policies) = &self.termination_policies {
            group.termination_policies = policies.clone();
        }
    }
}
