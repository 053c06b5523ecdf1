//! In-memory provider for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{CloudProvider, StackEvent, StackRequest, StackResource, StackSummary};
use crate::autoscale::{GroupState, GroupUpdate, LbInstanceHealth};
use crate::error::ProviderError;

/// Metrics reported by a group once collection is enabled.
pub const MOCK_GROUP_METRICS: &[&str] = &["GroupDesiredCapacity", "GroupInServiceInstances"];

#[derive(Debug, Default)]
struct MockState {
    groups: HashMap<String, GroupState>,
    group_scripts: HashMap<String, VecDeque<GroupState>>,
    load_balancers: HashMap<String, Vec<LbInstanceHealth>>,
    load_balancer_scripts: HashMap<String, VecDeque<Vec<LbInstanceHealth>>>,
    stacks: Vec<StackSummary>,
    resources: HashMap<String, Vec<StackResource>>,
    events: HashMap<String, Vec<StackEvent>>,
    update_failures: HashMap<u32, String>,
    update_calls: u32,
    updates: Vec<(String, GroupUpdate)>,
    metrics_calls: Vec<(String, bool)>,
    group_calls: u32,
    load_balancer_calls: u32,
    created: Vec<StackRequest>,
    updated: Vec<StackRequest>,
    deleted: Vec<String>,
}

/// Mock provider.
///
/// Group reads return the next scripted state when one is queued, otherwise
/// the current state, which successful updates mutate. Load balancer reads
/// work the same way.
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn state_mut(&mut self) -> &mut MockState {
        self.state.get_mut().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_group(mut self, group: GroupState) -> Self {
        self.state_mut().groups.insert(group.name.clone(), group);
        self
    }

    /// Queue states returned by successive reads of a group.
    pub fn script_group(mut self, group_id: &str, states: Vec<GroupState>) -> Self {
        self.state_mut()
            .group_scripts
            .entry(group_id.to_string())
            .or_default()
            .extend(states);
        self
    }

    pub fn with_load_balancer(mut self, load_balancer_id: &str, instances: Vec<LbInstanceHealth>) -> Self {
        self.state_mut()
            .load_balancers
            .insert(load_balancer_id.to_string(), instances);
        self
    }

    pub fn script_load_balancer(mut self, load_balancer_id: &str, polls: Vec<Vec<LbInstanceHealth>>) -> Self {
        self.state_mut()
            .load_balancer_scripts
            .entry(load_balancer_id.to_string())
            .or_default()
            .extend(polls);
        self
    }

    pub fn with_stack(mut self, stack: StackSummary) -> Self {
        self.state_mut().stacks.push(stack);
        self
    }

    pub fn with_resources(mut self, stack_name: &str, resources: Vec<StackResource>) -> Self {
        self.state_mut()
            .resources
            .insert(stack_name.to_string(), resources);
        self
    }

    pub fn with_events(mut self, stack_name: &str, events: Vec<StackEvent>) -> Self {
        self.state_mut().events.insert(stack_name.to_string(), events);
        self
    }

    /// Make the n-th group update call (1-based) fail.
    pub fn fail_update(mut self, call: u32, message: &str) -> Self {
        self.state_mut()
            .update_failures
            .insert(call, message.to_string());
        self
    }

    /// Successful group updates, in call order.
    pub fn updates(&self) -> Vec<(String, GroupUpdate)> {
        self.state().updates.clone()
    }

    /// Metrics collection toggles, in call order.
    pub fn metrics_calls(&self) -> Vec<(String, bool)> {
        self.state().metrics_calls.clone()
    }

    pub fn current_group(&self, group_id: &str) -> Option<GroupState> {
        self.state().groups.get(group_id).cloned()
    }

    pub fn group_calls(&self) -> u32 {
        self.state().group_calls
    }

    pub fn load_balancer_calls(&self) -> u32 {
        self.state().load_balancer_calls
    }

    pub fn created_stacks(&self) -> Vec<StackRequest> {
        self.state().created.clone()
    }

    pub fn updated_stacks(&self) -> Vec<StackRequest> {
        self.state().updated.clone()
    }

    pub fn deleted_stacks(&self) -> Vec<String> {
        self.state().deleted.clone()
    }
}

fn stack_missing(stack_name: &str) -> ProviderError {
    ProviderError::Api(format!("Stack with id {} does not exist", stack_name))
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn list_stacks(&self) -> Result<Vec<StackSummary>, ProviderError> {
        Ok(self.state().stacks.clone())
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<StackSummary, ProviderError> {
        self.state()
            .stacks
            .iter()
            .find(|s| s.stack_name == stack_name && !s.is_ignored())
            .cloned()
            .ok_or_else(|| stack_missing(stack_name))
    }

    async fn stack_resources(&self, stack_name: &str) -> Result<Vec<StackResource>, ProviderError> {
        self.state()
            .resources
            .get(stack_name)
            .cloned()
            .ok_or_else(|| stack_missing(stack_name))
    }

    async fn stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, ProviderError> {
        Ok(self.state().events.get(stack_name).cloned().unwrap_or_default())
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        let mut state = self.state();
        if state
            .stacks
            .iter()
            .any(|s| s.stack_name == request.stack_name && !s.is_ignored())
        {
            return Err(ProviderError::Api(format!("Stack [{}] already exists", request.stack_name)));
        }
        let mut stack = StackSummary::new(&request.stack_name, "CREATE_IN_PROGRESS");
        stack.parameters = request.parameters.clone();
        let stack_id = stack.stack_id.clone();
        state.stacks.push(stack);
        state.created.push(request.clone());
        Ok(stack_id)
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        let mut state = self.state();
        let stack = state
            .stacks
            .iter_mut()
            .find(|s| s.stack_name == request.stack_name && !s.is_ignored())
            .ok_or_else(|| stack_missing(&request.stack_name))?;
        stack.stack_status = "UPDATE_IN_PROGRESS".to_string();
        stack.parameters = request.parameters.clone();
        let stack_id = stack.stack_id.clone();
        state.updated.push(request.clone());
        Ok(stack_id)
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        let stack = state
            .stacks
            .iter_mut()
            .find(|s| s.stack_name == stack_name && !s.is_ignored())
            .ok_or_else(|| stack_missing(stack_name))?;
        stack.stack_status = "DELETE_IN_PROGRESS".to_string();
        state.deleted.push(stack_name.to_string());
        Ok(())
    }

    async fn group_state(&self, group_id: &str) -> Result<GroupState, ProviderError> {
        let mut state = self.state();
        state.group_calls += 1;
        if let Some(next) = state.group_scripts.get_mut(group_id).and_then(VecDeque::pop_front) {
            return Ok(next);
        }
        state
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| ProviderError::Lookup(format!("The AutoScale physical id doesn't exist: {}", group_id)))
    }

    async fn apply_group_update(&self, group_id: &str, update: &GroupUpdate) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.update_calls += 1;
        let call = state.update_calls;
        if let Some(message) = state.update_failures.remove(&call) {
            return Err(ProviderError::Api(message));
        }
        let group = state
            .groups
            .get_mut(group_id)
            .ok_or_else(|| ProviderError::Lookup(format!("The AutoScale physical id doesn't exist: {}", group_id)))?;
        update.apply_to(group);
        state.updates.push((group_id.to_string(), update.clone()));
        Ok(())
    }

    async fn set_metrics_collection(&self, group_id: &str, enabled: bool) -> Result<(), ProviderError> {
        let mut state = self.state();
        let group = state
            .groups
            .get_mut(group_id)
            .ok_or_else(|| ProviderError::Lookup(format!("The AutoScale physical id doesn't exist: {}", group_id)))?;
        group.enabled_metrics = if enabled {
            MOCK_GROUP_METRICS.iter().map(|m| m.to_string()).collect()
        } else {
            Vec::new()
        };
        state.metrics_calls.push((group_id.to_string(), enabled));
        Ok(())
    }

    async fn load_balancer_health(&self, load_balancer_id: &str) -> Result<Vec<LbInstanceHealth>, ProviderError> {
        let mut state = self.state();
        state.load_balancer_calls += 1;
        if let Some(next) = state
            .load_balancer_scripts
            .get_mut(load_balancer_id)
            .and_then(VecDeque::pop_front)
        {
            return Ok(next);
        }
        state
            .load_balancers
            .get(load_balancer_id)
            .cloned()
            .ok_or_else(|| ProviderError::Lookup(format!("The ELB physical id doesn't exist: {}", load_balancer_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_group_then_current() {
        let provider = MockProvider::new()
            .with_group(GroupState::new("asg-1", 1, 4, 2))
            .script_group("asg-1", vec![GroupState::new("asg-1", 9, 9, 9)]);

        assert_eq!(provider.group_state("asg-1").await.unwrap().desired_capacity, 9);
        assert_eq!(provider.group_state("asg-1").await.unwrap().desired_capacity, 2);
        assert_eq!(provider.group_calls(), 2);
        assert!(provider.group_state("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_updates_mutate_current_group() {
        let provider = MockProvider::new().with_group(GroupState::new("asg-1", 1, 4, 2));
        let update = GroupUpdate {
            desired_capacity: Some(3),
            ..Default::default()
        };

        provider.apply_group_update("asg-1", &update).await.unwrap();

        assert_eq!(provider.current_group("asg-1").unwrap().desired_capacity, 3);
        assert_eq!(provider.updates(), vec![("asg-1".to_string(), update)]);
    }

    #[tokio::test]
    async fn test_failed_update_is_not_recorded() {
        let provider = MockProvider::new()
            .with_group(GroupState::new("asg-1", 1, 4, 2))
            .fail_update(1, "Throttling");

        let err = provider
            .apply_group_update("asg-1", &GroupUpdate::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "API error: Throttling");
        assert!(provider.updates().is_empty());
        assert_eq!(provider.current_group("asg-1").unwrap().desired_capacity, 2);
    }

    #[tokio::test]
    async fn test_metrics_collection_toggles() {
        let provider = MockProvider::new().with_group(GroupState::new("asg-1", 1, 4, 2));

        provider.set_metrics_collection("asg-1", true).await.unwrap();
        assert_eq!(provider.current_group("asg-1").unwrap().enabled_metrics.len(), 2);

        provider.set_metrics_collection("asg-1", false).await.unwrap();
        assert!(provider.current_group("asg-1").unwrap().enabled_metrics.is_empty());

        assert!(provider.set_metrics_collection("missing", true).await.is_err());
        assert_eq!(
            provider.metrics_calls(),
            vec![("asg-1".to_string(), true), ("asg-1".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_stack_lifecycle() {
        let provider = MockProvider::new();
        let request = StackRequest::new("tt-python-stage", "{}", Vec::new());

        let id = provider.create_stack(&request).await.unwrap();
        assert!(id.contains("tt-python-stage"));
        assert!(provider.create_stack(&request).await.is_err());

        provider.update_stack(&request).await.unwrap();
        provider.delete_stack("tt-python-stage").await.unwrap();

        assert_eq!(provider.created_stacks().len(), 1);
        assert_eq!(provider.updated_stacks().len(), 1);
        assert_eq!(provider.deleted_stacks(), vec!["tt-python-stage".to_string()]);
        assert!(provider.update_stack(&StackRequest::new("nope", "{}", Vec::new())).await.is_err());
    }
}
