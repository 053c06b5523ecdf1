//! Capacity control and migration integration tests
//!
//! Drives the public autoscale API against the in-memory provider, locating
//! the group and load balancer through the stack resources.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use awstools::autoscale::{
    CapacityField, CapacityRequest, CapacitySnapshot, CapacityUpdater, GroupInstance, GroupState, LbInstanceHealth,
    MigrationConfig, MigrationController, MigrationEvent, MigrationObserver, NotYet, PollLimit, RecordingClock,
    RestoreOutcome,
};
use awstools::error::MigrationError;
use awstools::provider::{
    CloudProvider, MockProvider, RES_TYPE_ASG, RES_TYPE_ELB, StackResource, find_migration_target,
};

const STACK: &str = "tt-python-production";

#[derive(Default)]
struct Transcript {
    lines: Mutex<Vec<String>>,
}

impl Transcript {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl MigrationObserver for Transcript {
    fn on_event(&self, event: &MigrationEvent) {
        self.lines.lock().unwrap().push(event.to_string());
    }

    fn confirm_restore(&self, original: &CapacitySnapshot) -> bool {
        self.lines
            .lock()
            .unwrap()
            .push(format!("confirm restore to {}", original.desired_capacity));
        true
    }
}

fn instances(prefix: &str, count: usize) -> Vec<GroupInstance> {
    (0..count)
        .map(|i| GroupInstance::healthy(format!("{}-{}", prefix, i)).with_launch_config(format!("lc-{}", prefix)))
        .collect()
}

fn lb(count: usize) -> Vec<LbInstanceHealth> {
    (0..count).map(|i| LbInstanceHealth::in_service(format!("i-{}", i))).collect()
}

fn stack_provider() -> MockProvider {
    MockProvider::new().with_resources(
        STACK,
        vec![
            StackResource::new("WebServerGroup", "tt-python-asg", RES_TYPE_ASG),
            StackResource::new("ElasticLoadBalancer", "tt-python-elb", RES_TYPE_ELB),
        ],
    )
}

fn original_group() -> GroupState {
    GroupState::new("tt-python-asg", 2, 10, 2).with_instances(instances("old", 2))
}

fn doubled_group(new: usize) -> GroupState {
    let mut members = instances("old", 2);
    members.extend(instances("new", new));
    GroupState::new("tt-python-asg", 4, 4, 4)
        .with_instances(members)
        .with_termination_policies(vec!["OldestLaunchConfiguration".to_string(), "OldestInstance".to_string()])
}

#[tokio::test]
async fn test_migration_end_to_end() {
    let provider = stack_provider()
        .with_group(original_group())
        .script_group(
            "tt-python-asg",
            vec![original_group(), doubled_group(1), doubled_group(2), doubled_group(2)],
        )
        .script_load_balancer("tt-python-elb", vec![lb(2), lb(2)])
        .with_load_balancer("tt-python-elb", lb(4));
    let provider = Arc::new(provider);
    let clock = Arc::new(RecordingClock::new());

    let target = find_migration_target(provider.as_ref(), STACK).await.unwrap();
    assert_eq!(target.group_id, "tt-python-asg");

    let controller = MigrationController::new(provider.clone(), clock.clone());
    let transcript = Transcript::default();
    let report = controller.run(&target, &transcript).await.unwrap();

    assert_eq!(report.polls, 3);
    assert_eq!(
        report.pending,
        vec![
            NotYet::InstancesShort { current: 3, target: 4 },
            NotYet::LoadBalancerShort { registered: 2, target: 4 },
        ]
    );
    assert_eq!(report.restore, RestoreOutcome::Restored);
    assert_eq!(clock.elapsed(), Duration::from_secs(90));

    let group = provider.current_group("tt-python-asg").unwrap();
    assert_eq!((group.min_size, group.max_size, group.desired_capacity), (2, 10, 2));
    assert_eq!(group.termination_policies, vec!["Default".to_string()]);

    let lines = transcript.lines();
    assert_eq!(lines[0], "Setting termination policy to [OldestLaunchConfiguration, OldestInstance]");
    assert_eq!(lines[1], "Growing the desired capacity from 2 to 4");
    assert_eq!(lines[2], "NOTYET (1): only 3 of 4 instances created");
    assert_eq!(lines[3], "NOTYET (2): only 2 of 4 instances in ELB");
    assert_eq!(lines[4], "OK: 4 healthy instances in ELB");
    assert!(lines.contains(&"confirm restore to 2".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("Group control restored"));
}

#[tokio::test]
async fn test_migration_refuses_unhealthy_group() {
    let mut members = instances("old", 1);
    members.push(GroupInstance::unhealthy("old-9"));
    let group = GroupState::new("tt-python-asg", 2, 10, 2).with_instances(members);
    let provider = Arc::new(stack_provider().with_group(group));
    let clock = Arc::new(RecordingClock::new());

    let target = find_migration_target(provider.as_ref(), STACK).await.unwrap();
    let controller = MigrationController::new(provider.clone(), clock);
    let err = controller.run(&target, &Transcript::default()).await.unwrap_err();

    assert!(matches!(err, MigrationError::UnstableGroup(_)));
    assert!(provider.updates().is_empty());
}

#[tokio::test]
async fn test_migration_poll_cap() {
    let provider = Arc::new(
        stack_provider()
            .with_group(original_group())
            .with_load_balancer("tt-python-elb", lb(2)),
    );
    // The group never grows past its two original instances
    let clock = Arc::new(RecordingClock::new());
    let config = MigrationConfig {
        poll_interval: Duration::from_secs(5),
        poll_limit: PollLimit::MaxPolls(4),
    };

    let target = find_migration_target(provider.as_ref(), STACK).await.unwrap();
    let controller = MigrationController::with_config(provider.clone(), clock.clone(), config);
    let err = controller.run(&target, &Transcript::default()).await.unwrap_err();

    assert!(matches!(err, MigrationError::PollLimitReached { polls: 4, target: 4 }));
    assert_eq!(clock.elapsed(), Duration::from_secs(20));
    assert_eq!(provider.current_group("tt-python-asg").unwrap().desired_capacity, 4);
}

#[tokio::test]
async fn test_shutdown_then_startup() {
    let provider = stack_provider().with_group(GroupState::new("tt-python-asg", 2, 10, 5));
    let updater = CapacityUpdater::new(&provider);

    let group = provider.group_state("tt-python-asg").await.unwrap();
    let changed = updater.apply(&group, CapacityRequest::exact(0, 0, 0)).await.unwrap();
    assert_eq!(changed, vec![CapacityField::Min, CapacityField::Max, CapacityField::Capacity]);

    let group = provider.group_state("tt-python-asg").await.unwrap();
    let changed = updater.apply(&group, CapacityRequest::exact(0, 0, 0)).await.unwrap();
    assert!(changed.is_empty());

    let changed = updater.apply(&group, CapacityRequest::exact(2, 10, 5)).await.unwrap();
    assert_eq!(changed.len(), 3);
    assert_eq!(provider.updates().len(), 2);
}
