//! Capacity migration: replace every instance of a group without downtime.
//!
//! The group's capacity is doubled with a termination policy favouring the
//! oldest launch configuration and instances. Once the doubled fleet is healthy
//! behind the load balancer, the original capacity is restored and the group
//! scales in by terminating the old instances.
//!
//! Phases: capture, set policy, grow, poll, stable, restore. Interrupting the
//! process after the grow phase leaves the group at doubled capacity.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::capacity::{CapacityRequest, CapacityUpdater};
use super::clock::Clock;
use super::state::{GroupState, LbInstanceHealth};
use crate::error::MigrationError;
use crate::provider::CloudProvider;

/// Termination policies used while the group is doubled.
pub const MIGRATION_TERMINATION_POLICIES: [&str; 2] = ["OldestLaunchConfiguration", "OldestInstance"];

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_POLLS: u32 = 120;

/// How many polls the controller performs before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLimit {
    /// Poll until convergence, however long it takes.
    Unbounded,
    MaxPolls(u32),
}

impl PollLimit {
    fn reached(&self, polls: u32) -> bool {
        match self {
            PollLimit::Unbounded => false,
            PollLimit::MaxPolls(max) => polls >= *max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationConfig {
    pub poll_interval: Duration,
    pub poll_limit: PollLimit,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_limit: PollLimit::MaxPolls(DEFAULT_MAX_POLLS),
        }
    }
}

/// Physical ids of the group and of the load balancer in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    pub group_id: String,
    pub load_balancer_id: String,
}

/// Original group settings, restored at the end of the migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacitySnapshot {
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub termination_policies: Vec<String>,
}

impl CapacitySnapshot {
    pub fn capture(group: &GroupState) -> Self {
        Self {
            min_size: group.min_size,
            max_size: group.max_size,
            desired_capacity: group.desired_capacity,
            termination_policies: group.termination_policies.clone(),
        }
    }

    pub fn request(&self) -> CapacityRequest {
        CapacityRequest::exact(self.min_size, self.max_size, self.desired_capacity)
    }
}

impl fmt::Display for CapacitySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min:{} max:{} capacity:{} policies:[{}]",
            self.min_size,
            self.max_size,
            self.desired_capacity,
            self.termination_policies.join(", ")
        )
    }
}

/// Why the doubled group is not ready yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotYet {
    InstancesShort { current: usize, target: u32 },
    InstancesUnhealthy { unhealthy: usize },
    LoadBalancerShort { registered: usize, target: u32 },
    LoadBalancerNotInService { out_of_service: usize },
}

impl fmt::Display for NotYet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotYet::InstancesShort { current, target } => {
                write!(f, "only {} of {} instances created", current, target)
            }
            NotYet::InstancesUnhealthy { unhealthy } => {
                write!(f, "still {} unhealthy instance(s)", unhealthy)
            }
            NotYet::LoadBalancerShort { registered, target } => {
                write!(f, "only {} of {} instances in ELB", registered, target)
            }
            NotYet::LoadBalancerNotInService { out_of_service } => {
                write!(f, "{} instance(s) not ELB:InService", out_of_service)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    NotYet(NotYet),
    Converged { instances: usize },
}

/// Evaluate one poll. Criteria are checked in order and the first unmet one
/// is reported.
pub fn check_convergence(group: &GroupState, lb_instances: &[LbInstanceHealth], target: u32) -> Convergence {
    let target_len = usize::try_from(target).unwrap_or(usize::MAX);

    if group.instances.len() < target_len {
        return Convergence::NotYet(NotYet::InstancesShort {
            current: group.instances.len(),
            target,
        });
    }
    let unhealthy = group.unhealthy_instances().count();
    if unhealthy > 0 {
        return Convergence::NotYet(NotYet::InstancesUnhealthy { unhealthy });
    }
    if lb_instances.len() < target_len {
        return Convergence::NotYet(NotYet::LoadBalancerShort {
            registered: lb_instances.len(),
            target,
        });
    }
    let out_of_service = lb_instances.iter().filter(|i| !i.is_in_service()).count();
    if out_of_service > 0 {
        return Convergence::NotYet(NotYet::LoadBalancerNotInService { out_of_service });
    }
    Convergence::Converged {
        instances: group.instances.len(),
    }
}

/// A group is stable when every desired instance exists and is healthy.
pub fn check_stable(group: &GroupState) -> Result<(), MigrationError> {
    let desired = usize::try_from(group.desired_capacity).unwrap_or(usize::MAX);
    if desired != group.instances.len() {
        return Err(MigrationError::UnstableGroup(format!(
            "desired capacity {} != {} instances",
            group.desired_capacity,
            group.instances.len()
        )));
    }
    if let Some(instance) = group.unhealthy_instances().next() {
        return Err(MigrationError::UnstableGroup(format!(
            "instance {} is {}",
            instance.instance_id, instance.health_status
        )));
    }
    Ok(())
}

/// Progress notifications emitted while migrating.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent {
    PolicySet(Vec<String>),
    Growing { from: u32, to: u32 },
    Waiting { poll: u32, reason: NotYet },
    Converged { poll: u32, instances: usize },
    Stable(GroupState),
    Restoring(CapacitySnapshot),
    Restored,
    RestoreFailed(String),
    RestoreDeclined,
}

impl fmt::Display for MigrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationEvent::PolicySet(policies) => {
                write!(f, "Setting termination policy to [{}]", policies.join(", "))
            }
            MigrationEvent::Growing { from, to } => {
                write!(f, "Growing the desired capacity from {} to {}", from, to)
            }
            MigrationEvent::Waiting { poll, reason } => write!(f, "NOTYET ({}): {}", poll, reason),
            MigrationEvent::Converged { instances, .. } => {
                write!(f, "OK: {} healthy instances in ELB", instances)
            }
            MigrationEvent::Stable(group) => write!(
                f,
                "New group state min:{} max:{} capacity:{} instances:{}",
                group.min_size,
                group.max_size,
                group.desired_capacity,
                group.instances.len()
            ),
            MigrationEvent::Restoring(snapshot) => write!(f, "Restoring previous group control: {}", snapshot),
            MigrationEvent::Restored => write!(f, "Group control restored"),
            MigrationEvent::RestoreFailed(error) => write!(f, "Restoration failed: {}", error),
            MigrationEvent::RestoreDeclined => write!(f, "WARNING: The group desired capacity was doubled!"),
        }
    }
}

/// Receives migration progress and answers the confirmation points.
pub trait MigrationObserver: Send + Sync {
    fn on_event(&self, event: &MigrationEvent);

    /// Called once the group passed its stability checks, before any mutation.
    fn confirm_start(&self, _group: &GroupState) -> bool {
        true
    }

    /// Called before restoring the original capacity.
    fn confirm_restore(&self, _original: &CapacitySnapshot) -> bool {
        true
    }
}

/// Observer that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl MigrationObserver for LogObserver {
    fn on_event(&self, event: &MigrationEvent) {
        log::info!("{}", event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    Failed(String),
    Declined,
}

impl RestoreOutcome {
    /// True when the group was left at its doubled capacity.
    pub fn capacity_doubled(&self) -> bool {
        !matches!(self, RestoreOutcome::Restored)
    }
}

/// What happened during a completed migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub original: CapacitySnapshot,
    pub target_capacity: u32,
    pub polls: u32,
    /// The unmet criterion of every poll that did not converge, in order.
    pub pending: Vec<NotYet>,
    pub stable_state: GroupState,
    pub restore: RestoreOutcome,
}

/// Drives the migration of one group through a provider.
pub struct MigrationController<P, C>
where
    P: CloudProvider,
    C: Clock,
{
    provider: Arc<P>,
    clock: Arc<C>,
    config: MigrationConfig,
}

impl<P, C> MigrationController<P, C>
where
    P: CloudProvider,
    C: Clock,
{
    pub fn new(provider: Arc<P>, clock: Arc<C>) -> Self {
        Self::with_config(provider, clock, MigrationConfig::default())
    }

    pub fn with_config(provider: Arc<P>, clock: Arc<C>, config: MigrationConfig) -> Self {
        Self {
            provider,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run the whole migration.
    ///
    /// Fails without touching the group when it is not stable. A failing
    /// restore does not fail the run: it is reported in `MigrationReport::restore`.
    pub async fn run(
        &self,
        target: &MigrationTarget,
        observer: &dyn MigrationObserver,
    ) -> Result<MigrationReport, MigrationError> {
        let group = self.provider.group_state(&target.group_id).await?;
        check_stable(&group)?;
        let original = CapacitySnapshot::capture(&group);
        let doubled = original.desired_capacity.saturating_mul(2);
        log::info!("Migrating group {} ({}), target capacity {}", group.name, original, doubled);

        if !observer.confirm_start(&group) {
            return Err(MigrationError::Aborted);
        }

        let updater = CapacityUpdater::new(self.provider.as_ref());

        let policies: Vec<String> = MIGRATION_TERMINATION_POLICIES.iter().map(|p| p.to_string()).collect();
        observer.on_event(&MigrationEvent::PolicySet(policies.clone()));
        updater
            .apply_with_policies(&group, CapacityRequest::default(), Some(&policies))
            .await?;

        observer.on_event(&MigrationEvent::Growing {
            from: original.desired_capacity,
            to: doubled,
        });
        updater
            .apply(&group, CapacityRequest::exact(doubled, doubled, doubled))
            .await?;

        let (polls, pending) = self.poll_until_stable(target, doubled, observer).await?;

        let stable_state = self.provider.group_state(&target.group_id).await?;
        observer.on_event(&MigrationEvent::Stable(stable_state.clone()));

        let restore = self.restore(&stable_state, &original, observer).await;

        Ok(MigrationReport {
            original,
            target_capacity: doubled,
            polls,
            pending,
            stable_state,
            restore,
        })
    }

    /// Poll the group and its load balancer until the doubled fleet is in
    /// service. Returns the number of polls and the reason of every miss.
    pub async fn poll_until_stable(
        &self,
        target: &MigrationTarget,
        capacity: u32,
        observer: &dyn MigrationObserver,
    ) -> Result<(u32, Vec<NotYet>), MigrationError> {
        let mut polls = 0;
        let mut pending = Vec::new();

        loop {
            if self.config.poll_limit.reached(polls) {
                log::warn!(
                    "Group {} did not converge after {} polls, capacity remains doubled",
                    target.group_id,
                    polls
                );
                return Err(MigrationError::PollLimitReached {
                    polls,
                    target: capacity,
                });
            }

            self.clock.sleep(self.config.poll_interval).await;
            polls += 1;

            let group = self.provider.group_state(&target.group_id).await?;
            let lb_instances = self.provider.load_balancer_health(&target.load_balancer_id).await?;

            match check_convergence(&group, &lb_instances, capacity) {
                Convergence::NotYet(reason) => {
                    log::debug!("Poll {}: {}", polls, reason);
                    observer.on_event(&MigrationEvent::Waiting {
                        poll: polls,
                        reason: reason.clone(),
                    });
                    pending.push(reason);
                }
                Convergence::Converged { instances } => {
                    observer.on_event(&MigrationEvent::Converged { poll: polls, instances });
                    return Ok((polls, pending));
                }
            }
        }
    }

    async fn restore(
        &self,
        stable_state: &GroupState,
        original: &CapacitySnapshot,
        observer: &dyn MigrationObserver,
    ) -> RestoreOutcome {
        observer.on_event(&MigrationEvent::Restoring(original.clone()));

        if !observer.confirm_restore(original) {
            log::warn!("Restore declined, group {} keeps doubled capacity", stable_state.name);
            observer.on_event(&MigrationEvent::RestoreDeclined);
            return RestoreOutcome::Declined;
        }

        let updater = CapacityUpdater::new(self.provider.as_ref());
        match updater
            .apply_with_policies(stable_state, original.request(), Some(&original.termination_policies))
            .await
        {
            Ok(_) => {
                log::info!("Group {} restored to {}", stable_state.name, original);
                observer.on_event(&MigrationEvent::Restored);
                RestoreOutcome::Restored
            }
            Err(e) => {
                log::warn!(
                    "Restoring group {} failed, capacity remains doubled: {}",
                    stable_state.name,
                    e
                );
                observer.on_event(&MigrationEvent::RestoreFailed(e.to_string()));
                RestoreOutcome::Failed(e.to_string())
            }
        }
    }
}
