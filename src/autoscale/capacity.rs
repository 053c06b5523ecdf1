//! Capacity updates: diff a min/max/desired request against a group and
//! push only what changed.
//!
//! Every capacity mutation (control commands, migration grow/restore) goes
//! through `CapacityUpdater`.

use std::fmt;
use std::str::FromStr;

use super::state::{GroupState, GroupUpdate};
use crate::error::ProviderError;
use crate::provider::CloudProvider;

/// A capacity field that was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityField {
    Min,
    Max,
    Capacity,
}

impl fmt::Display for CapacityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityField::Min => write!(f, "min"),
            CapacityField::Max => write!(f, "max"),
            CapacityField::Capacity => write!(f, "capacity"),
        }
    }
}

/// Requested capacity values. `None` means "leave as is".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityRequest {
    pub desired: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl CapacityRequest {
    pub fn new(desired: Option<u32>, min: Option<u32>, max: Option<u32>) -> Self {
        Self { desired, min, max }
    }

    /// Set all three values.
    pub fn exact(min: u32, max: u32, desired: u32) -> Self {
        Self::new(Some(desired), Some(min), Some(max))
    }

    pub fn desired(desired: u32) -> Self {
        Self::new(Some(desired), None, None)
    }

    pub fn limits(min: Option<u32>, max: Option<u32>) -> Self {
        Self::new(None, min, max)
    }

    /// Compute the update needed to reach this request, and the fields it changes.
    pub fn diff(&self, group: &GroupState) -> (GroupUpdate, Vec<CapacityField>) {
        let mut update = GroupUpdate::default();
        let mut changed = Vec::new();

        if let Some(min) = self.min.filter(|min| *min != group.min_size) {
            update.min_size = Some(min);
            changed.push(CapacityField::Min);
        }
        if let Some(max) = self.max.filter(|max| *max != group.max_size) {
            update.max_size = Some(max);
            changed.push(CapacityField::Max);
        }
        if let Some(desired) = self.desired.filter(|desired| *desired != group.desired_capacity) {
            update.desired_capacity = Some(desired);
            changed.push(CapacityField::Capacity);
        }

        (update, changed)
    }
}

/// Limits given on the command line as `MIN:MAX`, either side optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl FromStr for Limits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid limit format '{}', expected MIN:MAX", s))?;
        let parse = |part: &str| -> Result<Option<u32>, String> {
            let part = part.trim();
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse()
                    .map(Some)
                    .map_err(|_| format!("Invalid limit value '{}'", part))
            }
        };
        Ok(Self {
            min: parse(min)?,
            max: parse(max)?,
        })
    }
}

/// Applies capacity requests to groups through a provider.
pub struct CapacityUpdater<'a, P: CloudProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: CloudProvider + ?Sized> CapacityUpdater<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Apply a capacity request, returning the fields actually changed.
    ///
    /// When nothing differs no call is made to the provider.
    pub async fn apply(
        &self,
        group: &GroupState,
        request: CapacityRequest,
    ) -> Result<Vec<CapacityField>, ProviderError> {
        self.apply_with_policies(group, request, None).await
    }

    /// Same as `apply`, also setting the termination policies in the same call
    /// when they differ from the group's.
    pub async fn apply_with_policies(
        &self,
        group: &GroupState,
        request: CapacityRequest,
        termination_policies: Option<&[String]>,
    ) -> Result<Vec<CapacityField>, ProviderError> {
        let (mut update, changed) = request.diff(group);
        if let Some(policies) = termination_policies.filter(|p| *p != group.termination_policies.as_slice()) {
            update.termination_policies = Some(policies.to_vec());
        }

        if update.is_empty() {
            log::debug!("Group {}: nothing to update", group.name);
            return Ok(changed);
        }

        log::info!("Updating group {}: {:?}", group.name, update);
        self.provider.apply_group_update(&group.name, &update).await?;
        Ok(changed)
    }
}

/// Human summary of an update result.
pub fn describe_changes(changed: &[CapacityField]) -> String {
    if changed.is_empty() {
        "nothing changed".to_string()
    } else {
        let fields: Vec<String> = changed.iter().map(ToString::to_string).collect();
        format!("updated: {}", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn group() -> GroupState {
        GroupState::new("asg-1", 2, 10, 5)
    }

    #[test]
    fn test_diff_only_changed_fields() {
        let (update, changed) = CapacityRequest::new(Some(5), Some(3), None).diff(&group());
        assert_eq!(changed, vec![CapacityField::Min]);
        assert_eq!(update.min_size, Some(3));
        assert!(update.desired_capacity.is_none());
        assert!(update.max_size.is_none());
    }

    #[tokio::test]
    async fn test_apply_all_equal_is_noop() {
        let provider = MockProvider::new().with_group(group());
        let updater = CapacityUpdater::new(&provider);

        let changed = updater.apply(&group(), CapacityRequest::exact(2, 10, 5)).await.unwrap();

        assert!(changed.is_empty());
        assert!(provider.updates().is_empty());
    }

    #[tokio::test]
    async fn test_apply_shutdown_changes_everything_in_one_call() {
        let provider = MockProvider::new().with_group(group());
        let updater = CapacityUpdater::new(&provider);

        let changed = updater.apply(&group(), CapacityRequest::exact(0, 0, 0)).await.unwrap();

        assert_eq!(
            changed,
            vec![CapacityField::Min, CapacityField::Max, CapacityField::Capacity]
        );
        let updates = provider.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "asg-1");
        assert_eq!(
            updates[0].1,
            GroupUpdate {
                min_size: Some(0),
                max_size: Some(0),
                desired_capacity: Some(0),
                termination_policies: None,
            }
        );
    }

    #[tokio::test]
    async fn test_policies_alone_trigger_an_update() {
        let provider = MockProvider::new().with_group(group());
        let updater = CapacityUpdater::new(&provider);
        let policies = vec!["OldestInstance".to_string()];

        let changed = updater
            .apply_with_policies(&group(), CapacityRequest::default(), Some(&policies))
            .await
            .unwrap();

        assert!(changed.is_empty());
        assert_eq!(provider.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = MockProvider::new().with_group(group()).fail_update(1, "Throttling");
        let updater = CapacityUpdater::new(&provider);

        let err = updater.apply(&group(), CapacityRequest::desired(1)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
    }

    #[test]
    fn test_limits_parse() {
        assert_eq!(
            "10:20".parse::<Limits>().unwrap(),
            Limits { min: Some(10), max: Some(20) }
        );
        assert_eq!(":2".parse::<Limits>().unwrap(), Limits { min: None, max: Some(2) });
        assert_eq!("3:".parse::<Limits>().unwrap(), Limits { min: Some(3), max: None });
        assert!("12".parse::<Limits>().is_err());
        assert!("a:b".parse::<Limits>().is_err());
    }

    #[test]
    fn test_describe_changes() {
        assert_eq!(describe_changes(&[]), "nothing changed");
        assert_eq!(
            describe_changes(&[CapacityField::Min, CapacityField::Capacity]),
            "updated: min, capacity"
        );
    }
}
