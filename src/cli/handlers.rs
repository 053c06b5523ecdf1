//! Command handlers.
//!
//! Every handler prints its progress to stdout. Mutations of live production
//! stacks ask for an explicit confirmation; other confirmations are skipped
//! with `--force`.

use std::path::Path;
use std::sync::Arc;

use colored::*;
use dialoguer::{Confirm, theme::ColorfulTheme};
use eyre::{Context, Result, bail};
use log::info;

use awstools::application::{Applications, PropertyMap, is_live_production, property_as_u32};
use awstools::autoscale::{
    CapacityRequest, CapacitySnapshot, CapacityUpdater, GroupState, Limits, MigrationController, MigrationEvent,
    MigrationObserver, TokioClock, describe_changes,
};
use awstools::config::GlobalConfig;
use awstools::display::{
    format_autoscale, format_autoscale_instances, format_enabled_metrics, format_launch_configs, format_property_map,
    format_stack_events, format_stack_outputs, format_stack_parameters, format_stack_resources,
    format_stack_summary, format_stack_summary_short,
};
use awstools::provider::{
    CloudProvider, RES_TYPE_ASG, StackRequest, StackSummary, find_migration_target, find_one_resource, find_one_stack,
    find_stacks,
};
use awstools::template::{CfnParameters, CfnTemplate, resolve_template_path};

const MIN_SIZE_KEY: &str = "AutoScaleMinSize";
const MAX_SIZE_KEY: &str = "AutoScaleMaxSize";
const DESIRED_CAPACITY_KEY: &str = "AutoScaleDesiredCapacity";

/// Load the application settings, `--settings` taking precedence over the config.
pub fn load_applications(config: &GlobalConfig, settings: Option<&Path>) -> Result<Applications> {
    let path = match settings {
        Some(path) => awstools::config::expand_tilde(path),
        None => config.settings_path(),
    };
    Applications::load_from_file(&path).context(format!("Failed to load settings from {}", path.display()))
}

/// Resolved properties of the stack named `stack_name`.
pub fn resolve_stack_info(apps: &Applications, stack_name: &str) -> Result<PropertyMap> {
    let app = apps.get_by_stack_name(stack_name)?;
    let info = app.stack_info_from_stack_name(stack_name)?;
    Ok(info)
}

/// Ask for an explicit confirmation before touching a live production stack.
pub fn warn_for_live(stack_info: &PropertyMap) -> Result<()> {
    if !is_live_production(stack_info) {
        return Ok(());
    }
    if !Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("WARNING: Updating a live stack! Are you sure?")
        .default(false)
        .interact()?
    {
        bail!("Aborted");
    }
    Ok(())
}

/// Ask to confirm `action` unless forced.
pub fn confirm_action(force: bool, action: &str, default: bool) -> Result<()> {
    if force {
        return Ok(());
    }
    if !Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Confirm {}?", action))
        .default(default)
        .interact()?
    {
        bail!("Aborted");
    }
    Ok(())
}

pub fn handle_apps(apps: &Applications) -> Result<()> {
    for app in apps.iter() {
        println!("{}", app);
        let environments: Vec<&str> = app.environments().collect();
        println!("  environments: {}", environments.join(", "));
    }
    Ok(())
}

pub fn handle_resolve(apps: &Applications, stack_name: &str) -> Result<()> {
    let info = resolve_stack_info(apps, stack_name)?;
    println!("{} {}", "Stack:".green(), stack_name);
    println!("{}", format_property_map(&info));
    Ok(())
}

fn load_stack_template(
    config: &GlobalConfig,
    stack_info: &PropertyMap,
    template: Option<&str>,
) -> Result<(CfnTemplate, CfnParameters)> {
    let path = resolve_template_path(&config.template_dir(), template, stack_info)?;
    let template = CfnTemplate::load(&path)?;
    let parameters = CfnParameters::from_stack_info(&template, stack_info);
    Ok((template, parameters))
}

pub fn handle_parameters(
    config: &GlobalConfig,
    apps: &Applications,
    stack_name: &str,
    template: Option<&str>,
) -> Result<()> {
    let info = resolve_stack_info(apps, stack_name)?;
    let (template, parameters) = load_stack_template(config, &info, template)?;
    println!("\nStack name: {}\n\nTemplate: {}\n\nParameters:\n{}\n", stack_name, template, parameters);
    Ok(())
}

pub async fn handle_list<P: CloudProvider + ?Sized>(provider: &P, pattern: Option<&str>, all: bool) -> Result<()> {
    for stack in find_stacks(provider, pattern, all).await? {
        println!("{}", format_stack_summary_short(&stack));
    }
    Ok(())
}

pub async fn handle_info<P: CloudProvider + ?Sized>(provider: &P, stack_name: &str) -> Result<()> {
    let summary = find_one_stack(provider, stack_name, false).await?;
    let stack = provider.describe_stack(&summary.stack_name).await?;
    println!("{}\n", format_stack_summary(&stack));
    println!("{}\n", format_stack_parameters(&stack));
    println!("{}\n", format_stack_outputs(&stack));

    let events = provider.stack_events(&stack.stack_name).await?;
    println!("{}\n", format_stack_events(&events, Some(10)));

    let resources = provider.stack_resources(&stack.stack_name).await?;
    println!("{}", format_stack_resources(&resources));
    Ok(())
}

pub async fn handle_resources<P: CloudProvider + ?Sized>(provider: &P, stack_name: &str) -> Result<()> {
    let summary = find_one_stack(provider, stack_name, false).await?;
    let stack = provider.describe_stack(&summary.stack_name).await?;
    println!("{}\n", format_stack_summary(&stack));
    let resources = provider.stack_resources(&stack.stack_name).await?;
    println!("{}", format_stack_resources(&resources));
    Ok(())
}

pub async fn handle_outputs<P: CloudProvider + ?Sized>(provider: &P, stack_name: &str) -> Result<()> {
    let summary = find_one_stack(provider, stack_name, false).await?;
    let stack = provider.describe_stack(&summary.stack_name).await?;
    println!("{}\n", format_stack_summary(&stack));
    println!("{}", format_stack_outputs(&stack));
    Ok(())
}

pub async fn handle_events<P: CloudProvider + ?Sized>(provider: &P, stack_name: &str) -> Result<()> {
    let summary = find_one_stack(provider, stack_name, false).await?;
    let stack = provider.describe_stack(&summary.stack_name).await?;
    println!("{}\n", format_stack_summary(&stack));
    let events = provider.stack_events(&stack.stack_name).await?;
    println!("{}", format_stack_events(&events, None));
    Ok(())
}

/// Stacks, deleted ones included, whose last operation did not complete.
pub async fn in_progress_stacks<P: CloudProvider + ?Sized>(provider: &P) -> Result<Vec<StackSummary>> {
    Ok(find_stacks(provider, None, true)
        .await?
        .into_iter()
        .filter(|s| !s.stack_status.ends_with("_COMPLETE"))
        .collect())
}

pub async fn handle_activities<P: CloudProvider + ?Sized>(provider: &P) -> Result<()> {
    for stack in in_progress_stacks(provider).await? {
        println!("{}", format_stack_summary_short(&stack));
    }
    Ok(())
}

/// Whether a stack request creates or updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    Create,
    Update,
}

pub async fn handle_deploy<P: CloudProvider + ?Sized>(
    provider: &P,
    config: &GlobalConfig,
    stack_info: &PropertyMap,
    stack_name: &str,
    template: Option<&str>,
    action: StackAction,
    force: bool,
) -> Result<()> {
    let (template, parameters) = load_stack_template(config, stack_info, template)?;
    println!("\nStack name: {}\n\nTemplate: {}\n\nParameters:\n{}\n", stack_name, template, parameters);

    let request = StackRequest::new(stack_name, template.body(), parameters.into_vec());
    let stack_id = match action {
        StackAction::Create => {
            confirm_action(force, "this creation", true)?;
            provider.create_stack(&request).await?
        }
        StackAction::Update => {
            warn_for_live(stack_info)?;
            confirm_action(force, "the update", true)?;
            provider.update_stack(&request).await?
        }
    };
    info!("{:?} of {} sent: {}", action, stack_name, stack_id);
    println!("{} {}", "StackId".green(), stack_id);
    Ok(())
}

pub async fn handle_delete<P: CloudProvider + ?Sized>(
    provider: &P,
    stack_info: &PropertyMap,
    stack_name: &str,
    force: bool,
) -> Result<()> {
    let stack = find_one_stack(provider, stack_name, false).await?;
    println!("{}", format_stack_summary(&stack));

    warn_for_live(stack_info)?;
    confirm_action(force, "the deletion", true)?;

    provider.delete_stack(&stack.stack_name).await?;
    info!("Deleted stack {}", stack.stack_name);
    println!("{} {}", "Deleting:".red(), stack.stack_name);
    Ok(())
}

pub async fn handle_status<P: CloudProvider + ?Sized>(provider: &P, pattern: &str) -> Result<()> {
    for stack in find_stacks(provider, Some(pattern), false).await? {
        println!("\nStack {}", stack.stack_name.bold());
        let target = find_migration_target(provider, &stack.stack_name).await?;
        let group = provider.group_state(&target.group_id).await?;
        let lb_instances = provider.load_balancer_health(&target.load_balancer_id).await?;
        println!("{}", format_autoscale_instances(&group, &lb_instances));
    }
    Ok(())
}

pub async fn handle_show_cfg<P: CloudProvider + ?Sized>(provider: &P, pattern: &str) -> Result<()> {
    for stack in find_stacks(provider, Some(pattern), false).await? {
        println!("Stack {}", stack.stack_name.bold());
        let group = find_stack_group(provider, &stack.stack_name).await?;
        println!("{}", format_launch_configs(&group));
    }
    Ok(())
}

pub async fn handle_metrics<P: CloudProvider + ?Sized>(
    provider: &P,
    stack_name: &str,
    enable: bool,
    disable: bool,
) -> Result<()> {
    if enable && disable {
        bail!("--enable and --disable are mutually exclusive");
    }
    let stack = find_one_stack(provider, stack_name, false).await?;
    let group = find_stack_group(provider, &stack.stack_name).await?;
    println!("{}", format_autoscale(&group, false));

    if enable || disable {
        provider.set_metrics_collection(&group.name, enable).await?;
        info!("Metrics collection of {} enabled: {}", group.name, enable);
        println!("{}", "Updated".green());
    } else {
        println!("{}", format_enabled_metrics(&group));
    }
    Ok(())
}

async fn find_stack_group<P: CloudProvider + ?Sized>(provider: &P, stack_name: &str) -> Result<GroupState> {
    let resources = provider.stack_resources(stack_name).await?;
    let group_id = &find_one_resource(&resources, RES_TYPE_ASG)?.physical_resource_id;
    Ok(provider.group_state(group_id).await?)
}

/// Group values configured in the stack properties.
pub fn startup_request(stack_info: &PropertyMap) -> Result<CapacityRequest> {
    let read = |key: &str| {
        stack_info
            .get(key)
            .and_then(property_as_u32)
            .ok_or_else(|| eyre::eyre!("Invalid AutoScale information in stack definition: {}", key))
    };
    Ok(CapacityRequest::exact(
        read(MIN_SIZE_KEY)?,
        read(MAX_SIZE_KEY)?,
        read(DESIRED_CAPACITY_KEY)?,
    ))
}

pub fn limits_request(limits: Limits) -> CapacityRequest {
    CapacityRequest::limits(limits.min, limits.max)
}

/// Apply a capacity request to the group of a stack.
pub async fn handle_capacity<P: CloudProvider + ?Sized>(
    provider: &P,
    stack_info: &PropertyMap,
    stack_name: &str,
    request: CapacityRequest,
    force: bool,
) -> Result<()> {
    let stack = find_one_stack(provider, stack_name, false).await?;
    println!("{}", format_stack_summary(&stack));

    let group = find_stack_group(provider, &stack.stack_name).await?;
    println!("AutoScale ID: {}", group.name);
    println!("{}", format_autoscale(&group, false));

    warn_for_live(stack_info)?;
    confirm_action(force, "the capacity change", true)?;

    let changed = CapacityUpdater::new(provider).apply(&group, request).await?;
    println!("{}", describe_changes(&changed).green());
    Ok(())
}

/// Observer printing migration progress and prompting at the confirmation points.
pub struct CliObserver {
    stack_info: PropertyMap,
    force: bool,
}

impl CliObserver {
    pub fn new(stack_info: PropertyMap, force: bool) -> Self {
        Self { stack_info, force }
    }
}

impl MigrationObserver for CliObserver {
    fn on_event(&self, event: &MigrationEvent) {
        info!("Migration: {}", event);
        match event {
            MigrationEvent::Waiting { .. } => println!("    {}", event.to_string().yellow()),
            MigrationEvent::Converged { .. } => println!("    {}", event.to_string().green()),
            MigrationEvent::Stable(group) => {
                println!("\n <> {}", "Checking new group state...".cyan());
                println!("{}", format_autoscale(group, false));
            }
            MigrationEvent::Restored => println!("\n <> {}", event.to_string().green()),
            MigrationEvent::RestoreFailed(_) => println!("\n <> {}", event.to_string().red()),
            MigrationEvent::RestoreDeclined => println!("{}", event.to_string().yellow().bold()),
            _ => println!("\n <> {}", event.to_string().cyan()),
        }
    }

    fn confirm_start(&self, _group: &GroupState) -> bool {
        let confirmed = warn_for_live(&self.stack_info).and_then(|_| confirm_action(self.force, "the migration", true));
        if let Err(e) = &confirmed {
            info!("Migration not started: {}", e);
        }
        confirmed.is_ok()
    }

    fn confirm_restore(&self, _original: &CapacitySnapshot) -> bool {
        confirm_action(self.force, "restoring the group config", true).is_ok()
    }
}

pub async fn handle_migrate<P: CloudProvider>(
    provider: Arc<P>,
    config: &GlobalConfig,
    stack_info: &PropertyMap,
    stack_name: &str,
    force: bool,
    unbounded: bool,
) -> Result<()> {
    let stack = find_one_stack(provider.as_ref(), stack_name, false).await?;
    println!("{}", format_stack_summary(&stack));

    let target = find_migration_target(provider.as_ref(), &stack.stack_name).await?;
    let group = provider.group_state(&target.group_id).await?;
    println!("{}", format_autoscale(&group, false));

    let controller = MigrationController::with_config(
        provider,
        Arc::new(TokioClock),
        config.migration.to_migration_config(unbounded),
    );
    let observer = CliObserver::new(stack_info.clone(), force);
    let report = controller.run(&target, &observer).await?;

    if report.restore.capacity_doubled() {
        println!(
            "{}",
            format!(
                "Group {} left at doubled capacity {} (original {})",
                report.stable_state.name, report.target_capacity, report.original
            )
            .yellow()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use awstools::application::PropertyValue;
    use awstools::autoscale::GroupInstance;
    use awstools::provider::{MockProvider, RES_TYPE_ELB, StackResource};

    fn stage_info() -> PropertyMap {
        let mut info = PropertyMap::new();
        info.insert("Environment".to_string(), PropertyValue::from("stage"));
        info.insert("live".to_string(), PropertyValue::Bool(true));
        info
    }

    fn provider() -> MockProvider {
        MockProvider::new()
            .with_stack(StackSummary::new("tt-python-stage", "CREATE_COMPLETE"))
            .with_resources(
                "tt-python-stage",
                vec![
                    StackResource::new("WebServerGroup", "asg-1", RES_TYPE_ASG),
                    StackResource::new("ElasticLoadBalancer", "elb-1", RES_TYPE_ELB),
                ],
            )
            .with_group(GroupState::new("asg-1", 2, 10, 3).with_instances(vec![
                GroupInstance::healthy("i-1"),
                GroupInstance::healthy("i-2"),
                GroupInstance::healthy("i-3"),
            ]))
    }

    #[test]
    fn test_forced_confirmation_skips_prompt() {
        assert!(confirm_action(true, "anything", false).is_ok());
    }

    #[test]
    fn test_warn_for_live_ignores_non_production() {
        assert!(warn_for_live(&stage_info()).is_ok());
    }

    #[test]
    fn test_startup_request() {
        let mut info = stage_info();
        info.insert(MIN_SIZE_KEY.to_string(), PropertyValue::from(2));
        info.insert(MAX_SIZE_KEY.to_string(), PropertyValue::from("8"));
        assert!(startup_request(&info).is_err());

        info.insert(DESIRED_CAPACITY_KEY.to_string(), PropertyValue::from(4));
        assert_eq!(startup_request(&info).unwrap(), CapacityRequest::exact(2, 8, 4));
    }

    #[test]
    fn test_limits_request() {
        let request = limits_request(Limits { min: Some(1), max: None });
        assert_eq!(request, CapacityRequest::new(None, Some(1), None));
    }

    #[tokio::test]
    async fn test_handle_capacity_applies_update() {
        let provider = provider();

        handle_capacity(&provider, &stage_info(), "tt-python-stage", CapacityRequest::desired(5), true)
            .await
            .unwrap();

        let updates = provider.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.desired_capacity, Some(5));
    }

    #[tokio::test]
    async fn test_handle_capacity_unknown_stack() {
        let provider = provider();
        let result = handle_capacity(&provider, &stage_info(), "tt-node-stage", CapacityRequest::desired(5), true).await;
        assert!(result.is_err());
        assert!(provider.updates().is_empty());
    }

    #[tokio::test]
    async fn test_handle_delete_forced() {
        let provider = provider();
        handle_delete(&provider, &stage_info(), "tt-python-stage", true).await.unwrap();
        assert_eq!(provider.deleted_stacks(), vec!["tt-python-stage".to_string()]);
    }

    #[tokio::test]
    async fn test_handle_status_and_list() {
        let provider = provider().with_load_balancer("elb-1", Vec::new());
        handle_status(&provider, "tt-python").await.unwrap();
        handle_list(&provider, None, false).await.unwrap();
        assert_eq!(provider.load_balancer_calls(), 1);
    }

    #[tokio::test]
    async fn test_handle_metrics_toggles_collection() {
        let provider = provider();

        handle_metrics(&provider, "tt-python-stage", true, false).await.unwrap();
        handle_metrics(&provider, "tt-python-stage", false, false).await.unwrap();
        handle_metrics(&provider, "tt-python-stage", false, true).await.unwrap();

        assert_eq!(
            provider.metrics_calls(),
            vec![("asg-1".to_string(), true), ("asg-1".to_string(), false)]
        );
        assert!(provider.current_group("asg-1").unwrap().enabled_metrics.is_empty());
    }

    #[tokio::test]
    async fn test_handle_metrics_rejects_both_flags() {
        let provider = provider();
        assert!(handle_metrics(&provider, "tt-python-stage", true, true).await.is_err());
        assert!(provider.metrics_calls().is_empty());
    }

    #[tokio::test]
    async fn test_activities_keep_unfinished_stacks() {
        let provider = provider()
            .with_stack(StackSummary::new("tt-node-stage", "UPDATE_ROLLBACK_IN_PROGRESS"))
            .with_stack(StackSummary::new("tt-old-stage", "DELETE_FAILED"))
            .with_stack(StackSummary::new("tt-gone-stage", "DELETE_COMPLETE"));

        let names: Vec<String> = in_progress_stacks(&provider)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.stack_name)
            .collect();
        assert_eq!(names, vec!["tt-node-stage", "tt-old-stage"]);
        handle_activities(&provider).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_outputs_and_events() {
        let provider = provider();
        handle_outputs(&provider, "tt-python-stage").await.unwrap();
        handle_events(&provider, "tt-python-stage").await.unwrap();
        assert!(handle_outputs(&provider, "tt-java-stage").await.is_err());
    }

    #[test]
    fn test_cli_observer_forced_restore() {
        let observer = CliObserver::new(stage_info(), true);
        let group = GroupState::new("asg-1", 2, 10, 3);
        assert!(observer.confirm_start(&group));
        assert!(observer.confirm_restore(&CapacitySnapshot::capture(&group)));
    }
}
