//! Plain-text rendering of stacks, groups and instances.

use chrono::{DateTime, Local, Utc};

use crate::application::{PropertyMap, property_to_string};
use crate::autoscale::{GroupState, LbInstanceHealth};
use crate::provider::{StackEvent, StackResource, StackSummary};

const WAIT_HANDLE_TYPE: &str = "AWS::CloudFormation::WaitConditionHandle";
const WAIT_HANDLE_WIDTH: usize = 45;

pub fn local_date(date: Option<&DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// Rough age of `then` relative to `now`, e.g. "3 days ago".
pub fn humanize_since(then: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(*then);
    let (amount, unit) = if delta.num_days() > 0 {
        (delta.num_days(), "day")
    } else if delta.num_hours() > 0 {
        (delta.num_hours(), "hour")
    } else if delta.num_minutes() > 0 {
        (delta.num_minutes(), "minute")
    } else {
        return "just now".to_string();
    };
    let plural = if amount > 1 { "s" } else { "" };
    format!("{} {}{} ago", amount, unit, plural)
}

fn long_date(date: Option<&DateTime<Utc>>) -> String {
    match date {
        Some(d) => format!("{} ({})", local_date(Some(d)), humanize_since(d, &Utc::now())),
        None => "-".to_string(),
    }
}

pub fn format_stack_summary(stack: &StackSummary) -> String {
    format!(
        "Name: {}\nId: {}\nStatus: {}\nCreation: {}\nTemplate: {}",
        stack.stack_name,
        stack.stack_id,
        stack.stack_status,
        long_date(stack.creation_time.as_ref()),
        stack.description.as_deref().unwrap_or("-")
    )
}

/// One line per stack, for listings.
pub fn format_stack_summary_short(stack: &StackSummary) -> String {
    format!(
        "{:<40} {:<24} {:<19} {}",
        stack.stack_name,
        stack.stack_status,
        local_date(stack.creation_time.as_ref()),
        stack.description.as_deref().unwrap_or("")
    )
}

pub fn format_stack_parameters(stack: &StackSummary) -> String {
    let mut parameters: Vec<_> = stack.parameters.iter().collect();
    parameters.sort_by(|a, b| a.parameter_key.cmp(&b.parameter_key));
    parameters
        .iter()
        .map(|p| format!("  {:<32} {}", p.parameter_key, p.parameter_value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_stack_outputs(stack: &StackSummary) -> String {
    let mut outputs: Vec<_> = stack.outputs.iter().collect();
    outputs.sort_by(|a, b| a.output_key.cmp(&b.output_key));
    outputs
        .iter()
        .map(|o| match &o.description {
            Some(description) => format!("  {:<32} {} ({})", o.output_key, o.output_value, description),
            None => format!("  {:<32} {}", o.output_key, o.output_value),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Events in the order given, at most `limit` of them.
pub fn format_stack_events(events: &[StackEvent], limit: Option<usize>) -> String {
    events
        .iter()
        .take(limit.unwrap_or(events.len()))
        .map(|e| {
            format!(
                "{}  {:<40} {:<24} {:<20} {}",
                local_date(Some(&e.timestamp)),
                e.resource_type,
                e.logical_resource_id,
                e.resource_status,
                e.resource_status_reason.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resources sorted by type.
pub fn format_stack_resources(resources: &[StackResource]) -> String {
    let mut sorted: Vec<&StackResource> = resources.iter().collect();
    sorted.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
    sorted
        .iter()
        .map(|r| {
            let physical_id = if r.resource_type == WAIT_HANDLE_TYPE && r.physical_resource_id.len() > WAIT_HANDLE_WIDTH {
                let cut: String = r.physical_resource_id.chars().take(WAIT_HANDLE_WIDTH).collect();
                format!("{}...", cut)
            } else {
                r.physical_resource_id.clone()
            };
            format!(
                "{:<24}  {:<60}  [{}] {}",
                r.logical_resource_id, physical_id, r.resource_status, r.resource_type
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_autoscale(group: &GroupState, detail: bool) -> String {
    let mut out = format!(
        "AutoScaleGroup: {}\nAutoScaleGroup min:{} max:{} capacity:{}",
        group.name, group.min_size, group.max_size, group.desired_capacity
    );
    if detail {
        out.push_str("\nAutoScaleGroup instances:");
        for instance in &group.instances {
            out.push_str(&format!("\n  {} {}", instance.instance_id, instance.health_status));
        }
    }
    out
}

pub fn format_enabled_metrics(group: &GroupState) -> String {
    let mut out = String::from("Metrics collection:");
    for metric in &group.enabled_metrics {
        out.push_str(&format!("\n    {}", metric));
    }
    out
}

/// Group instances then load balancer instances, one per line.
pub fn format_autoscale_instances(group: &GroupState, lb_instances: &[LbInstanceHealth]) -> String {
    let asg = group.instances.iter().map(|i| {
        format!(
            "  ASG: {} {}/{} LC:{}",
            i.instance_id,
            i.health_status,
            i.lifecycle_state,
            i.launch_config_name.as_deref().unwrap_or("-")
        )
    });
    let elb = lb_instances.iter().map(|i| {
        format!(
            "  ELB: {} {} ({})",
            i.instance_id,
            i.state,
            i.reason_code.as_deref().unwrap_or("N/A")
        )
    });
    asg.chain(elb).collect::<Vec<_>>().join("\n")
}

/// Instances grouped under their launch configuration.
pub fn format_launch_configs(group: &GroupState) -> String {
    let mut by_config: Vec<(&str, Vec<&str>)> = Vec::new();
    for instance in &group.instances {
        let name = instance.launch_config_name.as_deref().unwrap_or("-");
        match by_config.iter_mut().find(|(config, _)| *config == name) {
            Some((_, ids)) => ids.push(&instance.instance_id),
            None => by_config.push((name, vec![&instance.instance_id])),
        }
    }
    by_config
        .iter()
        .map(|(config, ids)| format!("LC:{} ({})\n  {}", config, ids.len(), ids.join("\n  ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolved stack information, one `key: value` per line.
pub fn format_property_map(properties: &PropertyMap) -> String {
    properties
        .iter()
        .map(|(key, value)| format!("  {}: {}", key, property_to_string(value)))
        .collect::<Vec<_>>()
        .join("\n")
}
