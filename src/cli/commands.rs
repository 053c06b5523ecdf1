//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - apps/resolve/parameters: inspect the application settings
//! - list/info/resources/outputs/events/activities: inspect CloudFormation stacks
//! - create/update/delete: manage stacks
//! - status/setcapacity/setlimit/shutdown/startup/migrate/show-cfg/metrics: AutoScaling

use awstools::autoscale::Limits;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// awstools - CloudFormation and AutoScaling helpers
#[derive(Parser, Debug)]
#[command(name = "awstools")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Application settings file (overrides the configured one)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the applications of the settings file
    Apps,

    /// Print the resolved properties of a stack
    Resolve {
        /// Stack name like tt-python-production
        stack_name: String,
    },

    /// Print the template parameters that would be sent for a stack
    Parameters {
        stack_name: String,

        /// Use a different template file
        #[arg(short, long)]
        template: Option<String>,
    },

    /// List stacks whose name contains a pattern
    List {
        pattern: Option<String>,

        /// Include deleted stacks
        #[arg(short, long)]
        all: bool,
    },

    /// Describe a stack: parameters, outputs, recent events and resources
    Info { stack_name: String },

    /// List the resources of a stack
    Resources { stack_name: String },

    /// Print the outputs of a stack
    Outputs { stack_name: String },

    /// Print every event of a stack
    Events { stack_name: String },

    /// List the stacks with an operation in progress or failed
    Activities,

    /// Create a stack from its template and resolved properties
    Create {
        stack_name: String,

        #[arg(short, long)]
        template: Option<String>,

        /// Don't ask for confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Update a stack from its template and resolved properties
    Update {
        stack_name: String,

        #[arg(short, long)]
        template: Option<String>,

        #[arg(short, long)]
        force: bool,
    },

    /// Delete a stack
    Delete {
        stack_name: String,

        #[arg(short, long)]
        force: bool,
    },

    /// Show the group and load balancer instances of matching stacks
    Status { stack_name: String },

    /// Change the desired capacity of the stack's group
    Setcapacity {
        stack_name: String,

        /// AutoScale desired capacity
        capacity: u32,

        #[arg(short, long)]
        force: bool,
    },

    /// Change the min and/or max of the stack's group
    Setlimit {
        stack_name: String,

        /// MIN:MAX, either side optional (eg: 10:20 or :2)
        limits: Limits,

        #[arg(short, long)]
        force: bool,
    },

    /// Scale the stack's group down to zero
    Shutdown {
        stack_name: String,

        #[arg(short, long)]
        force: bool,
    },

    /// Scale the stack's group to its configured values
    Startup {
        stack_name: String,

        #[arg(short, long)]
        force: bool,
    },

    /// Replace every instance of the stack's group
    Migrate {
        stack_name: String,

        /// Don't ask for confirmation, including before restoring the group
        /// config after a failed migration
        #[arg(short, long)]
        force: bool,

        /// Poll until the group converges, however long it takes
        #[arg(long)]
        unbounded: bool,
    },

    /// List the group instances with their launch configuration
    ShowCfg { stack_name: String },

    /// Show, enable or disable the group metrics collection
    Metrics {
        stack_name: String,

        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,
    },
}

impl Commands {
    /// Stack name the command applies to, if any.
    pub fn stack_name(&self) -> Option<&str> {
        match self {
            Commands::Apps | Commands::List { .. } | Commands::Activities => None,
            Commands::Resolve { stack_name }
            | Commands::Parameters { stack_name, .. }
            | Commands::Info { stack_name }
            | Commands::Resources { stack_name }
            | Commands::Outputs { stack_name }
            | Commands::Events { stack_name }
            | Commands::Create { stack_name, .. }
            | Commands::Update { stack_name, .. }
            | Commands::Delete { stack_name, .. }
            | Commands::Status { stack_name }
            | Commands::Setcapacity { stack_name, .. }
            | Commands::Setlimit { stack_name, .. }
            | Commands::Shutdown { stack_name, .. }
            | Commands::Startup { stack_name, .. }
            | Commands::Migrate { stack_name, .. }
            | Commands::ShowCfg { stack_name }
            | Commands::Metrics { stack_name, .. } => Some(stack_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["awstools"]).is_err());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "awstools",
            "apps",
            "-v",
            "-c",
            "/path/to/awstools.yml",
            "--settings",
            "/path/to/apps.yml",
        ])
        .unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/awstools.yml")));
        assert_eq!(cli.settings.as_ref(), Some(&PathBuf::from("/path/to/apps.yml")));
        assert!(matches!(cli.command, Commands::Apps));
    }

    #[test]
    fn test_list_defaults() {
        let cli = Cli::try_parse_from(["awstools", "list"]).unwrap();
        match cli.command {
            Commands::List { pattern, all } => {
                assert!(pattern.is_none());
                assert!(!all);
            }
            _ => panic!("Expected list command"),
        }
    }

    #[test]
    fn test_list_all_with_pattern() {
        let cli = Cli::try_parse_from(["awstools", "list", "python", "--all"]).unwrap();
        match cli.command {
            Commands::List { pattern, all } => {
                assert_eq!(pattern.as_deref(), Some("python"));
                assert!(all);
            }
            _ => panic!("Expected list command"),
        }
    }

    #[test]
    fn test_setlimit_parses_limits() {
        let cli = Cli::try_parse_from(["awstools", "setlimit", "tt-python-stage", ":2"]).unwrap();
        match cli.command {
            Commands::Setlimit { limits, force, .. } => {
                assert_eq!(limits, Limits { min: None, max: Some(2) });
                assert!(!force);
            }
            _ => panic!("Expected setlimit command"),
        }
        assert!(Cli::try_parse_from(["awstools", "setlimit", "tt-python-stage", "12"]).is_err());
    }

    #[test]
    fn test_setcapacity_rejects_negative() {
        assert!(Cli::try_parse_from(["awstools", "setcapacity", "tt-python-stage", "-1"]).is_err());
        let cli = Cli::try_parse_from(["awstools", "setcapacity", "tt-python-stage", "4", "-f"]).unwrap();
        assert!(matches!(cli.command, Commands::Setcapacity { capacity: 4, force: true, .. }));
    }

    #[test]
    fn test_migrate_flags() {
        let cli = Cli::try_parse_from(["awstools", "migrate", "tt-python-production", "--unbounded"]).unwrap();
        match cli.command {
            Commands::Migrate { force, unbounded, .. } => {
                assert!(!force);
                assert!(unbounded);
            }
            _ => panic!("Expected migrate command"),
        }
    }

    #[test]
    fn test_migrate_force_covers_restore() {
        let command = Cli::command();
        let migrate = command.find_subcommand("migrate").unwrap();
        let force = migrate.get_arguments().find(|a| a.get_id() == "force").unwrap();
        let help = force.get_help().unwrap().to_string();
        assert!(help.contains("restoring the group config"));
    }

    #[test]
    fn test_metrics_flags() {
        let cli = Cli::try_parse_from(["awstools", "metrics", "tt-python-stage", "--enable"]).unwrap();
        assert!(matches!(cli.command, Commands::Metrics { enable: true, disable: false, .. }));
        assert_eq!(cli.command.stack_name(), Some("tt-python-stage"));

        let cli = Cli::try_parse_from(["awstools", "metrics", "tt-python-stage"]).unwrap();
        assert!(matches!(cli.command, Commands::Metrics { enable: false, disable: false, .. }));

        assert!(Cli::try_parse_from(["awstools", "metrics", "tt-python-stage", "--enable", "--disable"]).is_err());
    }

    #[test]
    fn test_stack_inspection_commands() {
        let cli = Cli::try_parse_from(["awstools", "outputs", "tt-python-stage"]).unwrap();
        assert!(matches!(cli.command, Commands::Outputs { .. }));
        let cli = Cli::try_parse_from(["awstools", "events", "tt-python-stage"]).unwrap();
        assert_eq!(cli.command.stack_name(), Some("tt-python-stage"));
        let cli = Cli::try_parse_from(["awstools", "activities"]).unwrap();
        assert_eq!(cli.command.stack_name(), None);
    }

    #[test]
    fn test_show_cfg_name() {
        let cli = Cli::try_parse_from(["awstools", "show-cfg", "tt-python-production"]).unwrap();
        assert_eq!(cli.command.stack_name(), Some("tt-python-production"));
    }

    #[test]
    fn test_create_template_override() {
        let cli = Cli::try_parse_from(["awstools", "create", "tt-python-stage", "--template", "other.json"]).unwrap();
        match cli.command {
            Commands::Create { template, .. } => assert_eq!(template.as_deref(), Some("other.json")),
            _ => panic!("Expected create command"),
        }
    }

    #[test]
    fn test_verify_cli() {
        Cli::command().debug_assert();
    }
}
