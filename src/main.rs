use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use awstools::autoscale::CapacityRequest;
use awstools::config::GlobalConfig;
use awstools::provider::AwsSdkProvider;
use cli::Cli;
use cli::commands::Commands;
use cli::handlers::{self, StackAction};

/// `--verbose` forces debug logging; otherwise `RUST_LOG` decides.
fn log_level(verbose: bool) -> Option<log::LevelFilter> {
    verbose.then_some(log::LevelFilter::Debug)
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("awstools")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("awstools.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Pipe(target));
    if let Some(level) = log_level(verbose) {
        builder.filter_level(level);
    }
    builder.init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &GlobalConfig) -> Result<()> {
    info!("Running {:?}", cli.command);

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let provider = Arc::new(AwsSdkProvider::load(&config.aws.to_sdk_config()).await);
    let settings = cli.settings.as_deref();

    // Commands without a stack name never read the settings file
    let stack_info = match cli.command.stack_name() {
        Some(stack_name) if needs_stack_info(&cli.command) => {
            let apps = handlers::load_applications(config, settings)?;
            Some(handlers::resolve_stack_info(&apps, stack_name)?)
        }
        _ => None,
    };
    let stack_info = stack_info.unwrap_or_default();

    match &cli.command {
        Commands::Apps => {
            let apps = handlers::load_applications(config, settings)?;
            handlers::handle_apps(&apps)
        }
        Commands::Resolve { stack_name } => {
            let apps = handlers::load_applications(config, settings)?;
            handlers::handle_resolve(&apps, stack_name)
        }
        Commands::Parameters { stack_name, template } => {
            let apps = handlers::load_applications(config, settings)?;
            handlers::handle_parameters(config, &apps, stack_name, template.as_deref())
        }
        Commands::List { pattern, all } => handlers::handle_list(provider.as_ref(), pattern.as_deref(), *all).await,
        Commands::Info { stack_name } => handlers::handle_info(provider.as_ref(), stack_name).await,
        Commands::Resources { stack_name } => handlers::handle_resources(provider.as_ref(), stack_name).await,
        Commands::Outputs { stack_name } => handlers::handle_outputs(provider.as_ref(), stack_name).await,
        Commands::Events { stack_name } => handlers::handle_events(provider.as_ref(), stack_name).await,
        Commands::Activities => handlers::handle_activities(provider.as_ref()).await,
        Commands::Create {
            stack_name,
            template,
            force,
        } => {
            handlers::handle_deploy(
                provider.as_ref(),
                config,
                &stack_info,
                stack_name,
                template.as_deref(),
                StackAction::Create,
                *force,
            )
            .await
        }
        Commands::Update {
            stack_name,
            template,
            force,
        } => {
            handlers::handle_deploy(
                provider.as_ref(),
                config,
                &stack_info,
                stack_name,
                template.as_deref(),
                StackAction::Update,
                *force,
            )
            .await
        }
        Commands::Delete { stack_name, force } => {
            handlers::handle_delete(provider.as_ref(), &stack_info, stack_name, *force).await
        }
        Commands::Status { stack_name } => handlers::handle_status(provider.as_ref(), stack_name).await,
        Commands::Setcapacity {
            stack_name,
            capacity,
            force,
        } => {
            let request = CapacityRequest::desired(*capacity);
            handlers::handle_capacity(provider.as_ref(), &stack_info, stack_name, request, *force).await
        }
        Commands::Setlimit {
            stack_name,
            limits,
            force,
        } => {
            let request = handlers::limits_request(*limits);
            handlers::handle_capacity(provider.as_ref(), &stack_info, stack_name, request, *force).await
        }
        Commands::Shutdown { stack_name, force } => {
            let request = CapacityRequest::exact(0, 0, 0);
            handlers::handle_capacity(provider.as_ref(), &stack_info, stack_name, request, *force).await
        }
        Commands::Startup { stack_name, force } => {
            let request = handlers::startup_request(&stack_info)?;
            handlers::handle_capacity(provider.as_ref(), &stack_info, stack_name, request, *force).await
        }
        Commands::Migrate {
            stack_name,
            force,
            unbounded,
        } => handlers::handle_migrate(provider, config, &stack_info, stack_name, *force, *unbounded).await,
        Commands::ShowCfg { stack_name } => handlers::handle_show_cfg(provider.as_ref(), stack_name).await,
        Commands::Metrics {
            stack_name,
            enable,
            disable,
        } => handlers::handle_metrics(provider.as_ref(), stack_name, *enable, *disable).await,
    }
}

/// Commands that mutate a stack or its group need its resolved properties.
fn needs_stack_info(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Create { .. }
            | Commands::Update { .. }
            | Commands::Delete { .. }
            | Commands::Setcapacity { .. }
            | Commands::Setlimit { .. }
            | Commands::Shutdown { .. }
            | Commands::Startup { .. }
            | Commands::Migrate { .. }
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = GlobalConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
