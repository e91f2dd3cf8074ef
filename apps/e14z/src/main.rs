//! e14z - secure auto-installer and launcher for MCP servers
//!
//! This is the CLI front-end. It loads configuration, wires the event
//! channel into `tracing` and hands each command to the library crates.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{CacheCommands, Cli, Commands};
use crate::display::{IntegrityRow, OutputRenderer};
use crate::error::CliError;
use clap::Parser;
use e14z_cache::CacheManager;
use e14z_config::Config;
use e14z_events::EventSender;
use e14z_guard::Verifier;
use e14z_install::{AutoInstaller, StaticRegistry};
use e14z_sandbox::SandboxedExecutor;
use e14z_types::InstallOptions;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    logging::init_tracing(
        &config.general.log_filter,
        config.general.json_logs,
        cli.global.debug,
    );

    if let Err(e) = run(cli, config).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// File (or defaults), then environment, then CLI flags
async fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    if let Some(dir) = &cli.global.cache_dir {
        config.cache.root = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli, config: Config) -> Result<(), CliError> {
    info!("Starting e14z v{}", env!("CARGO_PKG_VERSION"));
    let renderer = OutputRenderer::new(cli.global.json);
    let (event_sender, event_receiver) = e14z_events::channel();

    logging::with_events(
        execute_command(cli.command, config, event_sender, &renderer),
        event_receiver,
    )
    .await
}

async fn execute_command(
    command: Commands,
    config: Config,
    events: EventSender,
    renderer: &OutputRenderer,
) -> Result<(), CliError> {
    match command {
        Commands::Run {
            slug,
            registry,
            method,
            env,
            timeout,
        } => {
            let config = Arc::new(config);
            let registry = Arc::new(StaticRegistry::load(&registry).await?);
            let cache_root = config.cache.root_dir();
            let runner = Arc::new(
                SandboxedExecutor::new(&config)
                    .with_root(&cache_root)
                    .with_event_sender(events.clone()),
            );

            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());
            let installer = AutoInstaller::new(Arc::clone(&config), registry, runner)?
                .with_event_sender(events)
                .with_cancellation(cancel);

            let recovered = installer.recover().await?;
            if recovered > 0 {
                warn!(recovered, "rolled back interrupted installs from a previous run");
            }

            let options = InstallOptions {
                timeout: timeout.map(Duration::from_secs),
                preferred_method: method,
                env: env.into_iter().collect(),
            };

            let outcome = installer.install_and_run(&slug, options).await;
            renderer.render_outcome(&outcome)?;
            if outcome.success {
                Ok(())
            } else {
                Err(CliError::RunFailed(format!(
                    "{slug} is not usable{}",
                    outcome
                        .category
                        .map(|c| format!(" ({c})"))
                        .unwrap_or_default()
                )))
            }
        }

        Commands::Parse { command } => {
            let descriptor = e14z_descriptor::parse(&command)?;
            renderer.render_descriptor(&descriptor)?;
            Ok(())
        }

        Commands::Verify { command } => {
            let descriptor = e14z_descriptor::parse(&command)?;
            let verifier = Verifier::from_config(&config.security)?;
            let result = verifier.analyze(&descriptor, None);
            renderer.render_validation(&descriptor, &result, verifier.min_score())?;
            if result.is_blocking(verifier.min_score()) {
                return Err(CliError::RunFailed(format!(
                    "{} failed verification",
                    descriptor.full_name()
                )));
            }
            Ok(())
        }

        Commands::Cache(cache_command) => {
            let cache = CacheManager::from_config(&config).with_event_sender(events);
            execute_cache_command(cache_command, &cache, renderer).await
        }
    }
}

async fn execute_cache_command(
    command: CacheCommands,
    cache: &CacheManager,
    renderer: &OutputRenderer,
) -> Result<(), CliError> {
    match command {
        CacheCommands::Stats => {
            renderer.render_stats(&cache.cache_stats().await?)?;
        }
        CacheCommands::List => {
            let entries: Vec<_> = cache
                .list_entries()
                .await?
                .into_iter()
                .map(|(_, entry)| entry)
                .collect();
            renderer.render_entries(&entries)?;
        }
        CacheCommands::Clean {
            max_age_days,
            max_size,
            keep_corrupted,
        } => {
            let mut options = cache.default_cleanup();
            if let Some(days) = max_age_days {
                options.max_age = i64::try_from(days)
                    .ok()
                    .and_then(chrono::Duration::try_days);
            }
            if max_size.is_some() {
                options.max_size = max_size;
            }
            options.remove_corrupted = !keep_corrupted;
            renderer.render_cleanup(&cache.cleanup(options).await?)?;
        }
        CacheCommands::Verify => {
            let mut rows = Vec::new();
            for (location, entry) in cache.list_entries().await? {
                let intact = cache.verify_integrity(&location).await?;
                rows.push(IntegrityRow {
                    name: entry.name,
                    version: entry.version,
                    intact,
                });
            }
            renderer.render_integrity(&rows)?;
            let corrupted = rows.iter().filter(|row| !row.intact).count();
            if corrupted > 0 {
                return Err(CliError::RunFailed(format!(
                    "{corrupted} cache entries failed verification"
                )));
            }
        }
        CacheCommands::Recover => {
            let journal_dir = cache.root().join(e14z_config::constants::JOURNAL_DIR);
            let recovered = e14z_install::recover_journals(&journal_dir).await?;
            renderer.render_recovered(recovered.len())?;
        }
    }
    Ok(())
}

/// Cancel in-flight work on Ctrl-C so children are reaped and rolled back
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });
}
