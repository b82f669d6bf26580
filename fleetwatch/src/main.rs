// fleetwatch/src/main.rs

use anyhow::Context;
use clap::Parser;
use colored::*;
use fleetwatch::cli::{Cli, Commands, ConfigAction, LoginKind, OutputFormat};
use fleetwatch::database::Settings;
use fleetwatch::logic::client::{list, Credentials, EndpointBook, HttpFeed};
use fleetwatch::logic::config::{PollConfig, DEFAULT_REFRESH_SECS};
use fleetwatch::logic::poll::{keys, PollScheduler, SettingsStore, StaticTransport};
use fleetwatch::logic::sleep;
use fleetwatch::logic::types::{SleepSample, Transport};
use std::sync::Arc;

fn build_feed(
    servers: &[String],
    user: String,
    password: String,
    login: LoginKind,
    timeout_secs: u64,
) -> anyhow::Result<HttpFeed> {
    let endpoints = EndpointBook::new(servers.to_vec())?;
    HttpFeed::new(
        endpoints,
        Credentials {
            mode: login.into(),
            user,
            password,
        },
        timeout_secs,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Cli::parse();

    match args.command {
        Commands::Watch {
            user,
            password,
            login,
            interval,
            db_path,
            config,
            device_utc_offset,
            stale_policy,
            format,
        } => {
            // Config file first, then CLI overrides on top
            let mut poll_config = if let Some(path) = &config {
                PollConfig::from_file(path)?
            } else {
                PollConfig::from_args_and_env(None, None, None)
            };
            if let Some(offset) = device_utc_offset {
                poll_config.device_utc_offset_hours = offset;
            }
            if let Some(mode) = stale_policy {
                poll_config.stale_policy = mode.into();
            }

            let settings = Arc::new(Settings::open(&db_path)?);
            let feed = build_feed(
                &args.servers,
                user,
                password,
                login,
                poll_config.request_timeout_secs,
            )?;
            let scheduler = PollScheduler::new(
                Arc::new(feed),
                Arc::new(StaticTransport(Transport::Wifi)),
                Arc::new(list::TerminalSink::new(format)),
                Some(settings),
                poll_config,
            );

            scheduler.start(interval);
            println!(
                "{}",
                format!(
                    "Polling every {}s. Press Ctrl+C to exit...",
                    scheduler.current_interval()
                )
                .bright_cyan()
            );
            tokio::signal::ctrl_c().await?;
            scheduler.stop();
            println!("\nStopped.");
        }

        Commands::List {
            user,
            password,
            login,
            format,
        } => {
            let feed = build_feed(
                &args.servers,
                user,
                password,
                login,
                PollConfig::default().request_timeout_secs,
            )?;
            list::run_once(&feed, None, &format).await?;
        }

        Commands::Find {
            query,
            user,
            password,
            login,
            format,
        } => {
            let feed = build_feed(
                &args.servers,
                user,
                password,
                login,
                PollConfig::default().request_timeout_secs,
            )?;
            list::run_once(&feed, Some(&query), &format).await?;
        }

        Commands::Sleep { file, date, format } => {
            let path = shellexpand::tilde(&file).into_owned();
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading sleep samples from {}", path))?;
            let samples: Vec<SleepSample> =
                serde_json::from_str(&contents).context("parsing sleep samples")?;
            let day = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let (window_start, window_end) = sleep::default_window(day);

            match sleep::aggregate(&samples, window_start, window_end, |_| true) {
                Some(summary) => match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&summary)?)
                    }
                    _ => list::display_sleep(&summary),
                },
                None => println!(
                    "{}",
                    format!(
                        "Not enough valid sleep samples (need {}).",
                        sleep::MIN_SAMPLES
                    )
                    .yellow()
                ),
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { db_path } => {
                let settings = Settings::open(&db_path)?;
                let interval = settings.get_u64(keys::REFRESH_INTERVAL, DEFAULT_REFRESH_SECS);
                let filter = settings.get_string(keys::SELECTED_FILTER, "");
                let catalog = settings.get_string(keys::MODEL_CATALOG, "");
                let cache = settings.get_string(keys::FLEET_CACHE, "");
                println!("refresh interval: {}s", interval);
                println!(
                    "selected filter:  {}",
                    if filter.is_empty() { "(none)" } else { filter.as_str() }
                );
                println!(
                    "model catalog:    {}",
                    if catalog.is_empty() { "(none)" } else { catalog.as_str() }
                );
                println!("cached fleet:     {} bytes", cache.len());
            }
            ConfigAction::Set {
                db_path,
                refresh_interval,
                filter,
                model_catalog,
            } => {
                let settings = Settings::open(&db_path)?;
                if let Some(interval) = refresh_interval {
                    settings.put_u64(keys::REFRESH_INTERVAL, interval);
                    println!("✓ refresh interval set to {}s", interval);
                }
                if let Some(filter) = filter {
                    settings.put_string(keys::SELECTED_FILTER, &filter);
                    println!("✓ selected filter set to `{}`", filter);
                }
                if let Some(catalog) = model_catalog {
                    settings.put_string(keys::MODEL_CATALOG, &catalog);
                    println!("✓ model catalog updated");
                }
            }
        },
    }

    Ok(())
}
