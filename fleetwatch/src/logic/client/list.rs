use crate::cli::OutputFormat;
use crate::logic::poll::{StatusSink, TelemetryFeed};
use crate::logic::status::{find_matching, resolve};
use crate::logic::types::{
    DeviceStatus, FetchOutcome, FleetCounts, Icon, Notice, SleepSummary, StateFlag,
};
use chrono::Utc;
use colored::*;

/// Colored status dot for one device
fn state_indicator(state: StateFlag) -> String {
    match state {
        StateFlag::Online => "●".green().to_string(),
        StateFlag::Driving => "●".bright_green().to_string(),
        StateFlag::Offline => "●".red().to_string(),
        StateFlag::Empty => "●".yellow().to_string(),
    }
}

/// Short tag for the location-source icon column
fn icon_tag(icon: Icon) -> &'static str {
    match icon {
        Icon::CellTower => "cell",
        Icon::Satellite => "gps",
        Icon::Wifi => "wifi",
        Icon::CellTowerOff => "cell-off",
        Icon::SatelliteOff => "gps-off",
        Icon::WifiOff => "wifi-off",
        Icon::NoData => "nodata",
    }
}

/// Print the fleet as a table with a summary line
pub fn display_fleet_table(devices: &[DeviceStatus]) {
    println!(
        "{:<3} {:<36} {:<40} {:<10}",
        "ST".bright_white().bold(),
        "DEVICE".bright_white().bold(),
        "STATUS".bright_white().bold(),
        "SOURCE".bright_white().bold()
    );
    println!("{}", "─".repeat(90).bright_blue());

    for device in devices {
        let name = if device.update_available {
            format!("{} {}", device.display_name, "⬆".bright_yellow())
        } else {
            device.display_name.clone()
        };
        println!(
            "{:<3} {:<36} {:<40} {:<10}",
            state_indicator(device.state),
            name,
            device.status_line,
            icon_tag(device.icon)
        );
    }

    let counts = FleetCounts::tally(devices);
    println!(
        "{} {} all, {} online, {} offline",
        "Summary:".bright_white().bold(),
        counts.all.to_string().bright_blue(),
        counts.online.to_string().green(),
        counts.offline.to_string().red()
    );
}

/// Print the fleet one device per line
pub fn display_fleet_compact(devices: &[DeviceStatus]) {
    for device in devices {
        println!(
            "{} {} {}",
            state_indicator(device.state),
            device.display_name,
            device.status_line
        );
    }
}

pub fn display_fleet(devices: &[DeviceStatus], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(devices)?),
        OutputFormat::Table => display_fleet_table(devices),
        OutputFormat::Compact => display_fleet_compact(devices),
    }
    Ok(())
}

/// Print one aggregated night
pub fn display_sleep(summary: &SleepSummary) {
    println!(
        "{} {} → {}",
        "Night:".bright_white().bold(),
        summary.sleep_start.format("%Y-%m-%d %H:%M"),
        summary.sleep_end.format("%Y-%m-%d %H:%M")
    );
    println!(
        "  deep {}m  light {}m  awake {}m  (total {}m)",
        summary.deep_minutes.to_string().bright_blue(),
        summary.light_minutes.to_string().cyan(),
        summary.wake_minutes.to_string().yellow(),
        summary.total_minutes()
    );
    println!("  quality: {}", summary.quality.bright_white().bold());
}

/// Fetch the fleet once, resolve it and print it. With a query, restrict
/// to devices whose name or imei matches.
pub async fn run_once(
    feed: &dyn TelemetryFeed,
    query: Option<&str>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    match feed.fetch_fleet().await? {
        FetchOutcome::NoData => {
            println!("{}", "No device data available.".yellow());
        }
        FetchOutcome::Fleet(records) => {
            let now = Utc::now();
            let devices = match query {
                Some(q) => find_matching(&records, q, now),
                None => records.iter().map(|r| resolve(r, now)).collect(),
            };
            if devices.is_empty() {
                println!("{}", "No matching devices.".yellow());
            } else {
                display_fleet(&devices, format)?;
            }
        }
    }
    Ok(())
}

/// Reference `StatusSink` that renders to the terminal, used by the
/// `watch` subcommand
pub struct TerminalSink {
    format: OutputFormat,
}

impl TerminalSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl StatusSink for TerminalSink {
    fn snapshot(&self, devices: &[DeviceStatus]) {
        println!();
        println!(
            "{} {}",
            "Last updated:".bright_cyan(),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        if display_fleet(devices, &self.format).is_err() {
            eprintln!("{}", "Failed to render snapshot.".red());
        }
    }

    fn sleep(&self, summary: Option<&SleepSummary>) {
        match summary {
            Some(summary) => display_sleep(summary),
            None => println!("{}", "Not enough valid sleep samples.".yellow()),
        }
    }

    fn notice(&self, notice: Notice) {
        let line = match notice {
            Notice::NetNoLink => "No network link.".red().to_string(),
            Notice::NetError => "Network error, keeping last snapshot.".red().to_string(),
            Notice::NoData => "No device data available.".yellow().to_string(),
            Notice::RefreshFinish => "Refresh finished.".green().to_string(),
        };
        println!("{} {}", format!("[{}]", notice.key()).dimmed(), line);
    }
}
