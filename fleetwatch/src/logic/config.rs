use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Refresh cadence applied when no interval was ever configured
pub const DEFAULT_REFRESH_SECS: u64 = 180;

/// Two triggers inside this window collapse to one fetch
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// What to do with a fetch completion that is older than the last one
/// applied. The shipped behavior is last-write-wins; `DropStale` discards
/// out-of-order completions instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalePolicy {
    LastWriteWins,
    DropStale,
}

/// Poll scheduler and resolver timing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between fleet-list fetches (0 means "use the default")
    pub refresh_interval_secs: u64,
    /// Trigger debounce window in milliseconds
    pub debounce_ms: u64,
    /// Trackers report wall-clock timestamps in this UTC offset
    pub device_utc_offset_hours: i64,
    /// Out-of-order completion handling
    pub stale_policy: StalePolicy,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            device_utc_offset_hours: 8,
            stale_policy: StalePolicy::LastWriteWins,
            request_timeout_secs: 15,
        }
    }
}

impl PollConfig {
    /// Load configuration from a TOML file (supports `~`)
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::tilde(path).into_owned();
        let contents = std::fs::read_to_string(&expanded)
            .with_context(|| format!("reading config file {}", expanded))?;
        let config: PollConfig =
            toml::from_str(&contents).with_context(|| format!("parsing {}", expanded))?;
        Ok(config)
    }

    /// Create configuration from command line arguments and environment variables
    pub fn from_args_and_env(
        refresh_interval: Option<u64>,
        device_utc_offset: Option<i64>,
        stale_policy: Option<StalePolicy>,
    ) -> Self {
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(val) = std::env::var("FLEETWATCH_REFRESH_INTERVAL") {
            if let Ok(parsed) = val.parse() {
                config.refresh_interval_secs = parsed;
            }
        }
        if let Ok(val) = std::env::var("FLEETWATCH_DEVICE_UTC_OFFSET") {
            if let Ok(parsed) = val.parse() {
                config.device_utc_offset_hours = parsed;
            }
        }

        // Override with command line arguments (highest priority)
        if let Some(val) = refresh_interval {
            config.refresh_interval_secs = val;
        }
        if let Some(val) = device_utc_offset {
            config.device_utc_offset_hours = val;
        }
        if let Some(val) = stale_policy {
            config.stale_policy = val;
        }

        config
    }

    /// An unset (zero) interval falls back to the stock cadence
    pub fn effective_interval(requested: u64) -> u64 {
        if requested == 0 {
            DEFAULT_REFRESH_SECS
        } else {
            requested
        }
    }
}
