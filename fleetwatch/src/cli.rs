use crate::logic::client::LoginMode;
use crate::logic::config::StalePolicy;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Compact,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LoginKind {
    /// Account name + password
    Account,
    /// 15-digit device imei + password
    Imei,
}

impl From<LoginKind> for LoginMode {
    fn from(kind: LoginKind) -> Self {
        match kind {
            LoginKind::Account => LoginMode::Account,
            LoginKind::Imei => LoginMode::Imei,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StaleMode {
    /// Apply fetch completions in arrival order (stock behavior)
    LastWriteWins,
    /// Discard completions older than the last applied one
    DropStale,
}

impl From<StaleMode> for StalePolicy {
    fn from(mode: StaleMode) -> Self {
        match mode {
            StaleMode::LastWriteWins => StalePolicy::LastWriteWins,
            StaleMode::DropStale => StalePolicy::DropStale,
        }
    }
}

/// GPS tracker fleet polling, status decoding and sleep aggregation
#[derive(Parser)]
#[command(name = "fleetwatch")]
pub struct Cli {
    /// Fleet service endpoint; repeat the flag to provide fallback mirrors
    #[arg(
        short = 's',
        long = "server",
        env = "FLEETWATCH_SERVER",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:3030"
    )]
    pub servers: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the fleet on a cadence and render every snapshot
    Watch {
        /// Account name (or imei with `--login imei`)
        #[arg(short, long, env = "FLEETWATCH_USER")]
        user: String,
        /// Account or device password
        #[arg(short, long, env = "FLEETWATCH_PASS")]
        password: String,
        /// Login mode
        #[arg(long, default_value = "account")]
        login: LoginKind,
        /// Refresh interval in seconds (0: stored value, then default)
        #[arg(short, long, default_value_t = 0)]
        interval: u64,
        /// Path to the settings database (supports `~`)
        #[arg(long, default_value = "~/.local/share/fleetwatch")]
        db_path: String,
        /// Path to a TOML configuration file (supports `~`)
        #[arg(short, long)]
        config: Option<String>,
        /// Device wall-clock UTC offset in hours (overrides config file)
        #[arg(long)]
        device_utc_offset: Option<i64>,
        /// Out-of-order completion handling (overrides config file)
        #[arg(long)]
        stale_policy: Option<StaleMode>,
        /// Output format: table (default), json, or compact
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Fetch the fleet once and print every device
    List {
        #[arg(short, long, env = "FLEETWATCH_USER")]
        user: String,
        #[arg(short, long, env = "FLEETWATCH_PASS")]
        password: String,
        #[arg(long, default_value = "account")]
        login: LoginKind,
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Fetch once and show only devices matching a name/imei substring
    Find {
        /// Substring matched against device names and imeis
        #[arg(value_name = "QUERY")]
        query: String,
        #[arg(short, long, env = "FLEETWATCH_USER")]
        user: String,
        #[arg(short, long, env = "FLEETWATCH_PASS")]
        password: String,
        #[arg(long, default_value = "account")]
        login: LoginKind,
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Aggregate a night of sleep samples from a JSON file
    Sleep {
        /// JSON array of `{"stamp": ..., "stage": 1|2|3}` samples
        #[arg(value_name = "FILE")]
        file: String,
        /// Day the night ends on, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Stored settings management (show, set)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the stored settings
    Show {
        #[arg(long, default_value = "~/.local/share/fleetwatch")]
        db_path: String,
    },
    /// Update stored settings
    Set {
        #[arg(long, default_value = "~/.local/share/fleetwatch")]
        db_path: String,
        /// Refresh interval in seconds
        #[arg(long)]
        refresh_interval: Option<u64>,
        /// Device-list filter to preselect
        #[arg(long)]
        filter: Option<String>,
        /// Server model catalog (`M<model>v<version>,...`)
        #[arg(long)]
        model_catalog: Option<String>,
    },
}
