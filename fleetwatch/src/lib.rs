//! # fleetwatch
//!
//! GPS tracker fleet polling, status decoding and sleep aggregation.
//!
//! The crate separates the pure decoding core from the collaborators that
//! feed and consume it:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PollScheduler                          │
//! │   timer ──▶ gate (connectivity, in-flight, debounce)         │
//! │                │                                             │
//! │                ▼                                             │
//! │         TelemetryFeed (HTTP) ──▶ status::resolve ──▶ sink    │
//! │                │                                             │
//! │                └──▶ SettingsStore (interval, cached fleet)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`logic::status`]: one telemetry record in, a structured
//!   [`DeviceStatus`] out; never fails, malformed input degrades to the
//!   empty state
//! - [`logic::sleep`]: timestamped stage samples in, a night summary out
//! - [`logic::poll`]: the connectivity-aware scheduler and the
//!   collaborator traits ([`TelemetryFeed`], [`Connectivity`],
//!   [`StatusSink`], [`SettingsStore`])
//! - [`logic::client`]: the reqwest-backed feed, endpoint rotation and
//!   terminal rendering
//! - [`database`]: SQLite-backed key-value settings
//!
//! The `fleetwatch` binary wires these together for the command line;
//! embedders supply their own sink and connectivity probe instead.

pub mod cli;
pub mod database;
pub mod logic;

// Re-export the main types for convenience
pub use database::Settings;
pub use logic::client::{Credentials, EndpointBook, HttpFeed, LoginMode};
pub use logic::config::{PollConfig, StalePolicy};
pub use logic::poll::{
    Connectivity, PollScheduler, SettingsStore, StaticTransport, StatusSink, TelemetryFeed,
};
pub use logic::sleep::{aggregate, DefaultQualityScale, QualityScale};
pub use logic::status::{find_matching, resolve};
pub use logic::types::{
    DeviceStatus, FetchOutcome, FleetCounts, Icon, LogCode, Notice, SleepSample, SleepStage,
    SleepSummary, StateFlag, TelemetryRecord, Transport,
};
