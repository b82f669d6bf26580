use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One device's latest report as it arrives from the fleet-list endpoint.
///
/// Every field beyond `imei`/`name` may be missing or carry the literal
/// string `"null"`; resolution treats both the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub imei: String,
    pub name: String,
    /// Model number, used against the server's model catalog
    #[serde(default)]
    pub device: String,
    /// Firmware version as reported by the device
    #[serde(default)]
    pub ver: Option<String>,
    /// Battery percent, stringly typed on the wire
    #[serde(default)]
    pub bat: Option<String>,
    /// Log code: `IN`/`CH`/`OUT`/`SHD` prefix plus timestamp, a bare
    /// timestamp, or free text
    #[serde(default)]
    pub log: Option<String>,
    /// Comma separated tuple: time, lat, lon, speed, heading
    #[serde(default)]
    pub gps: Option<String>,
    /// Device-kind marker (pet, car, ...)
    #[serde(default)]
    pub marker: i32,
    /// Location source: 0/2 cell tower, 1 satellite, 3 wifi
    #[serde(default)]
    pub icon: i32,
}

/// Classified log code. `Online`/`Offline` decide the state flag; `Bare`
/// and `Unknown` never do, regardless of how healthy the GPS tuple looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogCode {
    Online { stamp: String },
    Offline { stamp: String },
    Bare { stamp: String },
    Unknown,
}

impl LogCode {
    /// Classify a raw log code by prefix. `IN`/`CH` carry a 3-character
    /// prefix, `OUT`/`SHD` a 4-character one; a code opening with `20`
    /// is a bare timestamp.
    pub fn classify(log: &str) -> LogCode {
        if log.is_empty() || log == "null" {
            return LogCode::Unknown;
        }
        if log.starts_with("IN") || log.starts_with("CH") {
            return LogCode::Online {
                stamp: log.get(3..).unwrap_or("").trim().to_string(),
            };
        }
        if log.starts_with("OUT") || log.starts_with("Out") || log.starts_with("SHD") {
            return LogCode::Offline {
                stamp: log.get(4..).unwrap_or("").trim().to_string(),
            };
        }
        if log.starts_with("20") {
            return LogCode::Bare {
                stamp: log.trim().to_string(),
            };
        }
        LogCode::Unknown
    }
}

/// Device state flag derived from the log code and GPS tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateFlag {
    Online,  // IN/CH log code, valid GPS, not moving
    Offline, // OUT/SHD log code, valid GPS
    Driving, // online with a non-zero speed
    Empty,   // unclassifiable log code or unusable GPS
}

/// List icon selected from (state, icon type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Icon {
    CellTower,
    Satellite,
    Wifi,
    CellTowerOff,
    SatelliteOff,
    WifiOff,
    NoData,
}

/// Resolved, user-facing status for one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// `name[imei]`
    pub display_name: String,
    pub state: StateFlag,
    /// Battery + state word + speed or offline age
    pub status_line: String,
    pub icon: Icon,
    /// Firmware differs from the server's model catalog entry
    pub update_available: bool,
}

/// All/online/offline tallies over a resolved snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    pub all: usize,
    pub online: usize,
    pub offline: usize,
}

impl FleetCounts {
    pub fn tally(snapshot: &[DeviceStatus]) -> Self {
        let mut counts = FleetCounts::default();
        for status in snapshot {
            counts.all += 1;
            match status.state {
                StateFlag::Online | StateFlag::Driving => counts.online += 1,
                StateFlag::Offline => counts.offline += 1,
                StateFlag::Empty => {}
            }
        }
        counts
    }
}

/// Sleep stage as encoded by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SleepStage {
    Deep,
    Light,
    Awake,
}

impl TryFrom<u8> for SleepStage {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SleepStage::Deep),
            2 => Ok(SleepStage::Light),
            3 => Ok(SleepStage::Awake),
            other => Err(format!("unknown sleep stage code {}", other)),
        }
    }
}

impl From<SleepStage> for u8 {
    fn from(stage: SleepStage) -> u8 {
        match stage {
            SleepStage::Deep => 1,
            SleepStage::Light => 2,
            SleepStage::Awake => 3,
        }
    }
}

/// One timestamped sleep-stage sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SleepSample {
    pub stamp: DateTime<Utc>,
    pub stage: SleepStage,
}

/// Aggregated night summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSummary {
    pub deep_minutes: i64,
    pub light_minutes: i64,
    pub wake_minutes: i64,
    pub sleep_start: DateTime<Utc>,
    pub sleep_end: DateTime<Utc>,
    pub quality: String,
}

impl SleepSummary {
    pub fn total_minutes(&self) -> i64 {
        self.deep_minutes + self.light_minutes + self.wake_minutes
    }
}

/// Discrete notices surfaced at the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NetNoLink,
    NetError,
    NoData,
    RefreshFinish,
}

impl Notice {
    /// Opaque message key the UI maps to its own copy
    pub fn key(&self) -> &'static str {
        match self {
            Notice::NetNoLink => "net_no_link",
            Notice::NetError => "net_error",
            Notice::NoData => "nodata",
            Notice::RefreshFinish => "refresh_finish",
        }
    }
}

/// Active transport reported by the connectivity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Wifi,
    Gsm,
    Null,
}

/// Result of one fleet-list fetch
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fleet(Vec<TelemetryRecord>),
    NoData,
}
