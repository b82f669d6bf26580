use crate::logic::types::{DeviceStatus, Icon, LogCode, StateFlag, TelemetryRecord};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Status line used whenever a record cannot be classified
pub const DATA_ERROR: &str = "data error";

/// Elapsed-minutes sentinel for unparseable offline timestamps
pub const STALE_SENTINEL_MINUTES: i64 = 999_999;

/// Timestamp layout inside log codes and GPS tuples
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const COMPASS: [&str; 8] = [
    "north",
    "northeast",
    "east",
    "southeast",
    "south",
    "southwest",
    "west",
    "northwest",
];

/// Knobs the resolver needs beyond the record itself
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Trackers report naive wall-clock timestamps in this zone
    pub device_utc_offset_hours: i64,
    /// Server model catalog (`M<model>v<version>,...`) for update checks
    pub model_catalog: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            device_utc_offset_hours: 8,
            model_catalog: None,
        }
    }
}

/// Turn one raw record into user-facing status. Never fails: anything
/// malformed degrades to `StateFlag::Empty` with the data-error line.
pub fn resolve(record: &TelemetryRecord, now: DateTime<Utc>) -> DeviceStatus {
    resolve_with(record, now, &ResolveOptions::default())
}

pub fn resolve_with(
    record: &TelemetryRecord,
    now: DateTime<Utc>,
    opts: &ResolveOptions,
) -> DeviceStatus {
    let display_name = format!("{}[{}]", record.name, record.imei);
    let update_available = update_available(record, opts.model_catalog.as_deref());
    let code = LogCode::classify(record.log.as_deref().unwrap_or(""));
    let battery = battery_prefix(record.bat.as_deref());

    // Log-code classification strictly dominates: Bare/Unknown reject the
    // record even when the GPS tuple is perfectly healthy.
    let (state, icon, status_line) = match (&code, gps_parts(record.gps.as_deref())) {
        (LogCode::Online { .. }, Some(parts)) => {
            let annotation = speed_annotation(parts[3], parts[4]);
            let state = if annotation.is_some() {
                StateFlag::Driving
            } else {
                StateFlag::Online
            };
            let word = if state == StateFlag::Driving {
                "driving"
            } else {
                "online"
            };
            (
                state,
                online_icon(record.icon),
                compose_line(battery, word, annotation),
            )
        }
        (LogCode::Offline { stamp }, Some(_)) => {
            let age = format_age(offline_age_minutes(
                stamp,
                now,
                opts.device_utc_offset_hours,
            ));
            (
                StateFlag::Offline,
                offline_icon(record.icon),
                compose_line(battery, "offline", Some(age)),
            )
        }
        _ => (StateFlag::Empty, Icon::NoData, DATA_ERROR.to_string()),
    };

    DeviceStatus {
        display_name,
        state,
        status_line,
        icon,
        update_available,
    }
}

/// Resolve only the records whose name or imei contains `query`,
/// preserving input order.
pub fn find_matching(
    records: &[TelemetryRecord],
    query: &str,
    now: DateTime<Utc>,
) -> Vec<DeviceStatus> {
    records
        .iter()
        .filter(|r| r.name.contains(query) || r.imei.contains(query))
        .map(|r| resolve(r, now))
        .collect()
}

/// Split a GPS tuple into its five fields, or reject it
fn gps_parts(gps: Option<&str>) -> Option<Vec<&str>> {
    let gps = gps?;
    if gps.is_empty() || gps == "null" {
        return None;
    }
    let parts: Vec<&str> = gps.split(',').collect();
    if parts.len() < 5 {
        return None;
    }
    Some(parts)
}

fn battery_prefix(bat: Option<&str>) -> Option<String> {
    match bat {
        Some(b) if !b.is_empty() && b != "null" => Some(format!("{}%", b)),
        _ => None,
    }
}

/// `speed:<v>km  <compass>` when the speed field is a non-zero numeric
/// string; `None` keeps the plain "online" word.
fn speed_annotation(speed: &str, heading: &str) -> Option<String> {
    let speed = speed.trim();
    if speed.is_empty() || speed == "null" || speed == "0" {
        return None;
    }
    let value: f64 = speed.parse().ok()?;
    if value == 0.0 {
        return None;
    }
    let label = heading
        .trim()
        .parse::<i64>()
        .map(compass_label)
        .unwrap_or("");
    Some(format!("speed:{}km  {}", speed, label).trim_end().to_string())
}

/// Eight-sector compass label for a heading in degrees
pub fn compass_label(degrees: i64) -> &'static str {
    let wrapped = degrees.rem_euclid(360);
    COMPASS[((wrapped * 2 + 45) / 90 % 8) as usize]
}

/// Minutes between an offline stamp (device wall clock) and now.
/// Unparseable stamps read as effectively infinite staleness.
fn offline_age_minutes(stamp: &str, now: DateTime<Utc>, offset_hours: i64) -> i64 {
    match NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT) {
        Ok(then) => {
            let device_now = (now + Duration::hours(offset_hours)).naive_utc();
            (device_now - then).num_minutes().max(0)
        }
        Err(_) => STALE_SENTINEL_MINUTES,
    }
}

/// Humanize an age in minutes: `45m`, `3h`, `2d`
pub fn format_age(minutes: i64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / 1440)
    }
}

fn online_icon(kind: i32) -> Icon {
    match kind {
        0 | 2 => Icon::CellTower,
        1 => Icon::Satellite,
        3 => Icon::Wifi,
        _ => Icon::NoData,
    }
}

fn offline_icon(kind: i32) -> Icon {
    match kind {
        0 | 2 => Icon::CellTowerOff,
        1 => Icon::SatelliteOff,
        3 => Icon::WifiOff,
        _ => Icon::NoData,
    }
}

fn compose_line(battery: Option<String>, word: &str, detail: Option<String>) -> String {
    let mut line = String::new();
    if let Some(b) = battery {
        line.push_str(&b);
        line.push(' ');
    }
    line.push_str(word);
    if let Some(d) = detail {
        line.push(' ');
        line.push_str(&d);
    }
    line
}

/// True when the server's model catalog advertises a different firmware
/// version for this device's model.
fn update_available(record: &TelemetryRecord, catalog: Option<&str>) -> bool {
    let catalog = match catalog {
        Some(c) if !c.is_empty() && c != "null" => c,
        _ => return false,
    };
    let ver = match record.ver.as_deref() {
        Some(v) if !v.is_empty() && v != "0" && v != "null" => v,
        _ => return false,
    };
    if record.device.is_empty() {
        return false;
    }
    let needle = format!("M{}v", record.device);
    let pos = match catalog.find(&needle) {
        Some(p) => p,
        None => return false,
    };
    let expected = catalog[pos + needle.len()..]
        .split(',')
        .next()
        .unwrap_or("");
    !expected.is_empty() && expected != ver
}
