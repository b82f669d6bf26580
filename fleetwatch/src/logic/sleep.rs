use crate::logic::types::{SleepSample, SleepStage, SleepSummary};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Nights with fewer surviving samples than this are not reported
pub const MIN_SAMPLES: usize = 6;

/// More deep sleep than this rejects the whole night as implausible
pub const MAX_DEEP_MINUTES: i64 = 240;

/// Maps a night's totals to a user-facing quality label.
///
/// The curve itself is presentation policy, so it sits behind a trait;
/// [`DefaultQualityScale`] ships the stock tiers.
pub trait QualityScale: Send + Sync {
    fn classify(&self, total_minutes: i64, deep_minutes: i64) -> String;
}

/// Stock tiers over total duration and deep-sleep fraction
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQualityScale;

impl QualityScale for DefaultQualityScale {
    fn classify(&self, total_minutes: i64, deep_minutes: i64) -> String {
        if total_minutes <= 0 {
            return "poor".to_string();
        }
        let deep_fraction = deep_minutes as f64 / total_minutes as f64;
        let label = if total_minutes < 360 || deep_fraction < 0.15 {
            "poor"
        } else if total_minutes >= 420 && deep_fraction >= 0.25 {
            "excellent"
        } else if deep_fraction >= 0.20 {
            "good"
        } else {
            "fair"
        };
        label.to_string()
    }
}

/// Aggregate a time-ascending sample sequence over `[window_start, window_end]`.
///
/// `is_valid` is the externally supplied sanity predicate; samples failing
/// it are discarded before counting. Returns `None` when fewer than
/// [`MIN_SAMPLES`] samples survive.
pub fn aggregate(
    samples: &[SleepSample],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    is_valid: impl Fn(&SleepSample) -> bool,
) -> Option<SleepSummary> {
    aggregate_with(
        samples,
        window_start,
        window_end,
        is_valid,
        &DefaultQualityScale,
    )
}

pub fn aggregate_with(
    samples: &[SleepSample],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    is_valid: impl Fn(&SleepSample) -> bool,
    scale: &dyn QualityScale,
) -> Option<SleepSummary> {
    let kept: Vec<&SleepSample> = samples
        .iter()
        .filter(|s| s.stamp >= window_start && s.stamp <= window_end)
        .filter(|s| is_valid(s))
        .collect();
    if kept.len() < MIN_SAMPLES {
        return None;
    }

    // Each inter-sample gap is charged to the stage held DURING the
    // interval, i.e. the previous sample's stage.
    let mut deep_ms: i64 = 0;
    let mut light_ms: i64 = 0;
    let mut wake_ms: i64 = 0;
    let mut prev: Option<&SleepSample> = None;
    for &sample in &kept {
        if let Some(p) = prev {
            let gap = (sample.stamp - p.stamp).num_milliseconds().max(0);
            match p.stage {
                SleepStage::Deep => deep_ms += gap,
                SleepStage::Light => light_ms += gap,
                SleepStage::Awake => wake_ms += gap,
            }
        }
        prev = Some(sample);
    }

    let mut deep_minutes = deep_ms / 60_000;
    let mut light_minutes = light_ms / 60_000;
    let mut wake_minutes = wake_ms / 60_000;

    // Hard rejection, not partial correction: an implausible deep total
    // voids the whole night.
    if deep_minutes > MAX_DEEP_MINUTES {
        deep_minutes = 0;
        light_minutes = 0;
        wake_minutes = 0;
    }

    let total = deep_minutes + light_minutes + wake_minutes;
    Some(SleepSummary {
        deep_minutes,
        light_minutes,
        wake_minutes,
        sleep_start: kept.first().map(|s| s.stamp)?,
        sleep_end: kept.last().map(|s| s.stamp)?,
        quality: scale.classify(total, deep_minutes),
    })
}

/// The night window ending on `day`: 18:00 the evening before to 12:00
/// on `day` itself.
pub fn default_window(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let evening = NaiveTime::from_hms_opt(18, 0, 0).expect("valid time");
    let noon = NaiveTime::from_hms_opt(12, 0, 0).expect("valid time");
    let start = (day - Duration::days(1)).and_time(evening);
    let end = day.and_time(noon);
    (
        Utc.from_utc_datetime(&start),
        Utc.from_utc_datetime(&end),
    )
}
