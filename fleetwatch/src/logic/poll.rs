use crate::logic::config::{PollConfig, StalePolicy};
use crate::logic::sleep;
use crate::logic::status::{resolve_with, ResolveOptions};
use crate::logic::types::{
    DeviceStatus, FetchOutcome, Notice, SleepSample, SleepSummary, Transport,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Keys the scheduler uses in the settings store
pub mod keys {
    pub const REFRESH_INTERVAL: &str = "refresh_interval";
    pub const SELECTED_FILTER: &str = "selected_filter";
    pub const FLEET_CACHE: &str = "fleet_cache";
    pub const MODEL_CATALOG: &str = "model_catalog";
}

/// Network collaborator: one fleet-list fetch per call
#[async_trait]
pub trait TelemetryFeed: Send + Sync {
    async fn fetch_fleet(&self) -> anyhow::Result<FetchOutcome>;
}

/// Connectivity collaborator; `Null` blocks all fetch attempts
pub trait Connectivity: Send + Sync {
    fn current_transport(&self) -> Transport;
}

/// Fixed-answer connectivity, for embedders without a real probe
pub struct StaticTransport(pub Transport);

impl Connectivity for StaticTransport {
    fn current_transport(&self) -> Transport {
        self.0
    }
}

/// UI collaborator: resolved snapshots, sleep summaries and notices
pub trait StatusSink: Send + Sync {
    fn snapshot(&self, devices: &[DeviceStatus]);
    fn sleep(&self, summary: Option<&SleepSummary>);
    fn notice(&self, notice: Notice);
}

/// Key-value persistence collaborator. Writes are fire-and-forget:
/// implementations log failures and never surface them.
pub trait SettingsStore: Send + Sync {
    fn get_u64(&self, key: &str, default: u64) -> u64;
    fn put_u64(&self, key: &str, value: u64);
    fn get_string(&self, key: &str, default: &str) -> String;
    fn put_string(&self, key: &str, value: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    User,
}

#[derive(Debug, Default)]
struct PollState {
    armed: bool,
    in_flight: bool,
    /// Arming generation; bumped by start/stop so completions from a
    /// previous life are no-ops
    epoch: u64,
    /// Monotonic fetch sequence, for the stale-completion policy
    seq: u64,
    last_applied_seq: u64,
    consecutive_errors: u32,
    last_trigger: Option<Instant>,
    interval_secs: u64,
    snapshot: Vec<DeviceStatus>,
}

struct SchedulerInner {
    feed: Arc<dyn TelemetryFeed>,
    connectivity: Arc<dyn Connectivity>,
    sink: Arc<dyn StatusSink>,
    store: Option<Arc<dyn SettingsStore>>,
    config: PollConfig,
    state: Mutex<PollState>,
}

/// Connectivity-aware periodic poller.
///
/// Owns the refresh cadence: arms a repeating timer, gates every tick on
/// connectivity and the single in-flight fetch, runs responses through the
/// status resolver and publishes the snapshot at the sink. All methods must
/// be called from within a tokio runtime.
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(
        feed: Arc<dyn TelemetryFeed>,
        connectivity: Arc<dyn Connectivity>,
        sink: Arc<dyn StatusSink>,
        store: Option<Arc<dyn SettingsStore>>,
        config: PollConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                feed,
                connectivity,
                sink,
                store,
                config,
                state: Mutex::new(PollState::default()),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Arm the repeating timer and issue the first request immediately.
    /// An interval of 0 falls back to the stored value, then the default.
    pub fn start(&self, interval_secs: u64) {
        let requested = if interval_secs == 0 {
            self.inner
                .store
                .as_ref()
                .map(|s| s.get_u64(keys::REFRESH_INTERVAL, 0))
                .unwrap_or(0)
        } else {
            interval_secs
        };
        let interval = PollConfig::effective_interval(requested);
        if let Some(store) = &self.inner.store {
            store.put_u64(keys::REFRESH_INTERVAL, interval);
        }

        let epoch = {
            let mut st = self.inner.state.lock().unwrap();
            st.armed = true;
            st.in_flight = false;
            st.interval_secs = interval;
            st.epoch += 1;
            st.epoch
        };
        log::debug!("poll scheduler armed at {}s (epoch {})", interval, epoch);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            loop {
                ticker.tick().await;
                if !inner.armed_for(epoch) {
                    break;
                }
                SchedulerInner::trigger(&inner, Trigger::Timer, epoch);
            }
        });
        if let Some(old) = self.timer.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    /// Disarm: no further ticks fire. An already in-flight fetch completes
    /// but its result is discarded.
    pub fn stop(&self) {
        {
            let mut st = self.inner.state.lock().unwrap();
            st.armed = false;
            st.epoch += 1;
        }
        if let Some(handle) = self.timer.lock().unwrap().take() {
            handle.abort();
        }
        log::debug!("poll scheduler disarmed");
    }

    /// User-initiated refresh; subject to the same gates as a timer tick
    pub fn force_refresh(&self) {
        let epoch = self.inner.state.lock().unwrap().epoch;
        SchedulerInner::trigger(&self.inner, Trigger::User, epoch);
    }

    /// Screen became visible: re-arm at the previous cadence
    pub fn screen_on(&self) {
        if self.is_armed() {
            return;
        }
        let interval = self.inner.state.lock().unwrap().interval_secs;
        self.start(interval);
    }

    /// Screen went dark: tear the timer down
    pub fn screen_off(&self) {
        self.stop();
    }

    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().unwrap().armed
    }

    pub fn current_interval(&self) -> u64 {
        self.inner.state.lock().unwrap().interval_secs
    }

    /// Last published snapshot (empty before the first successful poll)
    pub fn snapshot(&self) -> Vec<DeviceStatus> {
        self.inner.state.lock().unwrap().snapshot.clone()
    }

    /// Run the sleep aggregator and hand the outcome to the UI sink
    pub fn publish_sleep(
        &self,
        samples: &[SleepSample],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        is_valid: impl Fn(&SleepSample) -> bool,
    ) {
        let summary = sleep::aggregate(samples, window_start, window_end, is_valid);
        self.inner.sink.sleep(summary.as_ref());
    }
}

impl SchedulerInner {
    fn armed_for(&self, epoch: u64) -> bool {
        let st = self.state.lock().unwrap();
        st.armed && st.epoch == epoch
    }

    /// Gate a trigger and, if it survives, spawn the fetch. Ticks lost to
    /// any gate are dropped, never queued.
    fn trigger(inner: &Arc<SchedulerInner>, kind: Trigger, epoch: u64) {
        let seq = {
            let mut st = inner.state.lock().unwrap();
            if !st.armed || st.epoch != epoch {
                return;
            }
            if inner.connectivity.current_transport() == Transport::Null {
                drop(st);
                inner.sink.notice(Notice::NetNoLink);
                return;
            }
            if st.in_flight {
                log::debug!("{:?} trigger dropped: fetch in flight", kind);
                return;
            }
            let now = Instant::now();
            if let Some(prev) = st.last_trigger {
                if now.duration_since(prev) < Duration::from_millis(inner.config.debounce_ms) {
                    log::debug!("{:?} trigger debounced", kind);
                    return;
                }
            }
            st.last_trigger = Some(now);
            st.in_flight = true;
            st.seq += 1;
            st.seq
        };

        let task = Arc::clone(inner);
        tokio::spawn(async move {
            task.run_fetch(kind, epoch, seq).await;
        });
    }

    async fn run_fetch(&self, kind: Trigger, epoch: u64, seq: u64) {
        match self.feed.fetch_fleet().await {
            Ok(outcome) => {
                self.state.lock().unwrap().consecutive_errors = 0;
                self.apply(kind, epoch, seq, outcome);
            }
            Err(err) => {
                log::warn!("fleet fetch failed: {:#}", err);
                let retry = {
                    let mut st = self.state.lock().unwrap();
                    let first = st.consecutive_errors == 0;
                    if first {
                        st.consecutive_errors = 1;
                    }
                    first
                };
                if !retry {
                    self.finish_with_notice(epoch, Notice::NetError);
                    return;
                }
                // one immediate retry; the feed has rotated endpoints by now
                match self.feed.fetch_fleet().await {
                    Ok(outcome) => {
                        self.state.lock().unwrap().consecutive_errors = 0;
                        self.apply(kind, epoch, seq, outcome);
                    }
                    Err(err) => {
                        log::warn!("fleet fetch retry failed: {:#}", err);
                        self.finish_with_notice(epoch, Notice::NetError);
                    }
                }
            }
        }
    }

    /// Clear the in-flight flag and surface a notice, unless the scheduler
    /// was stopped or restarted since this fetch was issued.
    fn finish_with_notice(&self, epoch: u64, notice: Notice) {
        let live = {
            let mut st = self.state.lock().unwrap();
            if st.epoch == epoch {
                st.in_flight = false;
                true
            } else {
                false
            }
        };
        if live {
            self.sink.notice(notice);
        }
    }

    fn apply(&self, kind: Trigger, epoch: u64, seq: u64, outcome: FetchOutcome) {
        let records = {
            let mut st = self.state.lock().unwrap();
            if st.epoch != epoch {
                // stopped since issue: the completion is a no-op
                return;
            }
            st.in_flight = false;
            match outcome {
                FetchOutcome::NoData => None,
                FetchOutcome::Fleet(records) => {
                    if self.config.stale_policy == StalePolicy::DropStale
                        && seq < st.last_applied_seq
                    {
                        log::debug!(
                            "completion {} older than applied {}, dropped",
                            seq,
                            st.last_applied_seq
                        );
                        return;
                    }
                    st.last_applied_seq = st.last_applied_seq.max(seq);
                    Some(records)
                }
            }
        };

        let records = match records {
            Some(records) => records,
            None => {
                self.sink.notice(Notice::NoData);
                return;
            }
        };

        let opts = ResolveOptions {
            device_utc_offset_hours: self.config.device_utc_offset_hours,
            model_catalog: self
                .store
                .as_ref()
                .map(|s| s.get_string(keys::MODEL_CATALOG, ""))
                .filter(|c| !c.is_empty()),
        };
        let now = Utc::now();
        let snapshot: Vec<DeviceStatus> =
            records.iter().map(|r| resolve_with(r, now, &opts)).collect();

        // cache the raw fleet blob so consumers can render a stale list
        // on next startup
        if let Some(store) = &self.store {
            if let Ok(blob) = serde_json::to_string(&records) {
                store.put_string(keys::FLEET_CACHE, &blob);
            }
        }

        {
            let mut st = self.state.lock().unwrap();
            if st.epoch != epoch {
                return;
            }
            st.snapshot = snapshot.clone();
        }
        self.sink.snapshot(&snapshot);
        if kind == Trigger::User {
            self.sink.notice(Notice::RefreshFinish);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::types::{SleepStage, StateFlag, TelemetryRecord};
    use chrono::TimeZone;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(name: &str) -> TelemetryRecord {
        TelemetryRecord {
            imei: "861234567890123".to_string(),
            name: name.to_string(),
            device: String::new(),
            ver: None,
            bat: Some("50".to_string()),
            log: Some("IN 2024-01-01 11:00:00".to_string()),
            gps: Some("2024-01-01 11:00:00,22.5,113.9,0,0".to_string()),
            marker: 0,
            icon: 1,
        }
    }

    struct ScriptedFeed {
        outcomes: Mutex<VecDeque<Result<FetchOutcome, String>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedFeed {
        fn new(outcomes: Vec<Result<FetchOutcome, String>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn slow(outcomes: Vec<Result<FetchOutcome, String>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TelemetryFeed for ScriptedFeed {
        async fn fetch_fleet(&self) -> anyhow::Result<FetchOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.outcomes.lock().unwrap().pop_front() {
                Some(Ok(outcome)) => Ok(outcome),
                Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
                None => Ok(FetchOutcome::NoData),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Mutex<Vec<Vec<DeviceStatus>>>,
        sleeps: Mutex<Vec<Option<SleepSummary>>>,
        notices: Mutex<Vec<Notice>>,
    }

    impl StatusSink for RecordingSink {
        fn snapshot(&self, devices: &[DeviceStatus]) {
            self.snapshots.lock().unwrap().push(devices.to_vec());
        }

        fn sleep(&self, summary: Option<&SleepSummary>) {
            self.sleeps.lock().unwrap().push(summary.cloned());
        }

        fn notice(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    impl RecordingSink {
        fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        fn snapshot_count(&self) -> usize {
            self.snapshots.lock().unwrap().len()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl SettingsStore for MemoryStore {
        fn get_u64(&self, key: &str, default: u64) -> u64 {
            self.values
                .lock()
                .unwrap()
                .get(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn put_u64(&self, key: &str, value: u64) {
            self.put_string(key, &value.to_string());
        }

        fn get_string(&self, key: &str, default: &str) -> String {
            self.values
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        }

        fn put_string(&self, key: &str, value: &str) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    fn config(debounce_ms: u64) -> PollConfig {
        PollConfig {
            debounce_ms,
            ..PollConfig::default()
        }
    }

    fn scheduler(
        feed: Arc<ScriptedFeed>,
        sink: Arc<RecordingSink>,
        transport: Transport,
        config: PollConfig,
    ) -> PollScheduler {
        PollScheduler::new(
            feed,
            Arc::new(StaticTransport(transport)),
            sink,
            None,
            config,
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    #[tokio::test]
    async fn test_start_polls_immediately_and_publishes() {
        let feed = ScriptedFeed::new(vec![Ok(FetchOutcome::Fleet(vec![record("collar")]))]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        settle().await;

        assert_eq!(feed.calls(), 1);
        assert_eq!(sink.snapshot_count(), 1);
        let snapshot = sched.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, StateFlag::Online);
        // timer-driven refreshes never announce completion
        assert!(sink.notices().is_empty());
        sched.stop();
    }

    #[tokio::test]
    async fn test_null_transport_blocks_and_notifies() {
        let feed = ScriptedFeed::new(vec![Ok(FetchOutcome::Fleet(vec![record("collar")]))]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Null, config(0));
        sched.start(60);
        settle().await;

        assert_eq!(feed.calls(), 0);
        assert_eq!(sink.notices(), vec![Notice::NetNoLink]);
        sched.stop();
    }

    #[tokio::test]
    async fn test_single_fetch_in_flight() {
        let feed = ScriptedFeed::slow(
            vec![Ok(FetchOutcome::Fleet(vec![record("collar")]))],
            Duration::from_millis(300),
        );
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // these arrive while the first fetch is still in flight
        sched.force_refresh();
        sched.force_refresh();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(feed.calls(), 1);
        assert_eq!(sink.snapshot_count(), 1);
        sched.stop();
    }

    #[tokio::test]
    async fn test_debounce_collapses_screen_flaps() {
        let feed = ScriptedFeed::new(vec![
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(2000));
        sched.start(60);
        settle().await;
        assert_eq!(feed.calls(), 1);

        // screen off then on again 1s apart: one re-arm, no second fetch
        sched.screen_off();
        sched.screen_on();
        settle().await;

        assert!(sched.is_armed());
        assert_eq!(feed.calls(), 1);
        sched.stop();
    }

    #[tokio::test]
    async fn test_error_retries_once_then_notifies() {
        let feed = ScriptedFeed::new(vec![Err("boom".into()), Err("boom".into())]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        settle().await;

        assert_eq!(feed.calls(), 2);
        assert_eq!(sink.notices(), vec![Notice::NetError]);
        assert_eq!(sink.snapshot_count(), 0);
        sched.stop();
    }

    #[tokio::test]
    async fn test_retry_success_publishes_without_notice() {
        let feed = ScriptedFeed::new(vec![
            Err("boom".into()),
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        settle().await;

        assert_eq!(feed.calls(), 2);
        assert_eq!(sink.snapshot_count(), 1);
        assert!(sink.notices().is_empty());
        sched.stop();
    }

    #[tokio::test]
    async fn test_second_consecutive_failure_skips_retry() {
        let feed = ScriptedFeed::new(vec![
            Err("boom".into()),
            Err("boom".into()),
            Err("boom".into()),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        settle().await;
        assert_eq!(feed.calls(), 2);

        // errors are still consecutive, so this poll fails fast
        sched.force_refresh();
        settle().await;

        assert_eq!(feed.calls(), 3);
        assert_eq!(sink.notices(), vec![Notice::NetError, Notice::NetError]);
        sched.stop();
    }

    #[tokio::test]
    async fn test_nodata_leaves_snapshot_untouched() {
        let feed = ScriptedFeed::new(vec![
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
            Ok(FetchOutcome::NoData),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        settle().await;
        sched.force_refresh();
        settle().await;

        assert_eq!(feed.calls(), 2);
        assert_eq!(sched.snapshot().len(), 1);
        assert_eq!(sink.notices(), vec![Notice::NoData]);
        sched.stop();
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_completion() {
        let feed = ScriptedFeed::slow(
            vec![Ok(FetchOutcome::Fleet(vec![record("collar")]))],
            Duration::from_millis(300),
        );
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        tokio::time::sleep(Duration::from_millis(50)).await;
        sched.stop();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(feed.calls(), 1);
        assert_eq!(sink.snapshot_count(), 0);
        assert!(sched.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_finish_only_for_user_triggers() {
        let feed = ScriptedFeed::new(vec![
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(60);
        settle().await;
        assert!(sink.notices().is_empty());

        sched.force_refresh();
        settle().await;
        assert_eq!(sink.notices(), vec![Notice::RefreshFinish]);
        sched.stop();
    }

    #[tokio::test]
    async fn test_timer_keeps_ticking() {
        let feed = ScriptedFeed::new(vec![
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
            Ok(FetchOutcome::Fleet(vec![record("collar")])),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed.clone(), sink.clone(), Transport::Wifi, config(0));
        sched.start(1);
        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert!(feed.calls() >= 2);
        sched.stop();
    }

    #[tokio::test]
    async fn test_stale_policy_decides_out_of_order_completions() {
        for (policy, expect_second_applied) in [
            (StalePolicy::LastWriteWins, true),
            (StalePolicy::DropStale, false),
        ] {
            let feed = ScriptedFeed::new(vec![]);
            let sink = Arc::new(RecordingSink::default());
            let cfg = PollConfig {
                stale_policy: policy,
                ..PollConfig::default()
            };
            let sched = scheduler(feed, sink.clone(), Transport::Wifi, cfg);
            {
                let mut st = sched.inner.state.lock().unwrap();
                st.armed = true;
            }
            let newer = FetchOutcome::Fleet(vec![record("newer")]);
            let older = FetchOutcome::Fleet(vec![record("older")]);
            sched.inner.apply(Trigger::Timer, 0, 2, newer);
            sched.inner.apply(Trigger::Timer, 0, 1, older);

            let snapshot = sched.snapshot();
            assert_eq!(snapshot.len(), 1);
            let expected = if expect_second_applied { "older" } else { "newer" };
            assert!(
                snapshot[0].display_name.starts_with(expected),
                "policy {:?}",
                policy
            );
        }
    }

    #[tokio::test]
    async fn test_store_seeds_interval_and_caches_blob() {
        let feed = ScriptedFeed::new(vec![Ok(FetchOutcome::Fleet(vec![record("collar")]))]);
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(MemoryStore::default());
        store.put_u64(keys::REFRESH_INTERVAL, 60);
        let sched = PollScheduler::new(
            feed,
            Arc::new(StaticTransport(Transport::Wifi)),
            sink,
            Some(store.clone()),
            config(0),
        );
        sched.start(0);
        settle().await;

        assert_eq!(sched.current_interval(), 60);
        let blob = store.get_string(keys::FLEET_CACHE, "");
        assert!(blob.contains("collar"));
        sched.stop();
    }

    #[tokio::test]
    async fn test_unset_interval_falls_back_to_default() {
        let feed = ScriptedFeed::new(vec![]);
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(MemoryStore::default());
        let sched = PollScheduler::new(
            feed,
            Arc::new(StaticTransport(Transport::Wifi)),
            sink,
            Some(store.clone()),
            config(0),
        );
        sched.start(0);

        assert_eq!(sched.current_interval(), 180);
        assert_eq!(store.get_u64(keys::REFRESH_INTERVAL, 0), 180);
        sched.stop();
    }

    #[tokio::test]
    async fn test_publish_sleep_reaches_the_sink() {
        let feed = ScriptedFeed::new(vec![]);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(feed, sink.clone(), Transport::Wifi, config(0));

        let base = Utc.with_ymd_and_hms(2024, 1, 4, 20, 0, 0).unwrap();
        let samples: Vec<SleepSample> = (0..6)
            .map(|i| SleepSample {
                stamp: base + chrono::Duration::hours(i),
                stage: if i % 2 == 0 {
                    SleepStage::Light
                } else {
                    SleepStage::Deep
                },
            })
            .collect();
        let (start, end) = crate::logic::sleep::default_window(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        );

        sched.publish_sleep(&samples, start, end, |_| true);
        sched.publish_sleep(&samples[..3], start, end, |_| true);

        let sleeps = sink.sleeps.lock().unwrap();
        assert_eq!(sleeps.len(), 2);
        assert!(sleeps[0].is_some());
        assert!(sleeps[1].is_none());
    }
}
