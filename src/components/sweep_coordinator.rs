use crate::{
    notifier::Notifier,
    prober::Probe,
    store::{StatusStore, TransitionLog},
    types::{Endpoint, Status, TransitionLogEntry},
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

/// What one sweep did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub probed: usize,
    pub down: usize,
    pub transitions: usize,
    pub notifications: usize,
}

/// Runs evaluation cycles over the configured endpoints.
///
/// Sweeps never overlap. A call made while another sweep is running is dropped and returns
/// `None`; the running sweep already covers every endpoint, and the next tick will run normally.
pub struct SweepCoordinator {
    endpoints: Vec<Endpoint>,
    timeout: Duration,
    prober: Arc<dyn Probe>,
    store: Arc<StatusStore>,
    log: Arc<TransitionLog>,
    notifier: Arc<dyn Notifier>,
    sweep_lock: Mutex<()>,
}

impl SweepCoordinator {
    pub fn new(
        endpoints: Vec<Endpoint>,
        timeout: Duration,
        prober: Arc<dyn Probe>,
        store: Arc<StatusStore>,
        log: Arc<TransitionLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            endpoints,
            timeout,
            prober,
            store,
            log,
            notifier,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub async fn run_sweep(&self) -> Option<SweepSummary> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            warn!("A health check is still in progress, skipping this run");
            return None;
        };

        let mut summary = SweepSummary::default();
        for endpoint in &self.endpoints {
            self.evaluate(endpoint, &mut summary).await;
        }

        info!(
            "Health check completed: {} probed, {} down, {} transition(s), {} notification(s)",
            summary.probed, summary.down, summary.transitions, summary.notifications
        );
        Some(summary)
    }

    /// Probe one endpoint and commit the result. Failures stay local to this endpoint.
    async fn evaluate(&self, endpoint: &Endpoint, summary: &mut SweepSummary) {
        let previous = self.store.get(endpoint).await;
        debug!(
            "Checking {} (last known: {})",
            endpoint,
            previous
                .as_ref()
                .map(|record| record.status.to_string())
                .unwrap_or_else(|| "none".to_owned())
        );

        let outcome = self.prober.check(endpoint, self.timeout).await;
        let now = Utc::now();
        let record = outcome.into_record(now);

        summary.probed += 1;
        if record.is_down() {
            summary.down += 1;
        }

        let prior_status = self
            .store
            .update(endpoint, record.clone())
            .await
            .map(|prior| prior.status);

        if prior_status != Some(record.status) {
            summary.transitions += 1;
            let entry = TransitionLogEntry::new(now, endpoint.clone(), &record);
            info!("Status change: {}", entry);
            if let Err(e) = self.log.append(&entry).await {
                error!(
                    "Failed to write to log file {}: {}",
                    self.log.path().display(),
                    e
                );
            }
        }

        if record.status == Status::Down && prior_status != Some(Status::Down) {
            let reason = record.detail.as_deref().unwrap_or_default();
            info!("Service at {} is down. Sending notification...", endpoint);
            summary.notifications += 1;
            if let Err(e) = self.notifier.notify(endpoint, reason).await {
                error!("Error sending notification for {}: {}", endpoint, e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::{AppResult, ErrorReason},
        store::{SnapshotFile, StoreSnapshot},
        types::ProbeOutcome,
    };
    use async_trait::async_trait;
    use std::{
        collections::{HashMap, VecDeque},
        sync::Mutex as StdMutex,
    };
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;

    /// Replays queued outcomes per endpoint; an exhausted queue repeats its last outcome.
    #[derive(Default)]
    struct ScriptedProber {
        script: StdMutex<HashMap<Endpoint, VecDeque<ProbeOutcome>>>,
        calls: StdMutex<Vec<Endpoint>>,
    }

    impl ScriptedProber {
        fn push(&self, endpoint: &str, outcome: ProbeOutcome) {
            self.script
                .lock()
                .unwrap()
                .entry(Endpoint::from(endpoint))
                .or_default()
                .push_back(outcome);
        }

        fn calls(&self) -> Vec<Endpoint> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Probe for ScriptedProber {
        async fn check(&self, endpoint: &Endpoint, _limit: Duration) -> ProbeOutcome {
            self.calls.lock().unwrap().push(endpoint.clone());
            let mut script = self.script.lock().unwrap();
            let queue = script.entry(endpoint.clone()).or_default();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap_or_else(ProbeOutcome::ok)
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<(Endpoint, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(Endpoint, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, endpoint: &Endpoint, reason: &str) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((endpoint.clone(), reason.to_owned()));
            if self.fail {
                Err(ErrorReason::Timeout.into())
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        _dir: TempDir,
        coordinator: SweepCoordinator,
        prober: Arc<ScriptedProber>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<StatusStore>,
        log: Arc<TransitionLog>,
    }

    impl Harness {
        fn new(endpoints: &[&str]) -> Self {
            Self::with_notifier(endpoints, RecordingNotifier::default())
        }

        fn with_notifier(endpoints: &[&str], notifier: RecordingNotifier) -> Self {
            let dir = tempdir().unwrap();
            let store = Arc::new(StatusStore::new(SnapshotFile::new(
                dir.path().join("health-status.json"),
            )));
            let log = Arc::new(TransitionLog::new(dir.path().join("health-events.log")));
            let prober = Arc::new(ScriptedProber::default());
            let notifier = Arc::new(notifier);

            let coordinator = SweepCoordinator::new(
                endpoints.iter().copied().map(Endpoint::from).collect(),
                Duration::from_secs(5),
                prober.clone(),
                store.clone(),
                log.clone(),
                notifier.clone(),
            );

            Self {
                _dir: dir,
                coordinator,
                prober,
                notifier,
                store,
                log,
            }
        }

        async fn log_lines(&self) -> Vec<String> {
            self.log
                .read_raw()
                .await
                .unwrap()
                .map(|raw| raw.lines().map(str::to_owned).collect())
                .unwrap_or_default()
        }
    }

    /// Strip the timestamp column.
    fn without_timestamp(line: &str) -> &str {
        line.split_once(" | ").map(|(_, rest)| rest).unwrap_or(line)
    }

    #[tokio::test]
    async fn every_endpoint_has_a_record_after_first_sweep() {
        let h = Harness::new(&["https://a.test", "https://b.test", "https://c.test"]);
        h.prober.push("https://b.test", ProbeOutcome::from_status_code(404));
        h.prober.push("https://c.test", ProbeOutcome::timed_out());

        let summary = h.coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.probed, 3);
        assert_eq!(summary.down, 1);

        let snapshot = h.store.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        for endpoint in h.coordinator.endpoints() {
            assert!(snapshot.contains_key(endpoint));
        }
    }

    #[tokio::test]
    async fn probes_in_configured_order() {
        let h = Harness::new(&["https://z.test", "https://a.test", "https://m.test"]);
        h.coordinator.run_sweep().await.unwrap();
        h.coordinator.run_sweep().await.unwrap();

        let urls: Vec<String> = h.prober.calls().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            urls,
            [
                "https://z.test",
                "https://a.test",
                "https://m.test",
                "https://z.test",
                "https://a.test",
                "https://m.test",
            ]
        );
    }

    #[tokio::test]
    async fn first_ok_observation_is_logged_without_alert() {
        let h = Harness::new(&["https://a.test"]);
        let summary = h.coordinator.run_sweep().await.unwrap();

        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.notifications, 0);
        let lines = h.log_lines().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(without_timestamp(&lines[0]), "OK | https://a.test | Reason: OK");
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn ok_to_ok_is_silent() {
        let h = Harness::new(&["https://a.test"]);
        h.coordinator.run_sweep().await.unwrap();
        let lines_before = h.log_lines().await.len();

        let summary = h.coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.transitions, 0);
        assert_eq!(summary.notifications, 0);
        assert_eq!(h.log_lines().await.len(), lines_before);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn first_down_observation_logs_and_alerts_once() {
        let h = Harness::new(&["https://a.test"]);
        h.prober.push("https://a.test", ProbeOutcome::from_status_code(503));

        let summary = h.coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.notifications, 1);

        let lines = h.log_lines().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(
            without_timestamp(&lines[0]),
            "DOWN | https://a.test | Reason: server error 503"
        );
        assert_eq!(
            h.notifier.sent(),
            vec![(Endpoint::from("https://a.test"), "server error 503".to_owned())]
        );
    }

    #[tokio::test]
    async fn down_to_down_does_not_renotify() {
        let h = Harness::new(&["https://a.test"]);
        h.prober.push("https://a.test", ProbeOutcome::timed_out());

        h.coordinator.run_sweep().await.unwrap();
        for _ in 0..3 {
            let summary = h.coordinator.run_sweep().await.unwrap();
            assert_eq!(summary.down, 1);
            assert_eq!(summary.transitions, 0);
            assert_eq!(summary.notifications, 0);
        }

        assert_eq!(h.log_lines().await.len(), 1);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn recovery_is_logged_without_alert() {
        let h = Harness::new(&["https://a.test"]);
        h.prober.push("https://a.test", ProbeOutcome::down("connection refused"));
        h.prober.push("https://a.test", ProbeOutcome::ok());

        h.coordinator.run_sweep().await.unwrap();
        let summary = h.coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.notifications, 0);

        let lines = h.log_lines().await;
        assert_eq!(lines.len(), 2);
        assert_eq!(without_timestamp(&lines[1]), "OK | https://a.test | Reason: OK");
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn outage_then_client_error_scenario() {
        let h = Harness::new(&["https://a.test"]);
        h.prober.push("https://a.test", ProbeOutcome::from_status_code(200));
        h.prober.push("https://a.test", ProbeOutcome::timed_out());
        h.prober.push("https://a.test", ProbeOutcome::from_status_code(404));

        h.coordinator.run_sweep().await.unwrap();
        let baseline = h.log_lines().await.len();

        h.coordinator.run_sweep().await.unwrap();
        let lines = h.log_lines().await;
        assert_eq!(lines.len(), baseline + 1);
        assert_eq!(
            without_timestamp(&lines[baseline]),
            "DOWN | https://a.test | Reason: timed out"
        );
        assert_eq!(
            h.notifier.sent(),
            vec![(Endpoint::from("https://a.test"), "timed out".to_owned())]
        );

        h.coordinator.run_sweep().await.unwrap();
        let lines = h.log_lines().await;
        assert_eq!(lines.len(), baseline + 2);
        assert_eq!(
            without_timestamp(&lines[baseline + 1]),
            "OK | https://a.test | Reason: client error 404"
        );
        assert_eq!(h.notifier.sent().len(), 1);

        let record = h.store.get(&Endpoint::from("https://a.test")).await.unwrap();
        assert_eq!(record.status, Status::Ok);
        assert_eq!(record.detail.as_deref(), Some("client error 404"));
    }

    #[tokio::test]
    async fn second_outage_alerts_again() {
        let h = Harness::new(&["https://a.test"]);
        h.prober.push("https://a.test", ProbeOutcome::timed_out());
        h.prober.push("https://a.test", ProbeOutcome::ok());
        h.prober.push("https://a.test", ProbeOutcome::from_status_code(500));

        for _ in 0..3 {
            h.coordinator.run_sweep().await.unwrap();
        }

        let reasons: Vec<String> = h.notifier.sent().into_iter().map(|(_, r)| r).collect();
        assert_eq!(reasons, ["timed out", "server error 500"]);
    }

    #[tokio::test]
    async fn restored_down_state_does_not_realert() {
        let dir = tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("health-status.json"));
        let a = Endpoint::from("https://a.test");
        let restored = StoreSnapshot::from([(
            a.clone(),
            ProbeOutcome::timed_out().into_record(Utc::now()),
        )]);
        file.write(&restored).await.unwrap();

        let store = Arc::new(StatusStore::open(file, &[a.clone()]).await);
        let log = Arc::new(TransitionLog::new(dir.path().join("health-events.log")));
        let prober = Arc::new(ScriptedProber::default());
        prober.push("https://a.test", ProbeOutcome::from_status_code(502));
        let notifier = Arc::new(RecordingNotifier::default());

        let coordinator = SweepCoordinator::new(
            vec![a],
            Duration::from_secs(5),
            prober,
            store,
            log.clone(),
            notifier.clone(),
        );
        let summary = coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.notifications, 0);
        assert_eq!(summary.transitions, 0);
        assert!(log.read_raw().await.unwrap().is_none());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_does_not_affect_state() {
        let h = Harness::with_notifier(
            &["https://a.test", "https://b.test"],
            RecordingNotifier::failing(),
        );
        h.prober.push("https://a.test", ProbeOutcome::timed_out());
        h.prober.push("https://b.test", ProbeOutcome::from_status_code(500));

        let summary = h.coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.probed, 2);
        assert_eq!(summary.notifications, 2);
        assert_eq!(h.notifier.sent().len(), 2);
        assert_eq!(h.log_lines().await.len(), 2);
        assert_eq!(h.store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn storage_failure_does_not_abort_sweep() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("missing");
        let store = Arc::new(StatusStore::new(SnapshotFile::new(broken.join("status.json"))));
        let log = Arc::new(TransitionLog::new(broken.join("events.log")));
        let prober = Arc::new(ScriptedProber::default());
        prober.push("https://a.test", ProbeOutcome::timed_out());
        let notifier = Arc::new(RecordingNotifier::default());

        let coordinator = SweepCoordinator::new(
            vec![Endpoint::from("https://a.test"), Endpoint::from("https://b.test")],
            Duration::from_secs(5),
            prober,
            store.clone(),
            log,
            notifier.clone(),
        );

        let summary = coordinator.run_sweep().await.unwrap();
        assert_eq!(summary.probed, 2);
        assert_eq!(store.snapshot().await.len(), 2);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn no_endpoints_is_a_no_op() {
        let h = Harness::new(&[]);
        let summary = h.coordinator.run_sweep().await.unwrap();
        assert_eq!(summary, SweepSummary::default());
        assert!(h.store.snapshot().await.is_empty());
        assert!(h.log_lines().await.is_empty());
    }

    /// Holds every probe until released.
    struct GatedProber {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Probe for GatedProber {
        async fn check(&self, _endpoint: &Endpoint, _limit: Duration) -> ProbeOutcome {
            self.entered.notify_one();
            self.release.notified().await;
            ProbeOutcome::timed_out()
        }
    }

    #[tokio::test]
    async fn overlapping_sweep_is_skipped() {
        let dir = tempdir().unwrap();
        let store = Arc::new(StatusStore::new(SnapshotFile::new(
            dir.path().join("health-status.json"),
        )));
        let log = Arc::new(TransitionLog::new(dir.path().join("health-events.log")));
        let prober = Arc::new(GatedProber {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = Arc::new(SweepCoordinator::new(
            vec![Endpoint::from("https://a.test")],
            Duration::from_secs(5),
            prober.clone(),
            store,
            log.clone(),
            notifier.clone(),
        ));

        let running = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run_sweep().await }
        });
        prober.entered.notified().await;

        assert!(coordinator.run_sweep().await.is_none());

        prober.release.notify_one();
        let summary = running.await.unwrap().unwrap();
        assert_eq!(summary.probed, 1);
        assert_eq!(summary.notifications, 1);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(log.history().await.unwrap().len(), 1);

        // The lock is released once the sweep finishes.
        let next = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run_sweep().await }
        });
        prober.entered.notified().await;
        prober.release.notify_one();
        let summary = next.await.unwrap().unwrap();
        assert_eq!(summary.notifications, 0);
    }
}
