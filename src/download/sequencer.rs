//! Download sequencing state machine.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::auth::CredentialProvider;
use crate::config::{validate_range, Config};
use crate::download::fetcher::Fetch;
use crate::download::outcome::DownloadOutcome;
use crate::download::task::DownloadTask;
use crate::error::Result;
use crate::fs::naming::existing_archive;
use crate::progress::{ProgressRecord, ProgressStore};

/// Base for exponential backoff between transient retries, in seconds.
const BACKOFF_BASE_SECS: u64 = 2;

/// Requested index range for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunPlan {
    pub start: u64,
    pub end: u64,
    /// Resume from the progress record's completion point.
    pub resume: bool,
}

/// Why a run stopped before reaching the end of its range.
#[derive(Debug, Clone)]
pub enum HaltReason {
    /// Session expiry that one refresh-and-retry did not resolve.
    /// Continuing is pointless: every later index would fail the same way.
    AuthExpired { index: u64, detail: String },

    /// Environment condition unlikely to resolve by continuing
    /// (disk full, permission denied, unexpected service response).
    Fatal { index: u64, reason: String },
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::AuthExpired { index, detail } => {
                write!(f, "session expired at index {}: {}", index, detail)
            }
            HaltReason::Fatal { index, reason } => {
                write!(f, "fatal failure at index {}: {}", index, reason)
            }
        }
    }
}

/// End-of-run accounting.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: u64,
    pub skipped: u64,
    /// Indices that permanently failed without halting the run.
    /// Never silently dropped: enumerated here and in the progress record.
    pub failed_indices: BTreeSet<u64>,
    pub halted: Option<HaltReason>,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.halted.is_none()
    }
}

/// How one resolved index affects the run loop.
enum IndexResolution {
    Completed,
    Skipped,
    /// Permanent single-index failure; the run continues.
    Failed(String),
    /// Run-level stop condition.
    Halt(HaltReason),
}

/// The orchestrating state machine: walks the requested range in ascending
/// order, delegates each index to the fetcher, paces requests, retries
/// transient failures, refreshes credentials once on expiry, and persists
/// progress after every terminal outcome.
pub struct Sequencer<F: Fetch> {
    config: Config,
    fetcher: F,
    provider: Box<dyn CredentialProvider>,
    store: ProgressStore,
}

impl<F: Fetch> Sequencer<F> {
    pub fn new(
        config: Config,
        fetcher: F,
        provider: Box<dyn CredentialProvider>,
        store: ProgressStore,
    ) -> Self {
        Self {
            config,
            fetcher,
            provider,
            store,
        }
    }

    /// Execute a run over the planned range.
    ///
    /// Returns `Ok` with a summary even when the run halts partway; only
    /// pre-flight conditions (invalid range, unreadable credentials,
    /// unwritable progress store) surface as errors.
    pub async fn run(&self, plan: RunPlan) -> Result<RunSummary> {
        validate_range(
            plan.start,
            plan.end,
            self.config.export.total_expected_files,
        )?;

        let output_dir = self.config.output_directory();
        std::fs::create_dir_all(&output_dir)?;

        let mut record = match self.store.load()? {
            Some(record) => record,
            None => {
                if plan.resume {
                    tracing::info!("No prior progress record; starting fresh");
                }
                ProgressRecord::new(self.config.export.total_expected_files)
            }
        };
        record.run_started_at = chrono::Utc::now();
        record.total_expected_files = self.config.export.total_expected_files;

        let effective_start = if plan.resume {
            plan.start.max(record.last_completed_index + 1)
        } else {
            plan.start
        };

        let mut summary = RunSummary::default();

        if effective_start > plan.end {
            tracing::info!(
                "Nothing to do: indices {}..={} already completed",
                plan.start,
                plan.end
            );
            return Ok(summary);
        }

        tracing::info!(
            "Downloading indices {}..={} into {}",
            effective_start,
            plan.end,
            output_dir.display()
        );

        for index in effective_start..=plan.end {
            let resolution = self.resolve_index(index).await?;

            match resolution {
                IndexResolution::Completed => {
                    record.mark_completed(index);
                    self.store.save(&record)?;
                    summary.succeeded += 1;

                    if index < plan.end && self.config.options.delay_seconds > 0 {
                        tracing::debug!(
                            "Waiting {} seconds before next download",
                            self.config.options.delay_seconds
                        );
                        sleep(Duration::from_secs(self.config.options.delay_seconds)).await;
                    }
                }
                IndexResolution::Skipped => {
                    summary.skipped += 1;
                }
                IndexResolution::Failed(reason) => {
                    tracing::warn!("Index {} permanently failed: {}", index, reason);
                    record.mark_failed(index);
                    self.store.save(&record)?;
                    summary.failed_indices.insert(index);
                }
                IndexResolution::Halt(reason) => {
                    tracing::error!("Halting run: {}", reason);
                    record.mark_failed(index);
                    self.store.save(&record)?;
                    summary.failed_indices.insert(index);
                    summary.halted = Some(reason);
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Resolve one index to a terminal outcome, absorbing transient retries
    /// and the single permitted credential refresh.
    async fn resolve_index(&self, index: u64) -> Result<IndexResolution> {
        let output_dir = self.config.output_directory();

        // Idempotent re-runs: a non-empty archive already on disk is
        // complete (partials never carry the final name).
        if let Some(path) = existing_archive(&output_dir, index)? {
            let outcome = DownloadOutcome::AlreadyExists { path: path.clone() };
            tracing::info!(
                "Index {} {}: {} already on disk",
                index,
                outcome.label(),
                path.display()
            );
            return Ok(IndexResolution::Skipped);
        }

        let mut task = DownloadTask::new(index, output_dir);
        let mut refreshed = false;

        loop {
            let credentials = self.provider.current().await?;
            let outcome = self.fetcher.fetch(&task, &credentials).await;
            task.attempt_count += 1;

            match outcome {
                DownloadOutcome::Success {
                    bytes_written,
                    final_path,
                } => {
                    tracing::info!(
                        "Index {}: {} bytes -> {}",
                        index,
                        bytes_written,
                        final_path.display()
                    );
                    return Ok(IndexResolution::Completed);
                }

                DownloadOutcome::AlreadyExists { .. } => {
                    return Ok(IndexResolution::Skipped);
                }

                DownloadOutcome::AuthExpired if !refreshed => {
                    tracing::warn!(
                        "Index {}: session expired, requesting credential refresh",
                        index
                    );
                    refreshed = true;

                    match self.provider.refresh().await {
                        Ok(_) => continue,
                        Err(e) => {
                            return Ok(IndexResolution::Halt(HaltReason::AuthExpired {
                                index,
                                detail: e.to_string(),
                            }))
                        }
                    }
                }

                DownloadOutcome::AuthExpired => {
                    return Ok(IndexResolution::Halt(HaltReason::AuthExpired {
                        index,
                        detail: "still expired after refresh".to_string(),
                    }));
                }

                DownloadOutcome::Transient(reason) => {
                    if task.attempt_count >= self.config.options.max_retries {
                        return Ok(IndexResolution::Failed(format!(
                            "{} (after {} attempts)",
                            reason, task.attempt_count
                        )));
                    }

                    let backoff = self.backoff_delay(task.attempt_count);
                    tracing::warn!(
                        "Index {} attempt {} failed ({}), retrying in {:.1}s",
                        index,
                        task.attempt_count,
                        reason,
                        backoff.as_secs_f64()
                    );
                    sleep(backoff).await;
                }

                DownloadOutcome::Fatal(reason) => {
                    return Ok(IndexResolution::Halt(HaltReason::Fatal { index, reason }));
                }
            }
        }
    }

    /// Exponential backoff with jitter: 2s, 4s, 8s... plus up to 750ms.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = BACKOFF_BASE_SECS << (attempt.saturating_sub(1)).min(5);
        let jitter_ms = rand::thread_rng().gen_range(0..750);
        Duration::from_secs(base) + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionCredentials;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn dummy_credentials() -> SessionCredentials {
        SessionCredentials {
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            rapt: "tok".to_string(),
            captured_at: chrono::Utc::now(),
        }
    }

    /// Fetcher that replays scripted outcomes per index.
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<HashMap<u64, VecDeque<DownloadOutcome>>>,
        calls: Mutex<Vec<u64>>,
    }

    impl ScriptedFetcher {
        fn with(mut self, index: u64, outcomes: Vec<DownloadOutcome>) -> Self {
            self.script
                .get_mut()
                .unwrap()
                .insert(index, outcomes.into());
            self
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }

        fn success(index: u64) -> DownloadOutcome {
            DownloadOutcome::Success {
                bytes_written: 1024,
                final_path: PathBuf::from(format!("takeout-{:03}.zip", index)),
            }
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetcher {
        async fn fetch(
            &self,
            task: &DownloadTask,
            _credentials: &SessionCredentials,
        ) -> DownloadOutcome {
            self.calls.lock().unwrap().push(task.index);
            self.script
                .lock()
                .unwrap()
                .get_mut(&task.index)
                .and_then(|outcomes| outcomes.pop_front())
                .unwrap_or_else(|| ScriptedFetcher::success(task.index))
        }
    }

    /// Provider with a fixed refresh behavior and a shared refresh counter.
    struct StubProvider {
        refresh_ok: bool,
        refreshes: Arc<AtomicU32>,
    }

    impl StubProvider {
        fn new(refresh_ok: bool) -> (Self, Arc<AtomicU32>) {
            let refreshes = Arc::new(AtomicU32::new(0));
            (
                Self {
                    refresh_ok,
                    refreshes: Arc::clone(&refreshes),
                },
                refreshes,
            )
        }
    }

    #[async_trait]
    impl CredentialProvider for StubProvider {
        async fn current(&self) -> Result<SessionCredentials> {
            Ok(dummy_credentials())
        }

        async fn refresh(&self) -> Result<SessionCredentials> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.refresh_ok {
                Ok(dummy_credentials())
            } else {
                Err(Error::RefreshFailed("capture file unchanged".to_string()))
            }
        }
    }

    fn test_config(dir: &tempfile::TempDir, total: u64) -> Config {
        let mut config = Config::default();
        config.export.job_id = "aad05205-2695-41f5-a4d7-b92d9a095d5e".to_string();
        config.export.total_expected_files = total;
        config.options.output_directory = Some(dir.path().to_path_buf());
        config.options.delay_seconds = 0;
        config
    }

    fn sequencer(
        dir: &tempfile::TempDir,
        total: u64,
        fetcher: ScriptedFetcher,
        provider: StubProvider,
    ) -> Sequencer<ScriptedFetcher> {
        Sequencer::new(
            test_config(dir, total),
            fetcher,
            Box::new(provider),
            ProgressStore::in_directory(dir.path()),
        )
    }

    fn plan(start: u64, end: u64, resume: bool) -> RunPlan {
        RunPlan { start, end, resume }
    }

    #[tokio::test]
    async fn test_clean_run_succeeds_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);

        let summary = seq.run(plan(1, 5, false)).await.unwrap();

        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.skipped, 0);
        assert!(summary.failed_indices.is_empty());
        assert!(summary.completed());
        assert_eq!(seq.fetcher.calls(), vec![1, 2, 3, 4, 5]);

        let record = seq.store.load().unwrap().unwrap();
        assert_eq!(record.last_completed_index, 5);
    }

    #[tokio::test]
    async fn test_invalid_range_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);

        assert!(matches!(
            seq.run(plan(5, 3, false)).await,
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            seq.run(plan(1, 11, false)).await,
            Err(Error::InvalidRange { .. })
        ));
        assert!(seq.fetcher.calls().is_empty());
        assert!(seq.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_starts_after_last_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::in_directory(dir.path());
        let mut record = ProgressRecord::new(10);
        record.mark_completed(3);
        store.save(&record).unwrap();

        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);
        let summary = seq.run(plan(1, 5, true)).await.unwrap();

        // 1..=3 are never re-fetched.
        assert_eq!(seq.fetcher.calls(), vec![4, 5]);
        assert_eq!(summary.succeeded, 2);
    }

    #[tokio::test]
    async fn test_resume_without_record_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);

        let summary = seq.run(plan(2, 4, true)).await.unwrap();

        assert_eq!(seq.fetcher.calls(), vec![2, 3, 4]);
        assert_eq!(summary.succeeded, 3);
    }

    #[tokio::test]
    async fn test_rerequested_failed_index_is_cleared_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::in_directory(dir.path());
        let mut record = ProgressRecord::new(10);
        record.mark_completed(3);
        record.mark_failed(2);
        store.save(&record).unwrap();

        // Explicitly re-request the failed index; this time it succeeds.
        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);
        let summary = seq.run(plan(2, 2, false)).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        let record = seq.store.load().unwrap().unwrap();
        assert!(
            record.failed_indices.is_empty(),
            "a downloaded index must not remain in the failed set"
        );
        assert_eq!(record.last_completed_index, 3);
    }

    #[tokio::test]
    async fn test_resume_past_end_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::in_directory(dir.path());
        let mut record = ProgressRecord::new(10);
        record.mark_completed(5);
        store.save(&record).unwrap();

        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);
        let summary = seq.run(plan(1, 5, true)).await.unwrap();

        assert!(seq.fetcher.calls().is_empty());
        assert_eq!(summary.succeeded, 0);
        assert!(summary.completed());
    }

    #[tokio::test]
    async fn test_existing_archives_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ts = chrono::Utc::now();
        for index in 1..=3u64 {
            std::fs::write(
                dir.path().join(crate::fs::naming::archive_filename(index, ts)),
                b"data",
            )
            .unwrap();
        }

        let seq = sequencer(&dir, 10, ScriptedFetcher::default(), StubProvider::new(true).0);
        let summary = seq.run(plan(1, 3, false)).await.unwrap();

        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.succeeded, 0);
        assert!(seq.fetcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default().with(
            1,
            vec![
                DownloadOutcome::Transient("timeout".to_string()),
                DownloadOutcome::Transient("reset".to_string()),
                ScriptedFetcher::success(1),
            ],
        );

        let seq = sequencer(&dir, 10, fetcher, StubProvider::new(true).0);
        let summary = seq.run(plan(1, 1, false)).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(seq.fetcher.calls(), vec![1, 1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhaustion_records_failure_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default().with(
            2,
            vec![
                DownloadOutcome::Transient("timeout".to_string()),
                DownloadOutcome::Transient("timeout".to_string()),
                DownloadOutcome::Transient("timeout".to_string()),
            ],
        );

        let seq = sequencer(&dir, 10, fetcher, StubProvider::new(true).0);
        let summary = seq.run(plan(1, 3, false)).await.unwrap();

        // Index 2 fails after 3 attempts; 1 and 3 still succeed.
        assert_eq!(summary.succeeded, 2);
        assert_eq!(
            summary.failed_indices,
            BTreeSet::from([2]),
            "failed index must be enumerated"
        );
        assert!(summary.completed());
        assert_eq!(seq.fetcher.calls(), vec![1, 2, 2, 2, 3]);

        let record = seq.store.load().unwrap().unwrap();
        assert!(record.failed_indices.contains(&2));
        assert_eq!(record.last_completed_index, 3);
    }

    #[tokio::test]
    async fn test_auth_expiry_refreshes_once_then_halts() {
        let dir = tempfile::tempdir().unwrap();
        // Index 4 reports expiry both before and after the refresh.
        let fetcher = ScriptedFetcher::default().with(
            4,
            vec![DownloadOutcome::AuthExpired, DownloadOutcome::AuthExpired],
        );

        let (provider, refreshes) = StubProvider::new(true);
        let seq = sequencer(&dir, 10, fetcher, provider);
        let summary = seq.run(plan(1, 5, false)).await.unwrap();

        assert_eq!(summary.succeeded, 3);
        assert!(matches!(
            summary.halted,
            Some(HaltReason::AuthExpired { index: 4, .. })
        ));
        // Index 5 is never attempted; index 4 was attempted exactly twice
        // with exactly one refresh in between.
        assert_eq!(seq.fetcher.calls(), vec![1, 2, 3, 4, 4]);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);

        // Progress reflects the last index actually completed, not the
        // one that triggered the halt.
        let record = seq.store.load().unwrap().unwrap();
        assert_eq!(record.last_completed_index, 3);
        assert!(record.failed_indices.contains(&4));
    }

    #[tokio::test]
    async fn test_auth_expiry_recovers_after_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default().with(
            2,
            vec![DownloadOutcome::AuthExpired, ScriptedFetcher::success(2)],
        );

        let seq = sequencer(&dir, 10, fetcher, StubProvider::new(true).0);
        let summary = seq.run(plan(1, 3, false)).await.unwrap();

        assert_eq!(summary.succeeded, 3);
        assert!(summary.completed());
        assert_eq!(seq.fetcher.calls(), vec![1, 2, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_refresh_halts_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher =
            ScriptedFetcher::default().with(2, vec![DownloadOutcome::AuthExpired]);

        let (provider, refreshes) = StubProvider::new(false);
        let seq = sequencer(&dir, 10, fetcher, provider);
        let summary = seq.run(plan(1, 5, false)).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert!(matches!(
            summary.halted,
            Some(HaltReason::AuthExpired { index: 2, .. })
        ));
        // One refresh attempt, no second fetch of index 2 after it failed.
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(seq.fetcher.calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fatal_outcome_halts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default()
            .with(3, vec![DownloadOutcome::Fatal("disk full".to_string())]);

        let seq = sequencer(&dir, 10, fetcher, StubProvider::new(true).0);
        let summary = seq.run(plan(1, 5, false)).await.unwrap();

        assert_eq!(summary.succeeded, 2);
        assert!(matches!(
            summary.halted,
            Some(HaltReason::Fatal { index: 3, .. })
        ));
        assert_eq!(seq.fetcher.calls(), vec![1, 2, 3]);
    }
}
