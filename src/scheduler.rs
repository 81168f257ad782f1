//! Bounded-parallel batch execution of page jobs.
//!
//! The scheduler takes a list of source items and a [`JobConfig`] snapshot,
//! and fans the page pipeline out over a fixed-size rayon pool:
//!
//! ```text
//! items ──par_iter──▶ decode + prepare (once per item)
//!                        └──par_iter──▶ render part ─▶ sink.write   (one Job per part)
//! ```
//!
//! ## Guarantees
//!
//! - **Bounded**: all work runs on a local pool of exactly `workers` threads.
//! - **Isolated failures**: a failing job is recorded and never cancels its
//!   siblings. A source that cannot be decoded yields exactly one failure
//!   record, not one per part.
//! - **Complete accounting**: every planned job ends up in the [`RunSummary`]
//!   as written, failed or skipped, in input order.
//! - **Non-blocking progress**: counters are atomics and events go over an
//!   unbounded `mpsc` channel, so a slow printer never stalls a worker.
//! - **Cancellation**: once the [`CancelToken`] is set, jobs that have not
//!   started are recorded as skipped.
//!
//! A dithering depth error is a programming defect, not a job failure, and
//! aborts the run with [`FatalError::Defect`].

use crate::imaging::{
    DitherAlgorithm, JobConfig, PageOverrides, PagePart, RasterBuffer, TransformConfig,
    TransformError, decode_source, plan_parts, prepare, render_part,
};
use crate::writer::PageSink;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum FatalError {
    #[error("internal defect: {0}")]
    Defect(String),
    #[error("cannot start worker pool: {0}")]
    Pool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobErrorKind {
    Decode,
    Geometry,
    EncodingHandoff,
    Io,
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobErrorKind::Decode => "decode",
            JobErrorKind::Geometry => "geometry",
            JobErrorKind::EncodingHandoff => "encoding-handoff",
            JobErrorKind::Io => "io",
        })
    }
}

/// A recorded per-job failure with enough context to find the culprit.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{kind} error on {}: {message}", describe(.path, .part))]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
    pub path: PathBuf,
    pub part: Option<PagePart>,
    pub algorithm: DitherAlgorithm,
}

fn describe(path: &std::path::Path, part: &Option<PagePart>) -> String {
    match part {
        Some(part) => format!("{} [{part}]", path.display()),
        None => path.display().to_string(),
    }
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>, job: &Job<'_>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: job.item.path.clone(),
            part: job.part,
            algorithm: job.config.dither,
        }
    }

    /// Classify a transform failure, or escalate it when it is a defect.
    fn from_transform(err: TransformError, job: &Job<'_>) -> Result<Self, FatalError> {
        let (kind, message) = match err {
            TransformError::Decode(m) => (JobErrorKind::Decode, m),
            TransformError::Io(m) => (JobErrorKind::Io, m),
            TransformError::Geometry(m) => (JobErrorKind::Geometry, m),
            TransformError::Dither(e) => return Err(FatalError::Defect(e.to_string())),
        };
        Ok(Self::new(kind, message, job))
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// One source image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceItem {
    pub path: PathBuf,
    /// Book the page belongs to; empty for standalone images.
    pub book: String,
    /// 1-based position in the book (or in the input list).
    pub page: u32,
    /// Another source of the same run has the same file stem, so output
    /// names must carry the extension too.
    pub stem_shared: bool,
    pub overrides: PageOverrides,
}

impl SourceItem {
    /// The run-wide transform with this page's exceptions applied.
    pub fn transform(&self, base: &TransformConfig) -> TransformConfig {
        self.overrides.apply(base)
    }
}

/// One unit of work: a source item, optionally one half of it, and the
/// shared configuration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub item: &'a SourceItem,
    pub part: Option<PagePart>,
    pub config: &'a JobConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Written { output: PathBuf, elapsed_ms: u64 },
    Failed(JobError),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub source: PathBuf,
    pub page: u32,
    pub part: Option<PagePart>,
    pub outcome: JobOutcome,
}

impl JobRecord {
    fn new(job: &Job<'_>, outcome: JobOutcome) -> Self {
        Self {
            source: job.item.path.clone(),
            page: job.item.page,
            part: job.part,
            outcome,
        }
    }
}

/// Final accounting of one scheduler run, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
    pub jobs: Vec<JobRecord>,
}

impl RunSummary {
    pub fn from_records(jobs: Vec<JobRecord>, elapsed: Duration) -> Self {
        let count = |pred: fn(&JobOutcome) -> bool| jobs.iter().filter(|j| pred(&j.outcome)).count();
        Self {
            total: jobs.len(),
            succeeded: count(|o| matches!(o, JobOutcome::Written { .. })),
            failed: count(|o| matches!(o, JobOutcome::Failed(_))),
            skipped: count(|o| matches!(o, JobOutcome::Skipped)),
            elapsed_ms: elapsed.as_millis() as u64,
            jobs,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobError> {
        self.jobs.iter().filter_map(|j| match &j.outcome {
            JobOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.jobs.iter().filter_map(|j| match &j.outcome {
            JobOutcome::Written { output, .. } => Some(output),
            _ => None,
        })
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress events emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    BookStarted {
        name: String,
        pages: usize,
    },
    PageWritten {
        page: u32,
        part: Option<PagePart>,
        output: PathBuf,
        finished: usize,
        total: usize,
        eta: Option<Duration>,
    },
    PageFailed {
        error: JobError,
        finished: usize,
        total: usize,
    },
    BookEncoded {
        name: String,
        output: PathBuf,
    },
    BookFailed {
        name: String,
        message: String,
    },
}

/// Shared run counters. Only these are touched by more than one worker.
#[derive(Debug)]
pub struct ProgressState {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    total: AtomicUsize,
    started: Instant,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            total: AtomicUsize::new(total),
            started: Instant::now(),
        }
    }

    /// Count a success; returns the number of finished jobs including it.
    pub fn record_success(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.finished()
    }

    pub fn record_failure(&self) -> usize {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.finished()
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop planned jobs that will never exist (the parts of an undecodable source).
    pub fn shrink_total(&self, by: usize) {
        self.total.fetch_sub(by, Ordering::Relaxed);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Jobs that ran to an outcome (written or failed).
    pub fn finished(&self) -> usize {
        self.completed() + self.failed()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Average time per finished job times the jobs still to run.
    pub fn eta(&self) -> Option<Duration> {
        let finished = self.finished();
        if finished == 0 {
            return None;
        }
        let remaining = self
            .total()
            .saturating_sub(finished)
            .saturating_sub(self.skipped());
        Some(self.elapsed() / finished as u32 * remaining as u32)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct Scheduler {
    pool: rayon::ThreadPool,
    workers: usize,
    cancel: CancelToken,
}

impl Scheduler {
    /// Build a scheduler with its own pool of `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self, FatalError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("inkpage-worker-{i}"))
            .build()
            .map_err(|e| FatalError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            workers,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every item through the page pipeline and write results to `sink`.
    pub fn run(
        &self,
        items: &[SourceItem],
        config: &JobConfig,
        sink: &impl PageSink,
        events: Option<&Sender<ProgressEvent>>,
    ) -> Result<RunSummary, FatalError> {
        let total = items
            .iter()
            .map(|item| plan_parts(&item.transform(&config.transform)).len())
            .sum();
        let progress = ProgressState::new(total);
        let ctx = RunContext {
            config,
            progress: &progress,
            cancel: &self.cancel,
            events,
        };

        let per_item: Vec<Vec<JobRecord>> = self.pool.install(|| {
            items
                .par_iter()
                .map(|item| ctx.run_item(item, sink))
                .collect::<Result<Vec<_>, FatalError>>()
        })?;

        let summary = RunSummary::from_records(per_item.into_iter().flatten().collect(), progress.elapsed());
        tracing::debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "run finished"
        );
        Ok(summary)
    }
}

/// Borrowed state shared by every job of one run.
struct RunContext<'a> {
    config: &'a JobConfig,
    progress: &'a ProgressState,
    cancel: &'a CancelToken,
    events: Option<&'a Sender<ProgressEvent>>,
}

impl RunContext<'_> {
    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = self.events {
            // A closed receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }

    fn job<'b>(&'b self, item: &'b SourceItem, part: Option<PagePart>) -> Job<'b> {
        Job {
            item,
            part,
            config: self.config,
        }
    }

    fn parts(&self, item: &SourceItem) -> Vec<Option<PagePart>> {
        plan_parts(&item.transform(&self.config.transform))
    }

    fn skip_all(&self, item: &SourceItem) -> Vec<JobRecord> {
        self.parts(item)
            .into_iter()
            .map(|part| {
                self.progress.record_skip();
                JobRecord::new(&self.job(item, part), JobOutcome::Skipped)
            })
            .collect()
    }

    fn fail(&self, job: &Job<'_>, error: JobError) -> JobRecord {
        tracing::warn!(source = %job.item.path.display(), kind = %error.kind, "{}", error.message);
        let finished = self.progress.record_failure();
        self.emit(ProgressEvent::PageFailed {
            error: error.clone(),
            finished,
            total: self.progress.total(),
        });
        JobRecord::new(job, JobOutcome::Failed(error))
    }

    fn run_item(&self, item: &SourceItem, sink: &impl PageSink) -> Result<Vec<JobRecord>, FatalError> {
        if self.cancel.is_cancelled() {
            return Ok(self.skip_all(item));
        }

        let transform = item.transform(&self.config.transform);
        let parts = plan_parts(&transform);
        let page = match decode_source(&item.path).and_then(|img| prepare(&img, &transform)) {
            Ok(page) => page,
            Err(err) => {
                // One record stands in for all parts of this source
                self.progress.shrink_total(parts.len() - 1);
                let job = self.job(item, None);
                let error = JobError::from_transform(err, &job)?;
                return Ok(vec![self.fail(&job, error)]);
            }
        };

        parts
            .par_iter()
            .map(|&part| self.run_part(&self.job(item, part), &page, sink))
            .collect()
    }

    fn run_part(
        &self,
        job: &Job<'_>,
        page: &image::GrayImage,
        sink: &impl PageSink,
    ) -> Result<JobRecord, FatalError> {
        if self.cancel.is_cancelled() {
            self.progress.record_skip();
            return Ok(JobRecord::new(job, JobOutcome::Skipped));
        }

        let started = Instant::now();
        let raster: RasterBuffer = match render_part(page, job.part, job.config) {
            Ok(raster) => raster,
            Err(err) => {
                let error = JobError::from_transform(err, job)?;
                return Ok(self.fail(job, error));
            }
        };

        match sink.write(job, &raster) {
            Ok(output) => {
                let elapsed = started.elapsed();
                tracing::debug!(
                    source = %job.item.path.display(),
                    output = %output.display(),
                    ms = elapsed.as_millis() as u64,
                    "page written"
                );
                let finished = self.progress.record_success();
                self.emit(ProgressEvent::PageWritten {
                    page: job.item.page,
                    part: job.part,
                    output: output.clone(),
                    finished,
                    total: self.progress.total(),
                    eta: self.progress.eta(),
                });
                Ok(JobRecord::new(
                    job,
                    JobOutcome::Written {
                        output,
                        elapsed_ms: elapsed.as_millis() as u64,
                    },
                ))
            }
            Err(error) => Ok(self.fail(job, error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Depth, Geometry, SplitAxis, TransformConfig};
    use crate::test_helpers::write_page;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Sink that records writes without touching the filesystem.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<(u32, Option<PagePart>)>>,
        fail_pages: Vec<u32>,
    }

    impl RecordingSink {
        fn failing_on(pages: &[u32]) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_pages: pages.to_vec(),
            }
        }

        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl PageSink for RecordingSink {
        fn write(&self, job: &Job<'_>, raster: &RasterBuffer) -> Result<PathBuf, JobError> {
            assert_eq!(raster.depth(), job.config.depth);
            if self.fail_pages.contains(&job.item.page) {
                return Err(JobError::new(JobErrorKind::Io, "disk full", job));
            }
            self.writes.lock().unwrap().push((job.item.page, job.part));
            let name = crate::naming::page_file_name(job.item.page, job.part);
            Ok(PathBuf::from("/out").join(name))
        }
    }

    fn small_config(split: Option<SplitAxis>) -> JobConfig {
        JobConfig {
            transform: TransformConfig {
                split,
                ..Default::default()
            },
            dither: DitherAlgorithm::Floyd,
            geometry: Geometry::pass_through(),
            depth: Depth::Gray8,
        }
    }

    fn make_items(dir: &Path, n: usize) -> Vec<SourceItem> {
        (1..=n)
            .map(|i| {
                let path = dir.join(format!("p{i:03}.png"));
                write_page(&path, 24, 32);
                SourceItem {
                    path,
                    book: "book".into(),
                    page: i as u32,
                    ..Default::default()
                }
            })
            .collect()
    }

    // =========================================================================
    // ProgressState
    // =========================================================================

    #[test]
    fn concurrent_progress_updates_are_not_lost() {
        let progress = ProgressState::new(8 * 1000);
        std::thread::scope(|s| {
            for t in 0..8 {
                let progress = &progress;
                s.spawn(move || {
                    for i in 0..1000 {
                        match (t + i) % 3 {
                            0 => {
                                progress.record_success();
                            }
                            1 => {
                                progress.record_failure();
                            }
                            _ => progress.record_skip(),
                        }
                    }
                });
            }
        });
        assert_eq!(
            progress.completed() + progress.failed() + progress.skipped(),
            8000
        );
        assert_eq!(progress.finished(), progress.completed() + progress.failed());
    }

    #[test]
    fn eta_is_none_before_first_job() {
        let progress = ProgressState::new(10);
        assert!(progress.eta().is_none());
        progress.record_success();
        assert!(progress.eta().is_some());
    }

    #[test]
    fn eta_is_zero_when_all_done() {
        let progress = ProgressState::new(2);
        progress.record_success();
        progress.record_failure();
        assert_eq!(progress.eta(), Some(Duration::ZERO));
    }

    // =========================================================================
    // Completeness
    // =========================================================================

    #[test]
    fn every_job_completes_for_any_worker_count() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(tmp.path(), 7);
        for workers in [1, 2, 3, 8] {
            for split in [None, Some(SplitAxis::Vertical)] {
                let config = small_config(split);
                let sink = RecordingSink::default();
                let summary = Scheduler::new(workers)
                    .unwrap()
                    .run(&items, &config, &sink, None)
                    .unwrap();

                let parts = if split.is_some() { 2 } else { 1 };
                assert_eq!(summary.total, 7 * parts, "workers={workers}");
                assert_eq!(summary.succeeded, 7 * parts);
                assert_eq!(sink.write_count(), 7 * parts);

                let unique: HashSet<&PathBuf> = summary.outputs().collect();
                assert_eq!(unique.len(), 7 * parts, "outputs must be distinct");
            }
        }
    }

    #[test]
    fn records_follow_input_order() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(tmp.path(), 5);
        let summary = Scheduler::new(4)
            .unwrap()
            .run(&items, &small_config(Some(SplitAxis::Vertical)), &RecordingSink::default(), None)
            .unwrap();
        let order: Vec<(u32, u8)> = summary
            .jobs
            .iter()
            .map(|j| (j.page, j.part.map(|p| p.seq).unwrap_or(0)))
            .collect();
        assert_eq!(
            order,
            vec![(1, 1), (1, 2), (2, 1), (2, 2), (3, 1), (3, 2), (4, 1), (4, 2), (5, 1), (5, 2)]
        );
    }

    #[test]
    fn zero_items_is_an_empty_success() {
        let summary = Scheduler::new(2)
            .unwrap()
            .run(&[], &small_config(None), &RecordingSink::default(), None)
            .unwrap();
        assert_eq!(summary.total, 0);
        assert!(!summary.has_failures());
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    #[test]
    fn undecodable_source_records_single_failure() {
        let tmp = TempDir::new().unwrap();
        let mut items = make_items(tmp.path(), 4);
        std::fs::write(&items[1].path, b"garbage").unwrap();
        items[1].page = 2;

        let sink = RecordingSink::default();
        let summary = Scheduler::new(3)
            .unwrap()
            .run(&items, &small_config(Some(SplitAxis::Vertical)), &sink, None)
            .unwrap();

        assert_eq!(summary.total, 3 * 2 + 1);
        assert_eq!(summary.succeeded, 6);
        assert_eq!(summary.failed, 1);
        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.kind, JobErrorKind::Decode);
        assert_eq!(failure.path, items[1].path);
        assert_eq!(failure.part, None);
        assert_eq!(failure.algorithm, DitherAlgorithm::Floyd);
    }

    #[test]
    fn sink_failure_does_not_stop_siblings() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(tmp.path(), 6);
        let sink = RecordingSink::failing_on(&[3]);
        let summary = Scheduler::new(2)
            .unwrap()
            .run(&items, &small_config(Some(SplitAxis::Vertical)), &sink, None)
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 10);
        assert!(summary.has_failures());
        assert!(summary.failures().all(|e| e.kind == JobErrorKind::Io));
        assert!(summary.failures().all(|e| e.part.is_some()));
    }

    #[test]
    fn missing_source_is_io_failure() {
        let item = SourceItem {
            path: PathBuf::from("/nonexistent/page.png"),
            book: String::new(),
            page: 1,
            ..Default::default()
        };
        let summary = Scheduler::new(1)
            .unwrap()
            .run(&[item], &small_config(None), &RecordingSink::default(), None)
            .unwrap();
        assert_eq!(summary.failures().next().unwrap().kind, JobErrorKind::Io);
    }

    // =========================================================================
    // Cancellation and events
    // =========================================================================

    #[test]
    fn cancelled_before_start_skips_everything() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(tmp.path(), 5);
        let token = CancelToken::new();
        token.cancel();

        let sink = RecordingSink::default();
        let summary = Scheduler::new(4)
            .unwrap()
            .with_cancel_token(token)
            .run(&items, &small_config(Some(SplitAxis::Vertical)), &sink, None)
            .unwrap();

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 10);
        assert_eq!(sink.write_count(), 0);
    }

    /// Writes real files and pulls the cancel token after the first one lands.
    struct CancellingWriter {
        inner: crate::writer::FileWriter,
        token: CancelToken,
    }

    impl PageSink for CancellingWriter {
        fn write(&self, job: &Job<'_>, raster: &RasterBuffer) -> Result<PathBuf, JobError> {
            let output = self.inner.write(job, raster)?;
            self.token.cancel();
            Ok(output)
        }
    }

    #[test]
    fn cancel_mid_run_leaves_only_recorded_outputs() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(&tmp.path().join("src"), 6);
        let out = tmp.path().join("out");
        let token = CancelToken::new();
        let sink = CancellingWriter {
            inner: crate::writer::FileWriter::new(crate::writer::OutputLayout::BookPages {
                dir: out.clone(),
            }),
            token: token.clone(),
        };

        let summary = Scheduler::new(1)
            .unwrap()
            .with_cancel_token(token)
            .run(&items, &small_config(Some(SplitAxis::Vertical)), &sink, None)
            .unwrap();

        assert!(summary.succeeded >= 1);
        assert!(summary.skipped > 0);
        assert_eq!(summary.succeeded + summary.skipped, summary.total);

        let mut on_disk: Vec<PathBuf> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        on_disk.sort();
        let mut recorded: Vec<PathBuf> = summary.outputs().cloned().collect();
        recorded.sort();
        assert_eq!(on_disk, recorded, "no staged or unrecorded files remain");
    }

    // =========================================================================
    // Per-page overrides
    // =========================================================================

    #[test]
    fn kept_whole_page_is_not_split() {
        let tmp = TempDir::new().unwrap();
        let mut items = make_items(tmp.path(), 3);
        items[0].overrides.keep_whole = true;

        let sink = RecordingSink::default();
        let summary = Scheduler::new(2)
            .unwrap()
            .run(&items, &small_config(Some(SplitAxis::Vertical)), &sink, None)
            .unwrap();

        assert_eq!(summary.total, 1 + 2 * 2);
        assert_eq!(summary.succeeded, 5);
        let first: Vec<Option<PagePart>> = summary
            .jobs
            .iter()
            .filter(|j| j.page == 1)
            .map(|j| j.part)
            .collect();
        assert_eq!(first, vec![None]);
        assert_eq!(summary.jobs.iter().filter(|j| j.page == 2).count(), 2);
    }

    #[test]
    fn page_contrast_replaces_run_contrast() {
        let tmp = TempDir::new().unwrap();
        let mut items = make_items(tmp.path(), 2);
        let boost = crate::imaging::ContrastBoost { dark: 4, light: 4 };
        items[1].overrides.contrast = Some(boost);

        let base = small_config(None);
        assert_eq!(items[0].transform(&base.transform).contrast, None);
        assert_eq!(items[1].transform(&base.transform).contrast, Some(boost));
        let summary = Scheduler::new(2)
            .unwrap()
            .run(&items, &base, &RecordingSink::default(), None)
            .unwrap();
        assert_eq!(summary.succeeded, 2);
    }

    #[test]
    fn events_report_every_finished_job() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(tmp.path(), 3);
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = RecordingSink::failing_on(&[2]);
        Scheduler::new(2)
            .unwrap()
            .run(&items, &small_config(None), &sink, Some(&tx))
            .unwrap();
        drop(tx);

        let events: Vec<ProgressEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        let written = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::PageWritten { .. }))
            .count();
        assert_eq!(written, 2);
        let max_finished = events
            .iter()
            .map(|e| match e {
                ProgressEvent::PageWritten { finished, .. }
                | ProgressEvent::PageFailed { finished, .. } => *finished,
                _ => 0,
            })
            .max();
        assert_eq!(max_finished, Some(3));
    }

    #[test]
    fn summary_serializes_to_json() {
        let tmp = TempDir::new().unwrap();
        let items = make_items(tmp.path(), 2);
        let sink = RecordingSink::failing_on(&[2]);
        let summary = Scheduler::new(1)
            .unwrap()
            .run(&items, &small_config(None), &sink, None)
            .unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["jobs"][0]["outcome"]["status"], "written");
        assert_eq!(json["jobs"][1]["outcome"]["status"], "failed");
        assert_eq!(json["jobs"][1]["outcome"]["kind"], "io");
        assert_eq!(json["jobs"][1]["outcome"]["algorithm"], "floyd");
    }
}
