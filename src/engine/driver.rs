use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::SliceConfig;
use crate::core::types::SliceRegion;
use crate::engine::frontier::Frontier;
use crate::engine::registry::FragmentRegistry;
use crate::engine::scanner::{AlignmentSource, RecordSink, RegionScanner, ScanError, ScanStats};

/// Errors that end a run without a summary
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to write accepted record: {0}")]
    Sink(#[source] std::io::Error),

    #[error("A scanning worker panicked")]
    WorkerPanicked,
}

/// Cooperative cancellation shared between the caller and the workers.
///
/// Once set, no new region is handed out; scans already running finish and their
/// accepted records are still delivered.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// A candidate region was refused because the frontier was full
    CapacityExceeded,
    Cancelled,
    /// The configured wall-clock budget ran out
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every admitted region was scanned and no candidate was refused
    Completed,
    Truncated { reason: TruncationReason },
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Truncated { reason } => {
                let reason = match reason {
                    TruncationReason::CapacityExceeded => "capacity exceeded",
                    TruncationReason::Cancelled => "cancelled",
                    TruncationReason::Deadline => "deadline",
                };
                write!(f, "truncated ({reason})")
            }
        }
    }
}

/// A region whose query failed; its records and discoveries are missing from the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRegion {
    pub region: String,
    pub error: String,
}

/// What a run produced
#[derive(Debug, Clone, Serialize)]
pub struct SliceSummary {
    #[serde(flatten)]
    pub status: RunStatus,

    /// Records delivered to the sink
    pub records_accepted: u64,

    /// Regions whose scan finished, successfully or not
    pub regions_scanned: usize,

    /// Regions admitted but never scanned because the run stopped early
    pub regions_unscanned: usize,

    pub regions_failed: Vec<FailedRegion>,

    /// Candidate regions refused because the frontier was full
    pub regions_rejected_by_cap: usize,

    /// Mate or supplementary links that could not be followed
    pub malformed_signatures: u64,

    /// Sorted read names whose fragment still had pending records when the run ended
    pub incomplete_fragments: Vec<String>,
}

#[derive(Debug, Default)]
struct RunTotals {
    records_accepted: u64,
    malformed_signatures: u64,
    regions_failed: Vec<FailedRegion>,
    sink_error: Option<std::io::Error>,
}

impl RunTotals {
    fn add(&mut self, stats: &ScanStats) {
        self.records_accepted += stats.reads_processed;
        self.malformed_signatures += stats.malformed_links;
    }
}

/// Abandons the frontier if a worker unwinds mid-scan, so the others don't wait on its
/// region forever
struct AbandonOnPanic<'a>(&'a Frontier);

impl Drop for AbandonOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abandon();
        }
    }
}

/// Runs the discovery loop over a source with a pool of scanning workers
pub struct SliceEngine<'a, S, K: ?Sized> {
    source: &'a S,
    sink: &'a K,
    config: SliceConfig,
    cancel: CancelFlag,
}

impl<'a, S, K> SliceEngine<'a, S, K>
where
    S: AlignmentSource,
    K: RecordSink<S::Payload> + ?Sized,
{
    pub fn new(source: &'a S, sink: &'a K, config: SliceConfig) -> Self {
        Self {
            source,
            sink,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Use an existing cancellation flag instead of a fresh one
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this engine's runs
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Scan `regions` and every region discovered from them until the frontier drains or
    /// the run is truncated.
    ///
    /// Per-region query failures are reported in the summary rather than returned.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Sink` if the sink rejects a record, or
    /// `EngineError::WorkerPanicked` if a worker thread panics.
    pub fn run(&self, regions: Vec<SliceRegion>) -> Result<SliceSummary, EngineError> {
        let registry = FragmentRegistry::new();
        let frontier = Frontier::new(
            self.config.max_frontier_regions,
            self.config.derived_region_margin,
        );

        let requested = regions.len();
        let seeded = frontier.seed(regions);
        info!(
            requested,
            seeded,
            threads = self.config.threads,
            "Starting slice"
        );

        let deadline = self.config.max_runtime().map(|budget| Instant::now() + budget);
        let deadline_hit = AtomicBool::new(false);
        let should_stop = || {
            if self.cancel.is_cancelled() {
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                deadline_hit.store(true, Ordering::SeqCst);
                return true;
            }
            false
        };

        let totals = Mutex::new(RunTotals::default());
        let scanner = RegionScanner::new(self.source, &registry, &frontier, &self.config);

        let panicked = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.threads.max(1))
                .map(|worker| {
                    let scanner = &scanner;
                    let frontier = &frontier;
                    let totals = &totals;
                    let should_stop = &should_stop;
                    scope.spawn(move || {
                        let _guard = AbandonOnPanic(frontier);
                        while let Some(ticket) = frontier.next(should_stop) {
                            match scanner.scan(&ticket, self.sink) {
                                Ok(stats) => {
                                    frontier.complete(ticket.id, true);
                                    totals.lock().add(&stats);
                                }
                                Err(ScanError::Query {
                                    region,
                                    source,
                                    stats,
                                }) => {
                                    warn!(worker, region = %region, error = %source, "Region query failed");
                                    frontier.complete(ticket.id, false);
                                    let mut totals = totals.lock();
                                    totals.add(&stats);
                                    totals.regions_failed.push(FailedRegion {
                                        region: region.to_string(),
                                        error: source.to_string(),
                                    });
                                }
                                Err(ScanError::Sink(e)) => {
                                    frontier.complete(ticket.id, false);
                                    let mut totals = totals.lock();
                                    if totals.sink_error.is_none() {
                                        totals.sink_error = Some(e);
                                    }
                                    drop(totals);
                                    frontier.stop();
                                    break;
                                }
                            }
                        }
                        debug!(worker, "Worker finished");
                    })
                })
                .collect();

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            panicked
        });

        let totals = totals.into_inner();
        if let Some(e) = totals.sink_error {
            return Err(EngineError::Sink(e));
        }
        if panicked {
            return Err(EngineError::WorkerPanicked);
        }

        let stats = frontier.stats();
        let status = if frontier.was_stopped() && self.cancel.is_cancelled() {
            RunStatus::Truncated {
                reason: TruncationReason::Cancelled,
            }
        } else if frontier.was_stopped() && deadline_hit.load(Ordering::SeqCst) {
            RunStatus::Truncated {
                reason: TruncationReason::Deadline,
            }
        } else if stats.rejected_by_cap > 0 {
            RunStatus::Truncated {
                reason: TruncationReason::CapacityExceeded,
            }
        } else {
            RunStatus::Completed
        };

        let incomplete_fragments = registry.incomplete_read_names();
        if !status.is_complete() {
            warn!(
                %status,
                unscanned = stats.unscanned,
                incomplete = incomplete_fragments.len(),
                "Slice truncated"
            );
        }
        if totals.malformed_signatures > 0 {
            warn!(
                count = totals.malformed_signatures,
                "Skipped malformed mate or supplementary links"
            );
        }

        let summary = SliceSummary {
            status,
            records_accepted: totals.records_accepted,
            regions_scanned: stats.scanned + stats.failed,
            regions_unscanned: stats.unscanned,
            regions_failed: totals.regions_failed,
            regions_rejected_by_cap: stats.rejected_by_cap,
            malformed_signatures: totals.malformed_signatures,
            incomplete_fragments,
        };
        info!(
            accepted = summary.records_accepted,
            scanned = summary.regions_scanned,
            failed = summary.regions_failed.len(),
            "Slice finished"
        );

        Ok(summary)
    }
}
