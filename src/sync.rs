//! Batch sync: resolve many descriptors in parallel, commit or queue each.
//!
//! Resolutions run on the rayon pool and are sent over a bounded channel to
//! a single collector, which is the only place that writes to the playlist
//! and the review queue. Cancellation is checked before each song starts;
//! songs already committed stay committed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{CommitTier, Resolution, SourceDescriptor, UnresolvedReason};
use crate::progress::Progress;
use crate::queue::{PlaylistMutation, ReviewQueue};
use crate::resolver::{ResolutionReport, Resolver};

const LOG_INTERVAL: u64 = 100;

pub struct SyncJob {
    pub user_id: String,
    pub playlist_ref: String,
    pub descriptors: Vec<SourceDescriptor>,
}

/// Counters for one sync run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub attempted: usize,
    pub cancelled: usize,

    // Auto-commits by tier
    pub committed_high: usize,
    pub committed_medium: usize,
    pub committed_trusted_exact: usize,
    /// Auto-commits whose playlist write failed (re-queued for review)
    pub commit_failures: usize,

    pub pending_review: usize,
    pub unresolved_no_results: usize,
    pub unresolved_low_confidence: usize,
    pub enqueue_failures: usize,

    pub extraction_methods: BTreeMap<String, usize>,
}

impl SyncSummary {
    pub fn committed(&self) -> usize {
        self.committed_high + self.committed_medium + self.committed_trusted_exact
    }

    /// Committed share of attempted songs, as a percentage.
    pub fn commit_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            100.0 * self.committed() as f64 / self.attempted as f64
        }
    }

    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            info!("[STATS:{}]\n{}", phase, json);
        }
    }

    pub fn write_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

pub struct SyncEngine {
    resolver: Arc<Resolver>,
    queue: Arc<ReviewQueue>,
    playlist: Arc<dyn PlaylistMutation>,
    channel_capacity: usize,
}

impl SyncEngine {
    pub fn new(resolver: Arc<Resolver>, queue: Arc<ReviewQueue>, playlist: Arc<dyn PlaylistMutation>) -> Self {
        Self {
            resolver,
            queue,
            playlist,
            channel_capacity: 256,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn run(&self, job: &SyncJob, cancel: &AtomicBool, progress: &Progress) -> SyncSummary {
        let total = job.descriptors.len();
        let trust = self.queue.tracker().state(&job.user_id);
        let pb = progress.bar(total as u64, "Resolving");
        let (tx, rx) = bounded::<ResolutionReport>(self.channel_capacity);

        let mut summary = std::thread::scope(|scope| {
            let collector = scope.spawn(|| self.collect(job, rx, &pb, progress));

            job.descriptors.par_iter().for_each_with(tx, |tx, descriptor| {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let report = self.resolver.resolve(descriptor, trust);
                if tx.send(report).is_err() {
                    warn!(title = %descriptor.raw_title, "collector gone, dropping resolution");
                }
            });

            match collector.join() {
                Ok(summary) => summary,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        summary.total = total;
        summary.cancelled = total - summary.attempted;
        pb.finish_with_message(format!(
            "Resolved {} songs ({} committed, {} queued)",
            summary.attempted,
            summary.committed(),
            summary.pending_review + summary.unresolved_no_results + summary.unresolved_low_confidence
        ));
        if summary.cancelled > 0 {
            info!(cancelled = summary.cancelled, "sync cancelled");
        }
        summary
    }

    fn collect(&self, job: &SyncJob, rx: Receiver<ResolutionReport>, pb: &ProgressBar, progress: &Progress) -> SyncSummary {
        let mut summary = SyncSummary::default();
        let total = job.descriptors.len() as u64;

        for report in rx {
            summary.attempted += 1;
            *summary
                .extraction_methods
                .entry(report.extraction.method.as_str().to_string())
                .or_default() += 1;
            self.apply(job, report, &mut summary);
            pb.inc(1);
            progress.log("sync", summary.attempted as u64, total, LOG_INTERVAL);
        }
        summary
    }

    /// Exactly one playlist write per auto-commit; everything else is queued.
    fn apply(&self, job: &SyncJob, report: ResolutionReport, summary: &mut SyncSummary) {
        let pending = match report.resolution {
            Resolution::AutoCommit { best, tier } => {
                match self.playlist.add_track(&job.playlist_ref, best.track_id()) {
                    Ok(()) => {
                        match tier {
                            CommitTier::High => summary.committed_high += 1,
                            CommitTier::Medium => summary.committed_medium += 1,
                            CommitTier::TrustedExact => summary.committed_trusted_exact += 1,
                        }
                        return;
                    }
                    Err(err) => {
                        warn!(track = %best.track_id(), "auto-commit failed, queued for review: {err}");
                        summary.commit_failures += 1;
                        Resolution::PendingReview {
                            candidates: vec![best],
                            descriptor: report.descriptor,
                        }
                    }
                }
            }
            other => other,
        };

        match &pending {
            Resolution::PendingReview { .. } => summary.pending_review += 1,
            Resolution::Unresolved {
                reason: UnresolvedReason::NoResults,
                ..
            } => summary.unresolved_no_results += 1,
            Resolution::Unresolved { .. } => summary.unresolved_low_confidence += 1,
            Resolution::AutoCommit { .. } => {}
        }
        if let Err(err) = self.queue.enqueue_resolution(&job.user_id, &job.playlist_ref, &pending) {
            warn!("failed to queue resolution: {err}");
            summary.enqueue_failures += 1;
        }
    }
}
