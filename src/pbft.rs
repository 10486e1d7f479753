//! Component F: PBFT-mode handlers — primary-status, commit, and
//! failure-detected logic.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Mode;
use crate::coordinator::AuditCoordinator;
use crate::history::Outcome;
use crate::metrics;

enum RecordOutcome {
    New,
    Unchanged,
    Conflict { existing: String },
}

impl AuditCoordinator {
    /// Shares `leader_or_primary_alive_timer` with the Raft handlers —
    /// mode is fixed for the audit's lifetime, so the two never arm it
    /// concurrently. A separate field would only complicate the timer
    /// bookkeeping for no behavioral gain.
    pub(crate) fn reset_primary_alive_timer(self: &Arc<Self>) {
        debug!("starting primary alive timer");
        let coordinator = self.clone();
        self.leader_or_primary_alive_timer
            .arm(self.primary_alive_timeout, move || async move {
                coordinator.handle_primary_alive_timeout().await;
            });
    }

    async fn handle_primary_alive_timeout(self: Arc<Self>) {
        let count = {
            let mut state = self.state.lock().await;
            state.primary_dead_count += 1;
            state.primary_dead_count
        };
        // Unlike the Raft variant, a missing primary says nothing about
        // commit progress, so the progress timer is left untouched here.
        self.report_error(
            metrics::PRIMARY_NO_PRIMARY,
            format!("No primary alive [{count}]"),
        )
        .await;

        self.reset_primary_alive_timer();
    }

    /// Records the current view's primary, first-writer-wins, and resets
    /// the primary-alive timer.
    pub(crate) async fn handle_primary_status(self: &Arc<Self>, view: u64, primary: String) {
        if self.mode() == Mode::Raft {
            debug!("audit ignoring primary status message because we are in raft mode");
            return;
        }

        let record_outcome = {
            let mut state = self.state.lock().await;
            let outcome = match state.primary_history.record(view, primary.clone()) {
                Outcome::New => {
                    state.primary_history.trim();
                    RecordOutcome::New
                }
                Outcome::Unchanged => RecordOutcome::Unchanged,
                Outcome::Conflict { existing } => RecordOutcome::Conflict { existing },
            };
            state.primary_dead_count = 0;
            outcome
        };

        match record_outcome {
            RecordOutcome::New => {
                info!(view, %primary, "audit recording new primary");
                self.emitter.emit(metrics::PRIMARY_HEARD).await;
            }
            RecordOutcome::Unchanged => {}
            RecordOutcome::Conflict { existing } => {
                self.report_error(
                    metrics::PRIMARY_CONFLICT,
                    format!(
                        "Conflicting primary elected! '{existing}' is the recorded primary of \
                         view {view}, but '{primary}' claims to be the primary of the same view."
                    ),
                )
                .await;
            }
        }

        self.reset_primary_alive_timer();
    }

    /// Emits `audit.pbft.commit` before recording, mirroring
    /// `handle_raft_commit`'s ordering.
    pub(crate) async fn handle_pbft_commit(
        self: &Arc<Self>,
        sequence_number: u64,
        request_hash: String,
    ) {
        if self.mode() == Mode::Raft {
            debug!("audit ignoring pbft commit message because we are in raft mode");
            return;
        }

        self.emitter.emit(metrics::PBFT_COMMIT).await;

        let record_outcome = {
            let mut state = self.state.lock().await;
            match state
                .pbft_commit_history
                .record(sequence_number, request_hash.clone())
            {
                Outcome::New => {
                    state.pbft_commit_history.trim();
                    RecordOutcome::New
                }
                Outcome::Unchanged => RecordOutcome::Unchanged,
                Outcome::Conflict { existing } => RecordOutcome::Conflict { existing },
            }
        };

        match record_outcome {
            RecordOutcome::New => {
                info!(sequence_number, %request_hash, "audit recording pbft commit");
            }
            RecordOutcome::Unchanged => {}
            RecordOutcome::Conflict { existing } => {
                self.report_error(
                    metrics::PBFT_COMMIT_CONFLICT,
                    format!(
                        "Conflicting commit detected! '{existing}' is the recorded request \
                         hash at sequence {sequence_number}, but '{request_hash}' has been \
                         committed with the same sequence number."
                    ),
                )
                .await;
            }
        }
    }

    /// Metric only — no recorded state.
    pub(crate) async fn handle_failure_detected(self: &Arc<Self>) {
        if self.mode() == Mode::Raft {
            debug!("audit ignoring failure detected message because we are in raft mode");
            return;
        }

        self.emitter.emit(metrics::PBFT_FAILURE_DETECTED).await;
    }
}
