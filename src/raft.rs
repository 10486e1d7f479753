//! Component E: Raft-mode handlers — leader-status, commit, and the derived
//! leader-progress timer state machine.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Mode;
use crate::coordinator::AuditCoordinator;
use crate::history::Outcome;
use crate::metrics;
use crate::state::AuditState;

/// What the leader-progress state machine decided to do with the progress
/// timer, computed while holding the state lock and acted on after
/// releasing it (arming/cancelling a timer is synchronous, but we still
/// don't want to do it mid-lock-hold for a consistent "one critical section
/// per handler" shape).
enum ProgressTransition {
    Clear,
    Rearm,
    None,
}

enum RecordOutcome {
    New,
    Unchanged,
    Conflict { existing: String },
}

impl AuditCoordinator {
    pub(crate) fn reset_leader_alive_timer(self: &Arc<Self>) {
        debug!("starting leader alive timer");
        let coordinator = self.clone();
        self.leader_or_primary_alive_timer
            .arm(self.leader_alive_timeout, move || async move {
                coordinator.handle_leader_alive_timeout().await;
            });
    }

    async fn handle_leader_alive_timeout(self: Arc<Self>) {
        let count = {
            let mut state = self.state.lock().await;
            state.leader_dead_count += 1;
            state.leader_has_uncommitted_entries = false;
            state.leader_dead_count
        };
        self.clear_leader_progress_timer().await;
        self.report_error(
            metrics::LEADER_NO_LEADER,
            format!("No leader alive [{count}]"),
        )
        .await;

        // Periodic: re-arm so the metric keeps accumulating while the
        // condition persists.
        self.reset_leader_alive_timer();
    }

    /// (Re)arms the progress timer and resets `leader_stuck_count` — a
    /// restarted timer always means the condition it watches for just
    /// cleared, so a future expiry is a fresh episode, not a continuation.
    pub(crate) async fn reset_leader_progress_timer(self: &Arc<Self>) {
        debug!("(re)starting leader progress timer");
        let coordinator = self.clone();
        self.leader_progress_timer
            .arm(self.leader_progress_timeout, move || async move {
                coordinator.handle_leader_progress_timeout().await;
            });
        self.state.lock().await.leader_stuck_count = 0;
    }

    pub(crate) async fn clear_leader_progress_timer(self: &Arc<Self>) {
        self.leader_progress_timer.cancel();
        self.state.lock().await.leader_stuck_count = 0;
    }

    async fn handle_leader_progress_timeout(self: Arc<Self>) {
        let count = {
            let mut state = self.state.lock().await;
            state.leader_stuck_count += 1;
            state.leader_stuck_count
        };
        self.report_error(
            metrics::LEADER_STUCK,
            format!("Leader alive but not making progress [{count}]"),
        )
        .await;

        // Periodic while the condition persists.
        self.reset_leader_progress_timer().await;
    }

    /// Records the current term's leader, first-writer-wins, resets the
    /// leader-alive timer, and drives the leader-progress state machine.
    /// All state reads/writes for this event happen under a single lock
    /// acquisition; timer arming and metric emission (the only awaits)
    /// happen after it's released.
    pub(crate) async fn handle_leader_status(
        self: &Arc<Self>,
        term: u64,
        leader: String,
        current_log_index: u64,
        current_commit_index: u64,
    ) {
        if self.mode() == Mode::Pbft {
            debug!("audit ignoring leader status message because we are in pbft mode");
            return;
        }

        let (record_outcome, progress) = {
            let mut state = self.state.lock().await;

            let record_outcome = match state.leader_history.record(term, leader.clone()) {
                Outcome::New => {
                    state.leader_history.trim();
                    RecordOutcome::New
                }
                Outcome::Unchanged => RecordOutcome::Unchanged,
                Outcome::Conflict { existing } => RecordOutcome::Conflict { existing },
            };

            state.leader_dead_count = 0;

            let progress = drive_leader_progress(
                &mut state,
                &leader,
                current_log_index,
                current_commit_index,
            );

            (record_outcome, progress)
        };

        match record_outcome {
            RecordOutcome::New => {
                info!(term, %leader, "audit recording new leader");
                self.emitter.emit(metrics::LEADER_NEW).await;
            }
            RecordOutcome::Unchanged => {}
            RecordOutcome::Conflict { existing } => {
                self.report_error(
                    metrics::LEADER_CONFLICT,
                    format!(
                        "Conflicting leader elected! '{existing}' is the recorded leader of \
                         term {term}, but '{leader}' claims to be the leader of the same term."
                    ),
                )
                .await;
            }
        }

        self.reset_leader_alive_timer();

        match progress {
            ProgressTransition::Clear => self.clear_leader_progress_timer().await,
            ProgressTransition::Rearm => self.reset_leader_progress_timer().await,
            ProgressTransition::None => {}
        }
    }

    /// Always emits `audit.raft.commit` once per received event, before
    /// recording.
    pub(crate) async fn handle_raft_commit(self: &Arc<Self>, log_index: u64, operation: String) {
        if self.mode() == Mode::Pbft {
            debug!("audit ignoring raft commit message because we are in pbft mode");
            return;
        }

        self.emitter.emit(metrics::RAFT_COMMIT).await;

        let record_outcome = {
            let mut state = self.state.lock().await;
            match state.raft_commit_history.record(log_index, operation.clone()) {
                Outcome::New => {
                    state.raft_commit_history.trim();
                    RecordOutcome::New
                }
                Outcome::Unchanged => RecordOutcome::Unchanged,
                Outcome::Conflict { existing } => RecordOutcome::Conflict { existing },
            }
        };

        match record_outcome {
            RecordOutcome::New => {
                info!(log_index, %operation, "audit recording raft commit");
            }
            RecordOutcome::Unchanged => {}
            RecordOutcome::Conflict { existing } => {
                self.report_error(
                    metrics::RAFT_COMMIT_CONFLICT,
                    format!(
                        "Conflicting commit detected! '{existing}' is the recorded entry at \
                         index {log_index}, but '{operation}' has been committed with the same \
                         index."
                    ),
                )
                .await;
            }
        }
    }
}

/// The leader-progress state machine, pure aside from the `AuditState`
/// mutations — called while the caller holds the state lock.
fn drive_leader_progress(
    state: &mut AuditState,
    leader: &str,
    current_log_index: u64,
    current_commit_index: u64,
) -> ProgressTransition {
    let transition = if leader != state.last_leader {
        state.last_leader = leader.to_string();
        made_progress(state, current_log_index, current_commit_index)
    } else if current_commit_index > state.last_leader_commit_index {
        made_progress(state, current_log_index, current_commit_index)
    } else if current_log_index > current_commit_index && !state.leader_has_uncommitted_entries {
        state.leader_has_uncommitted_entries = true;
        ProgressTransition::Rearm
    } else {
        ProgressTransition::None
    };

    state.last_leader_commit_index = current_commit_index;
    transition
}

/// The "made-progress" sub-rule, shared by the leader-changed and
/// commit-advanced call sites.
fn made_progress(
    state: &mut AuditState,
    current_log_index: u64,
    current_commit_index: u64,
) -> ProgressTransition {
    if current_commit_index == current_log_index {
        state.leader_has_uncommitted_entries = false;
        ProgressTransition::Clear
    } else {
        state.leader_has_uncommitted_entries = true;
        ProgressTransition::Rearm
    }
}
