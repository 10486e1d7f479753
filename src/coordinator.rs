//! Component G: mode selection, identity, shared lock, startup guard; wires
//! the rest of the audit together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::collab::{DatagramSink, InboundMessage, MessageDelivery};
use crate::config::{AuditConfig, Mode};
use crate::events::{decode_envelope, decode_event, AuditEvent};
use crate::metrics::MetricEmitter;
use crate::state::AuditState;
use crate::timers::RearmableTimer;

/// Holds mode selection, identity, shared lock, and startup guard; wires
/// the metric emitter, bounded-history store, timer set, and mode-specific
/// handlers together. Construction is lightweight — no registration or
/// timer arming happens until `start()`.
pub struct AuditCoordinator {
    pub(crate) mode: Mode,
    pub(crate) state: Mutex<AuditState>,
    pub(crate) emitter: MetricEmitter,

    /// Shared between leader-alive (Raft) and primary-alive (PBFT) — the
    /// mode is fixed for the audit's lifetime so the two are mutually
    /// exclusive.
    pub(crate) leader_or_primary_alive_timer: RearmableTimer,
    pub(crate) leader_progress_timer: RearmableTimer,

    pub(crate) leader_alive_timeout: std::time::Duration,
    pub(crate) primary_alive_timeout: std::time::Duration,
    pub(crate) leader_progress_timeout: std::time::Duration,

    started: AtomicBool,
}

impl AuditCoordinator {
    pub fn new(config: AuditConfig, sink: Arc<dyn DatagramSink>) -> Arc<Self> {
        let emitter = MetricEmitter::new(&config.uuid, config.monitor_endpoint, sink);

        Arc::new(Self {
            mode: config.mode,
            state: Mutex::new(AuditState::new(config.mem_ceiling)),
            emitter,
            leader_or_primary_alive_timer: RearmableTimer::new(),
            leader_progress_timer: RearmableTimer::new(),
            leader_alive_timeout: config.leader_alive_timeout,
            primary_alive_timeout: config.primary_alive_timeout,
            leader_progress_timeout: config.leader_progress_timeout,
            started: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Idempotent: registers the dispatch entrypoint with the delivery
    /// collaborator for message kind `"audit"`, logs the startup banner, and
    /// arms the mode-appropriate alive timer. Subsequent calls are no-ops.
    pub fn start(self: &Arc<Self>, delivery: &dyn MessageDelivery) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Audit module running");

        let coordinator = self.clone();
        delivery.register_for_message(
            "audit",
            Arc::new(move |msg: InboundMessage| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator.handle_inbound(msg).await;
                });
            }),
        );

        match self.mode {
            Mode::Raft => self.reset_leader_alive_timer(),
            Mode::Pbft => self.reset_primary_alive_timer(),
        }
    }

    /// Decodes the envelope, routes by variant, and always closes the
    /// session afterwards — whether or not decoding succeeded.
    async fn handle_inbound(self: &Arc<Self>, mut msg: InboundMessage) {
        match decode_envelope(&msg.body).and_then(|env| decode_event(&env)) {
            Ok(event) => self.dispatch(event).await,
            Err(err) => {
                tracing::error!(%err, "failed to decode inbound audit envelope");
            }
        }
        msg.session.close();
    }

    /// Routes a decoded event to its mode-specific handler. Mode-alien
    /// events are dropped inside the handler itself.
    pub(crate) async fn dispatch(self: &Arc<Self>, event: AuditEvent) {
        match event {
            AuditEvent::RaftCommit {
                log_index,
                operation,
            } => self.handle_raft_commit(log_index, operation).await,
            AuditEvent::LeaderStatus {
                term,
                leader,
                current_log_index,
                current_commit_index,
            } => {
                self.handle_leader_status(term, leader, current_log_index, current_commit_index)
                    .await
            }
            AuditEvent::PbftCommit {
                sequence_number,
                request_hash,
            } => self.handle_pbft_commit(sequence_number, request_hash).await,
            AuditEvent::PrimaryStatus { view, primary } => {
                self.handle_primary_status(view, primary).await
            }
            AuditEvent::FailureDetected => self.handle_failure_detected().await,
        }
    }

    /// Appends `description`, logs at fatal severity (`tracing` has no
    /// "fatal" level, so this is an `error!` event with `fatal = true`),
    /// emits `metric`, then trims the error sequence.
    pub(crate) async fn report_error(self: &Arc<Self>, metric: &'static str, description: String) {
        {
            let mut state = self.state.lock().await;
            tracing::error!(fatal = true, stat = metric, %description, "audit error");
            state.errors.push(description);
        }
        self.emitter.emit(metric).await;
    }

    pub async fn error_count(&self) -> u64 {
        self.state.lock().await.errors.error_count()
    }

    pub async fn error_strings(&self) -> Vec<String> {
        self.state.lock().await.errors.error_strings()
    }

    pub async fn current_memory_size(&self) -> usize {
        self.state.lock().await.current_memory_size()
    }
}
