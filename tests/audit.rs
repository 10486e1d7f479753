//! Integration tests driving `AuditCoordinator` the way the host process
//! would: through `MessageDelivery::register_for_message` with encoded
//! envelopes, never by calling crate-private handler methods directly.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use swarm_audit::{
    AuditConfig, AuditCoordinator, AuditEvent, DatagramSink, InboundMessage, MessageDelivery,
    Mode, Session,
};

type Handler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

#[derive(Default)]
struct MockDelivery {
    handler: StdMutex<Option<Handler>>,
}

#[async_trait]
impl MessageDelivery for MockDelivery {
    fn register_for_message(&self, kind: &str, handler: Handler) {
        assert_eq!(kind, "audit");
        *self.handler.lock().unwrap() = Some(handler);
    }
}

impl MockDelivery {
    /// Encodes `event` as the real wire envelope and feeds it through the
    /// registered callback, then yields so the coordinator's spawned
    /// dispatch task can run to completion.
    async fn deliver(&self, event: AuditEvent) {
        let handler = self
            .handler
            .lock()
            .unwrap()
            .clone()
            .expect("audit must register a handler before delivery");
        handler(InboundMessage {
            body: encode_envelope(&event),
            session: Box::new(ClosingSession::default()),
        });
        settle().await;
    }
}

#[derive(Default)]
struct ClosingSession {
    closed: Arc<AtomicBool>,
}

impl Session for ClosingSession {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: StdMutex<Vec<(SocketAddr, String)>>,
}

#[async_trait]
impl DatagramSink for RecordingSink {
    async fn send(&self, target: SocketAddr, payload: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(payload).into_owned();
        self.sent.lock().unwrap().push((target, line));
        Ok(payload.len())
    }
}

fn encode_envelope(event: &AuditEvent) -> Vec<u8> {
    let payload = bincode::serialize(event).unwrap();
    let b64 = base64::engine::general_purpose::STANDARD.encode(payload);
    serde_json::to_vec(&serde_json::json!({ "audit-data": b64 })).unwrap()
}

/// Spawned dispatch tasks don't sleep on anything but lock acquisition and
/// mocked sends, so a couple of scheduler yields are enough for them to run
/// to completion even under `start_paused`.
async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

fn monitor_endpoint() -> SocketAddr {
    "127.0.0.1:9125".parse().unwrap()
}

fn raft_coordinator(sink: Arc<RecordingSink>) -> Arc<AuditCoordinator> {
    let mut config = AuditConfig::new("node-1", Mode::Raft);
    config.monitor_endpoint = Some(monitor_endpoint());
    AuditCoordinator::new(config, sink)
}

fn pbft_coordinator(sink: Arc<RecordingSink>) -> Arc<AuditCoordinator> {
    let mut config = AuditConfig::new("node-1", Mode::Pbft);
    config.monitor_endpoint = Some(monitor_endpoint());
    AuditCoordinator::new(config, sink)
}

#[tokio::test]
async fn conflicting_leader_is_reported_once() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = raft_coordinator(sink.clone());
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    delivery
        .deliver(AuditEvent::LeaderStatus {
            term: 5,
            leader: "alice".into(),
            current_log_index: 3,
            current_commit_index: 3,
        })
        .await;
    delivery
        .deliver(AuditEvent::LeaderStatus {
            term: 5,
            leader: "bob".into(),
            current_log_index: 3,
            current_commit_index: 3,
        })
        .await;

    assert_eq!(coordinator.error_count().await, 1);
    let errors = coordinator.error_strings().await;
    assert!(errors[0].contains("alice"));
    assert!(errors[0].contains("bob"));

    let sent = sink.sent.lock().unwrap();
    assert!(sent.iter().any(|(_, line)| line.ends_with("audit.leader.conflict|c")));
}

#[tokio::test]
async fn repeated_identical_leader_status_is_not_a_conflict() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = raft_coordinator(sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    for _ in 0..5 {
        delivery
            .deliver(AuditEvent::LeaderStatus {
                term: 1,
                leader: "alice".into(),
                current_log_index: 1,
                current_commit_index: 1,
            })
            .await;
    }

    assert_eq!(coordinator.error_count().await, 0);
}

#[tokio::test]
async fn conflicting_raft_commit_is_reported() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = raft_coordinator(sink.clone());
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    delivery
        .deliver(AuditEvent::RaftCommit {
            log_index: 10,
            operation: "set(a,1)".into(),
        })
        .await;
    delivery
        .deliver(AuditEvent::RaftCommit {
            log_index: 10,
            operation: "set(a,2)".into(),
        })
        .await;

    assert_eq!(coordinator.error_count().await, 1);

    let sent = sink.sent.lock().unwrap();
    // Commit metric fires for both deliveries, conflict metric for the second.
    assert_eq!(
        sent.iter()
            .filter(|(_, line)| line.ends_with("audit.raft.commit|c"))
            .count(),
        2
    );
    assert!(sent
        .iter()
        .any(|(_, line)| line.ends_with("audit.raft.commit_conflict|c")));
}

#[tokio::test]
async fn conflicting_primary_is_reported_in_pbft_mode() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = pbft_coordinator(sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    delivery
        .deliver(AuditEvent::PrimaryStatus {
            view: 2,
            primary: "carol".into(),
        })
        .await;
    delivery
        .deliver(AuditEvent::PrimaryStatus {
            view: 2,
            primary: "dave".into(),
        })
        .await;

    assert_eq!(coordinator.error_count().await, 1);
}

#[tokio::test]
async fn pbft_commit_conflict_is_reported() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = pbft_coordinator(sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    delivery
        .deliver(AuditEvent::PbftCommit {
            sequence_number: 4,
            request_hash: "hash-a".into(),
        })
        .await;
    delivery
        .deliver(AuditEvent::PbftCommit {
            sequence_number: 4,
            request_hash: "hash-b".into(),
        })
        .await;

    assert_eq!(coordinator.error_count().await, 1);
}

#[tokio::test]
async fn events_alien_to_the_active_mode_are_dropped() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = raft_coordinator(sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    delivery
        .deliver(AuditEvent::PrimaryStatus {
            view: 1,
            primary: "carol".into(),
        })
        .await;
    delivery.deliver(AuditEvent::FailureDetected).await;

    assert_eq!(coordinator.error_count().await, 0);
    assert_eq!(coordinator.current_memory_size().await, 0);
}

#[tokio::test(start_paused = true)]
async fn no_leader_alive_timeout_reports_and_rearms() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = raft_coordinator(sink.clone());
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    tokio::time::advance(Duration::from_secs(21)).await;
    settle().await;
    assert_eq!(coordinator.error_count().await, 1);

    // The timer re-arms itself: a second period with no leader reports again.
    tokio::time::advance(Duration::from_secs(21)).await;
    settle().await;
    assert_eq!(coordinator.error_count().await, 2);

    let sent = sink.sent.lock().unwrap();
    assert!(sent
        .iter()
        .filter(|(_, line)| line.ends_with("audit.leader.no_leader|c"))
        .count()
        >= 2);
}

#[tokio::test(start_paused = true)]
async fn leader_with_uncommitted_entries_that_never_advances_is_stuck() {
    let sink = Arc::new(RecordingSink::default());
    // Leader-alive timeout set well past the progress timeout so only the
    // progress episode fires within the advanced window.
    let mut config = AuditConfig::new("node-1", Mode::Raft);
    config.monitor_endpoint = Some(monitor_endpoint());
    config.leader_alive_timeout = Duration::from_secs(120);
    let coordinator = AuditCoordinator::new(config, sink.clone());
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    // Leader is alive and has log entries past the commit index — the
    // progress timer arms waiting for `current_commit_index` to catch up.
    // A repeated, identical status is still idle — it must not reset the
    // episode or produce a second error.
    for _ in 0..2 {
        delivery
            .deliver(AuditEvent::LeaderStatus {
                term: 1,
                leader: "alice".into(),
                current_log_index: 8,
                current_commit_index: 6,
            })
            .await;
    }

    tokio::time::advance(Duration::from_secs(21)).await;
    settle().await;

    assert_eq!(coordinator.error_count().await, 1);
    let errors = coordinator.error_strings().await;
    assert!(errors.iter().any(|e| e.contains("not making progress")));
}

#[tokio::test(start_paused = true)]
async fn leader_that_catches_up_does_not_report_stuck() {
    let sink = Arc::new(RecordingSink::default());
    let mut config = AuditConfig::new("node-1", Mode::Raft);
    config.monitor_endpoint = Some(monitor_endpoint());
    config.leader_alive_timeout = Duration::from_secs(120);
    let coordinator = AuditCoordinator::new(config, sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    // Log briefly runs ahead of commit, arming the progress timer, then
    // commit catches up — the timer is cleared before it can expire.
    delivery
        .deliver(AuditEvent::LeaderStatus {
            term: 1,
            leader: "alice".into(),
            current_log_index: 8,
            current_commit_index: 6,
        })
        .await;
    delivery
        .deliver(AuditEvent::LeaderStatus {
            term: 1,
            leader: "alice".into(),
            current_log_index: 8,
            current_commit_index: 8,
        })
        .await;

    tokio::time::advance(Duration::from_secs(21)).await;
    settle().await;

    assert_eq!(coordinator.error_count().await, 0);
}

#[tokio::test]
async fn alternating_leaders_that_never_catch_up_are_tolerated() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = raft_coordinator(sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    // Each term is unique and the leader changes every time, so every
    // event resets the progress watch instead of ever tripping it; commit
    // index advances but never reaches the log index. The audit has no
    // way to tell this apart from ordinary leader churn, so no error is
    // ever recorded — a known gap, not a bug.
    let names = ["fred", "joe"];
    for term in 1..=20u64 {
        delivery
            .deliver(AuditEvent::LeaderStatus {
                term,
                leader: names[(term % 2) as usize].to_string(),
                current_log_index: term + 5,
                current_commit_index: term,
            })
            .await;
    }

    assert_eq!(coordinator.error_count().await, 0);
}

#[tokio::test]
async fn bounded_memory_with_ongoing_conflicts_still_forgets() {
    let sink = Arc::new(RecordingSink::default());
    let mut config = AuditConfig::new("node-1", Mode::Raft);
    config.mem_ceiling = 10;
    let coordinator = AuditCoordinator::new(config, sink);
    let delivery = MockDelivery::default();
    coordinator.start(&delivery);

    for term in 0..100u64 {
        delivery
            .deliver(AuditEvent::LeaderStatus {
                term,
                leader: "fred".into(),
                current_log_index: term,
                current_commit_index: term,
            })
            .await;
        // Conflicting second claim for the same term — one error per term.
        delivery
            .deliver(AuditEvent::LeaderStatus {
                term,
                leader: "joe".into(),
                current_log_index: term,
                current_commit_index: term,
            })
            .await;
        delivery
            .deliver(AuditEvent::RaftCommit {
                log_index: term,
                operation: format!("op-{term}"),
            })
            .await;
    }

    // current_memory_size sums leader + raft-commit + error histories, each
    // independently bounded at mem_ceiling.
    assert!(coordinator.current_memory_size().await <= 3 * 10);
    assert_eq!(coordinator.error_strings().await.len(), 10);
    assert!(coordinator.error_count().await > 10);

    let errors_before = coordinator.error_count().await;
    // Term 99 is still within the trimmed window; a further conflicting
    // claim for it must still be reported, not silently dropped.
    delivery
        .deliver(AuditEvent::LeaderStatus {
            term: 99,
            leader: "newcomer".into(),
            current_log_index: 99,
            current_commit_index: 99,
        })
        .await;
    assert_eq!(coordinator.error_count().await, errors_before + 1);
}
