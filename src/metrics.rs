//! Component A: formats and sends counter lines over an unreliable datagram channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error};

use crate::collab::DatagramSink;

pub const LEADER_NO_LEADER: &str = "audit.leader.no_leader";
pub const LEADER_CONFLICT: &str = "audit.leader.conflict";
pub const LEADER_NEW: &str = "audit.leader.new";
pub const LEADER_STUCK: &str = "audit.leader.stuck";
pub const RAFT_COMMIT: &str = "audit.raft.commit";
pub const RAFT_COMMIT_CONFLICT: &str = "audit.raft.commit_conflict";
pub const PRIMARY_NO_PRIMARY: &str = "audit.primary.no_primary";
pub const PRIMARY_CONFLICT: &str = "audit.primary.conflict";
pub const PRIMARY_HEARD: &str = "audit.primary.heard";
pub const PBFT_COMMIT: &str = "audit.pbft.commit";
pub const PBFT_COMMIT_CONFLICT: &str = "audit.pbft.commit_conflict";
pub const PBFT_FAILURE_DETECTED: &str = "audit.pbft.failure_detected";

const STATSD_COUNTER_SUFFIX: &str = "|c";

/// Formats and fire-and-forget sends counter metrics to an optional monitor.
pub struct MetricEmitter {
    prefix: String,
    endpoint: Option<SocketAddr>,
    sink: Arc<dyn DatagramSink>,
}

impl MetricEmitter {
    pub fn new(uuid: &str, endpoint: Option<SocketAddr>, sink: Arc<dyn DatagramSink>) -> Self {
        Self {
            prefix: format!("com.bluzelle.swarm.singleton.node.{uuid}."),
            endpoint,
            sink,
        }
    }

    /// Sends `"<prefix><suffix>|c"` as a single datagram. No-op if no
    /// monitor endpoint is configured. Never blocks or propagates a send
    /// failure to the caller.
    pub async fn emit(&self, suffix: &str) {
        let Some(target) = self.endpoint else {
            return;
        };

        let line = format!("{}{suffix}{STATSD_COUNTER_SUFFIX}", self.prefix);
        debug!(stat = %line, %target, "sending stat to monitor");

        if let Err(err) = self.sink.send(target, line.as_bytes()).await {
            error!(%err, stat = %line, "UDP send to monitor failed");
        }
    }
}
