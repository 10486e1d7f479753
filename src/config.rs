//! Configuration surface read by the audit's parent at startup.
//!
//! Reading this from a file or the command line is out of scope for the
//! audit itself; the host process owns that and hands the audit a finished
//! `AuditConfig`.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MEM_CEILING: usize = 10_000;
const DEFAULT_TIMER_SECS: u64 = 20;

/// Consensus protocol this node's audit is shadowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Raft,
    Pbft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Opaque node identity; forms a prefix in every emitted metric name.
    pub uuid: String,

    /// Ceiling applied independently to each of the four histories and to
    /// the error sequence.
    #[serde(default = "default_mem_ceiling")]
    pub mem_ceiling: usize,

    pub mode: Mode,

    /// Where to send statsd-style counter lines. `None` disables emission.
    #[serde(default)]
    pub monitor_endpoint: Option<SocketAddr>,

    #[serde(default = "default_timer", with = "duration_secs")]
    pub leader_alive_timeout: Duration,

    #[serde(default = "default_timer", with = "duration_secs")]
    pub primary_alive_timeout: Duration,

    #[serde(default = "default_timer", with = "duration_secs")]
    pub leader_progress_timeout: Duration,
}

impl AuditConfig {
    pub fn new(uuid: impl Into<String>, mode: Mode) -> Self {
        Self {
            uuid: uuid.into(),
            mem_ceiling: DEFAULT_MEM_CEILING,
            mode,
            monitor_endpoint: None,
            leader_alive_timeout: Duration::from_secs(DEFAULT_TIMER_SECS),
            primary_alive_timeout: Duration::from_secs(DEFAULT_TIMER_SECS),
            leader_progress_timeout: Duration::from_secs(DEFAULT_TIMER_SECS),
        }
    }
}

fn default_mem_ceiling() -> usize {
    DEFAULT_MEM_CEILING
}

fn default_timer() -> Duration {
    Duration::from_secs(DEFAULT_TIMER_SECS)
}

mod duration_secs {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
