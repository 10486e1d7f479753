//! Consensus safety/liveness audit for a Byzantine-tolerant key-value node.
//!
//! Shadow-observes a node's Raft or PBFT traffic and raises statsd-style
//! counters and a bounded, queryable error log when the consensus protocol
//! exhibits symptoms a healthy cluster shouldn't: no elected leader/primary,
//! a leader that stops making commit progress, or two peers disagreeing
//! about what a given term/view/index/sequence committed.
//!
//! The audit never participates in consensus itself — it only watches.

pub mod collab;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod history;
pub mod metrics;
pub mod pbft;
pub mod raft;
pub mod state;
pub mod timers;

pub use collab::{DatagramSink, InboundMessage, MessageDelivery, Session, UdpDatagramSink};
pub use config::{AuditConfig, Mode};
pub use coordinator::AuditCoordinator;
pub use error::{AuditError, Result};
pub use events::AuditEvent;
