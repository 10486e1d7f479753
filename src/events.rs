//! Component D: inbound envelope decoding and event routing.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// The JSON envelope delivered for message kind `"audit"`:
/// `{"audit-data": "<base64>"}`.
#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "audit-data")]
    pub audit_data: String,
}

/// Exactly one of the five consensus-lifecycle notifications, decoded from
/// the envelope's base64 payload using `bincode` over `serde`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AuditEvent {
    RaftCommit {
        log_index: u64,
        operation: String,
    },
    LeaderStatus {
        term: u64,
        leader: String,
        current_log_index: u64,
        current_commit_index: u64,
    },
    PbftCommit {
        sequence_number: u64,
        request_hash: String,
    },
    PrimaryStatus {
        view: u64,
        primary: String,
    },
    FailureDetected,
}

/// Decodes an `InboundEnvelope`'s base64 body into an `AuditEvent`.
pub fn decode_event(envelope: &InboundEnvelope) -> Result<AuditEvent> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(&envelope.audit_data)?;
    let event: AuditEvent = bincode::deserialize(&bytes)?;
    Ok(event)
}

/// Decodes the outer JSON envelope itself.
pub fn decode_envelope(body: &[u8]) -> Result<InboundEnvelope> {
    serde_json::from_slice(body)
        .map_err(|e| AuditError::MalformedEnvelope(e.to_string()))
}
