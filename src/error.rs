//! Error types for the consensus audit.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to bind monitor socket: {0}")]
    SocketBind(#[from] std::io::Error),

    #[error("malformed inbound envelope: {0}")]
    MalformedEnvelope(String),

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("event payload decode failed: {0}")]
    Decode(#[from] Box<bincode::ErrorKind>),
}
