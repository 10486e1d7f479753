//! Injectable collaborators: message delivery and the monitor datagram sink.
//!
//! Both traits are fixed external interfaces per the audit's scope — the
//! audit never owns peer discovery or the node's transport, it only
//! registers one callback and sends fire-and-forget datagrams.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

/// A decoded request handed to the audit's registered callback.
pub struct InboundMessage {
    pub body: Vec<u8>,
    pub session: Box<dyn Session>,
}

/// A session handle associated with one inbound message.
///
/// Mirrors the host's request/session lifecycle: after dispatch, the audit
/// closes the session whether or not decoding succeeded.
pub trait Session: Send {
    fn close(&mut self);
}

/// Registers callbacks for named message kinds and delivers decoded bodies.
///
/// The audit only ever registers for the `"audit"` kind; the collaborator is
/// shared with the rest of the host process.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    fn register_for_message(
        &self,
        kind: &str,
        handler: Arc<dyn Fn(InboundMessage) + Send + Sync>,
    );
}

/// An unreliable datagram sink used to emit counter metrics.
///
/// Sends are fire-and-forget: a failure must not propagate past the caller.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send(&self, target: SocketAddr, payload: &[u8]) -> std::io::Result<usize>;
}

/// A `DatagramSink` backed by a real `tokio::net::UdpSocket`.
pub struct UdpDatagramSink {
    socket: tokio::net::UdpSocket,
}

impl UdpDatagramSink {
    pub async fn bind_ephemeral() -> std::io::Result<Self> {
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl DatagramSink for UdpDatagramSink {
    async fn send(&self, target: SocketAddr, payload: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(payload, target).await
    }
}
