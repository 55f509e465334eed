//! Error types for the transport layer.

/// Errors that can occur on a transport handle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Establishing a connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
}
