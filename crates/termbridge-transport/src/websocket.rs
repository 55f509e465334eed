//! WebSocket adapter for [`TransportHandle`] using `tokio-tungstenite`.
//!
//! Wraps an already-established WebSocket stream: client-dialed via
//! [`WebSocketHandle::connect`], or server-accepted and handed in through
//! [`WebSocketHandle::new`]. The stream is split so sends and receives
//! never contend on one lock: a reader task can sit in
//! [`TransportHandle::next_event`] while another task sends.

use std::io;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{close_code, CloseFrame, TransportEvent, TransportHandle, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A WebSocket-backed [`TransportHandle`].
pub struct WebSocketHandle {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

impl WebSocketHandle {
    /// Wraps an established WebSocket stream.
    ///
    /// Server-side streams accepted over a plain `TcpStream` can be wrapped
    /// in [`MaybeTlsStream::Plain`] before the WebSocket handshake to
    /// produce the expected stream type.
    pub fn new(ws: WsStream) -> Self {
        let (writer, reader) = ws.split();
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        }
    }

    /// Dials `url` and returns a connected handle.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] if the TCP connection or
    /// WebSocket handshake fails.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| {
                TransportError::ConnectFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(url, "WebSocket connected");
        Ok(Self::new(ws))
    }
}

impl TransportHandle for WebSocketHandle {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let msg = Message::Text(text.to_string().into());
        self.writer.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> Result<(), TransportError> {
        let frame = WsCloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.writer
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| {
                TransportError::SendFailed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        loop {
            let msg = self.reader.lock().await.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Some(TransportEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    // The envelope convention is text; tolerate peers that
                    // send UTF-8 payloads in binary frames.
                    match String::from_utf8(data.into()) {
                        Ok(text) => {
                            return Some(TransportEvent::Message(text));
                        }
                        Err(_) => {
                            tracing::warn!(
                                "dropping non-UTF-8 binary frame"
                            );
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let close = match frame {
                        Some(f) => CloseFrame::new(
                            u16::from(f.code),
                            f.reason.as_str(),
                        ),
                        // No close frame means nobody said goodbye.
                        None => CloseFrame::new(close_code::ABNORMAL, ""),
                    };
                    return Some(TransportEvent::Close(close));
                }
                // Protocol-level ping/pong/fragments are handled by
                // tungstenite; the envelope's own ping/pong travel as text.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Some(TransportEvent::Error(
                        TransportError::ReceiveFailed(io::Error::new(
                            io::ErrorKind::ConnectionReset,
                            e,
                        )),
                    ));
                }
                None => return None,
            }
        }
    }
}
