//! Integration tests for the WebSocket adapter.
//!
//! These spin up a real WebSocket server and client on a loopback socket to
//! verify that frames, close codes, and stream ends actually survive the
//! trip over the network, not just the type conversions.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use termbridge_transport::{
        close_code, TransportEvent, TransportHandle, WebSocketHandle,
    };
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type ServerWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Binds a loopback listener and returns its address plus a task that
    /// accepts exactly one WebSocket connection.
    async fn one_shot_server() -> (String, tokio::task::JoinHandle<ServerWs>)
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have addr");

        let server = tokio::spawn(async move {
            let (stream, _) =
                listener.accept().await.expect("should accept");
            tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream))
                .await
                .expect("should upgrade")
        });

        (format!("ws://{addr}"), server)
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_text() {
        let (url, server) = one_shot_server().await;

        let handle =
            WebSocketHandle::connect(&url).await.expect("should connect");
        let mut server_ws = server.await.expect("server task");

        // Client → server.
        handle.send("hello from client").await.expect("send");
        let msg = server_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "hello from client");

        // Server → client.
        server_ws
            .send(Message::Text("hello from server".to_string().into()))
            .await
            .unwrap();
        match handle.next_event().await {
            Some(TransportEvent::Message(text)) => {
                assert_eq!(text, "hello from server");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_websocket_close_frame_surfaces_code_and_reason() {
        let (url, server) = one_shot_server().await;

        let handle =
            WebSocketHandle::connect(&url).await.expect("should connect");
        let mut server_ws = server.await.expect("server task");

        server_ws
            .send(Message::Close(Some(WsCloseFrame {
                code: CloseCode::from(4001),
                reason: "resetting".to_string().into(),
            })))
            .await
            .unwrap();

        match handle.next_event().await {
            Some(TransportEvent::Close(frame)) => {
                assert_eq!(frame.code, 4001);
                assert_eq!(frame.reason, "resetting");
                assert!(!frame.is_normal());
            }
            other => panic!("expected Close, got {other:?}"),
        }

        // The stream is exhausted after the close has been delivered.
        assert!(handle.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_websocket_close_reaches_peer_with_normal_code() {
        let (url, server) = one_shot_server().await;

        let handle =
            WebSocketHandle::connect(&url).await.expect("should connect");
        let mut server_ws = server.await.expect("server task");

        handle
            .close(close_code::NORMAL, "done")
            .await
            .expect("close");

        match server_ws.next().await.unwrap().unwrap() {
            Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), close_code::NORMAL);
                assert_eq!(frame.reason.as_str(), "done");
            }
            other => panic!("expected Close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_websocket_binary_utf8_is_delivered_as_text() {
        let (url, server) = one_shot_server().await;

        let handle =
            WebSocketHandle::connect(&url).await.expect("should connect");
        let mut server_ws = server.await.expect("server task");

        server_ws
            .send(Message::Binary(b"{\"type\":\"output\"}".to_vec().into()))
            .await
            .unwrap();

        match handle.next_event().await {
            Some(TransportEvent::Message(text)) => {
                assert_eq!(text, "{\"type\":\"output\"}");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }
}
