//! WebSocket test client.
//!
//! Speaks the `{"event", "data"}` envelope and adds timeouts to every
//! receive so a missing event fails the test instead of hanging it.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Default time to wait for an expected event.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Default quiet period for [`TestWsClient::expect_silence`].
pub const SILENCE_WINDOW: Duration = Duration::from_millis(200);

/// A connected WebSocket test client.
pub struct TestWsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    /// Connect and complete the handshake.
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;
        Ok(Self { stream })
    }

    /// Connect with the credential in an `Authorization: Bearer` header.
    pub async fn connect_with_bearer(url: &str, token: &str) -> Result<Self, anyhow::Error> {
        let mut request = url
            .into_client_request()
            .map_err(|e| anyhow::anyhow!("Invalid WebSocket URL: {}", e))?;
        request.headers_mut().insert(
            AUTHORIZATION,
            format!("Bearer {token}")
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid header value: {}", e))?,
        );

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;
        Ok(Self { stream })
    }

    /// Attempt a handshake that the server should refuse.
    ///
    /// Returns the HTTP status of the refusal.
    pub async fn connect_rejected(url: &str) -> Result<u16, anyhow::Error> {
        match tokio_tungstenite::connect_async(url).await {
            Ok(_) => Err(anyhow::anyhow!("handshake unexpectedly succeeded")),
            Err(tungstenite::Error::Http(response)) => Ok(response.status().as_u16()),
            Err(e) => Err(anyhow::anyhow!("unexpected handshake error: {}", e)),
        }
    }

    /// Send `{"event": event, "data": data}`.
    pub async fn send_event(&mut self, event: &str, data: Value) -> Result<(), anyhow::Error> {
        self.send_raw(&json!({ "event": event, "data": data }).to_string())
            .await
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send failed: {}", e))
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), anyhow::Error> {
        self.stream
            .send(Message::Binary(bytes))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send failed: {}", e))
    }

    /// Receive the next event envelope, skipping control frames.
    pub async fn recv_event(&mut self) -> Result<Value, anyhow::Error> {
        self.recv_event_within(RECV_TIMEOUT).await
    }

    async fn recv_event_within(&mut self, wait: Duration) -> Result<Value, anyhow::Error> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for an event"))?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| anyhow::anyhow!("invalid event JSON: {}", e));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(anyhow::anyhow!("connection closed"));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(anyhow::anyhow!("WebSocket read failed: {}", e)),
            }
        }
    }

    /// Receive the next event and assert its name. Returns its `data`.
    pub async fn expect_event(&mut self, name: &str) -> Result<Value, anyhow::Error> {
        let envelope = self.recv_event().await?;
        if envelope["event"] != name {
            return Err(anyhow::anyhow!(
                "expected event {:?}, got {}",
                name,
                envelope
            ));
        }
        Ok(envelope["data"].clone())
    }

    /// Assert that no event arrives within [`SILENCE_WINDOW`].
    pub async fn expect_silence(&mut self) -> Result<(), anyhow::Error> {
        match self.recv_event_within(SILENCE_WINDOW).await {
            Ok(event) => Err(anyhow::anyhow!("expected silence, got {}", event)),
            Err(_) => Ok(()),
        }
    }

    /// Whether the server closed the connection within [`RECV_TIMEOUT`].
    pub async fn wait_closed(&mut self) -> bool {
        matches!(
            self.recv_event_within(RECV_TIMEOUT).await,
            Err(e) if e.to_string() == "connection closed"
                || e.to_string().starts_with("WebSocket read failed")
        )
    }

    /// Close the connection.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
