//! Test server harness for E2E testing
//!
//! Provides `TestSignalingServer` for spawning real signaling server
//! instances in tests.

use crate::fixtures::test_vars;
use axum::Router;
use signaling_server::actors::{ActorMetrics, RoomRegistryHandle};
use signaling_server::config::Config;
use signaling_server::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the signaling server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_handshake_e2e() -> anyhow::Result<()> {
///     let server = TestSignalingServer::spawn().await?;
///     let status = TestWsClient::connect_rejected(&server.ws_url()).await?;
///     assert_eq!(status, 401);
///     Ok(())
/// }
/// ```
pub struct TestSignalingServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    config: Config,
    handle: JoinHandle<()>,
}

impl TestSignalingServer {
    /// Spawn a server with the default test configuration.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::new()).await
    }

    /// Spawn a server with extra environment variables layered over the
    /// test defaults.
    pub async fn spawn_with_vars(
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = test_vars();
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(
            AppState::new(&config, ActorMetrics::new())
                .map_err(|e| anyhow::anyhow!("Failed to create app state: {}", e))?,
        );

        let app = routes::build_routes(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let shutdown = state.shutdown.child_token();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = server.await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            config,
            handle,
        })
    }

    /// Get the server's socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base HTTP URL, e.g. `http://127.0.0.1:12345`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL without a credential.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// WebSocket URL carrying `token` as a query parameter.
    pub fn ws_url_with_token(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// Shared application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Handle to the server's room registry.
    pub fn registry(&self) -> &RoomRegistryHandle {
        &self.state.registry
    }

    /// Configuration the server was started with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A router over the same state, for `tower::ServiceExt::oneshot` tests.
    pub fn router(&self) -> Router {
        routes::build_routes(Arc::clone(&self.state))
    }

    /// Poll registry statistics until `expected` rooms are active.
    ///
    /// `leave-room` and disconnects get no reply over the socket, so a test
    /// cannot tell when the server has read them; it waits for the count
    /// instead of reading it once.
    pub async fn wait_for_active_rooms(&self, expected: usize) -> Result<(), anyhow::Error> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let stats = self
                .state
                .registry
                .stats()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read registry stats: {}", e))?;
            if stats.active_rooms == expected {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "expected {} active rooms, registry reports {}",
                    expected,
                    stats.active_rooms
                ));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Close every room and stop the server.
    pub async fn shutdown(self) {
        let _ = self.state.registry.shutdown().await;
        self.state.shutdown.cancel();
    }
}

impl Drop for TestSignalingServer {
    fn drop(&mut self) {
        self.state.registry.cancel();
        self.state.shutdown.cancel();
        self.handle.abort();
    }
}
