//! Exposes an in-process test server for use in integration tests.
//!
//! ```
//! use querysim_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/health");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};

use querysim_server::config::{Config, SchedulerMode};
use querysim_server::state::State;
use querysim_server::web::App;

/// An in-process test server for use in integration tests.
///
/// The server runs the full HTTP API and listens on a random available port on localhost. It is
/// stopped when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl TestServer {
    /// Starts a server with the default configuration.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Starts a server with the default configuration and the given scheduling backend.
    pub async fn with_mode(mode: SchedulerMode) -> Self {
        let mut config = Config::default();
        config.scheduler.mode = mode;
        Self::with_config(config).await
    }

    /// Starts a server with the given configuration.
    ///
    /// The configured `http_addr` is ignored.
    pub async fn with_config(config: Config) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let state = State::new(config).unwrap();
        let app = App::new(state);

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            app.serve(listener).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
