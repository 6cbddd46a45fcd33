use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::endpoints;
use crate::state::ServiceState;
use crate::web::middleware as m;

/// The querysim web server application.
#[derive(Debug)]
pub struct App {
    router: axum::Router,
    state: ServiceState,
    graceful_shutdown: bool,
}

impl App {
    /// Creates a new application router for the given service state.
    ///
    /// The applications sets up middlewares and routes for the querysim web API. Use
    /// [`serve`](Self::serve) to run the server future.
    pub fn new(state: ServiceState) -> Self {
        // Build the router middleware into a single service which runs _after_ routing. Service
        // builder order defines layers added first will be called first. This means:
        //  - Requests go from top to bottom
        //  - Responses go from bottom to top
        let middleware = ServiceBuilder::new()
            .layer(axum::middleware::from_fn(m::log_requests))
            .layer(CatchPanicLayer::custom(m::handle_panic))
            .layer(m::set_server_header())
            .layer(m::set_scheduler_header(state.scheduler.mode()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(m::make_http_span)
                    .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
            );

        let router = endpoints::routes()
            .layer(middleware)
            .with_state(state.clone());

        App {
            router,
            state,
            graceful_shutdown: false,
        }
    }

    /// Enables or disables graceful shutdown for the server.
    ///
    /// When enabled, the server stops accepting connections once shutdown is requested and
    /// cancels all in-flight simulated queries. By default, graceful shutdown is disabled.
    pub fn graceful_shutdown(mut self, enable: bool) -> Self {
        self.graceful_shutdown = enable;
        self
    }

    /// Runs the web server until graceful shutdown is triggered.
    ///
    /// This function creates a future that runs the server. The future must be spawned or awaited for
    /// the server to continue running.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let Self {
            router,
            state,
            graceful_shutdown,
        } = self;

        let service = router.into_make_service_with_connect_info::<SocketAddr>();

        if graceful_shutdown {
            let guard = elegant_departure::get_shutdown_guard();
            let shutdown_requested = guard.wait_owned();
            axum::serve(listener, service)
                .with_graceful_shutdown(async move {
                    shutdown_requested.await;
                    tracing::info!("Shutting down, cancelling in-flight queries");
                    state.shutdown();
                })
                .await?;
        } else {
            axum::serve(listener, service).await?;
        }

        Ok(())
    }
}
