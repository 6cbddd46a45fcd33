//! Module implementing the querysim API webserver.
//!
//! The main server application is implemented in the [`App`] struct, which sets up routing,
//! middleware, and the HTTP server. It is a tower service that can be run using any compatible
//! server framework.
//!
//! To listen to incoming connections, use the [`server()`] function, which opens a TCP listener and
//! serves the application until the process receives a termination signal.
//!
//! # Testing
//!
//! For end-to-end tests of the server, see the `querysim-test` crate, which provides utilities
//! to start a test server on a random port.

mod app;
mod middleware;
mod server;

pub use app::App;
pub use server::server;
