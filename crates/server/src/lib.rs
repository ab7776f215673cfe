//! HTTP server for the svgmoji conversion service.
//!
//! Exposed as a library so integration tests can build the router
//! in-process; the `svgmoji` binary lives in `main.rs`.

pub mod api;
pub mod cleanup;
pub mod metrics;
pub mod state;
