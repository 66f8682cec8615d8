//! HTTP API module.
//!
//! Router, response types and the SSE ingestion log.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
