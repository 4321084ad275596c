//! HTTP surface of the HCT survival prediction service
//!
//! Routes:
//! - `GET /`: service metadata
//! - `GET /health`: liveness and model status
//! - `POST /predict`: intake form → prediction
//! - `GET /metrics`: Prometheus exposition, when a recorder is installed

pub mod server;

pub use server::{build_router, start_server, AppState};
