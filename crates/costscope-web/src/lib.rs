//! Costscope Web - HTTP interface
//!
//! This crate provides the REST API:
//! - CSV export upload
//! - Cost analysis, projections and growth trends
//! - Health check

pub mod api;

pub use api::{create_api_router, create_router, AppState};
