//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: process-wide queue and store handles
//! - `routes/`: HTTP routes, each a thin adapter over `crate::functions`
//! - `response.rs`: mapping of handler envelopes onto HTTP responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};

pub mod response;
pub mod routes;
pub mod services;

pub use services::{AppServices, ServicesError};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/todos", post(routes::todos::submit).get(routes::todos::list))
        .route("/todos/direct", post(routes::todos::create_direct))
        .route("/admin/redrive", post(routes::admin::redrive))
        .layer(Extension(services))
}
