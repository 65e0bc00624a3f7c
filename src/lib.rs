//! # Wedding-Services Marketplace Backend
//!
//! REST + WebSocket service behind the marketplace frontend: customers
//! browse venues, caterers and decorators, book them through an external
//! payment gateway, and chat with the vendors; vendors answer from the same
//! chat log. Booking and chat state live in MongoDB; real-time delivery is
//! an advisory fan-out on top.
//!
//! The library exposes the router via [`create_app`] so integration tests
//! can drive an in-process server without `cargo run` in another terminal.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notifier;
pub mod payments;
pub mod routes;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full router with middleware.
///
/// The caller provides initialized state; this does not connect to anything.
pub fn create_app(state: Arc<AppState>) -> Router {
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .expect("CORS_ORIGIN is not a valid header value");
    // Credentialed CORS: the session cookie must survive cross-origin calls
    // from the frontend, so the origin is pinned rather than permissive.
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .merge(routes::payments::router())
        .merge(routes::chat::router())
        .merge(routes::users::router())
        // Static prefixes win over catalog's dynamic `/{category}` segment.
        .merge(routes::catalog::router())
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
