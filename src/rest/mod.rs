// rest/mod.rs — Public REST API server.
//
// Axum HTTP server bridging clients to the Issuer/Resolver core.
//
// Endpoints:
//   POST   /api/v1/users                      register
//   POST   /api/v1/sessions                   login
//   DELETE /api/v1/sessions                   logout
//   GET    /api/v1/users/me                   current user
//   POST   /api/v1/claims                     issue + render + attach
//   POST   /api/v1/claims/{id}/image          retry render/attach
//   GET    /api/v1/claims/mine                completed claims, newest first
//   GET    /api/v1/resolve/{payload}          one-shot payload resolution
//   POST   /api/v1/scan/sessions              open scan session
//   POST   /api/v1/scan/sessions/{id}/scan    submit scanned payload
//   POST   /api/v1/scan/sessions/{id}/dismiss re-arm after a result
//   GET    /api/v1/health
//   GET    /objects/{owner}/{file}            stored QR images (public)

pub mod auth;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    // Mobile clients call from app webviews and dev servers; CORS stays open.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        // Identity
        .route("/api/v1/users", post(routes::users::register))
        .route("/api/v1/users/me", get(routes::users::me))
        .route(
            "/api/v1/sessions",
            post(routes::users::login).delete(routes::users::logout),
        )
        // Claims (issuance is authenticated; resolution is not)
        .route("/api/v1/claims", post(routes::claims::create_claim))
        .route("/api/v1/claims/mine", get(routes::claims::list_mine))
        .route(
            "/api/v1/claims/{id}/image",
            post(routes::claims::attach_image),
        )
        // Resolution — cross-user by design, no auth required
        .route("/api/v1/resolve/{payload}", get(routes::scan::resolve))
        .route("/api/v1/scan/sessions", post(routes::scan::open_session))
        .route(
            "/api/v1/scan/sessions/{id}/scan",
            post(routes::scan::submit_scan),
        )
        .route(
            "/api/v1/scan/sessions/{id}/dismiss",
            post(routes::scan::dismiss),
        )
        // Stored objects (QR images) — public by construction of the URL
        .route("/objects/{owner}/{file}", get(routes::objects::serve_object))
        .layer(cors)
        .with_state(ctx)
}
