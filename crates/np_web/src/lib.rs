use axum::{
    routing::{get, post},
    Router,
};
use np_core::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod admin;
pub mod cache;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;
pub mod views;

pub use state::{AppState, WebConfig};

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/home", get(handlers::home))
        .route("/api/sections/:slug", get(handlers::section))
        .route("/api/posts/:id", get(handlers::get_post))
        .route("/api/comments", get(handlers::list_comments).post(handlers::create_comment))
        .route("/api/ads", get(handlers::list_ads))
        .route("/api/subscribers", post(handlers::subscribe))
        .route(
            "/api/admin/posts",
            get(admin::list_posts)
                .post(admin::create_post)
                .put(admin::update_post)
                .delete(admin::delete_post),
        )
        .route(
            "/api/admin/ads",
            get(admin::list_ads)
                .post(admin::create_ad)
                .put(admin::update_ad)
                .delete(admin::delete_ad),
        )
        .route("/api/admin/subscribers", get(admin::list_subscribers))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
