pub mod client_ip;
pub mod handlers;
pub mod static_files;
pub mod uploads;
pub mod views;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::LinkService;
use self::uploads::UploadStore;

pub struct AppState {
    pub service: LinkService,
    pub uploads: UploadStore,
    pub base_url: String,
    pub static_dir: Option<String>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::landing_page))
        .route("/create", post(handlers::create_link))
        .route("/track/{track}", get(handlers::tracking_page))
        .route("/{code}", get(handlers::resolve_link))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
