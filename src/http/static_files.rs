use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use mime_guess::from_path;
use rust_embed::RustEmbed;
use std::path::PathBuf;

#[derive(RustEmbed)]
#[folder = "static"]
pub struct Assets;

/// Serve the landing page from the configured directory, falling back to the
/// embedded asset.
pub async fn serve_landing(static_dir: Option<&str>) -> Response {
    if let Some(dir) = static_dir {
        let file_path = PathBuf::from(dir).join("index.html");
        if let Ok(content) = tokio::fs::read(&file_path).await {
            let mime_type = from_path(&file_path).first_or_octet_stream();
            return Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime_type.as_ref())
                .body(Body::from(content))
                .unwrap();
        }
    }

    match Assets::get("index.html") {
        Some(content) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from(content.data))
            .unwrap(),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("404 Not Found"))
            .unwrap(),
    }
}
