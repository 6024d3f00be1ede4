use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

use super::client_ip::client_ip;
use super::static_files::serve_landing;
use super::views::render_track_page;
use super::AppState;
use crate::models::LinkKind;
use crate::service::{Resolution, ServiceError, VisitorInfo};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct CreateLinkResponse {
    pub code: String,
    pub track_code: String,
    pub kind: LinkKind,
    pub share_url: String,
    pub track_url: String,
}

/// Landing page with the link-creation form
pub async fn landing_page(State(state): State<Arc<AppState>>) -> Response {
    serve_landing(state.static_dir.as_deref()).await
}

/// Create a new tracking link from a URL or an uploaded image
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateLinkResponse>), (StatusCode, Json<ErrorResponse>)> {
    let mut url: Option<String> = None;
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid form data: {e}"),
            }),
        )
    })? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("url") => {
                url = Some(field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorResponse {
                            error: format!("Invalid form data: {e}"),
                        }),
                    )
                })?);
            }
            Some("image") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorResponse {
                            error: format!("Invalid form data: {e}"),
                        }),
                    )
                })?;
                if !data.is_empty() {
                    upload = Some((original_name, data));
                }
            }
            _ => {}
        }
    }

    let stored_file = match upload {
        Some((original_name, data)) => {
            Some(state.uploads.save(&original_name, &data).await.map_err(|e| {
                error!(error = %e, "failed to store upload");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Error storing uploaded image".to_string(),
                    }),
                )
            })?)
        }
        None => None,
    };

    match state.service.create_link(url, stored_file).await {
        Ok(link) => Ok((
            StatusCode::CREATED,
            Json(CreateLinkResponse {
                share_url: format!("{}/{}", state.base_url, link.code),
                track_url: format!("{}/track/{}", state.base_url, link.track_code),
                code: link.code,
                track_code: link.track_code,
                kind: link.kind,
            }),
        )),
        Err(ServiceError::Validation(msg)) => {
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg })))
        }
        Err(err) => {
            error!(error = %err, "failed to create link");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Error creating tracking link".to_string(),
                }),
            ))
        }
    }
}

/// Resolve a share code: redirect for `url` links, stream the stored file for
/// `image` links, and log the visit either way.
pub async fn resolve_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let visitor = VisitorInfo {
        ip: client_ip(&headers, addr.ip()),
        user_agent: header_value(&headers, header::USER_AGENT),
        accept_lang: header_value(&headers, header::ACCEPT_LANGUAGE),
    };

    match state.service.resolve(&code, visitor).await {
        Ok(Resolution::Redirect(target)) => Redirect::temporary(&target).into_response(),
        Ok(Resolution::ServeFile(name)) => match state.uploads.read(&name).await {
            Ok(Some(bytes)) => {
                let mime = mime_guess::from_path(&name).first_or_octet_stream();
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, mime.as_ref())
                    .body(Body::from(bytes))
                    .unwrap()
            }
            Ok(None) => (StatusCode::NOT_FOUND, "Image not found").into_response(),
            Err(err) => {
                error!(code = %code, error = %err, "failed to read stored image");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
            }
        },
        Err(ServiceError::NotFound) => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            error!(code = %code, error = %err, "link lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}

/// Render the visit history for a track code
pub async fn tracking_page(
    State(state): State<Arc<AppState>>,
    Path(track): Path<String>,
) -> Response {
    match state.service.tracking_data(&track).await {
        Ok(visits) => Html(render_track_page(&visits)).into_response(),
        Err(ServiceError::NotFound) => (StatusCode::NOT_FOUND, "Tracker not found").into_response(),
        Err(err) => {
            error!(track_code = %track, error = %err, "tracking lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error loading statistics").into_response()
        }
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
