//! Link creation, resolution, and tracking queries on top of [`Storage`].

use std::sync::Arc;

use anyhow::anyhow;
use thiserror::Error;
use tracing::warn;

use crate::codegen::generate_code;
use crate::models::{Link, LinkKind, Visit};
use crate::storage::{Storage, StorageError};

/// Attempts at drawing a non-colliding code pair before giving up.
const MAX_CODE_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// What the caller should do with a resolved link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Issue an HTTP redirect to the target URL.
    Redirect(String),
    /// Stream the named file from upload storage.
    ServeFile(String),
}

/// Visitor metadata captured on resolution.
#[derive(Debug, Clone)]
pub struct VisitorInfo {
    pub ip: String,
    pub user_agent: Option<String>,
    pub accept_lang: Option<String>,
}

#[derive(Clone)]
pub struct LinkService {
    storage: Arc<dyn Storage>,
}

impl LinkService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Create a link from a raw URL and/or a stored upload filename.
    ///
    /// An uploaded file takes precedence. A bare URL must be a well-formed
    /// absolute URL (scheme + host) after trimming. Neither input is a
    /// validation error.
    pub async fn create_link(
        &self,
        url: Option<String>,
        stored_file: Option<String>,
    ) -> Result<Link, ServiceError> {
        let (kind, target) = if let Some(filename) = stored_file {
            (LinkKind::Image, filename)
        } else if let Some(raw) = url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let parsed = url::Url::parse(raw)
                .map_err(|_| ServiceError::Validation("Invalid URL format".to_string()))?;
            if !parsed.has_host() {
                return Err(ServiceError::Validation("Invalid URL format".to_string()));
            }
            (LinkKind::Url, raw.to_string())
        } else {
            return Err(ServiceError::Validation(
                "Provide a URL or upload an image".to_string(),
            ));
        };

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code();
            let track_code = generate_code();
            if code == track_code {
                continue;
            }

            match self
                .storage
                .insert_link(&code, &track_code, kind, &target)
                .await
            {
                Ok(link) => return Ok(link),
                Err(StorageError::Conflict) => continue,
                Err(StorageError::Other(e)) => return Err(ServiceError::Storage(e)),
            }
        }

        Err(ServiceError::Storage(anyhow!(
            "could not allocate a unique code pair after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    /// Resolve a share code to a dispatch directive, logging the visit.
    ///
    /// The visit write is fire-and-forget: it runs on a detached task so it
    /// completes even if the visitor disconnects, and its failure is logged
    /// but never surfaces to the visitor-facing response.
    pub async fn resolve(
        &self,
        code: &str,
        visitor: VisitorInfo,
    ) -> Result<Resolution, ServiceError> {
        let link = self
            .storage
            .find_by_code(code)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let storage = Arc::clone(&self.storage);
        let link_id = link.id;
        let link_code = link.code.clone();
        tokio::spawn(async move {
            if let Err(err) = storage
                .record_visit(
                    link_id,
                    &visitor.ip,
                    visitor.user_agent.as_deref(),
                    visitor.accept_lang.as_deref(),
                )
                .await
            {
                warn!(code = %link_code, error = %err, "failed to record visit");
            }
        });

        Ok(match link.kind {
            LinkKind::Url => Resolution::Redirect(link.target),
            LinkKind::Image => Resolution::ServeFile(link.target),
        })
    }

    /// Visits for the link owning `track_code`, most recent first.
    pub async fn tracking_data(&self, track_code: &str) -> Result<Vec<Visit>, ServiceError> {
        let link = self
            .storage
            .find_by_track_code(track_code)
            .await?
            .ok_or(ServiceError::NotFound)?;

        Ok(self.storage.visits_for_link(link.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteStorage, Storage as _};

    async fn service() -> LinkService {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        LinkService::new(Arc::new(storage))
    }

    fn visitor() -> VisitorInfo {
        VisitorInfo {
            ip: "203.0.113.7".to_string(),
            user_agent: Some("test-agent".to_string()),
            accept_lang: None,
        }
    }

    #[tokio::test]
    async fn test_create_link_valid_url() {
        let service = service().await;
        let link = service
            .create_link(Some("https://example.com/page".to_string()), None)
            .await
            .unwrap();

        assert_eq!(link.kind, LinkKind::Url);
        assert_eq!(link.target, "https://example.com/page");
        assert_eq!(link.code.len(), 6);
        assert_eq!(link.track_code.len(), 6);
        assert_ne!(link.code, link.track_code);
    }

    #[tokio::test]
    async fn test_create_link_trims_url() {
        let service = service().await;
        let link = service
            .create_link(Some("  https://example.org  ".to_string()), None)
            .await
            .unwrap();
        assert_eq!(link.target, "https://example.org");
    }

    #[tokio::test]
    async fn test_create_link_rejects_malformed_url() {
        let service = service().await;
        let err = service
            .create_link(Some("not a url".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_link_rejects_hostless_url() {
        let service = service().await;
        let err = service
            .create_link(Some("mailto:someone@example.com".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_link_requires_input() {
        let service = service().await;
        let err = service.create_link(None, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = service
            .create_link(Some("   ".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_takes_precedence() {
        let service = service().await;
        let link = service
            .create_link(
                Some("https://example.com".to_string()),
                Some("1700000000000.png".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(link.kind, LinkKind::Image);
        assert_eq!(link.target, "1700000000000.png");
    }

    #[tokio::test]
    async fn test_resolve_unknown_code() {
        let service = service().await;
        let err = service.resolve("abc123", visitor()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn test_resolve_records_visit_and_redirects() {
        let service = service().await;
        let link = service
            .create_link(Some("https://example.org".to_string()), None)
            .await
            .unwrap();

        let resolution = service.resolve(&link.code, visitor()).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Redirect("https://example.org".to_string())
        );

        // The visit write is detached; poll until it lands.
        let mut visits = Vec::new();
        for _ in 0..50 {
            visits = service.tracking_data(&link.track_code).await.unwrap();
            if !visits.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].ip, "203.0.113.7");
        assert_eq!(visits[0].user_agent.as_deref(), Some("test-agent"));
        assert_eq!(visits[0].accept_lang, None);
    }

    #[tokio::test]
    async fn test_resolve_image_serves_file() {
        let service = service().await;
        let link = service
            .create_link(None, Some("1700000000000.jpg".to_string()))
            .await
            .unwrap();

        let resolution = service.resolve(&link.code, visitor()).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::ServeFile("1700000000000.jpg".to_string())
        );
    }

    #[tokio::test]
    async fn test_tracking_unknown_code() {
        let service = service().await;
        let err = service.tracking_data("ffffff").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
