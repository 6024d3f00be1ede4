use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// What a link points at: a redirect target or a stored image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Url,
    Image,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Url => "url",
            LinkKind::Image => "image",
        }
    }
}

#[derive(Debug, Error)]
#[error("unrecognized link kind: {0}")]
pub struct UnknownLinkKind(String);

impl TryFrom<String> for LinkKind {
    type Error = UnknownLinkKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "url" => Ok(LinkKind::Url),
            "image" => Ok(LinkKind::Image),
            _ => Err(UnknownLinkKind(value)),
        }
    }
}

/// A persisted short link. `code` is the public share code, `track_code` the
/// owner-facing code for viewing visits. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub code: String,
    pub track_code: String,
    #[sqlx(try_from = "String")]
    pub kind: LinkKind,
    pub target: String,
    pub created_at: i64,
}

/// One resolution of a share code by a visitor. Append-only.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Visit {
    pub id: i64,
    pub link_id: i64,
    pub ip: String,
    pub user_agent: Option<String>,
    pub accept_lang: Option<String>,
    /// Unix seconds, set at record time.
    pub visited_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_kind_round_trip() {
        assert_eq!(LinkKind::try_from("url".to_string()).unwrap(), LinkKind::Url);
        assert_eq!(
            LinkKind::try_from("image".to_string()).unwrap(),
            LinkKind::Image
        );
        assert_eq!(LinkKind::Url.as_str(), "url");
        assert_eq!(LinkKind::Image.as_str(), "image");
    }

    #[test]
    fn test_link_kind_rejects_unknown() {
        assert!(LinkKind::try_from("gif".to_string()).is_err());
    }
}
