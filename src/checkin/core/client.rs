//! Transport contract used by site plugins.
//!
//! Plugins never touch `reqwest` directly; they talk to a [`SiteHttpClient`]
//! owned by their session. The session closes it exactly once when the run
//! ends, after which every call fails with [`SiteHttpError::Closed`].

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use thiserror::Error;
use url::Url;

/// Contract that abstracts the HTTP context of one site session.
///
/// Implementations must keep cookies between calls so the session behaves
/// like a single browser, and must apply the configured timeout to every
/// request.
#[async_trait]
pub trait SiteHttpClient: Send + Sync {
    async fn get(&self, url: &Url) -> Result<SiteHttpResponse, SiteHttpError>;

    async fn post_form(
        &self,
        url: &Url,
        form_fields: &[(String, String)],
    ) -> Result<SiteHttpResponse, SiteHttpError>;

    /// Release the underlying network resources.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Minimal response representation returned by the transport abstraction.
#[derive(Debug, Clone)]
pub struct SiteHttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

impl SiteHttpResponse {
    pub fn new(status: u16, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum SiteHttpError {
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("http client could not be built: {0}")]
    Build(String),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("session is closed")]
    Closed,
}
