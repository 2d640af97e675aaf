//! Reqwest-based implementation of the `SiteHttpClient` trait.
//!
//! Provides a thin adapter around `reqwest::Client` that converts between the
//! shared response representation used by the plugins and the concrete
//! transport, and that can be closed explicitly when a session ends.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use reqwest::Client;
use reqwest::cookie::Jar;
use url::Url;

use super::{SiteHttpClient, SiteHttpError, SiteHttpResponse};

/// Reqwest-backed HTTP context for one site session.
pub struct ReqwestSiteClient {
    client: Mutex<Option<Client>>,
}

impl ReqwestSiteClient {
    /// Build a client with a cookie store, the given default headers and a
    /// total timeout applied to every request. `cookies` are preloaded for
    /// `cookie_url`.
    pub fn new(
        headers: HeaderMap,
        timeout: Duration,
        cookies: &[(String, String)],
        cookie_url: &Url,
    ) -> Result<Self, SiteHttpError> {
        let jar = Jar::default();
        for (name, value) in cookies {
            jar.add_cookie_str(&format!("{name}={value}; Path=/"), cookie_url);
        }

        let client = Client::builder()
            .cookie_provider(Arc::new(jar))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SiteHttpError::Build(err.to_string()))?;

        Ok(Self::from_client(client))
    }

    /// Wrap an existing reqwest client. The caller is responsible for its
    /// timeout and cookie configuration.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Mutex::new(Some(client)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current(&self) -> Result<Client, SiteHttpError> {
        self.slot().clone().ok_or(SiteHttpError::Closed)
    }
}

#[async_trait]
impl SiteHttpClient for ReqwestSiteClient {
    async fn get(&self, url: &Url) -> Result<SiteHttpResponse, SiteHttpError> {
        let client = self.current()?;
        let response = client
            .get(url.as_str())
            .send()
            .await
            .map_err(|err| SiteHttpError::Transport(err.to_string()))?;

        to_site_response(response).await
    }

    async fn post_form(
        &self,
        url: &Url,
        form_fields: &[(String, String)],
    ) -> Result<SiteHttpResponse, SiteHttpError> {
        let client = self.current()?;
        let response = client
            .post(url.as_str())
            .form(form_fields)
            .send()
            .await
            .map_err(|err| SiteHttpError::Transport(err.to_string()))?;

        to_site_response(response).await
    }

    fn close(&self) {
        self.slot().take();
    }

    fn is_closed(&self) -> bool {
        self.slot().is_none()
    }
}

async fn to_site_response(response: reqwest::Response) -> Result<SiteHttpResponse, SiteHttpError> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let url = response.url().clone();
    let body = response
        .bytes()
        .await
        .map_err(|err| SiteHttpError::Transport(err.to_string()))?;

    Ok(SiteHttpResponse {
        status,
        headers,
        body,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_client_rejects_requests() {
        let url = Url::parse("https://example.com/").unwrap();
        let client = ReqwestSiteClient::new(
            HeaderMap::new(),
            Duration::from_secs(5),
            &[("A2".into(), "secret".into())],
            &url,
        )
        .unwrap();

        assert!(!client.is_closed());
        client.close();
        assert!(client.is_closed());
        assert!(matches!(client.get(&url).await, Err(SiteHttpError::Closed)));
        assert!(matches!(
            client.post_form(&url, &[]).await,
            Err(SiteHttpError::Closed)
        ));

        // closing twice is harmless
        client.close();
        assert!(client.is_closed());
    }
}
