//! Canonical browser header set sent by every site session.

use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue};

use super::SiteHttpError;

/// Desktop Chrome on Windows.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.8,en;q=0.6";

/// Header pairs of the canonical profile.
pub fn default_header_pairs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("User-Agent", DEFAULT_USER_AGENT),
        ("Accept", DEFAULT_ACCEPT),
        ("Accept-Language", DEFAULT_ACCEPT_LANGUAGE),
        ("Connection", "keep-alive"),
    ]
}

/// Canonical headers with `overrides` applied on top (case-insensitive).
pub fn browser_headers(overrides: &HashMap<String, String>) -> Result<HeaderMap, SiteHttpError> {
    let mut headers = HeaderMap::new();
    let pairs = default_header_pairs()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .chain(overrides.iter().map(|(name, value)| (name.clone(), value.clone())));

    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| SiteHttpError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| SiteHttpError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}
