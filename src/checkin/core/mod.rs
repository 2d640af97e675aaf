//! Core utilities shared by sessions, plugins and the orchestrator.

pub mod analysis;
pub mod client;
pub mod headers;
pub mod reqwest_client;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{
    DEFAULT_TOKEN_FIELDS, FormBlueprint, contains_any, find_attr, find_form_with_button,
    find_link, find_token, resolve_url,
};
pub use client::{SiteHttpClient, SiteHttpError, SiteHttpResponse};
pub use headers::{DEFAULT_USER_AGENT, browser_headers};
pub use reqwest_client::ReqwestSiteClient;
pub use types::{CheckinOutcome, CheckinResult, LoginForm, SessionState};
