//! Plugin capability contract and the shared session base.
//!
//! A [`SitePlugin`] holds the site-specific knowledge: how to authenticate
//! and how to claim the reward. Plugins write ordinary fallible code against a
//! [`SiteContext`]. [`SiteSession`] owns the HTTP context and turns every
//! plugin error into the public contract: `login()` yields a `bool`,
//! `checkin()` and `run()` yield a [`CheckinResult`], and nothing fails
//! across that boundary.
//!
//! A panic inside the plugin is caught by `run()` and reported as a failed
//! result. The HTTP context is released exactly once, when `run()` finishes
//! or, if the run is abandoned (dropped future), when the session is dropped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use thiserror::Error;
use url::Url;

use crate::checkin::captcha::CaptchaError;
use crate::checkin::core::{
    CheckinOutcome, CheckinResult, SessionState, SiteHttpClient, SiteHttpError, SiteHttpResponse,
};
use crate::config::{ConfigError, GlobalConfig};
use crate::modules::events::{EventDispatcher, SessionEvent, SiteEvent, Step};

/// Message reported when login does not succeed.
pub const AUTH_FAILED_MESSAGE: &str = "authentication failed";

/// Everything that can go wrong inside a plugin.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Http(#[from] SiteHttpError),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: Url },
    #[error("expected page element not found: {0}")]
    MissingElement(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("site configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Captcha(#[from] CaptchaError),
    #[error("{0}")]
    Other(String),
}

/// Borrowed view of a session handed to plugin calls.
pub struct SiteContext<'a> {
    pub site: &'a str,
    pub global: &'a GlobalConfig,
    pub http: &'a dyn SiteHttpClient,
    pub events: &'a EventDispatcher,
}

impl SiteContext<'_> {
    /// GET that only accepts 2xx responses.
    pub async fn get(&self, url: &Url) -> Result<SiteHttpResponse, SiteError> {
        let response = self.http.get(url).await?;
        ensure_success(response)
    }

    /// Form POST that only accepts 2xx responses.
    pub async fn post_form(
        &self,
        url: &Url,
        form_fields: &[(String, String)],
    ) -> Result<SiteHttpResponse, SiteError> {
        let response = self.http.post_form(url, form_fields).await?;
        ensure_success(response)
    }

    pub fn emit(&self, event: SiteEvent) {
        self.events.dispatch(event);
    }
}

fn ensure_success(response: SiteHttpResponse) -> Result<SiteHttpResponse, SiteError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(SiteError::Status {
            status: response.status,
            url: response.url,
        })
    }
}

/// Site-specific login/check-in logic.
#[async_trait]
pub trait SitePlugin: Send {
    /// Registry identifier of the plugin.
    fn kind(&self) -> &'static str;

    /// Origin the session's preloaded cookies are scoped to.
    fn base_url(&self) -> &Url;

    /// Authenticate; `Ok(false)` means the site refused us.
    async fn login(&mut self, ctx: &SiteContext<'_>) -> Result<bool, SiteError>;

    /// Claim the reward. Only called after a successful login.
    async fn checkin(&mut self, ctx: &SiteContext<'_>) -> Result<CheckinOutcome, SiteError>;
}

/// One site's authenticated HTTP context for the duration of one run.
pub struct SiteSession {
    name: String,
    global: Arc<GlobalConfig>,
    http: Arc<dyn SiteHttpClient>,
    plugin: Box<dyn SitePlugin>,
    events: Arc<EventDispatcher>,
    state: SessionState,
    released: bool,
}

impl SiteSession {
    pub fn new(
        name: impl Into<String>,
        global: Arc<GlobalConfig>,
        http: Arc<dyn SiteHttpClient>,
        plugin: Box<dyn SitePlugin>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            name: name.into(),
            global,
            http,
            plugin,
            events,
            state: SessionState::Unauthenticated,
            released: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Authenticate. Errors are logged and reported as `false`.
    pub async fn login(&mut self) -> bool {
        let ctx = SiteContext {
            site: &self.name,
            global: &self.global,
            http: self.http.as_ref(),
            events: &self.events,
        };

        let (success, message) = match self.plugin.login(&ctx).await {
            Ok(true) => (true, "authenticated".to_string()),
            Ok(false) => (false, "credentials or session rejected".to_string()),
            Err(err) => (false, err.to_string()),
        };
        self.events
            .dispatch(SiteEvent::step(&self.name, Step::Login, success, message));

        self.state = if success {
            SessionState::Authenticated
        } else {
            SessionState::Completed
        };
        success
    }

    /// Claim the reward. Errors become a failed result.
    pub async fn checkin(&mut self) -> CheckinResult {
        if self.state != SessionState::Authenticated {
            return CheckinResult::failure(&self.name, "check-in attempted without authentication");
        }

        let ctx = SiteContext {
            site: &self.name,
            global: &self.global,
            http: self.http.as_ref(),
            events: &self.events,
        };

        let result = match self.plugin.checkin(&ctx).await {
            Ok(outcome) => CheckinResult::from_outcome(&self.name, outcome),
            Err(err) => CheckinResult::failure(&self.name, format!("check-in error: {err}")),
        };
        self.events.dispatch(SiteEvent::step(
            &self.name,
            Step::Checkin,
            result.success,
            result.message.clone(),
        ));

        self.state = SessionState::Completed;
        result
    }

    /// Full flow for one site. Always releases the HTTP context and never
    /// panics.
    pub async fn run(mut self) -> CheckinResult {
        self.events.dispatch(SiteEvent::SessionOpened(self.session_event()));

        let result = match AssertUnwindSafe(self.login_then_checkin()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload);
                self.events
                    .dispatch(SiteEvent::error(&self.name, format!("site run panicked: {reason}")));
                CheckinResult::failure(&self.name, format!("unexpected error: {reason}"))
            }
        };

        self.state = SessionState::Completed;
        self.release();
        result
    }

    async fn login_then_checkin(&mut self) -> CheckinResult {
        if self.login().await {
            self.checkin().await
        } else {
            CheckinResult::failure(&self.name, AUTH_FAILED_MESSAGE)
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.http.close();
        self.events
            .dispatch(SiteEvent::SessionReleased(self.session_event()));
    }

    fn session_event(&self) -> SessionEvent {
        SessionEvent {
            site: self.name.clone(),
            kind: self.plugin.kind().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Text carried by a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

impl Drop for SiteSession {
    fn drop(&mut self) {
        self.release();
    }
}
