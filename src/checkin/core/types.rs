//! Core data structures shared by sessions, plugins and the orchestrator.

use serde::{Deserialize, Serialize};

/// Outcome of one site's run. Produced exactly once per resolved site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinResult {
    pub site: String,
    pub success: bool,
    pub message: String,
}

impl CheckinResult {
    pub fn success(site: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(site: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            success: false,
            message: message.into(),
        }
    }

    pub fn from_outcome(site: impl Into<String>, outcome: CheckinOutcome) -> Self {
        Self {
            site: site.into(),
            success: outcome.success,
            message: outcome.message,
        }
    }
}

/// What a plugin reports from its check-in step. The session stamps the site
/// name on it to build the final [`CheckinResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinOutcome {
    pub success: bool,
    pub message: String,
}

impl CheckinOutcome {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Lifecycle of a site session. Both success and failure end in `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Completed,
}

/// Values gathered while preparing a login submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    /// `(field name, value)` of the anti-forgery token, when the page has one.
    pub csrf_token: Option<(String, String)>,
    /// Recognized CAPTCHA text, when a challenge image was present.
    pub captcha: Option<String>,
}

impl LoginForm {
    /// Append the optional token and captcha fields to a base payload.
    pub fn into_fields(
        self,
        mut fields: Vec<(String, String)>,
        captcha_field: &str,
    ) -> Vec<(String, String)> {
        if let Some((name, value)) = self.csrf_token {
            fields.push((name, value));
        }
        if let Some(captcha) = self.captcha {
            fields.push((captcha_field.to_string(), captcha));
        }
        fields
    }
}
