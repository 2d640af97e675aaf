//! Site check-in engine.
//!
//! Layout:
//! - `core`: transport contract, page helpers and shared result types.
//! - `captcha`: image challenge solving and the bounded attempt loop.
//! - `session`: the plugin trait and the per-site session state machine.
//! - `registry`: site-type → plugin factory lookup.
//! - `plugins`: the built-in site plugins.

pub mod captcha;
pub mod core;
pub mod plugins;
pub mod registry;
pub mod session;

pub use captcha::{
    AttemptVerdict, CaptchaAttempt, CaptchaConfig, CaptchaError, CaptchaSolver, RetryOutcome,
    normalize_guess, run_attempts,
};
pub use self::core::{
    CheckinOutcome, CheckinResult, LoginForm, ReqwestSiteClient, SessionState, SiteHttpClient,
    SiteHttpError, SiteHttpResponse,
};
pub use registry::{PluginEntry, PluginFactory, PluginModule, PluginRegistry, RegistryError, plugin_factory};
pub use session::{AUTH_FAILED_MESSAGE, SiteContext, SiteError, SitePlugin, SiteSession};
