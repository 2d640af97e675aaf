//! # checkin-rs
//!
//! Daily check-in automation for a configurable set of websites.
//!
//! Each configured site names a plugin type. The orchestrator resolves the
//! type in the [`PluginRegistry`], opens one [`SiteSession`] per site and runs
//! them all concurrently; every resolved site produces exactly one
//! [`CheckinResult`]. Plugins whose login form carries an image CAPTCHA use
//! the [`CaptchaSolver`] inside a bounded attempt loop.
//!
//! ## Features
//!
//! - Plugin registry fed from a static module table
//! - Cookie-reusing, form-login and CAPTCHA-guarded login flows
//! - Per-site fault isolation: errors and panics become failed results
//! - Log and Telegram result digests
//!
//! ## Example
//!
//! ```no_run
//! use checkin_rs::{AppConfig, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let results = Orchestrator::new(config.global).run(&config.sites).await;
//!     for result in results {
//!         println!("{}: {} ({})", result.site, result.success, result.message);
//!     }
//!     Ok(())
//! }
//! ```

mod orchestrator;

pub mod checkin;
pub mod config;
pub mod external_deps;
pub mod modules;

pub use crate::orchestrator::{
    ClientFactory,
    Orchestrator,
    OrchestratorBuilder,
    default_client_factory,
};

pub use crate::checkin::{
    AUTH_FAILED_MESSAGE,
    AttemptVerdict,
    CaptchaAttempt,
    CaptchaConfig,
    CaptchaError,
    CaptchaSolver,
    CheckinOutcome,
    CheckinResult,
    LoginForm,
    PluginEntry,
    PluginFactory,
    PluginModule,
    PluginRegistry,
    RegistryError,
    ReqwestSiteClient,
    RetryOutcome,
    SessionState,
    SiteContext,
    SiteError,
    SiteHttpClient,
    SiteHttpError,
    SiteHttpResponse,
    SitePlugin,
    SiteSession,
    normalize_guess,
    plugin_factory,
    run_attempts,
};

pub use crate::config::{
    AppConfig,
    ConfigError,
    ConfigSource,
    EmailConfig,
    GlobalConfig,
    NotificationConfig,
    Recipients,
    SiteConfig,
    TelegramConfig,
};

pub use crate::external_deps::{
    OcrError,
    RecognitionOptions,
    TesseractRecognizer,
    TextRecognizer,
};

pub use crate::modules::{
    EmailSink,
    EventDispatcher,
    EventHandler,
    LogSink,
    LoggingHandler,
    NotifyError,
    ResultSink,
    SiteEvent,
    TelegramSink,
    deliver_all,
    format_digest,
    sinks_from_config,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
