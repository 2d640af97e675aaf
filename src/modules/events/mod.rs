//! Event system for site runs.
//!
//! Business logic reports what happened through [`EventDispatcher`]; handlers
//! decide where it goes. The default [`LoggingHandler`] forwards to the `log`
//! facade and leaves the destination to whoever installs the logger.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A session opened for a site.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub site: String,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

/// Login or check-in finished.
#[derive(Debug, Clone)]
pub struct StepEvent {
    pub site: String,
    pub step: Step,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Login,
    Checkin,
}

#[derive(Debug, Clone)]
pub struct CaptchaEvent {
    pub site: String,
    pub attempt: usize,
    pub max_attempts: usize,
    pub guess: String,
    pub accepted: bool,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A configured site was not run.
#[derive(Debug, Clone)]
pub struct SkippedEvent {
    pub site: String,
    pub kind: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub site: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum SiteEvent {
    SessionOpened(SessionEvent),
    StepFinished(StepEvent),
    Captcha(CaptchaEvent),
    Skipped(SkippedEvent),
    Error(ErrorEvent),
    SessionReleased(SessionEvent),
}

impl SiteEvent {
    pub fn step(site: &str, step: Step, success: bool, message: impl Into<String>) -> Self {
        SiteEvent::StepFinished(StepEvent {
            site: site.to_string(),
            step,
            success,
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn error(site: &str, error: impl Into<String>) -> Self {
        SiteEvent::Error(ErrorEvent {
            site: site.to_string(),
            error: error.into(),
            timestamp: Utc::now(),
        })
    }
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &SiteEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with only the [`LoggingHandler`] installed.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: SiteEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &SiteEvent) {
        match event {
            SiteEvent::SessionOpened(session) => {
                log::info!("{}: starting {} check-in", session.site, session.kind);
            }
            SiteEvent::StepFinished(step) => {
                let label = match step.step {
                    Step::Login => "login",
                    Step::Checkin => "check-in",
                };
                if step.success {
                    log::info!("{}: {label} ok ({})", step.site, step.message);
                } else {
                    log::error!("{}: {label} failed: {}", step.site, step.message);
                }
            }
            SiteEvent::Captcha(captcha) => {
                if captcha.accepted {
                    log::info!(
                        "{}: captcha accepted on attempt {}/{}",
                        captcha.site,
                        captcha.attempt,
                        captcha.max_attempts
                    );
                } else {
                    log::warn!(
                        "{}: captcha attempt {}/{} rejected (guess '{}'): {}",
                        captcha.site,
                        captcha.attempt,
                        captcha.max_attempts,
                        captcha.guess,
                        captcha.reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            SiteEvent::Skipped(skipped) => {
                log::warn!("skipping {} ({}): {}", skipped.site, skipped.kind, skipped.reason);
            }
            SiteEvent::Error(error) => {
                log::error!("{}: {}", error.site, error.error);
            }
            SiteEvent::SessionReleased(session) => {
                log::debug!("{}: session released", session.site);
            }
        }
    }
}
