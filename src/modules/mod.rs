//! Cross-cutting services: run events and result delivery.

pub mod events;
pub mod notify;

pub use events::{
    CaptchaEvent, ErrorEvent, EventDispatcher, EventHandler, LoggingHandler, SessionEvent,
    SiteEvent, SkippedEvent, Step, StepEvent,
};
pub use notify::{
    EmailSink, LogSink, NotifyError, ResultSink, TelegramSink, deliver_all, format_digest, sinks_from_config,
};
