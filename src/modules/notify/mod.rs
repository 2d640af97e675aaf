//! Result delivery.
//!
//! Sinks only ever see the final [`CheckinResult`] list. Delivery failures are
//! logged and never affect the run itself. The digest goes to the log, and
//! optionally to email (SMTP) and Telegram.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::checkin::core::CheckinResult;
use crate::config::{EmailConfig, NotificationConfig, Recipients, TelegramConfig};

pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ENV: &str = "TELEGRAM_CHAT_ID";

pub const EMAIL_HOST_ENV: &str = "EMAIL_HOST";
pub const EMAIL_PORT_ENV: &str = "EMAIL_PORT";
pub const EMAIL_USER_ENV: &str = "EMAIL_USER";
pub const EMAIL_PASSWORD_ENV: &str = "EMAIL_PASSWORD";
pub const EMAIL_RECIPIENTS_ENV: &str = "EMAIL_RECIPIENTS";

const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_SMTP_PORT: u16 = 587;
const EMAIL_SUBJECT: &str = "Check-in results";

static MARKDOWN_SPECIALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([_*`\[])").unwrap());

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("missing notification setting '{0}'")]
    MissingCredential(&'static str),
    #[error("invalid notification setting '{key}': {value}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("email could not be composed: {0}")]
    Compose(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Destination for the per-run summary.
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, results: &[CheckinResult]) -> Result<(), NotifyError>;
}

/// Human-readable summary: header, counts, then one line per site.
pub fn format_digest(results: &[CheckinResult]) -> String {
    let succeeded = results.iter().filter(|result| result.success).count();
    let failed = results.len() - succeeded;

    let mut digest = String::from("### Check-in summary\n\n");
    digest.push_str(&format!("✅ Succeeded: {succeeded}\n"));
    digest.push_str(&format!("❌ Failed: {failed}\n\n"));

    for result in results {
        let mark = if result.success { "✅" } else { "❌" };
        digest.push_str(&format!("{mark} {}: {}\n", result.site, result.message));
    }
    digest
}

/// Send the digest to every sink. Empty result lists are not delivered.
pub async fn deliver_all(sinks: &[Box<dyn ResultSink>], results: &[CheckinResult]) {
    if results.is_empty() {
        log::info!("no check-in results to deliver");
        return;
    }

    for sink in sinks {
        match sink.deliver(results).await {
            Ok(()) => log::debug!("results delivered via {}", sink.name()),
            Err(err) => log::error!("{} delivery failed: {err}", sink.name()),
        }
    }
}

/// Sinks enabled by `config`, with unset settings read from the process
/// environment.
pub fn sinks_from_config(config: &NotificationConfig) -> Vec<Box<dyn ResultSink>> {
    sinks_with_lookup(config, |key| std::env::var(key).ok())
}

/// The log sink is always present; an enabled sink whose settings cannot be
/// resolved is reported and left out.
pub fn sinks_with_lookup(
    config: &NotificationConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<Box<dyn ResultSink>> {
    let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(LogSink)];

    if config.email_enabled {
        match EmailSink::from_config(&config.email, &lookup) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => log::error!("email notifications disabled: {err}"),
        }
    }

    if config.telegram_enabled {
        match TelegramSink::from_config(&config.telegram, &lookup) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => log::error!("telegram notifications disabled: {err}"),
        }
    }
    sinks
}

/// Writes the digest to the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ResultSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, results: &[CheckinResult]) -> Result<(), NotifyError> {
        for line in format_digest(results).lines().filter(|line| !line.is_empty()) {
            log::info!("{line}");
        }
        Ok(())
    }
}

/// Posts the digest through the Telegram Bot API.
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Credentials from `config`, falling back to `TELEGRAM_BOT_TOKEN` and
    /// `TELEGRAM_CHAT_ID` as resolved by `lookup`.
    pub fn from_config(
        config: &TelegramConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, NotifyError> {
        let bot_token = resolve(config.bot_token.as_deref(), TELEGRAM_TOKEN_ENV, &lookup)?;
        let chat_id = resolve(config.chat_id.as_deref(), TELEGRAM_CHAT_ENV, &lookup)?;
        Self::new(bot_token, chat_id)
    }

    /// Point the sink at another Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

/// Sends the digest as a plain-text mail over SMTP with STARTTLS.
pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailSink {
    /// Settings from `config`, falling back to the `EMAIL_*` variables as
    /// resolved by `lookup`. The port defaults to 587.
    pub fn from_config(
        config: &EmailConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, NotifyError> {
        let host = resolve(config.host.as_deref(), EMAIL_HOST_ENV, &lookup)?;
        let user = resolve(config.user.as_deref(), EMAIL_USER_ENV, &lookup)?;
        let password = resolve(config.password.as_deref(), EMAIL_PASSWORD_ENV, &lookup)?;

        let port = match config.port {
            Some(port) => port,
            None => match lookup(EMAIL_PORT_ENV) {
                Some(raw) => raw.trim().parse().map_err(|_| NotifyError::InvalidSetting {
                    key: EMAIL_PORT_ENV,
                    value: raw,
                })?,
                None => DEFAULT_SMTP_PORT,
            },
        };

        let recipients = config
            .recipients
            .as_ref()
            .map(Recipients::addresses)
            .filter(|addresses| !addresses.is_empty())
            .or_else(|| lookup(EMAIL_RECIPIENTS_ENV).map(|joined| Recipients::parse(&joined).addresses()))
            .filter(|addresses| !addresses.is_empty())
            .ok_or(NotifyError::MissingCredential(EMAIL_RECIPIENTS_ENV))?
            .iter()
            .map(|address| address.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        let from: Mailbox = user.parse()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)?
            .port(port)
            .credentials(Credentials::new(user, password))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            host,
            port,
            from,
            recipients,
        })
    }

    fn compose(&self, results: &[CheckinResult]) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        Ok(builder.body(format_digest(results))?)
    }
}

#[async_trait]
impl ResultSink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, results: &[CheckinResult]) -> Result<(), NotifyError> {
        let message = self.compose(results)?;
        log::debug!(
            "sending digest via {}:{} to {} recipient(s)",
            self.host,
            self.port,
            self.recipients.len()
        );
        self.transport.send(message).await?;
        Ok(())
    }
}

fn resolve(
    configured: Option<&str>,
    env_key: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, NotifyError> {
    configured
        .map(str::to_string)
        .or_else(|| lookup(env_key))
        .filter(|value| !value.trim().is_empty())
        .ok_or(NotifyError::MissingCredential(env_key))
}

/// Escape the characters legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    MARKDOWN_SPECIALS.replace_all(text, r"\$1").into_owned()
}

#[async_trait]
impl ResultSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, results: &[CheckinResult]) -> Result<(), NotifyError> {
        let text = escape_markdown(&format_digest(results));
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text.as_str()),
            ("parse_mode", "Markdown"),
        ];

        let response = self.client.post(self.endpoint()).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
