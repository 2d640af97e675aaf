//! Lixianla forum sign-in.
//!
//! The login form may carry an image CAPTCHA. Every attempt fetches a fresh
//! login page (new token, new challenge), solves the image and submits; the
//! attempt loop stops on acceptance, on rejected credentials, or at the
//! configured ceiling.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::checkin::captcha::{AttemptVerdict, CaptchaConfig, CaptchaSolver, run_attempts};
use crate::checkin::core::{
    CheckinOutcome, DEFAULT_TOKEN_FIELDS, LoginForm, contains_any, find_attr, find_token,
    resolve_url,
};
use crate::checkin::registry::{PluginFactory, RegistryError, plugin_factory};
use crate::checkin::session::{SiteContext, SiteError, SitePlugin};
use crate::config::{GlobalConfig, SiteConfig};
use crate::modules::events::{CaptchaEvent, SiteEvent};

use super::site_base_url;

const DEFAULT_BASE_URL: &str = "https://lixianla.com";
const LOGIN_PATH: &str = "/user-login.htm";
const SIGN_PATH: &str = "/sg_sign.htm";

const LOGGED_IN_MARKERS: &[&str] = &["用户中心"];
const CAPTCHA_REJECTED_MARKERS: &[&str] = &["验证码错误", "验证码不正确"];
const CREDENTIALS_REJECTED_MARKERS: &[&str] = &["密码错误", "用户不存在", "账号或密码"];
const SIGNED_MARKERS: &[&str] = &["签到成功"];
const ALREADY_SIGNED_MARKERS: &[&str] = &["已签到", "已经签到"];

pub struct LixianlaPlugin {
    base_url: Url,
    email: String,
    password: String,
    solver: CaptchaSolver,
}

impl LixianlaPlugin {
    pub fn new(global: &GlobalConfig, site: &SiteConfig) -> Result<Self, SiteError> {
        let captcha: CaptchaConfig = site.section("captcha")?.unwrap_or_default();
        Ok(Self {
            base_url: site_base_url(site, DEFAULT_BASE_URL)?,
            email: site.require_str("email")?.to_string(),
            password: site.require_str("password")?.to_string(),
            solver: CaptchaSolver::tesseract(captcha).with_timeout(global.timeout()),
        })
    }

    /// Replace the recognizer-backed solver.
    pub fn with_solver(mut self, solver: CaptchaSolver) -> Self {
        self.solver = solver;
        self
    }

    fn captcha(&self) -> &CaptchaConfig {
        self.solver.config()
    }

    /// One fetch → solve → submit cycle.
    async fn attempt_login(
        &self,
        ctx: &SiteContext<'_>,
        index: usize,
    ) -> Result<AttemptVerdict, SiteError> {
        let login_url = self.base_url.join(LOGIN_PATH)?;
        let page = ctx.get(&login_url).await?;
        let html = page.text();

        let mut form = LoginForm {
            csrf_token: find_token(&html, DEFAULT_TOKEN_FIELDS),
            captcha: None,
        };

        if let Some(src) = find_attr(&html, &self.captcha().image_selectors, "src") {
            let image = ctx.get(&resolve_url(&page.url, &src)?).await?.body;
            let attempt = self.solver.attempt(index, image).await;
            if attempt.is_empty() {
                let verdict = AttemptVerdict::Retry("captcha unreadable".into());
                self.report(ctx, index, "", &verdict);
                return Ok(verdict);
            }
            form.captcha = Some(attempt.text);
        }

        let guess = form.captcha.clone();
        let fields = form.into_fields(
            vec![
                ("email".to_string(), self.email.clone()),
                ("password".to_string(), self.password.clone()),
                ("remember".to_string(), "on".to_string()),
            ],
            &self.captcha().field_name,
        );

        let reply = ctx.post_form(&login_url, &fields).await?.text();
        let verdict = classify_login(&reply);

        if let Some(guess) = guess {
            self.report(ctx, index, &guess, &verdict);
        }
        Ok(verdict)
    }

    fn report(&self, ctx: &SiteContext<'_>, index: usize, guess: &str, verdict: &AttemptVerdict) {
        let (accepted, reason) = match verdict {
            AttemptVerdict::Accepted => (true, None),
            AttemptVerdict::Retry(why) | AttemptVerdict::Fatal(why) => (false, Some(why.clone())),
        };
        ctx.emit(SiteEvent::Captcha(CaptchaEvent {
            site: ctx.site.to_string(),
            attempt: index,
            max_attempts: self.captcha().attempt_ceiling(),
            guess: guess.to_string(),
            accepted,
            reason,
            timestamp: Utc::now(),
        }));
    }
}

fn classify_login(reply: &str) -> AttemptVerdict {
    if contains_any(reply, LOGGED_IN_MARKERS) {
        AttemptVerdict::Accepted
    } else if contains_any(reply, CAPTCHA_REJECTED_MARKERS) {
        AttemptVerdict::Retry("captcha rejected".into())
    } else if contains_any(reply, CREDENTIALS_REJECTED_MARKERS) {
        AttemptVerdict::Fatal("invalid credentials".into())
    } else {
        AttemptVerdict::Fatal("unrecognized login response".into())
    }
}

/// JSON body of the sign endpoint: `{"code": "0", "message": "..."}`.
#[derive(Debug, Deserialize)]
struct SignReply {
    code: Value,
    #[serde(default)]
    message: String,
}

impl SignReply {
    fn is_ok(&self) -> bool {
        match &self.code {
            Value::Number(code) => code.as_i64() == Some(0),
            Value::String(code) => code.trim() == "0",
            _ => false,
        }
    }
}

fn interpret_sign(body: &str) -> CheckinOutcome {
    if let Ok(reply) = serde_json::from_str::<SignReply>(body) {
        return if reply.is_ok() {
            CheckinOutcome::done(non_empty(reply.message, "signed in"))
        } else if contains_any(&reply.message, ALREADY_SIGNED_MARKERS) {
            CheckinOutcome::done("already signed in today")
        } else {
            CheckinOutcome::failed(non_empty(reply.message, "sign-in rejected"))
        };
    }

    if contains_any(body, SIGNED_MARKERS) {
        CheckinOutcome::done("signed in")
    } else if contains_any(body, ALREADY_SIGNED_MARKERS) {
        CheckinOutcome::done("already signed in today")
    } else {
        CheckinOutcome::failed("unrecognized sign-in response")
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[async_trait]
impl SitePlugin for LixianlaPlugin {
    fn kind(&self) -> &'static str {
        "lixianla"
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn login(&mut self, ctx: &SiteContext<'_>) -> Result<bool, SiteError> {
        let this = &*self;
        let outcome = run_attempts(this.captcha().attempt_ceiling(), move |index| {
            this.attempt_login(ctx, index)
        })
        .await?;

        if !outcome.accepted {
            log::debug!(
                "{}: login gave up after {} attempt(s): {}",
                ctx.site,
                outcome.attempts,
                outcome.reason.as_deref().unwrap_or("rejected")
            );
        }
        Ok(outcome.accepted)
    }

    async fn checkin(&mut self, ctx: &SiteContext<'_>) -> Result<CheckinOutcome, SiteError> {
        let reply = ctx.post_form(&self.base_url.join(SIGN_PATH)?, &[]).await?;
        Ok(interpret_sign(&reply.text()))
    }
}

pub fn register_plugin() -> Result<PluginFactory, RegistryError> {
    Ok(plugin_factory(|global, site| {
        Ok(Box::new(LixianlaPlugin::new(global, site)?))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::core::testing::{ScriptedClient, page};
    use crate::external_deps::ocr::{OcrResult, RecognitionOptions, TextRecognizer};
    use crate::modules::events::{EventDispatcher, EventHandler};
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const LOGIN_HTML: &str = r#"<form action="/user-login.htm" method="post">
        <input type="hidden" name="_token" value="tok-1">
        <input name="email"><input name="password" type="password">
        <img id="captcha" src="/vcode.htm?t=1">
    </form>"#;

    struct FixedRecognizer(&'static str);

    #[async_trait]
    impl TextRecognizer for FixedRecognizer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn recognize(&self, _png: &[u8], _options: &RecognitionOptions) -> OcrResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct CaptchaLog(Mutex<Vec<(usize, bool)>>);

    impl EventHandler for CaptchaLog {
        fn handle(&self, event: &SiteEvent) {
            if let SiteEvent::Captcha(captcha) = event {
                self.0.lock().unwrap().push((captcha.attempt, captcha.accepted));
            }
        }
    }

    fn captcha_png() -> Vec<u8> {
        let image = GrayImage::from_fn(48, 16, |x, y| Luma([if (x + y) % 4 == 0 { 10 } else { 240 }]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn plugin(guess: &'static str) -> LixianlaPlugin {
        let site = SiteConfig::new("lixianla")
            .with_option("base_url", "https://lixianla.test")
            .with_option("email", "a@b.c")
            .with_option("password", "pw");
        let solver = CaptchaSolver::new(Arc::new(FixedRecognizer(guess)), CaptchaConfig::default());
        LixianlaPlugin::new(&GlobalConfig::default(), &site)
            .unwrap()
            .with_solver(solver)
    }

    fn client_with_replies(replies: &[&'static str]) -> ScriptedClient {
        let mut client = ScriptedClient::new()
            .route("GET /user-login.htm", page(200, LOGIN_HTML))
            .route("/vcode.htm", page(200, captcha_png()));
        for reply in replies {
            client = client.route("POST /user-login.htm", page(200, *reply));
        }
        client
    }

    async fn login(plugin: &mut LixianlaPlugin, client: &ScriptedClient) -> (bool, Vec<(usize, bool)>) {
        let global = GlobalConfig::default();
        let log = Arc::new(CaptchaLog::default());
        let mut events = EventDispatcher::new();
        events.register_handler(log.clone());
        let ctx = SiteContext {
            site: "Lixianla",
            global: &global,
            http: client,
            events: &events,
        };
        let ok = plugin.login(&ctx).await.unwrap();
        let seen = log.0.lock().unwrap().clone();
        (ok, seen)
    }

    #[tokio::test]
    async fn succeeds_on_third_captcha() {
        let client = client_with_replies(&["验证码错误", "验证码错误", "<a>用户中心</a>"]);
        let (ok, seen) = login(&mut plugin("ab12"), &client).await;

        assert!(ok);
        assert_eq!(seen, vec![(1, false), (2, false), (3, true)]);

        let posts = client.posts_to(LOGIN_PATH);
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].field("captcha"), Some("AB12"));
        assert_eq!(posts[0].field("_token"), Some("tok-1"));
        assert_eq!(posts[0].field("email"), Some("a@b.c"));
    }

    #[tokio::test]
    async fn gives_up_at_attempt_ceiling() {
        let client = client_with_replies(&["验证码不正确"]);
        let (ok, seen) = login(&mut plugin("ab12"), &client).await;

        assert!(!ok);
        assert_eq!(seen.len(), 3);
        assert_eq!(client.posts_to(LOGIN_PATH).len(), 3);
    }

    #[tokio::test]
    async fn bad_credentials_stop_early() {
        let client = client_with_replies(&["验证码错误", "密码错误"]);
        let (ok, seen) = login(&mut plugin("ab12"), &client).await;

        assert!(!ok);
        assert_eq!(seen, vec![(1, false), (2, false)]);
        assert_eq!(client.posts_to(LOGIN_PATH).len(), 2);
    }

    #[tokio::test]
    async fn unreadable_captcha_is_not_submitted() {
        let client = client_with_replies(&["<a>用户中心</a>"]);
        let (ok, seen) = login(&mut plugin("x1"), &client).await;

        assert!(!ok);
        assert_eq!(seen.len(), 3);
        assert!(client.posts_to(LOGIN_PATH).is_empty());
    }

    #[tokio::test]
    async fn page_without_captcha_posts_once() {
        let client = ScriptedClient::new()
            .route("GET /user-login.htm", page(200, r#"<input name="_token" value="t">"#))
            .route("POST /user-login.htm", page(200, "用户中心"));
        let (ok, seen) = login(&mut plugin("ab12"), &client).await;

        assert!(ok);
        assert!(seen.is_empty());
        let posts = client.posts_to(LOGIN_PATH);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].field("captcha"), None);
    }

    #[test]
    fn sign_reply_interpretation() {
        assert_eq!(
            interpret_sign(r#"{"code":"0","message":"签到成功，获得 5 金币"}"#),
            CheckinOutcome::done("签到成功，获得 5 金币")
        );
        assert_eq!(
            interpret_sign(r#"{"code":-1,"message":"今天已签到"}"#),
            CheckinOutcome::done("already signed in today")
        );
        assert_eq!(
            interpret_sign(r#"{"code":1,"message":""}"#),
            CheckinOutcome::failed("sign-in rejected")
        );
        assert_eq!(interpret_sign("<p>签到成功</p>"), CheckinOutcome::done("signed in"));
        assert!(!interpret_sign("<p>502</p>").success);
    }

    #[test]
    fn captcha_section_is_read_from_site_options() {
        let site = SiteConfig::new("lixianla")
            .with_option("email", "a@b.c")
            .with_option("password", "pw")
            .with_option("captcha", serde_json::json!({"field_name": "vcode", "max_attempts": 5}));
        let plugin = LixianlaPlugin::new(&GlobalConfig::default(), &site).unwrap();
        assert_eq!(plugin.captcha().field_name, "vcode");
        assert_eq!(plugin.captcha().attempt_ceiling(), 5);
    }

    #[test]
    fn recognition_is_bounded_by_global_timeout() {
        let site = SiteConfig::new("lixianla")
            .with_option("email", "a@b.c")
            .with_option("password", "pw");
        let global = GlobalConfig::default().with_timeout(Duration::from_secs(7));
        let plugin = LixianlaPlugin::new(&global, &site).unwrap();
        assert_eq!(plugin.solver.timeout(), Duration::from_secs(7));
    }
}
