//! HnHost client-area daily sign-in.

use async_trait::async_trait;
use url::Url;

use crate::checkin::core::{
    CheckinOutcome, DEFAULT_TOKEN_FIELDS, LoginForm, contains_any, find_form_with_button,
    find_link, find_token, resolve_url,
};
use crate::checkin::registry::{PluginFactory, RegistryError, plugin_factory};
use crate::checkin::session::{SiteContext, SiteError, SitePlugin};
use crate::config::{GlobalConfig, SiteConfig};

use super::site_base_url;

const DEFAULT_BASE_URL: &str = "https://client.hnhost.net";
const LOGIN_PAGE: &str = "/index.php";
const LOGIN_SUBMIT: &str = "/index.php?rp=/login";
const CLIENT_AREA: &str = "/index.php?rp=/clientarea";

const WELCOME_MARKERS: &[&str] = &["欢迎回来"];
const SIGNED_MARKERS: &[&str] = &["签到成功"];
const ALREADY_SIGNED_MARKERS: &[&str] = &["今天已经签到过了", "已签到"];

pub struct HnHostPlugin {
    base_url: Url,
    username: String,
    password: String,
}

impl HnHostPlugin {
    pub fn new(_global: &GlobalConfig, site: &SiteConfig) -> Result<Self, SiteError> {
        Ok(Self {
            base_url: site_base_url(site, DEFAULT_BASE_URL)?,
            username: site.require_str("username")?.to_string(),
            password: site.require_str("password")?.to_string(),
        })
    }
}

#[async_trait]
impl SitePlugin for HnHostPlugin {
    fn kind(&self) -> &'static str {
        "hnhost"
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn login(&mut self, ctx: &SiteContext<'_>) -> Result<bool, SiteError> {
        let page = ctx.get(&self.base_url.join(LOGIN_PAGE)?).await?;
        let form = LoginForm {
            csrf_token: find_token(&page.text(), DEFAULT_TOKEN_FIELDS),
            captcha: None,
        };

        let fields = form.into_fields(
            vec![
                ("username".to_string(), self.username.clone()),
                ("password".to_string(), self.password.clone()),
                ("remember".to_string(), "on".to_string()),
            ],
            "captcha",
        );

        let reply = ctx
            .post_form(&self.base_url.join(LOGIN_SUBMIT)?, &fields)
            .await?;
        Ok(contains_any(&reply.text(), WELCOME_MARKERS))
    }

    async fn checkin(&mut self, ctx: &SiteContext<'_>) -> Result<CheckinOutcome, SiteError> {
        let area = ctx.get(&self.base_url.join(CLIENT_AREA)?).await?;
        let html = area.text();

        let reply = if let Some(form) = find_form_with_button(&html, "签到") {
            let target = form.submit_url(&area.url)?;
            ctx.post_form(&target, &form.fields).await?
        } else if let Some(link) = find_link(&html, |href| href.contains("checkin")) {
            ctx.get(&resolve_url(&area.url, &link)?).await?
        } else if contains_any(&html, ALREADY_SIGNED_MARKERS) {
            return Ok(CheckinOutcome::done("already signed in today"));
        } else {
            return Err(SiteError::MissingElement("sign-in button or link".into()));
        };

        let text = reply.text();
        if contains_any(&text, SIGNED_MARKERS) {
            Ok(CheckinOutcome::done("signed in"))
        } else if contains_any(&text, ALREADY_SIGNED_MARKERS) {
            Ok(CheckinOutcome::done("already signed in today"))
        } else {
            Ok(CheckinOutcome::failed("unrecognized sign-in response"))
        }
    }
}

pub fn register_plugin() -> Result<PluginFactory, RegistryError> {
    Ok(plugin_factory(|global, site| {
        Ok(Box::new(HnHostPlugin::new(global, site)?))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::core::testing::{ScriptedClient, page};
    use crate::config::ConfigError;
    use crate::modules::events::EventDispatcher;

    const LOGIN_HTML: &str = r#"<form method="post" action="/index.php?rp=/login">
        <input type="hidden" name="token" value="tk-991">
        <input name="username"><input name="password" type="password">
    </form>"#;

    const AREA_WITH_FORM: &str = r#"<div>
        <form method="post" action="/index.php?m=checkin&action=sign">
          <input type="hidden" name="token" value="tk-992">
          <button type="submit">每日签到</button>
        </form>
    </div>"#;

    fn site() -> SiteConfig {
        SiteConfig::new("hnhost")
            .with_option("base_url", "https://hnhost.test")
            .with_option("username", "alice")
            .with_option("password", "secret")
    }

    async fn login_and_checkin(client: &ScriptedClient) -> (bool, Option<CheckinOutcome>) {
        let global = GlobalConfig::default();
        let events = EventDispatcher::new();
        let mut plugin = HnHostPlugin::new(&global, &site()).unwrap();
        let ctx = SiteContext {
            site: "HnHost",
            global: &global,
            http: client,
            events: &events,
        };

        if !plugin.login(&ctx).await.unwrap() {
            return (false, None);
        }
        (true, Some(plugin.checkin(&ctx).await.unwrap()))
    }

    #[tokio::test]
    async fn logs_in_with_token_and_submits_sign_form() {
        let client = ScriptedClient::new()
            .route("GET /index.php", page(200, LOGIN_HTML))
            .route("POST /index.php?rp=/login", page(200, "<h2>欢迎回来, alice</h2>"))
            .route("GET /index.php?rp=/clientarea", page(200, AREA_WITH_FORM))
            .route("POST /index.php?m=checkin&action=sign", page(200, "签到成功，获得 1 积分"));

        let (logged_in, outcome) = login_and_checkin(&client).await;
        assert!(logged_in);
        assert_eq!(outcome, Some(CheckinOutcome::done("signed in")));

        let logins = client.posts_to("/index.php");
        let login = logins.iter().find(|req| req.url.query() == Some("rp=/login")).unwrap();
        assert_eq!(login.field("username"), Some("alice"));
        assert_eq!(login.field("remember"), Some("on"));
        assert_eq!(login.field("token"), Some("tk-991"));

        let sign = logins
            .iter()
            .find(|req| req.url.query() == Some("m=checkin&action=sign"))
            .unwrap();
        assert_eq!(sign.field("token"), Some("tk-992"));
    }

    #[tokio::test]
    async fn falls_back_to_checkin_link() {
        let client = ScriptedClient::new()
            .route("GET /index.php", page(200, "<form></form>"))
            .route("POST /index.php?rp=/login", page(200, "欢迎回来"))
            .route(
                "GET /index.php?rp=/clientarea",
                page(200, r#"<a href="/checkin.php?do=1">sign</a>"#),
            )
            .route("/checkin.php", page(200, "今天已经签到过了"));

        let (_, outcome) = login_and_checkin(&client).await;
        assert_eq!(outcome, Some(CheckinOutcome::done("already signed in today")));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let client = ScriptedClient::new()
            .route("GET /index.php", page(200, LOGIN_HTML))
            .route("POST /index.php?rp=/login", page(200, "登录信息错误"));

        let (logged_in, _) = login_and_checkin(&client).await;
        assert!(!logged_in);
    }

    #[tokio::test]
    async fn unknown_sign_reply_is_failure() {
        let client = ScriptedClient::new()
            .route("GET /index.php", page(200, LOGIN_HTML))
            .route("POST /index.php?rp=/login", page(200, "欢迎回来"))
            .route("GET /index.php?rp=/clientarea", page(200, AREA_WITH_FORM))
            .route("POST /index.php?m=checkin&action=sign", page(200, "error"));

        let (_, outcome) = login_and_checkin(&client).await;
        assert_eq!(outcome, Some(CheckinOutcome::failed("unrecognized sign-in response")));
    }

    #[test]
    fn credentials_are_required() {
        let site = SiteConfig::new("hnhost").with_option("username", "alice");
        assert!(matches!(
            HnHostPlugin::new(&GlobalConfig::default(), &site),
            Err(SiteError::Config(ConfigError::MissingOption(key))) if key == "password"
        ));
    }
}
