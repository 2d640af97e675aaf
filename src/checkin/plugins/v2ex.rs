//! V2EX daily login reward.
//!
//! Authentication reuses the browser cookies given in the site's `cookies`
//! option; the session client loads them before the first request.

use async_trait::async_trait;
use url::Url;

use crate::checkin::core::{CheckinOutcome, find_link, resolve_url};
use crate::checkin::registry::{PluginFactory, RegistryError, plugin_factory};
use crate::checkin::session::{SiteContext, SiteError, SitePlugin};
use crate::config::{GlobalConfig, SiteConfig};

use super::site_base_url;

const DEFAULT_BASE_URL: &str = "https://www.v2ex.com";
const DAILY_PATH: &str = "/mission/daily";

const LOGGED_IN_MARKER: &str = "每日登录奖励";
const CLAIMED_MARKER: &str = "已领取";
const REDEEMED_MARKER: &str = "领取每日奖励";

pub struct V2exPlugin {
    base_url: Url,
}

impl V2exPlugin {
    pub fn new(_global: &GlobalConfig, site: &SiteConfig) -> Result<Self, SiteError> {
        if site.cookies().is_empty() {
            log::warn!("{}: no cookies configured, login will likely fail", site.display_name());
        }
        Ok(Self {
            base_url: site_base_url(site, DEFAULT_BASE_URL)?,
        })
    }

    fn daily_url(&self) -> Result<Url, SiteError> {
        Ok(self.base_url.join(DAILY_PATH)?)
    }
}

#[async_trait]
impl SitePlugin for V2exPlugin {
    fn kind(&self) -> &'static str {
        "v2ex"
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn login(&mut self, ctx: &SiteContext<'_>) -> Result<bool, SiteError> {
        let page = ctx.get(&self.daily_url()?).await?;
        let logged_in = page.text().contains(LOGGED_IN_MARKER);
        if !logged_in {
            log::debug!("{}: daily page without reward marker, cookies expired?", ctx.site);
        }
        Ok(logged_in)
    }

    async fn checkin(&mut self, ctx: &SiteContext<'_>) -> Result<CheckinOutcome, SiteError> {
        let page = ctx.get(&self.daily_url()?).await?;
        let html = page.text();

        let Some(link) = find_link(&html, |href| href.contains("once") && href.contains("daily"))
        else {
            if html.contains(CLAIMED_MARKER) {
                return Ok(CheckinOutcome::done("already claimed today"));
            }
            return Ok(CheckinOutcome::failed("redeem link not found"));
        };

        let redeem_url = resolve_url(&page.url, &link)?;
        let reply = ctx.get(&redeem_url).await?.text();

        if reply.contains(REDEEMED_MARKER) {
            Ok(CheckinOutcome::done("daily reward claimed"))
        } else if reply.contains(CLAIMED_MARKER) {
            Ok(CheckinOutcome::done("already claimed today"))
        } else {
            Ok(CheckinOutcome::failed("unrecognized redeem response"))
        }
    }
}

pub fn register_plugin() -> Result<PluginFactory, RegistryError> {
    Ok(plugin_factory(|global, site| {
        Ok(Box::new(V2exPlugin::new(global, site)?))
    }))
}
