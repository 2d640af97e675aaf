//! Built-in site plugins.
//!
//! Each plugin module exposes `register_plugin()`; [`BUILTIN_MODULES`] is the
//! table [`PluginRegistry::with_builtin`](crate::PluginRegistry::with_builtin)
//! discovers from.

pub mod hnhost;
pub mod lixianla;
pub mod v2ex;

use url::Url;

use crate::checkin::registry::PluginModule;
use crate::checkin::session::SiteError;
use crate::config::SiteConfig;

/// Built-in plugin table, keyed by site type.
pub const BUILTIN_MODULES: &[PluginModule] = &[
    PluginModule::new("v2ex", v2ex::register_plugin),
    PluginModule::new("hnhost", hnhost::register_plugin),
    PluginModule::new("lixianla", lixianla::register_plugin),
];

/// Site origin: the `base_url` option when given, `default` otherwise.
pub(crate) fn site_base_url(site: &SiteConfig, default: &str) -> Result<Url, SiteError> {
    let raw = site.option_str("base_url").unwrap_or(default);
    Ok(Url::parse(raw.trim_end_matches('/'))?)
}
