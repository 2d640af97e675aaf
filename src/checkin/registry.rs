//! Plugin registry.
//!
//! Maps a site-type identifier to a factory producing a boxed
//! [`SitePlugin`]. Plugins live in a static module table; each module exposes
//! a `register_plugin()` entry point and [`PluginRegistry::discover`] walks
//! the table, registering every factory it can obtain.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::checkin::session::{SiteError, SitePlugin};
use crate::config::{GlobalConfig, SiteConfig};

/// Constructor for one plugin type.
pub type PluginFactory =
    Arc<dyn Fn(&GlobalConfig, &SiteConfig) -> Result<Box<dyn SitePlugin>, SiteError> + Send + Sync>;

/// Signature of a module's `register_plugin()` entry point.
pub type PluginEntry = fn() -> Result<PluginFactory, RegistryError>;

/// Wrap a closure as a [`PluginFactory`].
pub fn plugin_factory<F>(factory: F) -> PluginFactory
where
    F: Fn(&GlobalConfig, &SiteConfig) -> Result<Box<dyn SitePlugin>, SiteError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(factory)
}

/// One entry of a plugin module table.
#[derive(Clone, Copy)]
pub struct PluginModule {
    pub name: &'static str,
    pub entry: Option<PluginEntry>,
}

impl PluginModule {
    pub const fn new(name: &'static str, entry: PluginEntry) -> Self {
        Self {
            name,
            entry: Some(entry),
        }
    }

    /// A module that exposes no entry point.
    pub const fn without_entry(name: &'static str) -> Self {
        Self { name, entry: None }
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("name", &self.name)
            .field("has_entry", &self.entry.is_some())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown site type '{0}'")]
    NotFound(String),
    #[error("plugin module '{0}' has no register_plugin entry point")]
    MissingEntryPoint(String),
    #[error("plugin module '{module}' failed to load: {reason}")]
    Load { module: String, reason: String },
}

/// Type identifier → plugin factory.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated from the built-in plugin table.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.discover(crate::checkin::plugins::BUILTIN_MODULES);
        registry
    }

    /// Add or replace the factory for `kind`; the last registration wins.
    pub fn register(&mut self, kind: impl Into<String>, factory: PluginFactory) {
        let kind = kind.into();
        if self.plugins.insert(kind.clone(), factory).is_some() {
            log::debug!("plugin '{kind}' re-registered");
        }
    }

    /// Register every module whose entry point yields a factory, under the
    /// module's name. Broken modules are logged and skipped. Returns how many
    /// modules were registered.
    pub fn discover(&mut self, modules: &[PluginModule]) -> usize {
        let mut loaded = 0;

        for module in modules {
            match load_module(module) {
                Ok(factory) => {
                    self.register(module.name, factory);
                    loaded += 1;
                }
                Err(err) => log::warn!("{err}"),
            }
        }

        log::info!("registered plugins: {:?}", self.kinds());
        loaded
    }

    pub fn resolve(&self, kind: &str) -> Result<PluginFactory, RegistryError> {
        self.plugins
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.plugins.contains_key(kind)
    }

    /// Registered identifiers, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.plugins.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.kinds())
            .finish()
    }
}

fn load_module(module: &PluginModule) -> Result<PluginFactory, RegistryError> {
    let entry = module
        .entry
        .ok_or_else(|| RegistryError::MissingEntryPoint(module.name.to_string()))?;
    entry()
}
