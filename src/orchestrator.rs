//! Batch orchestration.
//!
//! Resolves each configured site against the plugin registry, opens one
//! [`SiteSession`] per resolved site and runs them all concurrently. Every
//! resolved site yields exactly one [`CheckinResult`], in input order; a site
//! whose task fails or panics is reported as a failure without disturbing the
//! others.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use url::Url;

use crate::checkin::core::{
	CheckinResult, ReqwestSiteClient, SiteHttpClient, SiteHttpError, browser_headers,
};
use crate::checkin::registry::{PluginFactory, PluginRegistry};
use crate::checkin::session::{SiteError, SiteSession, panic_message};
use crate::config::{GlobalConfig, SiteConfig};
use crate::modules::events::{EventDispatcher, EventHandler, LoggingHandler, SiteEvent, SkippedEvent};

/// Builds the HTTP context of one session. Receives the plugin's origin so
/// preloaded cookies can be scoped to it.
pub type ClientFactory = Arc<
	dyn Fn(&GlobalConfig, &SiteConfig, &Url) -> Result<Arc<dyn SiteHttpClient>, SiteHttpError>
		+ Send
		+ Sync,
>;

/// Reqwest-backed factory: browser header set plus global overrides, the
/// configured timeout and the site's `cookies` option.
pub fn default_client_factory() -> ClientFactory {
	Arc::new(reqwest_client)
}

fn reqwest_client(
	global: &GlobalConfig,
	site: &SiteConfig,
	base_url: &Url,
) -> Result<Arc<dyn SiteHttpClient>, SiteHttpError> {
	let headers = browser_headers(&global.headers)?;
	let client = ReqwestSiteClient::new(headers, global.timeout(), &site.cookies(), base_url)?;
	Ok(Arc::new(client))
}

/// Fluent builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
	global: GlobalConfig,
	registry: Option<PluginRegistry>,
	client_factory: Option<ClientFactory>,
	handlers: Vec<Arc<dyn EventHandler>>,
	log_events: bool,
}

impl OrchestratorBuilder {
	pub fn new(global: GlobalConfig) -> Self {
		Self {
			global,
			registry: None,
			client_factory: None,
			handlers: Vec::new(),
			log_events: true,
		}
	}

	/// Use `registry` instead of the built-in plugin table.
	pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
		self.registry = Some(registry);
		self
	}

	pub fn with_client_factory(mut self, factory: ClientFactory) -> Self {
		self.client_factory = Some(factory);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	/// Do not install the default [`LoggingHandler`].
	pub fn disable_event_logging(mut self) -> Self {
		self.log_events = false;
		self
	}

	pub fn build(self) -> Orchestrator {
		let mut events = EventDispatcher::new();
		if self.log_events {
			events.register_handler(Arc::new(LoggingHandler));
		}
		for handler in self.handlers {
			events.register_handler(handler);
		}

		Orchestrator {
			global: Arc::new(self.global),
			registry: Arc::new(self.registry.unwrap_or_else(PluginRegistry::with_builtin)),
			client_factory: self.client_factory.unwrap_or_else(default_client_factory),
			events: Arc::new(events),
		}
	}
}

/// A site either still running or already settled during setup.
enum Pending {
	Running { site: String, handle: JoinHandle<CheckinResult> },
	Settled(CheckinResult),
}

/// Runs every configured site once per invocation.
pub struct Orchestrator {
	global: Arc<GlobalConfig>,
	registry: Arc<PluginRegistry>,
	client_factory: ClientFactory,
	events: Arc<EventDispatcher>,
}

impl Orchestrator {
	/// Orchestrator with the built-in plugins and the reqwest transport.
	pub fn new(global: GlobalConfig) -> Self {
		OrchestratorBuilder::new(global).build()
	}

	pub fn builder(global: GlobalConfig) -> OrchestratorBuilder {
		OrchestratorBuilder::new(global)
	}

	pub fn registry(&self) -> &PluginRegistry {
		&self.registry
	}

	/// Run all `sites` concurrently and collect one result per resolved site.
	///
	/// Sites whose type is not registered are logged and skipped. Must be
	/// called from within a tokio runtime.
	pub async fn run(&self, sites: &[SiteConfig]) -> Vec<CheckinResult> {
		let mut pending = Vec::with_capacity(sites.len());

		for site in sites {
			let name = site.display_name().to_string();

			let factory = match self.registry.resolve(&site.kind) {
				Ok(factory) => factory,
				Err(err) => {
					self.events.dispatch(SiteEvent::Skipped(SkippedEvent {
						site: name,
						kind: site.kind.clone(),
						reason: err.to_string(),
						timestamp: Utc::now(),
					}));
					continue;
				}
			};

			match self.open_session(&factory, site, &name) {
				Ok(session) => pending.push(Pending::Running {
					site: name,
					handle: tokio::spawn(session.run()),
				}),
				Err(err) => {
					self.events
						.dispatch(SiteEvent::error(&name, format!("session setup failed: {err}")));
					pending.push(Pending::Settled(CheckinResult::failure(
						name,
						format!("session setup failed: {err}"),
					)));
				}
			}
		}

		let mut results = Vec::with_capacity(pending.len());
		for entry in pending {
			let result = match entry {
				Pending::Settled(result) => result,
				Pending::Running { site, handle } => match handle.await {
					Ok(result) => result,
					Err(err) if err.is_panic() => {
						let reason = panic_message(err.into_panic());
						self.events
							.dispatch(SiteEvent::error(&site, format!("task panicked: {reason}")));
						CheckinResult::failure(site, format!("unexpected error: {reason}"))
					}
					Err(err) => CheckinResult::failure(site, format!("task aborted: {err}")),
				},
			};
			results.push(result);
		}

		let succeeded = results.iter().filter(|result| result.success).count();
		log::info!(
			"check-in finished: {succeeded}/{} succeeded ({} configured)",
			results.len(),
			sites.len()
		);
		results
	}

	fn open_session(
		&self,
		factory: &PluginFactory,
		site: &SiteConfig,
		name: &str,
	) -> Result<SiteSession, SiteError> {
		let plugin = factory(&self.global, site)?;
		let http = (self.client_factory)(&self.global, site, plugin.base_url())?;

		Ok(SiteSession::new(
			name,
			self.global.clone(),
			http,
			plugin,
			self.events.clone(),
		))
	}
}
