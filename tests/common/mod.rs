#![allow(dead_code)]

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::{Origin, Url};
// self
use appauth_coordinator::{
	Coordinator, Handlers, HostEnvironment,
	auth::{IdTokenClaims, ResourceServerId},
	channel::{WindowMessage, WindowSender, window_channel},
	config::Config,
	host::memory::{
		MemoryContext, MemoryDirectFactory, MemoryNavigator, MemorySharedRegistry,
	},
	intercept::InterceptionCapabilities,
	ledger::MemoryLedger,
};

pub const API1: &str = "https://api1.example.com/";
pub const API2: &str = "https://api2.example.com/";

pub const DOCUMENT: &str = r#"{
	"clientId": "spa-client",
	"authorizationEndpoint": "https://idp.example.com/authorize",
	"tokenEndpoint": "https://idp.example.com/token",
	"resourceServers": {
		"https://api1.example.com/": "read",
		"https://api2.example.com/": "write"
	},
	"readinessTimeout": 0.25
}"#;

pub fn app_location() -> Url {
	Url::parse("https://app.example.com/spa/index.html")
		.expect("Application location fixture should parse.")
}

pub fn config() -> Config {
	Config::from_json_str(app_location(), DOCUMENT).expect("Configuration fixture should parse.")
}

pub fn rs(raw: &str) -> ResourceServerId {
	ResourceServerId::new(raw).expect("Resource server fixture should be valid.")
}

pub fn foreign_origin() -> Origin {
	Url::parse("https://evil.example.com/").expect("Foreign origin fixture should parse.").origin()
}

/// Which interception capabilities the simulated host offers.
#[derive(Clone, Copy, Debug)]
pub enum Interception {
	Shared,
	FailingSharedWithDirect,
	SilentShared,
	Direct,
	None,
}

/// Simulated browser host plus handles for playing the other side of every channel.
pub struct Harness {
	pub config: Config,
	pub auth: Arc<MemoryContext>,
	pub request: Arc<MemoryContext>,
	pub navigator: Arc<MemoryNavigator>,
	pub ledger: MemoryLedger,
	pub window: WindowSender,
	pub shared: Option<Arc<MemorySharedRegistry>>,
	pub direct: Option<Arc<MemoryDirectFactory>>,
	pub claims: Arc<Mutex<Vec<Option<IdTokenClaims>>>>,
	origin: Origin,
}
impl Harness {
	pub fn new(config: Config, interception: Interception) -> (Self, HostEnvironment) {
		Self::with_contexts(config, interception, |context| context, |context| context, "")
	}

	pub fn with_contexts(
		config: Config,
		interception: Interception,
		auth: impl FnOnce(MemoryContext) -> MemoryContext,
		request: impl FnOnce(MemoryContext) -> MemoryContext,
		fragment: &str,
	) -> (Self, HostEnvironment) {
		let origin = config.redirect_origin();
		let auth = Arc::new(auth(MemoryContext::new("background auth", origin.clone())));
		let request = Arc::new(request(MemoryContext::new("request routing", origin.clone())));
		let navigator = Arc::new(MemoryNavigator::with_fragment(fragment));
		let ledger = MemoryLedger::default();
		let (window, window_rx) = window_channel();
		let (shared, direct) = match interception {
			Interception::Shared => (Some(Arc::new(MemorySharedRegistry::new())), None),
			Interception::FailingSharedWithDirect => (
				Some(Arc::new(MemorySharedRegistry::failing())),
				Some(Arc::new(MemoryDirectFactory::default())),
			),
			Interception::SilentShared => (Some(Arc::new(MemorySharedRegistry::silent())), None),
			Interception::Direct => (None, Some(Arc::new(MemoryDirectFactory::default()))),
			Interception::None => (None, None),
		};
		let mut capabilities = InterceptionCapabilities::default();

		if let Some(shared) = &shared {
			capabilities = capabilities.with_shared(shared.clone());
		}
		if let Some(direct) = &direct {
			capabilities = capabilities.with_direct(direct.clone());
		}

		let env = HostEnvironment {
			auth_context: auth.clone(),
			request_context: request.clone(),
			navigator: navigator.clone(),
			ledger: Arc::new(ledger.clone()),
			window: window_rx,
			interception: capabilities,
		};
		let harness = Self {
			config,
			auth,
			request,
			navigator,
			ledger,
			window,
			shared,
			direct,
			claims: Arc::new(Mutex::new(Vec::new())),
			origin,
		};

		(harness, env)
	}

	pub fn handlers(&self) -> Handlers {
		let claims = self.claims.clone();

		Handlers::new(move |c| claims.lock().push(c))
	}

	pub async fn start(self, env: HostEnvironment) -> (Self, Coordinator) {
		let coordinator = Coordinator::start(self.config.clone(), self.handlers(), env)
			.await
			.expect("Coordinator should bootstrap.");

		(self, coordinator)
	}

	/// Posts `data` to the page as the background auth context would.
	pub fn notify(&self, data: Value) {
		self.notify_from(self.origin.clone(), data);
	}

	pub fn notify_from(&self, origin: Origin, data: Value) {
		self.window.send(WindowMessage::new(origin, data)).expect("Page channel should be open.");
	}

	/// Emits an interceptor event through whichever strategy was installed.
	pub fn intercept(&self, data: Value) {
		let result = match (&self.shared, &self.direct) {
			(_, Some(direct)) if direct.creations() > 0 => direct.emit(data, Vec::new()),
			(Some(shared), _) => shared.interceptor().emit(data, Vec::new()),
			_ => panic!("No interceptor is installed."),
		};

		result.expect("Interceptor event should be delivered.");
	}

	pub fn renew(&self, resource_server: &str) {
		self.intercept(json!({ "message": "renewTokens", "resourceServer": resource_server }));
	}

	pub fn complete_renewal(&self, resource_server: &str) {
		self.notify(json!({ "message": "appAuth-tokensAvailable", "resourceServer": resource_server }));
	}

	pub fn renewal_dispatches(&self) -> Vec<String> {
		self.auth
			.tagged("appAuth-getFreshAccessToken")
			.iter()
			.filter_map(|message| message["resourceServer"].as_str().map(str::to_owned))
			.collect()
	}
}

/// Polls `check` until it holds, failing the test after one second.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
	for _ in 0..200 {
		if check() {
			return;
		}

		tokio::time::sleep(StdDuration::from_millis(5)).await;
	}

	panic!("Timed out waiting for {what}.");
}

/// Gives spawned tasks a chance to run.
pub async fn settle() {
	tokio::time::sleep(StdDuration::from_millis(30)).await;
}
