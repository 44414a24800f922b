//! Coordinator: the top-level state machine wiring ledger, governor, adapter, and selector.
//!
//! ```text
//! Uninitialized -> AttachingContexts -> AwaitingReadiness -> SelectingInterceptionStrategy -> Ready
//! Ready -> LoggingOut -> Uninitialized
//! ```
//!
//! [`Coordinator::bootstrap`] resolves only on entering `Ready`: both hidden contexts have
//! loaded, the background auth context has acknowledged its configuration, and exactly one
//! interception strategy is installed. From then on a spawned event loop reacts to messages from
//! the hosting page and from the interceptor. A failed bootstrap and a finished logout both
//! return to `Uninitialized`, from which `bootstrap` may run again.

mod event_loop;

pub use crate::adapter::{Handlers, InteractionRequiredHandler, TokensAvailableHandler};

// crates.io
use tokio::{sync::oneshot, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	adapter::{AuthChannel, BackgroundAuthAdapter},
	channel::WindowReceiver,
	config::Config,
	error::ChannelError,
	governor::RenewalGovernor,
	host::{self, IsolatedContext, Navigator},
	intercept::{InstalledInterception, InterceptionCapabilities, InterceptionSelector, StrategyKind},
	ledger::{LedgerKey, SessionLedger},
	obs::{self, EventKind, EventOutcome},
};
use event_loop::EventLoop;

/// Lifecycle states of a [`Coordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
	/// Not bootstrapped, or logged out.
	Uninitialized,
	/// Hidden contexts are being attached.
	AttachingContexts,
	/// Waiting for both contexts to signal readiness.
	AwaitingReadiness,
	/// Installing the interception strategy.
	SelectingInterceptionStrategy,
	/// Fully operational.
	Ready,
	/// Waiting for the logout acknowledgement.
	LoggingOut,
}
impl CoordinatorState {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CoordinatorState::Uninitialized => "uninitialized",
			CoordinatorState::AttachingContexts => "attaching_contexts",
			CoordinatorState::AwaitingReadiness => "awaiting_readiness",
			CoordinatorState::SelectingInterceptionStrategy => "selecting_interception_strategy",
			CoordinatorState::Ready => "ready",
			CoordinatorState::LoggingOut => "logging_out",
		}
	}
}
impl Display for CoordinatorState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Everything the coordinator needs from its host.
pub struct HostEnvironment {
	/// Context running the identity-provider exchange.
	pub auth_context: Arc<dyn IsolatedContext>,
	/// Context making token-bearing requests on behalf of the interceptor.
	pub request_context: Arc<dyn IsolatedContext>,
	/// Navigation of the hosting page.
	pub navigator: Arc<dyn Navigator>,
	/// Session-scoped ledger.
	pub ledger: Arc<dyn SessionLedger>,
	/// Messages posted to the hosting page.
	pub window: WindowReceiver,
	/// Interception strategies the host supports.
	pub interception: InterceptionCapabilities,
}
impl Debug for HostEnvironment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HostEnvironment").field("interception", &self.interception).finish()
	}
}

struct RunningLoop {
	stop: oneshot::Sender<()>,
	handle: JoinHandle<WindowReceiver>,
}

struct Shared {
	config: Arc<Config>,
	state: RwLock<CoordinatorState>,
	auth: Arc<AuthChannel>,
	adapter: Arc<BackgroundAuthAdapter>,
	governor: Arc<RenewalGovernor>,
	request_context: Arc<dyn IsolatedContext>,
	ledger: Arc<dyn SessionLedger>,
	interception: InterceptionCapabilities,
	strategy: RwLock<Option<StrategyKind>>,
	// Parked here whenever no event loop owns it.
	window: Mutex<Option<WindowReceiver>>,
	event_loop: Mutex<Option<RunningLoop>>,
}

/// Coordinates silent token renewal for one application page.
///
/// Cheap to clone; clones share the same state machine.
#[derive(Clone)]
pub struct Coordinator {
	shared: Arc<Shared>,
}
impl Coordinator {
	/// Wires a coordinator in the `Uninitialized` state. Nothing is attached until
	/// [`bootstrap`](Self::bootstrap).
	pub fn new(config: Config, handlers: Handlers, env: HostEnvironment) -> Self {
		let config = Arc::new(config);
		let auth = Arc::new(AuthChannel::new(env.auth_context, config.clone()));
		let governor = Arc::new(RenewalGovernor::new(
			env.ledger.clone(),
			auth.clone(),
			config.renew_cooldown,
		));
		let adapter = Arc::new(BackgroundAuthAdapter::new(
			config.clone(),
			handlers,
			governor.clone(),
			env.ledger.clone(),
			env.navigator,
		));

		Self {
			shared: Arc::new(Shared {
				config,
				state: RwLock::new(CoordinatorState::Uninitialized),
				auth,
				adapter,
				governor,
				request_context: env.request_context,
				ledger: env.ledger,
				interception: env.interception,
				strategy: RwLock::new(None),
				window: Mutex::new(Some(env.window)),
				event_loop: Mutex::new(None),
			}),
		}
	}

	/// Builds a coordinator and bootstraps it.
	pub async fn start(config: Config, handlers: Handlers, env: HostEnvironment) -> Result<Self> {
		let coordinator = Self::new(config, handlers, env);

		coordinator.bootstrap().await?;

		Ok(coordinator)
	}

	/// Attaches both hidden contexts, waits for their readiness, installs the interception
	/// strategy, and starts the event loop. Resolves once the coordinator is `Ready`.
	///
	/// Callable from `Uninitialized`: initially, after a failed attempt, or after logout.
	pub async fn bootstrap(&self) -> Result<()> {
		let result = obs::observe(EventKind::Bootstrap, "bootstrap", self.run_bootstrap()).await;

		if matches!(&result, Err(e) if !matches!(e, Error::InvalidState { .. })) {
			self.transition(CoordinatorState::Uninitialized);
		}

		result
	}

	/// Asks the background auth context for currently available token data.
	///
	/// Fire-and-forget: the answer arrives through the tokens-available handler and carries no
	/// freshness guarantee.
	pub fn get_tokens(&self) -> Result<()> {
		const KIND: EventKind = EventKind::GetTokens;

		self.ensure_state(CoordinatorState::Ready, "get_tokens")?;
		obs::record_event(KIND, EventOutcome::Attempt);

		let result = self.shared.auth.get_available_data();

		obs::record_event(
			KIND,
			if result.is_ok() { EventOutcome::Success } else { EventOutcome::Failure },
		);

		result
	}

	/// Logs out and resolves once the background auth context confirms it.
	///
	/// Once the command is sent the coordinator always ends `Uninitialized` with its event loop
	/// stopped, whether the acknowledgement arrives or its channel closes first.
	pub async fn logout(&self) -> Result<()> {
		obs::observe(EventKind::Logout, "logout", self.run_logout()).await
	}

	/// Current lifecycle state.
	pub fn state(&self) -> CoordinatorState {
		*self.shared.state.read()
	}

	/// Interception strategy installed during bootstrap.
	pub fn strategy(&self) -> Option<StrategyKind> {
		*self.shared.strategy.read()
	}

	/// Configuration this coordinator was built with.
	pub fn config(&self) -> &Config {
		&self.shared.config
	}

	/// Renewal governor, for diagnostics.
	pub fn governor(&self) -> &RenewalGovernor {
		&self.shared.governor
	}

	async fn run_bootstrap(&self) -> Result<()> {
		let shared = &self.shared;
		let window = {
			let mut state = shared.state.write();

			if *state != CoordinatorState::Uninitialized {
				return Err(Error::InvalidState { state: *state, operation: "bootstrap" });
			}

			let window = shared
				.window
				.lock()
				.take()
				.ok_or(Error::InvalidState { state: *state, operation: "bootstrap" })?;

			*state = CoordinatorState::AttachingContexts;

			window
		};
		let installed = match self.prepare().await {
			Ok(installed) => installed,
			Err(e) => {
				*shared.window.lock() = Some(window);

				return Err(e);
			},
		};

		*shared.strategy.write() = Some(installed.proxy.kind());
		shared.adapter.install_proxy(installed.proxy.clone());

		let (stop, stopped) = oneshot::channel();
		let event_loop = EventLoop::new(shared.clone(), window, installed, stopped);

		*shared.event_loop.lock() =
			Some(RunningLoop { stop, handle: tokio::spawn(event_loop.run()) });

		self.transition(CoordinatorState::Ready);

		Ok(())
	}

	async fn prepare(&self) -> Result<InstalledInterception> {
		let shared = &self.shared;
		let config = &shared.config;

		shared.ledger.remove(&LedgerKey::RenewalSlot).await?;
		shared.auth.attach()?;
		shared.request_context.attach(&config.redirect_uri)?;

		self.transition(CoordinatorState::AwaitingReadiness);

		let request_ready =
			host::within_readiness("request routing", config.readiness_timeout, async {
				shared.request_context.loaded().await.map_err(Error::from)
			});

		tokio::try_join!(shared.auth.await_ready(), request_ready)?;

		self.transition(CoordinatorState::SelectingInterceptionStrategy);

		InterceptionSelector::new(
			shared.interception.clone(),
			config.interceptor_uri.clone(),
			config.readiness_timeout,
		)
		.select_and_install(config.resource_server_ids())
		.await
	}

	async fn run_logout(&self) -> Result<()> {
		let shared = &self.shared;

		{
			let mut state = shared.state.write();

			if *state != CoordinatorState::Ready {
				return Err(Error::InvalidState { state: *state, operation: "logout" });
			}

			*state = CoordinatorState::LoggingOut;
		}

		let acknowledged = shared.adapter.expect_logout();

		if let Err(e) = shared.auth.logout() {
			shared.adapter.abandon_logout();
			self.transition(CoordinatorState::Ready);

			return Err(e);
		}

		let acknowledgement =
			acknowledged.await.map_err(|_| Error::from(ChannelError::closed("background auth")));
		let teardown = self.teardown().await;

		acknowledgement.and(teardown)
	}

	/// Stops the event loop, reclaims the page channel, and clears renewal state.
	async fn teardown(&self) -> Result<()> {
		let shared = &self.shared;
		let running = shared.event_loop.lock().take();

		if let Some(RunningLoop { stop, handle }) = running {
			// The loop may already be gone if the page channel closed.
			let _ = stop.send(());

			match handle.await {
				Ok(window) => *shared.window.lock() = Some(window),
				Err(e) => obs::trace_warn(EventKind::Logout, &e),
			}
		}

		*shared.strategy.write() = None;

		let reset = shared.governor.reset().await;

		self.transition(CoordinatorState::Uninitialized);

		reset
	}

	fn ensure_state(&self, expected: CoordinatorState, operation: &'static str) -> Result<()> {
		let state = self.state();

		if state == expected { Ok(()) } else { Err(Error::InvalidState { state, operation }) }
	}

	fn transition(&self, next: CoordinatorState) {
		let previous = std::mem::replace(&mut *self.shared.state.write(), next);

		obs::trace_debug(EventKind::Bootstrap, &format_args!("state {previous} -> {next}"));
	}
}
impl Debug for Coordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("state", &self.state())
			.field("strategy", &self.strategy())
			.field("client_id", &self.shared.config.client_id)
			.finish()
	}
}
