//! Background Auth Context Adapter: the coordinator's channel to the context that talks to the
//! identity provider.
//!
//! [`AuthChannel`] is the outbound half. It attaches the context, runs the configuration
//! handshake that proves readiness, and posts commands, always addressed to the redirect
//! target's origin. [`BackgroundAuthAdapter`] is the inbound half. It drops every message
//! whose origin is not the redirect target's, decodes the rest into
//! [`AuthNotification`]s, and reacts to them.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, ResourceServerId},
	channel::{MessageChannel, WindowMessage},
	config::Config,
	error::ChannelError,
	governor::{RenewalDispatch, RenewalGovernor},
	host::{self, IsolatedContext, Navigator},
	intercept::InterceptionProxy,
	ledger::{LedgerKey, SessionLedger},
	obs::{self, EventKind, EventOutcome},
	protocol::{AuthCommand, AuthNotification},
};

/// Callback fired whenever tokens are available, initially and after interactive login.
pub type TokensAvailableHandler = Arc<dyn Fn(Option<IdTokenClaims>) + Send + Sync>;
/// Callback fired when the provider requires user interaction.
pub type InteractionRequiredHandler = Arc<dyn Fn(&Url, Option<&Value>) + Send + Sync>;

/// Caller-supplied reactions to background auth notifications.
#[derive(Clone)]
pub struct Handlers {
	/// Required tokens-available callback.
	pub tokens_available: TokensAvailableHandler,
	/// Optional interaction-required callback; without one the page redirects to the provider.
	pub interaction_required: Option<InteractionRequiredHandler>,
}
impl Handlers {
	/// Creates handlers with the required tokens-available callback.
	pub fn new<F>(tokens_available: F) -> Self
	where
		F: 'static + Fn(Option<IdTokenClaims>) + Send + Sync,
	{
		Self { tokens_available: Arc::new(tokens_available), interaction_required: None }
	}

	/// Replaces the default redirect with a caller-supplied interaction handler.
	pub fn with_interaction_required<F>(mut self, interaction_required: F) -> Self
	where
		F: 'static + Fn(&Url, Option<&Value>) + Send + Sync,
	{
		self.interaction_required = Some(Arc::new(interaction_required));

		self
	}
}
impl Debug for Handlers {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Handlers")
			.field("interaction_required_set", &self.interaction_required.is_some())
			.finish()
	}
}

/// Outbound half of the adapter.
pub struct AuthChannel {
	context: Arc<dyn IsolatedContext>,
	config: Arc<Config>,
	origin: Origin,
}
impl AuthChannel {
	const LABEL: &'static str = "background auth";

	/// Creates a channel to `context`, addressed to the configured redirect origin.
	pub fn new(context: Arc<dyn IsolatedContext>, config: Arc<Config>) -> Self {
		let origin = config.redirect_origin();

		Self { context, config, origin }
	}

	/// Starts loading the redirect target into the context.
	pub fn attach(&self) -> Result<()> {
		Ok(self.context.attach(&self.config.redirect_uri)?)
	}

	/// Waits until the context loaded and acknowledged the configuration, bounded by the
	/// configured readiness timeout.
	pub async fn await_ready(&self) -> Result<()> {
		host::within_readiness(Self::LABEL, self.config.readiness_timeout, async {
			self.context.loaded().await?;

			let (mut reply, remote) = MessageChannel::new();
			let message = AuthCommand::Configure { config: &self.config }.encode()?;

			self.context.post(message, &self.origin, vec![remote])?;
			reply.recv().await.ok_or_else(|| ChannelError::closed(Self::LABEL))?;

			Ok(())
		})
		.await
	}

	/// Asks for currently available token data; the answer arrives as a notification.
	pub fn get_available_data(&self) -> Result<()> {
		self.send(AuthCommand::GetAvailableData { config: &self.config })
	}

	/// Asks for a fresh access token for `resource_server`.
	pub fn get_fresh_token(&self, resource_server: &ResourceServerId) -> Result<()> {
		self.send(AuthCommand::GetFreshAccessToken { config: &self.config, resource_server })
	}

	/// Asks the context to log out.
	pub fn logout(&self) -> Result<()> {
		self.send(AuthCommand::Logout { config: &self.config })
	}

	fn send(&self, command: AuthCommand<'_>) -> Result<()> {
		let message = command.encode()?;

		Ok(self.context.post(message, &self.origin, Vec::new())?)
	}
}
impl RenewalDispatch for AuthChannel {
	fn dispatch_renewal(&self, resource_server: &ResourceServerId) -> Result<()> {
		self.get_fresh_token(resource_server)
	}
}
impl Debug for AuthChannel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthChannel").field("origin", &self.origin).finish()
	}
}

/// Inbound half of the adapter.
pub struct BackgroundAuthAdapter {
	config: Arc<Config>,
	origin: Origin,
	handlers: Handlers,
	governor: Arc<RenewalGovernor>,
	ledger: Arc<dyn SessionLedger>,
	navigator: Arc<dyn Navigator>,
	proxy: RwLock<Option<Arc<dyn InterceptionProxy>>>,
	logout_waiter: Mutex<Option<oneshot::Sender<()>>>,
}
impl BackgroundAuthAdapter {
	/// Creates the inbound adapter.
	pub fn new(
		config: Arc<Config>,
		handlers: Handlers,
		governor: Arc<RenewalGovernor>,
		ledger: Arc<dyn SessionLedger>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		let origin = config.redirect_origin();

		Self {
			config,
			origin,
			handlers,
			governor,
			ledger,
			navigator,
			proxy: RwLock::new(None),
			logout_waiter: Mutex::new(None),
		}
	}

	/// Registers the installed interception strategy, which renewal completions are relayed to.
	pub fn install_proxy(&self, proxy: Arc<dyn InterceptionProxy>) {
		*self.proxy.write() = Some(proxy);
	}

	/// Arms the logout acknowledgement and returns the receiver that resolves with it.
	pub fn expect_logout(&self) -> oneshot::Receiver<()> {
		let (tx, rx) = oneshot::channel();

		*self.logout_waiter.lock() = Some(tx);

		rx
	}

	/// Drops an armed logout acknowledgement so its receiver fails instead of hanging.
	pub fn abandon_logout(&self) {
		self.logout_waiter.lock().take();
	}

	/// Filters and decodes a message posted to the hosting page.
	///
	/// Messages from any origin other than the redirect target's, unknown tags, and malformed
	/// payloads yield `None`.
	pub fn accept(&self, message: WindowMessage) -> Option<AuthNotification> {
		if message.origin != self.origin {
			obs::record_event(EventKind::WindowMessage, EventOutcome::Ignored);
			obs::trace_debug(
				EventKind::WindowMessage,
				&format_args!("dropped message from foreign origin {}", message.origin.ascii_serialization()),
			);

			return None;
		}

		match AuthNotification::decode(message.data) {
			Ok(Some(notification)) => Some(notification),
			Ok(None) => {
				obs::record_event(EventKind::WindowMessage, EventOutcome::Ignored);
				obs::trace_debug(EventKind::WindowMessage, &"dropped message with an unknown tag");

				None
			},
			Err(e) => {
				obs::record_event(EventKind::WindowMessage, EventOutcome::Failure);
				obs::trace_warn(EventKind::WindowMessage, &e);

				None
			},
		}
	}

	/// Reacts to a decoded notification.
	pub async fn handle(&self, notification: AuthNotification) -> Result<()> {
		match notification {
			AuthNotification::TokensAvailable { id_token_claims, resource_server: None } =>
				self.on_tokens_available(id_token_claims).await,
			AuthNotification::TokensAvailable { resource_server: Some(resource_server), .. } =>
				self.on_tokens_renewed(&resource_server).await,
			AuthNotification::InteractionRequired { authorization_url, error } =>
				self.on_interaction_required(&authorization_url, error.as_ref()).await,
			AuthNotification::LogoutComplete => {
				let waiter = self.logout_waiter.lock().take();

				match waiter {
					Some(tx) => {
						let _ = tx.send(());
					},
					None => obs::trace_debug(
						EventKind::LogoutComplete,
						&"logout completion arrived with no logout pending",
					),
				}

				Ok(())
			},
		}
	}

	async fn on_tokens_available(&self, claims: Option<IdTokenClaims>) -> Result<()> {
		let key = self.fragment_key();

		if let Some(fragment) = self.ledger.remove(&key).await? {
			self.navigator.set_fragment(&fragment);
		}

		(self.handlers.tokens_available)(claims);

		Ok(())
	}

	async fn on_tokens_renewed(&self, resource_server: &ResourceServerId) -> Result<()> {
		self.governor.on_renewed().await?;

		let proxy = self.proxy.read().clone();

		match proxy {
			Some(proxy) => proxy.tokens_renewed(resource_server)?,
			None => obs::trace_debug(
				EventKind::TokensAvailable,
				&format_args!("renewal for {resource_server} completed before interception was installed"),
			),
		}

		Ok(())
	}

	async fn on_interaction_required(&self, authorization_url: &Url, error: Option<&Value>) -> Result<()> {
		if let Some(handler) = &self.handlers.interaction_required {
			handler(authorization_url, error);

			return Ok(());
		}

		let fragment = self.navigator.fragment();

		if !fragment.trim_start_matches('#').is_empty() {
			self.ledger.set(&self.fragment_key(), fragment).await?;
		}

		self.navigator.redirect(authorization_url);

		Ok(())
	}

	fn fragment_key(&self) -> LedgerKey {
		LedgerKey::SavedFragment(self.config.client_id.clone())
	}
}
impl Debug for BackgroundAuthAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BackgroundAuthAdapter")
			.field("origin", &self.origin)
			.field("handlers", &self.handlers)
			.field("proxy_installed", &self.proxy.read().is_some())
			.finish()
	}
}
