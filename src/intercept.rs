//! Interception Proxy Selector: installs exactly one request-interception strategy.
//!
//! Two strategies exist. The shared background interceptor (a worker controlling the page) is
//! preferred; when the host cannot register one, or registration fails, the selector falls back
//! to a direct interceptor built in the page itself. Which strategies a host offers is stated
//! explicitly through [`InterceptionCapabilities`] rather than detected. Either way the installed
//! strategy emits the same [`InterceptEvent`](crate::protocol::InterceptEvent)s on one port.

pub mod direct;
pub mod shared;

pub use shared::SharedProxy;

// self
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	channel::{MessageChannel, MessagePort, PortMessage},
	error::{ChannelError, ConfigError},
	host::ContextFuture,
	obs::{self, EventKind},
};

/// Interception strategy kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
	/// Shared background interceptor.
	Shared,
	/// Direct in-page interceptor.
	Direct,
}
impl StrategyKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StrategyKind::Shared => "shared",
			StrategyKind::Direct => "direct",
		}
	}
}
impl Display for StrategyKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Handle to the installed interception strategy.
pub trait InterceptionProxy
where
	Self: Send + Sync,
{
	/// Strategy behind this handle.
	fn kind(&self) -> StrategyKind;

	/// Tells the interceptor that fresh tokens are ready for `resource_server`.
	fn tokens_renewed(&self, resource_server: &ResourceServerId) -> Result<(), ChannelError>;
}

/// Host capability for registering a shared background interceptor.
pub trait SharedInterceptorRegistry
where
	Self: Send + Sync,
{
	/// Registers the interceptor script; failures trigger the direct fallback.
	fn register<'a>(&'a self, script: &'a Url) -> ContextFuture<'a, Arc<dyn SharedInterceptor>>;
}

/// A registered shared background interceptor.
pub trait SharedInterceptor
where
	Self: Send + Sync,
{
	/// Resolves once the interceptor controls the page.
	fn activated(&self) -> ContextFuture<'_, ()>;

	/// Posts a message to the interceptor.
	fn post(&self, message: Value, ports: Vec<MessagePort>) -> Result<(), ChannelError>;
}

/// Host capability for building a direct in-page interceptor.
pub trait DirectInterceptorFactory
where
	Self: Send + Sync,
{
	/// Builds an interceptor for `resource_servers` that emits events on `port`.
	fn create(
		&self,
		resource_servers: Vec<ResourceServerId>,
		port: MessagePort,
	) -> Result<Arc<dyn InterceptionProxy>, ChannelError>;
}

/// Interception capabilities offered by the host.
#[derive(Clone, Default)]
pub struct InterceptionCapabilities {
	/// Shared background interceptor support, if any.
	pub shared: Option<Arc<dyn SharedInterceptorRegistry>>,
	/// Direct interceptor implementation, if any.
	pub direct: Option<Arc<dyn DirectInterceptorFactory>>,
}
impl InterceptionCapabilities {
	/// Offers a shared background interceptor registry.
	pub fn with_shared(mut self, registry: Arc<dyn SharedInterceptorRegistry>) -> Self {
		self.shared = Some(registry);

		self
	}

	/// Offers a direct interceptor implementation.
	pub fn with_direct(mut self, factory: Arc<dyn DirectInterceptorFactory>) -> Self {
		self.direct = Some(factory);

		self
	}
}
impl Debug for InterceptionCapabilities {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InterceptionCapabilities")
			.field("shared", &self.shared.is_some())
			.field("direct", &self.direct.is_some())
			.finish()
	}
}

/// The strategy chosen by [`InterceptionSelector::select_and_install`].
pub struct InstalledInterception {
	/// Handle used to notify the interceptor about renewed tokens.
	pub proxy: Arc<dyn InterceptionProxy>,
	/// Port on which the interceptor emits events.
	pub events: MessagePort,
	/// First event received during the shared handshake; it still needs handling.
	pub first_event: Option<PortMessage>,
}
impl Debug for InstalledInterception {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InstalledInterception")
			.field("kind", &self.proxy.kind())
			.field("first_event", &self.first_event)
			.finish()
	}
}

/// Chooses and installs the interception strategy.
#[derive(Debug)]
pub struct InterceptionSelector {
	capabilities: InterceptionCapabilities,
	script: Url,
	readiness_timeout: Duration,
}
impl InterceptionSelector {
	/// Creates a selector for the given capabilities and shared interceptor script.
	pub fn new(capabilities: InterceptionCapabilities, script: Url, readiness_timeout: Duration) -> Self {
		Self { capabilities, script, readiness_timeout }
	}

	/// Installs exactly one strategy for `resource_servers`.
	///
	/// The shared interceptor is tried at most once. A registration failure falls back to the
	/// direct interceptor; a shared interceptor that registers but never answers the
	/// configuration message fails with [`Error::ReadinessTimeout`] instead.
	pub async fn select_and_install(
		&self,
		resource_servers: Vec<ResourceServerId>,
	) -> Result<InstalledInterception> {
		let (events, interceptor_port) = MessageChannel::new();

		if let Some(registry) = &self.capabilities.shared {
			match registry.register(&self.script).await {
				Ok(worker) =>
					return shared::install(
						worker,
						resource_servers,
						events,
						interceptor_port,
						self.readiness_timeout,
					)
					.await,
				Err(e) => obs::trace_warn(
					EventKind::Bootstrap,
					&format_args!("shared interceptor registration failed, using direct: {e}"),
				),
			}
		}

		let factory = self.capabilities.direct.as_ref().ok_or(ConfigError::NoInterceptionStrategy)?;

		direct::install(factory.as_ref(), resource_servers, events, interceptor_port)
	}
}
