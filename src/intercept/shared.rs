//! Shared background interceptor strategy.

// self
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	channel::MessagePort,
	error::ChannelError,
	host,
	intercept::{InstalledInterception, InterceptionProxy, SharedInterceptor, StrategyKind},
	protocol::InterceptorCommand,
};

/// [`InterceptionProxy`] backed by a shared background interceptor.
pub struct SharedProxy {
	worker: Arc<dyn SharedInterceptor>,
}
impl SharedProxy {
	/// Wraps an activated interceptor.
	pub fn new(worker: Arc<dyn SharedInterceptor>) -> Self {
		Self { worker }
	}
}
impl InterceptionProxy for SharedProxy {
	fn kind(&self) -> StrategyKind {
		StrategyKind::Shared
	}

	fn tokens_renewed(&self, resource_server: &ResourceServerId) -> Result<(), ChannelError> {
		let message =
			InterceptorCommand::TokensRenewed { resource_server: resource_server.clone() }.encode()?;

		self.worker.post(message, Vec::new())
	}
}
impl Debug for SharedProxy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SharedProxy(..)")
	}
}

/// Waits for `worker` to take control, hands it the resource servers and its event port, and
/// waits for its first answer, which proves the event port is wired.
pub(crate) async fn install(
	worker: Arc<dyn SharedInterceptor>,
	resource_servers: Vec<ResourceServerId>,
	mut events: MessagePort,
	interceptor_port: MessagePort,
	timeout: Duration,
) -> Result<InstalledInterception> {
	let first_event = host::within_readiness("shared interceptor", timeout, async {
		worker.activated().await?;

		let configuration = InterceptorCommand::Configuration { resource_servers }.encode()?;

		worker.post(configuration, vec![interceptor_port])?;

		events.recv().await.ok_or_else(|| ChannelError::closed("interception").into())
	})
	.await?;

	Ok(InstalledInterception {
		proxy: Arc::new(SharedProxy::new(worker)),
		events,
		first_event: Some(first_event),
	})
}
