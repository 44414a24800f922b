// crates.io
use tokio::sync::oneshot;
// self
use super::Shared;
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	channel::{MessagePort, PortMessage, WindowMessage, WindowReceiver},
	intercept::InstalledInterception,
	obs::{self, EventKind, EventOutcome},
	protocol::{AuthNotification, InterceptEvent, RequestRoutingCommand},
};

const STAGE: &str = "event_loop";

/// Reacts to page messages and interceptor events until the page channel closes or the
/// coordinator logs out.
pub(super) struct EventLoop {
	shared: Arc<Shared>,
	window: WindowReceiver,
	events: MessagePort,
	first_event: Option<PortMessage>,
	stop: oneshot::Receiver<()>,
}
impl EventLoop {
	pub(super) fn new(
		shared: Arc<Shared>,
		window: WindowReceiver,
		installed: InstalledInterception,
		stop: oneshot::Receiver<()>,
	) -> Self {
		Self { shared, window, events: installed.events, first_event: installed.first_event, stop }
	}

	/// Runs until stopped or until the page channel closes, then hands the page channel back.
	pub(super) async fn run(mut self) -> WindowReceiver {
		if let Some(event) = self.first_event.take() {
			self.on_intercept(event).await;
		}

		let mut events_open = true;

		loop {
			tokio::select! {
				_ = &mut self.stop => break,
				message = self.window.recv() => match message {
					Some(message) => self.on_window(message).await,
					None => break,
				},
				event = self.events.recv(), if events_open => match event {
					Some(event) => self.on_intercept(event).await,
					None => {
						events_open = false;

						obs::trace_warn(EventKind::MakeResourceRequest, &"interceptor channel closed");
					},
				},
			}
		}

		obs::trace_debug(EventKind::WindowMessage, &"event loop stopped");
		self.shared.adapter.abandon_logout();

		self.window
	}

	async fn on_window(&self, message: WindowMessage) {
		let Some(notification) = self.shared.adapter.accept(message) else {
			return;
		};
		let kind = match &notification {
			AuthNotification::TokensAvailable { .. } => EventKind::TokensAvailable,
			AuthNotification::InteractionRequired { .. } => EventKind::InteractionRequired,
			AuthNotification::LogoutComplete => EventKind::LogoutComplete,
		};

		let _ = obs::observe(kind, STAGE, self.shared.adapter.handle(notification)).await;
	}

	async fn on_intercept(&self, message: PortMessage) {
		let event = match InterceptEvent::decode(message.data) {
			Ok(Some(event)) => event,
			Ok(None) => {
				obs::record_event(EventKind::MakeResourceRequest, EventOutcome::Ignored);

				return;
			},
			Err(e) => {
				obs::record_event(EventKind::MakeResourceRequest, EventOutcome::Failure);
				obs::trace_warn(EventKind::MakeResourceRequest, &e);

				return;
			},
		};

		match event {
			InterceptEvent::MakeResourceRequest { request } => {
				let _ = obs::observe(EventKind::MakeResourceRequest, STAGE, async {
					self.relay_request(&request, message.ports)
				})
				.await;
			},
			InterceptEvent::RenewTokens { resource_server } => {
				let _ = obs::observe(EventKind::RenewTokens, STAGE, self.renew(resource_server)).await;
			},
		}
	}

	fn relay_request(&self, request: &Value, ports: Vec<MessagePort>) -> Result<()> {
		let config = &self.shared.config;
		let message = RequestRoutingCommand::MakeResourceRequest { request, config }.encode()?;

		Ok(self.shared.request_context.post(message, &config.redirect_origin(), ports)?)
	}

	async fn renew(&self, resource_server: ResourceServerId) -> Result<()> {
		let governor = self.shared.governor.clone();
		let wait = governor.request_slot(&resource_server).await?;

		if wait.is_granted() {
			governor.dispatch_if_due(&resource_server).await?;

			return Ok(());
		}

		obs::trace_debug(
			EventKind::RenewTokens,
			&format_args!("renewal for {resource_server} queued behind the current slot holder"),
		);

		// The holder's completion arrives through this loop, so the wait must not block it.
		tokio::spawn(obs::observe(EventKind::RenewTokens, STAGE, async move {
			wait.acquired().await?;
			governor.dispatch_if_due(&resource_server).await.map(|_| ())
		}));

		Ok(())
	}
}
