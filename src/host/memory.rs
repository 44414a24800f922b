//! In-process host doubles for tests and non-browser demos.
//!
//! Each double records what the coordinator did to it and lets the caller play the other side
//! of the conversation: signal readiness, answer the configuration handshake, or emit
//! interceptor events.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use tokio::sync::{
	mpsc::{self, UnboundedReceiver, UnboundedSender},
	watch,
};
// self
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	channel::{MessagePort, PortMessage},
	error::ChannelError,
	host::{ContextFuture, IsolatedContext, Navigator},
	intercept::{
		DirectInterceptorFactory, InterceptionProxy, SharedInterceptor, SharedInterceptorRegistry,
		StrategyKind,
	},
	protocol::TAG_FIELD,
};

const CONFIGURE_TAG: &str = "appAuth-config";
const CONFIGURATION_TAG: &str = "configuration";

fn tag_of(message: &Value) -> Option<&str> {
	message.get(TAG_FIELD).and_then(Value::as_str)
}

/// Isolated context living in the current process.
pub struct MemoryContext {
	label: &'static str,
	origin: Origin,
	auto_load: bool,
	acknowledge_configuration: bool,
	attached: Mutex<Vec<Url>>,
	loaded: watch::Sender<bool>,
	history: Mutex<Vec<Value>>,
	dropped: AtomicUsize,
	inbox_tx: UnboundedSender<PortMessage>,
	inbox_rx: AsyncMutex<UnboundedReceiver<PortMessage>>,
}
impl MemoryContext {
	/// Creates a context serving `origin` that loads as soon as it is attached and answers the
	/// configuration handshake.
	pub fn new(label: &'static str, origin: Origin) -> Self {
		let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

		Self {
			label,
			origin,
			auto_load: true,
			acknowledge_configuration: true,
			attached: Mutex::new(Vec::new()),
			loaded: watch::Sender::new(false),
			history: Mutex::new(Vec::new()),
			dropped: AtomicUsize::new(0),
			inbox_tx,
			inbox_rx: AsyncMutex::new(inbox_rx),
		}
	}

	/// Defers readiness until [`signal_loaded`](Self::signal_loaded) is called.
	pub fn manual_load(mut self) -> Self {
		self.auto_load = false;

		self
	}

	/// Leaves configuration messages unanswered.
	pub fn without_configuration_ack(mut self) -> Self {
		self.acknowledge_configuration = false;

		self
	}

	/// Marks the context's document as loaded.
	pub fn signal_loaded(&self) {
		self.loaded.send_replace(true);
	}

	/// Origin the context serves.
	pub fn origin(&self) -> &Origin {
		&self.origin
	}

	/// Sources attached so far, oldest first.
	pub fn attached(&self) -> Vec<Url> {
		self.attached.lock().clone()
	}

	/// Every delivered message, oldest first.
	pub fn history(&self) -> Vec<Value> {
		self.history.lock().clone()
	}

	/// Delivered messages carrying the given tag.
	pub fn tagged(&self, tag: &str) -> Vec<Value> {
		self.history.lock().iter().filter(|message| tag_of(message) == Some(tag)).cloned().collect()
	}

	/// Number of messages dropped because they were addressed to another origin.
	pub fn dropped(&self) -> usize {
		self.dropped.load(Ordering::Relaxed)
	}

	/// Waits for the next delivered message together with its transferred ports.
	pub async fn next_message(&self) -> Option<PortMessage> {
		self.inbox_rx.lock().await.recv().await
	}
}
impl IsolatedContext for MemoryContext {
	fn attach(&self, src: &Url) -> Result<(), ChannelError> {
		self.attached.lock().push(src.clone());

		if self.auto_load {
			self.signal_loaded();
		}

		Ok(())
	}

	fn loaded(&self) -> ContextFuture<'_, ()> {
		let mut loaded = self.loaded.subscribe();

		Box::pin(async move {
			loaded.wait_for(|ready| *ready).await.map(|_| ()).map_err(|_| ChannelError::closed(self.label))
		})
	}

	fn post(
		&self,
		message: Value,
		target_origin: &Origin,
		ports: Vec<MessagePort>,
	) -> Result<(), ChannelError> {
		if *target_origin != self.origin {
			self.dropped.fetch_add(1, Ordering::Relaxed);

			return Ok(());
		}

		self.history.lock().push(message.clone());

		if self.acknowledge_configuration && tag_of(&message) == Some(CONFIGURE_TAG) {
			if let Some(reply) = ports.first() {
				reply.post(serde_json::json!({ "message": "configured" }), Vec::new())?;
			}
		}

		self.inbox_tx
			.send(PortMessage { data: message, ports })
			.map_err(|_| ChannelError::closed(self.label))
	}
}
impl Debug for MemoryContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryContext")
			.field("label", &self.label)
			.field("origin", &self.origin.ascii_serialization())
			.field("loaded", &*self.loaded.borrow())
			.finish()
	}
}

/// Page navigation recorded in memory.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
	fragment: Mutex<String>,
	redirects: Mutex<Vec<Url>>,
}
impl MemoryNavigator {
	/// Starts on a page whose fragment is `fragment`.
	pub fn with_fragment(fragment: impl Into<String>) -> Self {
		Self { fragment: Mutex::new(fragment.into()), redirects: Mutex::new(Vec::new()) }
	}

	/// Full-page redirects performed so far.
	pub fn redirects(&self) -> Vec<Url> {
		self.redirects.lock().clone()
	}
}
impl Navigator for MemoryNavigator {
	fn fragment(&self) -> String {
		self.fragment.lock().clone()
	}

	fn set_fragment(&self, fragment: &str) {
		*self.fragment.lock() = fragment.to_owned();
	}

	fn redirect(&self, url: &Url) {
		self.redirects.lock().push(url.clone());
	}
}

/// Shared interceptor registry living in the current process.
#[derive(Debug)]
pub struct MemorySharedRegistry {
	fail_registration: bool,
	registrations: AtomicUsize,
	worker: Arc<MemorySharedInterceptor>,
}
impl MemorySharedRegistry {
	/// Registry whose interceptor answers its configuration.
	pub fn new() -> Self {
		Self::build(false, true)
	}

	/// Registry whose registration always fails.
	pub fn failing() -> Self {
		Self::build(true, true)
	}

	/// Registry whose interceptor never answers its configuration.
	pub fn silent() -> Self {
		Self::build(false, false)
	}

	fn build(fail_registration: bool, answer_configuration: bool) -> Self {
		Self {
			fail_registration,
			registrations: AtomicUsize::new(0),
			worker: Arc::new(MemorySharedInterceptor {
				answer_configuration,
				port: Mutex::new(None),
				history: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Number of registration attempts.
	pub fn registrations(&self) -> usize {
		self.registrations.load(Ordering::Relaxed)
	}

	/// The interceptor handed out on successful registration.
	pub fn interceptor(&self) -> Arc<MemorySharedInterceptor> {
		self.worker.clone()
	}
}
impl Default for MemorySharedRegistry {
	fn default() -> Self {
		Self::new()
	}
}
impl SharedInterceptorRegistry for MemorySharedRegistry {
	fn register<'a>(&'a self, script: &'a Url) -> ContextFuture<'a, Arc<dyn SharedInterceptor>> {
		self.registrations.fetch_add(1, Ordering::Relaxed);

		Box::pin(async move {
			if self.fail_registration {
				return Err(ChannelError::Rejected {
					context: "shared interceptor",
					message: format!("registration of {script} is not permitted"),
				});
			}

			Ok(self.worker.clone() as Arc<dyn SharedInterceptor>)
		})
	}
}

/// Shared interceptor living in the current process.
#[derive(Debug)]
pub struct MemorySharedInterceptor {
	answer_configuration: bool,
	port: Mutex<Option<MessagePort>>,
	history: Mutex<Vec<Value>>,
}
impl MemorySharedInterceptor {
	/// Messages received from the coordinator, oldest first.
	pub fn history(&self) -> Vec<Value> {
		self.history.lock().clone()
	}

	/// Emits an event to the coordinator, transferring `ports` with it.
	pub fn emit(&self, data: Value, ports: Vec<MessagePort>) -> Result<(), ChannelError> {
		match &*self.port.lock() {
			Some(port) => port.post(data, ports),
			None => Err(ChannelError::closed("shared interceptor")),
		}
	}
}
impl SharedInterceptor for MemorySharedInterceptor {
	fn activated(&self) -> ContextFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	fn post(&self, message: Value, mut ports: Vec<MessagePort>) -> Result<(), ChannelError> {
		if tag_of(&message) == Some(CONFIGURATION_TAG) && !ports.is_empty() {
			let port = ports.remove(0);

			if self.answer_configuration {
				port.post(serde_json::json!({ "message": "interceptorReady" }), Vec::new())?;
			}

			*self.port.lock() = Some(port);
		}

		self.history.lock().push(message);

		Ok(())
	}
}

/// Direct interceptor factory living in the current process.
#[derive(Debug, Default)]
pub struct MemoryDirectFactory {
	installed: Mutex<Option<(Vec<ResourceServerId>, MessagePort)>>,
	renewed: Arc<Mutex<Vec<ResourceServerId>>>,
	creations: AtomicUsize,
}
impl MemoryDirectFactory {
	/// Number of interceptors built.
	pub fn creations(&self) -> usize {
		self.creations.load(Ordering::Relaxed)
	}

	/// Resource servers the installed interceptor watches.
	pub fn resource_servers(&self) -> Vec<ResourceServerId> {
		self.installed.lock().as_ref().map(|(ids, _)| ids.clone()).unwrap_or_default()
	}

	/// Renewal completions relayed to the interceptor, oldest first.
	pub fn renewed(&self) -> Vec<ResourceServerId> {
		self.renewed.lock().clone()
	}

	/// Emits an event to the coordinator, transferring `ports` with it.
	pub fn emit(&self, data: Value, ports: Vec<MessagePort>) -> Result<(), ChannelError> {
		match &*self.installed.lock() {
			Some((_, port)) => port.post(data, ports),
			None => Err(ChannelError::closed("direct interceptor")),
		}
	}
}
impl DirectInterceptorFactory for MemoryDirectFactory {
	fn create(
		&self,
		resource_servers: Vec<ResourceServerId>,
		port: MessagePort,
	) -> Result<Arc<dyn InterceptionProxy>, ChannelError> {
		self.creations.fetch_add(1, Ordering::Relaxed);
		*self.installed.lock() = Some((resource_servers, port));

		Ok(Arc::new(MemoryDirectProxy { renewed: self.renewed.clone() }))
	}
}

struct MemoryDirectProxy {
	renewed: Arc<Mutex<Vec<ResourceServerId>>>,
}
impl InterceptionProxy for MemoryDirectProxy {
	fn kind(&self) -> StrategyKind {
		StrategyKind::Direct
	}

	fn tokens_renewed(&self, resource_server: &ResourceServerId) -> Result<(), ChannelError> {
		self.renewed.lock().push(resource_server.clone());

		Ok(())
	}
}
