//! Host seams: the isolated contexts and the page navigation the coordinator drives.
//!
//! A browser embedding implements these over hidden frames and `window.location`; tests and
//! demos use [`memory`].

pub mod memory;

// self
use crate::{_prelude::*, channel::MessagePort, error::ChannelError};

/// Boxed future returned by host seams.
pub type ContextFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ChannelError>> + 'a + Send>>;

/// An isolated execution context reachable only through asynchronous messages.
pub trait IsolatedContext
where
	Self: Send + Sync,
{
	/// Starts loading `src` into the context.
	fn attach(&self, src: &Url) -> Result<(), ChannelError>;

	/// Resolves once the context has signalled that its document loaded.
	fn loaded(&self) -> ContextFuture<'_, ()>;

	/// Posts a message to the context.
	///
	/// Hosts must drop the message silently when the context's origin differs from
	/// `target_origin`.
	fn post(
		&self,
		message: Value,
		target_origin: &Origin,
		ports: Vec<MessagePort>,
	) -> Result<(), ChannelError>;
}

/// Top-level navigation of the hosting page.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Current navigation fragment including the leading `#`, or an empty string.
	fn fragment(&self) -> String;

	/// Replaces the navigation fragment.
	fn set_fragment(&self, fragment: &str);

	/// Navigates the whole page away to `url`.
	fn redirect(&self, url: &Url);
}

/// Awaits a readiness future, failing with [`Error::ReadinessTimeout`] once `timeout` passes.
pub(crate) async fn within_readiness<T, F>(
	context: &'static str,
	timeout: Duration,
	ready: F,
) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let limit = std::time::Duration::try_from(timeout).unwrap_or_default();

	match tokio::time::timeout(limit, ready).await {
		Ok(result) => result,
		Err(_) => Err(Error::ReadinessTimeout { context, waited: timeout }),
	}
}
