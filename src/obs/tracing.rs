// self
use crate::{
	_prelude::*,
	obs::{self, EventKind, EventOutcome},
};

/// Span covering one coordinator operation or one handled event.
#[derive(Clone, Debug)]
pub struct EventSpan {
	kind: EventKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl EventSpan {
	/// Opens an `appauth_coordinator.event` span for `kind` at `stage`.
	pub fn new(kind: EventKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		let span = tracing::info_span!("appauth_coordinator.event", event = kind.as_str(), stage);
		#[cfg(not(feature = "tracing"))]
		let _ = stage;

		Self {
			kind,
			#[cfg(feature = "tracing")]
			span,
		}
	}

	/// Event kind the span was opened for.
	pub fn kind(&self) -> EventKind {
		self.kind
	}

	/// Drives `fut` to completion inside the span.
	pub async fn run<F>(&self, fut: F) -> F::Output
	where
		F: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone()).await
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut.await
		}
	}
}

/// Runs a fallible operation inside an [`EventSpan`].
///
/// The attempt and its outcome are recorded; a failure is also logged at warn level before it
/// is handed back.
pub async fn observe<F, T>(kind: EventKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	obs::record_event(kind, EventOutcome::Attempt);

	let result = EventSpan::new(kind, stage).run(fut).await;

	match &result {
		Ok(_) => obs::record_event(kind, EventOutcome::Success),
		Err(e) => {
			obs::record_event(kind, EventOutcome::Failure);
			trace_warn(kind, e);
		},
	}

	result
}

/// Emits a debug-level event (when tracing is enabled).
pub fn trace_debug(kind: EventKind, message: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::debug!(event = kind.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, message);
}

/// Emits a warn-level event (when tracing is enabled).
pub fn trace_warn(kind: EventKind, message: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(event = kind.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, message);
}
