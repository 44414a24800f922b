// self
use crate::obs::{EventKind, EventOutcome};

/// Records an event outcome via the global metrics recorder (when enabled).
pub fn record_event(kind: EventKind, outcome: EventOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"appauth_coordinator_event_total",
			"event" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
