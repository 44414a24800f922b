//! Optional observability helpers for coordinator operations and events.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `appauth_coordinator.event` with
//!   the `event` and `stage` fields, plus debug/warn events for dropped or failed messages.
//! - Enable `metrics` to increment the `appauth_coordinator_event_total` counter for every
//!   attempt/success/failure/ignored outcome, labeled by `event` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations and events observed by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
	/// Bootstrap lifecycle.
	Bootstrap,
	/// Caller-requested token data.
	GetTokens,
	/// Caller-requested logout.
	Logout,
	/// Inbound message on the hosting page.
	WindowMessage,
	/// Tokens became available.
	TokensAvailable,
	/// Interaction with the identity provider is required.
	InteractionRequired,
	/// Logout completed.
	LogoutComplete,
	/// Interceptor asked for a request to be made.
	MakeResourceRequest,
	/// Interceptor asked for a renewal.
	RenewTokens,
}
impl EventKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EventKind::Bootstrap => "bootstrap",
			EventKind::GetTokens => "get_tokens",
			EventKind::Logout => "logout",
			EventKind::WindowMessage => "window_message",
			EventKind::TokensAvailable => "tokens_available",
			EventKind::InteractionRequired => "interaction_required",
			EventKind::LogoutComplete => "logout_complete",
			EventKind::MakeResourceRequest => "make_resource_request",
			EventKind::RenewTokens => "renew_tokens",
		}
	}
}
impl Display for EventKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated or logged.
	Failure,
	/// Message discarded (foreign origin, unknown tag, suppressed renewal).
	Ignored,
}
impl EventOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EventOutcome::Attempt => "attempt",
			EventOutcome::Success => "success",
			EventOutcome::Failure => "failure",
			EventOutcome::Ignored => "ignored",
		}
	}
}
impl Display for EventOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
