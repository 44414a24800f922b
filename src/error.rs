//! Coordinator-level error types shared across the ledger, adapter, selector, and lifecycle.

// self
use crate::{_prelude::*, coordinator::CoordinatorState};

/// Coordinator-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical coordinator error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session ledger failure.
	#[error("{0}")]
	Ledger(
		#[from]
		#[source]
		crate::ledger::LedgerError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Message channel failure between isolated contexts.
	#[error(transparent)]
	Channel(#[from] ChannelError),

	/// An isolated context never signalled readiness.
	#[error("The {context} context did not signal readiness within {waited}.")]
	ReadinessTimeout {
		/// Label of the context being awaited.
		context: &'static str,
		/// How long the coordinator waited.
		waited: Duration,
	},
	/// Operation is not permitted in the coordinator's current state.
	#[error("Cannot call `{operation}` while the coordinator is {state}.")]
	InvalidState {
		/// State observed when the call was made.
		state: CoordinatorState,
		/// Operation that was rejected.
		operation: &'static str,
	},
}

/// Configuration failures raised while building or installing the coordinator.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Builder validation failed.
	#[error(transparent)]
	Builder(#[from] crate::config::ConfigBuilderError),
	/// Configuration document could not be parsed.
	#[error("Configuration document is invalid.")]
	Parse {
		/// Structured parsing failure naming the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Neither interception strategy can be installed in this host.
	#[error(
		"No request interception strategy is available; the host supports neither a shared interceptor nor a direct interceptor."
	)]
	NoInterceptionStrategy,
}

/// Failures on the message channels linking the coordinator to isolated contexts.
#[derive(Debug, ThisError)]
pub enum ChannelError {
	/// The peer side of the channel is gone.
	#[error("The {channel} channel is closed.")]
	Closed {
		/// Channel label.
		channel: &'static str,
	},
	/// An inbound payload did not match the expected protocol.
	#[error("Received a malformed {protocol} message.")]
	Malformed {
		/// Protocol label.
		protocol: &'static str,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// An outbound payload could not be encoded.
	#[error("Failed to encode an outbound {protocol} message.")]
	Encode {
		/// Protocol label.
		protocol: &'static str,
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
	/// The host context rejected a message.
	#[error("The {context} context rejected a message: {message}.")]
	Rejected {
		/// Context label.
		context: &'static str,
		/// Host-supplied reason.
		message: String,
	},
}
impl ChannelError {
	/// Shorthand for [`ChannelError::Closed`].
	pub const fn closed(channel: &'static str) -> Self {
		Self::Closed { channel }
	}
}
