//! Interception protocol, spoken identically by both interception strategies.

// self
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	config::Config,
	error::ChannelError,
	protocol,
};

const PROTOCOL: &str = "interception";

/// Messages posted to the active interceptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "message")]
pub enum InterceptorCommand {
	/// Sent once, with the event port, to wire up a shared interceptor.
	#[serde(rename = "configuration", rename_all = "camelCase")]
	Configuration {
		/// Resource servers whose requests must be intercepted.
		resource_servers: Vec<ResourceServerId>,
	},
	/// Fresh tokens are ready for a resource server; held requests may be replayed.
	#[serde(rename = "tokensRenewed", rename_all = "camelCase")]
	TokensRenewed {
		/// Resource server whose tokens were renewed.
		resource_server: ResourceServerId,
	},
}
impl InterceptorCommand {
	/// Serializes the command into its wire form.
	pub fn encode(&self) -> Result<Value, ChannelError> {
		protocol::encode(PROTOCOL, self)
	}
}

/// Events emitted by the active interceptor over the event port.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "message")]
pub enum InterceptEvent {
	/// An intercepted request must be made by the request-routing context. Reply ports travel
	/// beside the payload.
	#[serde(rename = "makeRSRequest")]
	MakeResourceRequest {
		/// Serialized request description, passed through opaquely.
		request: Value,
	},
	/// A resource server rejected its token; a renewal is needed.
	#[serde(rename = "renewTokens", rename_all = "camelCase")]
	RenewTokens {
		/// Resource server to renew.
		resource_server: ResourceServerId,
	},
}
impl InterceptEvent {
	const KNOWN: [&'static str; 2] = ["makeRSRequest", "renewTokens"];

	/// Decodes an inbound payload; unknown tags yield `Ok(None)`.
	pub fn decode(data: Value) -> Result<Option<Self>, ChannelError> {
		protocol::decode_tagged(PROTOCOL, &Self::KNOWN, data)
	}

	/// Stable label for spans and logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			InterceptEvent::MakeResourceRequest { .. } => "make_resource_request",
			InterceptEvent::RenewTokens { .. } => "renew_tokens",
		}
	}
}

/// Messages posted to the request-routing context.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "message")]
pub enum RequestRoutingCommand<'a> {
	/// Make an intercepted request with the current tokens and answer on the relayed ports.
	#[serde(rename = "makeRSRequest")]
	MakeResourceRequest {
		/// Request description as received from the interceptor.
		request: &'a Value,
		/// Coordinator configuration.
		config: &'a Config,
	},
}
impl RequestRoutingCommand<'_> {
	/// Serializes the command into its wire form.
	pub fn encode(&self) -> Result<Value, ChannelError> {
		protocol::encode("request routing", self)
	}
}
