//! Background auth context protocol.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, ResourceServerId},
	config::Config,
	error::ChannelError,
	protocol,
};

const PROTOCOL: &str = "background auth";

/// Commands posted to the background auth context. Each carries the full configuration.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "message")]
pub enum AuthCommand<'a> {
	/// Hands the configuration to a freshly loaded context; the reply proves readiness.
	#[serde(rename = "appAuth-config")]
	Configure {
		/// Coordinator configuration.
		config: &'a Config,
	},
	/// Asks for whatever tokens and claims are currently available.
	#[serde(rename = "appAuth-getAvailableData")]
	GetAvailableData {
		/// Coordinator configuration.
		config: &'a Config,
	},
	/// Asks for a fresh access token for one resource server.
	#[serde(rename = "appAuth-getFreshAccessToken")]
	GetFreshAccessToken {
		/// Coordinator configuration.
		config: &'a Config,
		/// Resource server to renew.
		#[serde(rename = "resourceServer")]
		resource_server: &'a ResourceServerId,
	},
	/// Revokes tokens, ends the provider session, and clears local token state.
	#[serde(rename = "appAuth-logout")]
	Logout {
		/// Coordinator configuration.
		config: &'a Config,
	},
}
impl AuthCommand<'_> {
	/// Stable label for spans and logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			AuthCommand::Configure { .. } => "configure",
			AuthCommand::GetAvailableData { .. } => "get_available_data",
			AuthCommand::GetFreshAccessToken { .. } => "get_fresh_access_token",
			AuthCommand::Logout { .. } => "logout",
		}
	}

	/// Serializes the command into its wire form.
	pub fn encode(&self) -> Result<Value, ChannelError> {
		protocol::encode(PROTOCOL, self)
	}
}

/// Notifications posted by the background auth context to the hosting page.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "message")]
pub enum AuthNotification {
	/// Tokens are available. Without a resource server this is the initial or interactive
	/// result; with one it completes a renewal.
	#[serde(rename = "appAuth-tokensAvailable", rename_all = "camelCase")]
	TokensAvailable {
		/// Identity claims, when OIDC is in use.
		#[serde(default)]
		id_token_claims: Option<IdTokenClaims>,
		/// Resource server whose renewal completed.
		#[serde(default)]
		resource_server: Option<ResourceServerId>,
	},
	/// Silent authentication is impossible; the user has to interact with the provider.
	#[serde(rename = "appAuth-interactionRequired", rename_all = "camelCase")]
	InteractionRequired {
		/// Authorization URL to send the user to.
		authorization_url: Url,
		/// Provider error that triggered the requirement.
		#[serde(default)]
		error: Option<Value>,
	},
	/// Logout finished.
	#[serde(rename = "appAuth-logoutComplete")]
	LogoutComplete,
}
impl AuthNotification {
	const KNOWN: [&'static str; 3] =
		["appAuth-tokensAvailable", "appAuth-interactionRequired", "appAuth-logoutComplete"];

	/// Decodes an inbound payload; unknown tags yield `Ok(None)`.
	pub fn decode(data: Value) -> Result<Option<Self>, ChannelError> {
		protocol::decode_tagged(PROTOCOL, &Self::KNOWN, data)
	}

	/// Stable label for spans and logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			AuthNotification::TokensAvailable { .. } => "tokens_available",
			AuthNotification::InteractionRequired { .. } => "interaction_required",
			AuthNotification::LogoutComplete => "logout_complete",
		}
	}
}
