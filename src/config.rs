//! Coordinator configuration: validated, immutable once bootstrap begins.
//!
//! [`Config`] is assembled by [`ConfigBuilder`] or parsed from a JSON document with
//! [`Config::from_json_str`]. The same value is serialized into every outbound command for the
//! background auth context, using the field names that context expects.

/// Builder API for assembling coordinator configuration.
pub mod builder;

pub use builder::*;

// crates.io
use oauth2::{AuthUrl, RevocationUrl, TokenUrl};
use serde::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{ResourceServerId, ScopeList},
	error::ConfigError,
};

/// Identity-provider endpoints forwarded to the background auth context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdpEndpoints {
	/// Authorization endpoint used for interactive and silent authorization requests.
	pub authorization: AuthUrl,
	/// Token endpoint used for code exchanges.
	pub token: TokenUrl,
	/// Optional revocation endpoint used during logout.
	pub revocation: Option<RevocationUrl>,
	/// Optional RP-initiated logout endpoint.
	pub end_session: Option<Url>,
}

/// Immutable coordinator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
	/// Location of the hosting application; relative URIs resolve against it.
	pub app_location: Url,
	/// OAuth client identifier registered with the identity provider.
	pub client_id: ClientId,
	/// Whether the reserved `openid` scope is requested.
	pub oidc: bool,
	/// Identity-provider endpoints.
	pub endpoints: IdpEndpoints,
	/// Resource servers keyed by identifier, with the scopes each one requires.
	pub resource_servers: BTreeMap<ResourceServerId, ScopeList>,
	/// Redirect target registered with the provider; both hidden contexts load it.
	pub redirect_uri: Url,
	/// Script location for the shared background interceptor.
	pub interceptor_uri: Url,
	/// Extra authorization request parameters.
	pub extras: BTreeMap<String, Value>,
	/// Minimum spacing between dispatched renewals.
	pub renew_cooldown: Duration,
	/// Upper bound on every readiness wait during bootstrap.
	pub readiness_timeout: Duration,
	/// Derived authorization scope list.
	pub scopes: ScopeList,
}
impl Config {
	/// Creates a new builder for the provided application location and client identifier.
	pub fn builder(app_location: Url, client_id: impl Into<String>) -> ConfigBuilder {
		ConfigBuilder::new(app_location, client_id)
	}

	/// Parses a JSON configuration document, resolving relative URIs against `app_location`.
	pub fn from_json_str(app_location: Url, json: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let document: ConfigDocument = serde_path_to_error::deserialize(de)
			.map_err(|source| ConfigError::Parse { source })?;

		Ok(document.into_builder(app_location)?.build()?)
	}

	/// Origin every message to or from the hidden contexts must match.
	pub fn redirect_origin(&self) -> Origin {
		self.redirect_uri.origin()
	}

	/// Resource server identifiers in configuration order.
	pub fn resource_server_ids(&self) -> Vec<ResourceServerId> {
		self.resource_servers.keys().cloned().collect()
	}
}
impl Serialize for Config {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		WireConfig::from(self).serialize(serializer)
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireConfig<'a> {
	app_location: &'a str,
	client_id: &'a str,
	oidc: bool,
	redirect_uri: &'a str,
	service_worker_uri: &'a str,
	extras: &'a BTreeMap<String, Value>,
	resource_servers: &'a BTreeMap<ResourceServerId, ScopeList>,
	scopes: &'a ScopeList,
	endpoints: WireEndpoints<'a>,
}
impl<'a> From<&'a Config> for WireConfig<'a> {
	fn from(config: &'a Config) -> Self {
		Self {
			app_location: config.app_location.as_str(),
			client_id: config.client_id.as_str(),
			oidc: config.oidc,
			redirect_uri: config.redirect_uri.as_str(),
			service_worker_uri: config.interceptor_uri.as_str(),
			extras: &config.extras,
			resource_servers: &config.resource_servers,
			scopes: &config.scopes,
			endpoints: WireEndpoints {
				authorization_endpoint: config.endpoints.authorization.as_str(),
				token_endpoint: config.endpoints.token.as_str(),
				revocation_endpoint: config.endpoints.revocation.as_ref().map(|url| url.as_str()),
				end_session_endpoint: config.endpoints.end_session.as_ref().map(Url::as_str),
			},
		}
	}
}

#[derive(Serialize)]
struct WireEndpoints<'a> {
	authorization_endpoint: &'a str,
	token_endpoint: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	revocation_endpoint: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	end_session_endpoint: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigDocument {
	client_id: String,
	#[serde(default)]
	oidc: Option<bool>,
	authorization_endpoint: String,
	token_endpoint: String,
	#[serde(default)]
	revocation_endpoint: Option<String>,
	#[serde(default)]
	end_session_endpoint: Option<String>,
	#[serde(default)]
	resource_servers: BTreeMap<ResourceServerId, ScopeList>,
	#[serde(default)]
	extras: BTreeMap<String, Value>,
	#[serde(default)]
	redirect_uri: Option<String>,
	#[serde(default)]
	service_worker_uri: Option<String>,
	#[serde(default)]
	renew_cooldown_period: Option<f64>,
	#[serde(default)]
	readiness_timeout: Option<f64>,
}
impl ConfigDocument {
	fn into_builder(self, app_location: Url) -> Result<ConfigBuilder, ConfigBuilderError> {
		let mut builder = ConfigBuilder::new(app_location, self.client_id)
			.authorization_endpoint(parse_uri("authorizationEndpoint", &self.authorization_endpoint)?)
			.token_endpoint(parse_uri("tokenEndpoint", &self.token_endpoint)?)
			.extras(self.extras);

		if let Some(oidc) = self.oidc {
			builder = builder.oidc(oidc);
		}
		if let Some(raw) = self.revocation_endpoint {
			builder = builder.revocation_endpoint(parse_uri("revocationEndpoint", &raw)?);
		}
		if let Some(raw) = self.end_session_endpoint {
			builder = builder.end_session_endpoint(parse_uri("endSessionEndpoint", &raw)?);
		}
		if let Some(raw) = self.redirect_uri {
			builder = builder.redirect_uri(raw);
		}
		if let Some(raw) = self.service_worker_uri {
			builder = builder.interceptor_uri(raw);
		}
		// Zero selects the default, as an unset value does.
		if let Some(secs) = self.renew_cooldown_period.filter(|secs| *secs != 0.) {
			builder = builder.renew_cooldown(seconds("renewCooldownPeriod", secs)?);
		}
		if let Some(secs) = self.readiness_timeout {
			builder = builder.readiness_timeout(seconds("readinessTimeout", secs)?);
		}

		for (id, scopes) in self.resource_servers {
			builder = builder.resource_server(id, scopes);
		}

		Ok(builder)
	}
}

fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigBuilderError> {
	// One year; anything longer is a unit mix-up.
	const MAX_SECS: f64 = 31_536_000.;

	if secs.is_finite() && secs > 0. && secs <= MAX_SECS {
		Ok(Duration::seconds_f64(secs))
	} else {
		Err(ConfigBuilderError::InvalidDuration { field })
	}
}

fn parse_uri(field: &'static str, raw: &str) -> Result<Url, ConfigBuilderError> {
	Url::parse(raw).map_err(|source| ConfigBuilderError::InvalidUri { field, source })
}
