//! Builder API for assembling a [`Config`] from code.
//!
//! Validation happens once, in [`ConfigBuilder::build`].

// crates.io
use oauth2::{AuthUrl, RevocationUrl, TokenUrl};
// self
use crate::{
	_prelude::*,
	auth::{ResourceServerId, ScopeList},
	config::{Config, IdpEndpoints},
};

/// Errors raised while constructing or validating a [`Config`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigBuilderError {
	/// Client identifier is blank.
	#[error("Client identifier cannot be empty.")]
	EmptyClientId,
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// A URI could not be parsed or resolved against the application location.
	#[error("The {field} value is not a valid URI.")]
	InvalidUri {
		/// Configuration field that failed.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The redirect target has no tuple origin, so no message could ever pass the origin check.
	#[error("The redirect URI {url} has an opaque origin.")]
	OpaqueRedirectOrigin {
		/// Offending redirect URI.
		url: String,
	},
	/// A duration setting is zero, negative, or out of range.
	#[error("The {field} value must be a positive duration.")]
	InvalidDuration {
		/// Configuration field that failed.
		field: &'static str,
	},
}

/// Builder for [`Config`] values.
#[derive(Debug)]
pub struct ConfigBuilder {
	/// Location of the hosting application.
	pub app_location: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// Whether OIDC is requested.
	pub oidc: bool,
	/// Authorization endpoint (required).
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint (required).
	pub token_endpoint: Option<Url>,
	/// Optional revocation endpoint.
	pub revocation_endpoint: Option<Url>,
	/// Optional end-session endpoint.
	pub end_session_endpoint: Option<Url>,
	/// Resource servers and their scopes.
	pub resource_servers: BTreeMap<ResourceServerId, ScopeList>,
	/// Redirect target, possibly relative to the application location.
	pub redirect_uri: Option<String>,
	/// Interceptor script location, possibly relative to the application location.
	pub interceptor_uri: Option<String>,
	/// Extra authorization request parameters.
	pub extras: BTreeMap<String, Value>,
	/// Minimum spacing between dispatched renewals.
	pub renew_cooldown: Duration,
	/// Upper bound on bootstrap readiness waits.
	pub readiness_timeout: Duration,
}
impl ConfigBuilder {
	/// Redirect target used when none is configured.
	pub const DEFAULT_REDIRECT_URI: &'static str = "appAuthHelperRedirect.html";
	/// Interceptor script used when none is configured.
	pub const DEFAULT_INTERCEPTOR_URI: &'static str = "appAuthServiceWorker.js";
	/// Default renewal cooldown.
	pub const DEFAULT_RENEW_COOLDOWN: Duration = Duration::seconds(1);
	/// Default readiness timeout.
	pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a new builder seeded with the application location and client identifier.
	pub fn new(app_location: Url, client_id: impl Into<String>) -> Self {
		Self {
			app_location,
			client_id: client_id.into(),
			oidc: true,
			authorization_endpoint: None,
			token_endpoint: None,
			revocation_endpoint: None,
			end_session_endpoint: None,
			resource_servers: BTreeMap::new(),
			redirect_uri: None,
			interceptor_uri: None,
			extras: BTreeMap::new(),
			renew_cooldown: Self::DEFAULT_RENEW_COOLDOWN,
			readiness_timeout: Self::DEFAULT_READINESS_TIMEOUT,
		}
	}

	/// Enables or disables the reserved `openid` scope (enabled by default).
	pub fn oidc(mut self, oidc: bool) -> Self {
		self.oidc = oidc;

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Sets the end-session endpoint.
	pub fn end_session_endpoint(mut self, url: Url) -> Self {
		self.end_session_endpoint = Some(url);

		self
	}

	/// Adds (or replaces) a resource server and the scopes it requires.
	pub fn resource_server(mut self, id: ResourceServerId, scopes: ScopeList) -> Self {
		self.resource_servers.insert(id, scopes);

		self
	}

	/// Overrides the redirect target; relative values resolve against the application location.
	pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(uri.into());

		self
	}

	/// Overrides the interceptor script; relative values resolve against the application
	/// location.
	pub fn interceptor_uri(mut self, uri: impl Into<String>) -> Self {
		self.interceptor_uri = Some(uri.into());

		self
	}

	/// Adds a single extra authorization parameter.
	pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.extras.insert(key.into(), value.into());

		self
	}

	/// Replaces all extra authorization parameters.
	pub fn extras(mut self, extras: BTreeMap<String, Value>) -> Self {
		self.extras = extras;

		self
	}

	/// Overrides the renewal cooldown (defaults to one second).
	pub fn renew_cooldown(mut self, cooldown: Duration) -> Self {
		self.renew_cooldown = cooldown;

		self
	}

	/// Overrides the readiness timeout (defaults to thirty seconds).
	pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
		self.readiness_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<Config, ConfigBuilderError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigBuilderError::EmptyClientId);
		}

		let authorization = self
			.authorization_endpoint
			.ok_or(ConfigBuilderError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ConfigBuilderError::MissingTokenEndpoint)?;
		let redirect_uri = resolve(
			&self.app_location,
			"redirectUri",
			self.redirect_uri.as_deref().unwrap_or(Self::DEFAULT_REDIRECT_URI),
		)?;

		if !redirect_uri.origin().is_tuple() {
			return Err(ConfigBuilderError::OpaqueRedirectOrigin { url: redirect_uri.into() });
		}

		let interceptor_uri = resolve(
			&self.app_location,
			"serviceWorkerUri",
			self.interceptor_uri.as_deref().unwrap_or(Self::DEFAULT_INTERCEPTOR_URI),
		)?;

		validate_duration("renewCooldownPeriod", self.renew_cooldown)?;
		validate_duration("readinessTimeout", self.readiness_timeout)?;

		let scopes = ScopeList::derive(self.oidc, self.resource_servers.values());

		Ok(Config {
			app_location: self.app_location,
			client_id: ClientId::new(self.client_id),
			oidc: self.oidc,
			endpoints: IdpEndpoints {
				authorization: AuthUrl::from_url(authorization),
				token: TokenUrl::from_url(token),
				revocation: self.revocation_endpoint.map(RevocationUrl::from_url),
				end_session: self.end_session_endpoint,
			},
			resource_servers: self.resource_servers,
			redirect_uri,
			interceptor_uri,
			extras: self.extras,
			renew_cooldown: self.renew_cooldown,
			readiness_timeout: self.readiness_timeout,
			scopes,
		})
	}
}

fn resolve(base: &Url, field: &'static str, raw: &str) -> Result<Url, ConfigBuilderError> {
	base.join(raw).map_err(|source| ConfigBuilderError::InvalidUri { field, source })
}

fn validate_duration(field: &'static str, value: Duration) -> Result<(), ConfigBuilderError> {
	if value.is_positive() {
		Ok(())
	} else {
		Err(ConfigBuilderError::InvalidDuration { field })
	}
}
