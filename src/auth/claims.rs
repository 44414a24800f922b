//! Identity claims delivered with the initial token notification.

// self
use crate::_prelude::*;

/// Decoded id-token claims forwarded untouched from the background auth context.
///
/// The coordinator never validates these; signature and audience checks belong to the
/// authentication engine that produced them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdTokenClaims(pub serde_json::Map<String, Value>);
impl IdTokenClaims {
	/// Returns the claim with the provided name.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// Returns the `sub` claim when it is a string.
	pub fn subject(&self) -> Option<&str> {
		self.get("sub").and_then(Value::as_str)
	}
}
