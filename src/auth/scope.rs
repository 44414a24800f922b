//! Scope list helpers used to build the configured and derived scope strings.

// std
use std::slice::Iter;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Reserved scope that turns an OAuth 2.0 request into an OpenID Connect request.
pub const OPENID_SCOPE: &str = "openid";

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Ordered, duplicate-free list of OAuth scopes.
///
/// Unlike a set, insertion order is kept: the derived authorization scope string lists `openid`
/// first and then each resource server's scopes in configuration order. Serialized as the
/// space-delimited string the identity provider expects.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeList(Vec<String>);
impl ScopeList {
	/// Creates a list from any iterator, keeping the first occurrence of each scope.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut list = Self::default();

		for scope in scopes {
			list.push(scope.into())?;
		}

		Ok(list)
	}

	/// Parses a space-delimited scope string; runs of whitespace are treated as one delimiter.
	pub fn parse(delimited: &str) -> Result<Self, ScopeValidationError> {
		Self::new(delimited.split_whitespace())
	}

	/// Builds the authorization scope string for a client: the reserved OIDC scope (when
	/// enabled) followed by the union of every resource server's scopes.
	pub fn derive<'a, I>(oidc: bool, resource_scopes: I) -> Self
	where
		I: IntoIterator<Item = &'a ScopeList>,
	{
		let mut derived = Self::default();

		if oidc {
			derived.0.push(OPENID_SCOPE.into());
		}

		for list in resource_scopes {
			for scope in list.iter() {
				if !derived.contains(scope) {
					derived.0.push(scope.to_owned());
				}
			}
		}

		derived
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the list contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Iterator over scopes in insertion order.
	pub fn iter(&self) -> ScopeIter<'_> {
		ScopeIter { inner: self.0.iter() }
	}

	/// Returns the space-delimited representation.
	pub fn delimited(&self) -> String {
		self.0.join(" ")
	}

	fn push(&mut self, scope: String) -> Result<(), ScopeValidationError> {
		if scope.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if scope.chars().any(char::is_whitespace) {
			return Err(ScopeValidationError::ContainsWhitespace { scope });
		}
		if !self.contains(&scope) {
			self.0.push(scope);
		}

		Ok(())
	}
}
impl Debug for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeList").field(&self.0).finish()
	}
}
impl Display for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.delimited())
	}
}
impl FromStr for ScopeList {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Serialize for ScopeList {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.delimited())
	}
}
impl<'de> Deserialize<'de> for ScopeList {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::parse(&raw).map_err(DeError::custom)
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parse_keeps_order_and_drops_duplicates() {
		let scopes = ScopeList::parse("read  write read\tadmin")
			.expect("Delimited scope fixture should parse.");

		assert_eq!(scopes.iter().collect::<Vec<_>>(), ["read", "write", "admin"]);
		assert_eq!(scopes.to_string(), "read write admin");
	}

	#[test]
	fn new_rejects_invalid_entries() {
		assert_eq!(ScopeList::new([""]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeList::new(["read write"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
	}

	#[test]
	fn derive_prefixes_openid_and_unions_resource_scopes() {
		let api1 = ScopeList::parse("read").expect("First scope fixture should parse.");
		let api2 = ScopeList::parse("write read").expect("Second scope fixture should parse.");

		assert_eq!(ScopeList::derive(true, [&api1, &api2]).delimited(), "openid read write");
		assert_eq!(ScopeList::derive(false, [&api1, &api2]).delimited(), "read write");
		assert!(ScopeList::derive(false, std::iter::empty()).is_empty());
	}

	#[test]
	fn derive_does_not_repeat_openid() {
		let api = ScopeList::parse("openid profile").expect("Scope fixture should parse.");

		assert_eq!(ScopeList::derive(true, [&api]).delimited(), "openid profile");
	}

	#[test]
	fn serde_uses_space_delimited_strings() {
		let scopes: ScopeList =
			serde_json::from_str("\"read write\"").expect("Scope string should deserialize.");

		assert_eq!(scopes.len(), 2);
		assert_eq!(
			serde_json::to_string(&scopes).expect("Scope list should serialize."),
			"\"read write\""
		);
	}
}
