//! Closed message enums for the two wire protocols the coordinator speaks.
//!
//! Every message is a JSON object tagged by its `message` field. Outbound enums serialize
//! straight into that shape; inbound enums are decoded with [`decode_tagged`], which separates
//! tags this crate does not know (ignored, like any other noise) from known tags carrying a
//! malformed payload (reported with the failing JSON path).

pub mod auth;
pub mod intercept;

pub use auth::*;
pub use intercept::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::ChannelError};

/// Field carrying the message tag in both protocols.
pub const TAG_FIELD: &str = "message";

/// Serializes an outbound message.
pub fn encode<T>(protocol: &'static str, message: &T) -> Result<Value, ChannelError>
where
	T: ?Sized + Serialize,
{
	serde_json::to_value(message).map_err(|source| ChannelError::Encode { protocol, source })
}

/// Decodes an inbound message whose tag is one of `known`.
///
/// Returns `Ok(None)` when the payload has no tag or an unknown tag.
pub fn decode_tagged<T>(
	protocol: &'static str,
	known: &[&str],
	data: Value,
) -> Result<Option<T>, ChannelError>
where
	T: DeserializeOwned,
{
	let known_tag =
		data.get(TAG_FIELD).and_then(Value::as_str).is_some_and(|tag| known.contains(&tag));

	if !known_tag {
		return Ok(None);
	}

	serde_path_to_error::deserialize(data)
		.map(Some)
		.map_err(|source| ChannelError::Malformed { protocol, source })
}
