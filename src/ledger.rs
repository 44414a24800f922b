//! Session ledger contract: the small session-scoped keyed store used for coordination.
//!
//! Two keys exist. [`LedgerKey::RenewalSlot`] names the resource server currently allowed to
//! renew and is written only by the renewal governor. [`LedgerKey::SavedFragment`] keeps the
//! navigation fragment captured before an interactive redirect, one entry per client.

pub mod memory;

pub use memory::MemoryLedger;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SessionLedger`] operations.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + 'a + Send>>;

/// Storage contract implemented by session ledgers.
///
/// Entries must not outlive the browsing session that wrote them.
pub trait SessionLedger
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`.
	fn get<'a>(&'a self, key: &'a LedgerKey) -> LedgerFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set<'a>(&'a self, key: &'a LedgerKey, value: String) -> LedgerFuture<'a, ()>;

	/// Removes and returns the value stored under `key`.
	fn remove<'a>(&'a self, key: &'a LedgerKey) -> LedgerFuture<'a, Option<String>>;
}

/// Keys understood by the session ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKey {
	/// Resource server currently holding the renewal slot.
	RenewalSlot,
	/// Navigation fragment saved before an interactive redirect for the given client.
	SavedFragment(ClientId),
}
impl LedgerKey {
	/// Storage key used by browser session storage.
	pub fn storage_key(&self) -> String {
		match self {
			LedgerKey::RenewalSlot => "currentResourceServer".into(),
			LedgerKey::SavedFragment(client_id) =>
				format!("originalWindowHash-{}", client_id.as_str()),
		}
	}
}
impl Display for LedgerKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.storage_key())
	}
}

/// Error type produced by [`SessionLedger`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum LedgerError {
	/// Backend refused the write (quota, privacy mode, ...).
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
