//! Thread-safe in-memory [`SessionLedger`] implementation for tests and non-browser hosts.

// self
use crate::{
	_prelude::*,
	ledger::{LedgerError, LedgerFuture, LedgerKey, SessionLedger},
};

type LedgerMap = Arc<RwLock<HashMap<String, String>>>;

/// Session ledger that keeps entries in-process.
///
/// Clones share the same entries, which is how independent coordinators in one test can be
/// made to share a "browsing session" on purpose.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger(LedgerMap);
impl MemoryLedger {
	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every entry, as ending the browsing session would.
	pub fn clear(&self) {
		self.0.write().clear();
	}
}
impl SessionLedger for MemoryLedger {
	fn get<'a>(&'a self, key: &'a LedgerKey) -> LedgerFuture<'a, Option<String>> {
		let value = self.0.read().get(&key.storage_key()).cloned();

		Box::pin(async move { Ok::<_, LedgerError>(value) })
	}

	fn set<'a>(&'a self, key: &'a LedgerKey, value: String) -> LedgerFuture<'a, ()> {
		self.0.write().insert(key.storage_key(), value);

		Box::pin(async move { Ok(()) })
	}

	fn remove<'a>(&'a self, key: &'a LedgerKey) -> LedgerFuture<'a, Option<String>> {
		let value = self.0.write().remove(&key.storage_key());

		Box::pin(async move { Ok(value) })
	}
}
