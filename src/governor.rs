//! Renewal Governor: single-slot mutual exclusion and cooldown throttling for renewals.
//!
//! At most one resource server occupies the renewal slot (kept in the session ledger) at a
//! time. Requests for the occupant pass straight through; requests for any other resource
//! server wait in a FIFO queue with one entry per resource server. Once the slot is held,
//! [`RenewalGovernor::dispatch_if_due`] sends the renewal command unless another renewal was
//! dispatched within the cooldown window, in which case the in-flight renewal is treated as
//! covering this one. Completing a renewal releases the slot, clears the cooldown stamp, and
//! promotes the next queued resource server, in that order and under one lock.

mod metrics;

pub use metrics::RenewalMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	error::ChannelError,
	ledger::{LedgerKey, SessionLedger},
	obs::{self, EventKind},
};

/// Downstream sink for renewal commands.
pub trait RenewalDispatch
where
	Self: Send + Sync,
{
	/// Sends the fresh-token command for `resource_server`.
	fn dispatch_renewal(&self, resource_server: &ResourceServerId) -> Result<()>;
}

/// Result of [`RenewalGovernor::dispatch_if_due`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalDecision {
	/// The renewal command was sent.
	Dispatched,
	/// A renewal dispatched within the cooldown window covers this one.
	Suppressed,
	/// Another resource server holds the slot; nothing was sent.
	NotHolder,
}

/// Pending outcome of [`RenewalGovernor::request_slot`].
#[derive(Debug)]
pub enum SlotWait {
	/// The caller holds the slot now.
	Granted,
	/// The caller was queued behind another resource server.
	Queued(oneshot::Receiver<()>),
}
impl SlotWait {
	/// Returns true if the slot was granted without waiting.
	pub fn is_granted(&self) -> bool {
		matches!(self, SlotWait::Granted)
	}

	/// Resolves once the caller holds the slot.
	///
	/// Fails if the governor was reset while the caller was queued.
	pub async fn acquired(self) -> Result<()> {
		match self {
			SlotWait::Granted => Ok(()),
			SlotWait::Queued(rx) => rx.await.map_err(|_| ChannelError::closed("renewal queue").into()),
		}
	}
}

/// Point-in-time view of the governor, for diagnostics and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GovernorSnapshot {
	/// Resource server holding the slot.
	pub occupant: Option<String>,
	/// Queued resource servers in promotion order.
	pub pending: Vec<ResourceServerId>,
	/// Instant the last renewal was dispatched.
	pub last_dispatch: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct GovernorState {
	last_dispatch: Option<OffsetDateTime>,
	pending: VecDeque<PendingRenewal>,
}

#[derive(Debug)]
struct PendingRenewal {
	resource_server: ResourceServerId,
	waiters: Vec<oneshot::Sender<()>>,
}

/// Owner of the renewal slot, the pending queue, and the cooldown stamp.
pub struct RenewalGovernor {
	ledger: Arc<dyn SessionLedger>,
	dispatcher: Arc<dyn RenewalDispatch>,
	cooldown: Duration,
	state: AsyncMutex<GovernorState>,
	/// Counters for slot requests and renewal outcomes.
	pub metrics: Arc<RenewalMetrics>,
}
impl RenewalGovernor {
	/// Creates a governor storing its slot in `ledger` and sending renewals to `dispatcher`.
	pub fn new(
		ledger: Arc<dyn SessionLedger>,
		dispatcher: Arc<dyn RenewalDispatch>,
		cooldown: Duration,
	) -> Self {
		Self {
			ledger,
			dispatcher,
			cooldown,
			state: AsyncMutex::new(GovernorState::default()),
			metrics: Default::default(),
		}
	}

	/// Requests the renewal slot for `resource_server`.
	///
	/// Granted at once when the slot is empty or already held by `resource_server`; otherwise
	/// queued behind the current occupant. Repeated requests for a resource server that is
	/// already queued share its queue entry.
	pub async fn request_slot(&self, resource_server: &ResourceServerId) -> Result<SlotWait> {
		let mut state = self.state.lock().await;

		self.metrics.record_requested();

		match self.ledger.get(&LedgerKey::RenewalSlot).await? {
			None => {
				self.ledger.set(&LedgerKey::RenewalSlot, resource_server.to_string()).await?;

				Ok(SlotWait::Granted)
			},
			Some(occupant) if occupant == resource_server.as_str() => Ok(SlotWait::Granted),
			Some(_) => {
				let (tx, rx) = oneshot::channel();

				match state.pending.iter_mut().find(|p| &p.resource_server == resource_server) {
					Some(entry) => entry.waiters.push(tx),
					None => state.pending.push_back(PendingRenewal {
						resource_server: resource_server.clone(),
						waiters: vec![tx],
					}),
				}

				self.metrics.record_queued();

				Ok(SlotWait::Queued(rx))
			},
		}
	}

	/// Dispatches a renewal for the slot holder unless the cooldown suppresses it.
	///
	/// An empty slot is claimed for `resource_server`. A slot held by another resource server is
	/// left alone and reported as [`RenewalDecision::NotHolder`].
	pub async fn dispatch_if_due(&self, resource_server: &ResourceServerId) -> Result<RenewalDecision> {
		self.dispatch_if_due_at(resource_server, OffsetDateTime::now_utc()).await
	}

	/// Same as [`dispatch_if_due`](Self::dispatch_if_due) with an explicit clock reading.
	pub async fn dispatch_if_due_at(
		&self,
		resource_server: &ResourceServerId,
		now: OffsetDateTime,
	) -> Result<RenewalDecision> {
		let mut state = self.state.lock().await;

		match self.ledger.get(&LedgerKey::RenewalSlot).await? {
			None => self.ledger.set(&LedgerKey::RenewalSlot, resource_server.to_string()).await?,
			Some(occupant) if occupant == resource_server.as_str() => (),
			Some(occupant) => {
				obs::trace_debug(
					EventKind::RenewTokens,
					&format_args!("renewal for {resource_server} skipped; {occupant} holds the slot"),
				);

				return Ok(RenewalDecision::NotHolder);
			},
		}

		if state.last_dispatch.is_some_and(|last| now <= last + self.cooldown) {
			self.metrics.record_suppressed();
			obs::trace_debug(
				EventKind::RenewTokens,
				&format_args!("renewal for {resource_server} suppressed by cooldown"),
			);

			return Ok(RenewalDecision::Suppressed);
		}

		state.last_dispatch = Some(now);

		if let Err(e) = self.dispatcher.dispatch_renewal(resource_server) {
			// Nothing will ever complete this renewal; free the slot for the queue.
			self.release(&mut state).await?;

			return Err(e);
		}

		self.metrics.record_dispatched();

		Ok(RenewalDecision::Dispatched)
	}

	/// Completes the current renewal and promotes the next queued resource server, if any.
	///
	/// Returns the promoted resource server. Safe to call with nothing in flight.
	pub async fn on_renewed(&self) -> Result<Option<ResourceServerId>> {
		let mut state = self.state.lock().await;

		self.metrics.record_completed();

		self.release(&mut state).await
	}

	/// Drops the slot, the cooldown stamp, and every queued waiter.
	pub async fn reset(&self) -> Result<()> {
		let mut state = self.state.lock().await;

		state.pending.clear();
		state.last_dispatch = None;
		self.ledger.remove(&LedgerKey::RenewalSlot).await?;

		Ok(())
	}

	/// Returns a point-in-time view of the governor.
	pub async fn snapshot(&self) -> Result<GovernorSnapshot> {
		let state = self.state.lock().await;

		Ok(GovernorSnapshot {
			occupant: self.ledger.get(&LedgerKey::RenewalSlot).await?,
			pending: state.pending.iter().map(|p| p.resource_server.clone()).collect(),
			last_dispatch: state.last_dispatch,
		})
	}

	async fn release(&self, state: &mut GovernorState) -> Result<Option<ResourceServerId>> {
		self.ledger.remove(&LedgerKey::RenewalSlot).await?;
		state.last_dispatch = None;

		while let Some(next) = state.pending.pop_front() {
			let waiters: Vec<_> = next.waiters.into_iter().filter(|tx| !tx.is_closed()).collect();

			if waiters.is_empty() {
				continue;
			}

			self.ledger.set(&LedgerKey::RenewalSlot, next.resource_server.to_string()).await?;

			for tx in waiters {
				let _ = tx.send(());
			}

			return Ok(Some(next.resource_server));
		}

		Ok(None)
	}
}
impl Debug for RenewalGovernor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalGovernor")
			.field("cooldown", &self.cooldown)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::ledger::MemoryLedger;

	#[derive(Default)]
	struct RecordingDispatch {
		sent: Mutex<Vec<ResourceServerId>>,
		fail: bool,
	}
	impl RenewalDispatch for RecordingDispatch {
		fn dispatch_renewal(&self, resource_server: &ResourceServerId) -> Result<()> {
			if self.fail {
				return Err(ChannelError::closed("background auth").into());
			}

			self.sent.lock().push(resource_server.clone());

			Ok(())
		}
	}

	fn rs(id: &str) -> ResourceServerId {
		ResourceServerId::new(id).expect("Resource server fixture should be valid.")
	}

	fn governor(dispatch: Arc<RecordingDispatch>) -> RenewalGovernor {
		RenewalGovernor::new(Arc::new(MemoryLedger::default()), dispatch, Duration::seconds(1))
	}

	#[tokio::test]
	async fn occupancy_follows_arrival_order_without_requeueing_the_holder() {
		let governor = governor(Default::default());
		let a1 = governor.request_slot(&rs("a")).await.expect("First request should succeed.");
		let b = governor.request_slot(&rs("b")).await.expect("Second request should succeed.");
		let a2 = governor.request_slot(&rs("a")).await.expect("Third request should succeed.");
		let c = governor.request_slot(&rs("c")).await.expect("Fourth request should succeed.");

		assert!(a1.is_granted());
		assert!(a2.is_granted(), "The holder must re-enter without queueing.");
		assert!(!b.is_granted());
		assert!(!c.is_granted());

		let snapshot = governor.snapshot().await.expect("Snapshot should succeed.");

		assert_eq!(snapshot.occupant.as_deref(), Some("a"));
		assert_eq!(snapshot.pending, vec![rs("b"), rs("c")]);

		let SlotWait::Queued(mut b_rx) = b else { unreachable!() };
		let SlotWait::Queued(mut c_rx) = c else { unreachable!() };

		assert_eq!(governor.on_renewed().await.expect("Release should succeed."), Some(rs("b")));
		assert!(b_rx.try_recv().is_ok(), "b must be promoted first.");
		assert!(c_rx.try_recv().is_err(), "c must keep waiting while b holds the slot.");
		assert_eq!(governor.on_renewed().await.expect("Release should succeed."), Some(rs("c")));
		assert!(c_rx.try_recv().is_ok());
		assert_eq!(governor.on_renewed().await.expect("Release should succeed."), None);
		assert_eq!(governor.snapshot().await.expect("Snapshot should succeed.").occupant, None);
	}

	#[tokio::test]
	async fn queued_duplicates_share_one_entry() {
		let governor = governor(Default::default());

		governor.request_slot(&rs("a")).await.expect("Request should succeed.");

		let first = governor.request_slot(&rs("b")).await.expect("Request should succeed.");
		let second = governor.request_slot(&rs("b")).await.expect("Request should succeed.");

		assert_eq!(governor.snapshot().await.expect("Snapshot should succeed.").pending, vec![rs("b")]);

		governor.on_renewed().await.expect("Release should succeed.");

		first.acquired().await.expect("First waiter should be promoted.");
		second.acquired().await.expect("Second waiter should be promoted.");
	}

	#[tokio::test]
	async fn cooldown_coalesces_dispatches() {
		let dispatch = Arc::new(RecordingDispatch::default());
		let governor = governor(dispatch.clone());
		let now = OffsetDateTime::now_utc();
		let api = rs("api1");

		assert_eq!(
			governor.dispatch_if_due_at(&api, now).await.expect("Dispatch should succeed."),
			RenewalDecision::Dispatched
		);
		assert_eq!(
			governor
				.dispatch_if_due_at(&api, now + Duration::milliseconds(500))
				.await
				.expect("Dispatch should succeed."),
			RenewalDecision::Suppressed
		);
		assert_eq!(dispatch.sent.lock().len(), 1);
		assert_eq!(
			governor
				.dispatch_if_due_at(&api, now + Duration::milliseconds(1500))
				.await
				.expect("Dispatch should succeed."),
			RenewalDecision::Dispatched
		);
		assert_eq!(dispatch.sent.lock().len(), 2);
		assert_eq!(governor.metrics.suppressed(), 1);
	}

	#[tokio::test]
	async fn completion_clears_the_cooldown() {
		let dispatch = Arc::new(RecordingDispatch::default());
		let governor = governor(dispatch.clone());
		let now = OffsetDateTime::now_utc();

		governor.dispatch_if_due_at(&rs("a"), now).await.expect("Dispatch should succeed.");
		governor.on_renewed().await.expect("Release should succeed.");
		governor.dispatch_if_due_at(&rs("a"), now).await.expect("Dispatch should succeed.");

		assert_eq!(dispatch.sent.lock().len(), 2);
	}

	#[tokio::test]
	async fn release_on_empty_governor_is_harmless() {
		let governor = governor(Default::default());

		assert_eq!(governor.on_renewed().await.expect("Release should succeed."), None);
		assert_eq!(governor.on_renewed().await.expect("Release should succeed."), None);

		let snapshot = governor.snapshot().await.expect("Snapshot should succeed.");

		assert_eq!(snapshot.occupant, None);
		assert!(snapshot.pending.is_empty());
	}

	#[tokio::test]
	async fn abandoned_waiters_are_skipped_on_promotion() {
		let governor = governor(Default::default());

		governor.request_slot(&rs("a")).await.expect("Request should succeed.");
		drop(governor.request_slot(&rs("b")).await.expect("Request should succeed."));

		let c = governor.request_slot(&rs("c")).await.expect("Request should succeed.");

		assert_eq!(governor.on_renewed().await.expect("Release should succeed."), Some(rs("c")));

		c.acquired().await.expect("c should be promoted past the abandoned entry.");
	}

	#[tokio::test]
	async fn failed_dispatch_frees_the_slot() {
		let dispatch = Arc::new(RecordingDispatch { fail: true, ..Default::default() });
		let governor = governor(dispatch);

		governor.request_slot(&rs("a")).await.expect("Request should succeed.");

		let b = governor.request_slot(&rs("b")).await.expect("Request should succeed.");

		assert!(governor.dispatch_if_due(&rs("a")).await.is_err());

		b.acquired().await.expect("The queue must advance after a failed dispatch.");
	}

	#[tokio::test]
	async fn late_dispatch_leaves_a_newer_occupant_in_place() {
		let dispatch = Arc::new(RecordingDispatch::default());
		let governor = governor(dispatch.clone());

		governor.request_slot(&rs("a")).await.expect("Request should succeed.");
		governor.request_slot(&rs("b")).await.expect("Request should succeed.");
		governor.request_slot(&rs("c")).await.expect("Request should succeed.");
		governor.on_renewed().await.expect("Release should succeed.");
		governor.on_renewed().await.expect("Release should succeed.");

		assert_eq!(
			governor.dispatch_if_due(&rs("b")).await.expect("Dispatch should succeed."),
			RenewalDecision::NotHolder
		);
		assert_eq!(
			governor.snapshot().await.expect("Snapshot should succeed.").occupant.as_deref(),
			Some("c")
		);
		assert!(dispatch.sent.lock().is_empty(), "Nothing may be sent for a former holder.");
	}

	#[tokio::test]
	async fn reset_fails_queued_waiters() {
		let governor = governor(Default::default());

		governor.request_slot(&rs("a")).await.expect("Request should succeed.");

		let b = governor.request_slot(&rs("b")).await.expect("Request should succeed.");

		governor.reset().await.expect("Reset should succeed.");

		assert!(b.acquired().await.is_err());
		assert_eq!(governor.snapshot().await.expect("Snapshot should succeed.").occupant, None);
	}
}
