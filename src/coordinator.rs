//! Single-flight renewal coordination with FIFO fan-out of the outcome.
//!
//! [`RefreshCoordinator`] owns the process-wide refresh state and wait queue. A caller that
//! observed an expired credential calls [`RefreshCoordinator::begin`], a synchronous step
//! that either hands back an already-renewed credential, queues the caller behind the
//! renewal in flight, or makes it the driver of a new renewal cycle. The flip from `Idle`
//! to `Refreshing` happens inside that step, before the driver suspends on the network,
//! so any number of concurrent expiries collapse into one renewal call.
//!
//! The driver reports the outcome through [`RenewalTicket::report_outcome`]: on success the
//! new credential reaches the store before any waiter is woken; on failure the session is
//! torn down once. Waiters are then resolved in arrival order and the state returns to
//! `Idle` in the same critical section. A ticket dropped without reporting (its task was
//! cancelled) resolves every waiter with [`RenewalFailure::Abandoned`].

mod metrics;

pub use metrics::RenewalMetrics;

// std
use std::collections::vec_deque;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	error::RenewalFailure,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_event},
	store::CredentialStore,
	teardown::{SessionState, SessionTeardown},
};

/// Outcome fanned out to every caller of a renewal cycle.
pub type RenewalResult = Result<Credential, RenewalFailure>;

/// Process-wide renewal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
	/// No renewal outstanding.
	Idle,
	/// Exactly one renewal outstanding.
	Refreshing,
}

/// Insertion-ordered queue of resolution hooks.
#[derive(Debug)]
pub struct WaitQueue<T>(VecDeque<T>);
impl<T> WaitQueue<T> {
	/// Appends a hook at the back of the queue.
	pub fn push(&mut self, hook: T) {
		self.0.push_back(hook);
	}

	/// Number of queued hooks.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Empties the queue, yielding hooks in arrival order.
	pub fn drain(&mut self) -> vec_deque::IntoIter<T> {
		std::mem::take(&mut self.0).into_iter()
	}
}
impl<T> Default for WaitQueue<T> {
	fn default() -> Self {
		Self(VecDeque::new())
	}
}

/// Result of [`RefreshCoordinator::begin`].
pub enum Acquisition<'a> {
	/// The store already holds a credential newer than the one that failed.
	Current(Credential),
	/// A renewal is in flight; await its outcome.
	Queued(PendingRenewal),
	/// The caller drives a new renewal cycle.
	Driver(RenewalTicket<'a>),
	/// The session was already torn down; there is nothing to renew.
	SignedOut,
}
impl Debug for Acquisition<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Current(credential) =>
				f.debug_tuple("Acquisition::Current").field(credential).finish(),
			Self::Queued(_) => f.write_str("Acquisition::Queued"),
			Self::Driver(_) => f.write_str("Acquisition::Driver"),
			Self::SignedOut => f.write_str("Acquisition::SignedOut"),
		}
	}
}

/// Caller queued behind an in-flight renewal.
#[derive(Debug)]
pub struct PendingRenewal(oneshot::Receiver<RenewalResult>);
impl PendingRenewal {
	/// Waits for the in-flight renewal to finish.
	pub async fn wait(self) -> RenewalResult {
		self.0.await.unwrap_or(Err(RenewalFailure::Abandoned))
	}
}

/// Exclusive right to finish the current renewal cycle.
pub struct RenewalTicket<'a> {
	coordinator: &'a RefreshCoordinator,
	credential: Option<Credential>,
	reported: bool,
}
impl RenewalTicket<'_> {
	/// Credential read from the store when the cycle started, if any.
	pub fn credential(&self) -> Option<&Credential> {
		self.credential.as_ref()
	}

	/// Publishes the renewal outcome to the store, the waiters, and the caller.
	pub fn report_outcome(mut self, outcome: RenewalResult) -> RenewalResult {
		self.reported = true;
		self.coordinator.report_renewal_outcome(&outcome);

		outcome
	}
}
impl Drop for RenewalTicket<'_> {
	fn drop(&mut self) {
		if !self.reported {
			trace_event!(warn, "Renewal driver dropped before reporting an outcome.");

			self.coordinator.report_renewal_outcome(&Err(RenewalFailure::Abandoned));
		}
	}
}

struct CoordinatorState {
	phase: RefreshState,
	waiters: WaitQueue<oneshot::Sender<RenewalResult>>,
}

/// Owner of the refresh state machine and its wait queue.
pub struct RefreshCoordinator {
	store: Arc<dyn CredentialStore>,
	teardown: Arc<SessionTeardown>,
	renewal_timeout: Duration,
	metrics: RenewalMetrics,
	state: Mutex<CoordinatorState>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator over the shared store and teardown hook.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		teardown: Arc<SessionTeardown>,
		renewal_timeout: Duration,
	) -> Self {
		Self {
			store,
			teardown,
			renewal_timeout,
			metrics: RenewalMetrics::default(),
			state: Mutex::new(CoordinatorState {
				phase: RefreshState::Idle,
				waiters: WaitQueue::default(),
			}),
		}
	}

	/// Current refresh state.
	pub fn state(&self) -> RefreshState {
		self.state.lock().phase
	}

	/// Number of callers queued behind the renewal in flight.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	/// Registers a caller whose call failed while sending `stale` (or no token).
	///
	/// Never suspends. When it returns [`Acquisition::Driver`] the state is already
	/// `Refreshing`, so every later caller is queued until the ticket reports. Callers whose
	/// 401 arrives after the session was torn down get [`Acquisition::SignedOut`] and start
	/// no cycle.
	pub fn begin(&self, stale: Option<&TokenSecret>) -> Acquisition<'_> {
		let mut state = self.state.lock();

		if state.phase == RefreshState::Refreshing {
			let (hook, pending) = oneshot::channel();

			state.waiters.push(hook);
			self.metrics.record_queued();

			trace_event!(
				debug,
				waiting = state.waiters.len(),
				"Renewal in progress; queueing caller."
			);

			return Acquisition::Queued(PendingRenewal(pending));
		}

		let current = self.store.get();

		if let Some(credential) = current.as_ref() {
			let renewed_elsewhere = match stale {
				Some(stale) => credential.access_token() != stale,
				None => true,
			};

			if renewed_elsewhere {
				self.metrics.record_cached();

				return Acquisition::Current(credential.clone());
			}
		} else if self.teardown.state() == SessionState::Unauthenticated {
			trace_event!(debug, "Session already torn down; skipping renewal.");

			return Acquisition::SignedOut;
		}

		state.phase = RefreshState::Refreshing;
		self.metrics.record_renewal();

		trace_event!(debug, "Starting renewal cycle.");

		Acquisition::Driver(RenewalTicket { coordinator: self, credential: current, reported: false })
	}

	/// Returns a credential valid for replaying a call that failed while sending `stale`.
	///
	/// Drivers run `renew` with the stored credential under the renewal timeout; an elapsed
	/// timeout counts as [`RenewalFailure::TimedOut`]. Queued callers receive the driver's
	/// outcome.
	pub async fn acquire_credential<F, Fut>(
		&self,
		stale: Option<&TokenSecret>,
		renew: F,
	) -> RenewalResult
	where
		F: FnOnce(Credential) -> Fut,
		Fut: Future<Output = RenewalResult>,
	{
		let ticket = match self.begin(stale) {
			Acquisition::Current(credential) => return Ok(credential),
			Acquisition::Queued(pending) => return pending.wait().await,
			Acquisition::Driver(ticket) => ticket,
			Acquisition::SignedOut => return Err(RenewalFailure::MissingCredential),
		};
		let Some(current) = ticket.credential().cloned() else {
			return ticket.report_outcome(Err(RenewalFailure::MissingCredential));
		};
		let span = FlowSpan::new(FlowKind::Renewal, "acquire_credential");

		obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Attempt);

		let outcome =
			match tokio::time::timeout(self.renewal_timeout, span.instrument(renew(current))).await
			{
				Ok(outcome) => outcome,
				Err(_) => Err(RenewalFailure::TimedOut {
					timeout_ms: u64::try_from(self.renewal_timeout.as_millis())
						.unwrap_or(u64::MAX),
				}),
			};

		match &outcome {
			Ok(_) => obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Failure),
		}

		ticket.report_outcome(outcome)
	}

	// Only the ticket holder leaves `Refreshing`, so store IO runs before the lock is taken.
	fn report_renewal_outcome(&self, outcome: &RenewalResult) {
		match outcome {
			Ok(credential) => {
				if let Err(_e) = self.store.set(credential.clone()) {
					trace_event!(warn, error = %_e, "Failed to persist the renewed credential.");
				}

				self.metrics.record_success();
			},
			Err(RenewalFailure::Abandoned) => {
				self.metrics.record_failure();
			},
			Err(_failure) => {
				self.metrics.record_failure();

				trace_event!(warn, failure = %_failure, "Renewal failed; tearing the session down.");

				self.teardown.teardown();
			},
		}

		let mut state = self.state.lock();
		let waiters = state.waiters.drain();

		trace_event!(debug, waiters = waiters.len(), "Resolving queued callers.");

		for hook in waiters {
			let _ = hook.send(outcome.clone());
		}

		state.phase = RefreshState::Idle;
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("waiting", &state.waiters.len())
			.field("renewal_timeout", &self.renewal_timeout)
			.finish()
	}
}
