//! Session teardown: clears stored credentials and tells the application to re-authenticate.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::watch;
// self
use crate::{_prelude::*, obs::trace_event, store::CredentialStore};

/// Authentication state published to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
	/// A credential is stored and calls are authenticated.
	Authenticated,
	/// No usable credential; the application must send the user to login.
	Unauthenticated,
}

/// Idempotent teardown hook shared by the coordinator and the logout flow.
pub struct SessionTeardown {
	store: Arc<dyn CredentialStore>,
	state: watch::Sender<SessionState>,
	invocations: AtomicU64,
}
impl SessionTeardown {
	/// Creates a teardown hook whose initial state reflects the store's contents.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		let initial = if store.get().is_some() {
			SessionState::Authenticated
		} else {
			SessionState::Unauthenticated
		};
		let (state, _) = watch::channel(initial);

		Self { store, state, invocations: AtomicU64::new(0) }
	}

	/// Clears the store and publishes [`SessionState::Unauthenticated`].
	///
	/// Returns `true` if the session was authenticated before the call. Calling it again
	/// is a no-op apart from the invocation counter.
	pub fn teardown(&self) -> bool {
		self.invocations.fetch_add(1, Ordering::Relaxed);

		if let Err(_e) = self.store.clear() {
			trace_event!(warn, error = %_e, "Failed to clear the credential store during teardown.");
		}

		let changed = self.state.send_if_modified(|state| {
			if *state == SessionState::Unauthenticated {
				false
			} else {
				*state = SessionState::Unauthenticated;

				true
			}
		});

		if changed {
			trace_event!(info, "Session torn down; re-authentication required.");
		}

		changed
	}

	/// Publishes [`SessionState::Authenticated`] after a successful login.
	pub(crate) fn mark_authenticated(&self) {
		self.state.send_if_modified(|state| {
			if *state == SessionState::Authenticated {
				false
			} else {
				*state = SessionState::Authenticated;

				true
			}
		});
	}

	/// Current session state.
	pub fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	/// Subscribes to session state changes.
	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state.subscribe()
	}

	/// Number of times [`teardown`](Self::teardown) has been called.
	pub fn invocations(&self) -> u64 {
		self.invocations.load(Ordering::Relaxed)
	}
}
impl Debug for SessionTeardown {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTeardown")
			.field("state", &self.state())
			.field("invocations", &self.invocations())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{Credential, SubjectId},
		store::MemoryStore,
	};

	fn seeded_store() -> Arc<MemoryStore> {
		let subject = SubjectId::new("user-1").expect("Subject fixture should be valid.");
		let store = MemoryStore::with_credential(Credential::new("T1", "R1", subject));

		Arc::new(store)
	}

	#[test]
	fn initial_state_follows_store() {
		let empty: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
		let seeded: Arc<dyn CredentialStore> = seeded_store();

		assert_eq!(SessionTeardown::new(empty).state(), SessionState::Unauthenticated);
		assert_eq!(SessionTeardown::new(seeded).state(), SessionState::Authenticated);
	}

	#[test]
	fn teardown_is_idempotent() {
		let store = seeded_store();
		let teardown = SessionTeardown::new(store.clone());
		let mut events = teardown.subscribe();

		assert!(teardown.teardown());
		assert!(events.has_changed().expect("Sender should still be alive."));
		events.borrow_and_update();

		assert!(!teardown.teardown());
		assert!(!events.has_changed().expect("Sender should still be alive."));
		assert!(store.get().is_none());
		assert!(store.snapshot().is_empty());
		assert_eq!(teardown.state(), SessionState::Unauthenticated);
		assert_eq!(teardown.invocations(), 2);
	}

	#[test]
	fn mark_authenticated_reopens_session() {
		let store = seeded_store();
		let teardown = SessionTeardown::new(store);

		teardown.teardown();
		teardown.mark_authenticated();

		assert_eq!(teardown.state(), SessionState::Authenticated);
		assert!(teardown.teardown());
	}
}
