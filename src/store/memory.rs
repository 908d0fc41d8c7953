//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Credential, Profile},
	store::{CredentialStore, SessionSlots, StoreError},
};

/// Non-durable storage backend that keeps the session slots in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<SessionSlots>>);
impl MemoryStore {
	/// Creates a store pre-populated with a credential.
	pub fn with_credential(credential: Credential) -> Self {
		let mut slots = SessionSlots::default();

		slots.store_credential(credential);

		Self(Arc::new(RwLock::new(slots)))
	}

	/// Returns a copy of the raw slots.
	pub fn snapshot(&self) -> SessionSlots {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> Option<Credential> {
		self.0.read().credential()
	}

	fn set(&self, credential: Credential) -> Result<(), StoreError> {
		self.0.write().store_credential(credential);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		*self.0.write() = SessionSlots::default();

		Ok(())
	}

	fn profile(&self) -> Option<Profile> {
		self.0.read().profile.clone()
	}

	fn set_profile(&self, profile: Profile) -> Result<(), StoreError> {
		self.0.write().profile = Some(profile);

		Ok(())
	}
}
