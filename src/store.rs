//! Credential storage contract and built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Credential, Profile, SubjectId, TokenSecret},
};

/// Storage backend contract for the current session's credential and profile snapshot.
///
/// Reads are infallible, in-memory lookups. Writes update the in-memory view before any
/// persistence work, so a [`set`](CredentialStore::set) or [`clear`](CredentialStore::clear)
/// is visible to the next [`get`](CredentialStore::get) even when persisting fails.
///
/// Writes are synchronous and may block on disk IO (see [`FileStore`]); the refresh
/// coordinator performs them outside its lock, on the task that drove the renewal.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current credential, if one is stored.
	fn get(&self) -> Option<Credential>;

	/// Replaces the stored credential.
	fn set(&self, credential: Credential) -> Result<(), StoreError>;

	/// Removes the credential and the cached profile.
	fn clear(&self) -> Result<(), StoreError>;

	/// Returns the cached profile snapshot, if any.
	fn profile(&self) -> Option<Profile>;

	/// Replaces the cached profile snapshot.
	fn set_profile(&self, profile: Profile) -> Result<(), StoreError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// The four persisted session slots, each independently optional.
///
/// Field names on the wire match the keys the web client kept in local storage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSlots {
	/// Current access token.
	#[serde(rename = "token")]
	pub access_token: Option<TokenSecret>,
	/// Current renewal token.
	#[serde(rename = "refreshToken")]
	pub renewal_token: Option<TokenSecret>,
	/// Current subject identifier.
	#[serde(rename = "userId")]
	pub subject_id: Option<SubjectId>,
	/// Cached profile snapshot.
	#[serde(rename = "user")]
	pub profile: Option<Profile>,
	/// Local issue instant of the stored credential.
	#[serde(rename = "issuedAt", skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<OffsetDateTime>,
}
impl SessionSlots {
	/// Assembles a credential when the access, renewal, and subject slots are all present.
	pub fn credential(&self) -> Option<Credential> {
		let access = self.access_token.as_ref()?;
		let renewal = self.renewal_token.as_ref()?;
		let subject = self.subject_id.clone()?;
		let issued_at = self.issued_at.unwrap_or(OffsetDateTime::UNIX_EPOCH);

		Some(Credential::issued_at(access.expose(), renewal.expose(), subject, issued_at))
	}

	/// Writes the credential into its slots, leaving the profile untouched.
	pub fn store_credential(&mut self, credential: Credential) {
		self.access_token = Some(credential.access_token().clone());
		self.renewal_token = Some(credential.renewal_token().clone());
		self.subject_id = Some(credential.subject_id().clone());
		self.issued_at = Some(credential.when_issued());
	}

	/// Returns `true` when every slot is empty.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none()
			&& self.renewal_token.is_none()
			&& self.subject_id.is_none()
			&& self.profile.is_none()
	}
}
