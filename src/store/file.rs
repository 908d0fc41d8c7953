//! File-backed [`CredentialStore`] that keeps the session across process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, Profile},
	store::{CredentialStore, SessionSlots, StoreError},
};

/// Persists the session slots to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<SessionSlots>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<SessionSlots, StoreError> {
		if !path.exists() {
			return Ok(SessionSlots::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(SessionSlots::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, slots: &SessionSlots) -> Result<(), StoreError> {
		if slots.is_empty() {
			return match fs::remove_file(&self.path) {
				Ok(()) => Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to remove {}: {e}", self.path.display()),
				}),
			};
		}

		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(slots).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize session slots: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> Option<Credential> {
		self.inner.read().credential()
	}

	fn set(&self, credential: Credential) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.store_credential(credential);

		self.persist_locked(&guard)
	}

	fn clear(&self) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		*guard = SessionSlots::default();

		self.persist_locked(&guard)
	}

	fn profile(&self) -> Option<Profile> {
		self.inner.read().profile.clone()
	}

	fn set_profile(&self, profile: Profile) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.profile = Some(profile);

		self.persist_locked(&guard)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::auth::SubjectId;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"session_broker_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn credential() -> Credential {
		let subject = SubjectId::new("user-demo").expect("Failed to build subject fixture.");

		Credential::new("access-token", "renewal-token", subject)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let credential = credential();

		store.set(credential.clone()).expect("Failed to save credential to file store.");
		store
			.set_profile(serde_json::json!({ "username": "demo" }))
			.expect("Failed to save profile to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = reopened.get().expect("File store lost credential after reopen.");

		assert_eq!(fetched.access_token().expose(), "access-token");
		assert_eq!(fetched.renewal_token().expose(), "renewal-token");
		assert_eq!(fetched.subject_id().as_ref(), "user-demo");
		assert_eq!(reopened.profile(), Some(serde_json::json!({ "username": "demo" })));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn clear_removes_every_slot_and_the_file() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store.set(credential()).expect("Failed to save credential to file store.");
		assert!(path.exists());

		store.clear().expect("Clearing the file store should succeed.");

		assert!(store.get().is_none());
		assert!(store.profile().is_none());
		assert!(!path.exists());

		let reopened = FileStore::open(&path).expect("Failed to reopen cleared store.");

		assert!(reopened.get().is_none());
		store.clear().expect("Clearing an already empty store should be a no-op.");
	}
}
