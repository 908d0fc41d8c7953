//! Single-flight bearer-token renewal for REST clients: one refresh call per expiry storm,
//! FIFO replay of every affected request, and deterministic session teardown when renewal
//! fails.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod coordinator;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod obs;
pub mod retry;
pub mod session;
pub mod store;
pub mod teardown;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Credential, SubjectId},
		descriptor::ServiceDescriptor,
		http::ReqwestTransport,
		session::SessionClient,
		store::{CredentialStore, MemoryStore},
	};

	/// Session client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = SessionClient<ReqwestTransport>;

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Builds a credential fixture for the provided token pair.
	pub fn test_credential(access: &str, renewal: &str, subject: &str) -> Credential {
		let subject = SubjectId::new(subject).expect("Subject fixture should be valid.");

		Credential::new(access, renewal, subject)
	}

	/// Constructs a [`SessionClient`] backed by an in-memory store and the reqwest transport
	/// used across integration tests.
	pub fn build_reqwest_test_client(
		descriptor: ServiceDescriptor,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		build_reqwest_test_client_with_store(descriptor, MemoryStore::default())
	}

	/// Same as [`build_reqwest_test_client`] but starts from a signed-in session.
	pub fn build_seeded_reqwest_test_client(
		descriptor: ServiceDescriptor,
		credential: Credential,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		build_reqwest_test_client_with_store(descriptor, MemoryStore::with_credential(credential))
	}

	fn build_reqwest_test_client_with_store(
		descriptor: ServiceDescriptor,
		backend: MemoryStore,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(backend);
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = SessionClient::with_transport(store, descriptor, test_reqwest_transport());

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
