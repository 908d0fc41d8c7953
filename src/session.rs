//! Session client facade tying the dispatcher, retry policy, coordinator, and teardown
//! together.

mod account;
mod execute;
mod lifecycle;
mod renewal;

pub use account::{ProfileUpdate, Registration};

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	coordinator::{RefreshCoordinator, RenewalMetrics},
	descriptor::ServiceDescriptor,
	dispatch::RequestDispatcher,
	http::ApiTransport,
	retry::RetryPolicy,
	store::CredentialStore,
	teardown::{SessionState, SessionTeardown},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// Authenticated API client with single-flight credential renewal.
///
/// Every clone shares one store, one [`RefreshCoordinator`], and one [`SessionTeardown`],
/// so concurrent calls from any clone collapse into a single renewal when the access
/// credential expires. Calls rejected with 401 are renewed and replayed at most once;
/// everything else reaches the caller untouched.
pub struct SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	descriptor: Arc<ServiceDescriptor>,
	store: Arc<dyn CredentialStore>,
	dispatcher: RequestDispatcher<T>,
	coordinator: Arc<RefreshCoordinator>,
	teardown: Arc<SessionTeardown>,
	policy: RetryPolicy,
}
impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		descriptor: ServiceDescriptor,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let descriptor = Arc::new(descriptor);
		let teardown = Arc::new(SessionTeardown::new(store.clone()));
		let coordinator = Arc::new(RefreshCoordinator::new(
			store.clone(),
			teardown.clone(),
			descriptor.renewal_timeout,
		));
		let dispatcher = RequestDispatcher::new(transport.into(), descriptor.clone(), store.clone());

		Self { descriptor, store, dispatcher, coordinator, teardown, policy: RetryPolicy }
	}

	/// Service descriptor the client targets.
	pub fn descriptor(&self) -> &ServiceDescriptor {
		&self.descriptor
	}

	/// Shared credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Underlying dispatcher; calls made through it bypass renewal.
	pub fn dispatcher(&self) -> &RequestDispatcher<T> {
		&self.dispatcher
	}

	/// Shared refresh coordinator.
	pub fn coordinator(&self) -> &RefreshCoordinator {
		&self.coordinator
	}

	/// Shared teardown hook.
	pub fn teardown(&self) -> &SessionTeardown {
		&self.teardown
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RenewalMetrics {
		self.coordinator.metrics()
	}

	/// Current session state.
	pub fn state(&self) -> SessionState {
		self.teardown.state()
	}

	/// Subscribes to session state changes, e.g. to route the user to login on teardown.
	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.teardown.subscribe()
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a client that provisions its own reqwest transport from the descriptor.
	pub fn new(store: Arc<dyn CredentialStore>, descriptor: ServiceDescriptor) -> Result<Self> {
		let transport = ReqwestTransport::from_descriptor(&descriptor)?;

		Ok(Self::with_transport(store, descriptor, transport))
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			descriptor: self.descriptor.clone(),
			store: self.store.clone(),
			dispatcher: self.dispatcher.clone(),
			coordinator: self.coordinator.clone(),
			teardown: self.teardown.clone(),
			policy: self.policy,
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("descriptor", &self.descriptor)
			.field("coordinator", &self.coordinator)
			.field("teardown", &self.teardown)
			.finish()
	}
}
