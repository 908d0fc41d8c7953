//! Single-exchange dispatch of API calls with status classification.
//!
//! [`RequestDispatcher`] attaches the bearer token, resolves the path against the service
//! descriptor, performs one exchange through the [`ApiTransport`], and folds the status
//! into the crate's error taxonomy. It never retries; replay decisions belong to
//! [`RetryPolicy`](crate::retry::RetryPolicy).

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	descriptor::ServiceDescriptor,
	error::ValidationError,
	http::{ApiRequest, ApiResponse, ApiTransport, PreparedRequest},
	obs::trace_event,
	retry::{self, ResponseClass},
	store::CredentialStore,
};

/// Executes API calls against the service described by a [`ServiceDescriptor`].
pub struct RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	descriptor: Arc<ServiceDescriptor>,
	store: Arc<dyn CredentialStore>,
}
impl<T> RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a dispatcher over a shared transport, descriptor, and store.
	pub fn new(
		transport: Arc<T>,
		descriptor: Arc<ServiceDescriptor>,
		store: Arc<dyn CredentialStore>,
	) -> Self {
		Self { transport, descriptor, store }
	}

	/// Service descriptor the dispatcher resolves paths against.
	pub fn descriptor(&self) -> &ServiceDescriptor {
		&self.descriptor
	}

	/// Dispatches `request` with the access token currently in the store, if any.
	pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let bearer = self.store.get().map(|credential| credential.access_token().clone());

		self.send_with(request, bearer.as_ref()).await
	}

	/// Dispatches `request` with an explicit bearer token (or none).
	///
	/// 2xx responses come back as `Ok`. A 401 maps to [`Error::AuthExpired`], any other
	/// status to [`Error::Validation`], and transport failures to [`Error::Transport`].
	pub async fn send_with(
		&self,
		request: &ApiRequest,
		bearer: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let response = self.exchange(request, bearer).await?;

		match retry::classify_status(response.status) {
			ResponseClass::Success => Ok(response),
			ResponseClass::AuthExpired => {
				trace_event!(
					debug,
					method = %request.method,
					path = %request.path,
					"Access credential rejected."
				);

				Err(Error::AuthExpired { status: response.status })
			},
			ResponseClass::Rejected =>
				Err(ValidationError { status: response.status, body: response.text() }.into()),
		}
	}

	/// Performs the exchange and returns the response whatever its status.
	pub async fn exchange(
		&self,
		request: &ApiRequest,
		bearer: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let url = self.descriptor.resolve(&request.path)?;
		let prepared = PreparedRequest {
			method: request.method,
			url,
			bearer: bearer.cloned(),
			body: request.body.clone(),
		};

		Ok(self.transport.execute(prepared).await?)
	}
}
impl<T> Clone for RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			descriptor: self.descriptor.clone(),
			store: self.store.clone(),
		}
	}
}
impl<T> Debug for RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDispatcher").field("base_url", &self.descriptor.base_url).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{Credential, SubjectId},
		error::{ConfigError, TransportError},
		http::TransportFuture,
		store::MemoryStore,
	};

	struct ScriptedTransport {
		status: u16,
		body: &'static str,
		seen: Mutex<Vec<PreparedRequest>>,
	}
	impl ScriptedTransport {
		fn answering(status: u16, body: &'static str) -> Self {
			Self { status, body, seen: Mutex::default() }
		}
	}
	impl ApiTransport for ScriptedTransport {
		fn execute(&self, request: PreparedRequest) -> TransportFuture<'_> {
			self.seen.lock().push(request);

			let response = ApiResponse::new(self.status, self.body.as_bytes());

			Box::pin(async move { Ok(response) })
		}
	}

	struct FailingTransport;
	impl ApiTransport for FailingTransport {
		fn execute(&self, _request: PreparedRequest) -> TransportFuture<'_> {
			Box::pin(async { Err(TransportError::Io(std::io::Error::other("connection reset"))) })
		}
	}

	fn descriptor() -> Arc<ServiceDescriptor> {
		let base = Url::parse("https://api.example.com/").expect("Base URL fixture should parse.");

		Arc::new(ServiceDescriptor::builder(base).build().expect("Descriptor should validate."))
	}

	fn seeded_store() -> Arc<dyn CredentialStore> {
		let subject = SubjectId::new("user-1").expect("Subject fixture should be valid.");

		Arc::new(MemoryStore::with_credential(Credential::new("T1", "R1", subject)))
	}

	#[tokio::test]
	async fn send_attaches_stored_bearer() {
		let transport = Arc::new(ScriptedTransport::answering(200, "{}"));
		let dispatcher = RequestDispatcher::new(transport.clone(), descriptor(), seeded_store());
		let response =
			dispatcher.send(&ApiRequest::get("/api/Places")).await.expect("2xx should succeed.");

		assert_eq!(response.status, 200);

		let seen = transport.seen.lock();

		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0].url.as_str(), "https://api.example.com/api/Places");
		assert_eq!(seen[0].bearer.as_ref().map(TokenSecret::expose), Some("T1"));
	}

	#[tokio::test]
	async fn unauthorized_maps_to_auth_expired() {
		let transport = Arc::new(ScriptedTransport::answering(401, ""));
		let dispatcher = RequestDispatcher::new(transport, descriptor(), seeded_store());
		let err = dispatcher
			.send(&ApiRequest::get("/api/Places"))
			.await
			.expect_err("401 should surface as an error.");

		assert!(err.is_auth_expired());
	}

	#[tokio::test]
	async fn other_statuses_map_to_validation_with_body() {
		let transport = Arc::new(ScriptedTransport::answering(422, "{\"message\":\"bad\"}"));
		let dispatcher = RequestDispatcher::new(transport.clone(), descriptor(), seeded_store());
		let err = dispatcher
			.send_with(&ApiRequest::post("/api/Places"), None)
			.await
			.expect_err("422 should surface as an error.");

		match err {
			Error::Validation(ValidationError { status, body }) => {
				assert_eq!(status, 422);
				assert!(body.contains("bad"));
			},
			other => panic!("Unexpected error: {other:?}"),
		}

		assert!(transport.seen.lock()[0].bearer.is_none());
	}

	#[tokio::test]
	async fn foreign_origin_paths_never_reach_the_transport() {
		let transport = Arc::new(ScriptedTransport::answering(200, "{}"));
		let dispatcher = RequestDispatcher::new(transport.clone(), descriptor(), seeded_store());

		for path in ["https://evil.example/steal", "//evil.example/steal"] {
			let err = dispatcher
				.send(&ApiRequest::get(path))
				.await
				.expect_err("A path leaving the base URL should be refused.");

			assert!(matches!(err, Error::Config(ConfigError::InvalidEndpoint { .. })));
		}

		assert!(transport.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn transport_failures_pass_through() {
		let dispatcher =
			RequestDispatcher::new(Arc::new(FailingTransport), descriptor(), seeded_store());
		let err = dispatcher
			.send(&ApiRequest::get("/api/Places"))
			.await
			.expect_err("Transport failure should surface.");

		assert!(matches!(err, Error::Transport(TransportError::Io(_))));
	}
}
