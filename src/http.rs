//! Transport primitives for outbound API calls.
//!
//! The module exposes [`ApiTransport`], the crate's only dependency on an HTTP stack,
//! together with the request/response values that cross it. The dispatcher resolves the
//! request path, decides which bearer token (if any) to attach, and hands the transport a
//! fully [`PreparedRequest`]; the transport performs exactly one network exchange and never
//! interprets status codes.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransportError},
};
#[cfg(feature = "reqwest")] use crate::descriptor::ServiceDescriptor;

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// HTTP methods used by API calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the method's wire name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Logical API call, opaque to the refresh machinery and replayable as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the descriptor's base URL.
	pub path: String,
	/// Pre-encoded JSON body, if any.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without a body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Attaches a JSON body.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(ConfigError::RequestBody)?);

		Ok(self)
	}
}

/// Fully resolved request handed to an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Bearer token to send in the `Authorization` header, if any.
	pub bearer: Option<TokenSecret>,
	/// Pre-encoded JSON body, if any.
	pub body: Option<Vec<u8>>,
}

/// Completed HTTP exchange, successful or not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the body lossily decoded as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T, TransportError>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransportError::Malformed { source, status: self.status })
	}
}

/// Abstraction over HTTP stacks capable of executing prepared API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// dispatcher, the renewal path, and every concurrently replayed call. Each invocation
/// performs exactly one exchange: no retries, no redirects to other origins, and no
/// interpretation of the status code.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and returns the raw response.
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the descriptor's request timeout.
	pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder();

		if let Some(timeout) = descriptor.request_timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self(builder.build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let endpoint = request.url.path().to_owned();
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, request.url);

			if let Some(bearer) = request.bearer.as_ref() {
				builder = builder.header(AUTHORIZATION, bearer.bearer());
			}
			if let Some(body) = request.body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}

			let response = builder
				.send()
				.await
				.map_err(|e| TransportError::network(endpoint.as_str(), e))?;
			let status = response.status().as_u16();
			let body = response
				.bytes()
				.await
				.map_err(|e| TransportError::network(endpoint.as_str(), e))?;

			Ok(ApiResponse::new(status, body.to_vec()))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	struct Payload {
		#[allow(dead_code)]
		name: String,
	}

	#[test]
	fn json_body_is_encoded_once() {
		let request = ApiRequest::post("/api/Places")
			.json(&serde_json::json!({ "city": "Lisbon" }))
			.expect("JSON body should encode.");

		assert_eq!(request.method, Method::Post);
		assert_eq!(request.body.as_deref(), Some(&b"{\"city\":\"Lisbon\"}"[..]));
	}

	#[test]
	fn malformed_json_reports_field_path() {
		let response = ApiResponse::new(200, &b"{\"name\": 7}"[..]);
		let err = response.json::<Payload>().expect_err("Wrong field type should fail.");

		match err {
			TransportError::Malformed { source, status } => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "name");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn success_range_is_2xx() {
		assert!(ApiResponse::new(204, Vec::new()).is_success());
		assert!(!ApiResponse::new(401, Vec::new()).is_success());
		assert!(!ApiResponse::new(302, Vec::new()).is_success());
	}
}
