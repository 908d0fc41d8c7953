//! Crate-level error types shared by the dispatcher, coordinator, stores, and session flows.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced to callers of the session client.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, malformed payload); never triggers renewal.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Business endpoint rejected the call for a reason unrelated to authentication.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Access credential was rejected (expired or invalid).
	#[error("Access credential was rejected with status {status}.")]
	AuthExpired {
		/// HTTP status returned by the endpoint.
		status: u16,
	},
	/// Renewal failed; the session has been torn down and must be re-established.
	#[error("Session expired: {0}")]
	RenewalFailed(#[from] RenewalFailure),
	/// Login endpoint refused the supplied subject credentials.
	#[error("Login was rejected with status {status}: {message}.")]
	LoginRejected {
		/// HTTP status returned by the login endpoint.
		status: u16,
		/// Server-supplied message, or a generic fallback.
		message: String,
	},
	/// An unauthenticated account call (registration, password reset, email confirmation)
	/// was refused.
	#[error("Account request was rejected with status {status}: {message}.")]
	AccountRejected {
		/// HTTP status returned by the endpoint.
		status: u16,
		/// Server-supplied message, or a generic fallback.
		message: String,
	},
}
impl Error {
	/// Returns `true` when the error represents an expired-credential failure.
	pub fn is_auth_expired(&self) -> bool {
		matches!(self, Self::AuthExpired { .. })
	}

	/// Returns the HTTP status attached to the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthExpired { status }
			| Self::LoginRejected { status, .. }
			| Self::AccountRejected { status, .. } => Some(*status),
			Self::Validation(err) => Some(err.status),
			Self::RenewalFailed(RenewalFailure::Rejected { status }) => Some(*status),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while assembling a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint path cannot be joined onto the base URL, or would leave its origin or prefix.
	#[error("Endpoint path `{path}` is invalid.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure, absent when the path escapes the base URL.
		#[source]
		source: Option<url::ParseError>,
	},
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestBody(#[source] serde_json::Error),
	/// Service descriptor validation failed.
	#[error(transparent)]
	Descriptor(#[from] crate::descriptor::DescriptorError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, undecodable payloads).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Path of the endpoint that was being called.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Response body was not the expected JSON document.
	#[error("Response body is malformed JSON.")]
	Malformed {
		/// Structured parsing failure including the failing field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint: endpoint.into(), source: Box::new(src) }
	}
}

/// Non-authentication rejection returned by a business endpoint.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Endpoint rejected the request with status {status}.")]
pub struct ValidationError {
	/// HTTP status returned by the endpoint.
	pub status: u16,
	/// Raw response body, lossily decoded as UTF-8.
	pub body: String,
}

/// Reasons a renewal cycle failed; cloned to every caller waiting on the cycle.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RenewalFailure {
	/// No renewal credential was stored when renewal was required.
	#[error("No renewal credential is stored.")]
	MissingCredential,
	/// Renewal endpoint answered with a non-success status.
	#[error("Renewal endpoint rejected the request with status {status}.")]
	Rejected {
		/// HTTP status returned by the renewal endpoint.
		status: u16,
	},
	/// Renewal call did not complete within the configured timeout.
	#[error("Renewal call timed out after {timeout_ms} ms.")]
	TimedOut {
		/// Timeout that elapsed, in milliseconds.
		timeout_ms: u64,
	},
	/// Renewal call failed in transport.
	#[error("Renewal call failed in transport: {message}")]
	Transport {
		/// Transport error rendered as text.
		message: String,
	},
	/// Renewal response could not be decoded.
	#[error("Renewal response is malformed: {message}")]
	Malformed {
		/// Decoding error rendered as text.
		message: String,
	},
	/// The renewing task was dropped before reporting an outcome.
	#[error("Renewal was abandoned before completing.")]
	Abandoned,
}
impl RenewalFailure {
	/// Converts a dispatcher error raised by the renewal call into a renewal failure.
	pub fn from_dispatch(err: Error) -> Self {
		match err {
			Error::AuthExpired { status } | Error::LoginRejected { status, .. } =>
				Self::Rejected { status },
			Error::Validation(err) => Self::Rejected { status: err.status },
			Error::Transport(TransportError::Malformed { source, .. }) =>
				Self::Malformed { message: source.to_string() },
			Error::RenewalFailed(failure) => failure,
			other => Self::Transport { message: other.to_string() },
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn dispatch_errors_map_to_renewal_failures() {
		assert_eq!(
			RenewalFailure::from_dispatch(Error::AuthExpired { status: 401 }),
			RenewalFailure::Rejected { status: 401 },
		);
		assert_eq!(
			RenewalFailure::from_dispatch(
				ValidationError { status: 400, body: "bad token".into() }.into()
			),
			RenewalFailure::Rejected { status: 400 },
		);

		let io = TransportError::Io(std::io::Error::other("connection reset"));

		assert!(matches!(
			RenewalFailure::from_dispatch(io.into()),
			RenewalFailure::Transport { .. }
		));
	}

	#[test]
	fn status_is_exposed_for_http_failures() {
		assert_eq!(Error::AuthExpired { status: 401 }.status(), Some(401));
		assert_eq!(Error::from(RenewalFailure::Rejected { status: 403 }).status(), Some(403));
		assert_eq!(Error::from(RenewalFailure::Abandoned).status(), None);
		assert!(Error::AuthExpired { status: 401 }.is_auth_expired());
	}
}
