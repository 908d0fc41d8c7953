// self
use crate::{
	_prelude::*,
	descriptor::{AuthEndpoints, ServiceDescriptor},
};

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Base URL must use HTTPS unless it points at a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry path segments onto which endpoints are joined.
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeBase {
		/// Base URL that failed validation.
		url: String,
	},
	/// Endpoint paths must be absolute (`/...`).
	#[error("The {endpoint} endpoint path must start with `/`: {path}.")]
	RelativeEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
	},
	/// Timeouts must be non-zero.
	#[error("The {timeout} timeout must be greater than zero.")]
	ZeroTimeout {
		/// Which timeout failed validation.
		timeout: &'static str,
	},
}

/// Builder for [`ServiceDescriptor`] values.
#[derive(Debug)]
pub struct ServiceDescriptorBuilder {
	/// Base URL for every request.
	pub base_url: Url,
	/// Endpoint paths.
	pub endpoints: AuthEndpoints,
	/// Renewal call timeout.
	pub renewal_timeout: Duration,
	/// Optional per-request timeout.
	pub request_timeout: Option<Duration>,
}
impl ServiceDescriptorBuilder {
	/// Creates a new builder seeded with the provided base URL and default endpoints.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: AuthEndpoints::default(),
			renewal_timeout: ServiceDescriptor::DEFAULT_RENEWAL_TIMEOUT,
			request_timeout: None,
		}
	}

	/// Overrides the login endpoint path.
	pub fn login_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Overrides the renewal endpoint path.
	pub fn refresh_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the logout endpoint path.
	pub fn logout_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.logout = path.into();

		self
	}

	/// Overrides the profile endpoint path.
	pub fn profile_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.profile = path.into();

		self
	}

	/// Overrides the registration endpoint path.
	pub fn register_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.register = path.into();

		self
	}

	/// Overrides the renewal call timeout (defaults to 10 seconds).
	pub fn renewal_timeout(mut self, timeout: Duration) -> Self {
		self.renewal_timeout = timeout;

		self
	}

	/// Sets a per-request timeout for the HTTP client.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ServiceDescriptor, DescriptorError> {
		let descriptor = ServiceDescriptor {
			base_url: self.base_url,
			endpoints: self.endpoints,
			renewal_timeout: self.renewal_timeout,
			request_timeout: self.request_timeout,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ServiceDescriptor {
	/// Validates invariants for the descriptor.
	pub fn validate(&self) -> Result<(), DescriptorError> {
		validate_base_url(&self.base_url)?;
		validate_endpoint("login", &self.endpoints.login)?;
		validate_endpoint("refresh", &self.endpoints.refresh)?;
		validate_endpoint("logout", &self.endpoints.logout)?;
		validate_endpoint("profile", &self.endpoints.profile)?;
		validate_endpoint("register", &self.endpoints.register)?;
		validate_endpoint("forgot_password", &self.endpoints.forgot_password)?;
		validate_endpoint("reset_password", &self.endpoints.reset_password)?;
		validate_endpoint("confirm_email", &self.endpoints.confirm_email)?;

		if self.renewal_timeout.is_zero() {
			return Err(DescriptorError::ZeroTimeout { timeout: "renewal" });
		}
		if self.request_timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(DescriptorError::ZeroTimeout { timeout: "request" });
		}

		Ok(())
	}
}

fn validate_base_url(url: &Url) -> Result<(), DescriptorError> {
	if url.cannot_be_a_base() {
		return Err(DescriptorError::CannotBeBase { url: url.to_string() });
	}

	let loopback = url.host_str().is_some_and(|host| LOOPBACK_HOSTS.contains(&host));

	match url.scheme() {
		"https" => Ok(()),
		"http" if loopback => Ok(()),
		_ => Err(DescriptorError::InsecureBaseUrl { url: url.to_string() }),
	}
}

fn validate_endpoint(name: &'static str, path: &str) -> Result<(), DescriptorError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(DescriptorError::RelativeEndpoint { endpoint: name, path: path.to_owned() })
	}
}
