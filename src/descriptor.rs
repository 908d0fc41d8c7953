//! Service descriptor: where the auth endpoints live and how long renewal may take.
//!
//! Descriptors are plain serde data so applications can load them from their own
//! configuration files, and are validated once at build time by
//! [`ServiceDescriptorBuilder`].

/// Builder API for assembling service descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Endpoint paths, relative to the descriptor's base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
	/// Login endpoint exchanging subject credentials for a token pair.
	pub login: String,
	/// Renewal endpoint exchanging a renewal token for a new access token.
	pub refresh: String,
	/// Best-effort logout endpoint invalidating the renewal token.
	pub logout: String,
	/// Endpoint returning (GET) and updating (PUT) the signed-in subject's profile.
	pub profile: String,
	/// Unauthenticated account registration endpoint.
	pub register: String,
	/// Unauthenticated endpoint mailing a password reset token.
	pub forgot_password: String,
	/// Unauthenticated endpoint redeeming a password reset token.
	pub reset_password: String,
	/// Unauthenticated endpoint redeeming an email confirmation token.
	pub confirm_email: String,
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "/api/Auth/Login".into(),
			refresh: "/api/Auth/RefreshToken".into(),
			logout: "/api/Auth/Logout".into(),
			profile: "/api/Auth/Profile".into(),
			register: "/api/Auth/Register".into(),
			forgot_password: "/api/Auth/ForgotPassword".into(),
			reset_password: "/api/Auth/ResetPassword".into(),
			confirm_email: "/api/Auth/ConfirmEmail".into(),
		}
	}
}

/// Immutable service descriptor consumed by the session client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Auth endpoint paths.
	#[serde(default)]
	pub endpoints: AuthEndpoints,
	/// Upper bound for a single renewal call; elapsing counts as renewal failure.
	#[serde(default = "ServiceDescriptor::default_renewal_timeout")]
	pub renewal_timeout: Duration,
	/// Optional per-request timeout applied to the HTTP client.
	#[serde(default)]
	pub request_timeout: Option<Duration>,
}
impl ServiceDescriptor {
	/// Renewal timeout used when none is configured.
	pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(10);

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ServiceDescriptorBuilder {
		ServiceDescriptorBuilder::new(base_url)
	}

	/// Resolves a request path against the base URL.
	///
	/// The path is appended to the base URL's own path, so a `https://host/v1/` base maps
	/// `/api/Places` to `https://host/v1/api/Places`. Absolute URLs, scheme-relative paths,
	/// and paths that climb out of the base prefix are rejected.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidEndpoint { path: path.to_owned(), source };

		if path.starts_with("//") || path.starts_with("\\\\") || Url::parse(path).is_ok() {
			return Err(invalid(None));
		}

		let prefix = self.base_url.path().trim_end_matches('/');
		let url = self
			.base_url
			.join(&format!("{prefix}/{}", path.trim_start_matches('/')))
			.map_err(|source| invalid(Some(source)))?;

		if url.origin() != self.base_url.origin() || !url.path().starts_with(&format!("{prefix}/"))
		{
			return Err(invalid(None));
		}

		Ok(url)
	}

	fn default_renewal_timeout() -> Duration {
		Self::DEFAULT_RENEWAL_TIMEOUT
	}
}
