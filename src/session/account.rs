//! Account flows around the session: registration, password reset, email confirmation, and
//! profile updates.
//!
//! Registration and the password/email calls are unauthenticated and never touch the
//! refresh coordinator. A refused call becomes [`Error::AccountRejected`] carrying the
//! server's `message` or a per-call fallback. Profile updates are authenticated and go
//! through [`SessionClient::execute`], so an expired access token is renewed and the
//! update replayed once.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::Profile,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_event},
	session::{SessionClient, lifecycle},
};

const REGISTER_FALLBACK: &str = "Registration failed.";
const PASSWORD_FALLBACK: &str = "An error occurred. Please try again.";
const CONFIRM_EMAIL_FALLBACK: &str = "Failed to confirm email.";

/// New account submitted to the registration endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
	/// Sign-in name, usually the email address.
	pub username: String,
	/// Initial password.
	pub password: String,
	/// Given name.
	pub first_name: String,
	/// Family name.
	pub last_name: String,
	/// Date of birth as the service formats it (`YYYY-MM-DD`).
	pub date_of_birth: String,
}

/// Editable profile fields sent to the profile endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
	/// Given name.
	pub first_name: String,
	/// Family name.
	pub last_name: String,
	/// Date of birth as the service formats it (`YYYY-MM-DD`).
	pub date_of_birth: String,
	/// Optional phone number; omitted from the body when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone_number: Option<String>,
}

#[derive(Serialize)]
struct EmailBody<'a> {
	email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResetBody<'a> {
	email: &'a str,
	token: &'a str,
	new_password: &'a str,
}

#[derive(Serialize)]
struct EmailConfirmationBody<'a> {
	email: &'a str,
	token: &'a str,
}

impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates an account. The session is left untouched; sign in with [`login`] afterwards.
	///
	/// [`login`]: SessionClient::login
	pub async fn register(&self, registration: &Registration) -> Result<()> {
		let request =
			ApiRequest::post(self.descriptor.endpoints.register.as_str()).json(registration)?;

		self.observe_account("register", async {
			let response = self.dispatcher.exchange(&request, None).await?;

			ensure_accepted(&response, REGISTER_FALLBACK)
		})
		.await
	}

	/// Asks the service to mail a password reset token to `email`.
	pub async fn forgot_password(&self, email: &str) -> Result<()> {
		let request = ApiRequest::post(self.descriptor.endpoints.forgot_password.as_str())
			.json(&EmailBody { email })?;

		self.observe_account("forgot_password", async {
			let response = self.dispatcher.exchange(&request, None).await?;

			ensure_accepted(&response, PASSWORD_FALLBACK)
		})
		.await
	}

	/// Redeems a mailed reset token for a new password.
	pub async fn reset_password(&self, email: &str, token: &str, new_password: &str) -> Result<()> {
		let request = ApiRequest::post(self.descriptor.endpoints.reset_password.as_str())
			.json(&PasswordResetBody { email, token, new_password })?;

		self.observe_account("reset_password", async {
			let response = self.dispatcher.exchange(&request, None).await?;

			ensure_accepted(&response, PASSWORD_FALLBACK)
		})
		.await
	}

	/// Redeems a mailed email confirmation token.
	///
	/// Rejections may carry the reason as a bare string body instead of a `message` field;
	/// both are surfaced.
	pub async fn confirm_email(&self, email: &str, token: &str) -> Result<()> {
		let request = ApiRequest::post(self.descriptor.endpoints.confirm_email.as_str())
			.json(&EmailConfirmationBody { email, token })?;

		self.observe_account("confirm_email", async {
			let response = self.dispatcher.exchange(&request, None).await?;

			if response.is_success() {
				Ok(())
			} else {
				let message =
					text_message(&response).or_else(|| lifecycle::server_message(&response));

				Err(account_rejection(&response, message, CONFIRM_EMAIL_FALLBACK))
			}
		})
		.await
	}

	/// Updates the signed-in subject's profile and refreshes the cached snapshot.
	///
	/// When the service echoes the updated profile it is cached as-is; otherwise the
	/// submitted fields are merged over the cached snapshot.
	pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
		let request = ApiRequest::put(self.descriptor.endpoints.profile.as_str()).json(update)?;

		self.observe_account("update_profile", async {
			let response = self.execute(&request).await?;
			let profile = match serde_json::from_slice::<Profile>(&response.body) {
				Ok(echoed @ Profile::Object(_)) => echoed,
				_ => merge_profile(self.store.profile(), update)?,
			};

			self.store.set_profile(profile.clone())?;

			trace_event!(debug, "Profile updated.");

			Ok(profile)
		})
		.await
	}

	async fn observe_account<F, R>(&self, stage: &'static str, flow: F) -> Result<R>
	where
		F: Future<Output = Result<R>>,
	{
		const KIND: FlowKind = FlowKind::Account;

		let span = FlowSpan::new(KIND, stage);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(flow).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

fn ensure_accepted(response: &ApiResponse, fallback: &str) -> Result<()> {
	if response.is_success() {
		return Ok(());
	}

	Err(account_rejection(response, lifecycle::server_message(response), fallback))
}

fn account_rejection(response: &ApiResponse, message: Option<String>, fallback: &str) -> Error {
	trace_event!(info, status = response.status, "Account request rejected.");

	Error::AccountRejected {
		status: response.status,
		message: message.unwrap_or_else(|| fallback.to_owned()),
	}
}

// A JSON string body, or a plain-text body that is not JSON at all.
fn text_message(response: &ApiResponse) -> Option<String> {
	let text = match serde_json::from_slice::<Value>(&response.body) {
		Ok(Value::String(text)) => text,
		Ok(_) => return None,
		Err(_) => response.text(),
	};

	Some(text).filter(|text| !text.trim().is_empty())
}

fn merge_profile(cached: Option<Profile>, update: &ProfileUpdate) -> Result<Profile, ConfigError> {
	let mut fields = match cached {
		Some(Profile::Object(fields)) => fields,
		_ => Default::default(),
	};

	if let Profile::Object(changes) =
		serde_json::to_value(update).map_err(ConfigError::RequestBody)?
	{
		fields.extend(changes);
	}

	Ok(Profile::Object(fields))
}
