//! Login, logout, profile fetch, and startup restoration flows.

// self
use crate::{
	_prelude::*,
	auth::{Credential, Profile, SubjectId, TokenSecret},
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_event},
	session::SessionClient,
	teardown::SessionState,
};

const LOGIN_REJECTED_FALLBACK: &str = "Login failed, username or password is incorrect.";

#[derive(Serialize)]
struct LoginRequest<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
	#[serde(rename = "jwtToken", alias = "accessToken")]
	access_token: TokenSecret,
	#[serde(rename = "refreshToken", alias = "renewalToken")]
	renewal_token: TokenSecret,
	#[serde(rename = "userId", alias = "subjectId")]
	subject_id: SubjectId,
	#[serde(default, alias = "user")]
	profile: Option<Profile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
	refresh_token: &'a str,
	user_id: &'a str,
}

#[derive(Deserialize)]
struct RejectionBody {
	message: Option<String>,
}

impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Signs in with subject credentials and stores the issued credential.
	///
	/// The profile is taken from the login response when present and fetched otherwise.
	/// A failed profile fetch is returned to the caller, but the stored credential and the
	/// authenticated state remain in place.
	pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = ApiRequest::post(self.descriptor.endpoints.login.as_str())
					.json(&LoginRequest { username, password })?;
				let response = self.dispatcher.exchange(&request, None).await?;

				if !response.is_success() {
					return Err(login_rejection(&response));
				}

				let issued = response.json::<LoginResponse>()?;
				let credential = Credential::new(
					issued.access_token.expose(),
					issued.renewal_token.expose(),
					issued.subject_id,
				);

				self.store.set(credential.clone())?;
				self.teardown.mark_authenticated();

				trace_event!(info, subject = %credential.subject_id(), "Signed in.");

				match issued.profile {
					Some(profile) => self.store.set_profile(profile)?,
					None => {
						self.fetch_profile().await?;
					},
				}

				Ok(credential)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Notifies the server (best effort) and tears the session down.
	///
	/// Failures of the logout call are logged and otherwise ignored; the local session is
	/// always cleared.
	pub async fn logout(&self) {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		span.instrument(async move {
			if let Some(credential) = self.store.get() {
				let body = LogoutRequest {
					refresh_token: credential.renewal_token().expose(),
					user_id: credential.subject_id().as_ref(),
				};

				match ApiRequest::post(self.descriptor.endpoints.logout.as_str()).json(&body) {
					Ok(request) => {
						if let Err(_e) = self
							.dispatcher
							.send_with(&request, Some(credential.access_token()))
							.await
						{
							trace_event!(warn, error = %_e, "Logout call failed; clearing the session anyway.");
						}
					},
					Err(_e) => {
						trace_event!(warn, error = %_e, "Logout body could not be encoded.");
					},
				}
			}

			self.teardown.teardown();
		})
		.await;

		obs::record_flow_outcome(KIND, FlowOutcome::Success);
	}

	/// Fetches the signed-in subject's profile through the retry policy and caches it.
	pub async fn fetch_profile(&self) -> Result<Profile> {
		let request = ApiRequest::get(self.descriptor.endpoints.profile.as_str());
		let response = self.execute(&request).await?;
		let profile = response.json::<Profile>()?;

		self.store.set_profile(profile.clone())?;

		Ok(profile)
	}

	/// Re-establishes a stored session at startup by fetching the profile.
	///
	/// Without a stored credential the session is unauthenticated. Rejections and failed
	/// renewals tear the session down; transport failures keep it so an offline start does
	/// not sign the user out.
	pub async fn restore(&self) -> Result<SessionState> {
		const KIND: FlowKind = FlowKind::Restore;

		let span = FlowSpan::new(KIND, "restore");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if self.store.get().is_none() {
					self.teardown.teardown();

					return Ok(SessionState::Unauthenticated);
				}

				match self.fetch_profile().await {
					Ok(_) => {
						self.teardown.mark_authenticated();

						Ok(SessionState::Authenticated)
					},
					Err(Error::Transport(_e)) => {
						trace_event!(warn, error = %_e, "Profile unreachable; keeping the stored session.");

						Ok(self.teardown.state())
					},
					Err(Error::AuthExpired { .. } | Error::Validation(_) | Error::RenewalFailed(_)) => {
						self.teardown.teardown();

						Ok(SessionState::Unauthenticated)
					},
					Err(err) => Err(err),
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

/// Extracts the `message` field of a rejection body, ignoring blank messages.
pub(super) fn server_message(response: &ApiResponse) -> Option<String> {
	serde_json::from_slice::<RejectionBody>(&response.body)
		.ok()
		.and_then(|parsed| parsed.message)
		.filter(|message| !message.trim().is_empty())
}

fn login_rejection(response: &ApiResponse) -> Error {
	let message =
		server_message(response).unwrap_or_else(|| LOGIN_REJECTED_FALLBACK.to_owned());

	trace_event!(info, status = response.status, "Login rejected.");

	Error::LoginRejected { status: response.status, message }
}
