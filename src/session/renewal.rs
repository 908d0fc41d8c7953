//! The network half of a renewal cycle.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	coordinator::RenewalResult,
	error::RenewalFailure,
	http::{ApiRequest, ApiTransport},
	obs::trace_event,
	session::SessionClient,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewalRequest<'a> {
	refresh_token: &'a str,
	user_id: &'a str,
}

#[derive(Deserialize)]
struct RenewalResponse {
	#[serde(rename = "jwtToken", alias = "accessToken")]
	access_token: String,
	#[serde(default, rename = "refreshToken", alias = "renewalToken")]
	renewal_token: Option<String>,
}

impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Forces a renewal of the stored credential through the coordinator.
	///
	/// Joins a renewal already in flight instead of starting a second one.
	pub async fn refresh(&self) -> Result<Credential> {
		let stale = self.store.get().map(|credential| credential.access_token().clone());
		let credential = self
			.coordinator
			.acquire_credential(stale.as_ref(), |current| self.renew(current))
			.await?;

		Ok(credential)
	}

	/// Exchanges `current`'s renewal token for a new credential.
	///
	/// Sent without a bearer token and outside the retry policy, so a rejected renewal can
	/// never recurse into another renewal.
	pub(crate) async fn renew(&self, current: Credential) -> RenewalResult {
		let body = RenewalRequest {
			refresh_token: current.renewal_token().expose(),
			user_id: current.subject_id().as_ref(),
		};
		let request = ApiRequest::post(self.descriptor.endpoints.refresh.as_str())
			.json(&body)
			.map_err(|e| RenewalFailure::from_dispatch(e.into()))?;
		let response = self
			.dispatcher
			.send_with(&request, None)
			.await
			.map_err(RenewalFailure::from_dispatch)?;
		let renewed = response
			.json::<RenewalResponse>()
			.map_err(|e| RenewalFailure::from_dispatch(e.into()))?;

		if renewed.access_token.is_empty() {
			return Err(RenewalFailure::Malformed {
				message: "renewal response carried an empty access token".into(),
			});
		}

		trace_event!(
			info,
			subject = %current.subject_id(),
			rotated = renewed.renewal_token.is_some(),
			"Credential renewed."
		);

		Ok(current.rotate(renewed.access_token, renewed.renewal_token))
	}
}
