// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_event},
	retry::{Attempt, Verdict},
	session::SessionClient,
};

impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Executes an authenticated call, renewing the credential and replaying once on 401.
	///
	/// The call is sent with the access token in the store at dispatch time. If it comes
	/// back 401 the caller joins the single renewal cycle (or picks up a credential another
	/// caller already renewed) and the identical request is replayed with the new token.
	/// A second 401 surfaces as [`Error::AuthExpired`]; a failed renewal surfaces as
	/// [`Error::RenewalFailed`] after the session has been torn down. Transport and
	/// validation failures are returned as-is without renewal.
	pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Execute;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.execute_with_replay(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn execute_with_replay(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let mut attempt = Attempt::FIRST;
		let mut bearer = self.store.get().map(|credential| credential.access_token().clone());

		loop {
			let outcome = self.dispatcher.send_with(request, bearer.as_ref()).await;

			match self.policy.evaluate(&outcome, attempt) {
				Verdict::Surface => return outcome,
				Verdict::Renew => {
					trace_event!(
						debug,
						method = %request.method,
						path = %request.path,
						"Credential expired; acquiring a renewed one."
					);

					let credential = self
						.coordinator
						.acquire_credential(bearer.as_ref(), |current| self.renew(current))
						.await?;

					bearer = Some(credential.access_token().clone());
					attempt = attempt.next();
				},
			}
		}
	}
}
