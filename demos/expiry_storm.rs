//! Demonstrates five concurrent calls hitting an expired access token: the client performs one
//! renewal, replays every call with the new token, and leaves the session authenticated.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use session_broker::{
	auth::{Credential, SubjectId},
	descriptor::ServiceDescriptor,
	http::ApiRequest,
	session::ReqwestSessionClient,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_credential(Credential::new(
		"expired-access",
		"renewal-1",
		SubjectId::new("user-demo")?,
	)));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Places").header("authorization", "Bearer expired-access");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Places").header("authorization", "Bearer fresh-access");
			then.status(200).json_body(json!([{ "city": "Porto" }]));
		})
		.await;

	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/Auth/RefreshToken");
			then.status(200)
				.delay(Duration::from_millis(200))
				.json_body(json!({ "jwtToken": "fresh-access", "refreshToken": "renewal-2" }));
		})
		.await;
	let descriptor = ServiceDescriptor::builder(Url::parse(&server.base_url())?)
		.renewal_timeout(Duration::from_secs(5))
		.build()?;
	let client = ReqwestSessionClient::new(store, descriptor)?;
	let request = ApiRequest::get("/api/Places");
	let calls = (0..5).map(|_| {
		let client = client.clone();
		let request = request.clone();

		tokio::spawn(async move { client.execute(&request).await })
	});

	for call in calls.collect::<Vec<_>>() {
		let response = call.await??;

		println!("Replayed call answered {} with {}.", response.status, response.text());
	}

	refresh_mock.assert_calls_async(1).await;

	println!(
		"Renewals: {}, queued callers: {}, session: {:?}.",
		client.metrics().renewals(),
		client.metrics().queued(),
		client.state(),
	);

	Ok(())
}
