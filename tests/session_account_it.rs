#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use session_broker::{
	_preludet::*,
	descriptor::ServiceDescriptor,
	session::{ProfileUpdate, Registration},
	store::CredentialStore,
	teardown::SessionState,
};

const REGISTER: &str = "/api/Auth/Register";
const FORGOT_PASSWORD: &str = "/api/Auth/ForgotPassword";
const RESET_PASSWORD: &str = "/api/Auth/ResetPassword";
const CONFIRM_EMAIL: &str = "/api/Auth/ConfirmEmail";
const PROFILE: &str = "/api/Auth/Profile";
const REFRESH: &str = "/api/Auth/RefreshToken";

fn build_descriptor(server: &MockServer) -> ServiceDescriptor {
	ServiceDescriptor::builder(
		Url::parse(&server.base_url()).expect("Mock server base URL should parse successfully."),
	)
	.build()
	.expect("Service descriptor should build successfully.")
}

fn registration() -> Registration {
	Registration {
		username: "ana@example.com".into(),
		password: "hunter2".into(),
		first_name: "Ana".into(),
		last_name: "Silva".into(),
		date_of_birth: "1990-04-12".into(),
	}
}

fn profile_update() -> ProfileUpdate {
	ProfileUpdate {
		first_name: "Ana".into(),
		last_name: "Costa".into(),
		date_of_birth: "1990-04-12".into(),
		phone_number: Some("+351 910 000 000".into()),
	}
}

#[tokio::test]
async fn register_posts_the_account_without_signing_in() {
	let server = MockServer::start_async().await;
	let (client, store) = build_reqwest_test_client(build_descriptor(&server));
	let register = server
		.mock_async(|when, then| {
			when.method(POST).path(REGISTER).header_missing("authorization").json_body(json!({
				"username": "ana@example.com",
				"password": "hunter2",
				"firstName": "Ana",
				"lastName": "Silva",
				"dateOfBirth": "1990-04-12",
			}));
			then.status(200).json_body(json!({ "message": "Check your inbox." }));
		})
		.await;

	client.register(&registration()).await.expect("Registration should succeed.");

	register.assert_calls_async(1).await;

	assert!(store.get().is_none());
	assert_eq!(client.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn rejected_registration_reports_server_message() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_reqwest_test_client(build_descriptor(&server));

	server
		.mock_async(|when, then| {
			when.method(POST).path(REGISTER);
			then.status(400).json_body(json!({ "message": "Username is already taken." }));
		})
		.await;

	let err = client.register(&registration()).await.expect_err("Registration should fail.");

	match err {
		Error::AccountRejected { status, message } => {
			assert_eq!(status, 400);
			assert_eq!(message, "Username is already taken.");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn rejected_registration_without_message_uses_fallback() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_reqwest_test_client(build_descriptor(&server));

	server
		.mock_async(|when, then| {
			when.method(POST).path(REGISTER);
			then.status(500);
		})
		.await;

	let err = client.register(&registration()).await.expect_err("Registration should fail.");

	assert!(matches!(
		err,
		Error::AccountRejected { status: 500, ref message } if message == "Registration failed."
	));
}

#[tokio::test]
async fn password_reset_round_trip_is_unauthenticated() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_seeded_reqwest_test_client(
		build_descriptor(&server),
		test_credential("T1", "R1", "user-1"),
	);
	let forgot = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(FORGOT_PASSWORD)
				.header_missing("authorization")
				.json_body(json!({ "email": "ana@example.com" }));
			then.status(200);
		})
		.await;
	let reset = server
		.mock_async(|when, then| {
			when.method(POST).path(RESET_PASSWORD).header_missing("authorization").json_body(
				json!({ "email": "ana@example.com", "token": "123456", "newPassword": "s3cret!" }),
			);
			then.status(200);
		})
		.await;

	client.forgot_password("ana@example.com").await.expect("Reset mail should be requested.");
	client
		.reset_password("ana@example.com", "123456", "s3cret!")
		.await
		.expect("Password should be reset.");

	forgot.assert_calls_async(1).await;
	reset.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_password_reset_does_not_renew() {
	let server = MockServer::start_async().await;
	let (client, store) = build_seeded_reqwest_test_client(
		build_descriptor(&server),
		test_credential("T1", "R1", "user-1"),
	);

	server
		.mock_async(|when, then| {
			when.method(POST).path(RESET_PASSWORD);
			then.status(401).json_body(json!({ "message": "Invalid or expired token." }));
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH);
			then.status(200);
		})
		.await;
	let err = client
		.reset_password("ana@example.com", "000000", "s3cret!")
		.await
		.expect_err("An invalid token should be refused.");

	assert!(matches!(
		err,
		Error::AccountRejected { status: 401, ref message } if message == "Invalid or expired token."
	));

	refresh.assert_calls_async(0).await;

	assert!(store.get().is_some());
	assert_eq!(client.teardown().invocations(), 0);
}

#[tokio::test]
async fn email_confirmation_surfaces_plain_text_rejections() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_reqwest_test_client(build_descriptor(&server));
	let confirm = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(CONFIRM_EMAIL)
				.json_body(json!({ "email": "ana@example.com", "token": "654321" }));
			then.status(400).body("Confirmation code has expired.");
		})
		.await;
	let err = client
		.confirm_email("ana@example.com", "654321")
		.await
		.expect_err("An expired code should be refused.");

	confirm.assert_calls_async(1).await;

	assert!(matches!(
		err,
		Error::AccountRejected { status: 400, ref message }
			if message == "Confirmation code has expired."
	));
}

#[tokio::test]
async fn profile_update_caches_the_echoed_profile() {
	let server = MockServer::start_async().await;
	let (client, store) = build_seeded_reqwest_test_client(
		build_descriptor(&server),
		test_credential("T1", "R1", "user-1"),
	);
	let update = server
		.mock_async(|when, then| {
			when.method(PUT).path(PROFILE).header("authorization", "Bearer T1").json_body(json!({
				"firstName": "Ana",
				"lastName": "Costa",
				"dateOfBirth": "1990-04-12",
				"phoneNumber": "+351 910 000 000",
			}));
			then.status(200).json_body(json!({
				"firstName": "Ana",
				"lastName": "Costa",
				"email": "ana@example.com",
			}));
		})
		.await;
	let profile = client.update_profile(&profile_update()).await.expect("Update should succeed.");

	update.assert_calls_async(1).await;

	assert_eq!(
		profile,
		json!({ "firstName": "Ana", "lastName": "Costa", "email": "ana@example.com" }),
	);
	assert_eq!(store.profile(), Some(profile));
}

#[tokio::test]
async fn profile_update_without_body_merges_into_cached_profile() {
	let server = MockServer::start_async().await;
	let (client, store) = build_seeded_reqwest_test_client(
		build_descriptor(&server),
		test_credential("T1", "R1", "user-1"),
	);

	store
		.set_profile(json!({ "firstName": "Ana", "lastName": "Silva", "email": "ana@example.com" }))
		.expect("Memory store writes should succeed.");
	server
		.mock_async(|when, then| {
			when.method(PUT).path(PROFILE);
			then.status(204);
		})
		.await;
	client.update_profile(&profile_update()).await.expect("Update should succeed.");

	assert_eq!(
		store.profile(),
		Some(json!({
			"firstName": "Ana",
			"lastName": "Costa",
			"dateOfBirth": "1990-04-12",
			"phoneNumber": "+351 910 000 000",
			"email": "ana@example.com",
		})),
	);
}

#[tokio::test]
async fn profile_update_renews_an_expired_credential() {
	let server = MockServer::start_async().await;
	let (client, store) = build_seeded_reqwest_test_client(
		build_descriptor(&server),
		test_credential("T1", "R1", "user-1"),
	);
	let stale = server
		.mock_async(|when, then| {
			when.method(PUT).path(PROFILE).header("authorization", "Bearer T1");
			then.status(401);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(PUT).path(PROFILE).header("authorization", "Bearer T2");
			then.status(200).json_body(json!({ "firstName": "Ana", "lastName": "Costa" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH);
			then.status(200).json_body(json!({ "jwtToken": "T2", "refreshToken": "R2" }));
		})
		.await;

	client.update_profile(&profile_update()).await.expect("Replayed update should succeed.");

	stale.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(store.profile(), Some(json!({ "firstName": "Ana", "lastName": "Costa" })));
}
