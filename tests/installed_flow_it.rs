#![cfg(feature = "test")]

// std
use std::io::Cursor;
// crates.io
use httpmock::prelude::*;
// self
use google_api_kit::{
	_preludet::*,
	flows::{ConsolePrompt, InstalledFlow, PkceCodeChallengeMethod},
};

const CLIENT_ID: &str = "client-installed.apps.googleusercontent.com";
const CLIENT_SECRET: &str = "secret-installed";
const DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";

fn build_flow(server: &MockServer) -> InstalledFlow {
	InstalledFlow::new(
		test_secrets(&server.base_url(), CLIENT_ID, CLIENT_SECRET),
		test_scope([DRIVE_FILE]),
		test_transport(),
	)
}

#[tokio::test]
async fn console_flow_prints_consent_url_and_redeems_code() {
	let server = MockServer::start_async().await;
	let flow = build_flow(&server).with_login_hint("me@example.com");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=4%2F0AbCd")
				.body_includes("code_verifier=")
				.body_includes("client_secret=secret-installed");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"ya29.installed\",\"refresh_token\":\"1//installed\",\"token_type\":\"Bearer\",\"expires_in\":3599,\"scope\":\"https://www.googleapis.com/auth/drive.file\"}",
			);
		})
		.await;
	let mut prompt = ConsolePrompt::new(Cursor::new(b"4/0AbCd\n".to_vec()), Vec::new());
	let grant = flow.authorize(&mut prompt).await.expect("Consent flow should succeed.");

	mock.assert_async().await;

	assert_eq!(grant.access_token.expose(), "ya29.installed");
	assert_eq!(grant.refresh_token.as_ref().map(|token| token.expose()), Some("1//installed"));
	assert_eq!(grant.expires_in, Some(Duration::seconds(3599)));

	let printed = String::from_utf8(prompt.into_output()).expect("Prompt output should be UTF-8.");

	assert!(printed.contains(&server.url("/o/oauth2/auth")));
	assert!(printed.contains("access_type=offline"));
	assert!(printed.contains("prompt=consent"));
	assert!(printed.contains("login_hint=me%40example.com"));
	assert!(printed.trim_end().ends_with("Enter the authorization code:"));
}

#[tokio::test]
async fn sessions_carry_pkce_and_state() {
	let server = MockServer::start_async().await;
	let flow = build_flow(&server).without_consent_prompt();
	let session = flow.start().expect("Session should start.");
	let pairs: HashMap<_, _> = session.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(session.code_challenge_method(), PkceCodeChallengeMethod::S256);
	assert_eq!(session.state.len(), 32);
	assert_eq!(pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(pairs.get("client_id"), Some(&CLIENT_ID.into()));
	assert_eq!(pairs.get("redirect_uri"), Some(&"http://127.0.0.1:8085/callback".into()));
	assert_eq!(pairs.get("scope"), Some(&DRIVE_FILE.into()));
	assert_eq!(pairs.get("state"), Some(&session.state));
	assert_eq!(pairs.get("code_challenge"), Some(&session.code_challenge().to_owned()));
	assert_eq!(pairs.get("access_type"), Some(&"offline".into()));
	assert!(!pairs.contains_key("prompt"));
}

#[tokio::test]
async fn pasted_redirect_urls_are_accepted() {
	let server = MockServer::start_async().await;
	let flow = build_flow(&server);
	let session = flow.start().expect("Session should start.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("code=from-redirect");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"ya29.redirect\",\"token_type\":\"Bearer\",\"expires_in\":60}");
		})
		.await;
	let pasted = format!(
		"http://127.0.0.1:8085/callback?state={}&code=from-redirect&scope={DRIVE_FILE}",
		session.state
	);
	let grant = flow.exchange(&session, &pasted).await.expect("Redirect URL should be redeemed.");

	mock.assert_async().await;

	assert_eq!(grant.access_token.expose(), "ya29.redirect");
	assert!(grant.refresh_token.is_none());
}

#[tokio::test]
async fn rejected_codes_surface_invalid_grant() {
	let server = MockServer::start_async().await;
	let flow = build_flow(&server);
	let session = flow.start().expect("Session should start.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Malformed auth code.\"}");
		})
		.await;
	let err = flow
		.exchange(&session, "stale-code")
		.await
		.expect_err("Rejected codes should fail the exchange.");

	mock.assert_async().await;

	assert!(matches!(err, Error::InvalidGrant { .. }));
}

#[tokio::test]
async fn unknown_clients_surface_invalid_client() {
	let server = MockServer::start_async().await;
	let flow = build_flow(&server);
	let session = flow.start().expect("Session should start.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"The OAuth client was not found.\"}");
		})
		.await;
	let err = flow.exchange(&session, "code").await.expect_err("Unknown clients should fail.");

	mock.assert_calls_async(1).await;

	assert!(matches!(err, Error::InvalidClient { .. }));
}
