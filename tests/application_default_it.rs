#![cfg(feature = "test")]

// std
use std::{env, fs, process};
// crates.io
use httpmock::prelude::*;
// self
use google_api_kit::{
	_preludet::*,
	credential::{AdcEnvironment, Credential, CredentialKind},
	error::CredentialError,
};

const TEST_KEY: &str = include_str!("fixtures/test_rsa_key.pem");
const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

fn temp_dir(tag: &str) -> PathBuf {
	let dir = env::temp_dir().join(format!(
		"google_api_kit_adc_{tag}_{}_{}",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	));

	fs::create_dir_all(&dir).expect("Failed to create temporary directory.");

	dir
}

fn authorized_user_json(server: &MockServer) -> String {
	serde_json::json!({
		"type": "authorized_user",
		"client_id": "gcloud-client.apps.googleusercontent.com",
		"client_secret": "gcloud-secret",
		"refresh_token": "1//gcloud",
		"quota_project_id": "billing-project",
		"token_uri": server.url("/token"),
	})
	.to_string()
}

#[tokio::test]
async fn explicit_credential_file_wins() {
	let dir = temp_dir("explicit");
	let path = dir.join("robot.json");

	fs::write(
		&path,
		serde_json::json!({
			"type": "service_account",
			"private_key": TEST_KEY,
			"client_email": "robot@demo-project.iam.gserviceaccount.com",
		})
		.to_string(),
	)
	.expect("Failed to write credential file.");

	let env = AdcEnvironment {
		credentials_file: Some(path),
		cloudsdk_config: Some(dir.clone()),
		..AdcEnvironment::empty()
	};
	let credential =
		Credential::discover(&env, test_transport()).await.expect("Explicit file should load.");

	assert_eq!(credential.kind(), CredentialKind::ServiceAccount);
	assert!(credential.requires_scopes());

	fs::remove_dir_all(&dir).expect("Failed to remove temporary directory.");
}

#[tokio::test]
async fn missing_explicit_file_is_an_error() {
	let dir = temp_dir("missing");
	let path = dir.join("absent.json");

	// A well-known file must not mask the broken explicit setting.
	fs::write(dir.join(WELL_KNOWN_FILE), "{}").expect("Failed to write well-known file.");

	let env = AdcEnvironment {
		credentials_file: Some(path.clone()),
		cloudsdk_config: Some(dir.clone()),
		..AdcEnvironment::empty()
	};
	let err = Credential::discover(&env, test_transport())
		.await
		.expect_err("Missing explicit files should fail discovery.");

	assert!(matches!(
		err,
		Error::Credential(CredentialError::MissingEnvFile { path: missing }) if missing == path
	));

	fs::remove_dir_all(&dir).expect("Failed to remove temporary directory.");
}

#[tokio::test]
async fn gcloud_well_known_file_is_used_and_refreshes() {
	let server = MockServer::start_async().await;
	let dir = temp_dir("gcloud");

	fs::write(dir.join(WELL_KNOWN_FILE), authorized_user_json(&server))
		.expect("Failed to write well-known file.");

	let env = AdcEnvironment { cloudsdk_config: Some(dir.clone()), ..AdcEnvironment::empty() };
	let credential =
		Credential::discover(&env, test_transport()).await.expect("Well-known file should load.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=1%2F%2Fgcloud")
				.body_includes("client_id=gcloud-client.apps.googleusercontent.com");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"ya29.gcloud\",\"token_type\":\"Bearer\",\"expires_in\":3599}");
		})
		.await;

	assert_eq!(credential.kind(), CredentialKind::AuthorizedUser);
	assert_eq!(credential.quota_project_id(), Some("billing-project"));

	let token = credential.access_token().await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(token.expose(), "ya29.gcloud");

	fs::remove_dir_all(&dir).expect("Failed to remove temporary directory.");
}

#[tokio::test]
async fn home_layout_is_searched_without_cloudsdk_config() {
	let server = MockServer::start_async().await;
	let home = temp_dir("home");
	let gcloud = home.join(".config").join("gcloud");

	fs::create_dir_all(&gcloud).expect("Failed to create gcloud directory.");
	fs::write(gcloud.join(WELL_KNOWN_FILE), authorized_user_json(&server))
		.expect("Failed to write well-known file.");

	let env = AdcEnvironment { home: Some(home.clone()), ..AdcEnvironment::empty() };
	let credential =
		Credential::discover(&env, test_transport()).await.expect("Home layout should load.");

	assert_eq!(credential.kind(), CredentialKind::AuthorizedUser);

	fs::remove_dir_all(&home).expect("Failed to remove temporary directory.");
}

#[tokio::test]
async fn metadata_server_is_probed_last() {
	let server = MockServer::start_async().await;
	let probe = server
		.mock_async(|when, then| {
			when.method(GET).path("/").header("metadata-flavor", "Google");
			then.status(200).header("Metadata-Flavor", "Google");
		})
		.await;
	let env = AdcEnvironment {
		metadata_host: Some(server.base_url()),
		probe_metadata: true,
		..AdcEnvironment::empty()
	};
	let credential =
		Credential::discover(&env, test_transport()).await.expect("Metadata server should answer.");

	probe.assert_async().await;

	assert_eq!(credential.kind(), CredentialKind::ComputeMetadata);
	assert!(!credential.requires_scopes());
}

#[tokio::test]
async fn impostor_metadata_servers_are_ignored() {
	let server = MockServer::start_async().await;
	let probe = server
		.mock_async(|when, then| {
			when.method(GET).path("/");
			then.status(200).body("not a metadata server");
		})
		.await;
	let env = AdcEnvironment {
		metadata_host: Some(server.base_url()),
		probe_metadata: true,
		..AdcEnvironment::empty()
	};
	let err = Credential::discover(&env, test_transport())
		.await
		.expect_err("Servers without the flavor header should be ignored.");

	probe.assert_async().await;

	assert!(matches!(err, Error::Credential(CredentialError::ApplicationDefaultNotFound)));
}

#[tokio::test]
async fn disabled_probe_reports_not_found() {
	let server = MockServer::start_async().await;
	let probe = server
		.mock_async(|when, then| {
			when.method(GET).path("/");
			then.status(200).header("Metadata-Flavor", "Google");
		})
		.await;
	let env = AdcEnvironment { metadata_host: Some(server.base_url()), ..AdcEnvironment::empty() };
	let err = Credential::discover(&env, test_transport())
		.await
		.expect_err("Discovery should fail with nothing configured.");

	probe.assert_calls_async(0).await;

	assert!(matches!(err, Error::Credential(CredentialError::ApplicationDefaultNotFound)));
}

#[tokio::test]
async fn unsupported_credential_types_are_rejected() {
	let dir = temp_dir("unsupported");
	let path = dir.join("external.json");

	fs::write(&path, r#"{"type":"external_account","audience":"//iam.googleapis.com/x"}"#)
		.expect("Failed to write credential file.");

	let env = AdcEnvironment { credentials_file: Some(path), ..AdcEnvironment::empty() };
	let err = Credential::discover(&env, test_transport())
		.await
		.expect_err("External accounts are not constructed.");

	assert!(matches!(
		err,
		Error::Credential(CredentialError::UnsupportedType { kind }) if kind == "external_account"
	));

	fs::remove_dir_all(&dir).expect("Failed to remove temporary directory.");
}
