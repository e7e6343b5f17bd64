#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use time::macros;
// self
use google_api_kit::{
	_preludet::*,
	auth::Authorization,
	credential::Credential,
	service::{
		ApiClient, CalendarService, DriveService, Event, EventDateTime, EventQuery, File, FileQuery,
	},
};

fn api_client(server: &MockServer) -> ApiClient {
	let credential = Credential::from_authorization_with(
		&test_secrets(&server.base_url(), "client-api", "secret-api"),
		Authorization::new("ya29.api").with_expires_at(OffsetDateTime::now_utc() + Duration::hours(1)),
		test_transport(),
	)
	.expect("User credential should build.");

	ApiClient::new(credential)
}

fn calendar(server: &MockServer) -> CalendarService {
	CalendarService::with_base_url(api_client(server), &server.url("/calendar/v3"))
		.expect("Calendar base URL should parse.")
}

fn drive(server: &MockServer) -> DriveService {
	DriveService::with_base_url(api_client(server), &server.url("/drive/v3"))
		.expect("Drive base URL should parse.")
}

#[tokio::test]
async fn calendar_list_follows_page_tokens() {
	let server = MockServer::start_async().await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/calendar/v3/users/me/calendarList")
				.query_param("pageToken", "page-2")
				.header("authorization", "Bearer ya29.api");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[{\"id\":\"team@group.calendar.google.com\",\"summary\":\"Team\",\"accessRole\":\"reader\"}]}");
		})
		.await;
	let first = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/calendar/v3/users/me/calendarList")
				.query_param_missing("pageToken")
				.header("authorization", "Bearer ya29.api");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[{\"id\":\"me@example.com\",\"summary\":\"Me\",\"primary\":true,\"timeZone\":\"Europe/Berlin\"}],\"nextPageToken\":\"page-2\"}");
		})
		.await;
	let calendars = calendar(&server).list_calendars().await.expect("Listing should succeed.");

	first.assert_async().await;
	second.assert_async().await;

	assert_eq!(calendars.len(), 2);
	assert!(calendars[0].primary);
	assert_eq!(calendars[0].time_zone.as_deref(), Some("Europe/Berlin"));
	assert_eq!(calendars[1].access_role.as_deref(), Some("reader"));
}

#[tokio::test]
async fn events_are_listed_with_query_parameters() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/calendar/v3/calendars/primary/events")
				.query_param("timeMin", "2025-01-01T00:00:00Z")
				.query_param("timeMax", "2025-01-08T00:00:00Z")
				.query_param("singleEvents", "true")
				.query_param("orderBy", "startTime");
			then.status(200).header("content-type", "application/json").body(
				"{\"items\":[{\"id\":\"e1\",\"summary\":\"Standup\",\"start\":{\"dateTime\":\"2025-01-02T09:00:00Z\"},\"end\":{\"dateTime\":\"2025-01-02T09:15:00Z\"}}]}",
			);
		})
		.await;
	let events = calendar(&server)
		.list_events(
			"primary",
			&EventQuery::between(
				macros::datetime!(2025-01-01 00:00 UTC),
				macros::datetime!(2025-01-08 00:00 UTC),
			),
		)
		.await
		.expect("Listing should succeed.");

	mock.assert_async().await;

	assert_eq!(events.len(), 1);
	assert_eq!(events[0].summary.as_deref(), Some("Standup"));
}

#[tokio::test]
async fn events_are_inserted_and_deleted() {
	let server = MockServer::start_async().await;
	let insert = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/calendar/v3/calendars/primary/events")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({
					"summary": "Lunch",
					"start": { "dateTime": "2025-01-02T12:00:00Z" },
					"end": { "dateTime": "2025-01-02T13:00:00Z" }
				}));
			then.status(200).header("content-type", "application/json").body(
				"{\"id\":\"new-event\",\"status\":\"confirmed\",\"summary\":\"Lunch\",\"htmlLink\":\"https://calendar.google.com/event?eid=x\"}",
			);
		})
		.await;
	let delete = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/calendar/v3/calendars/primary/events/new-event");
			then.status(204);
		})
		.await;
	let service = calendar(&server);
	let event = Event {
		summary: Some("Lunch".into()),
		start: Some(EventDateTime::at(macros::datetime!(2025-01-02 12:00 UTC))),
		end: Some(EventDateTime::at(macros::datetime!(2025-01-02 13:00 UTC))),
		..Event::default()
	};
	let created = service.insert_event("primary", &event).await.expect("Insert should succeed.");

	assert_eq!(created.id.as_deref(), Some("new-event"));
	assert_eq!(created.status.as_deref(), Some("confirmed"));

	service.delete_event("primary", "new-event").await.expect("Delete should succeed.");

	insert.assert_async().await;
	delete.assert_async().await;
}

#[tokio::test]
async fn missing_events_map_to_api_errors() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/calendar/v3/calendars/primary/events/gone");
			then.status(404)
				.header("content-type", "application/json")
				.body("{\"error\":{\"code\":404,\"message\":\"Not Found\",\"errors\":[{\"reason\":\"notFound\"}]}}");
		})
		.await;
	let err = calendar(&server)
		.get_event("primary", "gone")
		.await
		.expect_err("Missing events should fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Api { status: 404, message } if message == "Not Found"));
}

#[tokio::test]
async fn drive_files_are_listed_across_pages() {
	let server = MockServer::start_async().await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET).path("/drive/v3/files").query_param("pageToken", "next");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"files\":[{\"id\":\"f2\",\"name\":\"b.txt\",\"mimeType\":\"text/plain\"}]}");
		})
		.await;
	let first = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/drive/v3/files")
				.query_param("q", "'root' in parents and trashed = false")
				.query_param("pageSize", "1")
				.query_param_missing("pageToken");
			then.status(200).header("content-type", "application/json").body(
				"{\"files\":[{\"id\":\"f1\",\"name\":\"Reports\",\"mimeType\":\"application/vnd.google-apps.folder\"}],\"nextPageToken\":\"next\"}",
			);
		})
		.await;
	let files = drive(&server)
		.list_files(&FileQuery { page_size: Some(1), ..FileQuery::in_folder("root") })
		.await
		.expect("Listing should succeed.");

	first.assert_async().await;
	second.assert_async().await;

	assert_eq!(files.len(), 2);
	assert!(files[0].is_folder());
	assert_eq!(files[1].name.as_deref(), Some("b.txt"));
}

#[tokio::test]
async fn repeated_page_tokens_stop_listing() {
	let server = MockServer::start_async().await;
	let repeating = server
		.mock_async(|when, then| {
			when.method(GET).path("/drive/v3/files");
			then.status(200).header("content-type", "application/json").body(
				"{\"files\":[{\"id\":\"f1\",\"name\":\"loop.txt\"}],\"nextPageToken\":\"same\"}",
			);
		})
		.await;
	let err = drive(&server)
		.list_files(&FileQuery::default())
		.await
		.expect_err("A repeating page token should stop listing.");

	repeating.assert_calls_async(2).await;

	assert!(
		matches!(err, Error::Api { status: 200, message } if message.contains("nextPageToken"))
	);
}

#[tokio::test]
async fn drive_folders_are_created_fetched_and_deleted() {
	let server = MockServer::start_async().await;
	let create = server
		.mock_async(|when, then| {
			when.method(POST).path("/drive/v3/files").json_body(serde_json::json!({
				"name": "Reports",
				"mimeType": "application/vnd.google-apps.folder"
			}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"folder-1\",\"name\":\"Reports\",\"mimeType\":\"application/vnd.google-apps.folder\"}");
		})
		.await;
	let get = server
		.mock_async(|when, then| {
			when.method(GET).path("/drive/v3/files/folder-1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"folder-1\",\"name\":\"Reports\",\"trashed\":false}");
		})
		.await;
	let delete = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/drive/v3/files/folder-1");
			then.status(204);
		})
		.await;
	let service = drive(&server);
	let created = service.create_file(&File::folder("Reports")).await.expect("Create should work.");
	let id = created.id.expect("Created folder should have an id.");
	let fetched = service.get_file(&id).await.expect("Get should work.");

	assert_eq!(fetched.trashed, Some(false));

	service.delete_file(&id).await.expect("Delete should work.");

	create.assert_async().await;
	get.assert_async().await;
	delete.assert_async().await;
}

#[tokio::test]
async fn forbidden_drive_calls_keep_google_message() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/drive/v3/files/secret");
			then.status(403).header("content-type", "application/json").body(
				"{\"error\":{\"code\":403,\"message\":\"Request had insufficient authentication scopes.\"}}",
			);
		})
		.await;
	let err = drive(&server).get_file("secret").await.expect_err("Forbidden calls should fail.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::Api { status: 403, message } if message.contains("insufficient authentication scopes")
	));
}

#[tokio::test]
async fn user_credentials_bill_their_quota_project() {
	let server = MockServer::start_async().await;
	let credential = Credential::from_json_str(
		&serde_json::json!({
			"type": "authorized_user",
			"client_id": "gcloud-client",
			"client_secret": "gcloud-secret",
			"refresh_token": "1//quota",
			"quota_project_id": "billing-project",
			"token_uri": server.url("/token"),
		})
		.to_string(),
	)
	.expect("Authorized user JSON should load.")
	.with_transport(test_transport());
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"ya29.quota\",\"token_type\":\"Bearer\",\"expires_in\":3599}");
		})
		.await;
	let files = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/drive/v3/files")
				.header("authorization", "Bearer ya29.quota")
				.header("x-goog-user-project", "billing-project");
			then.status(200).header("content-type", "application/json").body("{\"files\":[]}");
		})
		.await;
	let service = DriveService::with_base_url(ApiClient::new(credential), &server.url("/drive/v3"))
		.expect("Drive base URL should parse.");
	let listed = service.list_files(&FileQuery::default()).await.expect("Listing should succeed.");

	token.assert_async().await;
	files.assert_async().await;

	assert!(listed.is_empty());
}
