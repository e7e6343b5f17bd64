//! Authenticated access to Google REST APIs.
//!
//! [`ApiClient`] attaches a [`Credential`]'s `Authorization` header to each request and turns
//! Google's error envelope into [`Error::Api`]. [`CalendarService`] and [`DriveService`] are thin
//! typed wrappers: they build the request, send it, and decode the response.

pub mod calendar;
pub mod drive;

pub use calendar::*;
pub use drive::*;

// crates.io
use reqwest::{
	RequestBuilder, Response,
	header::{AUTHORIZATION, HeaderValue},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	credential::{Credential, CredentialKind},
	error::{self, ConfigError},
};

const USER_PROJECT_HEADER: &str = "x-goog-user-project";

/// Sends JSON requests signed with a [`Credential`].
#[derive(Clone, Debug)]
pub struct ApiClient {
	credential: Credential,
}
impl ApiClient {
	/// Creates a client that reuses the credential's transport.
	pub fn new(credential: Credential) -> Self {
		Self { credential }
	}

	/// Credential used to sign requests.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// `GET` returning decoded JSON.
	pub async fn get_json<T>(&self, url: Url, query: &[(&str, String)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let request = self.credential.transport().client().get(url).query(query);

		decode(self.send(request).await?).await
	}

	/// `POST` a JSON body and decode the JSON response.
	pub async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		let request = self.credential.transport().client().post(url).json(body);

		decode(self.send(request).await?).await
	}

	/// `DELETE` a resource, discarding the (empty) response body.
	pub async fn delete(&self, url: Url) -> Result<()> {
		let request = self.credential.transport().client().delete(url);

		self.send(request).await.map(|_| ())
	}

	async fn send(&self, request: RequestBuilder) -> Result<Response> {
		let authorization = self.credential.authorization().await?;
		let header = HeaderValue::from_str(&authorization.header_value()).map_err(|_| {
			Error::InvalidGrant { reason: "Access token is not a valid header value".into() }
		})?;
		let mut request = request.header(AUTHORIZATION, header);

		if let Some(project) = self
			.credential
			.quota_project_id()
			.filter(|_| self.credential.kind() == CredentialKind::AuthorizedUser)
		{
			request = request.header(USER_PROJECT_HEADER, project);
		}

		let response = request.send().await.map_err(error::map_reqwest_error)?;
		let status = response.status();

		tracing::debug!(url = %response.url(), status = status.as_u16(), "Google API responded.");

		if status.is_success() {
			return Ok(response);
		}

		let body = response.text().await.map_err(error::map_reqwest_error)?;

		Err(api_error(status, &body))
	}
}

/// Page envelope shared by Calendar and Drive list endpoints.
pub(crate) trait Page {
	type Item;

	fn next_page_token(&self) -> Option<&str>;

	fn into_items(self) -> Vec<Self::Item>;
}

/// Fetches every page of a list endpoint by following `nextPageToken`.
pub(crate) async fn collect_pages<P>(
	client: &ApiClient,
	url: &Url,
	query: &[(&str, String)],
) -> Result<Vec<P::Item>>
where
	P: Page + DeserializeOwned,
{
	let mut items = Vec::new();
	let mut token = None::<String>;

	loop {
		let mut params = query.to_vec();

		if let Some(token) = &token {
			params.push(("pageToken", token.clone()));
		}

		let page: P = client.get_json(url.clone(), &params).await?;
		let next = page.next_page_token().filter(|next| !next.is_empty()).map(str::to_owned);

		items.extend(page.into_items());

		if next.is_some() && next == token {
			tracing::warn!(%url, "List endpoint repeated its page token.");

			return Err(Error::Api {
				status: StatusCode::OK.as_u16(),
				message: "List endpoint returned the same nextPageToken twice".into(),
			});
		}

		token = next;

		if token.is_none() {
			return Ok(items);
		}
	}
}

/// Appends percent-encoded path segments to an API base URL.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::InvalidEndpoint {
			endpoint: "api",
			source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
		})?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

/// Parses a base URL, making sure it ends with a slash.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
	let raw = if raw.ends_with('/') { raw.to_owned() } else { format!("{raw}/") };

	Url::parse(&raw)
		.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "api", source }.into())
}

async fn decode<T>(response: Response) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status();
	let bytes = response.bytes().await.map_err(error::map_reqwest_error)?;
	let mut de = serde_json::Deserializer::from_slice(&bytes);

	serde_path_to_error::deserialize(&mut de).map_err(|e| Error::Api {
		status: status.as_u16(),
		message: format!("Response body is malformed at `{}`: {}", e.path(), e.inner()),
	})
}

fn api_error(status: StatusCode, body: &str) -> Error {
	#[derive(Deserialize)]
	struct Envelope {
		error: ErrorBody,
	}
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum ErrorBody {
		Detailed { message: String },
		Code(String),
	}

	let message = match serde_json::from_str::<Envelope>(body) {
		Ok(Envelope { error: ErrorBody::Detailed { message } }) => message,
		Ok(Envelope { error: ErrorBody::Code(code) }) => code,
		Err(_) if body.trim().is_empty() =>
			status.canonical_reason().unwrap_or("Unknown status").to_owned(),
		Err(_) => body.trim().to_owned(),
	};

	Error::Api { status: status.as_u16(), message }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn api_errors_prefer_google_message() {
		let err = api_error(
			StatusCode::NOT_FOUND,
			r#"{"error":{"code":404,"message":"Not Found","errors":[{"reason":"notFound"}]}}"#,
		);

		assert!(matches!(err, Error::Api { status: 404, message } if message == "Not Found"));

		let err = api_error(StatusCode::BAD_GATEWAY, "");

		assert!(matches!(err, Error::Api { status: 502, message } if message == "Bad Gateway"));

		let err = api_error(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_token"}"#);

		assert!(matches!(err, Error::Api { status: 401, message } if message == "invalid_token"));
	}

	#[test]
	fn endpoints_encode_identifiers() {
		let base = base_url("https://www.googleapis.com/calendar/v3").expect("Base should parse.");
		let url =
			endpoint(&base, &["calendars", "team#holiday@group.v.calendar.google.com", "events"])
				.expect("Endpoint should build.");

		assert_eq!(
			url.as_str(),
			"https://www.googleapis.com/calendar/v3/calendars/team%23holiday@group.v.calendar.google.com/events"
		);
	}
}
