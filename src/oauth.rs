//! Token endpoint facade and OAuth error classification.
//!
//! Authorization-code exchanges and refresh grants go through the `oauth2` crate's
//! [`BasicClient`]. Grants `oauth2` does not model (JWT bearer assertions, the metadata
//! server's token document, revocation) are sent as plain reqwest requests and parsed with the
//! same error classification so every path surfaces the same [`Error`] variants.

pub use oauth2;

// std
use std::{borrow::Cow, time::Duration as StdDuration};
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{
		BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError,
		BasicTokenResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{BEARER, ScopeSet, TokenGrant, TokenSecret},
	config::Endpoints,
	error::{self, ConfigError, TransientError, TransportError},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
};

/// Grant type used when exchanging a signed service account assertion.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Client-authenticated token endpoint used by the consent flow and user credentials.
#[derive(Clone)]
pub(crate) struct TokenEndpoint {
	oauth_client: ConfiguredBasicClient,
	transport: HttpTransport,
	token_url: Url,
}
impl TokenEndpoint {
	/// Builds a facade that authenticates with the client id and secret in the request body.
	pub(crate) fn new(
		client_id: &str,
		client_secret: Option<&str>,
		endpoints: &Endpoints,
		transport: HttpTransport,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "authorization", source })?;
		let token_url = TokenUrl::new(endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}

		Ok(Self { oauth_client, transport, token_url: endpoints.token.clone() })
	}

	/// Exchanges an authorization code obtained with a PKCE challenge.
	pub(crate) async fn exchange_code(
		&self,
		code: &str,
		pkce_verifier: &str,
		redirect_uri: &Url,
	) -> Result<TokenGrant> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.transport.instrumented(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|source| {
			ConfigError::InvalidRedirect { uri: redirect_uri.to_string(), source }
		})?;
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&handle)
			.await
			.map_err(|e| map_request_error(meta.take(), e))?;

		tracing::debug!(token_url = %self.token_url, "Authorization code exchanged.");

		grant_from_response(&response)
	}

	/// Runs the `refresh_token` grant.
	pub(crate) async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenGrant> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.transport.instrumented(meta.clone());
		let refresh = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh)
			.request_async(&handle)
			.await
			.map_err(|e| match e {
				// Only Google's literal `invalid_grant` means the refresh token itself is dead.
				RequestTokenError::ServerResponse(response)
					if *response.error() == BasicErrorResponseType::InvalidGrant =>
					Error::RefreshTokenRevoked {
						reason: response
							.error_description()
							.cloned()
							.unwrap_or_else(|| "invalid_grant".into()),
					},
				e => map_request_error(meta.take(), e),
			})?;

		grant_from_response(&response)
	}
}
impl Debug for TokenEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint").field("token_url", &self.token_url).finish()
	}
}

/// Exchanges a signed JWT assertion for an access token.
pub(crate) async fn exchange_jwt_bearer(
	transport: &HttpTransport,
	token_url: &Url,
	assertion: &str,
) -> Result<TokenGrant> {
	let response = transport
		.client()
		.post(token_url.clone())
		.form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
		.send()
		.await
		.map_err(error::map_reqwest_error)?;

	read_token_response(response).await
}

/// Revokes an access or refresh token.
pub(crate) async fn revoke(
	transport: &HttpTransport,
	revocation_url: &Url,
	token: &TokenSecret,
) -> Result<()> {
	let response = transport
		.client()
		.post(revocation_url.clone())
		.form(&[("token", token.expose())])
		.send()
		.await
		.map_err(error::map_reqwest_error)?;
	let meta = ResponseMetadata::from_parts(response.status(), response.headers());

	if response.status().is_success() {
		return Ok(());
	}

	let body = response.bytes().await.map_err(error::map_reqwest_error)?;

	Err(classify_error_body(&meta, &body))
}

/// Reads a token endpoint (or metadata server) response into a [`TokenGrant`].
pub(crate) async fn read_token_response(response: reqwest::Response) -> Result<TokenGrant> {
	let meta = ResponseMetadata::from_parts(response.status(), response.headers());
	let success = response.status().is_success();
	let body = response.bytes().await.map_err(error::map_reqwest_error)?;

	if !success {
		return Err(classify_error_body(&meta, &body));
	}

	parse_token_body(&meta, &body)
}

fn parse_token_body(meta: &ResponseMetadata, body: &[u8]) -> Result<TokenGrant> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let raw: RawTokenResponse = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TransientError::TokenResponseParse { source, status: meta.status })?;
	let expires_in = raw.expires_in.map(lifetime_from_secs).transpose()?;

	Ok(TokenGrant {
		access_token: TokenSecret::new(raw.access_token),
		refresh_token: raw.refresh_token.map(TokenSecret::new),
		token_type: raw.token_type.unwrap_or_else(|| BEARER.into()),
		expires_in,
		scope: raw.scope.filter(|scope| !scope.is_empty()),
	})
}

fn classify_error_body(meta: &ResponseMetadata, body: &[u8]) -> Error {
	match serde_json::from_slice::<RawErrorResponse>(body) {
		Ok(raw) => oauth_error(
			meta,
			Some(raw.error.as_str()),
			raw.error_description.as_deref(),
			None,
		),
		Err(_) => {
			let preview = String::from_utf8_lossy(body);

			oauth_error(meta, None, None, Some(preview.trim()))
		},
	}
}

#[derive(Deserialize)]
struct RawTokenResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	scope: Option<ScopeSet>,
}

#[derive(Deserialize)]
struct RawErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn grant_from_response(response: &BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().map(lifetime_from_std).transpose()?;
	let scope = response
		.scopes()
		.map(|scopes| ScopeSet::new(scopes.iter().map(|scope| scope.as_ref())))
		.transpose()
		.map_err(ConfigError::from)?
		.filter(|scope| !scope.is_empty());
	let token_type = match response.token_type() {
		BasicTokenType::Bearer => BEARER.to_owned(),
		BasicTokenType::Mac => "MAC".to_owned(),
		BasicTokenType::Extension(value) => value.clone(),
	};

	Ok(TokenGrant {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
		token_type,
		expires_in,
		scope,
	})
}

fn lifetime_from_std(expires_in: StdDuration) -> Result<Duration> {
	let secs = i64::try_from(expires_in.as_secs()).map_err(|_| ConfigError::InvalidExpiresIn)?;

	lifetime_from_secs(secs)
}

fn lifetime_from_secs(secs: i64) -> Result<Duration> {
	if secs <= 0 {
		return Err(ConfigError::InvalidExpiresIn.into());
	}

	Ok(Duration::seconds(secs))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ErrorKind {
	InvalidGrant,
	InvalidClient,
	InsufficientScope,
	Transient,
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta = meta.unwrap_or_default();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(&meta, &response),
		RequestTokenError::Request(error) => map_transport_error(&meta, error),
		// Non-JSON error pages (proxies, 5xx) fall back to body and status classification.
		RequestTokenError::Parse(_, body)
			if meta.status.is_some_and(|status| !(200..300).contains(&status)) =>
		{
			let preview = String::from_utf8_lossy(&body);

			oauth_error(&meta, None, None, Some(preview.trim()))
		},
		RequestTokenError::Parse(source, _) =>
			TransientError::TokenResponseParse { source, status: meta.status }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn map_server_response(meta: &ResponseMetadata, response: &BasicErrorResponse) -> Error {
	oauth_error(
		meta,
		Some(response.error().as_ref()),
		response.error_description().map(String::as_str),
		None,
	)
}

fn map_transport_error(meta: &ResponseMetadata, err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => error::map_reqwest_error(*inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error: {message}"),
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error".into(),
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn oauth_error(
	meta: &ResponseMetadata,
	code: Option<&str>,
	description: Option<&str>,
	body: Option<&str>,
) -> Error {
	let kind = code
		.and_then(classify_code)
		.or_else(|| description.and_then(classify_text))
		.or_else(|| body.and_then(classify_text))
		.unwrap_or_else(|| classify_status(meta.status));
	let reason = match (code, description, body) {
		(Some(code), Some(description), _) => format!("{code} ({description})"),
		(Some(code), None, _) => code.to_owned(),
		(None, _, Some(body)) if !body.is_empty() => body.to_owned(),
		_ => format!("HTTP {}", meta.status.unwrap_or_default()),
	};

	match kind {
		ErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		ErrorKind::InvalidClient => Error::InvalidClient { reason },
		ErrorKind::InsufficientScope => Error::InsufficientScope { reason },
		ErrorKind::Transient => TransientError::TokenEndpoint {
			message: reason,
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn classify_code(code: &str) -> Option<ErrorKind> {
	match code.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" | "invalid_token" | "invalid_request" =>
			Some(ErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ErrorKind::InvalidClient),
		"invalid_scope" | "insufficient_scope" => Some(ErrorKind::InsufficientScope),
		"temporarily_unavailable" | "server_error" => Some(ErrorKind::Transient),
		_ => None,
	}
}

fn classify_text(text: &str) -> Option<ErrorKind> {
	let lowered = text.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(ErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") => Some(ErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ErrorKind {
	match status {
		Some(400 | 404 | 410) => ErrorKind::InvalidGrant,
		Some(401) => ErrorKind::InvalidClient,
		Some(403) => ErrorKind::InsufficientScope,
		_ => ErrorKind::Transient,
	}
}
