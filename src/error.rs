//! Crate-level error types shared across flows, credentials, stores, and API services.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential file or discovery problem.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Google rejected the grant (bad code, revoked refresh token, expired assertion).
	#[error("Google rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// Google answered a refresh grant with `invalid_grant`: the refresh token was revoked or
	/// expired and the consent flow must run again.
	#[error("Refresh token was rejected: {reason}.")]
	RefreshTokenRevoked {
		/// `error_description` from Google, or the bare error code.
		reason: String,
	},
	/// Client authentication failed or the client is not allowed to use the grant.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// A Google REST API answered with a non-success status.
	#[error("Google API returned {status}: {message}.")]
	Api {
		/// HTTP status code.
		status: u16,
		/// `error.message` from the response body, or the raw body when it is not JSON.
		message: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI `{uri}` is invalid.")]
	InvalidRedirect {
		/// Offending redirect URI.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The configuration does not carry a client identifier.
	#[error("Client configuration is missing client_id.")]
	MissingClientId,
	/// The configuration does not carry any redirect URI.
	#[error("Client configuration has no redirect URIs.")]
	MissingRedirectUri,
	/// The configuration does not embed an authorization map.
	#[error("Client configuration has no stored authorization.")]
	MissingAuthorization,
	/// The stored authorization cannot be refreshed and has expired.
	#[error("Stored authorization has no refresh token and the access token has expired.")]
	MissingRefreshToken,
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Configuration JSON could not be parsed.
	#[error("Configuration is not valid JSON at `{path}`.")]
	Parse {
		/// JSON path where parsing failed.
		path: String,
		/// Underlying parse failure.
		#[source]
		source: serde_json::Error,
	},
	/// Configuration file could not be read.
	#[error("Configuration file {path} could not be read.")]
	Read {
		/// File path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Client-secret JSON lacks both the `installed` and `web` sections.
	#[error("Client secret JSON must contain an `installed` or `web` section.")]
	MissingClientSection,
	/// A timestamp could not be rendered as RFC 3339.
	#[error("Timestamp cannot be rendered as RFC 3339.")]
	InvalidTimestamp(#[from] time::error::Format),
	/// Token endpoint returned a non-positive or out-of-range `expires_in`.
	#[error("The expires_in value must be a positive number of seconds.")]
	InvalidExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn parse(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { path: err.path().to_string(), source: err.into_inner() }
	}
}

/// Credential file and discovery failures.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// Credential file could not be read.
	#[error("Credential file {path} could not be read.")]
	Read {
		/// File path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Credential JSON could not be parsed.
	#[error("Credential JSON is malformed at `{path}`.")]
	Parse {
		/// JSON path where parsing failed.
		path: String,
		/// Underlying parse failure.
		#[source]
		source: serde_json::Error,
	},
	/// The `type` field names a credential kind this crate does not construct.
	#[error("Credential type `{kind}` is not supported.")]
	UnsupportedType {
		/// Value of the `type` field.
		kind: String,
	},
	/// The service account private key could not be loaded or used for signing.
	#[error("Service account private key is invalid.")]
	InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),
	/// `GOOGLE_APPLICATION_CREDENTIALS` points at a missing file.
	#[error("GOOGLE_APPLICATION_CREDENTIALS points at {path}, which does not exist.")]
	MissingEnvFile {
		/// Path taken from the environment.
		path: PathBuf,
	},
	/// No application-default credential source was found.
	#[error(
		"Application default credentials are not available. Set GOOGLE_APPLICATION_CREDENTIALS, run `gcloud auth application-default login`, or run on Google Cloud."
	)]
	ApplicationDefaultNotFound,
}
impl CredentialError {
	pub(crate) fn parse(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { path: err.path().to_string(), source: err.into_inner() }
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling Google.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport or console interaction.
	#[error("I/O error occurred while calling Google.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Converts a raw reqwest failure into the crate taxonomy.
pub(crate) fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::http_client_build(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out".into(),
			status: err.status().map(|code| code.as_u16()),
			retry_after: None,
		}
		.into();
	}

	TransportError::from(err).into()
}
