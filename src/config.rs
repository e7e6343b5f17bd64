//! Client configuration and the client-secret descriptor derived from it.
//!
//! [`ClientConfig`] is the configuration map applications keep next to their code: client id,
//! secret, redirect URIs, optional timeouts and endpoint overrides, and optionally an embedded
//! [`Authorization`] captured by an earlier consent flow. [`ClientSecrets`] is the descriptor
//! the OAuth flows consume; it is built from a configuration by copying fields, or parsed from
//! the `client_secret.json` file the Google Cloud console hands out.

// std
use std::{fs, io::Read, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{Authorization, ScopeSet},
	error::ConfigError,
};

/// Google's consent screen.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Google's token revocation endpoint.
pub const GOOGLE_REVOKE_URI: &str = "https://oauth2.googleapis.com/revoke";

/// OAuth endpoints used by flows and credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Authorization (consent) endpoint.
	#[serde(rename = "auth_uri", default = "default_auth_uri")]
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	#[serde(rename = "token_uri", default = "default_token_uri")]
	pub token: Url,
	/// Revocation endpoint.
	#[serde(rename = "revoke_uri", default = "default_revoke_uri")]
	pub revocation: Url,
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			authorization: default_auth_uri(),
			token: default_token_uri(),
			revocation: default_revoke_uri(),
		}
	}
}

/// Optional per-request timeouts, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
	/// Upper bound for establishing a connection.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub connect_timeout_ms: Option<u64>,
	/// Upper bound for a whole request, from send to the last body byte.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_timeout_ms: Option<u64>,
}
impl Timeouts {
	/// Connect timeout as a [`std::time::Duration`].
	pub fn connect(&self) -> Option<StdDuration> {
		self.connect_timeout_ms.map(StdDuration::from_millis)
	}

	/// Request timeout as a [`std::time::Duration`].
	pub fn request(&self) -> Option<StdDuration> {
		self.request_timeout_ms.map(StdDuration::from_millis)
	}
}

/// Client configuration map.
///
/// ```json
/// {
///   "client_id": "123.apps.googleusercontent.com",
///   "client_secret": "GOCSPX-…",
///   "redirect_uris": ["http://127.0.0.1:8085/callback"],
///   "connect_timeout_ms": 5000,
///   "scopes": ["https://www.googleapis.com/auth/calendar.readonly"],
///   "authorization": { "access_token": "ya29…", "refresh_token": "1//…" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; installed apps still receive one from Google.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<String>,
	/// Redirect URIs registered for the client; the first one is used by the consent flow.
	#[serde(default)]
	pub redirect_uris: Vec<String>,
	/// Optional per-request timeouts.
	#[serde(flatten)]
	pub timeouts: Timeouts,
	/// Endpoint overrides; Google's production endpoints by default.
	#[serde(flatten)]
	pub endpoints: Endpoints,
	/// Scopes requested by the consent flow.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Authorization captured by an earlier consent flow.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorization: Option<Authorization>,
}
impl ClientConfig {
	/// Creates a configuration for the provided client credentials.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: Some(client_secret.into()),
			..Self::default()
		}
	}

	/// Parses a configuration from a JSON string.
	pub fn from_json_str(json: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(ConfigError::parse)?;

		config.validate()?;

		Ok(config)
	}

	/// Parses a configuration from any reader.
	pub fn from_reader(reader: impl Read) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_reader(reader);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(ConfigError::parse)?;

		config.validate()?;

		Ok(config)
	}

	/// Reads and parses a configuration file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let json = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;

		Self::from_json_str(&json)
	}

	/// Adds a redirect URI.
	pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uris.push(uri.into());

		self
	}

	/// Replaces the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Embeds a stored authorization.
	pub fn with_authorization(mut self, authorization: Authorization) -> Self {
		self.authorization = Some(authorization);

		self
	}

	/// Sets the per-request timeouts.
	pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
		self.timeouts = timeouts;

		self
	}

	/// Normalized scope set built from [`ClientConfig::scopes`].
	pub fn scope_set(&self) -> Result<ScopeSet> {
		ScopeSet::new(self.scopes.iter().cloned()).map_err(|e| ConfigError::from(e).into())
	}

	/// Checks the fields every operation reads.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}

		for uri in &self.redirect_uris {
			Url::parse(uri)
				.map_err(|source| ConfigError::InvalidRedirect { uri: uri.clone(), source })?;
		}

		ScopeSet::new(self.scopes.iter().cloned())?;

		Ok(())
	}
}

/// Which section of `client_secret.json` a descriptor came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
	/// Desktop / CLI clients (`installed`).
	#[default]
	Installed,
	/// Web server clients (`web`).
	Web,
}

/// Client-secret descriptor consumed by the OAuth flows and user credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecrets {
	/// Section the descriptor belongs to.
	pub kind: ClientKind,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Option<String>,
	/// Registered redirect URIs.
	pub redirect_uris: Vec<String>,
	/// Google Cloud project, when known.
	pub project_id: Option<String>,
	/// OAuth endpoints.
	pub endpoints: Endpoints,
	/// Per-request timeouts carried over from the configuration.
	pub timeouts: Timeouts,
}
impl ClientSecrets {
	/// Builds a descriptor by copying the relevant configuration fields.
	pub fn from_config(config: &ClientConfig) -> Self {
		Self {
			kind: ClientKind::Installed,
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			redirect_uris: config.redirect_uris.clone(),
			project_id: None,
			endpoints: config.endpoints.clone(),
			timeouts: config.timeouts,
		}
	}

	/// Parses Google's `client_secret.json` format.
	pub fn from_json_str(json: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(json);
		let file: ClientSecretFile =
			serde_path_to_error::deserialize(&mut de).map_err(ConfigError::parse)?;

		file.into_secrets()
	}

	/// Parses Google's `client_secret.json` format from a reader.
	pub fn from_reader(reader: impl Read) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_reader(reader);
		let file: ClientSecretFile =
			serde_path_to_error::deserialize(&mut de).map_err(ConfigError::parse)?;

		file.into_secrets()
	}

	/// Reads and parses a `client_secret.json` file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let json = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;

		Self::from_json_str(&json)
	}

	/// Renders the descriptor in Google's `client_secret.json` format.
	pub fn to_json_string(&self) -> Result<String> {
		let section = ClientSecretSection {
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			redirect_uris: self.redirect_uris.clone(),
			project_id: self.project_id.clone(),
			endpoints: self.endpoints.clone(),
		};
		let file = match self.kind {
			ClientKind::Installed => ClientSecretFile { installed: Some(section), web: None },
			ClientKind::Web => ClientSecretFile { installed: None, web: Some(section) },
		};

		serde_json::to_string_pretty(&file).map_err(|source| {
			ConfigError::Parse { path: ".".into(), source }.into()
		})
	}

	/// First registered redirect URI, parsed.
	pub fn primary_redirect(&self) -> Result<Url, ConfigError> {
		let uri = self.redirect_uris.first().ok_or(ConfigError::MissingRedirectUri)?;

		Url::parse(uri).map_err(|source| ConfigError::InvalidRedirect { uri: uri.clone(), source })
	}
}
impl Debug for ClientSecrets {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSecrets")
			.field("kind", &self.kind)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uris", &self.redirect_uris)
			.field("project_id", &self.project_id)
			.field("endpoints", &self.endpoints)
			.finish()
	}
}

#[derive(Serialize, Deserialize)]
struct ClientSecretFile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	installed: Option<ClientSecretSection>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	web: Option<ClientSecretSection>,
}
impl ClientSecretFile {
	fn into_secrets(self) -> Result<ClientSecrets> {
		let (kind, section) = match (self.installed, self.web) {
			(Some(section), _) => (ClientKind::Installed, section),
			(None, Some(section)) => (ClientKind::Web, section),
			(None, None) => return Err(ConfigError::MissingClientSection.into()),
		};

		if section.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId.into());
		}

		Ok(ClientSecrets {
			kind,
			client_id: section.client_id,
			client_secret: section.client_secret,
			redirect_uris: section.redirect_uris,
			project_id: section.project_id,
			endpoints: section.endpoints,
			timeouts: Timeouts::default(),
		})
	}
}

#[derive(Serialize, Deserialize)]
struct ClientSecretSection {
	client_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	client_secret: Option<String>,
	#[serde(default)]
	redirect_uris: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	project_id: Option<String>,
	#[serde(flatten)]
	endpoints: Endpoints,
}

fn default_auth_uri() -> Url {
	google_url(GOOGLE_AUTH_URI)
}

fn default_token_uri() -> Url {
	google_url(GOOGLE_TOKEN_URI)
}

fn default_revoke_uri() -> Url {
	google_url(GOOGLE_REVOKE_URI)
}

fn google_url(value: &'static str) -> Url {
	Url::parse(value).unwrap_or_else(|_| unreachable!("{value} is a valid absolute URL"))
}
