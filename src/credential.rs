//! Self-refreshing Google credentials.
//!
//! A [`Credential`] wraps one token source (a user's refresh token, a service account key, or
//! the Compute Engine metadata server) together with the scopes it should carry and the most
//! recent [`Authorization`] it minted. Clones share the cache, so an application can hand the
//! same credential to many tasks; concurrent callers that find the cached token stale wait on a
//! single refresh instead of each hitting the token endpoint.

mod adc;
mod file;
mod metadata;
mod metrics;
mod service_account;

pub use self::{adc::*, metadata::METADATA_HOST, metrics::RefreshMetrics};

// std
use std::io::Read;
// self
use crate::{
	_prelude::*,
	auth::{Authorization, ScopeSet, ScopeValidationError, TokenSecret},
	config::{ClientConfig, ClientSecrets, Endpoints},
	error::{ConfigError, CredentialError},
	http::HttpTransport,
	oauth::{self, TokenEndpoint},
	obs::{self, FlowKind},
	store::TokenStore,
};
use self::{
	file::{AuthorizedUserFile, CredentialFile},
	metadata::MetadataServer,
	service_account::ServiceAccountKey,
};

/// Cached access tokens expiring within this window are renewed before use.
pub const REFRESH_WINDOW: Duration = Duration::seconds(60);

/// Token source behind a [`Credential`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
	/// End-user authorization renewed with a refresh token.
	AuthorizedUser,
	/// Service account key signing JWT-bearer assertions.
	ServiceAccount,
	/// Default service account of the Compute Engine metadata server.
	ComputeMetadata,
}

#[derive(Clone)]
enum Source {
	User(UserClient),
	ServiceAccount(ServiceAccountKey),
	Metadata(MetadataServer),
}

#[derive(Clone)]
struct UserClient {
	client_id: String,
	client_secret: Option<String>,
	endpoints: Endpoints,
	quota_project_id: Option<String>,
}
impl UserClient {
	fn from_file(file: &AuthorizedUserFile) -> Self {
		let mut endpoints = Endpoints::default();

		if let Some(token_uri) = &file.token_uri {
			endpoints.token = token_uri.clone();
		}

		Self {
			client_id: file.client_id.clone(),
			client_secret: file.client_secret.clone(),
			endpoints,
			quota_project_id: file.quota_project_id.clone(),
		}
	}
}

#[derive(Clone)]
struct StoreBinding {
	store: Arc<dyn TokenStore>,
	account: String,
}

#[derive(Clone)]
struct Parts {
	source: Source,
	scope: ScopeSet,
	transport: HttpTransport,
	store: Option<StoreBinding>,
}

struct Inner {
	parts: Parts,
	cached: RwLock<Option<Authorization>>,
	refresh_guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}

/// Shared, self-refreshing Google credential.
#[derive(Clone)]
pub struct Credential(Arc<Inner>);
impl Credential {
	/// Builds a user credential from a stored token pair.
	///
	/// The authorization must carry an access token, a refresh token, or both.
	pub fn from_authorization(secrets: &ClientSecrets, authorization: Authorization) -> Result<Self> {
		let transport = HttpTransport::from_timeouts(&secrets.timeouts)?;

		Self::from_authorization_with(secrets, authorization, transport)
	}

	/// Same as [`Credential::from_authorization`] with an explicit transport.
	pub fn from_authorization_with(
		secrets: &ClientSecrets,
		authorization: Authorization,
		transport: HttpTransport,
	) -> Result<Self> {
		if authorization.access_token.is_empty() && !authorization.can_refresh() {
			return Err(ConfigError::MissingAuthorization.into());
		}

		let user = UserClient {
			client_id: secrets.client_id.clone(),
			client_secret: secrets.client_secret.clone(),
			endpoints: secrets.endpoints.clone(),
			quota_project_id: None,
		};
		let parts = Parts {
			source: Source::User(user),
			scope: authorization.scope.clone(),
			transport,
			store: None,
		};

		Ok(Self::from_parts(parts, Some(authorization)))
	}

	/// Builds a user credential from the authorization map embedded in a configuration.
	pub fn from_config(config: &ClientConfig) -> Result<Self> {
		let mut authorization =
			config.authorization.clone().ok_or(ConfigError::MissingAuthorization)?;

		if authorization.scope.is_empty() {
			authorization.scope = config.scope_set()?;
		}

		Self::from_authorization(&ClientSecrets::from_config(config), authorization)
	}

	/// Parses an `authorized_user` or `service_account` JSON blob.
	pub fn from_json_str(json: &str) -> Result<Self> {
		Self::from_file(CredentialFile::from_json_str(json)?, HttpTransport::default())
	}

	/// Parses a JSON credential blob from a reader.
	pub fn from_reader(mut reader: impl Read) -> Result<Self> {
		let mut json = String::new();

		reader
			.read_to_string(&mut json)
			.map_err(|source| CredentialError::Read { path: PathBuf::from("<reader>"), source })?;

		Self::from_json_str(&json)
	}

	/// Reads a JSON credential file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		Self::from_file(CredentialFile::from_path(path.as_ref())?, HttpTransport::default())
	}

	/// Uses the default service account of the metadata server at `host`.
	pub fn from_metadata_server(host: &str) -> Result<Self> {
		let parts = Parts {
			source: Source::Metadata(MetadataServer::new(host)?),
			scope: ScopeSet::default(),
			transport: HttpTransport::default(),
			store: None,
		};

		Ok(Self::from_parts(parts, None))
	}

	/// Discovers application-default credentials from the process environment.
	pub async fn application_default() -> Result<Self> {
		Self::application_default_with(&AdcEnvironment::from_env()).await
	}

	/// Discovers application-default credentials from a captured environment.
	///
	/// Sources are tried in order: the file named by `GOOGLE_APPLICATION_CREDENTIALS` (which must
	/// exist when set), gcloud's well-known file, then the metadata server.
	pub async fn application_default_with(env: &AdcEnvironment) -> Result<Self> {
		Self::discover(env, HttpTransport::default()).await
	}

	/// Same as [`Credential::application_default_with`] with an explicit transport.
	pub async fn discover(env: &AdcEnvironment, transport: HttpTransport) -> Result<Self> {
		if let Some(path) = &env.credentials_file {
			if !path.is_file() {
				return Err(CredentialError::MissingEnvFile { path: path.clone() }.into());
			}

			tracing::info!(path = %path.display(), "Using credentials named by {CREDENTIALS_ENV}.");

			return Self::from_file(CredentialFile::from_path(path)?, transport);
		}
		if let Some(path) = env.well_known_file().filter(|path| path.is_file()) {
			tracing::info!(path = %path.display(), "Using gcloud application default credentials.");

			return Self::from_file(CredentialFile::from_path(&path)?, transport);
		}
		if env.probe_metadata {
			let server = MetadataServer::new(env.metadata_host())?;

			if server.probe(&transport).await {
				tracing::info!(host = env.metadata_host(), "Using the metadata server.");

				let parts = Parts {
					source: Source::Metadata(server),
					scope: ScopeSet::default(),
					transport,
					store: None,
				};

				return Ok(Self::from_parts(parts, None));
			}
		}

		Err(CredentialError::ApplicationDefaultNotFound.into())
	}

	fn from_file(file: CredentialFile, transport: HttpTransport) -> Result<Self> {
		tracing::debug!(kind = file.kind(), "Loading credential file.");

		let (source, cached) = match file {
			CredentialFile::AuthorizedUser(user) => (
				Source::User(UserClient::from_file(&user)),
				Some(Authorization::from_refresh_token(user.refresh_token)),
			),
			CredentialFile::ServiceAccount(account) =>
				(Source::ServiceAccount(ServiceAccountKey::from_file(account)?), None),
		};
		let parts = Parts { source, scope: ScopeSet::default(), transport, store: None };

		Ok(Self::from_parts(parts, cached))
	}

	fn from_parts(parts: Parts, cached: Option<Authorization>) -> Self {
		Self(Arc::new(Inner {
			parts,
			cached: RwLock::new(cached),
			refresh_guard: AsyncMutex::new(()),
			metrics: RefreshMetrics::default(),
		}))
	}

	/// Returns a credential using `transport` for every token request.
	pub fn with_transport(&self, transport: HttpTransport) -> Self {
		let mut parts = self.0.parts.clone();

		parts.transport = transport;

		Self::from_parts(parts, self.cached_authorization())
	}

	/// Returns a credential that persists each minted authorization under `account` and prefers
	/// a fresher stored one over its own cache.
	pub fn with_token_store(&self, store: Arc<dyn TokenStore>, account: impl Into<String>) -> Self {
		let mut parts = self.0.parts.clone();

		parts.store = Some(StoreBinding { store, account: account.into() });

		Self::from_parts(parts, self.cached_authorization())
	}

	/// Returns a service account credential impersonating `subject` through domain-wide
	/// delegation. Other credential kinds are returned unchanged.
	pub fn with_subject(&self, subject: impl Into<String>) -> Self {
		let mut parts = self.0.parts.clone();

		match &mut parts.source {
			Source::ServiceAccount(key) => key.subject = Some(subject.into()),
			_ => {
				tracing::warn!(kind = ?self.kind(), "Only service accounts can impersonate a subject.");

				return self.clone();
			},
		}

		Self::from_parts(parts, None)
	}

	/// Returns a credential whose scope set is the union of the current and the given scopes.
	///
	/// Service account and metadata credentials drop their cached token when the set grows so
	/// the next request mints one for the new scopes. User credentials only record the scopes;
	/// the refresh grant cannot widen what the user consented to.
	pub fn with_scopes<I, S>(&self, scopes: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let added = ScopeSet::new(scopes).map_err(ConfigError::from)?;
		let mut parts = self.0.parts.clone();
		let merged = parts.scope.union(&added);
		let grew = merged != parts.scope;

		parts.scope = merged;

		let cached = match parts.source {
			Source::ServiceAccount(_) | Source::Metadata(_) if grew => None,
			_ => self.cached_authorization(),
		};

		if grew {
			tracing::debug!(scope = %parts.scope, "Credential scopes extended.");
		}

		Ok(Self::from_parts(parts, cached))
	}

	/// True when the credential cannot mint a token until scopes are attached.
	pub fn requires_scopes(&self) -> bool {
		matches!(self.0.parts.source, Source::ServiceAccount(_)) && self.0.parts.scope.is_empty()
	}

	/// Token source kind.
	pub fn kind(&self) -> CredentialKind {
		match self.0.parts.source {
			Source::User(_) => CredentialKind::AuthorizedUser,
			Source::ServiceAccount(_) => CredentialKind::ServiceAccount,
			Source::Metadata(_) => CredentialKind::ComputeMetadata,
		}
	}

	/// Scopes requested for new tokens.
	pub fn scopes(&self) -> &ScopeSet {
		&self.0.parts.scope
	}

	/// Project billed for API calls (`quota_project_id`, or a service account's project).
	pub fn quota_project_id(&self) -> Option<&str> {
		match &self.0.parts.source {
			Source::User(user) => user.quota_project_id.as_deref(),
			Source::ServiceAccount(key) => key.project_id.as_deref(),
			Source::Metadata(_) => None,
		}
	}

	/// Service account e-mail, for service account credentials.
	pub fn service_account_email(&self) -> Option<&str> {
		match &self.0.parts.source {
			Source::ServiceAccount(key) => Some(&key.client_email),
			_ => None,
		}
	}

	/// Transport shared by token requests and API calls.
	pub fn transport(&self) -> &HttpTransport {
		&self.0.parts.transport
	}

	/// Most recently minted authorization, without refreshing.
	pub fn cached_authorization(&self) -> Option<Authorization> {
		self.0.cached.read().clone()
	}

	/// Refresh counters for this credential instance.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.0.metrics
	}

	/// Returns a usable access token, refreshing first when needed.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		Ok(self.authorization().await?.access_token)
	}

	/// Returns a usable authorization, refreshing first when the cached one is missing or
	/// expires within [`REFRESH_WINDOW`].
	pub async fn authorization(&self) -> Result<Authorization> {
		if let Some(current) = self.fresh_cached() {
			return Ok(current);
		}

		let _singleflight = self.0.refresh_guard.lock().await;

		self.adopt_stored().await?;

		if let Some(current) = self.fresh_cached() {
			return Ok(current);
		}

		self.refresh_locked().await
	}

	/// Mints a new authorization regardless of the cached one.
	pub async fn refresh(&self) -> Result<Authorization> {
		let _singleflight = self.0.refresh_guard.lock().await;

		self.refresh_locked().await
	}

	/// Revokes the refresh token (or the access token when there is none) and clears the cache.
	pub async fn revoke(&self) -> Result<()> {
		let _singleflight = self.0.refresh_guard.lock().await;
		let parts = &self.0.parts;
		let token = self.cached_authorization().and_then(|current| {
			current
				.refresh_token
				.filter(|token| !token.is_empty())
				.or_else(|| Some(current.access_token).filter(|token| !token.is_empty()))
		});

		if let Some(token) = token {
			let revocation = self.revocation_url();

			obs::observe(
				FlowKind::Revocation,
				"revoke",
				oauth::revoke(&parts.transport, &revocation, &token),
			)
			.await?;
		}

		*self.0.cached.write() = None;

		if let Some(binding) = &parts.store {
			binding.store.remove(&binding.account).await?;
		}

		Ok(())
	}

	fn fresh_cached(&self) -> Option<Authorization> {
		let now = OffsetDateTime::now_utc();

		self.0
			.cached
			.read()
			.as_ref()
			.filter(|current| !current.needs_refresh_at(now, REFRESH_WINDOW))
			.cloned()
	}

	fn revocation_url(&self) -> Url {
		match &self.0.parts.source {
			Source::User(user) => user.endpoints.revocation.clone(),
			_ => Endpoints::default().revocation,
		}
	}

	async fn adopt_stored(&self) -> Result<()> {
		let Some(binding) = &self.0.parts.store else {
			return Ok(());
		};
		let Some(stored) = binding.store.fetch(&binding.account).await? else {
			return Ok(());
		};

		if !stored.scope.contains_all(&self.0.parts.scope) {
			return Ok(());
		}

		let mut cached = self.0.cached.write();
		let newer = match cached.as_ref() {
			None => true,
			Some(current) => match (stored.expires_at, current.expires_at) {
				(Some(stored_at), Some(current_at)) => stored_at > current_at,
				(Some(_), None) => current.access_token.is_empty(),
				_ => false,
			},
		};

		if newer {
			tracing::debug!(account = %binding.account, "Adopted stored authorization.");

			*cached = Some(stored);
		}

		Ok(())
	}

	async fn refresh_locked(&self) -> Result<Authorization> {
		self.0.metrics.record_attempt();

		let authorization = match self.mint().await {
			Ok(authorization) => authorization,
			Err(e) => {
				self.0.metrics.record_failure();

				return Err(e);
			},
		};

		*self.0.cached.write() = Some(authorization.clone());

		if let Some(binding) = &self.0.parts.store {
			binding.store.save(&binding.account, authorization.clone()).await.inspect_err(|_| {
				self.0.metrics.record_failure();
			})?;
		}

		self.0.metrics.record_success(OffsetDateTime::now_utc());

		tracing::debug!(
			kind = ?self.kind(),
			expires_at = ?authorization.expires_at,
			"Credential refreshed."
		);

		Ok(authorization)
	}

	async fn mint(&self) -> Result<Authorization> {
		let parts = &self.0.parts;

		match &parts.source {
			Source::User(user) => self.refresh_user(user).await,
			Source::ServiceAccount(key) => {
				if parts.scope.is_empty() {
					return Err(ConfigError::InvalidScope(ScopeValidationError::Empty).into());
				}

				let issued_at = OffsetDateTime::now_utc();
				let assertion = key.assertion(&parts.scope, issued_at)?;
				let grant = obs::observe(
					FlowKind::ServiceAccount,
					"jwt_bearer",
					oauth::exchange_jwt_bearer(&parts.transport, &key.token_uri, &assertion),
				)
				.await?;

				grant.into_authorization(issued_at, &parts.scope, None)
			},
			Source::Metadata(server) => {
				let issued_at = OffsetDateTime::now_utc();
				let grant = obs::observe(
					FlowKind::Metadata,
					"fetch_token",
					server.fetch_token(&parts.transport, &parts.scope),
				)
				.await?;

				grant.into_authorization(issued_at, &parts.scope, None)
			},
		}
	}

	async fn refresh_user(&self, user: &UserClient) -> Result<Authorization> {
		let parts = &self.0.parts;
		let current = self.cached_authorization().ok_or(ConfigError::MissingAuthorization)?;
		let Some(refresh_token) = current.refresh_token.clone().filter(|token| !token.is_empty())
		else {
			return Err(ConfigError::MissingRefreshToken.into());
		};
		let endpoint = TokenEndpoint::new(
			&user.client_id,
			user.client_secret.as_deref(),
			&user.endpoints,
			parts.transport.clone(),
		)?;
		let requested = if current.scope.is_empty() { &parts.scope } else { &current.scope };
		let issued_at = OffsetDateTime::now_utc();

		match obs::observe(FlowKind::Refresh, "refresh_token", endpoint.refresh(&refresh_token)).await
		{
			Ok(grant) => grant.into_authorization(issued_at, requested, Some(&refresh_token)),
			Err(e) => {
				if matches!(e, Error::RefreshTokenRevoked { .. }) {
					tracing::warn!("Refresh token was rejected; the consent flow must be run again.");

					if let Some(binding) = &parts.store {
						binding.store.remove(&binding.account).await?;
					}
				}

				Err(e)
			},
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("kind", &self.kind())
			.field("scope", &self.0.parts.scope)
			.field("cached", &self.0.cached.read().is_some())
			.field("store", &self.0.parts.store.as_ref().map(|binding| &binding.account))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn user_credential(authorization: Authorization) -> Result<Credential> {
		Credential::from_authorization_with(
			&test_secrets("https://oauth.example.com", "client-id", "client-secret"),
			authorization,
			HttpTransport::default(),
		)
	}

	#[test]
	fn stored_pairs_need_some_token() {
		assert!(matches!(
			user_credential(Authorization::new("")),
			Err(Error::Config(ConfigError::MissingAuthorization))
		));
		assert!(user_credential(Authorization::from_refresh_token("1//r")).is_ok());
	}

	#[test]
	fn config_without_authorization_is_rejected() {
		let config = test_config("https://oauth.example.com", "id", "secret");

		assert!(matches!(
			Credential::from_config(&config),
			Err(Error::Config(ConfigError::MissingAuthorization))
		));

		let credential = Credential::from_config(
			&config
				.with_scopes(["https://www.googleapis.com/auth/calendar"])
				.with_authorization(Authorization::new("ya29.cfg")),
		)
		.expect("Config with authorization should build a credential.");

		assert_eq!(credential.kind(), CredentialKind::AuthorizedUser);
		assert!(credential.scopes().contains("https://www.googleapis.com/auth/calendar"));
	}

	#[tokio::test]
	async fn fresh_tokens_are_served_from_cache() {
		let credential = user_credential(
			Authorization::new("ya29.cached")
				.with_expires_at(OffsetDateTime::now_utc() + Duration::hours(1)),
		)
		.expect("Credential should build.");
		let token = credential.access_token().await.expect("Cached token should be returned.");

		assert_eq!(token.expose(), "ya29.cached");
		assert_eq!(credential.refresh_metrics().attempts(), 0);
	}

	#[tokio::test]
	async fn expired_tokens_without_refresh_are_rejected() {
		let credential = user_credential(
			Authorization::new("ya29.old")
				.with_expires_at(OffsetDateTime::now_utc() - Duration::minutes(5)),
		)
		.expect("Credential should build.");

		assert!(matches!(
			credential.access_token().await,
			Err(Error::Config(ConfigError::MissingRefreshToken))
		));
		assert_eq!(credential.refresh_metrics().failures(), 1);
	}

	#[test]
	fn user_scopes_are_recorded_without_dropping_cache() {
		let credential = user_credential(Authorization::new("ya29.keep"))
			.expect("Credential should build.")
			.with_scopes(["https://www.googleapis.com/auth/drive"])
			.expect("Scopes should attach.");

		assert!(credential.scopes().contains("https://www.googleapis.com/auth/drive"));
		assert!(credential.cached_authorization().is_some());
		assert!(!credential.requires_scopes());
		assert!(credential.with_scopes(["bad scope"]).is_err());
	}

	#[test]
	fn debug_output_hides_tokens() {
		let credential =
			user_credential(Authorization::new("ya29.hidden")).expect("Credential should build.");

		assert!(!format!("{credential:?}").contains("ya29.hidden"));
	}
}
