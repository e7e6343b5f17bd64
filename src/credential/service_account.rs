//! Service account keys and the RS256 assertions they sign.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	config::GOOGLE_TOKEN_URI,
	error::CredentialError,
};

const ASSERTION_LIFETIME: Duration = Duration::hours(1);

/// `service_account` key file as downloaded from the Google Cloud console.
#[derive(Clone, Deserialize)]
pub(crate) struct ServiceAccountFile {
	pub(crate) client_email: String,
	pub(crate) private_key: String,
	#[serde(default)]
	pub(crate) private_key_id: Option<String>,
	#[serde(default)]
	pub(crate) client_id: Option<String>,
	#[serde(default)]
	pub(crate) project_id: Option<String>,
	#[serde(default = "default_token_uri")]
	pub(crate) token_uri: Url,
}

/// Loaded signing key plus the identity claims it asserts.
#[derive(Clone)]
pub(crate) struct ServiceAccountKey {
	pub(crate) client_email: String,
	pub(crate) project_id: Option<String>,
	pub(crate) token_uri: Url,
	pub(crate) subject: Option<String>,
	key_id: Option<String>,
	encoding_key: EncodingKey,
}
impl ServiceAccountKey {
	pub(crate) fn from_file(file: ServiceAccountFile) -> Result<Self, CredentialError> {
		let encoding_key = EncodingKey::from_rsa_pem(file.private_key.as_bytes())
			.map_err(CredentialError::InvalidPrivateKey)?;

		tracing::debug!(
			client_email = %file.client_email,
			client_id = file.client_id.as_deref().unwrap_or_default(),
			"Loaded service account key."
		);

		Ok(Self {
			client_email: file.client_email,
			project_id: file.project_id,
			token_uri: file.token_uri,
			subject: None,
			key_id: file.private_key_id,
			encoding_key,
		})
	}

	/// Signs a JWT-bearer assertion for `scope`, valid for one hour from `issued_at`.
	pub(crate) fn assertion(
		&self,
		scope: &ScopeSet,
		issued_at: OffsetDateTime,
	) -> Result<String, CredentialError> {
		let mut header = Header::new(Algorithm::RS256);

		header.kid = self.key_id.clone();

		let claims = AssertionClaims {
			iss: &self.client_email,
			scope: scope.normalized(),
			aud: self.token_uri.as_str(),
			iat: issued_at.unix_timestamp(),
			exp: (issued_at + ASSERTION_LIFETIME).unix_timestamp(),
			sub: self.subject.as_deref(),
		};

		jsonwebtoken::encode(&header, &claims, &self.encoding_key)
			.map_err(CredentialError::InvalidPrivateKey)
	}
}
impl Debug for ServiceAccountKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceAccountKey")
			.field("client_email", &self.client_email)
			.field("project_id", &self.project_id)
			.field("token_uri", &self.token_uri)
			.field("subject", &self.subject)
			.field("key_id", &self.key_id)
			.finish_non_exhaustive()
	}
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	iss: &'a str,
	scope: String,
	aud: &'a str,
	iat: i64,
	exp: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	sub: Option<&'a str>,
}

fn default_token_uri() -> Url {
	Url::parse(GOOGLE_TOKEN_URI).unwrap_or_else(|_| unreachable!("{GOOGLE_TOKEN_URI} is valid"))
}
