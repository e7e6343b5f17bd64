//! JSON credential blobs (`authorized_user`, `service_account`).

// std
use std::fs;
// self
use crate::{
	_prelude::*,
	credential::service_account::ServiceAccountFile,
	error::CredentialError,
};

/// `authorized_user` blob written by `gcloud auth application-default login`.
#[derive(Clone, Deserialize)]
pub(crate) struct AuthorizedUserFile {
	pub(crate) client_id: String,
	#[serde(default)]
	pub(crate) client_secret: Option<String>,
	pub(crate) refresh_token: String,
	#[serde(default)]
	pub(crate) quota_project_id: Option<String>,
	#[serde(default)]
	pub(crate) token_uri: Option<Url>,
}

pub(crate) enum CredentialFile {
	AuthorizedUser(AuthorizedUserFile),
	ServiceAccount(ServiceAccountFile),
}
impl CredentialFile {
	pub(crate) fn from_json_str(json: &str) -> Result<Self, CredentialError> {
		#[derive(Deserialize)]
		struct Tag {
			#[serde(rename = "type", default)]
			kind: Option<String>,
		}

		let tag: Tag = deserialize(json)?;

		match tag.kind.as_deref() {
			Some("authorized_user") => deserialize(json).map(Self::AuthorizedUser),
			Some("service_account") => deserialize(json).map(Self::ServiceAccount),
			Some(other) => Err(CredentialError::UnsupportedType { kind: other.to_owned() }),
			None => Err(CredentialError::UnsupportedType { kind: "<missing>".into() }),
		}
	}

	pub(crate) fn from_path(path: &Path) -> Result<Self, CredentialError> {
		let json = fs::read_to_string(path)
			.map_err(|source| CredentialError::Read { path: path.to_owned(), source })?;

		Self::from_json_str(&json)
	}

	pub(crate) fn kind(&self) -> &'static str {
		match self {
			Self::AuthorizedUser(_) => "authorized_user",
			Self::ServiceAccount(_) => "service_account",
		}
	}
}

fn deserialize<T>(json: &str) -> Result<T, CredentialError>
where
	T: for<'de> Deserialize<'de>,
{
	let mut de = serde_json::Deserializer::from_str(json);

	serde_path_to_error::deserialize(&mut de).map_err(CredentialError::parse)
}
