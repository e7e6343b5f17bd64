//! Application-default credential discovery.

// std
use std::env;
// self
use crate::{_prelude::*, credential::metadata::METADATA_HOST};

/// Environment variable naming an explicit credential file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Environment variable overriding the gcloud configuration directory.
pub const CLOUDSDK_CONFIG_ENV: &str = "CLOUDSDK_CONFIG";
/// Environment variable overriding the metadata server host.
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
/// Environment variable that disables the metadata server probe when set to `true`.
pub const NO_GCE_CHECK_ENV: &str = "NO_GCE_CHECK";

const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

/// Inputs to application-default discovery, captured once so discovery never reads process state
/// behind the caller's back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdcEnvironment {
	/// `GOOGLE_APPLICATION_CREDENTIALS`.
	pub credentials_file: Option<PathBuf>,
	/// `CLOUDSDK_CONFIG`.
	pub cloudsdk_config: Option<PathBuf>,
	/// `%APPDATA%`, consulted on Windows.
	pub appdata: Option<PathBuf>,
	/// The user's home directory, consulted elsewhere.
	pub home: Option<PathBuf>,
	/// `GCE_METADATA_HOST`.
	pub metadata_host: Option<String>,
	/// Whether the metadata server may be probed.
	pub probe_metadata: bool,
	/// Whether the well-known path uses the Windows layout.
	pub windows: bool,
}
impl AdcEnvironment {
	/// Captures the current process environment.
	pub fn from_env() -> Self {
		Self {
			credentials_file: non_empty_var(CREDENTIALS_ENV).map(PathBuf::from),
			cloudsdk_config: non_empty_var(CLOUDSDK_CONFIG_ENV).map(PathBuf::from),
			appdata: non_empty_var("APPDATA").map(PathBuf::from).or_else(dirs::config_dir),
			home: dirs::home_dir(),
			metadata_host: non_empty_var(METADATA_HOST_ENV),
			probe_metadata: !non_empty_var(NO_GCE_CHECK_ENV)
				.is_some_and(|value| value.eq_ignore_ascii_case("true")),
			windows: cfg!(windows),
		}
	}

	/// An environment with nothing set and the metadata probe disabled.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Location of gcloud's application-default credential file.
	pub fn well_known_file(&self) -> Option<PathBuf> {
		let config_dir = match &self.cloudsdk_config {
			Some(dir) => dir.clone(),
			None if self.windows => self.appdata.as_ref()?.join("gcloud"),
			None => self.home.as_ref()?.join(".config").join("gcloud"),
		};

		Some(config_dir.join(WELL_KNOWN_FILE))
	}

	/// Metadata server host to probe.
	pub fn metadata_host(&self) -> &str {
		self.metadata_host.as_deref().unwrap_or(METADATA_HOST)
	}
}

fn non_empty_var(key: &str) -> Option<String> {
	env::var(key).ok().filter(|value| !value.trim().is_empty())
}
