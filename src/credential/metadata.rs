//! Compute Engine metadata server access.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenGrant},
	error::{self, ConfigError},
	http::HttpTransport,
	oauth,
};

/// Default metadata server host.
pub const METADATA_HOST: &str = "metadata.google.internal";

const FLAVOR_HEADER: &str = "Metadata-Flavor";
const FLAVOR: &str = "Google";
const TOKEN_PATH: &str = "computeMetadata/v1/instance/service-accounts/default/token";
const PROBE_TIMEOUT: StdDuration = StdDuration::from_secs(3);

/// Metadata server reachable from Compute Engine, GKE, Cloud Run, and friends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MetadataServer {
	base: Url,
}
impl MetadataServer {
	/// Builds a server handle from a host (`GCE_METADATA_HOST`) or a full base URL.
	pub(crate) fn new(host: &str) -> Result<Self> {
		let raw = if host.contains("://") { host.to_owned() } else { format!("http://{host}") };
		let mut base = Url::parse(&raw)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "metadata", source })?;

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		Ok(Self { base })
	}

	/// Returns true when the server answers with the `Metadata-Flavor: Google` header.
	pub(crate) async fn probe(&self, transport: &HttpTransport) -> bool {
		let response = transport
			.client()
			.get(self.base.clone())
			.header(FLAVOR_HEADER, FLAVOR)
			.timeout(PROBE_TIMEOUT)
			.send()
			.await;

		match response {
			Ok(response) => response
				.headers()
				.get(FLAVOR_HEADER)
				.is_some_and(|value| value.as_bytes() == FLAVOR.as_bytes()),
			Err(e) => {
				tracing::debug!(error = %e, base = %self.base, "Metadata server probe failed.");

				false
			},
		}
	}

	/// Fetches an access token for the default service account.
	pub(crate) async fn fetch_token(
		&self,
		transport: &HttpTransport,
		scope: &ScopeSet,
	) -> Result<TokenGrant> {
		let url = self.token_url(scope)?;
		let response = transport
			.client()
			.get(url)
			.header(FLAVOR_HEADER, FLAVOR)
			.send()
			.await
			.map_err(error::map_reqwest_error)?;

		oauth::read_token_response(response).await
	}

	fn token_url(&self, scope: &ScopeSet) -> Result<Url> {
		let mut url = self
			.base
			.join(TOKEN_PATH)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "metadata", source })?;

		if !scope.is_empty() {
			url.query_pairs_mut().append_pair("scopes", &scope.iter().collect::<Vec<_>>().join(","));
		}

		Ok(url)
	}
}
