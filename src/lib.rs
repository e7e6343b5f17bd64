//! Google OAuth 2.0 credentials without the ceremony: build a client-secret descriptor from
//! configuration, walk a user through the installed-app consent flow, turn stored tokens, JSON
//! key files, or application-default credentials into a self-refreshing [`credential::Credential`],
//! and call Calendar or Drive with it.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::ScopeSet,
		config::{ClientConfig, ClientSecrets, Endpoints},
		http::HttpTransport,
	};

	/// Builds a transport that accepts the self-signed certificates produced by `httpmock`
	/// during tests.
	pub fn test_transport() -> HttpTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		HttpTransport::with_client(client)
	}

	/// Points every OAuth endpoint at the provided mock base URL.
	pub fn test_endpoints(base: &str) -> Endpoints {
		let join = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Mock endpoint URL should parse.")
		};

		Endpoints {
			authorization: join("/o/oauth2/auth"),
			token: join("/token"),
			revocation: join("/revoke"),
		}
	}

	/// Builds a client configuration wired to the mock server endpoints.
	pub fn test_config(base: &str, client_id: &str, client_secret: &str) -> ClientConfig {
		ClientConfig {
			client_id: client_id.into(),
			client_secret: Some(client_secret.into()),
			redirect_uris: vec!["http://127.0.0.1:8085/callback".into()],
			endpoints: test_endpoints(base),
			..ClientConfig::default()
		}
	}

	/// Builds a client-secret descriptor wired to the mock server endpoints.
	pub fn test_secrets(base: &str, client_id: &str, client_secret: &str) -> ClientSecrets {
		ClientSecrets::from_config(&test_config(base, client_id, client_secret))
	}

	/// Parses a scope fixture.
	pub fn test_scope<I, S>(scopes: I) -> ScopeSet
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		ScopeSet::new(scopes).expect("Scope fixture should be valid.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, StatusCode};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
