//! Persistence for authorizations minted by credentials.
//!
//! A [`TokenStore`] keeps one [`Authorization`] per account name. Credentials configured with
//! [`Credential::with_token_store`](crate::credential::Credential::with_token_store) save every
//! refreshed authorization and prefer a stored one over the copy they were built with.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Authorization};

/// Boxed future returned by [`TokenStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for authorizations keyed by account.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the authorization for `account`.
	fn save<'a>(&'a self, account: &'a str, authorization: Authorization) -> StoreFuture<'a, ()>;

	/// Fetches the authorization for `account`, if present.
	fn fetch<'a>(&'a self, account: &'a str) -> StoreFuture<'a, Option<Authorization>>;

	/// Removes and returns the authorization for `account`.
	fn remove<'a>(&'a self, account: &'a str) -> StoreFuture<'a, Option<Authorization>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
