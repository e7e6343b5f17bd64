//! In-process [`TokenStore`] used by tests and short-lived tools.

// self
use crate::{
	_prelude::*,
	auth::Authorization,
	store::{StoreFuture, TokenStore},
};

/// Thread-safe in-memory store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	inner: Arc<RwLock<HashMap<String, Authorization>>>,
}
impl MemoryStore {
	/// Number of stored accounts.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}
}
impl TokenStore for MemoryStore {
	fn save<'a>(&'a self, account: &'a str, authorization: Authorization) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.inner.write().insert(account.to_owned(), authorization);

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, account: &'a str) -> StoreFuture<'a, Option<Authorization>> {
		Box::pin(async move { Ok(self.inner.read().get(account).cloned()) })
	}

	fn remove<'a>(&'a self, account: &'a str) -> StoreFuture<'a, Option<Authorization>> {
		Box::pin(async move { Ok(self.inner.write().remove(account)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn save_fetch_remove() {
		let store = MemoryStore::default();

		store
			.save("user@example.com", Authorization::new("ya29.a").with_refresh_token("1//r"))
			.await
			.expect("Saving into memory should succeed.");

		let fetched = store
			.fetch("user@example.com")
			.await
			.expect("Fetching from memory should succeed.")
			.expect("Saved authorization should be present.");

		assert_eq!(fetched.access_token.expose(), "ya29.a");
		assert_eq!(store.len(), 1);
		assert!(store.remove("user@example.com").await.expect("Remove should succeed.").is_some());
		assert!(store.is_empty());
		assert!(store.fetch("other").await.expect("Fetch should succeed.").is_none());
	}
}
