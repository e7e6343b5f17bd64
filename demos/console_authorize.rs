//! Runs the installed-app consent flow on the terminal, saves the resulting tokens, and lists the
//! user's calendars with them.
//!
//! ```sh
//! cargo run --example console_authorize -- client_secret.json tokens.json
//! ```

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use time::OffsetDateTime;
// self
use google_api_kit::{
	auth::{Authorization, ScopeSet},
	config::ClientSecrets,
	credential::Credential,
	flows::{ConsolePrompt, InstalledFlow},
	service::{ApiClient, CALENDAR_READONLY_SCOPE, CalendarService},
	store::{FileStore, TokenStore},
};

const ACCOUNT: &str = "default";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let mut args = env::args().skip(1);
	let secrets_path = args
		.next()
		.ok_or_else(|| eyre!("usage: console_authorize <client_secret.json> [tokens.json]"))?;
	let store_path = args.next().unwrap_or_else(|| "tokens.json".into());
	let secrets = ClientSecrets::from_path(&secrets_path)?;
	let scope = ScopeSet::new([CALENDAR_READONLY_SCOPE])?;
	let store = Arc::new(FileStore::open(&store_path)?);
	let authorization = match store.fetch(ACCOUNT).await? {
		Some(stored) => {
			println!("Reusing tokens from {store_path}.");

			stored
		},
		None => {
			let flow = InstalledFlow::from_secrets(secrets.clone(), scope.clone())?;
			let grant = flow.authorize(&mut ConsolePrompt::stdio()).await?;
			let authorization =
				grant.into_authorization(OffsetDateTime::now_utc(), &scope, None)?;

			store.save(ACCOUNT, authorization.clone()).await?;

			authorization
		},
	};
	let credential = Credential::from_authorization(&secrets, authorization)?
		.with_token_store(store, ACCOUNT);
	let calendars = CalendarService::new(ApiClient::new(credential.clone()))?;

	for entry in calendars.list_calendars().await? {
		let marker = if entry.primary { "*" } else { " " };

		println!("{marker} {} ({})", entry.summary.as_deref().unwrap_or("untitled"), entry.id);
	}

	if let Some(Authorization { expires_at: Some(at), .. }) = credential.cached_authorization() {
		println!("Access token valid until {at}.");
	}

	Ok(())
}
