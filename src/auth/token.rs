//! The authorization map stored alongside a client configuration and the raw token response
//! Google returns from its token endpoint.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
};

/// Token type Google issues for every grant this crate performs.
pub const BEARER: &str = "Bearer";

/// Freshness of an [`Authorization`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// No access token is cached; only a refresh is possible.
	Missing,
	/// Access token is usable and outside the refresh window.
	Active,
	/// Access token expires within the refresh window.
	Expiring,
	/// Access token has expired.
	Expired,
}

/// Access/refresh token pair plus the metadata needed to use and renew it.
///
/// This is the shape persisted in configuration files and token stores:
///
/// ```json
/// {
///   "access_token": "ya29.a0…",
///   "refresh_token": "1//0g…",
///   "token_type": "Bearer",
///   "expires_at": "2025-01-01T01:00:00Z",
///   "scope": "https://www.googleapis.com/auth/calendar"
/// }
/// ```
///
/// `access_token` may be empty when only a refresh token was stored, and `expires_at` may be
/// absent when the expiry is unknown; such tokens are used until Google rejects them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
	/// Access token; empty when only a refresh token is known.
	#[serde(default = "empty_secret")]
	pub access_token: TokenSecret,
	/// Refresh token, if the grant issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type used in the `Authorization` header.
	#[serde(default = "default_token_type")]
	pub token_type: String,
	/// Expiry instant of the access token.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<OffsetDateTime>,
	/// Scopes granted to the access token.
	#[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
	pub scope: ScopeSet,
}
impl Authorization {
	/// Creates an authorization holding only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			token_type: default_token_type(),
			expires_at: None,
			scope: ScopeSet::default(),
		}
	}

	/// Creates an authorization holding only a refresh token.
	pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
		Self::new(String::new()).with_refresh_token(refresh_token)
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the token type.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = token_type.into();

		self
	}

	/// Sets an absolute expiry instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the granted scopes.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Computes the freshness at `instant`, treating tokens that expire within `window` as
	/// [`TokenStatus::Expiring`].
	pub fn status_at(&self, instant: OffsetDateTime, window: Duration) -> TokenStatus {
		if self.access_token.is_empty() {
			return TokenStatus::Missing;
		}

		match self.expires_at {
			None => TokenStatus::Active,
			Some(expires_at) if instant >= expires_at => TokenStatus::Expired,
			Some(expires_at) if expires_at - instant <= window => TokenStatus::Expiring,
			Some(_) => TokenStatus::Active,
		}
	}

	/// Returns true when the access token must be renewed before use.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, window: Duration) -> bool {
		!matches!(self.status_at(instant, window), TokenStatus::Active)
	}

	/// Returns true if a refresh token is available.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|token| !token.is_empty())
	}

	/// Renders the `Authorization` header value (`Bearer ya29…`).
	pub fn header_value(&self) -> String {
		format!("{} {}", self.token_type, self.access_token.expose())
	}
}
impl Debug for Authorization {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authorization")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("token_type", &self.token_type)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Raw token endpoint response, before it is stamped into an [`Authorization`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Refresh token; Google only sends one on the first consent or with `prompt=consent`.
	pub refresh_token: Option<TokenSecret>,
	/// Token type (`Bearer`).
	pub token_type: String,
	/// Relative lifetime of the access token.
	pub expires_in: Option<Duration>,
	/// Scopes Google reports as granted, when it reports them.
	pub scope: Option<ScopeSet>,
}
impl TokenGrant {
	/// Converts the grant into an [`Authorization`] issued at `issued_at`.
	///
	/// `requested` fills in the scope when Google omits it, and `previous_refresh` is kept when
	/// a refresh response does not rotate the refresh token. A lifetime that overflows the
	/// calendar is rejected as [`ConfigError::InvalidExpiresIn`].
	pub fn into_authorization(
		self,
		issued_at: OffsetDateTime,
		requested: &ScopeSet,
		previous_refresh: Option<&TokenSecret>,
	) -> Result<Authorization> {
		let expires_at = self
			.expires_in
			.map(|lifetime| issued_at.checked_add(lifetime).ok_or(ConfigError::InvalidExpiresIn))
			.transpose()?;

		Ok(Authorization {
			access_token: self.access_token,
			refresh_token: self.refresh_token.or_else(|| previous_refresh.cloned()),
			token_type: self.token_type,
			expires_at,
			scope: self.scope.unwrap_or_else(|| requested.clone()),
		})
	}
}

fn empty_secret() -> TokenSecret {
	TokenSecret::new(String::new())
}

fn default_token_type() -> String {
	BEARER.into()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const WINDOW: Duration = Duration::seconds(60);

	#[test]
	fn status_covers_every_state() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = Authorization::new("access").with_expires_at(issued + Duration::hours(1));

		assert_eq!(token.status_at(issued, WINDOW), TokenStatus::Active);
		assert_eq!(
			token.status_at(macros::datetime!(2025-01-01 00:59:30 UTC), WINDOW),
			TokenStatus::Expiring
		);
		assert_eq!(
			token.status_at(macros::datetime!(2025-01-01 01:00 UTC), WINDOW),
			TokenStatus::Expired
		);
		assert_eq!(
			Authorization::from_refresh_token("refresh").status_at(issued, WINDOW),
			TokenStatus::Missing
		);
		assert_eq!(Authorization::new("no-expiry").status_at(issued, WINDOW), TokenStatus::Active);
	}

	#[test]
	fn stored_map_deserializes_with_defaults() {
		let json = r#"{"access_token":"ya29.access","refresh_token":"1//refresh"}"#;
		let token: Authorization =
			serde_json::from_str(json).expect("Minimal authorization map should deserialize.");

		assert_eq!(token.access_token.expose(), "ya29.access");
		assert!(token.can_refresh());
		assert_eq!(token.token_type, BEARER);
		assert!(token.expires_at.is_none());
		assert!(token.scope.is_empty());
		assert_eq!(token.header_value(), "Bearer ya29.access");
	}

	#[test]
	fn serialized_map_round_trips_expiry() {
		let token = Authorization::new("a")
			.with_refresh_token("r")
			.with_expires_at(macros::datetime!(2025-01-01 01:00 UTC));
		let json = serde_json::to_string(&token).expect("Authorization should serialize.");

		assert!(json.contains("\"expires_at\":\"2025-01-01T01:00:00Z\""));

		let back: Authorization =
			serde_json::from_str(&json).expect("Serialized authorization should parse back.");

		assert_eq!(back, token);
	}

	#[test]
	fn grant_keeps_previous_refresh_when_not_rotated() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let requested = ScopeSet::new(["email"]).expect("Scope fixture should be valid.");
		let grant = TokenGrant {
			access_token: TokenSecret::new("fresh"),
			refresh_token: None,
			token_type: BEARER.into(),
			expires_in: Some(Duration::seconds(3599)),
			scope: None,
		};
		let previous = TokenSecret::new("old-refresh");
		let token = grant
			.into_authorization(issued, &requested, Some(&previous))
			.expect("Grant should convert.");

		assert_eq!(token.refresh_token, Some(previous));
		assert_eq!(token.expires_at, Some(macros::datetime!(2025-01-01 00:59:59 UTC)));
		assert_eq!(token.scope, requested);
	}

	#[test]
	fn overflowing_lifetimes_are_rejected() {
		let grant = TokenGrant {
			access_token: TokenSecret::new("a"),
			refresh_token: None,
			token_type: BEARER.into(),
			expires_in: Some(Duration::seconds(1_000_000_000_000)),
			scope: None,
		};

		assert!(matches!(
			grant.into_authorization(OffsetDateTime::now_utc(), &ScopeSet::default(), None),
			Err(Error::Config(ConfigError::InvalidExpiresIn))
		));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let rendered = format!("{:?}", Authorization::new("ya29.secret").with_refresh_token("1//x"));

		assert!(!rendered.contains("ya29.secret"));
		assert!(!rendered.contains("1//x"));
	}
}
