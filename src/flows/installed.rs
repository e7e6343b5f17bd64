//! Console consent flow for installed (desktop / CLI) applications.

// std
use std::io::{self, BufRead, StdinLock, Stdout, Write};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenGrant},
	config::ClientSecrets,
	error::TransportError,
	flows::session::{self, AuthorizationSession, SessionRequest},
	http::HttpTransport,
	oauth::TokenEndpoint,
	obs::{self, FlowKind, FlowSpan},
};

/// Source of the authorization code typed in by the user.
///
/// Both methods block; the consent flow calls them before its only network round trip.
pub trait CodePrompt {
	/// Shows the consent URL to the user.
	fn present(&mut self, authorize_url: &Url) -> Result<()>;

	/// Reads the authorization code, or the full redirect URL the browser landed on.
	fn read_code(&mut self) -> Result<String>;
}

/// [`CodePrompt`] that prints to a writer and reads one line from a reader.
#[derive(Debug)]
pub struct ConsolePrompt<R, W> {
	input: R,
	output: W,
}
impl ConsolePrompt<StdinLock<'static>, Stdout> {
	/// Prompts on the process's standard input and output.
	pub fn stdio() -> Self {
		Self::new(io::stdin().lock(), io::stdout())
	}
}
impl<R, W> ConsolePrompt<R, W>
where
	R: BufRead,
	W: Write,
{
	/// Wraps arbitrary input and output streams.
	pub fn new(input: R, output: W) -> Self {
		Self { input, output }
	}

	/// Returns the output stream, e.g. to inspect what was printed.
	pub fn into_output(self) -> W {
		self.output
	}
}
impl<R, W> CodePrompt for ConsolePrompt<R, W>
where
	R: BufRead,
	W: Write,
{
	fn present(&mut self, authorize_url: &Url) -> Result<()> {
		writeln!(self.output, "Open the following URL in your browser and grant access:")
			.and_then(|_| writeln!(self.output))
			.and_then(|_| writeln!(self.output, "    {authorize_url}"))
			.and_then(|_| writeln!(self.output))
			.and_then(|_| write!(self.output, "Enter the authorization code: "))
			.and_then(|_| self.output.flush())
			.map_err(|e| TransportError::Io(e).into())
	}

	fn read_code(&mut self) -> Result<String> {
		let mut line = String::new();

		self.input.read_line(&mut line).map_err(TransportError::Io)?;

		Ok(line.trim().to_owned())
	}
}

/// Installed-application consent flow.
///
/// The flow prints a consent URL, waits for the user to paste back the authorization code, and
/// redeems it with a single token endpoint call. Google only issues a refresh token on consent,
/// so `access_type=offline` and `prompt=consent` are sent unless disabled.
#[derive(Clone, Debug)]
pub struct InstalledFlow {
	secrets: ClientSecrets,
	scope: ScopeSet,
	transport: HttpTransport,
	force_consent: bool,
	login_hint: Option<String>,
}
impl InstalledFlow {
	/// Creates a flow for the provided client, scopes, and transport.
	pub fn new(secrets: ClientSecrets, scope: ScopeSet, transport: HttpTransport) -> Self {
		Self { secrets, scope, transport, force_consent: true, login_hint: None }
	}

	/// Creates a flow with a transport built from the descriptor's timeouts.
	pub fn from_secrets(secrets: ClientSecrets, scope: ScopeSet) -> Result<Self> {
		let transport = HttpTransport::from_timeouts(&secrets.timeouts)?;

		Ok(Self::new(secrets, scope, transport))
	}

	/// Stops sending `prompt=consent`; Google then skips the consent screen for returning users
	/// and may omit the refresh token.
	pub fn without_consent_prompt(mut self) -> Self {
		self.force_consent = false;

		self
	}

	/// Pre-selects the Google account on the consent screen.
	pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
		self.login_hint = Some(hint.into());

		self
	}

	/// Scopes requested by the flow.
	pub fn scope(&self) -> &ScopeSet {
		&self.scope
	}

	/// Creates a fresh consent session (state + PKCE pair + URL).
	pub fn start(&self) -> Result<AuthorizationSession> {
		let redirect_uri = self.secrets.primary_redirect()?;

		Ok(session::build_session(SessionRequest {
			authorization_endpoint: &self.secrets.endpoints.authorization,
			client_id: &self.secrets.client_id,
			redirect_uri,
			scope: self.scope.clone(),
			offline: true,
			force_consent: self.force_consent,
			login_hint: self.login_hint.as_deref(),
		}))
	}

	/// Redeems what the user typed (a bare code or the redirect URL) for tokens.
	pub async fn exchange(&self, session: &AuthorizationSession, input: &str) -> Result<TokenGrant> {
		obs::observe(FlowKind::AuthorizationCode, "exchange", async move {
			let code = extract_code(session, input)?;
			let endpoint = TokenEndpoint::new(
				&self.secrets.client_id,
				self.secrets.client_secret.as_deref(),
				&self.secrets.endpoints,
				self.transport.clone(),
			)?;

			endpoint.exchange_code(&code, session.pkce_verifier(), &session.redirect_uri).await
		})
		.await
	}

	/// Runs the whole consent flow through `prompt` and returns the raw token response.
	pub async fn authorize<P>(&self, prompt: &mut P) -> Result<TokenGrant>
	where
		P: ?Sized + CodePrompt,
	{
		let session = self.start()?;
		let input = {
			let _guard = FlowSpan::new(FlowKind::AuthorizationCode, "prompt").entered();

			prompt.present(&session.authorize_url)?;
			prompt.read_code()?
		};

		tracing::debug!(scope = %self.scope, "Authorization code received.");

		self.exchange(&session, &input).await
	}
}

fn extract_code(session: &AuthorizationSession, input: &str) -> Result<String> {
	let input = input.trim();

	if input.is_empty() {
		return Err(Error::InvalidGrant { reason: "No authorization code was entered".into() });
	}

	let Ok(url) = Url::parse(input) else {
		return Ok(input.to_owned());
	};
	let query = url.query_pairs().into_owned().collect::<HashMap<_, _>>();

	if let Some(error) = query.get("error") {
		return Err(Error::InvalidGrant { reason: format!("Consent was not granted: {error}") });
	}

	let code = query.get("code").filter(|code| !code.is_empty()).ok_or_else(|| {
		Error::InvalidGrant { reason: "Redirect URL does not carry an authorization code".into() }
	})?;

	session.validate_state(query.get("state").map(String::as_str).unwrap_or_default())?;

	Ok(code.to_owned())
}

#[cfg(test)]
mod tests {
	// std
	use std::io::Cursor;
	// self
	use super::*;
	use crate::{_preludet::*, error::ConfigError};

	fn flow() -> InstalledFlow {
		InstalledFlow::new(
			test_secrets("https://accounts.example.com", "client-id", "client-secret"),
			test_scope(["https://www.googleapis.com/auth/drive.file"]),
			HttpTransport::default(),
		)
	}

	#[test]
	fn bare_codes_pass_through_trimmed() {
		let session = flow().start().expect("Session should build.");

		assert_eq!(
			extract_code(&session, "  4/0AbCdEf  \n").expect("Bare code should be accepted."),
			"4/0AbCdEf"
		);
	}

	#[test]
	fn redirect_urls_are_parsed_and_state_checked() {
		let session = flow().start().expect("Session should build.");
		let pasted =
			format!("http://127.0.0.1:8085/callback?state={}&code=4%2F0Xyz&scope=x", session.state);

		assert_eq!(extract_code(&session, &pasted).expect("Redirect URL should parse."), "4/0Xyz");

		let forged = "http://127.0.0.1:8085/callback?state=forged&code=abc";

		assert!(matches!(extract_code(&session, forged), Err(Error::InvalidGrant { .. })));

		let denied = "http://127.0.0.1:8085/callback?error=access_denied";

		assert!(matches!(
			extract_code(&session, denied),
			Err(Error::InvalidGrant { reason }) if reason.contains("access_denied")
		));
	}

	#[test]
	fn empty_input_is_rejected() {
		let session = flow().start().expect("Session should build.");

		assert!(matches!(extract_code(&session, " \n"), Err(Error::InvalidGrant { .. })));
	}

	#[test]
	fn console_prompt_prints_url_and_reads_line() {
		let mut prompt = ConsolePrompt::new(Cursor::new("code-123\n"), Vec::new());
		let url = Url::parse("https://accounts.google.com/o/oauth2/auth?client_id=x")
			.expect("URL fixture should parse.");

		prompt.present(&url).expect("Presenting to a Vec should succeed.");

		assert_eq!(prompt.read_code().expect("Reading from a cursor should succeed."), "code-123");

		let printed = String::from_utf8(prompt.into_output()).expect("Output should be UTF-8.");

		assert!(printed.contains(url.as_str()));
	}

	#[test]
	fn missing_redirect_uri_is_a_config_error() {
		let mut secrets = test_secrets("https://accounts.example.com", "id", "secret");

		secrets.redirect_uris.clear();

		let flow = InstalledFlow::new(secrets, ScopeSet::default(), HttpTransport::default());

		assert!(matches!(flow.start(), Err(Error::Config(ConfigError::MissingRedirectUri))));
	}
}
