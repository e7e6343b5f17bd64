//! Observability helpers shared by flows and credentials.
//!
//! Every token acquisition runs inside a `google_api_kit.flow` span carrying the `flow` and
//! `stage` fields. With the `metrics` feature enabled, each attempt, success, and failure also
//! increments the `google_api_kit_flow_total` counter labeled by `flow` + `outcome`, and the
//! round trip lands in the `google_api_kit_flow_duration_seconds` histogram.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Token acquisition paths observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Installed-app consent flow and code exchange.
	AuthorizationCode,
	/// Refresh-token grant for user credentials.
	Refresh,
	/// JWT-bearer grant signed with a service account key.
	ServiceAccount,
	/// Token fetched from the Compute Engine metadata server.
	Metadata,
	/// Token revocation.
	Revocation,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::ServiceAccount => "service_account",
			FlowKind::Metadata => "metadata",
			FlowKind::Revocation => "revocation",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a token acquisition helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span, recording attempt and final outcome.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let started = Instant::now();
	let result = span.instrument(fut).await;
	let outcome = match &result {
		Ok(_) => FlowOutcome::Success,
		Err(e) => {
			::tracing::warn!(flow = kind.as_str(), stage, error = %e, "Token flow failed.");

			FlowOutcome::Failure
		},
	};

	record_flow_outcome(kind, outcome);
	record_flow_duration(kind, outcome, started.elapsed());

	result
}
