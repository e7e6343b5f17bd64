// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

#[cfg(feature = "metrics")] const FLOW_TOTAL: &str = "google_api_kit_flow_total";
#[cfg(feature = "metrics")] const FLOW_SECONDS: &str = "google_api_kit_flow_duration_seconds";

/// Counts a flow attempt, success, or failure (no-op without the `metrics` feature).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long one round trip to Google took, labeled by flow and final outcome.
pub fn record_flow_duration(kind: FlowKind, outcome: FlowOutcome, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(FLOW_SECONDS, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.record(elapsed.as_secs_f64());

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome, elapsed);
}
