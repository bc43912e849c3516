// self
use crate::obs::{CycleOutcome, RequestPath};

/// Records a renewal cycle outcome via the global metrics recorder (when enabled).
pub fn record_cycle_outcome(outcome: CycleOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_refresh_cycle_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records the interceptor's decision for one request (when enabled).
pub fn record_request_path(path: RequestPath) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_refresh_request_total", "path" => path.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = path;
	}
}
