//! Optional observability helpers for renewal cycles and intercepted requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_refresh.cycle` with a `stage` field,
//!   plus debug/warn events for retries, queueing, timeouts, and terminal failures.
//! - Enable `metrics` to increment `bearer_refresh_cycle_total` (labeled by `outcome`) and
//!   `bearer_refresh_request_total` (labeled by `path`).

mod counter;
mod span;

pub use counter::*;
pub use span::*;

pub(crate) use span::log_event;

// self
use crate::_prelude::*;

/// Outcome labels recorded for renewal cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CycleOutcome {
	/// A renewal call is about to be issued.
	Attempt,
	/// An attempt failed and another one is scheduled.
	Retry,
	/// The cycle stored a new access token.
	Success,
	/// The cycle failed terminally and purged the credentials.
	Failure,
	/// The leader was dropped before completing the cycle.
	Abandoned,
}
impl CycleOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CycleOutcome::Attempt => "attempt",
			CycleOutcome::Retry => "retry",
			CycleOutcome::Success => "success",
			CycleOutcome::Failure => "failure",
			CycleOutcome::Abandoned => "abandoned",
		}
	}
}
impl Display for CycleOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Decision taken by the interceptor for a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestPath {
	/// The bypass predicate opted the request out.
	Bypass,
	/// The stored access token was attached directly.
	Attached,
	/// Neither credential was stored; the request went out unchanged.
	Missing,
	/// The request led a renewal cycle.
	Leader,
	/// The request waited on another request's renewal cycle.
	Follower,
}
impl RequestPath {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestPath::Bypass => "bypass",
			RequestPath::Attached => "attached",
			RequestPath::Missing => "missing",
			RequestPath::Leader => "leader",
			RequestPath::Follower => "follower",
		}
	}
}
impl Display for RequestPath {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
