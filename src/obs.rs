//! Optional observability helpers for session flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_broker.flow` with the `flow` and
//!   `stage` (call site) fields, plus debug/info/warn events for renewal, queueing, and
//!   teardown. Secrets never reach an event.
//! - Enable `metrics` to increment the `session_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

pub(crate) use tracing::trace_event;

// self
use crate::_prelude::*;

/// Session flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authenticated call with replay-once recovery.
	Execute,
	/// Renewal of the access credential.
	Renewal,
	/// Login with subject credentials.
	Login,
	/// Best-effort logout.
	Logout,
	/// Session restoration at startup.
	Restore,
	/// Registration, password reset, email confirmation, and profile updates.
	Account,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Execute => "execute",
			FlowKind::Renewal => "renewal",
			FlowKind::Login => "login",
			FlowKind::Logout => "logout",
			FlowKind::Restore => "restore",
			FlowKind::Account => "account",
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
	/// Entry to a flow.
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
