//! Response classification and the replay-once policy for expired credentials.
//!
//! A logical call carries an explicit [`Attempt`] value instead of a mutable "retried" flag.
//! [`RetryPolicy::evaluate`] looks only at the outcome and that attempt, so the decision is
//! the same no matter how many tasks observe the expiry concurrently.

// self
use crate::{_prelude::*, http::ApiResponse};

/// HTTP status recognised as an expired or invalid access credential.
pub const AUTH_EXPIRED_STATUS: u16 = 401;

/// Coarse classification of an HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseClass {
	/// 2xx.
	Success,
	/// The access credential was rejected; eligible for one renewal + replay.
	AuthExpired,
	/// Any other non-success status; passed through untouched.
	Rejected,
}

/// Classifies a status code.
pub fn classify_status(status: u16) -> ResponseClass {
	match status {
		200..=299 => ResponseClass::Success,
		AUTH_EXPIRED_STATUS => ResponseClass::AuthExpired,
		_ => ResponseClass::Rejected,
	}
}

/// Ordinal of a dispatch attempt within one logical call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);
impl Attempt {
	/// The original dispatch.
	pub const FIRST: Self = Self(0);

	/// Returns the attempt that follows this one.
	pub const fn next(self) -> Self {
		Self(self.0.saturating_add(1))
	}

	/// Number of replays this attempt represents (0 for the original dispatch).
	pub const fn replays(self) -> u8 {
		self.0
	}

	/// Returns `true` if this attempt is a replay.
	pub const fn is_replay(self) -> bool {
		self.0 > 0
	}
}

/// What the caller should do with a dispatch outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
	/// Return the outcome to the caller unchanged.
	Surface,
	/// Obtain a valid credential from the coordinator and replay the call.
	Renew,
}

/// Replay-once policy applied to every dispatched call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryPolicy;
impl RetryPolicy {
	/// Replays permitted per logical call.
	pub const MAX_REPLAYS: u8 = 1;

	/// Decides whether `outcome`, observed on `attempt`, warrants renewal and replay.
	pub fn evaluate(&self, outcome: &Result<ApiResponse>, attempt: Attempt) -> Verdict {
		match outcome {
			Err(Error::AuthExpired { .. }) if attempt.replays() < Self::MAX_REPLAYS =>
				Verdict::Renew,
			_ => Verdict::Surface,
		}
	}
}
