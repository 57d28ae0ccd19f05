//! Optional observability helpers for broker pipelines.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_broker.pipeline`
//!   with the `pipeline` (operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `session_broker_pipeline_total` counter
//!   for every attempt/success/failure, labeled by `pipeline` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker pipelines observed on both sides of the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
	/// Client request dispatch.
	Dispatch,
	/// Token refresh (client coordination or server rotation).
	Refresh,
	/// Login handling.
	Login,
	/// Registration handling.
	Register,
	/// Logout and logout-all handling.
	Logout,
}
impl PipelineKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PipelineKind::Dispatch => "dispatch",
			PipelineKind::Refresh => "refresh",
			PipelineKind::Login => "login",
			PipelineKind::Register => "register",
			PipelineKind::Logout => "logout",
		}
	}
}
impl Display for PipelineKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl PipelineOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PipelineOutcome::Attempt => "attempt",
			PipelineOutcome::Success => "success",
			PipelineOutcome::Failure => "failure",
		}
	}
}
impl Display for PipelineOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs a pipeline future inside a span, recording attempt and outcome.
pub async fn observe<T, Fut>(kind: PipelineKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = PipelineSpan::new(kind, stage);

	record_pipeline_outcome(kind, PipelineOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_pipeline_outcome(kind, PipelineOutcome::Success),
		Err(_) => record_pipeline_outcome(kind, PipelineOutcome::Failure),
	}

	result
}
