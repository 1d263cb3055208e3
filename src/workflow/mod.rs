pub mod job_ctx;
pub mod job_flow;
pub mod poll_state;

pub use job_ctx::JobCtx;
pub use job_flow::JobFlow;
pub use poll_state::{FailurePolicy, FinishReason, JobRecord, NextAction, PollSettings, PollTracker};
