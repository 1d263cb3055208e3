pub mod check;
pub mod create;
pub mod queue;
pub mod submit;
pub mod worker_pool;

pub use check::{check_concurrent, check_single, CheckSummary};
pub use create::{create_concurrent, create_single};
pub use queue::{show_queue, QueueSummary};
pub use submit::{submit_concurrent, submit_single, SubmitSummary};
