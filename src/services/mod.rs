pub mod request_builder;
pub mod request_index;
pub mod result_parser;

pub use request_builder::{JobShard, RequestGroup, RequestSettings};
pub use request_index::RequestIndex;
pub use result_parser::{ParsedJob, RecordKey};
