pub mod job;
pub mod loaders;
pub mod manifest;
pub mod request;
pub mod result;

pub use job::{
    BatchSnapshot, JobIds, JobStatus, RemoteBatchStatus, RequestCounts, SubmissionRecord,
    SubmissionStatus,
};
pub use loaders::{load_prompt, load_urls};
pub use manifest::{Manifest, ManifestEntry};
pub use request::{BatchRequestLine, ChatMessage, ChatRequestBody, ContentPart, BATCH_ENDPOINT};
pub use result::{BatchOutputLine, ParsedResponse, ResultRecord};
