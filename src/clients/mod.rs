pub mod batch_api;
pub mod openai_client;

pub use batch_api::BatchApi;
pub use openai_client::OpenAiBatchClient;
