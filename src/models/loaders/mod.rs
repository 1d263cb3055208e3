pub mod prompt_loader;
pub mod url_loader;

pub use prompt_loader::load_prompt;
pub use url_loader::load_urls;
