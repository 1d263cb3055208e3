pub mod json_file;
pub mod logging;

pub use logging::truncate_text;
