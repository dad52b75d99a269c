pub mod adapters;
pub mod config;
pub mod error;
pub mod fs;
pub mod llm_json;
pub mod sanitizer;
