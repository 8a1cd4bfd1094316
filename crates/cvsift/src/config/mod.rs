pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_env, load_config_from_str, load_prompt};
pub use schema::{Config, OcrConfig, ResumeFormat, FALLBACK_PROMPT};
