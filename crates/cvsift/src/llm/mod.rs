//! Chat-completion extraction: wire client and the structured record it
//! returns.

mod client;
mod record;

pub use client::ExtractionClient;
pub use record::{ParsedRecord, CANONICAL_COLUMNS, FIELD_EXPERIENCE_YEARS, FIELD_SOURCE_FILE};
