pub mod batch;
pub mod config;
pub mod error;
pub mod experience;
pub mod extract;
pub mod intake;
pub mod llm;
pub mod logging;
pub mod progress;
pub mod report;
pub mod worker;

pub use batch::{list_resume_files, submit_batch, BatchHandle, BatchRequest};
pub use config::{load_config, load_prompt, Config, OcrConfig, ResumeFormat};
pub use error::{
    ConfigError, CvsiftError, ExtractError, IntakeError, LlmError, ReportError, Result,
    WorkerError,
};
pub use extract::TextExtractor;
pub use intake::{store_uploads, UploadOutcome};
pub use llm::{ExtractionClient, ParsedRecord};
pub use progress::{BatchJob, FileStatus, JobRegistry, JobStatus};
pub use report::write_report;
pub use worker::{BatchOutcome, StatusEvent, StatusSink, WorkDispatcher};
