use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvsiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to read prompt file '{path}': {source}")]
    ReadPrompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("No API keys configured. Set CVSIFT_API_KEYS or add api_keys to the config file.")]
    NoApiKeys,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process DOCX: {0}")]
    DocxProcessing(String),

    #[error("OCR is not available: {0}")]
    OcrUnavailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

impl ExtractError {
    /// True when OCR could not run at all (missing pdftoppm/tesseract),
    /// as opposed to OCR running and producing an error.
    pub fn is_ocr_unavailable(&self) -> bool {
        matches!(self, ExtractError::OcrUnavailable(_))
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request timeout after {attempts} attempts. The API may be slow or the resume too large: {detail}")]
    Timeout { attempts: u32, detail: String },

    #[error("Connection error after {attempts} attempts. Check network connectivity: {detail}")]
    Connection { attempts: u32, detail: String },

    #[error("HTTP 429: rate limit still exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("HTTP 401: invalid API key")]
    InvalidApiKey,

    #[error("HTTP 403: API key lacks permission: {0}")]
    Forbidden(String),

    #[error("HTTP 404: API endpoint not found, verify the configured URL")]
    EndpointNotFound,

    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),

    #[error("Failed to decode JSON from model answer: {0}")]
    MalformedAnswer(String),
}

impl LlmError {
    /// Transient errors are worth retrying; persistent ones indicate a
    /// configuration fault and fail fast.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. } | LlmError::Connection { .. } | LlmError::RateLimited { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Input folder '{0}' does not exist")]
    FolderNotFound(PathBuf),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("No resume files found in the folder")]
    NoFilesFound,

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No resumes were successfully parsed")]
    NoRecords,

    #[error("Failed to create output directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read existing report '{path}': {source}")]
    ReadExisting {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Failed to create upload directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to store uploaded file '{name}': {source}")]
    StoreFile {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No valid resume files uploaded. Supported formats: PDF, DOCX, DOC. Rejected: {rejected}")]
    NoAcceptedFiles { rejected: String },
}

pub type Result<T> = std::result::Result<T, CvsiftError>;
