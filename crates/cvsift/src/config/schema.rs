use serde::{Deserialize, Serialize};

/// System prompt used when no prompt file is configured.
pub const FALLBACK_PROMPT: &str = "\
You are an expert resume parser. Extract the following information from the resume text and return it as a JSON object:
- Name
- Email
- Phone
- Skills
- Experience
- Education
- Summary
- Total_Experience_Years

Return only valid JSON without any additional text or markdown formatting.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Credential pool. One worker is spawned per key, so more keys means
    /// more parallel LLM calls.
    #[serde(default)]
    pub api_keys: Vec<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Additional attempts after the first failed call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound on the worker pool regardless of credential count.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default)]
    pub ocr: OcrConfig,

    /// Path to a file holding the system prompt. When absent the built-in
    /// fallback prompt is used.
    #[serde(default)]
    pub prompt_path: Option<String>,
}

fn default_api_url() -> String {
    "https://api.x.ai/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "grok-4-fast-reasoning".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_max_workers() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: vec![],
            api_url: default_api_url(),
            model: default_model(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_workers: default_max_workers(),
            ocr: OcrConfig::default(),
            prompt_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: 300,
        }
    }
}

/// Resume formats accepted by the pipeline. Anything else is skipped at
/// intake and yields empty text at extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeFormat {
    Pdf,
    Docx,
    /// Legacy binary Word format. Accepted at upload but extraction yields
    /// empty text; users should convert to .docx or .pdf.
    Doc,
}

impl ResumeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            _ => None,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}
