use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::LlmError;
use crate::llm::record::ParsedRecord;

/// Truncation bound for error bodies quoted in messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

/// How a single call attempt went wrong.
enum CallFailure {
    /// Worth another attempt after backoff.
    Timeout(String),
    Connection(String),
    RateLimited,
    /// Configuration fault; retrying cannot help.
    Fatal(LlmError),
}

/// Client for the chat-completion endpoint, bound to one credential.
///
/// Each worker owns its own client so a rate-limited key throttles exactly
/// one worker. Calls block on the worker thread; transient failures retry
/// with exponential backoff, persistent HTTP errors fail fast.
pub struct ExtractionClient {
    http: reqwest::blocking::Client,
    api_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ExtractionClient {
    pub fn new(config: &Config, api_key: String) -> Result<Self, LlmError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        })
    }

    /// Sends the resume text through the model and decodes the answer into
    /// a [`ParsedRecord`].
    pub fn parse_resume(
        &self,
        text: &str,
        filename: &str,
        prompt: &str,
    ) -> Result<ParsedRecord, LlmError> {
        let _span = tracing::info_span!("llm.parse_resume", file = filename).entered();

        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            stream: false,
            temperature: 0.0,
        };

        let attempts = self.max_retries + 1;
        let mut last_failure: Option<CallFailure> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.retry_delay, attempt - 1);
                debug!(
                    "Retrying {} in {:?} (attempt {}/{})",
                    filename, delay, attempt, attempts
                );
                std::thread::sleep(delay);
            }

            match self.attempt(&payload) {
                Ok(content) => {
                    let fields = extract_json_object(&content)?;
                    return Ok(ParsedRecord::from_fields(fields, filename));
                }
                Err(CallFailure::Fatal(e)) => return Err(e),
                Err(transient) => {
                    if let Some(reason) = transient_label(&transient) {
                        warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, filename, reason);
                    }
                    last_failure = Some(transient);
                }
            }
        }

        Err(exhausted_error(last_failure, attempts))
    }

    fn attempt(&self, payload: &ChatRequest<'_>) -> Result<String, CallFailure> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send();

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(CallFailure::Timeout(e.to_string())),
            Err(e) if e.is_connect() => return Err(CallFailure::Connection(e.to_string())),
            Err(e) => return Err(CallFailure::Connection(e.to_string())),
        };

        let status = response.status();
        if status.is_success() {
            let body: ChatResponse = response
                .json()
                .map_err(|e| CallFailure::Fatal(LlmError::InvalidResponse(e.to_string())))?;
            let choice = body.choices.into_iter().next().ok_or_else(|| {
                CallFailure::Fatal(LlmError::InvalidResponse(
                    "response contained no choices".to_string(),
                ))
            })?;
            return Ok(choice.message.content);
        }

        match status.as_u16() {
            429 => Err(CallFailure::RateLimited),
            401 => Err(CallFailure::Fatal(LlmError::InvalidApiKey)),
            403 => {
                let body = truncate_body(&response.text().unwrap_or_default());
                Err(CallFailure::Fatal(LlmError::Forbidden(body)))
            }
            404 => Err(CallFailure::Fatal(LlmError::EndpointNotFound)),
            s => {
                let body = truncate_body(&response.text().unwrap_or_default());
                Err(CallFailure::Fatal(LlmError::Api { status: s, body }))
            }
        }
    }
}

fn transient_label(failure: &CallFailure) -> Option<&'static str> {
    match failure {
        CallFailure::Timeout(_) => Some("timeout"),
        CallFailure::Connection(_) => Some("connection error"),
        CallFailure::RateLimited => Some("rate limited (HTTP 429)"),
        CallFailure::Fatal(_) => None,
    }
}

fn exhausted_error(last: Option<CallFailure>, attempts: u32) -> LlmError {
    match last {
        Some(CallFailure::Timeout(detail)) => LlmError::Timeout { attempts, detail },
        Some(CallFailure::Connection(detail)) => LlmError::Connection { attempts, detail },
        Some(CallFailure::RateLimited) => LlmError::RateLimited { attempts },
        Some(CallFailure::Fatal(e)) => e,
        None => LlmError::InvalidResponse("no attempt was made".to_string()),
    }
}

/// Exponential backoff: `base * 2^(retry - 1)` before the retry-th retry.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base * 2u32.saturating_pow(retry.saturating_sub(1))
}

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Decodes the model's answer content, which is a JSON object possibly
/// wrapped in explanatory prose: try a direct decode first, then the
/// substring between the first `{` and the last `}`.
fn extract_json_object(content: &str) -> Result<Map<String, Value>, LlmError> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content) {
        return Ok(map);
    }

    let start = content.find('{');
    let end = content.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&content[start..=end]) {
                return Ok(map);
            }
        }
    }

    Err(LlmError::MalformedAnswer(format!(
        "no JSON object found in: {}",
        truncate_body(content)
    )))
}
