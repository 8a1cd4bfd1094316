use std::fmt;
use std::sync::Mutex;

/// Progress events emitted while a batch runs.
///
/// Consumers match on the variants; the [`Display`] impl renders the
/// human-readable log line for each event, which is also what ends up in
/// the job's `message` field.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    BatchStarted {
        total_files: usize,
        workers: usize,
    },
    FileStarted {
        file: String,
        index: usize,
        total: usize,
    },
    FileSucceeded {
        file: String,
    },
    FileFailed {
        file: String,
        reason: String,
    },
    /// The file produced no usable text, so it never reached the model.
    FileSkipped {
        file: String,
        reason: String,
    },
    BatchCompleted {
        succeeded: usize,
        failed: usize,
    },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::BatchStarted {
                total_files,
                workers,
            } => write!(f, "Processing {} resumes with {} workers", total_files, workers),
            StatusEvent::FileStarted { file, index, total } => {
                write!(f, "Processing: {} ({}/{})", file, index, total)
            }
            StatusEvent::FileSucceeded { file } => write!(f, "[SUCCESS] Parsed {}", file),
            StatusEvent::FileFailed { file, reason } => {
                write!(f, "[ERROR] Failed to process {}: {}", file, reason)
            }
            StatusEvent::FileSkipped { file, reason } => {
                write!(f, "[WARNING] Skipped {}: {}", file, reason)
            }
            StatusEvent::BatchCompleted { succeeded, failed } => {
                write!(f, "Completed: {} parsed, {} failed", succeeded, failed)
            }
        }
    }
}

/// Receives status events from the dispatcher and its workers.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// No-op sink for unit tests and fire-and-forget runs.
pub struct NoopSink;

impl StatusSink for NoopSink {
    fn emit(&self, _event: StatusEvent) {}
}

/// Buffers every event it sees. Useful in tests and for callers that want
/// a transcript of the run.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl StatusSink for CollectingSink {
    fn emit(&self, event: StatusEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
