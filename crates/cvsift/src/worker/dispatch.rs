use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::config::{Config, ResumeFormat};
use crate::error::{ConfigError, CvsiftError, WorkerError};
use crate::extract::TextExtractor;
use crate::llm::{ExtractionClient, ParsedRecord};
use crate::worker::status::{StatusEvent, StatusSink};

/// Extracted text shorter than this never reaches the model.
const MIN_PARSE_TEXT_CHARS: usize = 10;

/// Non-empty extractions under this length get an OCR improvement pass;
/// the longer of the two texts wins.
const OCR_IMPROVEMENT_THRESHOLD: usize = 50;

/// Everything a batch run produced, with records in submission order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<ParsedRecord>,
    pub succeeded: usize,
    pub failed: usize,
}

struct WorkItem {
    index: usize,
    total: usize,
    path: PathBuf,
    filename: String,
}

enum FileResult {
    Parsed(usize, Box<ParsedRecord>),
    Failed,
}

/// One worker thread per API credential, up to `max_workers`, pulling
/// files from a shared queue. A rate-limited credential only stalls the
/// worker holding it.
pub struct WorkDispatcher {
    config: Arc<Config>,
    prompt: Arc<str>,
}

impl WorkDispatcher {
    pub fn new(config: Arc<Config>, prompt: String) -> Self {
        Self {
            config,
            prompt: prompt.into(),
        }
    }

    /// Processes `files`, emitting progress through `sink`. Per-file
    /// failures are reported and counted; only setup faults (no
    /// credentials, HTTP client construction) abort the batch.
    pub fn run(
        &self,
        files: Vec<PathBuf>,
        sink: Arc<dyn StatusSink>,
    ) -> Result<BatchOutcome, CvsiftError> {
        if files.is_empty() {
            return Err(WorkerError::NoFilesFound.into());
        }
        if self.config.api_keys.is_empty() {
            return Err(ConfigError::NoApiKeys.into());
        }

        let worker_count = effective_worker_count(
            self.config.api_keys.len(),
            files.len(),
            self.config.max_workers,
        );

        // Build all clients up front so a bad client config fails the
        // batch before any file is touched.
        let mut clients = Vec::with_capacity(worker_count);
        for key in self.config.api_keys.iter().take(worker_count) {
            clients.push(ExtractionClient::new(&self.config, key.clone())?);
        }

        let total = files.len();
        sink.emit(StatusEvent::BatchStarted {
            total_files: total,
            workers: worker_count,
        });
        info!("Dispatching {} resumes across {} workers", total, worker_count);

        let extractor = Arc::new(TextExtractor::new(&self.config.ocr));

        let (work_tx, work_rx) = unbounded::<WorkItem>();
        let (result_tx, result_rx) = unbounded::<FileResult>();

        for (index, path) in files.into_iter().enumerate() {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());
            work_tx
                .send(WorkItem {
                    index,
                    total,
                    path,
                    filename,
                })
                .map_err(|_| WorkerError::ChannelClosed)?;
        }
        drop(work_tx);

        let mut results: Vec<FileResult> = if worker_count == 1 {
            // Single credential: process sequentially on this thread, no pool
            let Some(client) = clients.pop() else {
                return Err(ConfigError::NoApiKeys.into());
            };
            drop(result_tx);
            let mut results = Vec::with_capacity(total);
            for item in work_rx.iter() {
                results.push(process_file(&client, &extractor, &self.prompt, &sink, &item));
            }
            results
        } else {
            let mut handles = Vec::with_capacity(worker_count);
            for (worker_id, client) in clients.into_iter().enumerate() {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let extractor = Arc::clone(&extractor);
                let prompt = Arc::clone(&self.prompt);
                let sink = Arc::clone(&sink);

                handles.push(thread::spawn(move || {
                    run_worker(worker_id, client, extractor, prompt, work_rx, result_tx, sink);
                }));
            }
            drop(result_tx);

            let results = result_rx.iter().collect();

            for (i, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    error!("Worker {} panicked", i);
                }
            }
            results
        };

        results.sort_by_key(|r| match r {
            FileResult::Parsed(index, _) => *index,
            FileResult::Failed => usize::MAX,
        });

        let mut records = Vec::new();
        let mut failed = 0usize;
        for result in results {
            match result {
                FileResult::Parsed(_, record) => records.push(*record),
                FileResult::Failed => failed += 1,
            }
        }
        let succeeded = records.len();

        sink.emit(StatusEvent::BatchCompleted { succeeded, failed });
        info!("Batch finished: {} parsed, {} failed", succeeded, failed);

        Ok(BatchOutcome {
            records,
            succeeded,
            failed,
        })
    }
}

/// One worker per credential, never more workers than files or the
/// configured ceiling, always at least one.
pub fn effective_worker_count(credentials: usize, files: usize, max_workers: usize) -> usize {
    credentials.min(files).min(max_workers).max(1)
}

fn run_worker(
    worker_id: usize,
    client: ExtractionClient,
    extractor: Arc<TextExtractor>,
    prompt: Arc<str>,
    work_rx: Receiver<WorkItem>,
    result_tx: Sender<FileResult>,
    sink: Arc<dyn StatusSink>,
) {
    debug!("Worker {} started", worker_id);

    for item in work_rx.iter() {
        let result = process_file(&client, &extractor, &prompt, &sink, &item);
        if result_tx.send(result).is_err() {
            error!("Worker {} failed to send result", worker_id);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn process_file(
    client: &ExtractionClient,
    extractor: &TextExtractor,
    prompt: &str,
    sink: &Arc<dyn StatusSink>,
    item: &WorkItem,
) -> FileResult {
    sink.emit(StatusEvent::FileStarted {
        file: item.filename.clone(),
        index: item.index + 1,
        total: item.total,
    });

    let mut text = match extractor.extract(&item.path) {
        Ok(text) => text,
        Err(e) if e.is_ocr_unavailable() => {
            sink.emit(StatusEvent::FileSkipped {
                file: item.filename.clone(),
                reason: e.to_string(),
            });
            return FileResult::Failed;
        }
        Err(e) => {
            sink.emit(StatusEvent::FileFailed {
                file: item.filename.clone(),
                reason: e.to_string(),
            });
            return FileResult::Failed;
        }
    };

    if ResumeFormat::from_path(&item.path) == Some(ResumeFormat::Pdf) {
        if let Some(ocr) = extractor.ocr_engine() {
            let trimmed = text.trim().len();
            if trimmed == 0 {
                // Image-only PDF: OCR is the only shot at text
                match ocr.ocr_pdf(&item.path) {
                    Ok(ocr_text) if ocr_text.trim().len() > MIN_PARSE_TEXT_CHARS => text = ocr_text,
                    Ok(_) => {}
                    Err(e) if e.is_ocr_unavailable() => {
                        sink.emit(StatusEvent::FileSkipped {
                            file: item.filename.clone(),
                            reason: e.to_string(),
                        });
                        return FileResult::Failed;
                    }
                    Err(e) => {
                        debug!("OCR failed for {}: {}", item.filename, e);
                    }
                }
            } else if trimmed < OCR_IMPROVEMENT_THRESHOLD {
                // Thin text layer: keep whichever text is longer
                if let Ok(ocr_text) = ocr.ocr_pdf(&item.path) {
                    if ocr_text.trim().len() > trimmed {
                        text = ocr_text;
                    }
                }
            }
        }
    }

    if text.trim().chars().count() < MIN_PARSE_TEXT_CHARS {
        sink.emit(StatusEvent::FileSkipped {
            file: item.filename.clone(),
            reason: "no readable text extracted".to_string(),
        });
        return FileResult::Failed;
    }

    match client.parse_resume(&text, &item.filename, prompt) {
        Ok(record) => {
            sink.emit(StatusEvent::FileSucceeded {
                file: item.filename.clone(),
            });
            FileResult::Parsed(item.index, Box::new(record))
        }
        Err(e) => {
            sink.emit(StatusEvent::FileFailed {
                file: item.filename.clone(),
                reason: e.to_string(),
            });
            FileResult::Failed
        }
    }
}
