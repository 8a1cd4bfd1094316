//! Batch submission: ties the dispatcher, registry and report together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{error, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{Config, ResumeFormat};
use crate::error::{ConfigError, CvsiftError, WorkerError};
use crate::progress::JobRegistry;
use crate::report;
use crate::worker::{StatusEvent, StatusSink, WorkDispatcher};

/// A request to process every resume in a folder into one report.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    /// Append rows to an existing report instead of replacing it.
    pub append: bool,
    /// Caller-chosen job ID; a fresh UUID when absent.
    pub job_id: Option<String>,
}

/// Handle to a running batch. The job is tracked in the registry under
/// `job_id`; `wait` blocks until the background thread finishes.
#[derive(Debug)]
pub struct BatchHandle {
    pub job_id: String,
    thread: JoinHandle<()>,
}

impl BatchHandle {
    pub fn wait(self) {
        if self.thread.join().is_err() {
            error!("Batch thread for job {} panicked", self.job_id);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Forwards dispatcher events into the registry for one job.
struct RegistrySink {
    registry: Arc<JobRegistry>,
    job_id: String,
}

impl StatusSink for RegistrySink {
    fn emit(&self, event: StatusEvent) {
        info!("{}", event);
        self.registry.apply(&self.job_id, &event);
    }
}

/// Validates the request, registers the job and starts processing on a
/// background thread. Validation failures surface here; processing
/// failures surface through the job's registry entry.
pub fn submit_batch(
    registry: Arc<JobRegistry>,
    config: Arc<Config>,
    prompt: String,
    request: BatchRequest,
) -> Result<BatchHandle, CvsiftError> {
    if !request.input_dir.exists() {
        return Err(WorkerError::FolderNotFound(request.input_dir.clone()).into());
    }
    if !request.input_dir.is_dir() {
        return Err(WorkerError::NotADirectory(request.input_dir.clone()).into());
    }
    if config.api_keys.is_empty() {
        return Err(ConfigError::NoApiKeys.into());
    }

    let files = list_resume_files(&request.input_dir)?;
    if files.is_empty() {
        return Err(WorkerError::NoFilesFound.into());
    }

    let job_id = request
        .job_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let filenames: Vec<String> = files
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| p.to_string_lossy().to_string())
        })
        .collect();

    registry.create(
        &job_id,
        &filenames,
        Some(request.output_path.to_string_lossy().to_string()),
    );
    info!(
        "Submitted job {} with {} files from {}",
        job_id,
        files.len(),
        request.input_dir.display()
    );

    let thread_job_id = job_id.clone();
    let thread = std::thread::spawn(move || {
        run_job(registry, config, prompt, request, files, &thread_job_id);
    });

    Ok(BatchHandle { job_id, thread })
}

fn run_job(
    registry: Arc<JobRegistry>,
    config: Arc<Config>,
    prompt: String,
    request: BatchRequest,
    files: Vec<PathBuf>,
    job_id: &str,
) {
    let _span = tracing::info_span!("batch", job = job_id).entered();

    let sink = Arc::new(RegistrySink {
        registry: Arc::clone(&registry),
        job_id: job_id.to_string(),
    });

    let dispatcher = WorkDispatcher::new(config, prompt);
    let outcome = match dispatcher.run(files, sink) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Job {} aborted: {}", job_id, e);
            registry.finish_with_message(job_id, &format!("Batch failed: {}", e));
            return;
        }
    };

    if outcome.records.is_empty() {
        registry.finish_with_message(
            job_id,
            "Batch failed: no resumes were successfully parsed",
        );
        return;
    }

    match report::write_report(&outcome.records, &request.output_path, request.append) {
        Ok(()) => {
            let output = request.output_path.to_string_lossy();
            registry.set_output_path(job_id, &output);
            registry.finish_with_message(
                job_id,
                &format!("Saved {} parsed resumes to {}", outcome.records.len(), output),
            );
            info!("Job {}: saved report to {}", job_id, output);
        }
        Err(e) => {
            error!("Job {}: report write failed: {}", job_id, e);
            registry.finish_with_message(job_id, &format!("Report write failed: {}", e));
        }
    }
}

/// Lists processable resume files directly inside `dir`, sorted by name.
/// Subdirectories and files with other extensions are ignored.
pub fn list_resume_files(dir: &Path) -> Result<Vec<PathBuf>, WorkerError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| WorkerError::ScanFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if ResumeFormat::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
