use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worker::StatusEvent;

/// Per-file state within a batch. Transitions are monotonic: a terminal
/// state is never overwritten by a later event for the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Success | FileStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            FileStatus::Pending => 0,
            FileStatus::Processing => 1,
            FileStatus::Success | FileStatus::Failed => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
}

/// A batch job's full visible state. Serialized as-is for poll responses.
///
/// `processed` and `failed` are always recomputed from `file_status`, so
/// they cannot drift from the per-file map no matter how events interleave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    pub message: String,
    pub file_status: BTreeMap<String, FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    fn new(job_id: &str, filenames: &[String], output_path: Option<String>) -> Self {
        let file_status = filenames
            .iter()
            .map(|f| (f.clone(), FileStatus::Pending))
            .collect::<BTreeMap<_, _>>();

        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Processing,
            total_files: filenames.len(),
            processed: 0,
            failed: 0,
            current_file: None,
            message: "Job queued".to_string(),
            file_status,
            output_path,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Folds one event into the job. The file map only moves forward;
    /// counts are rebuilt from the map afterwards.
    fn apply(&mut self, event: &StatusEvent) {
        self.message = event.to_string();

        match event {
            StatusEvent::BatchStarted { .. } => {}
            StatusEvent::FileStarted { file, .. } => {
                self.current_file = Some(file.clone());
                self.advance(file, FileStatus::Processing);
            }
            StatusEvent::FileSucceeded { file } => {
                self.advance(file, FileStatus::Success);
            }
            StatusEvent::FileFailed { file, .. } | StatusEvent::FileSkipped { file, .. } => {
                self.advance(file, FileStatus::Failed);
            }
            StatusEvent::BatchCompleted { .. } => {
                self.status = JobStatus::Completed;
                self.current_file = None;
                self.finished_at = Some(Utc::now());
            }
        }

        self.recount();
    }

    fn advance(&mut self, file: &str, next: FileStatus) {
        match self.file_status.get_mut(file) {
            Some(current) => {
                if next.rank() > current.rank() {
                    *current = next;
                }
            }
            None => {
                log::warn!("Job {}: event for unknown file '{}'", self.job_id, file);
            }
        }
    }

    fn recount(&mut self) {
        self.processed = self
            .file_status
            .values()
            .filter(|s| **s == FileStatus::Success)
            .count();
        self.failed = self
            .file_status
            .values()
            .filter(|s| **s == FileStatus::Failed)
            .count();
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Completed)
    }
}

/// Registry of batch jobs keyed by job ID.
///
/// Completed jobs are retained for polling until `max_completed` of them
/// accumulate; registering a new job then evicts the oldest-finished ones.
/// In-flight jobs are never evicted.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, BatchJob>>,
    max_completed: usize,
}

impl JobRegistry {
    pub fn new(max_completed: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_completed,
        }
    }

    /// Registers a new job with every file in `Pending` state.
    pub fn create(&self, job_id: &str, filenames: &[String], output_path: Option<String>) {
        let mut jobs = self.write_jobs();
        Self::evict_completed(&mut jobs, self.max_completed);
        jobs.insert(job_id.to_string(), BatchJob::new(job_id, filenames, output_path));
    }

    /// Folds a status event into the job. Events for unknown jobs are
    /// dropped with a warning.
    pub fn apply(&self, job_id: &str, event: &StatusEvent) {
        let mut jobs = self.write_jobs();
        match jobs.get_mut(job_id) {
            Some(job) => job.apply(event),
            None => log::warn!("Status event for unknown job '{}'", job_id),
        }
    }

    pub fn set_output_path(&self, job_id: &str, output_path: &str) {
        let mut jobs = self.write_jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            job.output_path = Some(output_path.to_string());
        }
    }

    /// Marks the job finished with a final message. Used when the run
    /// aborts before the dispatcher can emit its own completion event.
    pub fn finish_with_message(&self, job_id: &str, message: &str) {
        let mut jobs = self.write_jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Completed;
            job.current_file = None;
            job.finished_at = Some(Utc::now());
            job.message = message.to_string();
        }
    }

    /// Clones the job's current state for a poll response.
    pub fn snapshot(&self, job_id: &str) -> Option<BatchJob> {
        self.read_jobs().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    fn evict_completed(jobs: &mut HashMap<String, BatchJob>, max_completed: usize) {
        let mut finished: Vec<(String, DateTime<Utc>)> = jobs
            .values()
            .filter(|j| j.is_finished())
            .map(|j| (j.job_id.clone(), j.finished_at.unwrap_or(j.started_at)))
            .collect();

        if finished.len() < max_completed {
            return;
        }

        finished.sort_by_key(|(_, at)| *at);
        let excess = finished.len() + 1 - max_completed;
        for (job_id, _) in finished.into_iter().take(excess) {
            log::debug!("Evicting completed job {}", job_id);
            jobs.remove(&job_id);
        }
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, BatchJob>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, BatchJob>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_starts_all_pending() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf", "b.pdf"]), None);

        let job = registry.snapshot("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.total_files, 2);
        assert_eq!(job.processed, 0);
        assert_eq!(job.failed, 0);
        assert!(job.file_status.values().all(|s| *s == FileStatus::Pending));
    }

    #[test]
    fn test_counts_follow_file_map() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf", "b.pdf", "c.pdf"]), None);

        registry.apply(
            "job-1",
            &StatusEvent::FileSucceeded {
                file: "a.pdf".to_string(),
            },
        );
        registry.apply(
            "job-1",
            &StatusEvent::FileFailed {
                file: "b.pdf".to_string(),
                reason: "timeout".to_string(),
            },
        );

        let job = registry.snapshot("job-1").unwrap();
        assert_eq!(job.processed, 1);
        assert_eq!(job.failed, 1);
        assert_eq!(job.file_status["a.pdf"], FileStatus::Success);
        assert_eq!(job.file_status["b.pdf"], FileStatus::Failed);
        assert_eq!(job.file_status["c.pdf"], FileStatus::Pending);
    }

    #[test]
    fn test_terminal_status_is_never_overwritten() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf"]), None);

        registry.apply(
            "job-1",
            &StatusEvent::FileSucceeded {
                file: "a.pdf".to_string(),
            },
        );
        // A straggling start event must not demote the file
        registry.apply(
            "job-1",
            &StatusEvent::FileStarted {
                file: "a.pdf".to_string(),
                index: 1,
                total: 1,
            },
        );
        registry.apply(
            "job-1",
            &StatusEvent::FileFailed {
                file: "a.pdf".to_string(),
                reason: "late error".to_string(),
            },
        );

        let job = registry.snapshot("job-1").unwrap();
        assert_eq!(job.file_status["a.pdf"], FileStatus::Success);
        assert_eq!(job.processed, 1);
        assert_eq!(job.failed, 0);
    }

    #[test]
    fn test_completion_sets_status_and_end_time() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf"]), None);

        registry.apply(
            "job-1",
            &StatusEvent::FileSucceeded {
                file: "a.pdf".to_string(),
            },
        );
        registry.apply(
            "job-1",
            &StatusEvent::BatchCompleted {
                succeeded: 1,
                failed: 0,
            },
        );

        let job = registry.snapshot("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.finished_at.is_some());
        assert!(job.current_file.is_none());
        assert_eq!(job.message, "Completed: 1 parsed, 0 failed");
    }

    #[test]
    fn test_message_mirrors_last_event() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf"]), None);

        registry.apply(
            "job-1",
            &StatusEvent::FileStarted {
                file: "a.pdf".to_string(),
                index: 1,
                total: 1,
            },
        );

        let job = registry.snapshot("job-1").unwrap();
        assert_eq!(job.message, "Processing: a.pdf (1/1)");
        assert_eq!(job.current_file.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_unknown_job_snapshot_is_none() {
        let registry = JobRegistry::default();
        assert!(registry.snapshot("missing").is_none());
    }

    #[test]
    fn test_unknown_file_event_is_ignored() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf"]), None);

        registry.apply(
            "job-1",
            &StatusEvent::FileSucceeded {
                file: "other.pdf".to_string(),
            },
        );

        let job = registry.snapshot("job-1").unwrap();
        assert_eq!(job.processed, 0);
        assert!(!job.file_status.contains_key("other.pdf"));
    }

    #[test]
    fn test_eviction_drops_oldest_completed() {
        let registry = JobRegistry::new(2);

        for i in 0..3 {
            let job_id = format!("job-{}", i);
            registry.create(&job_id, &files(&["a.pdf"]), None);
            registry.apply(
                &job_id,
                &StatusEvent::BatchCompleted {
                    succeeded: 1,
                    failed: 0,
                },
            );
        }

        // job-0 and job-1 were completed before job-2 was registered;
        // registering job-2 ran eviction with 2 completed jobs present.
        registry.create("job-3", &files(&["a.pdf"]), None);

        assert!(registry.snapshot("job-3").is_some());
        assert!(registry.snapshot("job-2").is_some());
        let survivors = (0..3)
            .filter(|i| registry.snapshot(&format!("job-{}", i)).is_some())
            .count();
        assert!(survivors < 3);
    }

    #[test]
    fn test_in_flight_jobs_survive_eviction() {
        let registry = JobRegistry::new(1);
        registry.create("running", &files(&["a.pdf"]), None);

        for i in 0..3 {
            let job_id = format!("done-{}", i);
            registry.create(&job_id, &files(&["a.pdf"]), None);
            registry.apply(
                &job_id,
                &StatusEvent::BatchCompleted {
                    succeeded: 1,
                    failed: 0,
                },
            );
        }
        registry.create("new", &files(&["a.pdf"]), None);

        assert!(registry.snapshot("running").is_some());
        assert!(registry.snapshot("new").is_some());
    }

    #[test]
    fn test_snapshot_serializes_for_polling() {
        let registry = JobRegistry::default();
        registry.create("job-1", &files(&["a.pdf"]), Some("/out/report.csv".to_string()));

        let job = registry.snapshot("job-1").unwrap();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["status"], "processing");
        assert_eq!(json["file_status"]["a.pdf"], "pending");
        assert_eq!(json["output_path"], "/out/report.csv");
    }
}
