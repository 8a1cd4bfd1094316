//! In-memory job registry tracking per-file progress of batch runs.

mod registry;

pub use registry::{BatchJob, FileStatus, JobRegistry, JobStatus};
