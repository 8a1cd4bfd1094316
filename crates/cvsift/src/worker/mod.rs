//! Batch dispatch: a shared work queue drained by one thread per API
//! credential.

mod dispatch;
mod status;

pub use dispatch::{effective_worker_count, BatchOutcome, WorkDispatcher};
pub use status::{CollectingSink, NoopSink, StatusEvent, StatusSink};
