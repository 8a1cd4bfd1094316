//! Receives uploaded resume files into a per-session directory.

use std::path::{Path, PathBuf};

use log::{info, warn};
use uuid::Uuid;

use crate::config::ResumeFormat;
use crate::error::IntakeError;

/// Where a batch of uploads landed and which names made it in.
#[derive(Debug)]
pub struct UploadOutcome {
    /// Session directory holding the accepted files.
    pub dir: PathBuf,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

/// Stores uploaded files under a fresh session directory in `base_dir`.
///
/// Only PDF, DOCX and DOC names are accepted; everything else is
/// recorded in `rejected`. A batch with no accepted files is an error
/// and leaves no session directory behind.
pub fn store_uploads(
    base_dir: &Path,
    files: &[(String, Vec<u8>)],
) -> Result<UploadOutcome, IntakeError> {
    let mut accepted: Vec<&(String, Vec<u8>)> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();

    for entry in files {
        let name = sanitize_filename(&entry.0);
        if name.is_empty() || ResumeFormat::from_path(Path::new(&name)).is_none() {
            warn!("Rejecting upload '{}': unsupported format", entry.0);
            rejected.push(entry.0.clone());
        } else {
            accepted.push(entry);
        }
    }

    if accepted.is_empty() {
        return Err(IntakeError::NoAcceptedFiles {
            rejected: rejected.join(", "),
        });
    }

    let dir = base_dir.join(Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).map_err(|source| IntakeError::CreateDirectory {
        path: dir.clone(),
        source,
    })?;

    let mut stored = Vec::with_capacity(accepted.len());
    for (name, bytes) in accepted {
        let safe = sanitize_filename(name);
        let target = dir.join(&safe);
        std::fs::write(&target, bytes).map_err(|source| IntakeError::StoreFile {
            name: name.clone(),
            source,
        })?;
        stored.push(safe);
    }

    info!(
        "Stored {} uploads in {} ({} rejected)",
        stored.len(),
        dir.display(),
        rejected.len()
    );

    Ok(UploadOutcome {
        dir,
        accepted: stored,
        rejected,
    })
}

/// Strips any path components from a client-supplied name and replaces
/// characters that are unsafe in filenames.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();

    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches(['.', ' '])
        .to_string()
}
