//! Per-submission artifacts in the shared scratch directory
//!
//! `Artifacts::materialize` writes the submitted source to a uniquely named
//! file. Dropping the returned guard removes both the source file and the
//! compiled binary, whatever path the judging took to get there.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::core::utils::submission_id;

/// Attempts at drawing a fresh name when the generated one already exists
const MAX_NAME_ATTEMPTS: usize = 4;

/// Source file and executable owned by a single judge invocation
#[derive(Debug)]
pub struct Artifacts {
    id: String,
    source_path: PathBuf,
    binary_path: PathBuf,
}

impl Artifacts {
    /// Write `code` verbatim to `<scratch_dir>/<id>.c`.
    ///
    /// The scratch directory is created if missing.
    pub async fn materialize(scratch_dir: &Path, code: &str) -> Result<Self> {
        fs::create_dir_all(scratch_dir)
            .await
            .with_context(|| format!("Failed to create scratch directory {:?}", scratch_dir))?;
        // Absolute paths keep the binary reachable whatever the child's cwd is
        let scratch_dir = fs::canonicalize(scratch_dir)
            .await
            .with_context(|| format!("Failed to resolve scratch directory {:?}", scratch_dir))?;

        let mut attempt = 0;
        let (artifacts, mut file) = loop {
            attempt += 1;
            let id = submission_id();
            let source_path = scratch_dir.join(format!("{}.c", id));

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&source_path)
                .await
            {
                Ok(file) => {
                    let binary_path = scratch_dir.join(&id);
                    break (
                        Artifacts {
                            id,
                            source_path,
                            binary_path,
                        },
                        file,
                    );
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    debug!("Artifact name {} already taken, drawing another", id);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create source file {:?}", source_path));
                }
            }
        };

        // From here on the guard owns the file, so a failed write still cleans up
        file.write_all(code.as_bytes())
            .await
            .with_context(|| format!("Failed to write source file {:?}", artifacts.source_path))?;
        file.flush().await?;

        debug!(
            "Materialized {} bytes of source at {:?}",
            code.len(),
            artifacts.source_path
        );

        Ok(artifacts)
    }

    /// Submission-scoped identifier both file names derive from
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

impl Drop for Artifacts {
    // Drop cannot await. Two unlinks are cheap enough to block on; anything
    // heavier belongs in spawn_blocking.
    fn drop(&mut self) {
        remove_quietly(&self.source_path);
        remove_quietly(&self.binary_path);
    }
}

/// Best-effort removal. A file that never existed is not an error.
fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed artifact {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove artifact {:?}: {}", path, e),
    }
}
