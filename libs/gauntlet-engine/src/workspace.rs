/// Workspace Manager - Staging of Untrusted Submissions
///
/// Submitted code is written to a uniquely named file inside one scratch
/// directory so it can be bind-mounted into the container. The returned
/// [`StagedSubmission`] owns that file and removes it when dropped, so every
/// exit path of a request (success, failing tests, timeout, error, panic)
/// releases it exactly once.
///
/// Randomness and filesystem access are injected through [`NameSource`] and
/// [`ScratchFs`] so the orchestrator can be tested without touching disk.

use crate::error::{ExecutorError, Result};
use chrono::{DateTime, Utc};
use gauntlet_common::registry::ExecutionProfile;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on staged content, prefix included
pub const MAX_SUBMISSION_BYTES: usize = 1024 * 1024; // 1MB

/// Name collisions are retried this many times before giving up
const MAX_NAME_ATTEMPTS: usize = 3;

/// Source of staged-file names
pub trait NameSource: Send + Sync {
    fn next_name(&self) -> String;
}

/// Names drawn from a v4 UUID (122 random bits), rendered as plain hex
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNames;

impl NameSource for UuidNames {
    fn next_name(&self) -> String {
        format!("submission-{}", uuid::Uuid::new_v4().simple())
    }
}

/// Flat file store backing the staging area.
///
/// Names are always a single path segment.
pub trait ScratchFs: Send + Sync {
    /// Create `name` with `contents`. Fails if it already exists and never
    /// leaves a partially written file behind.
    fn write_new(&self, name: &str, contents: &[u8]) -> io::Result<()>;
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
    fn remove(&self, name: &str) -> io::Result<()>;
    /// Absolute host path handed to the container runtime for the bind mount
    fn host_path(&self, name: &str) -> PathBuf;
}

/// True for names made only of ASCII alphanumerics, `-` and `_`
pub fn is_single_segment(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn reject_unsafe_name(name: &str) -> io::Result<()> {
    if is_single_segment(name) {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing unsafe staging name {:?}", name),
        ))
    }
}

/// Remove a file whose write failed. Returns whether it was removed.
fn discard_partial(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove partially written submission"
            );
            false
        }
    }
}

/// Scratch directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalScratch {
    root: PathBuf,
}

impl LocalScratch {
    /// Create (if needed) and resolve the scratch directory to an absolute path
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        let root = fs::canonicalize(root.as_ref())?;
        // Commas would split the container runtime's --mount spec
        if root.to_string_lossy().contains(',') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("scratch directory {} contains a comma", root.display()),
            ));
        }
        debug!(scratch_dir = %root.display(), "Scratch directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScratchFs for LocalScratch {
    fn write_new(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        reject_unsafe_name(name)?;
        let path = self.root.join(name);

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        if let Err(e) = file.write_all(contents).and_then(|_| file.sync_all()) {
            drop(file);
            discard_partial(&path);
            return Err(e);
        }
        Ok(())
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        reject_unsafe_name(name)?;
        fs::read(self.root.join(name))
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        reject_unsafe_name(name)?;
        fs::remove_file(self.root.join(name))
    }

    fn host_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Stages submissions into a [`ScratchFs`]
#[derive(Clone)]
pub struct Workspace {
    fs: Arc<dyn ScratchFs>,
    names: Arc<dyn NameSource>,
}

impl Workspace {
    pub fn new(fs: Arc<dyn ScratchFs>, names: Arc<dyn NameSource>) -> Self {
        Self { fs, names }
    }

    /// Workspace over a local scratch directory with UUID names
    pub fn local(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(Arc::new(LocalScratch::new(root)?), Arc::new(UuidNames)))
    }

    /// Write `profile.code_prefix + code` to a freshly named file
    pub fn stage(&self, profile: &ExecutionProfile, code: &str) -> Result<StagedSubmission> {
        let size = profile.code_prefix.len() + code.len();
        if size > MAX_SUBMISSION_BYTES {
            return Err(ExecutorError::SubmissionTooLarge {
                size,
                max: MAX_SUBMISSION_BYTES,
            });
        }

        let mut contents = String::with_capacity(size);
        contents.push_str(&profile.code_prefix);
        contents.push_str(code);

        let mut last_error = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.names.next_name();
            if !is_single_segment(&name) {
                last_error = Some(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("name source produced unsafe name {:?}", name),
                ));
                break;
            }

            match self.fs.write_new(&name, contents.as_bytes()) {
                Ok(()) => {
                    debug!(name = %name, bytes = size, "Staged submission");
                    return Ok(StagedSubmission {
                        host_path: self.fs.host_path(&name),
                        name,
                        created_at: Utc::now(),
                        fs: Arc::clone(&self.fs),
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    warn!(name = %name, "Staging name collision, drawing a new name");
                    last_error = Some(e);
                }
                Err(e) => return Err(ExecutorError::Workspace { source: e }),
            }
        }

        Err(ExecutorError::Workspace {
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no staging name available")),
        })
    }

    /// Release a staged submission now instead of at end of scope
    pub fn unstage(&self, staged: StagedSubmission) {
        drop(staged);
    }
}

/// A staged file owned by one in-flight request. Removed on drop.
pub struct StagedSubmission {
    name: String,
    host_path: PathBuf,
    created_at: DateTime<Utc>,
    fs: Arc<dyn ScratchFs>,
    released: bool,
}

impl StagedSubmission {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Read back what was staged
    pub fn contents(&self) -> io::Result<String> {
        let bytes = self.fs.read(&self.name)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.fs.remove(&self.name) {
            Ok(()) => debug!(name = %self.name, "Removed staged submission"),
            Err(e) => warn!(name = %self.name, error = %e, "Failed to remove staged submission"),
        }
    }
}

impl Drop for StagedSubmission {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StagedSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedSubmission")
            .field("name", &self.name)
            .field("host_path", &self.host_path)
            .field("created_at", &self.created_at)
            .finish()
    }
}
