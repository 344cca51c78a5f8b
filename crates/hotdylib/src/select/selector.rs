//! Picking the module to load from a directory snapshot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::ContentType;

/// A directory entry considered for loading.
///
/// Recomputed on every scan and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateModule {
    /// Path of the entry.
    pub path: PathBuf,
    /// Content modification time.
    pub modified: SystemTime,
    /// Sniffed content type ([`ContentType::Other`] for non-regular files).
    pub content_type: ContentType,
    /// Whether the entry itself is a regular file (symlinks are not followed).
    pub is_regular_file: bool,
}

impl CandidateModule {
    /// Reads the attributes of `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the metadata, the modification time or the
    /// header of a regular file cannot be read.
    pub fn inspect(path: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        let is_regular_file = metadata.file_type().is_file();
        let content_type = if is_regular_file {
            ContentType::of_file(path)?
        } else {
            ContentType::Other
        };

        Ok(Self {
            path: path.to_path_buf(),
            modified: metadata.modified()?,
            content_type,
            is_regular_file,
        })
    }

    /// Returns `true` if this entry may be selected for `required`.
    #[must_use]
    pub fn qualifies(&self, required: ContentType) -> bool {
        self.is_regular_file && self.content_type == required
    }
}

/// The module chosen by a [`ModuleSelector`].
///
/// The modification time is what won the selection; whether a module is
/// already loaded is decided by path alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectedModule {
    path: PathBuf,
    modified: SystemTime,
}

impl SelectedModule {
    /// Creates a selection record.
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    /// Path of the selected module.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time observed when the module was selected.
    #[must_use]
    pub const fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Consumes the selection, returning its path.
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl From<CandidateModule> for SelectedModule {
    fn from(candidate: CandidateModule) -> Self {
        Self::new(candidate.path, candidate.modified)
    }
}

/// Selects the newest module of the required type in a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleSelector {
    required: ContentType,
}

impl ModuleSelector {
    /// Creates a selector that only accepts `required` files.
    #[must_use]
    pub const fn new(required: ContentType) -> Self {
        Self { required }
    }

    /// Creates a selector for the platform's dynamic library type.
    #[must_use]
    pub const fn native() -> Self {
        Self::new(ContentType::native())
    }

    /// The content type a file must have to be selected.
    #[must_use]
    pub const fn required(&self) -> ContentType {
        self.required
    }

    /// Lists `directory` and inspects every entry.
    ///
    /// Entries whose attributes cannot be read are skipped.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory itself cannot be listed.
    pub fn scan(&self, directory: &Path) -> io::Result<Vec<CandidateModule>> {
        let mut candidates = Vec::new();

        for entry in fs::read_dir(directory)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    debug!(directory = %directory.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            match CandidateModule::inspect(&path) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping entry with unreadable attributes");
                }
            }
        }

        Ok(candidates)
    }

    /// Picks the winner among `candidates`.
    ///
    /// The newest qualifying candidate wins; equal modification times go to
    /// the lexicographically smallest path, so the result does not depend on
    /// iteration order.
    pub fn pick(&self, candidates: impl IntoIterator<Item = CandidateModule>) -> Option<SelectedModule> {
        let mut best: Option<CandidateModule> = None;

        for candidate in candidates {
            if !candidate.qualifies(self.required) {
                continue;
            }
            let replaces = best.as_ref().is_none_or(|current| {
                candidate.modified > current.modified
                    || (candidate.modified == current.modified && candidate.path < current.path)
            });
            if replaces {
                best = Some(candidate);
            }
        }

        best.map(SelectedModule::from)
    }

    /// Selects the module to load from `directory`.
    ///
    /// A directory that cannot be listed (for instance while a build is
    /// replacing it) is logged and yields `None`.
    #[must_use]
    pub fn select(&self, directory: &Path) -> Option<SelectedModule> {
        match self.scan(directory) {
            Ok(candidates) => {
                let selected = self.pick(candidates);
                debug!(
                    directory = %directory.display(),
                    selected = ?selected.as_ref().map(SelectedModule::path),
                    "module selection finished"
                );
                selected
            }
            Err(e) => {
                warn!(
                    directory = %directory.display(),
                    error = %e,
                    "error selecting module in directory"
                );
                None
            }
        }
    }
}

impl Default for ModuleSelector {
    fn default() -> Self {
        Self::native()
    }
}
