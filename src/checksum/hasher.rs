//! Directory hashing with exclusion globs.

use glob::{MatchOptions, Pattern};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::Checksum;

/// Build outputs live under `.bin/`; they are derived from the sources, so they
/// never feed the checksum.
pub const DEFAULT_EXCLUDES: &[&str] = &[".bin/*"];

#[derive(Debug, Error)]
pub enum HashError {
    #[error("service directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("invalid exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("unsupported file type ({kind}) at {path}; exclude it or replace it with a regular file")]
    UnsupportedFileType { path: PathBuf, kind: &'static str },
}

/// Computes a [`Checksum`] over every non-excluded regular file below a root.
///
/// Entries are visited depth-first in file-name order. For each file the
/// `/`-separated path relative to the root is hashed, then its bytes, so a
/// rename changes the checksum even when contents do not. Symlinks are never
/// followed; any non-regular file that is not excluded is an error.
#[derive(Debug, Clone)]
pub struct DirectoryHasher {
    excludes: Vec<Pattern>,
}

impl DirectoryHasher {
    pub fn new<I, S>(excludes: I) -> Result<Self, HashError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excludes = excludes
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref();
                Pattern::new(raw).map_err(|source| HashError::InvalidPattern {
                    pattern: raw.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { excludes })
    }

    /// Hasher using [`DEFAULT_EXCLUDES`] plus `extra`
    pub fn with_default_excludes<I, S>(extra: I) -> Result<Self, HashError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = DEFAULT_EXCLUDES
            .iter()
            .map(|p| p.to_string())
            .chain(extra.into_iter().map(|p| p.as_ref().to_string()))
            .collect();
        Self::new(patterns)
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.excludes
            .iter()
            .any(|pattern| pattern.matches_with(relative, options))
    }

    pub fn hash(&self, root: &Path) -> Result<Checksum, HashError> {
        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(HashError::NotADirectory(root.to_path_buf())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(HashError::RootNotFound(root.to_path_buf()))
            }
            Err(source) => {
                return Err(HashError::Read {
                    path: root.to_path_buf(),
                    source,
                })
            }
        }

        let mut hasher = Sha1::new();
        let mut hashed = 0usize;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1);

        for entry in walker {
            let entry = entry.map_err(|source| HashError::Walk {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf()),
                source,
            })?;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }

            let relative = relative_key(root, entry.path())?;
            if self.is_excluded(&relative) {
                trace!("excluding '{}' from the hash", relative);
                continue;
            }

            if file_type.is_symlink() {
                return Err(HashError::UnsupportedFileType {
                    path: entry.path().to_path_buf(),
                    kind: "symlink",
                });
            }
            if !file_type.is_file() {
                return Err(HashError::UnsupportedFileType {
                    path: entry.path().to_path_buf(),
                    kind: "special file",
                });
            }

            debug!("adding '{}' to the hash", relative);
            hasher.update(relative.as_bytes());

            let read_err = |source| HashError::Read {
                path: entry.path().to_path_buf(),
                source,
            };
            let mut file = File::open(entry.path()).map_err(read_err)?;
            std::io::copy(&mut file, &mut hasher).map_err(read_err)?;
            hashed += 1;
        }

        let checksum = Checksum::from_hex_digest(format!("{:x}", hasher.finalize()));
        debug!(
            "hashed {} file(s) under {}: {}",
            hashed,
            root.display(),
            checksum
        );
        Ok(checksum)
    }
}

/// Convenience wrapper: hash `root` with exactly the given exclusions.
pub fn hash_directory<I, S>(root: &Path, excludes: I) -> Result<Checksum, HashError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DirectoryHasher::new(excludes)?.hash(root)
}

/// `/`-joined path of `path` below `root`.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Result<String, HashError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| HashError::NonUtf8Path(path.to_path_buf()))?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| HashError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}
