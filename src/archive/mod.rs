//! Dist archive packaging and extraction
//!
//! A dist archive holds what the deploy tool needs and nothing else: the
//! prebuilt files directly under `.bin/` plus the `serverless.yml` descriptor,
//! both at their paths relative to the service root.
//!
//! Extraction checks every entry name before writing a single file, so an
//! archive with one hostile entry leaves the destination untouched.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Directory holding prebuilt binaries, relative to the service root
pub const BIN_DIR: &str = ".bin";
/// Deployment descriptor, relative to the service root
pub const DESCRIPTOR: &str = "serverless.yml";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no binaries files found in {}", .dir.display())]
    NoBinaries { dir: PathBuf },

    #[error("binary name is not valid UTF-8: {}", .path.display())]
    NonUtf8Name { path: PathBuf },

    #[error("deployment descriptor {} not found", .path.display())]
    MissingDescriptor { path: PathBuf },

    #[error("archive entry {name:?} escapes the destination directory")]
    UnsafePath { name: String },
}

/// Package `.bin/*` and `serverless.yml` of `service_dir` into a zip archive
pub fn build_dist_zip(service_dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let binaries = collect_binaries(&service_dir.join(BIN_DIR))?;

    let descriptor = service_dir.join(DESCRIPTOR);
    if !descriptor.is_file() {
        return Err(ArchiveError::MissingDescriptor { path: descriptor });
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, path) in binaries
        .iter()
        .map(|(name, path)| (format!("{}/{}", BIN_DIR, name), path.as_path()))
        .chain(std::iter::once((DESCRIPTOR.to_string(), descriptor.as_path())))
    {
        add_file(&mut zip, &name, path)?;
    }

    let bytes = zip.finish()?.into_inner();
    info!(
        "Packaged {} binaries and {} into {} bytes",
        binaries.len(),
        DESCRIPTOR,
        bytes.len()
    );
    Ok(bytes)
}

/// Regular files directly under `bin_dir`, sorted by name
fn collect_binaries(bin_dir: &Path) -> Result<Vec<(String, PathBuf)>, ArchiveError> {
    let entries = match fs::read_dir(bin_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArchiveError::NoBinaries {
                dir: bin_dir.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut binaries = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !fs::metadata(&path)?.is_file() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| ArchiveError::NonUtf8Name { path: path.clone() })?;
        binaries.push((name, path));
    }

    if binaries.is_empty() {
        return Err(ArchiveError::NoBinaries {
            dir: bin_dir.to_path_buf(),
        });
    }
    binaries.sort();
    Ok(binaries)
}

fn add_file(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    path: &Path,
) -> Result<(), ArchiveError> {
    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(file_mode(path)?);

    zip.start_file(name, options)?;
    let mut file = File::open(path)?;
    io::copy(&mut file, zip)?;
    debug!("Added {} to archive", name);
    Ok(())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
    Ok(0o644)
}

/// Unpack `bytes` into `dest`, returning the extracted file paths.
///
/// Fails with [`ArchiveError::UnsafePath`] before writing anything if any
/// entry is absolute or contains a `..` component.
pub fn extract(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let relative = safe_relative_path(entry.name())?;
        plan.push((index, relative, entry.is_dir(), entry.unix_mode()));
    }

    fs::create_dir_all(dest)?;
    let mut written = Vec::new();
    for (index, relative, is_dir, mode) in plan {
        let target = dest.join(&relative);
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entry = archive.by_index(index)?;
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        out.flush()?;
        restore_mode(&target, mode)?;

        debug!("Extracted {}", target.display());
        written.push(target);
    }

    info!("Extracted {} files into {}", written.len(), dest.display());
    Ok(written)
}

fn safe_relative_path(name: &str) -> Result<PathBuf, ArchiveError> {
    let unsafe_path = || ArchiveError::UnsafePath {
        name: name.to_string(),
    };

    // Windows separators would otherwise hide `..\` from the component check
    let normalized = name.replace('\\', "/");
    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path())
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(relative)
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
