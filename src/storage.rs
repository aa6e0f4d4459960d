//! The flat storage directory backing every upload.
//!
//! The directory listing is the only source of truth: there is no index or
//! manifest. In-flight uploads are written under a hidden `.incoming/`
//! subdirectory and only become visible once published under their final name.

use crate::sanitize::sanitize;
use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tempfile::TempPath;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Subdirectory holding uploads that are still being received.
pub const INCOMING_DIR: &str = ".incoming";

/// A file currently present in the storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// A stored file opened for reading.
#[derive(Debug)]
pub struct OpenedFile {
    pub name: String,
    pub path: PathBuf,
    pub file: fs::File,
    pub len: u64,
}

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("File not found.")]
    NotFound,
    #[error("Could not read file: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates the directory (and its incoming area) if needed and resolves it to
    /// an absolute path.
    ///
    /// Anything left in the incoming area by an earlier run is removed.
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(INCOMING_DIR)).await?;
        let root = fs::canonicalize(root).await?;
        if !fs::metadata(&root).await?.is_dir() {
            return Err(io::Error::other(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }
        let purged = purge_incoming(&root.join(INCOMING_DIR)).await?;
        if purged > 0 {
            info!("Removed {} stale incoming file(s)", purged);
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh file in the incoming area for an upload in progress.
    ///
    /// The file is deleted when the returned [`TempPath`] is dropped, so an
    /// upload abandoned at any point leaves nothing behind.
    pub fn create_incoming(&self) -> io::Result<(fs::File, TempPath)> {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".part")
            .tempfile_in(self.root.join(INCOMING_DIR))?
            .into_parts();
        Ok((fs::File::from_std(file), path))
    }

    /// Picks a name that does not exist yet, starting from `desired` and then
    /// probing `stem-1.ext`, `stem-2.ext`, ...
    ///
    /// The check and the later write are not atomic; two concurrent uploads of
    /// the same name can both be handed the same answer.
    pub async fn resolve_collision(&self, desired: &str) -> io::Result<String> {
        if !entry_exists(&self.root.join(desired)).await? {
            return Ok(desired.to_string());
        }

        let (stem, ext) = split_name(desired);
        for n in 1u64.. {
            let candidate = format!("{stem}-{n}{ext}");
            if !entry_exists(&self.root.join(&candidate)).await? {
                debug!("Name '{}' taken, using '{}'", desired, candidate);
                return Ok(candidate);
            }
        }
        unreachable!("collision counter exhausted")
    }

    /// Moves a fully written incoming file into place under a collision-free
    /// name derived from `desired`, returning the name it was stored under.
    ///
    /// Publishing uses a hard link, which fails instead of replacing an entry
    /// that appeared since the name was resolved. The incoming file is removed
    /// either way.
    pub async fn publish(&self, incoming: TempPath, desired: &str) -> io::Result<String> {
        let name = self.resolve_collision(desired).await?;
        fs::hard_link(&incoming, self.root.join(&name)).await?;
        if let Err(e) = incoming.close() {
            error!("Failed to remove incoming file after publishing '{}': {}", name, e);
        }
        info!("Stored upload as '{}'", name);
        Ok(name)
    }

    /// Regular files directly inside the directory, ordered by case-insensitive
    /// name. Subdirectories, symlinks and non-UTF-8 names are left out.
    pub async fn list(&self) -> io::Result<Vec<StoredFile>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(_) => {
                    error!("Skipping entry with non-UTF8 filename in {}", self.root.display());
                    continue;
                }
            };

            match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => files.push(StoredFile {
                    name,
                    size: metadata.len(),
                    modified: metadata.modified().ok(),
                }),
                Ok(_) => {}
                Err(e) => error!("Failed to get metadata for {}: {}", entry.path().display(), e),
            }
        }

        files.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(files)
    }

    /// Opens a stored file by a client-supplied name.
    ///
    /// Only the sanitized final segment of `requested` is ever joined to the
    /// root, so no input can reach outside the directory.
    pub async fn open_file(&self, requested: &str) -> Result<OpenedFile, RetrieveError> {
        let name = sanitize(requested).ok_or(RetrieveError::NotFound)?;
        let path = self.root.join(&name);

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(RetrieveError::NotFound),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(RetrieveError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let file = fs::File::open(&path).await?;
        Ok(OpenedFile {
            name,
            path,
            file,
            len: metadata.len(),
        })
    }
}

/// Deletes every regular file in the incoming area, returning how many went.
async fn purge_incoming(dir: &Path) -> io::Result<usize> {
    let mut entries = fs::read_dir(dir).await?;
    let mut purged = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => match fs::remove_file(&path).await {
                Ok(()) => purged += 1,
                Err(e) => warn!("Failed to remove stale upload {}: {}", path.display(), e),
            },
            Ok(_) => {}
            Err(e) => warn!("Failed to get metadata for {}: {}", path.display(), e),
        }
    }
    Ok(purged)
}

/// Whether anything (file, directory, dangling symlink) occupies `path`.
async fn entry_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Splits `name` into stem and extension, the extension keeping its dot.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}
