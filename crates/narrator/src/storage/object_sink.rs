use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Destination for synthesized audio. Returns a URL clients can fetch.
///
/// The artifact belongs to the sink once `upload` is called. Blocking; async
/// callers dispatch it with `spawn_blocking`.
pub trait ObjectSink: Send + Sync {
    fn upload(&self, artifact: &Path) -> Result<String, StorageError>;
}

/// Publishes artifacts into a directory served under `public_base_url`.
pub struct FileSystemSink {
    directory: PathBuf,
    public_base_url: String,
}

impl FileSystemSink {
    pub fn new(directory: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }

    /// Creates `filename` (or `stem_N.ext` when taken) with `create_new`, so
    /// two uploads never overwrite each other.
    fn create_unique(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot) => (&filename[..dot], Some(&filename[dot..])),
            None => (filename, None),
        };

        for counter in 1..=1000 {
            let candidate = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let path = self.directory.join(&candidate);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(content) {
                        drop(file);
                        let _ = std::fs::remove_file(&path);
                        return Err(StorageError::WriteFile { path, source: e });
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FileExists(self.directory.join(filename)))
    }

    fn publish(&self, artifact: &Path) -> Result<String, StorageError> {
        let filename = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidArtifact(artifact.to_path_buf()))?;

        let content = std::fs::read(artifact).map_err(|e| StorageError::ReadArtifact {
            path: artifact.to_path_buf(),
            source: e,
        })?;

        self.ensure_directory()?;
        let stored = self.create_unique(filename, &content)?;

        let stored_name = stored
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);
        log::debug!("Stored artifact as {}", stored.display());

        Ok(format!("{}/{}", self.public_base_url, stored_name))
    }
}

impl ObjectSink for FileSystemSink {
    /// Publishes the artifact, then removes it whether or not that worked.
    fn upload(&self, artifact: &Path) -> Result<String, StorageError> {
        let result = self.publish(artifact);

        match std::fs::remove_file(artifact) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove temporary artifact {}: {}",
                artifact.display(),
                e
            ),
        }

        result
    }
}
