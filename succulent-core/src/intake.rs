//! Upload intake: validates and stores uploaded images under generated names.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::config::UploadConfig;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("file size exceeds maximum allowed size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("file is empty")]
    EmptyFile,

    #[error("file type '{extension}' not allowed. Allowed types: {allowed}")]
    TypeNotAllowed { extension: String, allowed: String },

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

impl IntakeError {
    /// Whether the error was caused by the upload itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IntakeError::TooLarge { .. } | IntakeError::EmptyFile | IntakeError::TypeNotAllowed { .. }
        )
    }
}

/// What the client declared about an upload.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileIntake {
    upload_dir: PathBuf,
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl FileIntake {
    /// Create the intake, making sure `upload_dir` exists.
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        max_bytes: u64,
        allowed_extensions: &[String],
    ) -> Result<Self, IntakeError> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;

        let allowed_extensions = allowed_extensions
            .iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();

        Ok(Self {
            upload_dir,
            max_bytes,
            allowed_extensions,
        })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, IntakeError> {
        Self::new(&config.dir, config.max_bytes, &config.allowed_extensions)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate(&self, meta: &UploadMeta) -> Result<(), IntakeError> {
        if meta.size > self.max_bytes {
            return Err(IntakeError::TooLarge { max: self.max_bytes });
        }
        if meta.size == 0 {
            return Err(IntakeError::EmptyFile);
        }

        let extension = extension_of(&meta.filename).to_lowercase();
        if !self.allowed_extensions.iter().any(|a| *a == extension) {
            return Err(IntakeError::TypeNotAllowed {
                extension,
                allowed: self.allowed_extensions.join(", "),
            });
        }
        Ok(())
    }

    /// Validate, then stream `reader` into `<upload_dir>/<uuid><ext>`.
    ///
    /// The original extension (including its case) is preserved. A partially
    /// written file is removed before an error is returned.
    pub async fn save<R>(&self, reader: R, meta: &UploadMeta) -> Result<PathBuf, IntakeError>
    where
        R: AsyncRead + Unpin,
    {
        self.validate(meta)?;

        let filename = format!("{}{}", Uuid::new_v4(), extension_of(&meta.filename));
        let path = self.upload_dir.join(filename);

        match self.write_bounded(reader, &path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), size = meta.size, "Stored upload");
                Ok(path)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial upload");
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_bounded<R>(&self, reader: R, path: &Path) -> Result<(), IntakeError>
    where
        R: AsyncRead + Unpin,
    {
        let mut file = tokio::fs::File::create(path).await?;
        // One byte past the ceiling is enough to detect an understated size.
        let mut limited = reader.take(self.max_bytes + 1);
        let written = tokio::io::copy(&mut limited, &mut file).await?;
        file.flush().await?;

        if written > self.max_bytes {
            return Err(IntakeError::TooLarge { max: self.max_bytes });
        }
        if written == 0 {
            return Err(IntakeError::EmptyFile);
        }
        Ok(())
    }

    pub async fn delete(&self, path: &Path) -> Result<(), IntakeError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IntakeError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(IntakeError::Io(e)),
        }
    }
}

/// `".jpg"` for `"photo.jpg"`, empty when there is no extension.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}
