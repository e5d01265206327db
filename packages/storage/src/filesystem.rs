use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::name::BlobName;
use super::traits::{BlobStore, BoxReader};

/// Filesystem-backed blob store.
///
/// Blobs live directly under `{base_path}/{name}`. Writes are staged in
/// `{base_path}/.tmp` and linked into place only once complete, so readers
/// never observe a partial or oversized blob.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating its directories.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    fn blob_path(&self, name: &BlobName) -> PathBuf {
        self.base_path.join(name.as_str())
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn stage(&self, mut reader: BoxReader, temp_path: &Path) -> Result<u64, StorageError> {
        let mut total_bytes: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
        let mut temp_file = fs::File::create(temp_path).await?;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: self.max_size,
                });
            }

            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        Ok(total_bytes)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(&self, name: &BlobName, reader: BoxReader) -> Result<u64, StorageError> {
        let temp_path = self.temp_path();

        let total_bytes = match self.stage(reader, &temp_path).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        // A hard link fails instead of replacing an existing blob.
        let blob_path = self.blob_path(name);
        let linked = fs::hard_link(&temp_path, &blob_path).await;
        let _ = fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => Ok(total_bytes),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_stream(&self, name: &BlobName) -> Result<BoxReader, StorageError> {
        let blob_path = self.blob_path(name);
        match fs::File::open(&blob_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &BlobName) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, name: &BlobName) -> Result<u64, StorageError> {
        match fs::metadata(self.blob_path(name)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, name: &BlobName) -> String {
        self.blob_path(name).to_string_lossy().into_owned()
    }
}
