use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::name::BlobName;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Name-addressed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `name` and return the number of bytes written.
    async fn put(&self, name: &BlobName, data: &[u8]) -> Result<u64, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(name, reader).await
    }

    /// Store data from an async reader under `name`.
    ///
    /// Fails with `AlreadyExists` rather than overwriting, and with
    /// `SizeLimitExceeded` (leaving nothing behind) when the reader yields
    /// more than the store's limit.
    async fn put_stream(&self, name: &BlobName, reader: BoxReader) -> Result<u64, StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, name: &BlobName) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(name).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, name: &BlobName) -> Result<BoxReader, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, name: &BlobName) -> Result<bool, StorageError>;

    /// Get the size of a blob in bytes.
    async fn size(&self, name: &BlobName) -> Result<u64, StorageError>;

    /// Storage-specific location of a blob, recorded alongside its metadata.
    fn locate(&self, name: &BlobName) -> String;
}
