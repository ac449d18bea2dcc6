//! Content sources for the copy handler: a materialized buffer, a readable stream,
//! or a handle to a blob that still lives in the source container.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::contract::{BlobStore, ContentSource, StorageError};

/// Content that the trigger already delivered as one buffer.
#[derive(Debug, Clone)]
pub struct BufferContent {
    bytes: Bytes,
}

impl BufferContent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl ContentSource for BufferContent {
    async fn read_all(&mut self) -> Result<Bytes, StorageError> {
        Ok(self.bytes.clone())
    }
}

/// Content delivered as a sequential stream. The stream is drained to the end.
pub struct StreamContent<R> {
    reader: R,
}

impl<R> StreamContent<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> ContentSource for StreamContent<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_all(&mut self) -> Result<Bytes, StorageError> {
        let mut buf = Vec::new();
        let read = self.reader.read_to_end(&mut buf).await?;
        debug!(bytes_read = read, "Drained content stream");
        Ok(Bytes::from(buf))
    }
}

/// A handle to a blob in a store; content is fetched on read.
pub struct StoredBlob<'a, S: ?Sized> {
    store: &'a S,
    name: String,
}

impl<'a, S> StoredBlob<'a, S>
where
    S: BlobStore + ?Sized,
{
    pub fn new(store: &'a S, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<'a, S> ContentSource for StoredBlob<'a, S>
where
    S: BlobStore + ?Sized,
{
    async fn read_all(&mut self) -> Result<Bytes, StorageError> {
        debug!(blob = %self.name, "Fetching source blob content");
        self.store.get(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockBlobStore;

    #[tokio::test]
    async fn buffer_content_returns_its_bytes_on_every_read() {
        let mut content = BufferContent::new(vec![1u8, 2, 3]);
        assert_eq!(content.read_all().await.unwrap(), Bytes::from_static(&[1, 2, 3]));
        assert_eq!(content.read_all().await.unwrap(), Bytes::from_static(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn stream_content_drains_reader() {
        let data: &[u8] = b"%PDF-1.7 streamed";
        let mut content = StreamContent::new(data);
        assert_eq!(content.read_all().await.unwrap(), Bytes::from_static(b"%PDF-1.7 streamed"));
    }

    #[tokio::test]
    async fn stored_blob_reads_through_store() {
        let mut store = MockBlobStore::new();
        store
            .expect_get()
            .withf(|name| name == "invoice.pdf")
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"pdf")));

        let mut content = StoredBlob::new(&store, "invoice.pdf");
        assert_eq!(content.name(), "invoice.pdf");
        assert_eq!(content.read_all().await.unwrap(), Bytes::from_static(b"pdf"));
    }

    #[tokio::test]
    async fn stored_blob_surfaces_store_errors() {
        let mut store = MockBlobStore::new();
        store
            .expect_get()
            .returning(|_| Err("connection reset".into()));

        let mut content = StoredBlob::new(&store, "invoice.pdf");
        let err = content.read_all().await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
