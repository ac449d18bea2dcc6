//! Application context: the storage clients and copy options shared by every invocation.
//!
//! A [`Relay`] is built once at startup and handed to each invocation (CLI command or
//! webhook request). It owns no per-request state.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncRead;

use blob_relay_core::config::RelaySettings;
use blob_relay_core::content::{StoredBlob, StreamContent};
use blob_relay_core::contract::BlobStore;
use blob_relay_core::copy::{copy_all, copy_blob, CopyError, CopyOptions, CopyOutcome, CopyReport};
use blob_relay_core::trigger::BlobCreated;

use crate::load_config::RelayConfig;
use crate::storage::ObjectStoreBlobStore;

#[derive(Clone)]
pub struct Relay {
    source: Arc<dyn BlobStore>,
    destination: Arc<dyn BlobStore>,
    options: CopyOptions,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        settings: RelaySettings,
        source: Arc<dyn BlobStore>,
        destination: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            options: CopyOptions::from(&settings),
            source,
            destination,
            settings,
        }
    }

    /// Construct both container clients from a loaded config.
    pub fn connect(config: &RelayConfig) -> Result<Self> {
        let source =
            ObjectStoreBlobStore::connect(&config.connection, &config.settings.source_container)
                .map_err(|e| anyhow::anyhow!("Failed to connect to source container: {e}"))?;
        let destination = ObjectStoreBlobStore::connect(
            &config.connection,
            &config.settings.destination_container,
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to destination container: {e}"))?;
        Ok(Self::new(
            config.settings.clone(),
            Arc::new(source),
            Arc::new(destination),
        ))
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Copy a blob that is already stored in the source container.
    pub async fn copy_named(&self, name: &str) -> Result<CopyOutcome, CopyError> {
        let mut handle = StoredBlob::new(self.source.as_ref(), name);
        copy_blob(self.destination.as_ref(), &self.options, name, &mut handle).await
    }

    /// Copy content supplied as a stream under the name it has in the source container.
    pub async fn copy_stream<R>(&self, name: &str, reader: R) -> Result<CopyOutcome, CopyError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut content = StreamContent::new(reader);
        copy_blob(self.destination.as_ref(), &self.options, name, &mut content).await
    }

    /// Copy every blob named by one trigger delivery.
    pub async fn copy_created(&self, blobs: &[BlobCreated]) -> Result<CopyReport, CopyError> {
        copy_all(
            self.source.as_ref(),
            self.destination.as_ref(),
            &self.options,
            blobs,
        )
        .await
    }
}
