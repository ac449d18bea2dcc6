#![doc = "Blob store integration: bridges the core `BlobStore` trait to `object_store` containers."]
//
//! # Storage Integration (CLI <-> Core)
//!
//! This module wires the [`BlobStore`] trait from `blob-relay-core` to real storage:
//!
//! - Azure Blob Storage, authenticated by account key, SAS token or managed identity
//! - the local storage emulator, selected by `UseDevelopmentStorage=true`
//! - an in-memory container, used by tests and dry runs
//!
//! One [`ObjectStoreBlobStore`] addresses exactly one container. Construct it once per
//! process and share it; the underlying client pools its connections.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

use blob_relay_core::connection::StorageConnection;
use blob_relay_core::contract::{BlobStore, StorageError};

pub struct ObjectStoreBlobStore {
    container: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBlobStore {
    pub fn new(container: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            container: container.into(),
            store,
        }
    }

    pub fn in_memory(container: impl Into<String>) -> Self {
        Self::new(container, Arc::new(InMemory::new()))
    }

    /// Build a client for `container` in the account described by `connection`.
    pub fn connect(
        connection: &StorageConnection,
        container: &str,
    ) -> Result<Self, StorageError> {
        let builder = azure_builder(connection)?.with_container_name(container);
        let store = builder.build().map_err(|e| {
            tracing::error!(error = %e, container, "Failed to construct blob storage client");
            e
        })?;
        tracing::info!(
            account = connection.account(),
            container,
            emulator = connection.is_emulator(),
            "Initialized blob storage client"
        );
        Ok(Self::new(container, Arc::new(store)))
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

fn azure_builder(connection: &StorageConnection) -> Result<MicrosoftAzureBuilder, StorageError> {
    if connection.is_emulator() {
        return Ok(MicrosoftAzureBuilder::new()
            .with_use_emulator(true)
            .with_allow_http(true));
    }

    let endpoint = connection.blob_endpoint()?;
    let account = connection.account();
    let mut builder = MicrosoftAzureBuilder::new().with_account(account);

    let default_endpoint = format!("https://{account}.blob.core.windows.net/");
    if endpoint.as_str() != default_endpoint {
        builder = builder
            .with_endpoint(endpoint.as_str().trim_end_matches('/').to_string())
            .with_allow_http(endpoint.scheme() == "http");
    }

    if let StorageConnection::ConnectionString(cs) = connection {
        if let Some(key) = &cs.account_key {
            builder = builder.with_access_key(key);
        }
        if let Some(sas) = &cs.sas_token {
            builder = builder.with_config(AzureConfigKey::SasKey, sas.trim_start_matches('?'));
        }
    }
    // Without a key or SAS token the builder falls back to managed identity.
    Ok(builder)
}

/// Blob names are used verbatim as object keys. `Path::from` would percent-encode them.
fn blob_path(container: &str, name: &str) -> Result<Path, StorageError> {
    Path::parse(name).map_err(|e| {
        tracing::error!(error = %e, container, blob = name, "Blob name is not a valid object key");
        Box::new(e) as StorageError
    })
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = blob_path(&self.container, name)?;
        match self.store.head(&path).await {
            Ok(meta) => {
                tracing::debug!(container = %self.container, blob = name, size = meta.size, "Blob exists");
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => {
                tracing::error!(error = %e, container = %self.container, blob = name, "Failed to fetch blob properties");
                Err(Box::new(e))
            }
        }
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let path = blob_path(&self.container, name)?;
        let result = self.store.get(&path).await.map_err(|e| {
            tracing::error!(error = %e, container = %self.container, blob = name, "Failed to open blob");
            e
        })?;
        let bytes = result.bytes().await?;
        tracing::debug!(container = %self.container, blob = name, size = bytes.len(), "Read blob");
        Ok(bytes)
    }

    async fn put(&self, name: &str, content: Bytes) -> Result<(), StorageError> {
        let size = content.len();
        let path = blob_path(&self.container, name)?;
        match self.store.put(&path, PutPayload::from(content)).await {
            Ok(_) => {
                tracing::info!(container = %self.container, blob = name, size, "Uploaded blob");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, container = %self.container, blob = name, "Failed to upload blob");
                Err(Box::new(e))
            }
        }
    }
}
