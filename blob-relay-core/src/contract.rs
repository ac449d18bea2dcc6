//! # contract: storage and content interfaces for the copy handler
//!
//! This module defines the two seams of the copy handler:
//!
//! - [`BlobStore`]: a single storage container that can answer existence checks,
//!   return a blob's bytes, and accept a write. Real clients (Azure Blob Storage,
//!   the local emulator, an in-memory store) and test mocks implement it.
//! - [`ContentSource`]: anything that can hand over the full bytes of a source blob.
//!   Buffers, streams and stored-blob handles all implement it (see [`crate::content`]).
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`, so consumers can generate deterministic
//!   mocks with the `test-export-mocks` feature.
//!
//! ## Errors
//! - All storage errors are boxed trait objects ([`StorageError`]); the copy handler
//!   wraps them into its own error type together with the failing step.

use async_trait::async_trait;
use bytes::Bytes;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error type for storage and content operations.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// One storage container, addressed by blob name.
///
/// Implementations are constructed once per process and shared between invocations,
/// so they must not hold per-request mutable state.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether a blob with this name is present in the container.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Read the full content of a blob.
    async fn get(&self, name: &str) -> Result<Bytes, StorageError>;

    /// Write a blob, replacing any existing blob with the same name.
    async fn put(&self, name: &str, content: Bytes) -> Result<(), StorageError>;
}

/// The "read bytes" capability of a source blob, independent of how the trigger
/// runtime delivered it.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentSource: Send {
    /// Read the complete content. Called once per invocation.
    async fn read_all(&mut self) -> Result<Bytes, StorageError>;
}
