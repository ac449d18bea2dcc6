//! Copy handler: moves one newly uploaded blob into the processed container.
//!
//! For every source blob the handler
//!   - reads the complete content from a [`ContentSource`] (buffer, stream or stored blob)
//!   - derives the destination name from the configured prefix
//!   - skips the write when the destination already exists (unless disabled)
//!   - writes the content byte-for-byte to the destination [`BlobStore`]
//!
//! # Error Handling
//! Read, existence-check and write failures are logged with the source name and
//! returned as [`CopyError`]. There is no local retry; redelivery is the trigger
//! layer's job.
//!
//! # Concurrency
//! The existence check and the write are two requests. Two invocations for the same
//! name may both observe "absent" and both write; the content is identical so the
//! second write is harmless.

use std::fmt;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{error, info};

use crate::config::RelaySettings;
use crate::content::StoredBlob;
use crate::contract::{BlobStore, ContentSource, StorageError};
use crate::naming::DestinationNaming;
use crate::trigger::BlobCreated;

/// Upper bound on copies in flight for one trigger delivery.
pub const MAX_CONCURRENT_COPIES: usize = 16;

/// Per-deployment behaviour of the copy handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    pub naming: DestinationNaming,
    pub skip_existing: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            naming: DestinationNaming::default(),
            skip_existing: true,
        }
    }
}

impl From<&RelaySettings> for CopyOptions {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            naming: settings.naming(),
            skip_existing: settings.skip_existing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CopyStatus {
    Copied,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    pub source_name: String,
    pub destination_name: String,
    pub size: usize,
    pub status: CopyStatus,
}

/// Outcomes of one trigger delivery that named several blobs.
#[derive(Debug, Default, Serialize)]
pub struct CopyReport {
    pub outcomes: Vec<CopyOutcome>,
}

impl CopyReport {
    pub fn copied(&self) -> usize {
        self.count(CopyStatus::Copied)
    }

    pub fn skipped(&self) -> usize {
        self.count(CopyStatus::AlreadyExists)
    }

    fn count(&self, status: CopyStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

#[derive(Debug)]
pub enum CopyError {
    InvalidName,
    Read {
        source_name: String,
        error: StorageError,
    },
    ExistenceCheck {
        source_name: String,
        destination_name: String,
        error: StorageError,
    },
    Write {
        source_name: String,
        destination_name: String,
        error: StorageError,
    },
}

impl CopyError {
    pub fn source_name(&self) -> Option<&str> {
        match self {
            CopyError::InvalidName => None,
            CopyError::Read { source_name, .. }
            | CopyError::ExistenceCheck { source_name, .. }
            | CopyError::Write { source_name, .. } => Some(source_name),
        }
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyError::InvalidName => write!(f, "source blob name is empty"),
            CopyError::Read { source_name, error } => {
                write!(f, "failed to read source blob {source_name}: {error}")
            }
            CopyError::ExistenceCheck {
                destination_name,
                error,
                ..
            } => write!(
                f,
                "failed to check whether {destination_name} exists: {error}"
            ),
            CopyError::Write {
                source_name,
                destination_name,
                error,
            } => write!(
                f,
                "failed to copy {source_name} to {destination_name}: {error}"
            ),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CopyError::InvalidName => None,
            CopyError::Read { error, .. }
            | CopyError::ExistenceCheck { error, .. }
            | CopyError::Write { error, .. } => Some(&**error),
        }
    }
}

/// Copy one source blob into `destination` under its derived name.
pub async fn copy_blob<D, C>(
    destination: &D,
    options: &CopyOptions,
    source_name: &str,
    content: &mut C,
) -> Result<CopyOutcome, CopyError>
where
    D: BlobStore + ?Sized,
    C: ContentSource + ?Sized,
{
    if source_name.trim().is_empty() {
        error!("Rejecting copy request without a source blob name");
        return Err(CopyError::InvalidName);
    }

    let bytes = match content.read_all().await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(blob = %source_name, error = %e, "Error processing blob: read failed");
            return Err(CopyError::Read {
                source_name: source_name.to_string(),
                error: e,
            });
        }
    };
    let size = bytes.len();
    info!(blob = %source_name, size, "Blob trigger received blob");

    let destination_name = options.naming.destination_for(source_name);

    if options.skip_existing {
        if let Some(outcome) =
            existing_destination(destination, source_name, &destination_name, size).await?
        {
            return Ok(outcome);
        }
    }

    info!(destination = %destination_name, "Starting copy operation");
    if let Err(e) = destination.put(&destination_name, bytes).await {
        error!(
            blob = %source_name,
            destination = %destination_name,
            error = %e,
            "Error processing blob: write failed"
        );
        return Err(CopyError::Write {
            source_name: source_name.to_string(),
            destination_name,
            error: e,
        });
    }

    info!(blob = %source_name, destination = %destination_name, size, "Copy complete");
    Ok(CopyOutcome {
        source_name: source_name.to_string(),
        destination_name,
        size,
        status: CopyStatus::Copied,
    })
}

/// `Some` when the destination is already present and the copy should be skipped.
async fn existing_destination<D>(
    destination: &D,
    source_name: &str,
    destination_name: &str,
    size: usize,
) -> Result<Option<CopyOutcome>, CopyError>
where
    D: BlobStore + ?Sized,
{
    match destination.exists(destination_name).await {
        Ok(true) => {
            info!(
                blob = %source_name,
                destination = %destination_name,
                size,
                "Destination blob already exists, skipping copy"
            );
            Ok(Some(CopyOutcome {
                source_name: source_name.to_string(),
                destination_name: destination_name.to_string(),
                size,
                status: CopyStatus::AlreadyExists,
            }))
        }
        Ok(false) => Ok(None),
        Err(e) => {
            error!(
                blob = %source_name,
                destination = %destination_name,
                error = %e,
                "Error processing blob: existence check failed"
            );
            Err(CopyError::ExistenceCheck {
                source_name: source_name.to_string(),
                destination_name: destination_name.to_string(),
                error: e,
            })
        }
    }
}

/// Copy one blob named by a trigger event, reading it from `source`.
///
/// When the event carries the blob size, the existence check runs before the
/// download, so a redelivered event costs one metadata request.
pub async fn copy_created_blob<S, D>(
    source: &S,
    destination: &D,
    options: &CopyOptions,
    blob: &BlobCreated,
) -> Result<CopyOutcome, CopyError>
where
    S: BlobStore + ?Sized,
    D: BlobStore + ?Sized,
{
    let mut handle = StoredBlob::new(source, blob.name.clone());
    let known_size = blob
        .content_length
        .and_then(|len| usize::try_from(len).ok());

    match known_size {
        Some(size) if options.skip_existing && !blob.name.trim().is_empty() => {
            let destination_name = options.naming.destination_for(&blob.name);
            if let Some(outcome) =
                existing_destination(destination, &blob.name, &destination_name, size).await?
            {
                return Ok(outcome);
            }
            let checked = CopyOptions {
                skip_existing: false,
                ..options.clone()
            };
            copy_blob(destination, &checked, &blob.name, &mut handle).await
        }
        _ => copy_blob(destination, options, &blob.name, &mut handle).await,
    }
}

/// Copy every blob named by a trigger delivery, reading each from `source`.
///
/// At most [`MAX_CONCURRENT_COPIES`] copies run at once and outcomes keep the event
/// order. The first failure aborts the delivery so the trigger layer redelivers it
/// as a whole. Blobs already copied are skipped on redelivery.
pub async fn copy_all<S, D>(
    source: &S,
    destination: &D,
    options: &CopyOptions,
    blobs: &[BlobCreated],
) -> Result<CopyReport, CopyError>
where
    S: BlobStore + ?Sized,
    D: BlobStore + ?Sized,
{
    info!(count = blobs.len(), "Relaying created blobs");
    let copies: Vec<_> = blobs
        .iter()
        .map(|blob| copy_created_blob(source, destination, options, blob))
        .collect();
    let outcomes = stream::iter(copies)
        .buffered(MAX_CONCURRENT_COPIES)
        .try_collect::<Vec<_>>()
        .await?;
    let report = CopyReport { outcomes };
    info!(
        copied = report.copied(),
        skipped = report.skipped(),
        "Relayed created blobs"
    );
    Ok(report)
}
