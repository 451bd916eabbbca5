#![allow(unused)]

//! # contract: collaborator interfaces for delivery and sidecar metadata
//!
//! This module defines the seams between the batch engine and the code that lives
//! outside it: the delivery channel a batch is posted to, and the optional sidecar
//! source that supplies a caption and tags for a media file.
//!
//! ## Interface & Extensibility
//! - Implement [`DeliveryChannel`] to post batches somewhere (webhook, chat API, local outbox).
//! - Implement [`SidecarSource`] to attach captions/tags read from wherever they are kept.
//! - Channel errors are classified with [`DeliveryError`] so the coordinator can tell a
//!   payload-too-large rejection apart from everything else.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; with the default `test-export-mocks` feature
//!   `MockDeliveryChannel` and `MockSidecarSource` are exported for integration tests.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use thiserror::Error;

use crate::catalog::MediaFile;

/// Opaque identifier the channel hands back for a delivered batch.
pub type CorrelationId = String;

/// Failure reported by a delivery channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The channel rejected the batch because it was too large (HTTP 413 or equivalent).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    /// The channel, or the message being addressed, does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Anything else: network errors, timeouts, unexpected responses.
    #[error("delivery failed: {0}")]
    Other(String),
}

/// Caption and tags attached to a media file by a sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidecar {
    pub caption: Option<String>,
    pub tags: BTreeSet<String>,
}

/// Trait for posting batches to an external channel and retracting them again.
///
/// Implementors own the wire format entirely; the coordinator only sees files, a
/// human-readable label and the returned correlation id.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Post every file in `batch` as a single message labelled `label`.
    async fn send(&self, batch: &[MediaFile], label: &str) -> Result<CorrelationId, DeliveryError>;

    /// Delete a previously sent message.
    ///
    /// Implementors should report a message that is already gone as [`DeliveryError::NotFound`];
    /// callers treat that as success.
    async fn delete_message(&self, correlation_id: &str) -> Result<(), DeliveryError>;
}

/// Source of optional per-file caption and tags.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait SidecarSource: Send + Sync {
    /// Look up the sidecar for a media file at `path`. Missing sidecars yield `None`.
    fn read(&self, path: &Path) -> Option<Sidecar>;
}
