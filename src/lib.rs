#![doc = "batchcast: core logic for periodic, size-bounded media batch delivery."]

//! This crate selects batches of media files from a pending folder, hands them to a
//! delivery channel, archives what was delivered and keeps the ledgers needed to
//! exclude, rate and undo those deliveries.
//!
//! Transport details (webhooks, chat APIs) live behind [`contract::DeliveryChannel`];
//! the CLI crate provides a concrete implementation.
//!
//! # Usage
//! Build an [`coordinator::UploadCoordinator`] from a [`config::BatchConfig`] and a channel,
//! then call `run_cycle`, `undo_last`, `queue_status` and friends, or hand it to a
//! [`scheduler::Scheduler`].

pub mod catalog;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod ratings;
pub mod schedule;
pub mod scheduler;
pub mod select;
pub mod sidecar;
pub mod status;
pub mod store;
pub mod undo;

pub use error::{BatchError, BatchResult};
