#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchcast::catalog::{FileCatalog, MediaFile};
use batchcast::config::{MediaExtensions, OrderMode};
use batchcast::contract::{DeliveryChannel, DeliveryError, MockDeliveryChannel};
use batchcast::coordinator::{CycleSettings, UploadCoordinator};
use batchcast::select::Budget;
use batchcast::store::JsonStore;

pub fn settings(budget: Budget) -> CycleSettings {
    CycleSettings {
        budget,
        order: OrderMode::Name,
        archive_retention: Duration::from_secs(3 * 24 * 60 * 60),
        delivery_timeout: Duration::from_secs(5),
    }
}

pub fn coordinator<C: DeliveryChannel>(root: &Path, budget: Budget, channel: C) -> UploadCoordinator<C> {
    let catalog = FileCatalog::new(root.join("media"), root.join("archive"), MediaExtensions::default());
    catalog.ensure_dirs().unwrap();
    UploadCoordinator::new(
        settings(budget),
        catalog,
        JsonStore::new(root.join("upload_history.json")),
        JsonStore::new(root.join("media_ratings.json")),
        channel,
    )
}

/// Write `count` files named `{prefix}{i:02}.{ext}` of `size` bytes into the pending folder.
pub fn seed(root: &Path, prefix: &str, ext: &str, count: usize, size: usize) -> Vec<String> {
    let dir = root.join("media");
    fs::create_dir_all(&dir).unwrap();
    (0..count)
        .map(|i| {
            let name = format!("{prefix}{i:02}.{ext}");
            fs::write(dir.join(&name), vec![0u8; size]).unwrap();
            name
        })
        .collect()
}

pub fn pending(root: &Path, name: &str) -> bool {
    root.join("media").join(name).is_file()
}

pub fn archived(root: &Path, name: &str) -> bool {
    root.join("archive").join(name).is_file()
}

/// A mock channel that answers each `send` from `responses` in order and records the labels it saw.
pub fn scripted_channel(
    responses: Vec<Result<String, DeliveryError>>,
) -> (MockDeliveryChannel, Arc<Mutex<Vec<(String, usize)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let responses = Arc::new(Mutex::new(responses.into_iter()));
    let mut channel = MockDeliveryChannel::new();
    channel
        .expect_send()
        .returning(move |batch: &[MediaFile], label: &str| {
            seen.lock().unwrap().push((label.to_string(), batch.len()));
            responses
                .lock()
                .unwrap()
                .next()
                .expect("more sends than scripted responses")
        });
    (channel, calls)
}
