//! Batch selection strategies.
//!
//! All three strategies are pure functions over an in-memory snapshot of the pending
//! pools. None of them fail: empty pools, or pools where nothing fits, give an empty
//! batch. A file larger than the whole budget is never admitted.

use rand::seq::SliceRandom;

use crate::catalog::{MediaFile, MediaKind, PendingPools};
use crate::config::OrderMode;

/// Count targets and a byte ceiling for one selection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub target_images: usize,
    pub target_videos: usize,
    pub max_size_bytes: u64,
}

impl Budget {
    pub fn new(target_images: usize, target_videos: usize, max_size_bytes: u64) -> Self {
        Self {
            target_images,
            target_videos,
            max_size_bytes,
        }
    }

    /// Same targets, byte ceiling multiplied by `factor` and floored.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            max_size_bytes: (self.max_size_bytes as f64 * factor).floor() as u64,
            ..*self
        }
    }
}

/// Which selection function a degrade tier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ordered,
    SmartFit,
    Reduced,
}

/// Dispatch to the strategy's selection function.
pub fn select(strategy: Strategy, pools: &PendingPools, budget: &Budget, order: OrderMode) -> Vec<MediaFile> {
    match strategy {
        Strategy::Ordered => ordered_select(&pools.images, &pools.videos, budget, order),
        Strategy::SmartFit => smart_fit(&pools.images, &pools.videos, budget),
        Strategy::Reduced => reduced_select(&pools.images, &pools.videos, budget),
    }
}

pub fn total_size(batch: &[MediaFile]) -> u64 {
    batch.iter().map(|f| f.size_bytes).sum()
}

pub fn count_kind(batch: &[MediaFile], kind: MediaKind) -> usize {
    batch.iter().filter(|f| f.kind == kind).count()
}

fn order_pool<'a>(pool: &'a [MediaFile], order: OrderMode) -> Vec<&'a MediaFile> {
    let mut ordered: Vec<&MediaFile> = pool.iter().collect();
    match order {
        OrderMode::Random => ordered.shuffle(&mut rand::thread_rng()),
        OrderMode::Name => ordered.sort_by(|a, b| a.filename.cmp(&b.filename)),
        OrderMode::None => {}
    }
    ordered
}

fn by_size<'a>(pool: impl IntoIterator<Item = &'a MediaFile>) -> Vec<&'a MediaFile> {
    let mut sorted: Vec<&MediaFile> = pool.into_iter().collect();
    sorted.sort_by_key(|f| f.size_bytes);
    sorted
}

/// Greedy admission: walk `candidates`, taking up to `limit` files whose size still fits.
/// A file that does not fit is skipped and the walk continues.
fn admit(
    candidates: &[&MediaFile],
    limit: usize,
    max_size_bytes: u64,
    total: &mut u64,
    batch: &mut Vec<MediaFile>,
) {
    let mut taken = 0;
    for file in candidates {
        if taken == limit {
            break;
        }
        match total.checked_add(file.size_bytes) {
            Some(next) if next <= max_size_bytes => {
                *total = next;
                batch.push((*file).clone());
                taken += 1;
            }
            _ => {}
        }
    }
}

fn fill_by_kind(images: &[&MediaFile], videos: &[&MediaFile], budget: &Budget) -> Vec<MediaFile> {
    let mut batch = Vec::new();
    let mut total = 0;
    admit(images, budget.target_images, budget.max_size_bytes, &mut total, &mut batch);
    admit(videos, budget.target_videos, budget.max_size_bytes, &mut total, &mut batch);
    batch
}

/// Nominal selection: order each pool by `order`, then fill images first, videos second.
pub fn ordered_select(
    images: &[MediaFile],
    videos: &[MediaFile],
    budget: &Budget,
    order: OrderMode,
) -> Vec<MediaFile> {
    let images = order_pool(images, order);
    let videos = order_pool(videos, order);
    fill_by_kind(&images, &videos, budget)
}

/// Size-aware selection for a tighter budget.
///
/// Keeps the pools' own order when that already reaches both count targets (capped at the
/// pool sizes) within budget; otherwise fills smallest-first.
pub fn smart_fit(images: &[MediaFile], videos: &[MediaFile], budget: &Budget) -> Vec<MediaFile> {
    let as_listed = fill_by_kind(
        &images.iter().collect::<Vec<_>>(),
        &videos.iter().collect::<Vec<_>>(),
        budget,
    );
    let wanted_images = budget.target_images.min(images.len());
    let wanted_videos = budget.target_videos.min(videos.len());
    if count_kind(&as_listed, MediaKind::Image) == wanted_images
        && count_kind(&as_listed, MediaKind::Video) == wanted_videos
    {
        return as_listed;
    }

    fill_by_kind(&by_size(images), &by_size(videos), budget)
}

/// Last-resort selection: ignore kinds and targets, admit smallest-first until nothing fits.
pub fn reduced_select(images: &[MediaFile], videos: &[MediaFile], budget: &Budget) -> Vec<MediaFile> {
    let all = by_size(images.iter().chain(videos.iter()));
    let mut batch = Vec::new();
    let mut total = 0;
    admit(&all, usize::MAX, budget.max_size_bytes, &mut total, &mut batch);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Location;
    use crate::config::BYTES_PER_MB;
    use std::path::PathBuf;

    fn file(name: &str, kind: MediaKind, size: u64) -> MediaFile {
        MediaFile {
            filename: name.to_string(),
            kind,
            size_bytes: size,
            location: Location::Pending,
            path: PathBuf::from(name),
        }
    }

    fn images(sizes: &[u64]) -> Vec<MediaFile> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, s)| file(&format!("img{i:02}.png"), MediaKind::Image, *s))
            .collect()
    }

    fn videos(sizes: &[u64]) -> Vec<MediaFile> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, s)| file(&format!("vid{i:02}.mp4"), MediaKind::Video, *s))
            .collect()
    }

    fn names(batch: &[MediaFile]) -> Vec<&str> {
        batch.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn nominal_by_name_stops_admitting_videos_at_the_ceiling() {
        let imgs = images(&[BYTES_PER_MB; 5]);
        let vids = videos(&[4 * BYTES_PER_MB; 10]);
        let budget = Budget::new(3, 7, 25 * BYTES_PER_MB);

        let batch = ordered_select(&imgs, &vids, &budget, OrderMode::Name);

        assert_eq!(count_kind(&batch, MediaKind::Image), 3);
        assert_eq!(count_kind(&batch, MediaKind::Video), 5);
        assert_eq!(total_size(&batch), 23 * BYTES_PER_MB);
        assert_eq!(
            names(&batch),
            vec!["img00.png", "img01.png", "img02.png", "vid00.mp4", "vid01.mp4", "vid02.mp4", "vid03.mp4", "vid04.mp4"]
        );
    }

    #[test]
    fn nominal_keeps_scanning_past_a_file_that_does_not_fit() {
        let imgs = images(&[]);
        let vids = videos(&[8, 50, 3]);
        let budget = Budget::new(0, 3, 12);

        let batch = ordered_select(&imgs, &vids, &budget, OrderMode::None);

        assert_eq!(names(&batch), vec!["vid00.mp4", "vid02.mp4"]);
    }

    #[test]
    fn nominal_fills_images_before_videos() {
        let imgs = images(&[6, 6]);
        let vids = videos(&[6]);
        let budget = Budget::new(2, 1, 12);

        let batch = ordered_select(&imgs, &vids, &budget, OrderMode::None);

        assert_eq!(count_kind(&batch, MediaKind::Image), 2);
        assert_eq!(count_kind(&batch, MediaKind::Video), 0);
    }

    #[test]
    fn every_strategy_respects_budget_and_never_admits_oversized_files() {
        let imgs = images(&[1, 40, 7, 3, 100, 2]);
        let vids = videos(&[9, 11, 101, 5, 4]);
        for max in [0, 1, 5, 17, 30, 99, 1000] {
            let budget = Budget::new(2, 3, max);
            for order in [OrderMode::Random, OrderMode::Name, OrderMode::None] {
                let batch = ordered_select(&imgs, &vids, &budget, order);
                assert!(total_size(&batch) <= max);
                assert!(count_kind(&batch, MediaKind::Image) <= 2);
                assert!(count_kind(&batch, MediaKind::Video) <= 3);
            }
            let batch = smart_fit(&imgs, &vids, &budget);
            assert!(total_size(&batch) <= max);
            assert!(count_kind(&batch, MediaKind::Image) <= 2);
            assert!(count_kind(&batch, MediaKind::Video) <= 3);
            assert!(total_size(&reduced_select(&imgs, &vids, &budget)) <= max);
        }
    }

    #[test]
    fn random_order_picks_the_target_count_when_everything_fits() {
        let imgs = images(&[1; 10]);
        let vids = videos(&[1; 10]);
        let budget = Budget::new(3, 4, 1000);

        let batch = ordered_select(&imgs, &vids, &budget, OrderMode::Random);

        assert_eq!(count_kind(&batch, MediaKind::Image), 3);
        assert_eq!(count_kind(&batch, MediaKind::Video), 4);
    }

    #[test]
    fn empty_pools_yield_empty_batches() {
        let budget = Budget::new(3, 7, 1000);
        assert!(ordered_select(&[], &[], &budget, OrderMode::Name).is_empty());
        assert!(smart_fit(&[], &[], &budget).is_empty());
        assert!(reduced_select(&[], &[], &budget).is_empty());
    }

    #[test]
    fn smart_fit_keeps_listed_order_when_it_already_meets_targets() {
        let imgs = images(&[5, 1, 2]);
        let vids = videos(&[4, 3]);
        let budget = Budget::new(2, 2, 100);

        let batch = smart_fit(&imgs, &vids, &budget);

        assert_eq!(names(&batch), vec!["img00.png", "img01.png", "vid00.mp4", "vid01.mp4"]);
    }

    #[test]
    fn smart_fit_falls_back_to_smallest_first() {
        let imgs = images(&[9, 1, 2]);
        let vids = videos(&[8, 3, 4]);
        let budget = Budget::new(2, 2, 10);

        let batch = smart_fit(&imgs, &vids, &budget);

        assert_eq!(names(&batch), vec!["img01.png", "img02.png", "vid01.mp4", "vid02.mp4"]);
        assert_eq!(total_size(&batch), 10);
    }

    #[test]
    fn reduced_ignores_count_targets() {
        let imgs = images(&[1; 5]);
        let vids = videos(&[1; 5]);
        let budget = Budget::new(3, 3, 100);

        let batch = reduced_select(&imgs, &vids, &budget);

        assert_eq!(batch.len(), 10);
    }

    #[test]
    fn reduced_prefers_the_smallest_files() {
        let imgs = images(&[5, 1]);
        let vids = videos(&[2, 7]);
        let budget = Budget::new(0, 0, 8);

        let batch = reduced_select(&imgs, &vids, &budget);

        assert_eq!(names(&batch), vec!["img01.png", "vid00.mp4", "img00.png"]);
    }

    #[test]
    fn scaled_budget_floors() {
        let b = Budget::new(3, 7, 25).scaled(0.8);
        assert_eq!(b.max_size_bytes, 20);
        assert_eq!(Budget::new(1, 1, 11).scaled(0.6).max_size_bytes, 6);
        assert_eq!(b.target_images, 3);
    }
}
