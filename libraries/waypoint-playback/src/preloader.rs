//! Background preloading
//!
//! Two phases, both best-effort:
//! - Assets: when a tour opens, the first narration is buffered, then every
//!   stop image is fetched in small concurrent batches
//! - Window: while playing, the next narration(s) are buffered ahead and
//!   anything outside the window is evicted after a debounce
//!
//! Failures are logged and never surface to playback. Requires a tokio
//! runtime for the debounced cleanup task.

use crate::backend::{MediaFetcher, PreloadHandle};
use crate::types::PreloadConfig;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use waypoint_core::{Stop, Tour};

/// Narrations to keep buffered around the current stop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadWindow {
    /// Narration of the current stop
    pub current: Option<String>,

    /// Narrations of the next audio stops, nearest first
    pub upcoming: Vec<String>,
}

impl PreloadWindow {
    /// URLs the cleanup pass must not evict
    pub fn keep_set(&self) -> HashSet<String> {
        self.current
            .iter()
            .chain(self.upcoming.iter())
            .cloned()
            .collect()
    }
}

/// Outcome of the asset phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetsReport {
    pub first_audio_ready: bool,
    pub images_loaded: usize,
    pub images_failed: usize,
}

struct PreloadEntry {
    handle: Option<Box<dyn PreloadHandle>>,
}

impl PreloadEntry {
    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

struct PreloaderInner {
    fetcher: Arc<dyn MediaFetcher>,
    config: PreloadConfig,
    entries: Mutex<HashMap<String, PreloadEntry>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
    assets_ready: AtomicBool,
}

/// Cheaply clonable handle to the shared preload cache
#[derive(Clone)]
pub struct Preloader {
    inner: Arc<PreloaderInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Preloader {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, config: PreloadConfig) -> Self {
        Self {
            inner: Arc::new(PreloaderInner {
                fetcher,
                config,
                entries: Mutex::new(HashMap::new()),
                cleanup_task: Mutex::new(None),
                assets_ready: AtomicBool::new(false),
            }),
        }
    }

    // ===== Audio =====

    /// Buffer one narration
    ///
    /// Returns true once the URL is buffered. A URL already buffered returns
    /// true immediately; one already in flight returns false without starting
    /// a second fetch. A fetch evicted while in flight is released on arrival.
    pub async fn preload(&self, url: &str) -> bool {
        {
            let mut entries = lock(&self.inner.entries);
            match entries.get(url) {
                Some(entry) if entry.is_loaded() => return true,
                Some(_) => {
                    debug!("Preload of {} already in flight", url);
                    return false;
                }
                None => {
                    entries.insert(url.to_string(), PreloadEntry { handle: None });
                }
            }
        }

        match self.inner.fetcher.buffer_audio(url).await {
            Ok(mut handle) => {
                let mut entries = lock(&self.inner.entries);
                if let Some(entry) = entries.get_mut(url) {
                    entry.handle = Some(handle);
                    debug!("Preloaded {}", url);
                    true
                } else {
                    debug!("Preload of {} evicted while loading", url);
                    handle.release();
                    false
                }
            }
            Err(e) => {
                warn!("Preload of {} failed: {}", url, e);
                lock(&self.inner.entries).remove(url);
                false
            }
        }
    }

    /// Buffer the upcoming narrations of `window` and schedule eviction of
    /// everything else
    ///
    /// Returns how many upcoming narrations are buffered.
    pub async fn warm_window(&self, window: &PreloadWindow) -> usize {
        self.schedule_cleanup(window.keep_set());

        let upcoming = window
            .upcoming
            .iter()
            .take(self.inner.config.preload_count)
            .map(|url| self.preload(url));
        join_all(upcoming).await.into_iter().filter(|ok| *ok).count()
    }

    /// Evict every entry not in `keep`, returning how many were dropped
    pub fn cleanup(&self, keep: &HashSet<String>) -> usize {
        let mut entries = lock(&self.inner.entries);
        let evict: Vec<String> = entries
            .keys()
            .filter(|url| !keep.contains(*url))
            .cloned()
            .collect();

        for url in &evict {
            if let Some(mut entry) = entries.remove(url) {
                entry.release();
            }
        }
        if !evict.is_empty() {
            debug!("Evicted {} preloaded narration(s)", evict.len());
        }
        evict.len()
    }

    /// Run [`cleanup`](Self::cleanup) after the debounce, replacing any
    /// cleanup still pending
    pub fn schedule_cleanup(&self, keep: HashSet<String>) {
        let preloader = self.clone();
        let delay = self.inner.config.cleanup_debounce();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            preloader.cleanup(&keep);
        });

        if let Some(previous) = lock(&self.inner.cleanup_task).replace(task) {
            previous.abort();
        }
    }

    pub fn is_preloaded(&self, url: &str) -> bool {
        lock(&self.inner.entries)
            .get(url)
            .is_some_and(PreloadEntry::is_loaded)
    }

    /// Hand a buffered narration over to the caller
    pub fn get_preloaded(&self, url: &str) -> Option<Box<dyn PreloadHandle>> {
        let mut entries = lock(&self.inner.entries);
        if !entries.get(url).is_some_and(PreloadEntry::is_loaded) {
            return None;
        }
        entries.remove(url).and_then(|mut entry| entry.handle.take())
    }

    /// Number of tracked entries, in flight included
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ===== Assets =====

    /// Buffer the first narration, then fetch every stop image in batches
    ///
    /// Marks the assets phase done even when fetches fail. A tour without
    /// audio stops skips the image phase.
    pub async fn preload_tour_assets(&self, tour: &Tour) -> AssetsReport {
        let mut report = AssetsReport::default();

        let Some(first) = tour.first_audio_stop() else {
            warn!("Tour {} has no audio stops, skipping asset preload", tour.id);
            self.inner.assets_ready.store(true, Ordering::SeqCst);
            return report;
        };
        report.first_audio_ready = self.preload(&first.audio_file).await;

        let images: Vec<&str> = tour.stops.iter().filter_map(Stop::image).collect();
        for batch in images.chunks(self.inner.config.image_batch_size.max(1)) {
            let results = join_all(batch.iter().map(|url| self.inner.fetcher.load_image(url))).await;
            for (url, result) in batch.iter().zip(results) {
                match result {
                    Ok(()) => report.images_loaded += 1,
                    Err(e) => {
                        warn!("Image {} failed to load: {}", url, e);
                        report.images_failed += 1;
                    }
                }
            }
        }

        info!(
            "Assets for tour {} ready ({} images, {} failed)",
            tour.id, report.images_loaded, report.images_failed
        );
        self.inner.assets_ready.store(true, Ordering::SeqCst);
        report
    }

    /// Whether the asset phase has finished
    pub fn assets_ready(&self) -> bool {
        self.inner.assets_ready.load(Ordering::SeqCst)
    }

    // ===== Lifecycle =====

    /// Cancel the pending cleanup and release every buffered narration
    pub fn dispose(&self) {
        if let Some(task) = lock(&self.inner.cleanup_task).take() {
            task.abort();
        }
        let mut entries = lock(&self.inner.entries);
        for entry in entries.values_mut() {
            entry.release();
        }
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_set_includes_current_and_upcoming() {
        let window = PreloadWindow {
            current: Some("a.mp3".to_string()),
            upcoming: vec!["c.mp3".to_string()],
        };
        let keep = window.keep_set();
        assert_eq!(keep.len(), 2);
        assert!(keep.contains("a.mp3"));
        assert!(keep.contains("c.mp3"));
    }
}
