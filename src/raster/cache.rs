//! # Resize Cache
//!
//! Memoizes resampled rasters keyed by target size and a variant flag
//! (default vs. promotional artwork). Entries live as long as the owner and
//! are never evicted; the key space is bounded by the handful of widths a
//! template allows.
//!
//! ```text
//! lookup ──lock──► hit?  ──yes──► Arc clone
//!                   │no
//!                unlock ─► resize (no lock held) ─► lock ─► insert-if-absent ─► Arc
//! ```
//!
//! Two renders that miss the same key concurrently may both resample; the
//! first insert wins and the loser adopts the stored value, so the map holds
//! exactly one raster per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;
use tracing::debug;

use super::resize::{ResizeMode, resize};

/// `(width, height, variant)`
pub type CacheKey = (u32, u32, bool);

#[derive(Debug, Default)]
pub struct ResizeCache {
    mode: ResizeMode,
    entries: Mutex<HashMap<CacheKey, Arc<RgbaImage>>>,
}

impl ResizeCache {
    /// A cache whose misses resample with `mode`.
    pub fn new(mode: ResizeMode) -> Self {
        Self {
            mode,
            entries: Mutex::default(),
        }
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `original` resampled into `width × height`, computing it at most
    /// once per `(width, height, variant)` in the steady state.
    pub fn get_resized(
        &self,
        original: &RgbaImage,
        width: u32,
        height: u32,
        variant: bool,
    ) -> Arc<RgbaImage> {
        let key = (width, height, variant);
        if let Some(hit) = self.lock().get(&key) {
            return Arc::clone(hit);
        }

        debug!(width, height, variant, "resize cache miss");
        let resized = Arc::new(resize(original, width, height, self.mode));

        let mut entries = self.lock();
        Arc::clone(entries.entry(key).or_insert(resized))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<RgbaImage>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
