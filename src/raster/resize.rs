//! Resize strategies for placing an image inside a target box.
//!
//! ```text
//!  clip:    fit inside, keep aspect      crop:   fill box, keep aspect     stretch: fill exactly
//!  ┌──────────┐                          ┌──────────┐                      ┌──────────┐
//!  │ ┌──────┐ │                        ┌─┼──────────┼─┐                    │██████████│
//!  │ │██████│ │                        │█│██████████│█│                    │██████████│
//!  │ └──────┘ │                        └─┼──────────┼─┘                    │██████████│
//!  └──────────┘                          └──────────┘                      └──────────┘
//! ```
//!
//! A zero target dimension means "derive it from the other one and the source
//! aspect ratio".

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    #[default]
    Clip,
    Crop,
    Stretch,
}

/// Output dimensions for resizing a `src_w × src_h` image into `w × h`.
pub fn target_size(mode: ResizeMode, src_w: u32, src_h: u32, w: u32, h: u32) -> (u32, u32) {
    let ratio = src_w.max(1) as f64 / src_h.max(1) as f64;
    let by_height = |h: u32| (((h as f64) * ratio).round() as u32, h);
    let by_width = |w: u32| (w, ((w as f64) / ratio).round() as u32);

    let (tw, th) = match (w, h) {
        (0, 0) => (src_w, src_h),
        (0, h) => by_height(h),
        (w, 0) => by_width(w),
        (w, h) => {
            let box_ratio = w as f64 / h as f64;
            match mode {
                ResizeMode::Stretch => (w, h),
                ResizeMode::Clip if box_ratio > ratio => by_height(h),
                ResizeMode::Clip => by_width(w),
                ResizeMode::Crop if box_ratio < ratio => by_height(h),
                ResizeMode::Crop => by_width(w),
            }
        }
    };
    (tw.max(1), th.max(1))
}

/// Resize `src` into a `w × h` box with the given strategy (Lanczos3).
pub fn resize(src: &RgbaImage, w: u32, h: u32, mode: ResizeMode) -> RgbaImage {
    let (tw, th) = target_size(mode, src.width(), src.height(), w, h);
    resize_exact(src, tw, th)
}

/// Resample to exactly `w × h`, skipping the work when nothing changes.
pub fn resize_exact(src: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    if src.width() == w && src.height() == h {
        return src.clone();
    }
    imageops::resize(src, w.max(1), h.max(1), FilterType::Lanczos3)
}
