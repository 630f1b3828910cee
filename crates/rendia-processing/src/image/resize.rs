//! Resize geometry and filter selection.
//!
//! Two modes cover every rendition: `fit_inside` bounds the longer edge
//! while preserving aspect ratio and never upscales; `cover_crop` fills a
//! square by scaling to cover and center-cropping the overflow.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Select a filter by downscale ratio: cheap filters for aggressive
/// reductions, Lanczos for near-1:1 work.
pub fn select_filter(
    orig_width: u32,
    orig_height: u32,
    new_width: u32,
    new_height: u32,
) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

/// Target dimensions for a fit-inside resize bounding the longer edge.
/// Returns the source dimensions unchanged when they already fit.
pub fn fit_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width.max(height) <= bound {
        return (width, height);
    }
    if width >= height {
        let h = (height as f64 * bound as f64 / width as f64).round() as u32;
        (bound, h.max(1))
    } else {
        let w = (width as f64 * bound as f64 / height as f64).round() as u32;
        (w.max(1), bound)
    }
}

/// Scale down so the longer edge equals `bound`, preserving aspect ratio.
/// Sources already within the bound are returned unchanged.
pub fn fit_inside(img: &DynamicImage, bound: u32) -> DynamicImage {
    let (orig_width, orig_height) = img.dimensions();
    let (new_width, new_height) = fit_dimensions(orig_width, orig_height, bound);
    if (new_width, new_height) == (orig_width, orig_height) {
        return img.clone();
    }
    let filter = select_filter(orig_width, orig_height, new_width, new_height);
    img.resize_exact(new_width, new_height, filter)
}

/// Scale to cover a `size`x`size` square and center-crop the overflow.
pub fn cover_crop(img: &DynamicImage, size: u32) -> DynamicImage {
    let (orig_width, orig_height) = img.dimensions();
    let filter = select_filter(orig_width, orig_height, size, size);
    img.resize_to_fill(size, size, filter)
}
