//! Sheet image generation.
//!
//! Handles layout calculation, de-duplication and final sheet assembly.

use image::{imageops, RgbaImage};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub dimensions: (u32, u32),
    pub frames_per_row: u32,
    pub rows: u32,
    pub cell_size: (u32, u32),
}

impl SheetLayout {
    /// Top-left pixel of the cell holding `index`.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let col = index as u32 % self.frames_per_row;
        let row = index as u32 / self.frames_per_row;
        (col * self.cell_size.0, row * self.cell_size.1)
    }
}

/// Creates a grid layout. Without an explicit row width the grid is near-square.
pub fn create_sheet_layout(
    total_frames: usize,
    cell_width: u32,
    cell_height: u32,
    frames_per_row: Option<u32>,
) -> SheetLayout {
    if total_frames == 0 {
        return SheetLayout {
            dimensions: (cell_width.max(8), cell_height.max(8)),
            frames_per_row: 1,
            rows: 1,
            cell_size: (cell_width, cell_height),
        };
    }

    let frames_per_row = frames_per_row
        .filter(|&n| n > 0)
        .unwrap_or_else(|| (total_frames as f32).sqrt().ceil() as u32)
        .min(total_frames as u32);
    let rows = (total_frames as u32).div_ceil(frames_per_row);

    SheetLayout {
        dimensions: (frames_per_row * cell_width, rows * cell_height),
        frames_per_row,
        rows,
        cell_size: (cell_width, cell_height),
    }
}

/// Places frames into their cells, top-left aligned. Frames larger than a
/// cell are clipped by the cell grid's canvas.
pub fn generate_sheet(frames: &[RgbaImage], layout: &SheetLayout) -> RgbaImage {
    let (width, height) = layout.dimensions;
    let mut sheet = RgbaImage::new(width, height);

    for (i, frame) in frames.iter().enumerate() {
        let (x, y) = layout.cell_origin(i);
        overlay_image(&mut sheet, frame, x as i32, y as i32);
    }

    sheet
}

/// Deduplicates frames by comparing pixel data using fast hashing.
///
/// Returns `(unique_frames, mapping)` where `mapping[original_index] = unique_index`.
pub fn deduplicate_frames(frames: &[RgbaImage]) -> (Vec<RgbaImage>, Vec<usize>) {
    let mut unique_frames_map: HashMap<u64, usize> = HashMap::new();
    let mut unique_frames_vec: Vec<RgbaImage> = Vec::new();
    let mut frame_mapping = Vec::with_capacity(frames.len());

    for frame in frames {
        let frame_hash = calculate_frame_hash(frame);

        let unique_index = match unique_frames_map.entry(frame_hash) {
            Entry::Occupied(entry) => {
                let candidate_idx = *entry.get();
                if frames_are_identical(frame, &unique_frames_vec[candidate_idx]) {
                    candidate_idx
                } else {
                    // Hash collision
                    let new_idx = unique_frames_vec.len();
                    unique_frames_vec.push(frame.clone());
                    new_idx
                }
            }
            Entry::Vacant(entry) => {
                let index = unique_frames_vec.len();
                unique_frames_vec.push(frame.clone());
                entry.insert(index);
                index
            }
        };

        frame_mapping.push(unique_index);
    }

    (unique_frames_vec, frame_mapping)
}

fn calculate_frame_hash(frame: &RgbaImage) -> u64 {
    let mut hasher = XxHash64::default();
    frame.dimensions().hash(&mut hasher);
    frame.as_raw().hash(&mut hasher);
    hasher.finish()
}

fn frames_are_identical(a: &RgbaImage, b: &RgbaImage) -> bool {
    a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
}

/// Alpha-blends `image` onto `canvas`; negative or overhanging positions are clipped.
pub fn overlay_image(canvas: &mut RgbaImage, image: &RgbaImage, x: i32, y: i32) {
    imageops::overlay(canvas, image, x as i64, y as i64);
}
