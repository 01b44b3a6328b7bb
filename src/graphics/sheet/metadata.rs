//! JSON metadata describing where each named image landed on a sheet.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use super::generator::SheetLayout;
use super::SheetEntry;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SheetMetadata {
    /// Filename of the PNG this metadata corresponds to.
    pub sheet_image: String,
    pub cell_width: u32,
    pub cell_height: u32,
    pub frames_per_row: u32,
    /// Number of distinct images on the sheet after de-duplication.
    pub unique_frames: u32,
    pub frames: Vec<FrameInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub name: String,
    /// Index of the cell holding this frame's pixels.
    pub idx: u32,
    pub sheet_x: u32,
    pub sheet_y: u32,
    pub width: u32,
    pub height: u32,
    /// Hotspot offset to apply when drawing, if the source carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<[i32; 2]>,
}

pub fn generate_metadata(
    entries: &[SheetEntry],
    layout: &SheetLayout,
    frame_mapping: &[usize],
    unique_frames: usize,
    sheet_image: &str,
) -> SheetMetadata {
    let frames = entries
        .iter()
        .zip(frame_mapping)
        .map(|(entry, &unique_index)| {
            let (sheet_x, sheet_y) = layout.cell_origin(unique_index);
            FrameInfo {
                name: entry.name.clone(),
                idx: unique_index as u32,
                sheet_x,
                sheet_y,
                width: entry.image.width(),
                height: entry.image.height(),
                offset: entry.offset.map(|(x, y)| [x, y]),
            }
        })
        .collect();

    SheetMetadata {
        sheet_image: sheet_image.to_string(),
        cell_width: layout.cell_size.0,
        cell_height: layout.cell_size.1,
        frames_per_row: layout.frames_per_row,
        unique_frames: unique_frames as u32,
        frames,
    }
}

pub fn save_metadata(metadata: &SheetMetadata, path: &Path) -> Result<(), super::SheetError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, metadata)?;
    Ok(())
}
