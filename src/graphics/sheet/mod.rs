//! Sprite/tile sheet export
//!
//! Lays decoded tiles or frames out on a single PNG and writes a JSON file
//! describing where each one landed.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use image::{ImageError, RgbaImage};
use log::{info, warn};
use thiserror::Error;

pub mod generator;
pub mod metadata;

#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub deduplicate_frames: bool,
    pub optimise_png: bool,
    /// Fixed number of cells per row; near-square when `None`.
    pub frames_per_row: Option<u32>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            deduplicate_frames: true,
            optimise_png: true,
            frames_per_row: None,
        }
    }
}

/// One named image destined for a sheet.
#[derive(Debug, Clone)]
pub struct SheetEntry {
    pub name: String,
    pub image: RgbaImage,
    pub offset: Option<(i32, i32)>,
}

impl SheetEntry {
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        SheetEntry {
            name: name.into(),
            image,
            offset: None,
        }
    }

    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.offset = Some((x, y));
        self
    }
}

#[derive(Debug)]
pub struct SheetResult {
    pub dimensions: (u32, u32),
    pub unique_frames: usize,
    pub image_path: PathBuf,
    pub metadata_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No frames provided for sheet generation")]
    NoFramesFound,
}

/// Builds the sheet image and metadata in memory.
pub fn build_sheet(
    entries: &[SheetEntry],
    config: &AtlasConfig,
    sheet_image: &str,
) -> Result<(RgbaImage, metadata::SheetMetadata), SheetError> {
    if entries.is_empty() {
        return Err(SheetError::NoFramesFound);
    }

    let images: Vec<RgbaImage> = entries.iter().map(|e| e.image.clone()).collect();
    let cell_width = images.iter().map(|i| i.width()).max().unwrap_or(8);
    let cell_height = images.iter().map(|i| i.height()).max().unwrap_or(8);

    let (unique_frames, frame_mapping) = if config.deduplicate_frames {
        generator::deduplicate_frames(&images)
    } else {
        let mapping = (0..images.len()).collect();
        (images, mapping)
    };

    let layout = generator::create_sheet_layout(
        unique_frames.len(),
        cell_width,
        cell_height,
        config.frames_per_row,
    );
    let sheet = generator::generate_sheet(&unique_frames, &layout);
    let metadata = metadata::generate_metadata(
        entries,
        &layout,
        &frame_mapping,
        unique_frames.len(),
        sheet_image,
    );

    Ok((sheet, metadata))
}

/// Builds a sheet and writes `<stem>.png` and `<stem>.json` into `output_dir`.
pub fn create_sheet(
    entries: &[SheetEntry],
    config: &AtlasConfig,
    output_dir: &Path,
    stem: &str,
) -> Result<SheetResult, SheetError> {
    fs::create_dir_all(output_dir)?;

    let image_name = format!("{}.png", stem);
    let image_path = output_dir.join(&image_name);
    let metadata_path = output_dir.join(format!("{}.json", stem));

    let (sheet, metadata) = build_sheet(entries, config, &image_name)?;
    info!(
        "Sheet {}: {} entries, {} unique, {}x{} px",
        stem,
        entries.len(),
        metadata.unique_frames,
        sheet.width(),
        sheet.height()
    );

    if config.optimise_png {
        if let Err(e) = save_optimised_png(&sheet, &image_path) {
            warn!("PNG optimisation failed for {}: {}", image_path.display(), e);
            sheet.save(&image_path)?;
        }
    } else {
        sheet.save(&image_path)?;
    }

    metadata::save_metadata(&metadata, &metadata_path)?;

    Ok(SheetResult {
        dimensions: sheet.dimensions(),
        unique_frames: metadata.unique_frames as usize,
        image_path,
        metadata_path,
    })
}

/// Saves through a temporary file and recompresses it with oxipng.
pub fn save_optimised_png(image: &RgbaImage, path: &Path) -> Result<(), SheetError> {
    let temp_path = path.with_extension("temp.png");
    image.save(&temp_path)?;

    let mut options = oxipng::Options::from_preset(2);
    // EGA art never needs more than 16 colours
    options.bit_depth_reduction = true;

    let result = oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &options,
    );

    if let Err(e) = fs::remove_file(&temp_path) {
        warn!("Failed to remove temporary file {}: {}", temp_path.display(), e);
    }

    result.map_err(|e| SheetError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
}
