use std::{
    fs, io,
    path::{Path, PathBuf},
};

use image::{imageops, ImageError, RgbaImage};
use log::{info, warn};
use serde_json::json;
use thiserror::Error;

use crate::{
    audio::{
        adlib::{convert_adlib_effect, to_imf_bytes},
        pc_speaker::pc_speaker_tone,
        voc::{coalesce, decode_voc},
        wav::write_wav,
        PcmBuffer,
    },
    error::DecodeError,
    graphics::{
        czone::{CzoneTileset, TileAtlas},
        gen1::Gen1TileBank,
        palette::Palette,
        planar::{decode_backdrop, decode_full_screen, TILE_DIM},
        sheet::{create_sheet, AtlasConfig, SheetEntry, SheetError, SheetResult},
    },
    level::{Gen2Level, Generation, LevelDocument},
    sprites::{ActorInfoTable, SpriteCompositor, SpriteDefinitions},
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Decode { path: PathBuf, source: DecodeError },
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAV error on {path}: {source}")]
    Wav { path: PathBuf, source: hound::Error },
    #[error("{0}: nothing could be decoded")]
    Unavailable(PathBuf),
}

type Result<T> = std::result::Result<T, ExtractError>;

fn read_asset(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_err(path: &Path) -> impl FnOnce(DecodeError) -> ExtractError + '_ {
    move |source| ExtractError::Decode {
        path: path.to_path_buf(),
        source,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "asset".to_string())
}

/// Loads a palette file, or the default EGA palette when `path` is `None`.
pub fn load_palette(path: Option<&Path>) -> Result<Palette> {
    match path {
        Some(path) => Palette::from_bytes(&read_asset(path)?).map_err(decode_err(path)),
        None => Ok(Palette::default()),
    }
}

/// Writes decoded assets under one output directory.
pub struct AssetExtractor {
    output_dir: PathBuf,
    config: AtlasConfig,
}

impl AssetExtractor {
    pub fn new<P: AsRef<Path>>(output_dir: P, config: AtlasConfig) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|source| ExtractError::Io {
            path: output_dir.clone(),
            source,
        })?;
        Ok(AssetExtractor { output_dir, config })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        fs::write(&path, bytes).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn save_png(&self, name: &str, image: &RgbaImage) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        image.save(&path)?;
        Ok(path)
    }

    /// CZONE tileset → one sheet of solid and masked tiles.
    pub fn extract_czone(&self, path: &Path, palette: &Palette) -> Result<SheetResult> {
        let data = read_asset(path)?;
        let tileset = CzoneTileset::from_bytes(&data).map_err(decode_err(path))?;
        let atlas = tileset.build_atlas(palette);

        let mut entries = Vec::with_capacity(atlas.len());
        for index in 0..atlas.len() as u16 {
            let (name, tile) = if (index as usize) < tileset.solid_attributes.len() {
                (format!("solid_{:04}", index), atlas.solid(index))
            } else {
                let masked = index - tileset.solid_attributes.len() as u16;
                (format!("masked_{:03}", masked), atlas.masked(masked))
            };
            match tile {
                Some(tile) => entries.push(SheetEntry::new(name, tile.clone())),
                None => warn!("{}: tile {} unavailable", path.display(), name),
            }
        }

        Ok(create_sheet(&entries, &self.config, &self.output_dir, &file_stem(path))?)
    }

    /// Generation-1 16x16 tile file → one sheet.
    pub fn extract_gen1_tiles(&self, path: &Path, palette: &Palette) -> Result<SheetResult> {
        let data = read_asset(path)?;
        let bank = Gen1TileBank::from_bytes(&data).map_err(decode_err(path))?;
        info!(
            "{}: {} tiles, {:?} layout",
            path.display(),
            bank.tile_count,
            bank.layout
        );

        let entries: Vec<SheetEntry> = bank
            .tiles(palette)
            .into_iter()
            .enumerate()
            .filter_map(|(i, tile)| tile.map(|t| SheetEntry::new(format!("tile_{:03}", i), t)))
            .collect();

        Ok(create_sheet(&entries, &self.config, &self.output_dir, &file_stem(path))?)
    }

    /// Full-screen planar image → PNG.
    pub fn extract_image(&self, path: &Path, palette: &Palette) -> Result<PathBuf> {
        let data = read_asset(path)?;
        let image = decode_full_screen(&data, palette)
            .ok_or_else(|| ExtractError::Unavailable(path.to_path_buf()))?;
        self.save_png(&format!("{}.png", file_stem(path)), &image)
    }

    /// Backdrop (40x25 solid tiles) → PNG.
    pub fn extract_backdrop(&self, path: &Path, palette: &Palette) -> Result<PathBuf> {
        let data = read_asset(path)?;
        let image = decode_backdrop(&data, palette)
            .ok_or_else(|| ExtractError::Unavailable(path.to_path_buf()))?;
        self.save_png(&format!("{}.png", file_stem(path)), &image)
    }

    /// Level → JSON description, plus a rendered map when a CZONE is given
    /// for a generation-2 level.
    pub fn extract_level(
        &self,
        path: &Path,
        generation: Generation,
        czone: Option<&Path>,
        palette: &Palette,
    ) -> Result<Vec<PathBuf>> {
        let data = read_asset(path)?;
        let document = LevelDocument::parse(&data, generation).map_err(decode_err(path))?;
        let stem = file_stem(path);

        let description = match &document {
            LevelDocument::Gen1(level) => json!({
                "generation": 1,
                "width": level.width(),
                "height": level.height(),
                "header_bytes": level.header.len(),
                "actors": level.actors(),
                "cells": level.cells.chunks(level.width()).collect::<Vec<_>>(),
            }),
            LevelDocument::Gen2(level) => json!({
                "generation": 2,
                "width": level.width,
                "height": level.height,
                "czone": level.czone_name,
                "backdrop": level.backdrop_name,
                "music": level.music_name,
                "flags": level.flags,
                "alt_backdrop": level.alt_backdrop,
                "actors": level.actors,
                "cells": level.rows().collect::<Vec<_>>(),
            }),
        };

        let mut written =
            vec![self.write(&format!("{}.json", stem), &serde_json::to_vec_pretty(&description)?)?];

        match (&document, czone) {
            (LevelDocument::Gen2(level), Some(czone_path)) => {
                let czone_data = read_asset(czone_path)?;
                let tileset = CzoneTileset::from_bytes(&czone_data).map_err(decode_err(czone_path))?;
                let map = render_gen2_map(level, &tileset.build_atlas(palette));
                written.push(self.save_png(&format!("{}.png", stem), &map)?);
            }
            (LevelDocument::Gen1(_), Some(_)) => {
                warn!("generation-1 levels are not rendered; ignoring tileset");
            }
            _ => {}
        }

        info!(
            "{}: {}x{} cells, {} actors",
            path.display(),
            document.width(),
            document.height(),
            document.actors().len()
        );
        Ok(written)
    }

    /// ACTRINFO + sprite data → a sheet of every frame and a sheet of metaframes.
    pub fn extract_sprites(
        &self,
        actor_info_path: &Path,
        sprite_data_path: &Path,
        definitions_path: Option<&Path>,
        palette: &Palette,
    ) -> Result<Vec<SheetResult>> {
        let info_data = read_asset(actor_info_path)?;
        let actor_info = ActorInfoTable::parse(&info_data).map_err(decode_err(actor_info_path))?;
        let definitions = match definitions_path {
            Some(path) => {
                let file = fs::File::open(path).map_err(|source| ExtractError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                SpriteDefinitions::from_reader(io::BufReader::new(file))?
            }
            None => SpriteDefinitions::default(),
        };

        let compositor = SpriteCompositor::new(
            actor_info,
            read_asset(sprite_data_path)?,
            palette.clone(),
        )
        .with_definitions(definitions);

        let actor_ids: Vec<u16> = compositor.actor_info().actor_ids().collect();
        let mut frames = Vec::new();
        let mut metaframes = Vec::new();

        for &actor in &actor_ids {
            let frame_count = compositor.actor_info().frames(actor).map_or(0, |f| f.len());
            for index in 0..frame_count {
                let (Some(image), Some(info)) =
                    (compositor.get_frame(actor, index), compositor.frame_info(actor, index))
                else {
                    warn!("actor {} frame {} unavailable", actor, index);
                    continue;
                };
                frames.push(
                    SheetEntry::new(format!("actor_{:04}_{:02}", actor, index), (*image).clone())
                        .with_offset(info.hotspot_x as i32, info.hotspot_y as i32),
                );
            }

            if let Some(meta) = compositor.get_metaframe(actor) {
                metaframes.push(SheetEntry::new(format!("actor_{:04}", actor), (*meta).clone()));
            }
        }

        info!(
            "{} actors, {} frames, {} metaframes",
            actor_ids.len(),
            frames.len(),
            metaframes.len()
        );

        Ok(vec![
            create_sheet(&frames, &self.config, &self.output_dir, "actor_frames")?,
            create_sheet(&metaframes, &self.config, &self.output_dir, "actor_metaframes")?,
        ])
    }

    /// VOC → one WAV per run of equal-rate blocks.
    pub fn extract_voc(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let data = read_asset(path)?;
        let buffers = coalesce(decode_voc(&data).map_err(decode_err(path))?);
        if buffers.is_empty() {
            return Err(ExtractError::Unavailable(path.to_path_buf()));
        }

        let stem = file_stem(path);
        let single = buffers.len() == 1;
        buffers
            .iter()
            .enumerate()
            .map(|(i, pcm)| {
                let name = if single {
                    format!("{}.wav", stem)
                } else {
                    format!("{}_{}.wav", stem, i)
                };
                self.write_pcm(&name, pcm)
            })
            .collect()
    }

    /// AdLib effect → type-0 IMF.
    pub fn extract_adlib(&self, path: &Path) -> Result<PathBuf> {
        let data = read_asset(path)?;
        let commands = convert_adlib_effect(&data).map_err(decode_err(path))?;
        self.write(&format!("{}.imf", file_stem(path)), &to_imf_bytes(&commands))
    }

    /// PC speaker effect → WAV.
    pub fn extract_pc_speaker(&self, path: &Path, sample_rate: u32) -> Result<PathBuf> {
        let data = read_asset(path)?;
        let pcm = PcmBuffer::mono(sample_rate, pc_speaker_tone(&data, sample_rate));
        self.write_pcm(&format!("{}.wav", file_stem(path)), &pcm)
    }

    fn write_pcm(&self, name: &str, pcm: &PcmBuffer) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        write_wav(pcm, &path).map_err(|source| ExtractError::Wav {
            path: path.clone(),
            source,
        })?;
        info!(
            "{}: {} samples at {} Hz ({:.2}s)",
            path.display(),
            pcm.samples.len(),
            pcm.sample_rate,
            pcm.duration_secs()
        );
        Ok(path)
    }
}

/// Draws a generation-2 map: solid tiles first, masked tiles over them.
pub fn render_gen2_map(level: &Gen2Level, atlas: &TileAtlas) -> RgbaImage {
    let mut map = RgbaImage::new(level.width as u32 * TILE_DIM, level.height as u32 * TILE_DIM);
    for (y, row) in level.rows().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            let px = (x as u32 * TILE_DIM) as i64;
            let py = (y as u32 * TILE_DIM) as i64;
            let (bg, fg) = atlas.resolve(*cell);
            if let Some(bg) = bg {
                imageops::replace(&mut map, bg, px, py);
            }
            if let Some(fg) = fg {
                imageops::overlay(&mut map, fg, px, py);
            }
        }
    }
    map
}
