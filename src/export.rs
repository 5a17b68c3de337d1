//! Image and file export for finished maps.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::ExportError;
use crate::generation::TerrainMap;
use crate::snapshot::{MapSnapshot, TIMESTAMP_FORMAT};

/// Color for cells nothing has been placed on.
const EMPTY_COLOR: [u8; 3] = [0, 0, 0];

/// Render a map with each terrain in its configured color, `scale` pixels
/// per cell.
pub fn render_terrain_map<M: TerrainMap + ?Sized>(map: &M, scale: u32) -> RgbImage {
    let scale = scale.max(1);
    let registry = map.registry();
    let mut img: RgbImage = ImageBuffer::new(map.width() as u32 * scale, map.height() as u32 * scale);

    for y in 0..map.height() {
        for x in 0..map.width() {
            let color = match map.terrain_at(x, y) {
                Some(t) => {
                    let (r, g, b) = registry.get(t).color_rgb8();
                    [r, g, b]
                }
                None => EMPTY_COLOR,
            };
            for py in 0..scale {
                for px in 0..scale {
                    img.put_pixel(x as u32 * scale + px, y as u32 * scale + py, Rgb(color));
                }
            }
        }
    }

    img
}

/// Export a map as a colored PNG.
pub fn export_png<M: TerrainMap + ?Sized>(map: &M, path: &Path, scale: u32) -> Result<(), ExportError> {
    render_terrain_map(map, scale).save(path)?;
    Ok(())
}

/// Paths written by [`export_map_files`].
#[derive(Clone, Debug)]
pub struct ExportedFiles {
    pub json: PathBuf,
    pub png: Option<PathBuf>,
}

/// Write `{timestamp}_seed_{seed}.json` and, unless `png_scale` is `None`,
/// the matching `.png` into `dir`, creating it if needed.
pub fn export_map_files<M: TerrainMap + ?Sized>(
    map: &M,
    dir: &Path,
    generation_type: &str,
    png_scale: Option<u32>,
) -> Result<ExportedFiles, ExportError> {
    fs::create_dir_all(dir)?;

    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    let mut snapshot = MapSnapshot::from_map(map, generation_type);
    snapshot.generation_timestamp = Some(timestamp.clone());

    // File name carries the seed exactly as the JSON records it
    let seed = snapshot.seed.map_or_else(|| String::from("none"), |s| s.to_string());
    let stem = format!("{}_seed_{}", timestamp, seed);
    let json = dir.join(format!("{}.json", stem));
    fs::write(&json, snapshot.to_json()?)?;

    let png = match png_scale {
        Some(scale) => {
            let path = dir.join(format!("{}.png", stem));
            export_png(map, &path, scale)?;
            Some(path)
        }
        None => None,
    };

    log::info!("Exported {}", json.display());
    Ok(ExportedFiles { json, png })
}
