//! Flat JSON snapshot of a finished map
//!
//! ```json
//! { "width": 3, "height": 2, "seed": 42,
//!   "generation_timestamp": "20250101_120000", "generation_type": "cell_based",
//!   "terrain_data": [["plain", "plain", "forest"], ["plain", "river", "plain"]] }
//! ```
//!
//! `terrain_data` is row-major, one array per row. The timestamp and type
//! fields are informational and optional on read.
//!
//! `seed` is any JSON integer or null. Generators seed with a `u64`, which is
//! stored bit-for-bit as an `i64`, so seeds above `i64::MAX` appear negative.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::generation::TerrainMap;
use crate::terrain::{TerrainId, TerrainRegistry};
use crate::tilemap::Tilemap;

/// Timestamp format used in snapshots and export file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub width: usize,
    pub height: usize,
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_timestamp: Option<String>,
    pub terrain_data: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_type: Option<String>,
}

impl MapSnapshot {
    /// Capture a map. Empty cells are written as the first registered type.
    pub fn from_map<M: TerrainMap + ?Sized>(map: &M, generation_type: &str) -> Self {
        let registry = map.registry();
        let terrain_data = (0..map.height())
            .map(|y| {
                (0..map.width())
                    .map(|x| {
                        let id = map.terrain_at(x, y).unwrap_or(TerrainId(0));
                        registry.name_of(id).to_string()
                    })
                    .collect()
            })
            .collect();

        Self {
            width: map.width(),
            height: map.height(),
            seed: map.seed().map(|s| s as i64),
            generation_timestamp: Some(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()),
            terrain_data,
            generation_type: Some(generation_type.to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let mut file = File::create(path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Rebuild the grid against a registry, checking shape and names.
    pub fn rebuild(&self, registry: Arc<TerrainRegistry>) -> Result<LoadedMap, SnapshotError> {
        let actual_height = self.terrain_data.len();
        let actual_width = self.terrain_data.first().map_or(0, Vec::len);
        let ragged = self.terrain_data.iter().any(|row| row.len() != actual_width);
        if ragged || actual_width != self.width || actual_height != self.height {
            return Err(SnapshotError::DimensionMismatch {
                declared_width: self.width,
                declared_height: self.height,
                actual_width,
                actual_height,
            });
        }

        let mut rows = Vec::with_capacity(self.height);
        for (y, row) in self.terrain_data.iter().enumerate() {
            let mut ids = Vec::with_capacity(self.width);
            for (x, name) in row.iter().enumerate() {
                let id = registry.id_of(name).ok_or_else(|| SnapshotError::UnknownTerrain {
                    x,
                    y,
                    name: name.clone(),
                })?;
                ids.push(id);
            }
            rows.push(ids);
        }

        let grid = Tilemap::from_rows(rows).unwrap_or_else(|| Tilemap::new_with(0, 0, TerrainId(0)));
        Ok(LoadedMap {
            registry,
            grid,
            seed: self.seed.map(|s| s as u64),
        })
    }
}

/// A map read back from a snapshot.
#[derive(Clone, Debug)]
pub struct LoadedMap {
    registry: Arc<TerrainRegistry>,
    grid: Tilemap<TerrainId>,
    seed: Option<u64>,
}

impl LoadedMap {
    pub fn grid(&self) -> &Tilemap<TerrainId> {
        &self.grid
    }
}

impl TerrainMap for LoadedMap {
    fn registry(&self) -> &TerrainRegistry {
        &self.registry
    }

    fn width(&self) -> usize {
        self.grid.width
    }

    fn height(&self) -> usize {
        self.grid.height
    }

    fn terrain_at(&self, x: usize, y: usize) -> Option<TerrainId> {
        self.grid.try_get(x, y).copied()
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::CellGenerator;
    use crate::terrain::TerrainSet;

    #[test]
    fn test_round_trip_through_file() {
        let set = TerrainSet::default_phase().unwrap();
        let mut gen = CellGenerator::new(9, 7, set.clone(), None);
        gen.generate(Some(31));

        let snapshot = MapSnapshot::from_map(&gen, "cell_based");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        snapshot.save(&path).unwrap();

        let loaded = MapSnapshot::load(&path).unwrap();
        assert_eq!(loaded.terrain_data, snapshot.terrain_data);
        assert_eq!(loaded.seed, Some(31));
        assert_eq!(map_seed(&loaded), Some(31));

        let map = loaded.rebuild(set.registry.clone()).unwrap();
        assert_eq!(map.to_array(), gen.to_array());
        assert_eq!(map.terrain_distribution(), gen.terrain_distribution());
    }

    fn map_seed(snapshot: &MapSnapshot) -> Option<u64> {
        let set = TerrainSet::default_phase().unwrap();
        snapshot.rebuild(set.registry.clone()).unwrap().seed()
    }

    #[test]
    fn test_negative_seed_accepted() {
        let snapshot = MapSnapshot::from_json(
            r#"{ "width": 1, "height": 1, "seed": -7, "terrain_data": [["plain"]] }"#,
        )
        .unwrap();
        assert_eq!(snapshot.seed, Some(-7));

        let set = TerrainSet::default_phase().unwrap();
        let map = snapshot.rebuild(set.registry.clone()).unwrap();
        assert_eq!(MapSnapshot::from_map(&map, "cell_based").seed, Some(-7));
    }

    #[test]
    fn test_large_generator_seed_survives_round_trip() {
        let set = TerrainSet::default_phase().unwrap();
        let mut gen = CellGenerator::new(3, 3, set, None);
        gen.generate(Some(u64::MAX - 4));

        let snapshot = MapSnapshot::from_map(&gen, "cell_based");
        assert_eq!(snapshot.seed, Some(-5));
        let loaded = MapSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(map_seed(&loaded), Some(u64::MAX - 4));
    }

    #[test]
    fn test_extra_fields_optional() {
        let snapshot = MapSnapshot::from_json(
            r#"{ "width": 2, "height": 1, "seed": null, "terrain_data": [["plain", "river"]] }"#,
        )
        .unwrap();
        assert_eq!(snapshot.seed, None);
        assert_eq!(snapshot.generation_type, None);

        let set = TerrainSet::default_phase().unwrap();
        let map = snapshot.rebuild(set.registry.clone()).unwrap();
        assert_eq!(map.terrain_at(1, 0), set.registry.id_of("river"));
        assert_eq!(map.terrain_at(2, 0), None);
    }

    #[test]
    fn test_dimension_mismatch() {
        let snapshot = MapSnapshot::from_json(
            r#"{ "width": 3, "height": 1, "seed": 1, "terrain_data": [["plain", "river"]] }"#,
        )
        .unwrap();
        let set = TerrainSet::default_phase().unwrap();
        assert!(matches!(
            snapshot.rebuild(set.registry.clone()),
            Err(SnapshotError::DimensionMismatch { actual_width: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_terrain_rejected() {
        let snapshot = MapSnapshot::from_json(
            r#"{ "width": 1, "height": 1, "seed": 1, "terrain_data": [["lava"]] }"#,
        )
        .unwrap();
        let set = TerrainSet::default_phase().unwrap();
        assert!(matches!(
            snapshot.rebuild(set.registry.clone()),
            Err(SnapshotError::UnknownTerrain { x: 0, y: 0, .. })
        ));
    }

    #[test]
    fn test_serialized_field_names() {
        let snapshot = MapSnapshot {
            width: 1,
            height: 1,
            seed: Some(5),
            generation_timestamp: None,
            terrain_data: vec![vec!["plain".to_string()]],
            generation_type: Some("tile_based".to_string()),
        };
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["terrain_data"][0][0], "plain");
        assert_eq!(value["generation_type"], "tile_based");
        assert!(value.get("generation_timestamp").is_none());
    }
}
