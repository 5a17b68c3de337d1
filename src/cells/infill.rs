use rand_chacha::ChaCha8Rng;

use crate::config::RegionGrowthConfig;
use crate::generation::pick_weighted;
use crate::terrain::{TerrainId, TerrainSet};
use crate::tilemap::Tilemap;

use super::{allowed_terrains, placed_neighbors};

/// Smooth low-frequency bias in roughly [0.5, 1.5], with its own scale and
/// phase per terrain type so isolated cells form macro-regions.
pub(super) fn noise_bias(terrain: TerrainId, x: usize, y: usize) -> f64 {
    let i = terrain.index();
    let scale = 15.0 + 5.0 * (i % 6) as f64;
    let phase = 100.0 * i as f64;
    let wave = (x as f64 / scale + phase).sin() * (y as f64 / scale + phase).cos();
    0.5 + (wave + 1.0) / 2.0
}

/// Weight of `candidate` at (x, y) given its placed neighbors.
fn infill_weight(
    set: &TerrainSet,
    growth: &RegionGrowthConfig,
    candidate: TerrainId,
    neighbors: &[TerrainId],
    x: usize,
    y: usize,
) -> f64 {
    let mut weight = set.registry.weight_of(candidate);
    if neighbors.is_empty() {
        return weight * noise_bias(candidate, x, y);
    }

    let same = neighbors.iter().filter(|&&n| n == candidate).count();
    weight *= growth.neighbor_influence.powi(same as i32);

    // Different but compatible neighbors pull a little, per distinct type
    let mut seen: Vec<TerrainId> = Vec::new();
    for &n in neighbors {
        if n == candidate || seen.contains(&n) {
            continue;
        }
        seen.push(n);
        if set.compatibility.is_compatible(candidate, n) {
            let count = neighbors.iter().filter(|&&m| m == n).count();
            weight *= growth.compatibility_boost.powf(count as f64 * 0.5);
        }
    }
    weight
}

/// Phase C: settle every empty cell, row-major. Cells with no allowed type
/// get the highest-weight type; returns how many were forced.
pub(super) fn fill_remaining(
    grid: &mut Tilemap<Option<TerrainId>>,
    set: &TerrainSet,
    rng: &mut ChaCha8Rng,
) -> usize {
    let fallback = set.registry.highest_weight();
    let mut forced = 0;

    for y in 0..grid.height {
        for x in 0..grid.width {
            if grid.get(x, y).is_some() {
                continue;
            }

            let neighbors = placed_neighbors(grid, x, y);
            let weighted: Vec<(TerrainId, f64)> = allowed_terrains(grid, set, x, y)
                .into_iter()
                .map(|t| (t, infill_weight(set, &set.growth, t, &neighbors, x, y)))
                .collect();

            let terrain = pick_weighted(rng, &weighted).unwrap_or_else(|| {
                forced += 1;
                fallback
            });
            grid.set(x, y, Some(terrain));
        }
    }

    if forced > 0 {
        log::debug!(
            "Infill forced '{}' into {} cell(s)",
            set.registry.name_of(fallback),
            forced
        );
    }
    forced
}
