use std::ops::Range;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::generation::pick_weighted;
use crate::terrain::{TerrainId, TerrainSet};
use crate::tilemap::Tilemap;

use super::{allowed_terrains, placement_allowed, RegionSeed};

/// Pending growth into an empty cell.
#[derive(Clone, Copy, Debug)]
struct GrowthFront {
    x: usize,
    y: usize,
    terrain: TerrainId,
    strength: f64,
}

/// Cells seeds may go in along one axis, keeping a margin off the border.
/// The margin is dropped when the axis is too short to keep any interior.
fn interior(side: usize, margin_frac: f64) -> Range<usize> {
    let margin = ((side as f64 * margin_frac).floor() as usize).max(1);
    if side > 2 * margin {
        margin..side - margin
    } else {
        0..side
    }
}

fn distance(a: (usize, usize), b: (usize, usize)) -> f64 {
    let dx = a.0 as f64 - b.0 as f64;
    let dy = a.1 as f64 - b.1 as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Seed 0 near the center of the interior (within a quarter of its extent);
/// later seeds keep the best of several random trials by distance to their
/// nearest existing seed.
fn seed_position(
    xs: &Range<usize>,
    ys: &Range<usize>,
    placed: &[RegionSeed],
    min_distance: f64,
    max_trials: usize,
    rng: &mut ChaCha8Rng,
) -> (usize, usize) {
    if placed.is_empty() {
        let near_center = |r: &Range<usize>, rng: &mut ChaCha8Rng| {
            let len = r.end - r.start;
            let center = r.start + len / 2;
            let spread = len / 4;
            let lo = center.saturating_sub(spread).max(r.start);
            let hi = (center + spread).min(r.end - 1);
            rng.gen_range(lo..=hi)
        };
        let x = near_center(xs, rng);
        let y = near_center(ys, rng);
        return (x, y);
    }

    let mut best = (xs.start, ys.start);
    let mut best_distance = -1.0;
    for _ in 0..max_trials.max(1) {
        let trial = (rng.gen_range(xs.clone()), rng.gen_range(ys.clone()));
        let nearest = placed
            .iter()
            .map(|s| distance(trial, (s.x, s.y)))
            .fold(f64::INFINITY, f64::min);
        if nearest > best_distance {
            best = trial;
            best_distance = nearest;
        }
        if best_distance >= min_distance {
            break;
        }
    }
    best
}

/// Phase A: place up to `target_region_count` seeds, each a weighted choice
/// among the types allowed at its position.
pub(super) fn place_seeds(
    grid: &mut Tilemap<Option<TerrainId>>,
    set: &TerrainSet,
    rng: &mut ChaCha8Rng,
) -> Vec<RegionSeed> {
    let mut seeds = Vec::new();
    if grid.width == 0 || grid.height == 0 {
        return seeds;
    }

    let growth = &set.growth;
    let xs = interior(grid.width, growth.interior_margin);
    let ys = interior(grid.height, growth.interior_margin);
    let capacity = xs.len() * ys.len();
    let min_distance = growth.min_region_distance * grid.width.max(grid.height) as f64;

    for _ in 0..growth.target_region_count.min(capacity) {
        let (x, y) = seed_position(&xs, &ys, &seeds, min_distance, growth.max_placement_attempts, rng);
        if grid.get(x, y).is_some() {
            continue;
        }

        let weighted: Vec<(TerrainId, f64)> = allowed_terrains(grid, set, x, y)
            .into_iter()
            .map(|t| (t, set.registry.weight_of(t)))
            .collect();
        let Some(terrain) = pick_weighted(rng, &weighted) else {
            continue;
        };

        grid.set(x, y, Some(terrain));
        seeds.push(RegionSeed { x, y, terrain });
    }

    seeds
}

fn push_empty_neighbors(
    grid: &Tilemap<Option<TerrainId>>,
    x: usize,
    y: usize,
    terrain: TerrainId,
    strength: f64,
    queue: &mut Vec<GrowthFront>,
) {
    for (nx, ny) in grid.neighbors(x, y) {
        if grid.get(nx, ny).is_none() {
            queue.push(GrowthFront { x: nx, y: ny, terrain, strength });
        }
    }
}

/// Phase B: multi-source stochastic flood fill from the seeds. Each pass
/// handles the current front in random order; accepted cells push their
/// empty neighbors at decayed strength until the strength drops below the
/// threshold. Returns the number of cells grown.
pub(super) fn grow_regions(
    grid: &mut Tilemap<Option<TerrainId>>,
    set: &TerrainSet,
    seeds: &[RegionSeed],
    rng: &mut ChaCha8Rng,
) -> usize {
    let growth = &set.growth;
    let mut front = Vec::new();
    for seed in seeds {
        push_empty_neighbors(grid, seed.x, seed.y, seed.terrain, 1.0, &mut front);
    }

    let mut grown = 0;
    let mut passes = 0;
    while !front.is_empty() {
        passes += 1;
        front.shuffle(rng);
        let mut next = Vec::new();

        for entry in front.drain(..) {
            if grid.get(entry.x, entry.y).is_some() {
                continue;
            }
            if !placement_allowed(grid, set, entry.x, entry.y, entry.terrain) {
                continue;
            }
            if !rng.gen_bool((entry.strength * growth.growth_strength).clamp(0.0, 1.0)) {
                continue;
            }

            grid.set(entry.x, entry.y, Some(entry.terrain));
            grown += 1;

            let strength = entry.strength * growth.growth_decay;
            if strength >= growth.growth_threshold {
                push_empty_neighbors(grid, entry.x, entry.y, entry.terrain, strength, &mut next);
            }
        }

        front = next;
    }

    log::trace!("Region growth: {} cells in {} passes", grown, passes);
    grown
}
