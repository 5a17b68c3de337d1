//! Pieces shared by the tile and cell generators: the bounded
//! validate-and-retry loop, weighted choice, and the read-only
//! [`TerrainMap`] view that analysis and export work against.

use std::collections::HashMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::regions::{analyze_regions, RegionAnalysis};
use crate::terrain::{TerrainId, TerrainRegistry};
use crate::tilemap::Tilemap;

/// An occupant whose structural rule is not met by its actual neighbors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub x: usize,
    pub y: usize,
    pub terrain: TerrainId,
    pub missing: Vec<TerrainId>,
}

/// Result of one full fill of the grid.
#[derive(Clone, Debug, Default)]
pub struct AttemptOutcome {
    pub violations: Vec<Violation>,
    /// Positions where no candidate survived and the fallback was forced.
    pub fallbacks: usize,
}

/// What happened during a `generate()` call.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationReport {
    pub seed: u64,
    pub attempts: u32,
    /// Structural rules still violated after the last attempt. The grid is
    /// complete and usable, it just does not satisfy every rule.
    pub degraded: bool,
    pub violations: Vec<Violation>,
    pub fallbacks: usize,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        !self.degraded
    }
}

/// Run `attempt` until it reports no violations or `max_attempts` full
/// fills have been made. The closure is responsible for clearing the grid;
/// the last grid is kept either way.
pub fn run_with_retries<F>(seed: u64, max_attempts: u32, mut attempt: F) -> GenerationReport
where
    F: FnMut(u32) -> AttemptOutcome,
{
    let max_attempts = max_attempts.max(1);
    let mut last = AttemptOutcome::default();
    let mut attempts = 0;

    for n in 0..max_attempts {
        attempts = n + 1;
        last = attempt(n);
        if last.violations.is_empty() {
            log::debug!("Attempt {} satisfied all structural rules", attempts);
            break;
        }
        log::debug!(
            "Attempt {}/{} left {} structural violation(s)",
            attempts,
            max_attempts,
            last.violations.len()
        );
    }

    let degraded = !last.violations.is_empty();
    if degraded {
        log::warn!(
            "Seed {}: {} structural violation(s) remain after {} attempts; keeping last grid",
            seed,
            last.violations.len(),
            attempts
        );
    }

    GenerationReport {
        seed,
        attempts,
        degraded,
        violations: last.violations,
        fallbacks: last.fallbacks,
    }
}

/// Draw one item with probability proportional to its weight. Falls back to
/// the first item if the weights cannot form a distribution.
pub fn pick_weighted<T: Copy, R: Rng>(rng: &mut R, items: &[(T, f64)]) -> Option<T> {
    let first = items.first()?.0;
    match WeightedIndex::new(items.iter().map(|(_, w)| *w)) {
        Ok(dist) => Some(items[dist.sample(rng)].0),
        Err(_) => Some(first),
    }
}

/// Required types missing from `present`.
pub fn missing_required(required: &[TerrainId], present: &[TerrainId]) -> Vec<TerrainId> {
    required
        .iter()
        .copied()
        .filter(|r| !present.contains(r))
        .collect()
}

/// Read-only view of a finished (or partly finished) terrain grid.
pub trait TerrainMap {
    fn registry(&self) -> &TerrainRegistry;

    /// Width in cells
    fn width(&self) -> usize;

    /// Height in cells
    fn height(&self) -> usize;

    /// Terrain at a cell, or `None` outside the grid or where nothing is placed.
    fn terrain_at(&self, x: usize, y: usize) -> Option<TerrainId>;

    /// Seed the current grid was generated from, if known.
    fn seed(&self) -> Option<u64>;

    fn terrain_grid(&self) -> Tilemap<Option<TerrainId>> {
        let mut grid = Tilemap::new_with(self.width(), self.height(), None);
        for (x, y, cell) in grid.iter_mut() {
            *cell = self.terrain_at(x, y);
        }
        grid
    }

    /// Dense integer codes in registry enumeration order; -1 where nothing
    /// has been placed yet.
    fn to_array(&self) -> Tilemap<i32> {
        self.terrain_grid()
            .map(|cell| cell.map_or(-1, |t| t.index() as i32))
    }

    /// Cell count per terrain name, for types that occur.
    fn terrain_distribution(&self) -> HashMap<String, usize> {
        let mut stats = HashMap::new();
        for y in 0..self.height() {
            for x in 0..self.width() {
                if let Some(t) = self.terrain_at(x, y) {
                    *stats
                        .entry(self.registry().name_of(t).to_string())
                        .or_insert(0) += 1;
                }
            }
        }
        stats
    }

    fn analyze_regions(&self) -> RegionAnalysis {
        analyze_regions(&self.terrain_grid())
    }
}
