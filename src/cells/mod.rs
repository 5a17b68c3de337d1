//! Cell-based generation: seeded region growth, then weighted infill.
//!
//! Each attempt runs three phases over an empty grid:
//! - seeding places a handful of spread-out region seeds ([`growth`]),
//! - growth floods outwards from them with decaying strength ([`growth`]),
//! - infill settles every cell still empty, row-major ([`infill`]).
//!
//! The finished grid is checked against every structural rule and the whole
//! attempt is repeated from scratch on failure, up to the configured limit.

mod growth;
mod infill;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::generation::{
    missing_required, run_with_retries, AttemptOutcome, GenerationReport, TerrainMap, Violation,
};
use crate::terrain::{TerrainId, TerrainRegistry, TerrainSet};
use crate::tilemap::Tilemap;

/// Where a region started growing, and as what.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionSeed {
    pub x: usize,
    pub y: usize,
    pub terrain: TerrainId,
}

/// Generates a map one cell at a time.
pub struct CellGenerator {
    width: usize,
    height: usize,
    set: TerrainSet,
    grid: Tilemap<Option<TerrainId>>,
    seeds: Vec<RegionSeed>,
    seed: Option<u64>,
    last_report: Option<GenerationReport>,
}

impl CellGenerator {
    pub fn new(width: usize, height: usize, set: TerrainSet, seed: Option<u64>) -> Self {
        Self {
            width,
            height,
            set,
            grid: Tilemap::new_with(width, height, None),
            seeds: Vec::new(),
            seed,
            last_report: None,
        }
    }

    pub fn terrain_set(&self) -> &TerrainSet {
        &self.set
    }

    /// Seeds of the last attempt.
    pub fn seeds(&self) -> &[RegionSeed] {
        &self.seeds
    }

    pub fn last_report(&self) -> Option<&GenerationReport> {
        self.last_report.as_ref()
    }

    pub fn get_cell(&self, x: usize, y: usize) -> Option<TerrainId> {
        *self.grid.try_get(x, y)?
    }

    /// Types that may go at an empty cell given the current grid.
    pub fn valid_terrains(&self, x: usize, y: usize) -> Vec<TerrainId> {
        if !self.grid.in_bounds(x, y) {
            return Vec::new();
        }
        allowed_terrains(&self.grid, &self.set, x, y)
    }

    /// Fill the grid. Reuses the constructor's or last seed when `seed` is
    /// `None`, drawing a fresh one only if neither exists.
    pub fn generate(&mut self, seed: Option<u64>) -> &GenerationReport {
        let seed = seed.or(self.seed).unwrap_or_else(rand::random);
        self.seed = Some(seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        log::debug!("Generating {}x{} cells with seed {}", self.width, self.height, seed);

        let max_attempts = self.set.retry.max_retries;
        let report = run_with_retries(seed, max_attempts, |attempt| {
            self.grid.fill(None);
            self.seeds = growth::place_seeds(&mut self.grid, &self.set, &mut rng);
            let grown = growth::grow_regions(&mut self.grid, &self.set, &self.seeds, &mut rng);
            let fallbacks = infill::fill_remaining(&mut self.grid, &self.set, &mut rng);
            log::debug!(
                "Attempt {}: {} seeds, {} cells grown, {} forced",
                attempt + 1,
                self.seeds.len(),
                grown,
                fallbacks
            );
            AttemptOutcome {
                violations: validate(&self.grid, &self.set),
                fallbacks,
            }
        });

        log::info!(
            "Cell map {}x{} seed {} finished in {} attempt(s){}",
            self.width,
            self.height,
            seed,
            report.attempts,
            if report.degraded { " (degraded)" } else { "" }
        );
        self.last_report.insert(report)
    }
}

impl TerrainMap for CellGenerator {
    fn registry(&self) -> &TerrainRegistry {
        &self.set.registry
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn terrain_at(&self, x: usize, y: usize) -> Option<TerrainId> {
        self.get_cell(x, y)
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/// Placed neighbor types of a cell, one entry per neighbor.
fn placed_neighbors(grid: &Tilemap<Option<TerrainId>>, x: usize, y: usize) -> Vec<TerrainId> {
    grid.neighbors(x, y)
        .into_iter()
        .filter_map(|(nx, ny)| *grid.get(nx, ny))
        .collect()
}

/// Whether `terrain` may go at the empty cell (x, y): compatible with every
/// placed neighbor, and its structural rule still satisfiable.
fn placement_allowed(
    grid: &Tilemap<Option<TerrainId>>,
    set: &TerrainSet,
    x: usize,
    y: usize,
    terrain: TerrainId,
) -> bool {
    set.compatibility
        .compatible_with_all(terrain, placed_neighbors(grid, x, y))
        && rule_satisfiable(grid, set, x, y, terrain)
}

/// One-step lookahead with `terrain` hypothetically at (x, y): each required
/// type is already adjacent, or some empty neighbor could take it without
/// clashing with that neighbor's own placed neighbors (including `terrain`).
fn rule_satisfiable(
    grid: &Tilemap<Option<TerrainId>>,
    set: &TerrainSet,
    x: usize,
    y: usize,
    terrain: TerrainId,
) -> bool {
    let Some(required) = set.registry.rules_of(terrain) else {
        return true;
    };
    let at = |cx: usize, cy: usize| {
        if (cx, cy) == (x, y) {
            Some(terrain)
        } else {
            *grid.get(cx, cy)
        }
    };

    required.iter().all(|&req| {
        grid.neighbors(x, y).into_iter().any(|(nx, ny)| match at(nx, ny) {
            Some(t) => t == req,
            None => grid
                .neighbors(nx, ny)
                .into_iter()
                .filter_map(|(mx, my)| at(mx, my))
                .all(|m| set.compatibility.is_compatible(req, m)),
        })
    })
}

fn allowed_terrains(grid: &Tilemap<Option<TerrainId>>, set: &TerrainSet, x: usize, y: usize) -> Vec<TerrainId> {
    set.registry
        .ids()
        .filter(|&t| placement_allowed(grid, set, x, y, t))
        .collect()
}

fn validate(grid: &Tilemap<Option<TerrainId>>, set: &TerrainSet) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (x, y, cell) in grid.iter() {
        let Some(terrain) = *cell else { continue };
        let Some(required) = set.registry.rules_of(terrain) else {
            continue;
        };
        let missing = missing_required(required, &placed_neighbors(grid, x, y));
        if !missing.is_empty() {
            violations.push(Violation { x, y, terrain, missing });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> TerrainSet {
        TerrainSet::default_phase().unwrap()
    }

    fn id(set: &TerrainSet, name: &str) -> TerrainId {
        set.registry.id_of(name).unwrap()
    }

    #[test]
    fn test_generate_covers_grid() {
        let mut gen = CellGenerator::new(12, 9, set(), None);
        gen.generate(Some(3));
        for y in 0..9 {
            for x in 0..12 {
                assert!(gen.get_cell(x, y).is_some());
            }
        }
        assert_eq!(gen.get_cell(12, 0), None);
        assert_eq!(gen.get_cell(0, 9), None);
    }

    #[test]
    fn test_same_seed_same_grid() {
        let mut a = CellGenerator::new(16, 16, set(), None);
        let mut b = CellGenerator::new(16, 16, set(), None);
        a.generate(Some(77));
        b.generate(Some(77));
        assert_eq!(a.to_array(), b.to_array());
        assert_eq!(a.seeds(), b.seeds());
    }

    #[test]
    fn test_seed_recorded_when_absent() {
        let mut gen = CellGenerator::new(4, 4, set(), None);
        let seed = gen.generate(None).seed;
        assert_eq!(gen.seed(), Some(seed));
        let before = gen.to_array();
        gen.generate(None);
        assert_eq!(gen.to_array(), before);
    }

    /// Default phase with cliffs made common enough to show up on small grids.
    fn cliff_heavy_set() -> TerrainSet {
        let mut doc = crate::config::PhaseDocument::embedded_default().unwrap();
        let phase = doc.phases.get_mut("2").unwrap();
        phase.additional_cell_types.get_mut("cliff").unwrap().weight = 20.0;
        TerrainSet::from_document(&doc, Some("2")).unwrap()
    }

    /// Cells whose required types are not all among their 4-neighbors,
    /// read straight off the finished map.
    fn unmet_rules(gen: &CellGenerator) -> Vec<(usize, usize)> {
        let registry = &gen.terrain_set().registry;
        let mut unmet = Vec::new();
        for y in 0..gen.height() {
            for x in 0..gen.width() {
                let t = gen.get_cell(x, y).unwrap();
                let Some(required) = registry.rules_of(t) else { continue };
                let around: Vec<TerrainId> = [(0i64, -1i64), (0, 1), (1, 0), (-1, 0)]
                    .iter()
                    .filter_map(|(dx, dy)| {
                        let nx = usize::try_from(x as i64 + dx).ok()?;
                        let ny = usize::try_from(y as i64 + dy).ok()?;
                        gen.get_cell(nx, ny)
                    })
                    .collect();
                if required.iter().any(|r| !around.contains(r)) {
                    unmet.push((x, y));
                }
            }
        }
        unmet
    }

    #[test]
    fn test_cliffs_get_required_neighbors_unless_degraded() {
        let mut cliffs_seen = 0;
        for seed in [1u64, 42, 1337, 2024] {
            let mut gen = CellGenerator::new(10, 10, cliff_heavy_set(), None);
            let report = gen.generate(Some(seed)).clone();
            let cliff = id(&gen.set, "cliff");
            cliffs_seen += gen.grid.iter().filter(|(_, _, c)| **c == Some(cliff)).count();

            let unmet = unmet_rules(&gen);
            assert_eq!(report.degraded, !unmet.is_empty(), "seed {}", seed);
            let reported: Vec<(usize, usize)> = report.violations.iter().map(|v| (v.x, v.y)).collect();
            assert_eq!(reported, unmet, "seed {}", seed);
        }
        assert!(cliffs_seen > 0);
    }

    #[test]
    fn test_adjacent_cells_compatible_when_nothing_forced() {
        // Plain is compatible with every lowland type, so infill never forces
        let doc = crate::config::PhaseDocument::embedded_default().unwrap();
        let lowlands = TerrainSet::from_document(&doc, Some("1")).unwrap();
        let mut gen = CellGenerator::new(10, 10, lowlands, None);
        let report = gen.generate(Some(5)).clone();
        assert_eq!(report.fallbacks, 0);
        assert!(!report.degraded);

        let compat = &gen.set.compatibility;
        for y in 0..10 {
            for x in 0..10 {
                let t = gen.get_cell(x, y).unwrap();
                for (nx, ny) in gen.grid.neighbors(x, y) {
                    assert!(compat.is_compatible(t, gen.get_cell(nx, ny).unwrap()));
                }
            }
        }
    }

    #[test]
    fn test_rule_lookahead() {
        let set = set();
        let cliff = id(&set, "cliff");
        let plain = id(&set, "plain");
        let highland = id(&set, "highland");
        let forest = id(&set, "forest");

        // Empty surroundings: satisfiable
        let mut grid = Tilemap::new_with(3, 3, None);
        assert!(rule_satisfiable(&grid, &set, 1, 1, cliff));

        // Lone corner cell with plain beside it: highland can still go below
        grid.set(1, 0, Some(plain));
        assert!(rule_satisfiable(&grid, &set, 0, 0, cliff));

        // ...unless that last slot only touches forest
        grid.set(1, 1, Some(forest));
        assert!(!rule_satisfiable(&grid, &set, 0, 0, cliff));

        // Both present
        let mut grid = Tilemap::new_with(2, 2, None);
        grid.set(1, 0, Some(plain));
        grid.set(0, 1, Some(highland));
        assert!(rule_satisfiable(&grid, &set, 0, 0, cliff));
        assert!(placement_allowed(&grid, &set, 0, 0, cliff));
        assert!(!placement_allowed(&grid, &set, 0, 0, forest));
    }

    #[test]
    fn test_validate_reports_missing_neighbors() {
        let set = set();
        let cliff = id(&set, "cliff");
        let plain = id(&set, "plain");
        let mut grid = Tilemap::new_with(2, 1, Some(plain));
        grid.set(0, 0, Some(cliff));
        let violations = validate(&grid, &set);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].missing, vec![id(&set, "highland")]);
    }

    #[test]
    fn test_valid_terrains_out_of_bounds_empty() {
        let gen = CellGenerator::new(3, 3, set(), None);
        assert!(gen.valid_terrains(3, 3).is_empty());
        assert_eq!(gen.valid_terrains(1, 1).len(), gen.set.registry.len());
    }
}
