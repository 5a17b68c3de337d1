//! Edge-matching tile placement with bounded full-grid retries.
//!
//! Slots are filled row-major. A template is a candidate for a slot when:
//! 1. every placed neighbor meets it with equal or compatible edges,
//! 2. its own structural rule is still satisfiable (one-step lookahead),
//! 3. it does not leave a placed neighbor's rule unsatisfiable.
//!
//! Checks 2 and 3 look at a hypothetical grid with the candidate overlaid on
//! the live one; the live grid is only written once a template is chosen.
//! The lookahead only asks whether a required type *could* sit in an empty
//! adjacent slot, not whether the rest of the grid can still be completed,
//! so it can accept placements that later fail validation. The retry loop
//! absorbs that.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::compatibility::CompatibilityModel;
use crate::error::ConfigError;
use crate::generation::{
    missing_required, pick_weighted, run_with_retries, AttemptOutcome, GenerationReport,
    TerrainMap, Violation,
};
use crate::terrain::{TerrainId, TerrainRegistry, TerrainSet};
use crate::tilemap::Tilemap;

use super::template::{Direction, Template, TemplateInfo};

pub const DEFAULT_TILE_SIZE: usize = 8;

/// The slot grid as seen with one extra template hypothetically placed.
#[derive(Clone, Copy)]
struct SlotView<'a> {
    slots: &'a Tilemap<Option<usize>>,
    overlay: Option<(usize, usize, usize)>,
}

impl<'a> SlotView<'a> {
    fn live(slots: &'a Tilemap<Option<usize>>) -> Self {
        Self { slots, overlay: None }
    }

    fn with(slots: &'a Tilemap<Option<usize>>, x: usize, y: usize, template: usize) -> Self {
        Self { slots, overlay: Some((x, y, template)) }
    }

    fn at(&self, x: usize, y: usize) -> Option<usize> {
        match self.overlay {
            Some((ox, oy, t)) if ox == x && oy == y => Some(t),
            _ => *self.slots.get(x, y),
        }
    }

    fn neighbor(&self, x: usize, y: usize, dir: Direction) -> Option<(usize, usize)> {
        dir.step(x, y, self.slots.width, self.slots.height)
    }
}

/// Generates a map by placing pre-authored templates edge to edge.
pub struct TileGenerator {
    /// Width in slots
    width: usize,
    /// Height in slots
    height: usize,
    tile_size: usize,
    set: TerrainSet,
    /// Template index per slot
    slots: Tilemap<Option<usize>>,
    /// Slots expanded to `tile_size` blocks of cells
    cells: Tilemap<Option<TerrainId>>,
    /// Each template's pattern at `tile_size`
    blocks: Vec<Tilemap<TerrainId>>,
    seed: Option<u64>,
    last_report: Option<GenerationReport>,
}

impl TileGenerator {
    /// A generator for `width`×`height` slots of [`DEFAULT_TILE_SIZE`] cells.
    pub fn new(width: usize, height: usize, set: TerrainSet, seed: Option<u64>) -> Result<Self, ConfigError> {
        if set.templates.is_empty() {
            return Err(ConfigError::NoTemplates(set.phase.phase.clone()));
        }
        let mut generator = Self {
            width,
            height,
            tile_size: DEFAULT_TILE_SIZE,
            slots: Tilemap::new_with(width, height, None),
            cells: Tilemap::new_with(0, 0, None),
            blocks: Vec::new(),
            set,
            seed,
            last_report: None,
        };
        generator.resize_cells();
        Ok(generator)
    }

    /// Change the number of cells per slot side. Clears any generated map.
    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size.max(1);
        self.slots.fill(None);
        self.last_report = None;
        self.resize_cells();
        self
    }

    fn resize_cells(&mut self) {
        self.blocks = self.set.templates.iter().map(|t| t.render(self.tile_size)).collect();
        self.cells = Tilemap::new_with(self.width * self.tile_size, self.height * self.tile_size, None);
    }

    pub fn slot_width(&self) -> usize {
        self.width
    }

    pub fn slot_height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn templates(&self) -> &[Template] {
        &self.set.templates
    }

    pub fn terrain_set(&self) -> &TerrainSet {
        &self.set
    }

    pub fn template_info(&self) -> Vec<TemplateInfo> {
        self.set
            .templates
            .iter()
            .map(|t| TemplateInfo::new(t, &self.set.registry))
            .collect()
    }

    pub fn last_report(&self) -> Option<&GenerationReport> {
        self.last_report.as_ref()
    }

    /// Template at a slot, or `None` outside the grid or before generation.
    pub fn get_tile(&self, x: usize, y: usize) -> Option<&Template> {
        let index = (*self.slots.try_get(x, y)?)?;
        Some(&self.set.templates[index])
    }

    /// Terrain at a cell of the expanded grid.
    pub fn get_cell(&self, x: usize, y: usize) -> Option<TerrainId> {
        *self.cells.try_get(x, y)?
    }

    /// Fill every slot. Reuses the constructor's or last seed when `seed` is
    /// `None`, drawing a fresh one only if neither exists.
    pub fn generate(&mut self, seed: Option<u64>) -> &GenerationReport {
        let seed = seed.or(self.seed).unwrap_or_else(rand::random);
        self.seed = Some(seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        log::debug!(
            "Generating {}x{} tiles ({}px) with seed {}",
            self.width,
            self.height,
            self.tile_size,
            seed
        );

        let max_attempts = self.set.retry.max_retries;
        let report = run_with_retries(seed, max_attempts, |_| {
            self.slots.fill(None);
            let fallbacks = self.fill_slots(&mut rng);
            AttemptOutcome {
                violations: self.validate(),
                fallbacks,
            }
        });
        self.expand_cells();

        log::info!(
            "Tile map {}x{} seed {} finished in {} attempt(s){}",
            self.width,
            self.height,
            seed,
            report.attempts,
            if report.degraded { " (degraded)" } else { "" }
        );
        self.last_report.insert(report)
    }

    /// Templates allowed at a slot given what is placed now.
    pub fn valid_templates(&self, x: usize, y: usize) -> Vec<&Template> {
        if !self.slots.in_bounds(x, y) {
            return Vec::new();
        }
        self.candidates(x, y)
            .into_iter()
            .map(|i| &self.set.templates[i])
            .collect()
    }

    fn fill_slots(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let mut fallbacks = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let weighted: Vec<(usize, f64)> = self
                    .candidates(x, y)
                    .into_iter()
                    .map(|i| (i, self.set.templates[i].weight))
                    .collect();

                let chosen = match pick_weighted(rng, &weighted) {
                    Some(i) => i,
                    None => {
                        log::debug!("No template fits slot ({}, {}); using '{}'", x, y, self.set.templates[0].name);
                        fallbacks += 1;
                        0
                    }
                };
                self.slots.set(x, y, Some(chosen));
            }
        }
        fallbacks
    }

    fn candidates(&self, x: usize, y: usize) -> Vec<usize> {
        let live = SlotView::live(&self.slots);
        (0..self.set.templates.len())
            .filter(|&i| self.edges_match(live, x, y, i))
            .filter(|&i| {
                let view = SlotView::with(&self.slots, x, y, i);
                self.rule_satisfiable(view, x, y) && self.neighbors_still_satisfiable(view, x, y)
            })
            .collect()
    }

    fn edges_match(&self, view: SlotView, x: usize, y: usize, template: usize) -> bool {
        let candidate = &self.set.templates[template];
        Direction::all().iter().all(|&dir| {
            match view.neighbor(x, y, dir).and_then(|(nx, ny)| view.at(nx, ny)) {
                Some(n) => candidate.connects(&self.set.templates[n], dir, &self.set.compatibility),
                None => true,
            }
        })
    }

    /// One-step lookahead: every required type is already adjacent, or could
    /// go in an empty adjacent slot facing a compatible edge and compatible
    /// with that slot's placed neighbors.
    fn rule_satisfiable(&self, view: SlotView, x: usize, y: usize) -> bool {
        let Some(index) = view.at(x, y) else {
            return true;
        };
        let template = &self.set.templates[index];
        let Some(required) = self.set.registry.rules_of(template.terrain) else {
            return true;
        };
        let compat: &CompatibilityModel = &self.set.compatibility;

        required.iter().all(|&req| {
            Direction::all().iter().any(|&dir| {
                let Some((nx, ny)) = view.neighbor(x, y, dir) else {
                    return false;
                };
                match view.at(nx, ny) {
                    Some(n) => self.set.templates[n].terrain == req,
                    None => {
                        compat.is_compatible(template.edge(dir), req)
                            && Direction::all().iter().all(|&d2| {
                                view.neighbor(nx, ny, d2)
                                    .and_then(|(mx, my)| view.at(mx, my))
                                    .map_or(true, |m| compat.is_compatible(req, self.set.templates[m].terrain))
                            })
                    }
                }
            })
        })
    }

    fn neighbors_still_satisfiable(&self, view: SlotView, x: usize, y: usize) -> bool {
        Direction::all().iter().all(|&dir| match view.neighbor(x, y, dir) {
            Some((nx, ny)) if view.at(nx, ny).is_some() => self.rule_satisfiable(view, nx, ny),
            _ => true,
        })
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (x, y, slot) in self.slots.iter() {
            let Some(index) = *slot else { continue };
            let terrain = self.set.templates[index].terrain;
            let Some(required) = self.set.registry.rules_of(terrain) else {
                continue;
            };
            let present: Vec<TerrainId> = self
                .slots
                .neighbors(x, y)
                .into_iter()
                .filter_map(|(nx, ny)| (*self.slots.get(nx, ny)).map(|n| self.set.templates[n].terrain))
                .collect();
            let missing = missing_required(required, &present);
            if !missing.is_empty() {
                violations.push(Violation { x, y, terrain, missing });
            }
        }
        violations
    }

    fn expand_cells(&mut self) {
        let size = self.tile_size;
        self.cells.fill(None);
        for (tx, ty, slot) in self.slots.iter() {
            let Some(index) = *slot else { continue };
            let block = &self.blocks[index];
            for (px, py, &terrain) in block.iter() {
                self.cells.set(tx * size + px, ty * size + py, Some(terrain));
            }
        }
    }
}

impl TerrainMap for TileGenerator {
    fn registry(&self) -> &TerrainRegistry {
        &self.set.registry
    }

    fn width(&self) -> usize {
        self.cells.width
    }

    fn height(&self) -> usize {
        self.cells.height
    }

    fn terrain_at(&self, x: usize, y: usize) -> Option<TerrainId> {
        self.get_cell(x, y)
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }
}
