use crate::compatibility::CompatibilityModel;
use crate::config::{PatternConfig, TemplateConfig};
use crate::error::ConfigError;
use crate::terrain::{TerrainId, TerrainRegistry};
use crate::tilemap::Tilemap;

/// Side of a slot, and the direction towards the neighbor on that side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn all() -> &'static [Direction] {
        &[Direction::North, Direction::South, Direction::East, Direction::West]
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Neighbor coordinate in this direction, if inside `width`×`height`.
    pub fn step(self, x: usize, y: usize, width: usize, height: usize) -> Option<(usize, usize)> {
        match self {
            Direction::North if y > 0 => Some((x, y - 1)),
            Direction::South if y + 1 < height => Some((x, y + 1)),
            Direction::West if x > 0 => Some((x - 1, y)),
            Direction::East if x + 1 < width => Some((x + 1, y)),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

/// Edge types a template presents on each side. Edge types are terrain ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edges {
    pub north: TerrainId,
    pub south: TerrainId,
    pub east: TerrainId,
    pub west: TerrainId,
}

impl Edges {
    pub fn get(&self, dir: Direction) -> TerrainId {
        match dir {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Fill(TerrainId),
    HorizontalBand { base: TerrainId, band: TerrainId, band_width: usize },
    VerticalBand { base: TerrainId, band: TerrainId, band_width: usize },
    Split { north: TerrainId, south: TerrainId },
    Rows(Tilemap<TerrainId>),
}

impl Pattern {
    /// Terrain covering the most of the pattern; ties go to the lower id.
    fn dominant(&self, type_count: usize) -> TerrainId {
        match self {
            Pattern::Fill(t) => *t,
            Pattern::HorizontalBand { base, .. } | Pattern::VerticalBand { base, .. } => *base,
            Pattern::Split { north, .. } => *north,
            Pattern::Rows(rows) => {
                let mut counts = vec![0usize; type_count];
                for (_, _, t) in rows.iter() {
                    counts[t.index()] += 1;
                }
                let mut best = 0;
                for (i, &c) in counts.iter().enumerate() {
                    if c > counts[best] {
                        best = i;
                    }
                }
                TerrainId(best as u16)
            }
        }
    }
}

/// A pre-authored block of terrain with four typed edges.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub name: String,
    pub description: Option<String>,
    pub weight: f64,
    /// Whose structural rules this template must satisfy.
    pub terrain: TerrainId,
    pub edges: Edges,
    pub pattern: Pattern,
}

impl Template {
    pub fn from_config(config: &TemplateConfig, registry: &TerrainRegistry) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            name: config.name.clone(),
            reason,
        };
        let resolve = |what: &str, name: &str| {
            registry.id_of(name).ok_or_else(|| ConfigError::UnknownTerrain {
                context: format!("{} of template '{}'", what, config.name),
                name: name.to_string(),
            })
        };

        if !(config.weight.is_finite() && config.weight > 0.0) {
            return Err(invalid(format!("weight must be positive, got {}", config.weight)));
        }

        let edges = Edges {
            north: resolve("north edge", &config.edges.north)?,
            south: resolve("south edge", &config.edges.south)?,
            east: resolve("east edge", &config.edges.east)?,
            west: resolve("west edge", &config.edges.west)?,
        };

        let pattern = match &config.pattern {
            PatternConfig::Fill { terrain } => Pattern::Fill(resolve("pattern", terrain)?),
            PatternConfig::HorizontalBand { base, band, band_width } => Pattern::HorizontalBand {
                base: resolve("pattern", base)?,
                band: resolve("pattern", band)?,
                band_width: *band_width,
            },
            PatternConfig::VerticalBand { base, band, band_width } => Pattern::VerticalBand {
                base: resolve("pattern", base)?,
                band: resolve("pattern", band)?,
                band_width: *band_width,
            },
            PatternConfig::Split { north, south } => Pattern::Split {
                north: resolve("pattern", north)?,
                south: resolve("pattern", south)?,
            },
            PatternConfig::Rows { rows } => {
                let mut ids = Vec::with_capacity(rows.len());
                for row in rows {
                    ids.push(
                        row.iter()
                            .map(|name| resolve("pattern", name))
                            .collect::<Result<Vec<_>, _>>()?,
                    );
                }
                let grid = Tilemap::from_rows(ids)
                    .ok_or_else(|| invalid(String::from("pattern rows have different lengths")))?;
                if grid.width == 0 || grid.height == 0 {
                    return Err(invalid(String::from("pattern rows are empty")));
                }
                Pattern::Rows(grid)
            }
        };

        let terrain = match &config.terrain {
            Some(name) => resolve("terrain", name)?,
            None => registry
                .id_of(&config.name)
                .unwrap_or_else(|| pattern.dominant(registry.len())),
        };

        Ok(Self {
            name: config.name.clone(),
            description: config.description.clone(),
            weight: config.weight,
            terrain,
            edges,
            pattern,
        })
    }

    pub fn edge(&self, dir: Direction) -> TerrainId {
        self.edges.get(dir)
    }

    /// Whether `other`, sitting in direction `dir` from this template, meets
    /// it with equal or compatible edges.
    pub fn connects(&self, other: &Template, dir: Direction, compat: &CompatibilityModel) -> bool {
        let mine = self.edge(dir);
        let theirs = other.edge(dir.opposite());
        mine == theirs || compat.is_compatible(mine, theirs)
    }

    /// Lay the pattern out as a `size`×`size` block of cells.
    pub fn render(&self, size: usize) -> Tilemap<TerrainId> {
        let size = size.max(1);
        let band_range = |band_width: usize| {
            let start = (size / 2).saturating_sub(band_width / 2);
            start..(start + band_width).min(size)
        };

        match &self.pattern {
            Pattern::Fill(t) => Tilemap::new_with(size, size, *t),
            Pattern::HorizontalBand { base, band, band_width } => {
                let mut block = Tilemap::new_with(size, size, *base);
                for y in band_range(*band_width) {
                    for x in 0..size {
                        block.set(x, y, *band);
                    }
                }
                block
            }
            Pattern::VerticalBand { base, band, band_width } => {
                let mut block = Tilemap::new_with(size, size, *base);
                for x in band_range(*band_width) {
                    for y in 0..size {
                        block.set(x, y, *band);
                    }
                }
                block
            }
            Pattern::Split { north, south } => {
                let mut block = Tilemap::new_with(size, size, *south);
                for y in 0..size / 2 {
                    for x in 0..size {
                        block.set(x, y, *north);
                    }
                }
                block
            }
            Pattern::Rows(rows) => {
                // Nearest-neighbour scale to the tile size
                let mut block = Tilemap::new_with(size, size, *rows.get(0, 0));
                for y in 0..size {
                    for x in 0..size {
                        let sx = x * rows.width / size;
                        let sy = y * rows.height / size;
                        block.set(x, y, *rows.get(sx, sy));
                    }
                }
                block
            }
        }
    }
}

/// Reporting view of a template.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub description: String,
    pub weight: f64,
    pub terrain: String,
    /// north, south, east, west
    pub edges: [String; 4],
}

impl TemplateInfo {
    pub fn new(template: &Template, registry: &TerrainRegistry) -> Self {
        let edge = |dir| registry.name_of(template.edge(dir)).to_string();
        Self {
            name: template.name.clone(),
            description: template.description.clone().unwrap_or_default(),
            weight: template.weight,
            terrain: registry.name_of(template.terrain).to_string(),
            edges: [
                edge(Direction::North),
                edge(Direction::South),
                edge(Direction::East),
                edge(Direction::West),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainSet;

    fn find<'a>(set: &'a TerrainSet, name: &str) -> &'a Template {
        set.templates.iter().find(|t| t.name == name).unwrap()
    }

    #[test]
    fn test_river_band_rendering() {
        let set = TerrainSet::default_phase().unwrap();
        let plain = set.registry.id_of("plain").unwrap();
        let river = set.registry.id_of("river").unwrap();

        let block = find(&set, "river_horizontal").render(8);
        for x in 0..8 {
            assert_eq!(*block.get(x, 2), plain);
            assert_eq!(*block.get(x, 3), river);
            assert_eq!(*block.get(x, 4), river);
            assert_eq!(*block.get(x, 5), river);
            assert_eq!(*block.get(x, 6), plain);
        }

        let block = find(&set, "river_vertical").render(4);
        assert_eq!(*block.get(0, 0), plain);
        assert_eq!(*block.get(1, 0), river);
        assert_eq!(*block.get(3, 3), river);
    }

    #[test]
    fn test_split_rendering() {
        let set = TerrainSet::default_phase().unwrap();
        let block = find(&set, "highland_cliff").render(8);
        assert_eq!(*block.get(0, 3), set.registry.id_of("highland").unwrap());
        assert_eq!(*block.get(0, 4), set.registry.id_of("cliff").unwrap());
    }

    #[test]
    fn test_template_terrain_resolution() {
        let set = TerrainSet::default_phase().unwrap();
        assert_eq!(find(&set, "plain").terrain, set.registry.id_of("plain").unwrap());
        assert_eq!(find(&set, "highland_cliff").terrain, set.registry.id_of("cliff").unwrap());
        assert_eq!(find(&set, "river_vertical").terrain, set.registry.id_of("river").unwrap());
    }

    #[test]
    fn test_connects_uses_facing_edges() {
        let set = TerrainSet::default_phase().unwrap();
        let compat = &set.compatibility;
        let forest = find(&set, "forest");
        let river_h = find(&set, "river_horizontal");
        let mixed = find(&set, "mixed_plain_forest");

        // river_horizontal's west edge is river; forest/river are incompatible
        assert!(!forest.connects(river_h, Direction::East, compat));
        // mixed has a plain south edge; river_horizontal has a plain north edge
        assert!(mixed.connects(river_h, Direction::South, compat));
        // plain-forest compatible
        assert!(river_h.connects(forest, Direction::North, compat));
    }

    #[test]
    fn test_rows_pattern_scales() {
        let set = TerrainSet::default_phase().unwrap();
        let config: TemplateConfig = serde_json::from_str(
            r#"{
                "name": "checker",
                "edges": { "north": "plain", "south": "forest", "east": "plain", "west": "plain" },
                "pattern": { "shape": "rows", "rows": [["plain", "forest"], ["forest", "forest"]] }
            }"#,
        )
        .unwrap();
        let template = Template::from_config(&config, &set.registry).unwrap();
        assert_eq!(template.terrain, set.registry.id_of("forest").unwrap());
        let block = template.render(4);
        assert_eq!(*block.get(1, 1), set.registry.id_of("plain").unwrap());
        assert_eq!(*block.get(2, 1), set.registry.id_of("forest").unwrap());
        assert_eq!(*block.get(0, 3), set.registry.id_of("forest").unwrap());
    }

    #[test]
    fn test_unknown_edge_rejected() {
        let set = TerrainSet::default_phase().unwrap();
        let config: TemplateConfig = serde_json::from_str(
            r#"{
                "name": "bad",
                "edges": { "north": "lava", "south": "plain", "east": "plain", "west": "plain" },
                "pattern": { "shape": "fill", "terrain": "plain" }
            }"#,
        )
        .unwrap();
        assert!(matches!(
            Template::from_config(&config, &set.registry),
            Err(ConfigError::UnknownTerrain { name, .. }) if name == "lava"
        ));
    }

    #[test]
    fn test_template_info() {
        let set = TerrainSet::default_phase().unwrap();
        let info = TemplateInfo::new(find(&set, "mixed_plain_forest"), &set.registry);
        assert_eq!(info.edges, ["forest", "plain", "forest", "forest"].map(String::from));
        assert_eq!(info.terrain, "forest");
    }
}
