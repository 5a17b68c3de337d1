//! Phase-structured terrain configuration.
//!
//! A configuration document declares one or more *phases*. Each phase lists
//! its cell types (weight, colour, structural rules), edge types,
//! compatibility pairs and tile templates, and may `extends` an earlier
//! phase. A default document is embedded in the binary via `include_str!`;
//! a file on disk can replace it.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_PHASES_JSON: &str = include_str!("../data/defaults/terrain_phases.json");

/// Map entries in document order. Terrain enumeration order is part of the
/// integer coding of a map, so a sorted map will not do.
pub type NamedEntries<V> = IndexMap<String, V>;

/// Insert or replace every entry of `other`. Replaced keys keep their
/// original position.
fn merge_entries<V: Clone>(into: &mut NamedEntries<V>, other: &NamedEntries<V>) {
    into.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// A phase reference. Older documents number their phases, newer ones name them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseRef {
    Number(u64),
    Name(String),
}

impl PhaseRef {
    pub fn key(&self) -> String {
        match self {
            PhaseRef::Number(n) => n.to_string(),
            PhaseRef::Name(s) => s.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub current_phase: Option<PhaseRef>,
    pub version: Option<String>,
}

/// `generation_rules.required_neighbors.must_have`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequiredNeighbors {
    pub must_have: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRules {
    pub required_neighbors: Option<RequiredNeighbors>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellTypeConfig {
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// RGB in 0..=1
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub generation_rules: Option<GenerationRules>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_color() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

/// The four faces of a tile template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub north: String,
    pub south: String,
    pub east: String,
    pub west: String,
}

/// How a template's block of terrain is laid out. Shapes are rendered at
/// whatever tile size the generator uses; explicit rows are scaled
/// nearest-neighbour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PatternConfig {
    Fill {
        terrain: String,
    },
    /// A band across the middle rows, running east-west.
    HorizontalBand {
        base: String,
        band: String,
        #[serde(default = "default_band_width")]
        band_width: usize,
    },
    /// A band down the middle columns, running north-south.
    VerticalBand {
        base: String,
        band: String,
        #[serde(default = "default_band_width")]
        band_width: usize,
    },
    /// Top half one terrain, bottom half another.
    Split {
        north: String,
        south: String,
    },
    Rows {
        rows: Vec<Vec<String>>,
    },
}

fn default_band_width() -> usize {
    3
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Terrain type whose structural rules apply to the template. Defaults to
    /// the terrain named like the template, else the pattern's majority terrain.
    #[serde(default)]
    pub terrain: Option<String>,
    pub edges: EdgeConfig,
    pub pattern: PatternConfig,
}

/// One phase as written in the document, before inheritance is resolved.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "extends_phase")]
    pub extends: Option<PhaseRef>,
    pub cell_types: NamedEntries<CellTypeConfig>,
    pub additional_cell_types: NamedEntries<CellTypeConfig>,
    pub edge_types: NamedEntries<String>,
    pub additional_edge_types: NamedEntries<String>,
    pub edge_compatibility: Vec<Vec<String>>,
    pub additional_compatibility: Vec<Vec<String>>,
    pub tile_templates: Vec<TemplateConfig>,
    pub additional_tile_templates: Vec<TemplateConfig>,
}

/// Tuning for seeded region growth in the cell generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionGrowthConfig {
    pub target_region_count: usize,
    /// Minimum seed spacing as a fraction of the longer grid side.
    pub min_region_distance: f64,
    pub growth_strength: f64,
    pub growth_decay: f64,
    pub growth_threshold: f64,
    pub max_placement_attempts: usize,
    /// Multiplier per same-type neighbor during infill.
    pub neighbor_influence: f64,
    /// Multiplier per pair of compatible, different-type neighbors during infill.
    pub compatibility_boost: f64,
    /// Border band excluded from seeding, as a fraction of each side.
    pub interior_margin: f64,
}

impl Default for RegionGrowthConfig {
    fn default() -> Self {
        Self {
            target_region_count: 7,
            min_region_distance: 0.15,
            growth_strength: 0.95,
            growth_decay: 0.95,
            growth_threshold: 0.05,
            max_placement_attempts: 100,
            neighbor_influence: 1.8,
            compatibility_boost: 1.3,
            interior_margin: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Full-grid attempts before a run is reported as degraded.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 10 }
    }
}

/// The whole configuration document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDocument {
    pub metadata: Metadata,
    pub phases: NamedEntries<PhaseConfig>,
    pub region_generation: RegionGrowthConfig,
    pub generation: RetryConfig,
}

/// Summary of a resolved phase for reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhaseInfo {
    pub phase: String,
    pub name: String,
    pub description: String,
}

/// A phase with its `extends` chain folded in.
#[derive(Clone, Debug, Default)]
pub struct ResolvedPhase {
    pub key: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub cell_types: NamedEntries<CellTypeConfig>,
    pub edge_types: NamedEntries<String>,
    pub compatibility: Vec<Vec<String>>,
    pub templates: Vec<TemplateConfig>,
    pub region_generation: RegionGrowthConfig,
    pub retry: RetryConfig,
}

impl ResolvedPhase {
    pub fn info(&self) -> PhaseInfo {
        PhaseInfo {
            phase: self.key.clone(),
            name: self
                .name
                .clone()
                .unwrap_or_else(|| format!("Phase {}", self.key)),
            description: self.description.clone().unwrap_or_default(),
        }
    }

    /// Fold one phase's own entries over what has been resolved so far.
    fn apply(&mut self, phase: &PhaseConfig) {
        if phase.name.is_some() {
            self.name = phase.name.clone();
        }
        if phase.description.is_some() {
            self.description = phase.description.clone();
        }

        merge_entries(&mut self.cell_types, &phase.cell_types);
        merge_entries(&mut self.cell_types, &phase.additional_cell_types);
        merge_entries(&mut self.edge_types, &phase.edge_types);
        merge_entries(&mut self.edge_types, &phase.additional_edge_types);
        self.compatibility.extend(phase.edge_compatibility.iter().cloned());
        self.compatibility.extend(phase.additional_compatibility.iter().cloned());

        for template in phase
            .tile_templates
            .iter()
            .chain(phase.additional_tile_templates.iter())
        {
            match self.templates.iter_mut().find(|t| t.name == template.name) {
                Some(existing) => *existing = template.clone(),
                None => self.templates.push(template.clone()),
            }
        }
    }
}

impl PhaseDocument {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// The document compiled into the binary.
    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_json_str(DEFAULT_PHASES_JSON)
    }

    /// Phase used when none is requested: `metadata.current_phase`, else the
    /// first declared phase.
    pub fn current_phase(&self) -> Option<String> {
        self.metadata
            .current_phase
            .as_ref()
            .map(PhaseRef::key)
            .or_else(|| self.phases.keys().next().cloned())
    }

    pub fn available_phases(&self) -> Vec<String> {
        self.phases.keys().cloned().collect()
    }

    /// Resolve a phase and its `extends` chain. Base phases are applied
    /// depth-first, then the requested phase's own entries.
    pub fn resolve_phase(&self, phase: Option<&str>) -> Result<ResolvedPhase, ConfigError> {
        let key = match phase {
            Some(p) => p.to_string(),
            None => self
                .current_phase()
                .ok_or_else(|| ConfigError::UnknownPhase(String::from("<none>")))?,
        };

        // Walk up to the root, then apply from the root back down.
        let mut chain: Vec<(&str, &PhaseConfig)> = Vec::new();
        let mut next = Some(key.clone());
        while let Some(current) = next {
            if chain.iter().any(|(k, _)| *k == current) {
                return Err(ConfigError::CyclicExtends(key));
            }
            let (stored_key, config) = self
                .phases
                .get_key_value(current.as_str())
                .ok_or_else(|| ConfigError::UnknownPhase(current.clone()))?;
            chain.push((stored_key.as_str(), config));
            next = config.extends.as_ref().map(PhaseRef::key);
        }

        let mut resolved = ResolvedPhase {
            key: key.clone(),
            region_generation: self.region_generation.clone(),
            retry: self.generation.clone(),
            ..Default::default()
        };
        for (_, config) in chain.iter().rev() {
            resolved.apply(config);
        }

        if resolved.cell_types.is_empty() {
            return Err(ConfigError::EmptyPhase(key));
        }
        log::debug!(
            "Resolved phase '{}' through {} level(s): {} cell types, {} templates",
            resolved.key,
            chain.len(),
            resolved.cell_types.len(),
            resolved.templates.len()
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_JSON: &str = r#"{
        "metadata": { "current_phase": 2 },
        "phases": {
            "1": {
                "name": "Base",
                "description": "base phase",
                "cell_types": {
                    "plain": { "weight": 3.0, "color": [0.4, 0.8, 0.2] },
                    "forest": { "weight": 2.0 }
                },
                "edge_compatibility": [["plain", "forest"]]
            },
            "2": {
                "extends_phase": 1,
                "name": "Highlands",
                "additional_cell_types": {
                    "highland": { "weight": 1.5 },
                    "plain": { "weight": 4.0 }
                },
                "additional_compatibility": [["plain", "highland"]]
            },
            "3": {
                "extends": "2",
                "additional_cell_types": {
                    "cliff": {
                        "weight": 0.5,
                        "generation_rules": { "required_neighbors": { "must_have": ["plain", "highland"] } }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_entries_keep_document_order() {
        let doc = PhaseDocument::from_json_str(CHAIN_JSON).unwrap();
        assert_eq!(doc.available_phases(), vec!["1", "2", "3"]);
        let phase = doc.resolve_phase(Some("1")).unwrap();
        assert_eq!(phase.cell_types.keys().map(String::as_str).collect::<Vec<_>>(), vec!["plain", "forest"]);
    }

    #[test]
    fn test_duplicate_key_keeps_first_position() {
        let json = r#"{ "phases": { "p": { "cell_types": {
            "plain": { "weight": 1.0 },
            "forest": {},
            "plain": { "weight": 5.0 }
        } } } }"#;
        let doc = PhaseDocument::from_json_str(json).unwrap();
        let phase = doc.resolve_phase(Some("p")).unwrap();
        assert_eq!(phase.cell_types.keys().map(String::as_str).collect::<Vec<_>>(), vec!["plain", "forest"]);
        assert_eq!(phase.cell_types.get("plain").unwrap().weight, 5.0);
    }

    #[test]
    fn test_extends_chain_merges_depth_first() {
        let doc = PhaseDocument::from_json_str(CHAIN_JSON).unwrap();
        let phase = doc.resolve_phase(Some("3")).unwrap();

        assert_eq!(
            phase.cell_types.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["plain", "forest", "highland", "cliff"]
        );
        // Override keeps position, replaces value
        assert_eq!(phase.cell_types.get("plain").unwrap().weight, 4.0);
        // Scalars: nearest override wins
        assert_eq!(phase.name.as_deref(), Some("Highlands"));
        assert_eq!(phase.description.as_deref(), Some("base phase"));
        assert_eq!(phase.compatibility.len(), 2);

        let rules = phase.cell_types.get("cliff").unwrap().generation_rules.clone().unwrap();
        assert_eq!(rules.required_neighbors.unwrap().must_have, vec!["plain", "highland"]);
    }

    #[test]
    fn test_current_phase_from_metadata() {
        let doc = PhaseDocument::from_json_str(CHAIN_JSON).unwrap();
        assert_eq!(doc.current_phase().as_deref(), Some("2"));
        let phase = doc.resolve_phase(None).unwrap();
        assert_eq!(phase.key, "2");
        assert_eq!(phase.info().name, "Highlands");
    }

    #[test]
    fn test_unknown_phase_is_config_error() {
        let doc = PhaseDocument::from_json_str(CHAIN_JSON).unwrap();
        assert!(matches!(doc.resolve_phase(Some("9")), Err(ConfigError::UnknownPhase(p)) if p == "9"));
    }

    #[test]
    fn test_cyclic_extends_rejected() {
        let json = r#"{ "phases": {
            "a": { "extends": "b", "cell_types": { "plain": {} } },
            "b": { "extends": "a" }
        } }"#;
        let doc = PhaseDocument::from_json_str(json).unwrap();
        assert!(matches!(doc.resolve_phase(Some("a")), Err(ConfigError::CyclicExtends(_))));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            PhaseDocument::from_json_str("{ \"phases\": [1, 2] }"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_tuning_defaults_when_omitted() {
        let doc = PhaseDocument::from_json_str(CHAIN_JSON).unwrap();
        assert_eq!(doc.region_generation, RegionGrowthConfig::default());
        assert_eq!(doc.generation.max_retries, 10);
    }

    #[test]
    fn test_embedded_default_parses() {
        let doc = PhaseDocument::embedded_default().unwrap();
        for phase in doc.available_phases() {
            doc.resolve_phase(Some(&phase)).unwrap();
        }
    }
}
