//! Terrain registry for one resolved phase.
//!
//! Terrain names come from configuration, so they are interned to small
//! integer [`TerrainId`]s once at load time. Generators compare ids, never
//! strings.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compatibility::CompatibilityModel;
use crate::config::{PhaseDocument, PhaseInfo, RegionGrowthConfig, ResolvedPhase, RetryConfig};
use crate::error::ConfigError;
use crate::tiles::Template;

/// Interned terrain identifier. The value is the type's position in
/// registry enumeration order, which is also its `to_array` code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerrainId(pub u16);

/// Largest number of types a registry can intern into [`TerrainId`].
pub const MAX_TERRAIN_TYPES: usize = u16::MAX as usize + 1;

impl TerrainId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A terrain type as loaded for the active phase.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainType {
    pub id: TerrainId,
    pub name: String,
    pub weight: f64,
    /// RGB in 0..=1, display only
    pub color: [f32; 3],
    pub description: Option<String>,
    /// Types that must appear among the 4-neighbors of every cell of this type.
    pub required_neighbors: Vec<TerrainId>,
    /// Description of the edge type tied to this terrain, if declared.
    pub edge_description: Option<String>,
}

impl TerrainType {
    pub fn color_rgb8(&self) -> (u8, u8, u8) {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (c(self.color[0]), c(self.color[1]), c(self.color[2]))
    }
}

/// Immutable set of terrain types for one phase.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainRegistry {
    types: Vec<TerrainType>,
    by_name: HashMap<String, TerrainId>,
}

impl TerrainRegistry {
    /// Build the registry from a resolved phase. Pure: the same phase always
    /// yields an equal registry.
    pub fn initialize(phase: &ResolvedPhase) -> Result<Self, ConfigError> {
        if phase.cell_types.is_empty() {
            return Err(ConfigError::EmptyPhase(phase.key.clone()));
        }
        if phase.cell_types.len() > MAX_TERRAIN_TYPES {
            return Err(ConfigError::TooManyTerrains {
                phase: phase.key.clone(),
                count: phase.cell_types.len(),
                max: MAX_TERRAIN_TYPES,
            });
        }

        let mut by_name = HashMap::new();
        for (i, name) in phase.cell_types.keys().enumerate() {
            by_name.insert(name.clone(), TerrainId(i as u16));
        }

        let lookup = |context: String, name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownTerrain {
                    context,
                    name: name.to_string(),
                })
        };

        for edge in phase.edge_types.keys() {
            lookup(String::from("edge type"), edge.as_str())?;
        }

        let mut types = Vec::with_capacity(phase.cell_types.len());
        for (i, (name, config)) in phase.cell_types.iter().enumerate() {
            if !(config.weight.is_finite() && config.weight > 0.0) {
                return Err(ConfigError::InvalidWeight {
                    name: name.to_string(),
                    weight: config.weight,
                });
            }

            let mut required_neighbors = Vec::new();
            let must_have = config
                .generation_rules
                .as_ref()
                .and_then(|rules| rules.required_neighbors.as_ref())
                .map(|req| req.must_have.as_slice())
                .unwrap_or(&[]);
            for required in must_have {
                let id = lookup(format!("generation rule of '{}'", name), required)?;
                if !required_neighbors.contains(&id) {
                    required_neighbors.push(id);
                }
            }

            types.push(TerrainType {
                id: TerrainId(i as u16),
                name: name.to_string(),
                weight: config.weight,
                color: config.color,
                description: config.description.clone(),
                required_neighbors,
                edge_description: phase.edge_types.get(name).cloned(),
            });
        }

        Ok(Self { types, by_name })
    }

    /// Terrain names in enumeration order.
    pub fn all_types(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn types(&self) -> &[TerrainType] {
        &self.types
    }

    pub fn ids(&self) -> impl Iterator<Item = TerrainId> + '_ {
        self.types.iter().map(|t| t.id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, id: TerrainId) -> &TerrainType {
        &self.types[id.index()]
    }

    pub fn id_of(&self, name: &str) -> Option<TerrainId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: TerrainId) -> &str {
        &self.types[id.index()].name
    }

    pub fn weight_of(&self, id: TerrainId) -> f64 {
        self.types[id.index()].weight
    }

    /// Weight by name; unknown names weigh 1.0.
    pub fn weight_by_name(&self, name: &str) -> f64 {
        self.id_of(name).map_or(1.0, |id| self.weight_of(id))
    }

    /// Required neighbor types, or `None` when the type has no structural rule.
    pub fn rules_of(&self, id: TerrainId) -> Option<&[TerrainId]> {
        let req = &self.types[id.index()].required_neighbors;
        if req.is_empty() {
            None
        } else {
            Some(req)
        }
    }

    pub fn color_of(&self, id: TerrainId) -> [f32; 3] {
        self.types[id.index()].color
    }

    /// Highest-weight type; ties go to the earliest declared.
    pub fn highest_weight(&self) -> TerrainId {
        let mut best = &self.types[0];
        for t in &self.types[1..] {
            if t.weight > best.weight {
                best = t;
            }
        }
        best.id
    }
}

/// Everything a generator reads: registry, compatibility, templates and
/// tuning for one phase. Fully built before any generator sees it and
/// shared read-only afterwards.
#[derive(Clone, Debug)]
pub struct TerrainSet {
    pub registry: Arc<TerrainRegistry>,
    pub compatibility: Arc<CompatibilityModel>,
    pub templates: Arc<[Template]>,
    pub growth: RegionGrowthConfig,
    pub retry: RetryConfig,
    pub phase: PhaseInfo,
}

impl TerrainSet {
    pub fn from_phase(phase: &ResolvedPhase) -> Result<Self, ConfigError> {
        let registry = TerrainRegistry::initialize(phase)?;
        let compatibility = CompatibilityModel::from_pairs(&registry, &phase.compatibility)?;
        let templates = phase
            .templates
            .iter()
            .map(|config| Template::from_config(config, &registry))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Loaded phase '{}': {} terrain types, {} compatibility pairs, {} templates",
            phase.key,
            registry.len(),
            compatibility.declared_pairs().len(),
            templates.len()
        );

        Ok(Self {
            registry: Arc::new(registry),
            compatibility: Arc::new(compatibility),
            templates: templates.into(),
            growth: phase.region_generation.clone(),
            retry: phase.retry.clone(),
            phase: phase.info(),
        })
    }

    pub fn from_document(doc: &PhaseDocument, phase: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_phase(&doc.resolve_phase(phase)?)
    }

    /// The embedded default document at its current phase.
    pub fn default_phase() -> Result<Self, ConfigError> {
        Self::from_document(&PhaseDocument::embedded_default()?, None)
    }
}
