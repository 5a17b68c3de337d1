//! Symmetric adjacency relation between terrain (and edge) types.

use crate::error::ConfigError;
use crate::terrain::{TerrainId, TerrainRegistry};

/// Which terrain types may touch. Stored as a dense symmetric matrix with a
/// true diagonal, so lookups are a single index.
#[derive(Clone, Debug, PartialEq)]
pub struct CompatibilityModel {
    size: usize,
    matrix: Vec<bool>,
    declared: Vec<(TerrainId, TerrainId)>,
}

impl CompatibilityModel {
    /// Build the symmetric closure of the declared pairs.
    pub fn from_pairs(registry: &TerrainRegistry, pairs: &[Vec<String>]) -> Result<Self, ConfigError> {
        let size = registry.len();
        let mut matrix = vec![false; size * size];
        for i in 0..size {
            matrix[i * size + i] = true;
        }

        let mut declared = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let [a, b] = pair.as_slice() else {
                return Err(ConfigError::MalformedPair(pair.len()));
            };
            let resolve = |name: &String| {
                registry.id_of(name).ok_or_else(|| ConfigError::UnknownTerrain {
                    context: format!("compatibility pair [{}, {}]", a, b),
                    name: name.clone(),
                })
            };
            let (a, b) = (resolve(a)?, resolve(b)?);
            matrix[a.index() * size + b.index()] = true;
            matrix[b.index() * size + a.index()] = true;
            declared.push((a, b));
        }

        Ok(Self { size, matrix, declared })
    }

    pub fn is_compatible(&self, a: TerrainId, b: TerrainId) -> bool {
        let (a, b) = (a.index(), b.index());
        a < self.size && b < self.size && self.matrix[a * self.size + b]
    }

    /// True if `t` may sit next to every type in `neighbors`.
    pub fn compatible_with_all<I>(&self, t: TerrainId, neighbors: I) -> bool
    where
        I: IntoIterator<Item = TerrainId>,
    {
        neighbors.into_iter().all(|n| self.is_compatible(t, n))
    }

    /// Pairs as declared in configuration, without the implied reverse or
    /// reflexive entries.
    pub fn declared_pairs(&self) -> &[(TerrainId, TerrainId)] {
        &self.declared
    }
}
