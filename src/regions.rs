//! Connected-region analysis
//!
//! Splits a finished grid into 4-connected regions of identical terrain and
//! summarizes them per type. Empty cells belong to no region.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::terrain::{TerrainId, TerrainRegistry};
use crate::tilemap::Tilemap;

/// Region summary for one terrain type.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegionStats {
    pub region_count: usize,
    /// Region sizes, largest first
    pub sizes: Vec<usize>,
    pub total_cells: usize,
    pub largest_region: usize,
    pub average_region_size: f64,
}

impl RegionStats {
    fn from_sizes(mut sizes: Vec<usize>) -> Self {
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        let total_cells: usize = sizes.iter().sum();
        let region_count = sizes.len();
        Self {
            region_count,
            largest_region: sizes.first().copied().unwrap_or(0),
            average_region_size: if region_count > 0 {
                total_cells as f64 / region_count as f64
            } else {
                0.0
            },
            total_cells,
            sizes,
        }
    }
}

/// Per-type region statistics for a whole grid. Types that do not occur
/// have no entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionAnalysis {
    stats: BTreeMap<TerrainId, RegionStats>,
}

impl RegionAnalysis {
    pub fn get(&self, terrain: TerrainId) -> Option<&RegionStats> {
        self.stats.get(&terrain)
    }

    /// Entries in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (TerrainId, &RegionStats)> {
        self.stats.iter().map(|(t, s)| (*t, s))
    }

    pub fn total_regions(&self) -> usize {
        self.stats.values().map(|s| s.region_count).sum()
    }

    pub fn total_cells(&self) -> usize {
        self.stats.values().map(|s| s.total_cells).sum()
    }

    /// Average region size over all types; `None` when there are no regions.
    pub fn coherence_score(&self) -> Option<f64> {
        match self.total_regions() {
            0 => None,
            regions => Some(self.total_cells() as f64 / regions as f64),
        }
    }

    /// Stats keyed by terrain name, for reporting.
    pub fn named(&self, registry: &TerrainRegistry) -> BTreeMap<String, RegionStats> {
        self.stats
            .iter()
            .map(|(t, s)| (registry.name_of(*t).to_string(), s.clone()))
            .collect()
    }
}

/// Label every region by flood fill. Iterative with an explicit stack, so
/// large regions cannot overflow the call stack.
pub fn analyze_regions(grid: &Tilemap<Option<TerrainId>>) -> RegionAnalysis {
    let mut visited = Tilemap::new_with(grid.width, grid.height, false);
    let mut sizes: BTreeMap<TerrainId, Vec<usize>> = BTreeMap::new();
    let mut stack = Vec::new();

    for y in 0..grid.height {
        for x in 0..grid.width {
            if *visited.get(x, y) {
                continue;
            }
            let Some(terrain) = *grid.get(x, y) else {
                visited.set(x, y, true);
                continue;
            };

            let mut size = 0;
            visited.set(x, y, true);
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                size += 1;
                for (nx, ny) in grid.neighbors(cx, cy) {
                    if !*visited.get(nx, ny) && *grid.get(nx, ny) == Some(terrain) {
                        visited.set(nx, ny, true);
                        stack.push((nx, ny));
                    }
                }
            }
            sizes.entry(terrain).or_default().push(size);
        }
    }

    RegionAnalysis {
        stats: sizes
            .into_iter()
            .map(|(t, s)| (t, RegionStats::from_sizes(s)))
            .collect(),
    }
}

/// [`analyze_regions`] for a grid with no empty cells.
pub fn analyze_complete(grid: &Tilemap<TerrainId>) -> RegionAnalysis {
    analyze_regions(&grid.map(|t| Some(*t)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TerrainId = TerrainId(0);
    const B: TerrainId = TerrainId(1);

    fn grid(rows: &[&[TerrainId]]) -> Tilemap<TerrainId> {
        Tilemap::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_single_type_single_region() {
        let analysis = analyze_complete(&Tilemap::new_with(3, 3, A));
        let stats = analysis.get(A).unwrap();
        assert_eq!(stats.region_count, 1);
        assert_eq!(stats.sizes, vec![9]);
        assert_eq!(stats.largest_region, 9);
        assert_eq!(analysis.coherence_score(), Some(9.0));
    }

    #[test]
    fn test_diagonal_cells_are_separate() {
        let analysis = analyze_complete(&grid(&[&[A, B], &[B, A]]));
        assert_eq!(analysis.get(A).unwrap().region_count, 2);
        assert_eq!(analysis.get(B).unwrap().region_count, 2);
        assert_eq!(analysis.coherence_score(), Some(1.0));
    }

    #[test]
    fn test_sizes_sorted_and_sum_to_area() {
        let g = grid(&[
            &[A, A, B, A],
            &[A, B, B, A],
            &[B, B, A, A],
        ]);
        let analysis = analyze_complete(&g);
        let a = analysis.get(A).unwrap();
        assert_eq!(a.sizes, vec![4, 3]);
        assert_eq!(a.average_region_size, 3.5);
        assert_eq!(analysis.get(B).unwrap().sizes, vec![5]);
        assert_eq!(analysis.total_cells(), 12);
        assert_eq!(analysis.total_regions(), 3);
    }

    #[test]
    fn test_empty_cells_ignored() {
        let mut g = Tilemap::new_with(3, 1, Some(A));
        g.set(1, 0, None);
        let analysis = analyze_regions(&g);
        assert_eq!(analysis.get(A).unwrap().sizes, vec![1, 1]);
        assert!(analysis.get(B).is_none());

        let empty = analyze_regions(&Tilemap::new_with(2, 2, None));
        assert_eq!(empty.total_regions(), 0);
        assert_eq!(empty.coherence_score(), None);
    }

    #[test]
    fn test_large_region_does_not_recurse() {
        let analysis = analyze_complete(&Tilemap::new_with(400, 400, A));
        assert_eq!(analysis.get(A).unwrap().sizes, vec![160_000]);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let g = grid(&[&[A, B, B], &[A, A, B]]);
        assert_eq!(analyze_complete(&g), analyze_complete(&g));
    }
}
