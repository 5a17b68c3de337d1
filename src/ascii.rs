//! ASCII rendering and text reports for terrain maps
//!
//! Provides functions to render a map as plain or ANSI-colored text and to
//! write a self-contained text report to disk.

use std::fs::File;
use std::io::{self, Write};

use chrono::Local;

use crate::generation::{GenerationReport, TerrainMap};
use crate::terrain::TerrainRegistry;

/// Get ASCII character for a terrain type. Unknown names use their first
/// letter, uppercased.
pub fn terrain_char(name: &str) -> char {
    match name {
        "plain" => '.',
        "forest" => 'T',
        "highland" => '^',
        "river" => '~',
        "cliff" => '#',
        "slope" => '/',
        "water" => '=',
        "mountain" => 'M',
        "desert" => ':',
        _ => name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?'),
    }
}

/// Render a map to ASCII string. Empty cells are blank.
pub fn render_ascii_map<M: TerrainMap + ?Sized>(map: &M) -> String {
    let registry = map.registry();
    let mut result = String::with_capacity((map.width() + 1) * map.height());

    for y in 0..map.height() {
        for x in 0..map.width() {
            let ch = match map.terrain_at(x, y) {
                Some(t) => terrain_char(registry.name_of(t)),
                None => ' ',
            };
            result.push(ch);
        }
        result.push('\n');
    }

    result
}

/// Format a single character with ANSI true color (24-bit) - foreground and background
pub fn ansi_colored_char(ch: char, fg: (u8, u8, u8), bg: (u8, u8, u8)) -> String {
    format!(
        "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{}\x1b[0m",
        fg.0, fg.1, fg.2,
        bg.0, bg.1, bg.2,
        ch
    )
}

/// Render a colorized ASCII map to string with ANSI codes, background in
/// the terrain's configured color.
pub fn render_colored_ascii_map<M: TerrainMap + ?Sized>(map: &M) -> String {
    let registry = map.registry();
    // Estimate: each cell needs ~40 bytes for ANSI codes
    let mut result = String::with_capacity(map.width() * map.height() * 45);

    for y in 0..map.height() {
        for x in 0..map.width() {
            match map.terrain_at(x, y) {
                Some(t) => {
                    let terrain = registry.get(t);
                    let bg = terrain.color_rgb8();
                    // Use darker version for foreground
                    let fg = (bg.0.saturating_sub(60), bg.1.saturating_sub(60), bg.2.saturating_sub(60));
                    result.push_str(&ansi_colored_char(terrain_char(&terrain.name), fg, bg));
                }
                None => result.push(' '),
            }
        }
        result.push_str("\x1b[0m\n"); // Reset at end of line
    }

    result
}

/// Generate legend for terrain characters
pub fn terrain_legend(registry: &TerrainRegistry) -> String {
    let mut legend = String::new();
    legend.push_str("=== TERRAIN LEGEND ===\n");
    for terrain in registry.types() {
        legend.push_str(&format!(
            "  {} {:<10} weight {:.2}",
            terrain_char(&terrain.name),
            terrain.name,
            terrain.weight
        ));
        if !terrain.required_neighbors.is_empty() {
            let required: Vec<&str> = terrain
                .required_neighbors
                .iter()
                .map(|&r| registry.name_of(r))
                .collect();
            legend.push_str(&format!("  (needs {})", required.join(", ")));
        }
        legend.push('\n');
    }
    legend
}

/// Distribution and region statistics, one line per terrain type in
/// registry order.
pub fn region_report<M: TerrainMap + ?Sized>(map: &M) -> String {
    let registry = map.registry();
    let distribution = map.terrain_distribution();
    let analysis = map.analyze_regions();
    let total = (map.width() * map.height()).max(1);

    let mut report = String::new();
    report.push_str("=== TERRAIN DISTRIBUTION ===\n");
    for terrain in registry.types() {
        let count = distribution.get(&terrain.name).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let pct = 100.0 * count as f64 / total as f64;
        report.push_str(&format!("  {:<10} {:>6} cells ({:>5.1}%)", terrain.name, count, pct));
        if let Some(stats) = analysis.get(terrain.id) {
            report.push_str(&format!(
                "  {:>3} regions, largest {:>5}, avg {:>7.1}",
                stats.region_count, stats.largest_region, stats.average_region_size
            ));
        }
        report.push('\n');
    }

    report.push_str(&format!("Total regions: {}\n", analysis.total_regions()));
    match analysis.coherence_score() {
        Some(score) => report.push_str(&format!("Coherence: {:.2} cells/region\n", score)),
        None => report.push_str("Coherence: n/a\n"),
    }
    report
}

/// Export a map and its statistics to a text file
pub fn export_map_file<M: TerrainMap + ?Sized>(
    map: &M,
    generation_type: &str,
    report: Option<&GenerationReport>,
    path: &str,
) -> io::Result<()> {
    let mut file = File::create(path)?;

    // Header
    writeln!(file, "=== MAPFORGE MAP FILE ===")?;
    match map.seed() {
        Some(seed) => writeln!(file, "Seed: {}", seed)?,
        None => writeln!(file, "Seed: unknown")?,
    }
    writeln!(file, "Size: {}x{}", map.width(), map.height())?;
    writeln!(file, "Strategy: {}", generation_type)?;
    writeln!(file, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    if let Some(report) = report {
        writeln!(
            file,
            "Attempts: {}{}",
            report.attempts,
            if report.degraded { " (degraded)" } else { "" }
        )?;
        for v in &report.violations {
            let missing: Vec<&str> = v.missing.iter().map(|&m| map.registry().name_of(m)).collect();
            writeln!(
                file,
                "  {} at ({}, {}) lacks {}",
                map.registry().name_of(v.terrain),
                v.x,
                v.y,
                missing.join(", ")
            )?;
        }
    }
    writeln!(file)?;

    writeln!(file, "=== MAP ===")?;
    write!(file, "{}", render_ascii_map(map))?;
    writeln!(file)?;

    write!(file, "{}", terrain_legend(map.registry()))?;
    writeln!(file)?;

    write!(file, "{}", region_report(map))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MapSnapshot;
    use crate::terrain::TerrainSet;

    fn loaded(rows: &[&[&str]]) -> crate::snapshot::LoadedMap {
        let set = TerrainSet::default_phase().unwrap();
        let snapshot = MapSnapshot {
            width: rows[0].len(),
            height: rows.len(),
            seed: Some(1),
            generation_timestamp: None,
            terrain_data: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            generation_type: None,
        };
        snapshot.rebuild(set.registry.clone()).unwrap()
    }

    #[test]
    fn test_render_ascii_map() {
        let map = loaded(&[&["plain", "forest"], &["river", "cliff"]]);
        assert_eq!(render_ascii_map(&map), ".T\n~#\n");
    }

    #[test]
    fn test_colored_map_uses_registry_color() {
        let map = loaded(&[&["plain"]]);
        let out = render_colored_ascii_map(&map);
        assert!(out.contains("\x1b[48;2;102;204;51m"));
        assert!(out.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn test_unknown_terrain_char() {
        assert_eq!(terrain_char("swamp"), 'S');
        assert_eq!(terrain_char(""), '?');
    }

    #[test]
    fn test_legend_lists_rules() {
        let set = TerrainSet::default_phase().unwrap();
        let legend = terrain_legend(&set.registry);
        assert!(legend.contains("cliff"));
        assert!(legend.contains("needs plain, highland"));
    }

    #[test]
    fn test_region_report() {
        let map = loaded(&[&["plain", "plain", "plain"], &["plain", "plain", "plain"], &["plain", "plain", "plain"]]);
        let report = region_report(&map);
        assert!(report.contains("Total regions: 1"));
        assert!(report.contains("Coherence: 9.00"));
    }

    #[test]
    fn test_export_map_file() {
        let map = loaded(&[&["plain", "highland"], &["cliff", "plain"]]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.txt");
        export_map_file(&map, "cell_based", None, path.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("=== MAPFORGE MAP FILE ==="));
        assert!(text.contains(".^\n#.\n"));
    }
}
