//! Error types for configuration loading, snapshots, and export.
//!
//! Generation itself never fails: a run that cannot satisfy every structural
//! rule is reported through [`crate::generation::GenerationReport`].

use thiserror::Error;

/// Fatal problems found while loading or resolving a terrain configuration.
///
/// No partially built registry is ever handed out when one of these occurs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("phase '{0}' does not exist")]
    UnknownPhase(String),

    #[error("phase '{0}' extends itself through its inheritance chain")]
    CyclicExtends(String),

    #[error("phase '{0}' declares no cell types")]
    EmptyPhase(String),

    #[error("{context} references unknown terrain type '{name}'")]
    UnknownTerrain { context: String, name: String },

    #[error("terrain type '{name}' has invalid weight {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("phase '{phase}' declares {count} cell types, more than the {max} a registry can hold")]
    TooManyTerrains { phase: String, count: usize, max: usize },

    #[error("compatibility pair must have exactly two entries, got {0}")]
    MalformedPair(usize),

    #[error("template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("phase '{0}' declares no tile templates")]
    NoTemplates(String),
}

/// Problems reading a persisted map snapshot back in.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot declares {declared_width}x{declared_height} but terrain_data is {actual_width}x{actual_height}")]
    DimensionMismatch {
        declared_width: usize,
        declared_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("snapshot cell ({x}, {y}) holds unknown terrain '{name}'")]
    UnknownTerrain { x: usize, y: usize, name: String },
}

/// Failures writing reports or images to disk.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
