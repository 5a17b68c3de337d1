//! Tile-based generation: templates with typed edges placed slot by slot.

pub mod generator;
pub mod template;

pub use generator::{TileGenerator, DEFAULT_TILE_SIZE};
pub use template::{Direction, Edges, Pattern, Template, TemplateInfo};
