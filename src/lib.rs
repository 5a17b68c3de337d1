//! Terrain grid generation library
//!
//! Re-exports modules for use by the binary and tests.

pub mod ascii;
pub mod cells;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod export;
pub mod generation;
pub mod regions;
pub mod snapshot;
pub mod terrain;
pub mod tilemap;
pub mod tiles;
