//! Domain types: simulation settings and dye colors

pub mod color;
pub mod config;

pub use color::{generate_color, Rgb};
pub use config::SimulationConfig;
