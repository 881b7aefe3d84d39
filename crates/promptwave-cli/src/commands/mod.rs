//! CLI command implementations.

pub mod common;
pub mod devices;
pub mod enhance;
pub mod live;
pub mod presets;
pub mod render;
