//! Builders to construct a café from configuration.

pub mod cafe_builder;

pub use cafe_builder::{build_cafe, build_cafe_from_json};
