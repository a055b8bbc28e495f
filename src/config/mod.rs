//! Configuration models for the café: seats, pool size, timings and overflow policy.

pub mod cafe;

pub use cafe::{CafeConfig, OverflowPolicy};
