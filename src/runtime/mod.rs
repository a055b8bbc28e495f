//! Drivers that feed arrivals into a café.

pub mod driver;

pub use driver::{run_arrivals, ArrivalReport};
