//! # Sleeping Barista
//!
//! A bounded-capacity café: arriving customers compete for a fixed number of
//! seats, then wait to be matched with one of a fixed pool of sleeping
//! baristas.
//!
//! ## Components
//!
//! - **`RendezvousSignal`**: one-shot, re-armable wake primitive connecting
//!   one waiter to one firer per cycle
//! - **`WaitingQueue`**: FIFO lines of seated customers and idle baristas
//! - **`OccupancyGate`**: FIFO-fair admission gate bounding occupancy
//! - **Dispatcher**: background task pairing the head customer with the head
//!   idle barista and waking it
//! - **`Barista`**: long-lived worker serving one customer at a time
//! - **`Cafe`**: the coordinator owning all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sleeping_barista::config::CafeConfig;
//! use sleeping_barista::core::{Cafe, FixedPreparation};
//!
//! # async fn run() -> Result<(), sleeping_barista::core::CafeError> {
//! let config = CafeConfig::new().with_seats(5).with_baristas(3);
//! let cafe = Arc::new(Cafe::open(config, FixedPreparation(Duration::from_secs(2)))?);
//!
//! let visit = cafe.arrive(cafe.new_customer()).await?;
//! println!("served by barista {}", visit.barista);
//!
//! cafe.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Café coordination primitives and the coordinator.
pub mod core;
/// Configuration models for seats, pool size, timings and overflow.
pub mod config;
/// Builders to open a café from configuration.
pub mod builders;
/// Arrival drivers.
pub mod runtime;
/// Shared utilities.
pub mod util;
