//! Café coordination primitives and the coordinator that composes them.

pub mod barista;
pub mod cafe;
pub mod customer;
mod dispatcher;
pub mod error;
pub mod gate;
pub mod queue;
pub mod service;
pub mod signal;

pub use barista::Barista;
pub use cafe::{Cafe, CafeState, CafeStats};
pub use customer::{Customer, CustomerId, Visit};
pub use error::{AppResult, CafeError};
pub use gate::{OccupancyGate, Seat};
pub use queue::{FifoQueue, WaitingQueue};
pub use service::{FixedPreparation, PrepareCoffee};
pub use signal::{RendezvousSignal, SignalState};
