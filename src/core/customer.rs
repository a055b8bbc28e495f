//! Transient customers and the receipt they leave with.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::RendezvousSignal;

/// Customer identifier.
pub type CustomerId = u64;

/// A single visit to the café. Created per arrival and never reused.
#[derive(Debug)]
pub struct Customer {
    id: CustomerId,
    signal: RendezvousSignal,
    served_by: Mutex<Option<usize>>,
}

impl Customer {
    /// Create a customer with the given identity.
    #[must_use]
    pub fn new(id: CustomerId) -> Self {
        Self {
            id,
            signal: RendezvousSignal::new(),
            served_by: Mutex::new(None),
        }
    }

    /// Customer identity.
    #[must_use]
    pub const fn id(&self) -> CustomerId {
        self.id
    }

    /// Signal fired by the barista once the coffee is ready.
    #[must_use]
    pub const fn signal(&self) -> &RendezvousSignal {
        &self.signal
    }

    /// Barista that served this customer, once known.
    #[must_use]
    pub fn served_by(&self) -> Option<usize> {
        *self.served_by.lock()
    }

    pub(crate) fn record_barista(&self, barista: usize) {
        *self.served_by.lock() = Some(barista);
    }
}

/// Summary of a completed visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    /// Customer identity.
    pub customer: CustomerId,
    /// Barista that prepared the coffee.
    pub barista: usize,
    /// Time spent at the door before a seat freed up.
    pub door_wait: Duration,
    /// Time from arrival to departure.
    pub total: Duration,
}
