//! Long-lived baristas that sleep until a customer is assigned to them.
//!
//! Each barista cycles forever through:
//!
//! ```text
//! Idle (in the pool, parked on its signal)
//!   -> Serving (prepares the assigned customer's coffee)
//!   -> Completing (fires the customer's signal)
//!   -> re-arms its own signal -> Idle
//! ```
//!
//! The loop only ends once the café reaches `CafeState::Closed`, and never
//! in the middle of a service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::cafe::{until_state, CafeCounters, CafeState};
use crate::core::{Customer, CustomerId, PrepareCoffee, RendezvousSignal, WaitingQueue};

/// A worker in the fixed barista pool.
#[derive(Debug)]
pub struct Barista {
    id: usize,
    signal: RendezvousSignal,
    assignment: Mutex<Option<Arc<Customer>>>,
    busy: AtomicBool,
    served: AtomicU64,
}

impl Barista {
    /// Create an idle barista.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            signal: RendezvousSignal::new(),
            assignment: Mutex::new(None),
            busy: AtomicBool::new(false),
            served: AtomicU64::new(0),
        }
    }

    /// Barista identity.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Signal fired by the dispatcher when a customer is assigned.
    #[must_use]
    pub const fn signal(&self) -> &RendezvousSignal {
        &self.signal
    }

    /// Whether a service is in progress.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Customers served so far.
    #[must_use]
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Hand `customer` to this barista and wake it.
    ///
    /// # Panics
    ///
    /// Panics if the barista already holds an unserved assignment.
    pub(crate) fn assign(&self, customer: Arc<Customer>) {
        {
            let mut slot = self.assignment.lock();
            if let Some(previous) = slot.as_ref() {
                let previous = previous.id();
                drop(slot);
                panic!(
                    "protocol violation: barista {} still holds customer {previous}",
                    self.id
                );
            }
            *slot = Some(customer);
        }
        self.signal.fire();
    }

    /// Serve the assigned customer, then fire its signal.
    ///
    /// The customer stays in the assignment slot until preparation is done.
    /// Whoever takes it out fires its signal: normally this barista, or
    /// [`Barista::abandon`] if the task was aborted mid-service.
    async fn serve(&self, service: &dyn PrepareCoffee, counters: &CafeCounters) {
        let assigned = self.assignment.lock().as_ref().map(|c| c.id());
        let Some(customer_id) = assigned else {
            panic!(
                "protocol violation: barista {} woken without a customer",
                self.id
            );
        };
        let was_busy = self.busy.swap(true, Ordering::AcqRel);
        assert!(!was_busy, "barista {} started a second service", self.id);

        let serving = counters.serving.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_serving.fetch_max(serving, Ordering::AcqRel);
        info!(barista = self.id, customer = customer_id, "preparing coffee");

        service.prepare(self.id, customer_id).await;

        let finished = self.assignment.lock().take();
        let Some(customer) = finished else {
            debug!(barista = self.id, customer = customer_id, "service abandoned");
            return;
        };
        customer.record_barista(self.id);
        self.served.fetch_add(1, Ordering::Relaxed);
        counters.served.fetch_add(1, Ordering::Relaxed);
        counters.serving.fetch_sub(1, Ordering::AcqRel);
        self.busy.store(false, Ordering::Release);

        info!(barista = self.id, customer = customer_id, "coffee served");
        customer.signal().fire();
    }

    /// Release a customer held by a barista whose task was aborted.
    ///
    /// Must only be called once the task has stopped. The customer is woken
    /// without a barista recorded and leaves with `CafeError::Closed`.
    /// Returns the abandoned customer's id, if any.
    pub(crate) fn abandon(&self, counters: &CafeCounters) -> Option<CustomerId> {
        let customer = self.assignment.lock().take()?;
        let started = self.busy.swap(false, Ordering::AcqRel);
        if started {
            counters.serving.fetch_sub(1, Ordering::AcqRel);
        }
        warn!(
            barista = self.id,
            customer = customer.id(),
            started,
            woken = self.signal.is_fired(),
            "abandoning customer"
        );
        if let Err(e) = customer.signal().try_fire() {
            warn!(barista = self.id, error = %e, "abandoned customer already woken");
        }
        Some(customer.id())
    }
}

/// Barista task body. Runs until the café is closed.
pub(crate) async fn run_barista(
    barista: Arc<Barista>,
    queue: Arc<WaitingQueue>,
    service: Arc<dyn PrepareCoffee>,
    counters: Arc<CafeCounters>,
    mut state: watch::Receiver<CafeState>,
) {
    debug!(barista = barista.id, "barista started");

    loop {
        // Polling the signal first means an assignment made before the
        // dispatcher stopped is always served.
        tokio::select! {
            biased;
            () = barista.signal.wait() => {}
            () = until_state(&mut state, CafeState::Closed) => break,
        }

        barista.serve(service.as_ref(), &counters).await;
        barista.signal.rearm();
        debug!(
            barista = barista.id,
            generation = barista.signal.generation(),
            "barista back in the pool"
        );
        queue.enqueue_barista(Arc::clone(&barista));
    }

    debug!(barista = barista.id, served = barista.served(), "barista stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedPreparation;
    use std::time::Duration;

    #[tokio::test]
    async fn test_assign_and_serve() {
        let barista = Barista::new(7);
        let counters = CafeCounters::default();
        let customer = Arc::new(Customer::new(1));

        barista.assign(Arc::clone(&customer));
        barista.signal().wait().await;
        barista
            .serve(&FixedPreparation(Duration::from_millis(5)), &counters)
            .await;

        customer.signal().wait().await;
        assert_eq!(customer.served_by(), Some(7));
        assert_eq!(barista.served(), 1);
        assert!(!barista.is_busy());
        assert_eq!(counters.serving.load(Ordering::Acquire), 0);
        assert_eq!(counters.peak_serving.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    async fn test_abandon_mid_service_wakes_customer() {
        let barista = Arc::new(Barista::new(3));
        let counters = Arc::new(CafeCounters::default());
        let customer = Arc::new(Customer::new(9));

        barista.assign(Arc::clone(&customer));
        barista.signal().wait().await;
        let task = {
            let barista = Arc::clone(&barista);
            let counters = Arc::clone(&counters);
            tokio::spawn(async move {
                barista
                    .serve(&FixedPreparation(Duration::from_secs(30)), &counters)
                    .await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(barista.is_busy());

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(barista.abandon(&counters), Some(9));
        assert!(customer.signal().is_fired());
        assert_eq!(customer.served_by(), None);
        assert!(!barista.is_busy());
        assert_eq!(counters.serving.load(Ordering::Acquire), 0);
        assert_eq!(barista.served(), 0);
        assert_eq!(barista.abandon(&counters), None);
    }

    #[test]
    #[should_panic(expected = "still holds customer")]
    fn test_double_assignment_panics() {
        let barista = Barista::new(0);
        barista.assign(Arc::new(Customer::new(1)));
        barista.assign(Arc::new(Customer::new(2)));
    }
}
