//! Background loop pairing waiting customers with idle baristas.
//!
//! Event-driven: the loop drains every available pair, then parks until
//! either waiting line changes or the café stops being open. Customers are
//! paired strictly in arrival order; baristas in the order they became idle.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::cafe::{until_not_open, CafeState};
use crate::core::WaitingQueue;

/// Pair every customer that currently has an idle barista available.
///
/// Returns the number of pairs made.
pub(crate) fn dispatch_ready(queue: &WaitingQueue) -> usize {
    let mut paired = 0;
    while let Some((customer, barista)) = queue.try_pair() {
        debug!(
            customer = customer.id(),
            barista = barista.id(),
            "waking barista"
        );
        barista.assign(customer);
        paired += 1;
    }
    paired
}

/// Dispatcher task body. Exits as soon as the café leaves `CafeState::Open`.
pub(crate) async fn run_dispatcher(queue: Arc<WaitingQueue>, mut state: watch::Receiver<CafeState>) {
    info!("dispatcher started");

    loop {
        let open = *state.borrow() == CafeState::Open;
        if !open {
            break;
        }
        dispatch_ready(&queue);

        // Enqueues that land while draining leave a stored permit, so the
        // next changed() returns at once instead of losing the wake-up.
        tokio::select! {
            biased;
            () = until_not_open(&mut state) => break,
            () = queue.changed() => {}
        }
    }

    info!("dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Barista, Customer, SignalState};

    #[test]
    fn test_dispatch_ready_pairs_in_fifo_order() {
        let queue = WaitingQueue::new(3, 2);
        let baristas: Vec<_> = (0..2).map(|i| Arc::new(Barista::new(i))).collect();
        for b in &baristas {
            queue.enqueue_barista(Arc::clone(b));
        }
        let customers: Vec<_> = (1..=3).map(|i| Arc::new(Customer::new(i))).collect();
        for c in &customers {
            queue.enqueue_customer(Arc::clone(c));
        }

        assert_eq!(dispatch_ready(&queue), 2);
        assert_eq!(baristas[0].signal().state(), SignalState::Fired);
        assert_eq!(baristas[1].signal().state(), SignalState::Fired);
        // Customer 3 waits for the next idle barista.
        assert_eq!(queue.waiting_customers(), 1);
        assert_eq!(queue.try_dequeue_customer().map(|c| c.id()), Some(3));
    }
}
