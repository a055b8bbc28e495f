//! FIFO waiting queues for customers and idle baristas.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::{Barista, Customer};

/// Linearizable FIFO queue guarded by a `parking_lot::Mutex`.
///
/// Critical sections are a single `VecDeque` operation and never span an
/// `.await`.
#[derive(Debug)]
pub struct FifoQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FifoQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Create an empty queue with room for `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an item at the tail.
    pub fn enqueue(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Remove and return the head, or `None` if empty. Never blocks.
    pub fn try_dequeue(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Remove the first item matching `pred`, preserving the order of the rest.
    pub fn remove_where(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let mut items = self.items.lock();
        let idx = items.iter().position(|item| pred(item))?;
        items.remove(idx)
    }

    /// Current length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// The café's two waiting lines plus a change notification for the dispatcher.
#[derive(Debug)]
pub struct WaitingQueue {
    customers: FifoQueue<Arc<Customer>>,
    baristas: FifoQueue<Arc<Barista>>,
    changed: Notify,
}

impl WaitingQueue {
    /// Create empty queues sized for the configured seats and pool.
    #[must_use]
    pub fn new(seats: usize, baristas: usize) -> Self {
        Self {
            customers: FifoQueue::with_capacity(seats),
            baristas: FifoQueue::with_capacity(baristas),
            changed: Notify::new(),
        }
    }

    /// Queue a seated customer for service.
    pub fn enqueue_customer(&self, customer: Arc<Customer>) {
        self.customers.enqueue(customer);
        self.changed.notify_one();
    }

    /// Return a barista to the idle line.
    pub fn enqueue_barista(&self, barista: Arc<Barista>) {
        self.baristas.enqueue(barista);
        self.changed.notify_one();
    }

    /// Dequeue the head customer without pairing.
    pub fn try_dequeue_customer(&self) -> Option<Arc<Customer>> {
        self.customers.try_dequeue()
    }

    /// Dequeue the head idle barista without pairing.
    pub fn try_dequeue_barista(&self) -> Option<Arc<Barista>> {
        self.baristas.try_dequeue()
    }

    /// Withdraw a specific customer who is still waiting.
    ///
    /// Returns `None` if it has already been paired with a barista.
    pub fn withdraw_customer(&self, id: u64) -> Option<Arc<Customer>> {
        self.customers.remove_where(|c| c.id() == id)
    }

    /// Atomically take the head customer and the head idle barista.
    ///
    /// Either both are dequeued or neither is. Locks are always taken in
    /// customers-then-baristas order; this is the only place holding both.
    pub fn try_pair(&self) -> Option<(Arc<Customer>, Arc<Barista>)> {
        let mut customers = self.customers.items.lock();
        if customers.is_empty() {
            return None;
        }
        let mut baristas = self.baristas.items.lock();
        let barista = baristas.pop_front()?;
        let customer = customers.pop_front()?;
        Some((customer, barista))
    }

    /// Resolves after the next enqueue on either line.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Customers seated and waiting for a barista.
    #[must_use]
    pub fn waiting_customers(&self) -> usize {
        self.customers.len()
    }

    /// Baristas idle in the pool.
    #[must_use]
    pub fn idle_baristas(&self) -> usize {
        self.baristas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let q = FifoQueue::new();
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.try_dequeue(), Some(1));
        assert_eq!(q.try_dequeue(), Some(2));
        assert_eq!(q.try_dequeue(), Some(3));
        assert_eq!(q.try_dequeue(), None);
    }

    #[test]
    fn test_remove_where_keeps_order() {
        let q = FifoQueue::new();
        for i in 1..=4 {
            q.enqueue(i);
        }
        assert_eq!(q.remove_where(|&i| i == 2), Some(2));
        assert_eq!(q.remove_where(|&i| i == 9), None);
        assert_eq!(q.try_dequeue(), Some(1));
        assert_eq!(q.try_dequeue(), Some(3));
        assert_eq!(q.try_dequeue(), Some(4));
        assert!(q.is_empty());
    }

    #[test]
    fn test_concurrent_enqueue_dequeue_no_loss() {
        let q = Arc::new(FifoQueue::new());
        let mut producers = Vec::new();
        for p in 0..4u32 {
            let q = Arc::clone(&q);
            producers.push(thread::spawn(move || {
                for i in 0..250u32 {
                    q.enqueue(p * 1000 + i);
                }
            }));
        }
        for handle in producers {
            handle.join().unwrap();
        }

        let mut seen = Vec::new();
        while let Some(item) = q.try_dequeue() {
            seen.push(item);
        }
        assert_eq!(seen.len(), 1000);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_try_pair_needs_both_sides() {
        let q = WaitingQueue::new(2, 1);
        assert!(q.try_pair().is_none());

        q.enqueue_customer(Arc::new(Customer::new(1)));
        assert!(q.try_pair().is_none());
        assert_eq!(q.waiting_customers(), 1);

        q.enqueue_barista(Arc::new(Barista::new(0)));
        q.enqueue_barista(Arc::new(Barista::new(1)));
        let (customer, barista) = q.try_pair().unwrap();
        assert_eq!(customer.id(), 1);
        assert_eq!(barista.id(), 0);
        assert_eq!(q.waiting_customers(), 0);
        assert_eq!(q.idle_baristas(), 1);
        assert_eq!(q.try_dequeue_barista().map(|b| b.id()), Some(1));
        assert!(q.try_dequeue_barista().is_none());
    }

    #[test]
    fn test_withdraw_customer() {
        let q = WaitingQueue::new(3, 0);
        q.enqueue_customer(Arc::new(Customer::new(1)));
        q.enqueue_customer(Arc::new(Customer::new(2)));
        assert_eq!(q.withdraw_customer(2).map(|c| c.id()), Some(2));
        assert!(q.withdraw_customer(2).is_none());
        assert_eq!(q.try_dequeue_customer().map(|c| c.id()), Some(1));
    }
}
