//! Occupancy admission gate.
//!
//! Bounds how many customers may be inside the café at once. Seats are handed
//! out by a FIFO-fair `tokio::sync::Semaphore`; an RAII [`Seat`] returns its
//! slot when dropped. Occupancy is tracked alongside the semaphore so the
//! capacity invariant `0 <= occupancy <= capacity` can be checked on every
//! admission and departure.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

use crate::core::CafeError;

/// Counting admission gate with capacity = seat count.
#[derive(Debug)]
pub struct OccupancyGate {
    seats: Semaphore,
    capacity: usize,
    occupancy: AtomicUsize,
    peak_occupancy: AtomicUsize,
    at_door: AtomicUsize,
}

/// A held seat. Dropping it releases the seat.
#[derive(Debug)]
#[must_use = "dropping a Seat releases it immediately"]
pub struct Seat<'a> {
    gate: &'a OccupancyGate,
    _permit: SemaphorePermit<'a>,
}

impl Drop for Seat<'_> {
    fn drop(&mut self) {
        // Decrement before the permit is returned so occupancy never
        // overshoots capacity from the next admission.
        let previous = self.gate.occupancy.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "occupancy went negative");
        debug!(occupancy = previous - 1, "seat released");
    }
}

/// Counts one customer queued at the door for as long as it lives.
struct DoorSpot<'a>(&'a AtomicUsize);

impl<'a> DoorSpot<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }

    /// Wrap a slot already reserved by the caller.
    const fn claimed(counter: &'a AtomicUsize) -> Self {
        Self(counter)
    }
}

impl Drop for DoorSpot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl OccupancyGate {
    /// Create a gate with `capacity` seats.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            seats: Semaphore::new(capacity),
            capacity,
            occupancy: AtomicUsize::new(0),
            peak_occupancy: AtomicUsize::new(0),
            at_door: AtomicUsize::new(0),
        }
    }

    /// Configured seat count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Customers currently holding a seat.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    /// Highest occupancy observed since construction.
    #[must_use]
    pub fn peak_occupancy(&self) -> usize {
        self.peak_occupancy.load(Ordering::Acquire)
    }

    /// Customers blocked waiting for a seat.
    #[must_use]
    pub fn waiting_at_door(&self) -> usize {
        self.at_door.load(Ordering::Acquire)
    }

    /// Whether the gate has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.seats.is_closed()
    }

    /// Close the gate. Pending and future acquisitions fail with `Closed`.
    pub fn close(&self) {
        self.seats.close();
    }

    /// Wait for a free seat.
    ///
    /// # Errors
    ///
    /// Returns `CafeError::Closed` if the gate is closed before a seat frees up.
    pub async fn acquire(&self) -> Result<Seat<'_>, CafeError> {
        let _door = DoorSpot::enter(&self.at_door);
        let permit = self.seats.acquire().await.map_err(|_| CafeError::Closed)?;
        Ok(self.admit(permit))
    }

    /// Take a seat only if one is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<Seat<'_>> {
        self.seats.try_acquire().ok().map(|permit| self.admit(permit))
    }

    /// Wait for a seat unless `max_waiting` customers are already at the door.
    ///
    /// # Errors
    ///
    /// - `CafeError::Rejected` when the door line is full
    /// - `CafeError::Closed` if the gate is closed
    pub async fn acquire_or_reject(&self, max_waiting: usize) -> Result<Seat<'_>, CafeError> {
        if let Some(seat) = self.try_acquire() {
            return Ok(seat);
        }
        if self.is_closed() {
            return Err(CafeError::Closed);
        }

        let mut current = self.at_door.load(Ordering::Acquire);
        loop {
            if current >= max_waiting {
                // A seat may have freed up while we were deciding.
                return self
                    .try_acquire()
                    .ok_or(CafeError::Rejected { waiting: current });
            }
            match self.at_door.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let _door = DoorSpot::claimed(&self.at_door);
        let permit = self.seats.acquire().await.map_err(|_| CafeError::Closed)?;
        Ok(self.admit(permit))
    }

    fn admit<'a>(&'a self, permit: SemaphorePermit<'a>) -> Seat<'a> {
        let occupancy = self.occupancy.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(
            occupancy <= self.capacity,
            "occupancy {occupancy} exceeds capacity {}",
            self.capacity
        );
        self.peak_occupancy.fetch_max(occupancy, Ordering::AcqRel);
        debug!(occupancy, capacity = self.capacity, "seat acquired");
        Seat {
            gate: self,
            _permit: permit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_try_acquire_respects_capacity() {
        let gate = OccupancyGate::new(2);
        let a = gate.try_acquire();
        let b = gate.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(gate.try_acquire().is_none());
        assert_eq!(gate.occupancy(), 2);

        drop(a);
        assert_eq!(gate.occupancy(), 1);
        assert!(gate.try_acquire().is_some());
        assert_eq!(gate.peak_occupancy(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_never_exceeds_capacity() {
        let gate = Arc::new(OccupancyGate::new(3));
        let mut handles = Vec::new();

        for _ in 0..20 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                let _seat = gate.acquire().await.unwrap();
                assert!(gate.occupancy() <= 3);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(gate.occupancy(), 0);
        assert!(gate.peak_occupancy() <= 3);
        assert_eq!(gate.waiting_at_door(), 0);
    }

    #[tokio::test]
    async fn test_close_wakes_pending_acquire() {
        let gate = Arc::new(OccupancyGate::new(1));
        let held = gate.try_acquire();
        assert!(held.is_some());

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gate.waiting_at_door(), 1);

        gate.close();
        assert_eq!(waiter.await.unwrap(), Err(CafeError::Closed));
        assert_eq!(gate.waiting_at_door(), 0);
    }

    #[tokio::test]
    async fn test_reject_when_door_line_full() {
        let gate = Arc::new(OccupancyGate::new(1));
        let _held = gate.try_acquire();

        let queued = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire_or_reject(1).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rejected = gate.acquire_or_reject(1).await;
        assert!(matches!(rejected, Err(CafeError::Rejected { waiting: 1 })));

        gate.close();
        assert_eq!(queued.await.unwrap(), Err(CafeError::Closed));
    }
}
