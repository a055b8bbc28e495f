//! The café coordinator.
//!
//! Owns the occupancy gate, both waiting lines, the barista pool and the
//! dispatcher. Customers and baristas only ever touch shared state through
//! the operations here.
//!
//! # Arrival protocol
//!
//! 1. Take a seat from the [`OccupancyGate`] (waiting at the door if full,
//!    or leaving if the overflow policy rejects).
//! 2. Join `WaitingQueue.customers`.
//! 3. Park on the customer's [`RendezvousSignal`](crate::core::RendezvousSignal)
//!    until a barista fires it.
//! 4. Release the seat and depart.
//!
//! # Shutdown
//!
//! `shutdown()` moves the café through `Open -> Closing -> Closed`. While
//! closing, the gate is closed, unpaired customers leave with
//! `CafeError::Closed` and the dispatcher stops. Only after the dispatcher
//! has been joined do baristas see `Closed`, so every pairing it made is
//! still served. A barista still busy after one expected preparation plus
//! the configured grace is aborted, and its customer leaves with
//! `CafeError::Closed`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{CafeConfig, OverflowPolicy};
use crate::core::barista::run_barista;
use crate::core::dispatcher::run_dispatcher;
use crate::core::{
    Barista, CafeError, Customer, CustomerId, OccupancyGate, PrepareCoffee, Seat, Visit,
    WaitingQueue,
};

/// Lifecycle of the café, broadcast to every background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CafeState {
    /// Accepting arrivals.
    Open,
    /// No new admissions; unpaired customers leave; dispatcher stops.
    Closing,
    /// Baristas finish any assigned service and stop.
    Closed,
}

/// Resolves once the café reaches `target`, or the sender is gone.
pub(crate) async fn until_state(rx: &mut watch::Receiver<CafeState>, target: CafeState) {
    let _ = rx.wait_for(|state| *state == target).await;
}

/// Resolves once the café is no longer open, or the sender is gone.
pub(crate) async fn until_not_open(rx: &mut watch::Receiver<CafeState>) {
    let _ = rx.wait_for(|state| *state != CafeState::Open).await;
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Internal counters (lock-free atomics).
#[derive(Debug, Default)]
pub(crate) struct CafeCounters {
    pub admitted: AtomicU64,
    pub served: AtomicU64,
    pub rejected: AtomicU64,
    pub timed_out: AtomicU64,
    pub turned_away: AtomicU64,
    pub serving: AtomicUsize,
    pub peak_serving: AtomicUsize,
}

/// Point-in-time view of the café.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CafeStats {
    /// Lifecycle state.
    pub state: CafeState,
    /// Configured seat count.
    pub seats: usize,
    /// Configured pool size.
    pub baristas: usize,
    /// Customers currently inside.
    pub occupancy: usize,
    /// Highest occupancy observed.
    pub peak_occupancy: usize,
    /// Customers waiting at the door for a seat.
    pub at_door: usize,
    /// Seated customers not yet paired with a barista.
    pub waiting_customers: usize,
    /// Baristas idle in the pool.
    pub idle_baristas: usize,
    /// Services in progress.
    pub serving: usize,
    /// Highest number of concurrent services observed.
    pub peak_serving: usize,
    /// Customers admitted past the gate.
    pub admitted: u64,
    /// Coffees served.
    pub served: u64,
    /// Arrivals turned away by the overflow policy.
    pub rejected: u64,
    /// Arrivals that gave up waiting.
    pub timed_out: u64,
    /// Arrivals sent away because the café closed.
    pub turned_away: u64,
}

/// A bounded-capacity café with a fixed pool of sleeping baristas.
pub struct Cafe {
    config: CafeConfig,
    gate: OccupancyGate,
    queue: Arc<WaitingQueue>,
    baristas: Vec<Arc<Barista>>,
    counters: Arc<CafeCounters>,
    state_tx: watch::Sender<CafeState>,
    shutting_down: AtomicBool,
    stopped: watch::Sender<bool>,
    join_limit: Duration,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_customer: AtomicU64,
}

impl std::fmt::Debug for Cafe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cafe")
            .field("config", &self.config)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl Cafe {
    /// Open a café: build the barista pool, put every barista in the idle
    /// line and start the dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `CafeError::InvalidConfig` if the configuration is invalid
    /// - `CafeError::Runtime` if no tokio runtime is available
    pub fn open<S>(config: CafeConfig, service: S) -> Result<Self, CafeError>
    where
        S: PrepareCoffee,
    {
        config.validate().map_err(CafeError::InvalidConfig)?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CafeError::Runtime(e.to_string()))?;

        let join_limit = config.service_time().max(service.expected_duration())
            + config.shutdown_grace();
        let service: Arc<dyn PrepareCoffee> = Arc::new(service);
        let queue = Arc::new(WaitingQueue::new(config.seats, config.baristas));
        let counters = Arc::new(CafeCounters::default());
        let (state_tx, _) = watch::channel(CafeState::Open);

        let baristas: Vec<_> = (0..config.baristas)
            .map(|id| Arc::new(Barista::new(id)))
            .collect();
        for barista in &baristas {
            queue.enqueue_barista(Arc::clone(barista));
        }

        let workers = baristas
            .iter()
            .map(|barista| {
                handle.spawn(run_barista(
                    Arc::clone(barista),
                    Arc::clone(&queue),
                    Arc::clone(&service),
                    Arc::clone(&counters),
                    state_tx.subscribe(),
                ))
            })
            .collect();
        let dispatcher = handle.spawn(run_dispatcher(Arc::clone(&queue), state_tx.subscribe()));

        info!(
            seats = config.seats,
            baristas = config.baristas,
            service_ms = config.service_time_ms,
            overflow = ?config.overflow,
            "cafe open"
        );

        Ok(Self {
            gate: OccupancyGate::new(config.seats),
            config,
            queue,
            baristas,
            counters,
            state_tx,
            shutting_down: AtomicBool::new(false),
            stopped: watch::channel(false).0,
            join_limit,
            dispatcher: Mutex::new(Some(dispatcher)),
            workers: Mutex::new(workers),
            next_customer: AtomicU64::new(1),
        })
    }

    /// Configuration the café was opened with.
    #[must_use]
    pub const fn config(&self) -> &CafeConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CafeState {
        *self.state_tx.borrow()
    }

    /// Create a customer with the next sequential identity.
    #[must_use]
    pub fn new_customer(&self) -> Customer {
        Customer::new(self.next_customer.fetch_add(1, Ordering::Relaxed))
    }

    /// Visit the café: take a seat, wait to be served, release the seat.
    ///
    /// Returns once the customer has fully departed.
    ///
    /// # Errors
    ///
    /// - `CafeError::Rejected` if the overflow policy turns the customer away
    /// - `CafeError::ArrivalTimeout` if the arrival timeout expires before a
    ///   barista is assigned
    /// - `CafeError::Closed` if the café is closing
    pub async fn arrive(&self, customer: Customer) -> Result<Visit, CafeError> {
        let id = customer.id();
        let arrived = Instant::now();
        let deadline = self.config.arrival_timeout().map(|t| arrived + t);

        if self.state() != CafeState::Open {
            self.counters.turned_away.fetch_add(1, Ordering::Relaxed);
            return Err(CafeError::Closed);
        }

        info!(customer = id, "waiting");
        let seat = self.take_seat(id, deadline).await?;
        let door_wait = arrived.elapsed();
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);
        info!(customer = id, occupancy = self.gate.occupancy(), "entered");

        let customer = Arc::new(customer);
        self.queue.enqueue_customer(Arc::clone(&customer));
        self.await_service(&customer, deadline).await?;

        // Woken without a barista only when shutdown abandoned the service.
        let Some(barista) = customer.served_by() else {
            self.record_departure_without_service(id, &CafeError::Closed);
            return Err(CafeError::Closed);
        };
        info!(customer = id, barista, "served");

        drop(seat);
        let total = arrived.elapsed();
        info!(customer = id, total_ms = total.as_millis(), "departed");

        Ok(Visit {
            customer: id,
            barista,
            door_wait,
            total,
        })
    }

    async fn take_seat(
        &self,
        id: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<Seat<'_>, CafeError> {
        let acquire = async {
            match self.config.overflow {
                OverflowPolicy::Wait => self.gate.acquire().await,
                OverflowPolicy::Reject { max_waiting } => {
                    self.gate.acquire_or_reject(max_waiting).await
                }
            }
        };

        let result = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, acquire)
                .await
                .unwrap_or(Err(CafeError::ArrivalTimeout)),
            None => acquire.await,
        };

        if let Err(err) = &result {
            self.record_departure_without_service(id, err);
        }
        result
    }

    async fn await_service(
        &self,
        customer: &Customer,
        deadline: Option<Instant>,
    ) -> Result<(), CafeError> {
        let mut state = self.state_tx.subscribe();
        let interrupted = tokio::select! {
            biased;
            () = customer.signal().wait() => None,
            () = sleep_until(deadline) => Some(CafeError::ArrivalTimeout),
            () = until_not_open(&mut state) => Some(CafeError::Closed),
        };

        if let Some(err) = interrupted {
            if self.queue.withdraw_customer(customer.id()).is_some() {
                self.record_departure_without_service(customer.id(), &err);
                return Err(err);
            }
            // Already paired: services are never cancelled.
            debug!(customer = customer.id(), "already paired, staying for coffee");
            customer.signal().wait().await;
        }
        Ok(())
    }

    fn record_departure_without_service(&self, id: CustomerId, err: &CafeError) {
        let counter = match err {
            CafeError::Rejected { .. } => &self.counters.rejected,
            CafeError::ArrivalTimeout => &self.counters.timed_out,
            _ => &self.counters.turned_away,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        warn!(customer = id, error = %err, "left without coffee");
    }

    /// Snapshot of current occupancy, queues and counters.
    #[must_use]
    pub fn stats(&self) -> CafeStats {
        CafeStats {
            state: self.state(),
            seats: self.config.seats,
            baristas: self.config.baristas,
            occupancy: self.gate.occupancy(),
            peak_occupancy: self.gate.peak_occupancy(),
            at_door: self.gate.waiting_at_door(),
            waiting_customers: self.queue.waiting_customers(),
            idle_baristas: self.queue.idle_baristas(),
            serving: self.counters.serving.load(Ordering::Acquire),
            peak_serving: self.counters.peak_serving.load(Ordering::Acquire),
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            served: self.counters.served.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            turned_away: self.counters.turned_away.load(Ordering::Relaxed),
        }
    }

    /// Coffees served by each barista, indexed by barista id.
    #[must_use]
    pub fn barista_served(&self) -> Vec<u64> {
        self.baristas.iter().map(|b| b.served()).collect()
    }

    /// Close the café and wait for its background tasks to stop.
    ///
    /// Idempotent: concurrent and later calls return once the first call has
    /// finished. Tasks that do not stop within the longer of the configured
    /// and the service's expected preparation time, plus the configured
    /// grace, are aborted.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            let mut stopped = self.stopped.subscribe();
            let _ = stopped.wait_for(|done| *done).await;
            return;
        }

        info!("closing cafe");
        self.state_tx.send_replace(CafeState::Closing);
        self.gate.close();

        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            join_within(handle, self.join_limit, "dispatcher").await;
        }

        self.state_tx.send_replace(CafeState::Closed);
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let worker_count = workers.len();
        for (barista, handle) in self.baristas.iter().zip(workers) {
            join_within(handle, self.join_limit, "barista").await;
            // No-op unless the task was aborted or panicked holding a customer.
            barista.abandon(&self.counters);
        }

        self.stopped.send_replace(true);
        info!(worker_count, "cafe closed");
    }
}

/// Join `handle`, aborting it after `limit`. The task has stopped on return.
async fn join_within(mut handle: JoinHandle<()>, limit: Duration, task: &'static str) {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(())) => debug!(task, "task joined"),
        Ok(Err(e)) => warn!(task, error = %e, "task panicked"),
        Err(_) => {
            warn!(task, limit_ms = limit.as_millis(), "task did not stop in time, aborting");
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Cafe {
    fn drop(&mut self) {
        if !self.shutting_down.swap(true, Ordering::AcqRel) {
            self.state_tx.send_replace(CafeState::Closed);
            self.gate.close();
            debug!("cafe dropped without explicit shutdown - tasks detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedPreparation;

    fn quick_config(seats: usize, baristas: usize) -> CafeConfig {
        CafeConfig::new()
            .with_seats(seats)
            .with_baristas(baristas)
            .with_service_time(Duration::from_millis(20))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_visit() {
        let cafe = Cafe::open(quick_config(1, 1), FixedPreparation(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(cafe.stats().idle_baristas, 1);

        let visit = cafe.arrive(cafe.new_customer()).await.unwrap();
        assert_eq!(visit.customer, 1);
        assert_eq!(visit.barista, 0);
        assert!(visit.total >= Duration::from_millis(20));

        let stats = cafe.stats();
        assert_eq!(stats.served, 1);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.occupancy, 0);
        cafe.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = Cafe::open(quick_config(0, 1), FixedPreparation(Duration::ZERO));
        assert!(matches!(result, Err(CafeError::InvalidConfig(_))));
    }

    #[test]
    fn test_open_requires_runtime() {
        let result = Cafe::open(quick_config(1, 1), FixedPreparation(Duration::ZERO));
        assert!(matches!(result, Err(CafeError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_arrive_after_shutdown_is_closed() {
        let cafe = Cafe::open(quick_config(1, 1), FixedPreparation(Duration::ZERO)).unwrap();
        cafe.shutdown().await;
        assert_eq!(cafe.state(), CafeState::Closed);
        assert_eq!(cafe.arrive(cafe.new_customer()).await, Err(CafeError::Closed));
        assert_eq!(cafe.stats().turned_away, 1);
    }
}
