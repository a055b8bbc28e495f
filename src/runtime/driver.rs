//! Arrival driver: spawn a batch of customers and wait for all of them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{Cafe, CafeError, CafeStats, Visit};

/// Outcome of a batch of arrivals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalReport {
    /// Customers that arrived.
    pub customers: usize,
    /// Completed visits, in completion-await order.
    pub visits: Vec<Visit>,
    /// Arrivals turned away by the overflow policy.
    pub rejected: usize,
    /// Arrivals that gave up waiting.
    pub timed_out: usize,
    /// Arrivals sent away because the café closed.
    pub closed: usize,
    /// Wall-clock time from first arrival to last departure.
    pub elapsed: Duration,
    /// Café statistics after the batch.
    pub stats: CafeStats,
}

impl ArrivalReport {
    /// Number of customers that got their coffee.
    #[must_use]
    pub fn served(&self) -> usize {
        self.visits.len()
    }
}

/// Send `customers` arrivals into `cafe` at once and wait for every one to
/// depart.
///
/// # Errors
///
/// Returns `CafeError::ProtocolViolation` if a customer task panicked.
pub async fn run_arrivals(cafe: &Arc<Cafe>, customers: usize) -> Result<ArrivalReport, CafeError> {
    let started = Instant::now();
    info!(customers, "customers arriving");

    let handles: Vec<_> = (0..customers)
        .map(|_| {
            let cafe = Arc::clone(cafe);
            tokio::spawn(async move {
                let customer = cafe.new_customer();
                cafe.arrive(customer).await
            })
        })
        .collect();

    let mut report = ArrivalReport {
        customers,
        visits: Vec::with_capacity(customers),
        rejected: 0,
        timed_out: 0,
        closed: 0,
        elapsed: Duration::ZERO,
        stats: cafe.stats(),
    };

    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| CafeError::ProtocolViolation(format!("customer task failed: {e}")))?;
        match outcome {
            Ok(visit) => report.visits.push(visit),
            Err(CafeError::Rejected { .. }) => report.rejected += 1,
            Err(CafeError::ArrivalTimeout) => report.timed_out += 1,
            Err(CafeError::Closed) => report.closed += 1,
            Err(other) => return Err(other),
        }
    }

    report.elapsed = started.elapsed();
    report.stats = cafe.stats();
    info!(
        served = report.served(),
        rejected = report.rejected,
        timed_out = report.timed_out,
        elapsed_ms = report.elapsed.as_millis(),
        "all customers departed"
    );
    Ok(report)
}
