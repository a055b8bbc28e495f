//! The preparation step a barista performs for each customer.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::CustomerId;

/// Work a barista performs while serving one customer.
///
/// The returned future must run to completion; the customer is only woken
/// after it resolves. Implementations are shared by every barista.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use sleeping_barista::core::{CustomerId, PrepareCoffee};
///
/// struct Espresso;
///
/// #[async_trait]
/// impl PrepareCoffee for Espresso {
///     async fn prepare(&self, _barista: usize, _customer: CustomerId) {
///         tokio::time::sleep(std::time::Duration::from_millis(25)).await;
///     }
/// }
/// ```
#[async_trait]
pub trait PrepareCoffee: Send + Sync + 'static {
    /// Prepare a coffee for `customer`.
    async fn prepare(&self, barista: usize, customer: CustomerId);

    /// Typical time one `prepare` call takes.
    ///
    /// Shutdown waits at least this long for a barista to finish before
    /// aborting it. Defaults to zero, leaving only the configured grace.
    fn expected_duration(&self) -> Duration {
        Duration::ZERO
    }
}

/// Fixed preparation time for every coffee.
#[derive(Debug, Clone, Copy)]
pub struct FixedPreparation(pub Duration);

#[async_trait]
impl PrepareCoffee for FixedPreparation {
    async fn prepare(&self, _barista: usize, _customer: CustomerId) {
        tokio::time::sleep(self.0).await;
    }

    fn expected_duration(&self) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fixed_preparation_elapses_fully() {
        let prep = FixedPreparation(Duration::from_millis(30));
        let start = Instant::now();
        prep.prepare(0, 1).await;
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(prep.expected_duration(), Duration::from_millis(30));
    }
}
