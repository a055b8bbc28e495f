//! One-shot, re-armable rendezvous signal.
//!
//! A `RendezvousSignal` connects exactly one waiter to exactly one firer per
//! cycle. Customers wait on theirs to learn they have been served; baristas
//! wait on theirs to learn a customer has been assigned to them.
//!
//! The signal moves through three states:
//!
//! ```text
//!   Armed --fire()--> Fired --wait() returns--> Consumed --rearm()--> Armed
//! ```
//!
//! Any other transition is a protocol violation and panics.

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::CafeError;

/// Observable state of a [`RendezvousSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// Ready to be fired; a waiter may be parked on it.
    Armed,
    /// Fired but not yet observed by the waiter.
    Fired,
    /// The waiter observed the firing. Must be re-armed before reuse.
    Consumed,
}

#[derive(Debug)]
struct SignalInner {
    state: SignalState,
    generation: u64,
}

/// Re-armable one-shot wake primitive.
#[derive(Debug)]
pub struct RendezvousSignal {
    inner: Mutex<SignalInner>,
    notify: Notify,
}

impl Default for RendezvousSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RendezvousSignal {
    /// Create a new signal in the `Armed` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SignalInner {
                state: SignalState::Armed,
                generation: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SignalState {
        self.inner.lock().state
    }

    /// Number of completed re-arm cycles.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Whether the signal has fired and the waiter has not yet observed it.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.state() == SignalState::Fired
    }

    /// Fire the signal, waking its waiter.
    ///
    /// # Errors
    ///
    /// Returns `CafeError::ProtocolViolation` if the signal is not `Armed`.
    pub fn try_fire(&self) -> Result<(), CafeError> {
        let mut inner = self.inner.lock();
        if inner.state != SignalState::Armed {
            return Err(CafeError::ProtocolViolation(format!(
                "fire on {:?} signal (generation {})",
                inner.state, inner.generation
            )));
        }
        inner.state = SignalState::Fired;
        drop(inner);
        // notify_one stores a permit when nobody is parked yet, so a waiter
        // arriving after this point still wakes.
        self.notify.notify_one();
        Ok(())
    }

    /// Fire the signal, waking its waiter.
    ///
    /// # Panics
    ///
    /// Panics if the signal was already fired in this cycle.
    pub fn fire(&self) {
        if let Err(e) = self.try_fire() {
            panic!("{e}");
        }
    }

    /// Wait until the signal fires, then mark it consumed.
    ///
    /// Cancel-safe: dropping the returned future before it completes leaves
    /// the state untouched.
    ///
    /// # Panics
    ///
    /// Panics when called on a `Consumed` signal that was not re-armed.
    pub async fn wait(&self) {
        loop {
            {
                let mut inner = self.inner.lock();
                match inner.state {
                    SignalState::Fired => {
                        inner.state = SignalState::Consumed;
                        return;
                    }
                    SignalState::Consumed => {
                        let generation = inner.generation;
                        drop(inner);
                        panic!(
                            "protocol violation: wait on consumed signal (generation {generation})"
                        );
                    }
                    SignalState::Armed => {}
                }
            }
            // A stale permit from an earlier cycle only causes one extra
            // state check.
            self.notify.notified().await;
        }
    }

    /// Return the signal to `Armed` for the next cycle.
    ///
    /// # Panics
    ///
    /// Panics if the signal fired but its waiter has not observed it yet.
    pub fn rearm(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            SignalState::Fired => {
                let generation = inner.generation;
                drop(inner);
                panic!("protocol violation: rearm of unconsumed signal (generation {generation})");
            }
            SignalState::Consumed => {
                inner.state = SignalState::Armed;
                inner.generation += 1;
            }
            SignalState::Armed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fire_before_wait() {
        let signal = RendezvousSignal::new();
        signal.fire();
        assert!(signal.is_fired());
        signal.wait().await;
        assert_eq!(signal.state(), SignalState::Consumed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_then_fire_from_other_task() {
        let signal = Arc::new(RendezvousSignal::new());
        let firer = Arc::clone(&signal);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            firer.fire();
        });

        tokio::time::timeout(Duration::from_secs(2), signal.wait())
            .await
            .expect("signal should fire");
        handle.await.unwrap();
    }

    #[test]
    fn test_double_fire_is_reported() {
        let signal = RendezvousSignal::new();
        assert!(signal.try_fire().is_ok());
        let err = signal.try_fire().unwrap_err();
        assert!(matches!(err, CafeError::ProtocolViolation(_)));
    }

    #[test]
    #[should_panic(expected = "protocol violation")]
    fn test_double_fire_panics() {
        let signal = RendezvousSignal::new();
        signal.fire();
        signal.fire();
    }

    #[tokio::test]
    #[should_panic(expected = "wait on consumed signal")]
    async fn test_wait_on_stale_signal_panics() {
        let signal = RendezvousSignal::new();
        signal.fire();
        signal.wait().await;
        signal.wait().await;
    }

    #[tokio::test]
    async fn test_rearm_cycles() {
        let signal = RendezvousSignal::new();
        for cycle in 0..3 {
            assert_eq!(signal.generation(), cycle);
            signal.fire();
            signal.wait().await;
            signal.rearm();
            assert_eq!(signal.state(), SignalState::Armed);
        }
        assert_eq!(signal.generation(), 3);
    }

    #[test]
    #[should_panic(expected = "rearm of unconsumed signal")]
    fn test_rearm_unconsumed_panics() {
        let signal = RendezvousSignal::new();
        signal.fire();
        signal.rearm();
    }

    #[tokio::test]
    async fn test_cancelled_wait_keeps_state() {
        let signal = RendezvousSignal::new();
        let timed_out = tokio::time::timeout(Duration::from_millis(10), signal.wait()).await;
        assert!(timed_out.is_err());
        assert_eq!(signal.state(), SignalState::Armed);

        signal.fire();
        signal.wait().await;
        assert_eq!(signal.state(), SignalState::Consumed);
    }
}
