/*!
 * # Circuit Breaker
 *
 * Guards calls to the payment provider so that a provider outage fails
 * fast instead of stacking up checkout requests behind network timeouts.
 */

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited requests to test recovery
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Maximum number of failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to wait before transitioning from Open to HalfOpen
    pub timeout: Duration,
    /// Number of successful requests needed in HalfOpen to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

/// Decides whether an error says something about the health of the
/// downstream service. A declined card is a healthy answer, a reset
/// connection is not.
pub trait BreakerFailure {
    fn trips_breaker(&self) -> bool;
}

#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    CircuitOpen,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

/// Shared handle; clones observe the same state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name),
            config,
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
        }
    }

    /// Runs `f` under breaker protection.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: BreakerFailure,
    {
        if !self.can_execute() {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                if err.trips_breaker() {
                    self.on_failure();
                } else {
                    self.on_success();
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn can_execute(&self) -> bool {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match state.opened_at {
                Some(opened) if opened.elapsed() >= self.config.timeout => {
                    info!(breaker = %self.name, "circuit half-open, probing");
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    true
                }
                _ => false,
            },
        }
    }

    fn on_success(&self) {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed => state.failure_count = 0,
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    info!(breaker = %self.name, "circuit closed");
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = state.failure_count,
                        "circuit opened"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, circuit re-opened");
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl BreakerFailure for Flaky {
        fn trips_breaker(&self) -> bool {
            self.0
        }
    }

    fn breaker(timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                timeout,
                success_threshold: 1,
            },
        )
    }

    #[tokio::test]
    async fn opens_after_threshold_and_rejects_calls() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>(Flaky(true)) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb.call(|| async { Ok::<_, Flaky>(1) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn non_tripping_errors_keep_circuit_closed() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..5 {
            let _ = cb.call(|| async { Err::<(), _>(Flaky(false)) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_opens_after_timeout_and_closes_on_success() {
        let cb = breaker(Duration::from_millis(10));
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>(Flaky(true)) }).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let value = cb.call(|| async { Ok::<_, Flaky>(7) }).await;
        assert!(matches!(value, Ok(7)));
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
