//! Simulated network conditions applied in front of every handler.

use rand::Rng;
use std::time::Duration;

use super::router::Route;
use super::ApiError;

pub const DEFAULT_LATENCY_MS: (u64, u64) = (200, 1200);
pub const DEFAULT_FAILURE_RATE: f64 = 0.08;

pub trait NetworkPolicy: Send + Sync {
    /// How long the next request waits before its handler runs.
    fn latency(&self) -> Duration;
    /// Whether the next mutating request fails before reaching its handler.
    fn should_fail(&self) -> bool;
}

/// Uniform random latency and a fixed failure probability for writes.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    min_ms: u64,
    max_ms: u64,
    failure_rate: f64,
}

impl SimulatedNetwork {
    /// Bounds may come in either order. A rate outside `[0, 1]` is clamped
    /// and a NaN rate means writes never fail.
    pub fn new(min_ms: u64, max_ms: u64, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() { 0.0 } else { failure_rate };
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_MS.0, DEFAULT_LATENCY_MS.1, DEFAULT_FAILURE_RATE)
    }
}

impl NetworkPolicy for SimulatedNetwork {
    fn latency(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    fn should_fail(&self) -> bool {
        rand::thread_rng().gen_bool(self.failure_rate)
    }
}

/// No latency, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reliable;

impl NetworkPolicy for Reliable {
    fn latency(&self) -> Duration {
        Duration::ZERO
    }

    fn should_fail(&self) -> bool {
        false
    }
}

/// No latency, every mutating request fails.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Unreliable;

#[cfg(test)]
impl NetworkPolicy for Unreliable {
    fn latency(&self) -> Duration {
        Duration::ZERO
    }

    fn should_fail(&self) -> bool {
        true
    }
}

/// Waits out the simulated latency, then decides whether `route` is allowed
/// through. Reads are never failed.
pub async fn simulate(policy: &dyn NetworkPolicy, route: &Route) -> Result<(), ApiError> {
    let delay = policy.latency();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if route.is_mutating() && policy.should_fail() {
        tracing::warn!(route = route.label(), "injecting simulated failure");
        return Err(ApiError::SimulatedFailure(format!(
            "Simulated server error ({})",
            route.label()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stays_in_range() {
        let net = SimulatedNetwork::new(5, 15, 0.0);
        for _ in 0..200 {
            let ms = net.latency().as_millis();
            assert!((5..=15).contains(&ms), "latency {ms} out of range");
        }
    }

    #[test]
    fn test_swapped_bounds_and_rate_are_normalized() {
        let net = SimulatedNetwork::new(30, 10, 7.0);
        for _ in 0..50 {
            let ms = net.latency().as_millis();
            assert!((10..=30).contains(&ms));
            assert!(net.should_fail());
        }
    }

    #[test]
    fn test_nan_rate_never_fails() {
        let net = SimulatedNetwork::new(0, 0, f64::NAN);
        assert!((0..100).all(|_| !net.should_fail()));
        let net = SimulatedNetwork::new(0, 0, f64::INFINITY);
        assert!(net.should_fail());
    }

    #[test]
    fn test_zero_rate_never_fails() {
        let net = SimulatedNetwork::new(0, 0, 0.0);
        assert!((0..500).all(|_| !net.should_fail()));
        assert_eq!(net.latency(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_reads_pass_even_when_writes_fail() {
        assert!(simulate(&Unreliable, &Route::ListJobs).await.is_ok());
        assert!(simulate(&Unreliable, &Route::CandidateTimeline(1)).await.is_ok());

        let err = simulate(&Unreliable, &Route::CreateJob).await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "Simulated server error (create job)");
    }

    #[tokio::test]
    async fn test_reliable_lets_writes_through() {
        assert!(simulate(&Reliable, &Route::ReorderJob(3)).await.is_ok());
    }

    #[tokio::test]
    async fn test_latency_is_waited_out() {
        let net = SimulatedNetwork::new(20, 20, 0.0);
        let started = tokio::time::Instant::now();
        simulate(&net, &Route::ListJobs).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
