use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use studio_contracts::generation::{GenerationRequest, GenerationResult, OVERLOADED_MESSAGE};
use studio_contracts::{ids, now_utc_iso};
use tracing::debug;

use crate::service::{GenerationService, ServiceError};

pub const DEFAULT_MIN_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(DEFAULT_MIN_DELAY_MS);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(DEFAULT_MAX_DELAY_MS);
pub const DEFAULT_FAILURE_RATE: f64 = 0.2;
pub const OVERLOADED_STATUS: u16 = 429;

/// Artificial latency and failure profile of the mock backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockBehavior {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub failure_rate: f64,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }
}

impl MockBehavior {
    /// No delay; fails with the given probability.
    pub fn instant(failure_rate: f64) -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            failure_rate,
        }
        .normalized()
    }

    /// Clamps the failure rate into `[0, 1]` and lifts `max_delay` to at least `min_delay`.
    pub fn normalized(self) -> Self {
        let failure_rate = if self.failure_rate.is_nan() {
            0.0
        } else {
            self.failure_rate.clamp(0.0, 1.0)
        };
        Self {
            min_delay: self.min_delay,
            max_delay: self.max_delay.max(self.min_delay),
            failure_rate,
        }
    }

    pub fn sample_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = saturating_millis(self.min_delay);
        let max = saturating_millis(self.max_delay);
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }

    pub fn roll_overload<R: Rng>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.failure_rate)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Generated(GenerationResult),
    Overloaded,
}

/// Stand-in backend: sleeps, then either echoes the request back as a result
/// or reports overload.
#[derive(Debug, Clone, Default)]
pub struct MockGenerationService {
    behavior: MockBehavior,
}

impl MockGenerationService {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: behavior.normalized(),
        }
    }

    pub fn behavior(&self) -> &MockBehavior {
        &self.behavior
    }

    pub async fn respond(&self, request: &GenerationRequest) -> MockOutcome {
        let (delay, overloaded) = {
            let mut rng = rand::thread_rng();
            (
                self.behavior.sample_delay(&mut rng),
                self.behavior.roll_overload(&mut rng),
            )
        };
        debug!(delay_ms = saturating_millis(delay), overloaded, "mock generation scheduled");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if overloaded {
            return MockOutcome::Overloaded;
        }
        MockOutcome::Generated(GenerationResult {
            id: ids::request_id(),
            encoded_image: request.encoded_image.clone(),
            prompt: request.prompt.clone(),
            style: request.style,
            created_at: now_utc_iso(),
        })
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ServiceError> {
        match self.respond(request).await {
            MockOutcome::Generated(result) => Ok(result),
            MockOutcome::Overloaded => Err(ServiceError::Http {
                status: OVERLOADED_STATUS,
                message: OVERLOADED_MESSAGE.to_string(),
            }),
        }
    }
}
