use std::time::Duration;

use rand::Rng;

/// First retry delay Google recommends for Drive API errors.
pub const DRIVE_BASE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound of the exponential part; Drive guidance caps waits at 32-64s.
pub const DRIVE_MAX_DELAY: Duration = Duration::from_secs(32);
/// Random extra wait added to every delay so parallel clients spread out.
pub const DRIVE_MAX_JITTER: Duration = Duration::from_secs(1);

/// Truncated exponential backoff: `min(base * 2^attempt, max)` plus a random
/// `0..=max_jitter` on top. The default follows Drive's documented schedule
/// (1s, 2s, 4s, ... up to 32s, each plus up to 1s of jitter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DRIVE_BASE_DELAY, DRIVE_MAX_DELAY).with_jitter(DRIVE_MAX_JITTER)
    }
}

impl Backoff {
    /// Deterministic schedule without jitter.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Wait before retry number `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.base.saturating_mul(factor).min(self.max);
        if self.max_jitter.is_zero() {
            return exponential;
        }
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        exponential.saturating_add(Duration::from_millis(rng.gen_range(0..=jitter_ms)))
    }
}
