//! Sample clock: elapsed time and the drift-free sampling schedule

use std::time::{Duration, Instant};

/// Lowest accepted sampling frequency in Hz
pub const FREQ_MIN: f64 = 1.0;
/// Highest accepted sampling frequency in Hz (ADXL345 maximum output data rate)
pub const FREQ_MAX: f64 = 3200.0;
/// Sampling frequency used when none is given
pub const FREQ_DEFAULT: f64 = 250.0;

// Below this much remaining time the wait spins instead of sleeping
const SPIN_THRESHOLD: Duration = Duration::from_micros(500);

/// Clamp a requested frequency into `[FREQ_MIN, FREQ_MAX]`
///
/// NaN falls back to the default.
pub fn clamp_frequency(freq: f64) -> f64 {
    if freq.is_nan() {
        return FREQ_DEFAULT;
    }
    freq.clamp(FREQ_MIN, FREQ_MAX)
}

/// Tracks elapsed time since acquisition start and the next due sample instant
///
/// The schedule accumulates `next_due += period` on every tick instead of
/// recomputing from the current time, so it never drifts. An overrun tick
/// leaves `next_due` in the past and the following wait returns at once.
pub struct SampleClock {
    start: Instant,
    period: f64,
    next_due: f64,
}

impl SampleClock {
    /// Start a clock for `frequency`, clamped into `[FREQ_MIN, FREQ_MAX]`
    pub fn start(frequency: f64) -> Self {
        Self {
            start: Instant::now(),
            period: 1.0 / clamp_frequency(frequency),
            next_due: 0.0,
        }
    }

    /// Get elapsed time in seconds
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Seconds since start at which the next sample is due
    pub fn next_due(&self) -> f64 {
        self.next_due
    }

    /// Sample period in seconds
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Move the schedule forward by one period
    pub fn advance(&mut self) {
        self.next_due += self.period;
    }

    /// Block until `next_due`: sleep for the bulk, spin for the tail
    pub fn wait_until_due(&self) {
        loop {
            let remaining = self.next_due - self.elapsed();
            if remaining <= 0.0 {
                return;
            }
            let remaining = Duration::from_secs_f64(remaining);
            if remaining > SPIN_THRESHOLD {
                std::thread::sleep(remaining - SPIN_THRESHOLD);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_frequency() {
        assert_eq!(clamp_frequency(0.0), 1.0);
        assert_eq!(clamp_frequency(-5.0), 1.0);
        assert_eq!(clamp_frequency(10_000.0), 3200.0);
        assert_eq!(clamp_frequency(250.0), 250.0);
        assert_eq!(clamp_frequency(f64::NAN), FREQ_DEFAULT);
    }

    #[test]
    fn test_schedule_is_accumulated() {
        let mut clock = SampleClock::start(100.0);
        assert_eq!(clock.next_due(), 0.0);

        // Stall longer than a period; the schedule must not shift
        std::thread::sleep(Duration::from_millis(25));
        for _ in 0..5 {
            clock.advance();
        }
        let expected = 5.0 * clock.period();
        assert!((clock.next_due() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_schedule_matches_multiples_of_period() {
        for freq in [1.0, 3.0, 250.0, 3200.0] {
            let mut clock = SampleClock::start(freq);
            let period = 1.0 / freq;
            for i in 1..=1000 {
                clock.advance();
                assert!((clock.next_due() - i as f64 * period).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_wait_until_due() {
        let mut clock = SampleClock::start(50.0);
        clock.advance();
        clock.wait_until_due();
        let elapsed = clock.elapsed();
        assert!(elapsed >= 0.02);
        assert!(elapsed < 0.2);
    }

    #[test]
    fn test_start_clamps_frequency() {
        assert_eq!(SampleClock::start(0.0).period(), 1.0);
        assert_eq!(SampleClock::start(f64::NAN).period(), 1.0 / FREQ_DEFAULT);
        assert_eq!(SampleClock::start(1e12).period(), 1.0 / FREQ_MAX);

        let mut clock = SampleClock::start(f64::INFINITY);
        clock.advance();
        clock.wait_until_due();
        assert!(clock.elapsed() < 0.1);
    }

    #[test]
    fn test_overrun_does_not_wait() {
        let mut clock = SampleClock::start(1000.0);
        std::thread::sleep(Duration::from_millis(10));
        clock.advance();
        let before = clock.elapsed();
        clock.wait_until_due();
        assert!(clock.elapsed() - before < 0.005);
    }
}
