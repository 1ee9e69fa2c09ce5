//! Fixed-step clock driving the simulation from wall-clock frame time.

use std::time::{Duration, Instant};

/// Upper bound on steps handed out per frame, so a long stall does not
/// trigger a spiral of catch-up work.
const MAX_STEPS_PER_FRAME: u32 = 8;

/// Step used when the requested one is not a usable duration.
const FALLBACK_STEP: Duration = Duration::from_nanos(16_666_667);

/// Converts variable frame time into a whole number of fixed simulation steps.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    fixed_dt: Duration,
    accumulator: Duration,
}

impl FrameClock {
    /// Create a clock handing out steps of `fixed_dt` seconds.
    ///
    /// A zero, negative or non-finite `fixed_dt` falls back to 1/60 s.
    pub fn new(fixed_dt: f32) -> Self {
        let step = Duration::try_from_secs_f32(fixed_dt)
            .ok()
            .filter(|step| !step.is_zero())
            .unwrap_or_else(|| {
                tracing::warn!("Invalid fixed step {}s, using 1/60 s", fixed_dt);
                FALLBACK_STEP
            });

        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            fixed_dt: step,
            accumulator: Duration::ZERO,
        }
    }

    /// Length of one simulation step in seconds.
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt.as_secs_f32()
    }

    /// Total time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Measure the time since the previous tick and return how many fixed
    /// steps are now due.
    pub fn tick(&mut self) -> u32 {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.advance_by(delta)
    }

    /// Feed `delta` into the accumulator and drain it in whole steps.
    pub fn advance_by(&mut self, delta: Duration) -> u32 {
        self.accumulator += delta;
        let mut steps = 0;
        while self.accumulator >= self.fixed_dt && steps < MAX_STEPS_PER_FRAME {
            self.accumulator -= self.fixed_dt;
            steps += 1;
        }
        if steps == MAX_STEPS_PER_FRAME {
            // Drop the backlog rather than carrying it into the next frame.
            self.accumulator = Duration::ZERO;
        }
        steps
    }

    /// Restart timing from now with an empty accumulator.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.accumulator = Duration::ZERO;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates_partial_steps() {
        let mut clock = FrameClock::new(0.01);
        assert_eq!(clock.advance_by(Duration::from_millis(5)), 0);
        assert_eq!(clock.advance_by(Duration::from_millis(6)), 1);
        assert_eq!(clock.advance_by(Duration::from_millis(25)), 2);
    }

    #[test]
    fn test_advance_caps_backlog() {
        let mut clock = FrameClock::new(0.01);
        assert_eq!(clock.advance_by(Duration::from_secs(5)), MAX_STEPS_PER_FRAME);
        // Backlog was discarded, so a small delta yields nothing.
        assert_eq!(clock.advance_by(Duration::from_millis(1)), 0);
    }

    #[test]
    fn test_reset_clears_accumulator() {
        let mut clock = FrameClock::new(0.01);
        clock.advance_by(Duration::from_millis(9));
        clock.reset();
        assert_eq!(clock.advance_by(Duration::from_millis(2)), 0);
    }

    #[test]
    fn test_unusable_step_falls_back() {
        for fixed_dt in [f32::INFINITY, f32::NAN, 0.0, -1.0] {
            let clock = FrameClock::new(fixed_dt);
            assert!((clock.fixed_dt() - 1.0 / 60.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_default_is_sixty_hertz() {
        let clock = FrameClock::default();
        assert!((clock.fixed_dt() - 1.0 / 60.0).abs() < 1e-6);
    }
}
