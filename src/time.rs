//! Tick timing for the simulation loop.
//!
//! The physics step is a fixed 1/60 s regardless of the real frame interval
//! (stability over real-time accuracy), so simulation time is simply
//! `frame × step` and is fully deterministic. Wall-clock FPS is still
//! measured for diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use etherial::time::TickClock;
//!
//! let mut clock = TickClock::new();
//!
//! // In your loop:
//! let (elapsed, dt) = clock.tick();
//! println!("t = {:.2}s, dt = {:.4}s, fps = {:.1}", elapsed, dt, clock.fps());
//! ```

use std::time::{Duration, Instant};

/// The fixed physics timestep in seconds.
pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;

/// Fixed-step tick clock for the simulation loop.
///
/// Simulation time advances by exactly one step per `tick()`; wall-clock
/// FPS is computed over a sliding half-second window.
#[derive(Debug)]
pub struct TickClock {
    /// When the clock was created.
    start: Instant,
    /// Simulation time in seconds (frame count × step).
    sim_elapsed: f32,
    /// Fixed step applied per tick, in seconds.
    step: f32,
    /// Total ticks since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Time of last FPS calculation.
    fps_update_time: Instant,
    /// How often to update the FPS calculation.
    fps_update_interval: Duration,
}

impl TickClock {
    /// Create a clock with the standard 1/60 s step.
    pub fn new() -> Self {
        Self::with_step(FIXED_TIMESTEP)
    }

    /// Create a clock with a custom fixed step.
    pub fn with_step(step: f32) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            sim_elapsed: 0.0,
            step: step.max(0.0),
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Advance simulation time by one fixed step. Call once per frame.
    ///
    /// Returns `(elapsed_time, step)` for convenience.
    pub fn tick(&mut self) -> (f32, f32) {
        self.frame_count += 1;
        self.sim_elapsed = self.frame_count as f32 * self.step;

        let now = Instant::now();
        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        (self.sim_elapsed, self.step)
    }

    /// Simulation time in seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.sim_elapsed
    }

    /// The fixed step in seconds.
    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Total ticks since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Wall-clock frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Wall-clock time since the clock was created.
    #[inline]
    pub fn wall_elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Reset the clock to its initial state.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.sim_elapsed = 0.0;
        self.frame_count = 0;
        self.fps = 0.0;
        self.fps_frame_count = 0;
        self.fps_update_time = now;
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_new() {
        let clock = TickClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.elapsed(), 0.0);
        assert!((clock.step() - 1.0 / 60.0).abs() < 1e-7);
    }

    #[test]
    fn test_tick_advances_fixed_step() {
        let mut clock = TickClock::new();
        let (elapsed, dt) = clock.tick();
        assert!((dt - FIXED_TIMESTEP).abs() < 1e-7);
        assert!((elapsed - FIXED_TIMESTEP).abs() < 1e-7);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_sim_time_is_deterministic() {
        let mut clock = TickClock::new();
        for _ in 0..120 {
            clock.tick();
        }
        // Two simulated seconds after 120 ticks, regardless of wall time.
        assert!((clock.elapsed() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_custom_step() {
        let mut clock = TickClock::with_step(0.1);
        clock.tick();
        clock.tick();
        assert!((clock.elapsed() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut clock = TickClock::new();
        clock.tick();
        clock.reset();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.elapsed(), 0.0);
    }
}
