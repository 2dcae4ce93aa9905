//! System configuration.

use crate::cpu::DEFAULT_CPU_COUNT;
use crate::forces::{self, ForceParams};
use crate::input::{ClapDetection, CLAP_THRESHOLD, HAND_REACH};

/// Which engine the selector is allowed to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnginePreference {
    /// Probe for a hardware adapter; fall back to the CPU engine when the
    /// probe fails or only finds a software rasterizer.
    #[default]
    Auto,
    /// Skip the probe and run the CPU engine directly.
    ///
    /// Use for tests and headless machines where requesting an adapter is
    /// pointless or slow.
    ForceCpu,
}

/// Tunable knobs for a particle system.
///
/// All fields are public; the `with_*` methods exist for chaining:
///
/// ```ignore
/// let config = SystemConfig::new().with_gpu_side(256).force_cpu();
/// ```
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Side of the square particle grid on the GPU path.
    /// Total count is `gpu_side²`. Typical: 64, 128, 256.
    pub gpu_side: u32,

    /// Particle count on the CPU fallback path.
    /// Smaller than the GPU grid; every particle is stepped in Rust.
    pub cpu_count: usize,

    /// Engine selection policy.
    pub preference: EnginePreference,

    /// Clap detector mode (edge-triggered or raw threshold).
    pub clap_mode: ClapDetection,

    /// World-space distance under which two hands count as clapping.
    pub clap_threshold: f32,

    /// Scale from normalized hand coordinates to world units.
    pub hand_reach: f32,

    /// Spring constant pulling particles toward their targets (0.0-1.0).
    pub spring_k: f32,

    /// Curl-noise turbulence gain. Zero stills the idle wander.
    pub turbulence: f32,
}

impl SystemConfig {
    /// Default configuration: auto-probed engine, 128x128 GPU grid,
    /// 8192-particle CPU fallback, debounced clap.
    pub fn new() -> Self {
        Self {
            gpu_side: 128,
            cpu_count: DEFAULT_CPU_COUNT,
            preference: EnginePreference::Auto,
            clap_mode: ClapDetection::default(),
            clap_threshold: CLAP_THRESHOLD,
            hand_reach: HAND_REACH,
            spring_k: forces::SPRING_K,
            turbulence: forces::TURBULENCE_GAIN,
        }
    }

    /// Set the GPU grid side length (clamped to 8-1024).
    ///
    /// Memory per particle buffer at full precision is `side² * 16` bytes:
    /// - 128² = 256KB
    /// - 256² = 1MB
    /// - 512² = 4MB
    pub fn with_gpu_side(mut self, side: u32) -> Self {
        self.gpu_side = side.clamp(8, 1024);
        self
    }

    /// Set the CPU fallback particle count (at least 1).
    pub fn with_cpu_count(mut self, count: usize) -> Self {
        self.cpu_count = count.max(1);
        self
    }

    /// Route straight to the CPU engine, skipping the adapter probe.
    pub fn force_cpu(mut self) -> Self {
        self.preference = EnginePreference::ForceCpu;
        self
    }

    /// Set the clap detector mode.
    pub fn with_clap_mode(mut self, mode: ClapDetection) -> Self {
        self.clap_mode = mode;
        self
    }

    /// Set the world-space clap distance threshold.
    pub fn with_clap_threshold(mut self, threshold: f32) -> Self {
        self.clap_threshold = threshold.max(0.0);
        self
    }

    /// Set the normalized-to-world hand scale.
    pub fn with_hand_reach(mut self, reach: f32) -> Self {
        self.hand_reach = reach.max(0.0);
        self
    }

    /// Set the spring constant (clamped to 0.0-1.0).
    ///
    /// Higher snaps particles to their targets faster; 1.0 teleports
    /// within a frame at base speed.
    pub fn with_spring(mut self, k: f32) -> Self {
        self.spring_k = k.clamp(0.0, 1.0);
        self
    }

    /// Set the turbulence gain. Zero disables the curl field.
    pub fn with_turbulence(mut self, gain: f32) -> Self {
        self.turbulence = gain.max(0.0);
        self
    }

    /// Total GPU particle count.
    pub fn gpu_count(&self) -> u32 {
        self.gpu_side * self.gpu_side
    }

    /// Force parameters for either engine.
    pub fn force_params(&self) -> ForceParams {
        ForceParams {
            spring_k: self.spring_k,
            turbulence: self.turbulence,
            speed: forces::BASE_SPEED,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = SystemConfig::default();
        assert_eq!(config.gpu_count(), 128 * 128);
        assert_eq!(config.cpu_count, DEFAULT_CPU_COUNT);
        assert_eq!(config.preference, EnginePreference::Auto);
        assert_eq!(config.force_params().spring_k, forces::SPRING_K);
    }

    #[test]
    fn test_builders_chain_and_clamp() {
        let config = SystemConfig::new()
            .with_gpu_side(4)
            .with_cpu_count(0)
            .with_spring(7.0)
            .with_turbulence(-1.0)
            .force_cpu();
        assert_eq!(config.gpu_side, 8);
        assert_eq!(config.cpu_count, 1);
        assert_eq!(config.spring_k, 1.0);
        assert_eq!(config.turbulence, 0.0);
        assert_eq!(config.preference, EnginePreference::ForceCpu);
    }

    #[test]
    fn test_gpu_count_is_a_perfect_square() {
        let config = SystemConfig::new().with_gpu_side(64);
        assert_eq!(config.gpu_count(), 4096);
    }
}
