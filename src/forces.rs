//! The per-step force model shared by both engines.
//!
//! Velocity per particle is the sum of a dominant spring toward the shape
//! target, a small divergence-free turbulence field, per-hand gesture
//! forces, and the one-shot clap shockwave, integrated with forward Euler
//! at a fixed 1/60 step. The GPU kernel evaluates the same rules in WGSL
//! (see [`crate::kernel`]); the functions here are the CPU side and the
//! reference the kernel is tested against.
//!
//! Gesture force magnitudes fall off as the inverse of distance, clamped
//! near zero, and cut off entirely outside their radius. The swirl
//! component is the cross product of the fixed up axis with the radial
//! vector, which keeps it tangential.

use crate::input::Gesture;
use crate::noise::curl3;
use crate::time::FIXED_TIMESTEP;
use glam::Vec3;

// ========== Tuning ==========

/// Spring constant toward the shape target. Dominates every other term.
pub const SPRING_K: f32 = 0.15;
/// Turbulence gain relative to the spring.
pub const TURBULENCE_GAIN: f32 = 0.05;
/// Spatial frequency of the turbulence field.
pub const TURBULENCE_FREQ: f32 = 0.035;
/// How fast the turbulence field drifts, per second.
pub const TURBULENCE_DRIFT: f32 = 0.4;
/// Finite-difference epsilon for the curl samples.
pub const CURL_EPS: f32 = 0.25;

/// Interaction radius of grab and repel gestures, world units.
pub const INTERACTION_RADIUS: f32 = 50.0;
/// Attraction strength of a closed fist.
pub const GRAB_STRENGTH: f32 = 25.0;
/// Tangential swirl accompanying a fist.
pub const GRAB_SWIRL: f32 = 12.0;
/// Repulsion strength of an open hand.
pub const REPEL_STRENGTH: f32 = 20.0;
/// Swirl-only radius of the victory gesture, tighter than the others.
pub const SWIRL_RADIUS: f32 = 40.0;
/// Swirl-only strength of the victory gesture.
pub const SWIRL_STRENGTH: f32 = 8.0;
/// Pinching multiplies the fist attraction by this factor.
pub const PINCH_BOOST: f32 = 1.5;

/// Clap shockwave radius.
pub const SHOCKWAVE_RADIUS: f32 = 50.0;
/// Clap shockwave impulse strength.
pub const SHOCKWAVE_STRENGTH: f32 = 40.0;
/// Wavefront travel speed for the time-evaluated variant, units/second.
pub const WAVEFRONT_SPEED: f32 = 80.0;
/// Wavefront shell thickness.
pub const WAVEFRONT_WIDTH: f32 = 12.0;
/// Peak displacement inside the wavefront shell.
pub const WAVEFRONT_PUSH: f32 = 4.0;

/// Distance clamp so inverse-distance magnitudes stay bounded.
pub const MIN_DISTANCE: f32 = 2.0;
/// Particles beyond this distance from the origin snap back to their
/// target. Prevents numerical runaway from compounding forces.
pub const RUNAWAY_DISTANCE: f32 = 150.0;
/// Base speed multiplier; audio volume scales this up to 2x.
pub const BASE_SPEED: f32 = 12.0;

const UP: Vec3 = Vec3::Y;

/// Per-engine force parameters. Radii and strengths are fixed constants;
/// these are the knobs that vary at runtime or in tests.
#[derive(Debug, Clone, Copy)]
pub struct ForceParams {
    /// Spring constant toward the target.
    pub spring_k: f32,
    /// Turbulence gain; zero disables the field entirely.
    pub turbulence: f32,
    /// Speed multiplier, already scaled by audio volume.
    pub speed: f32,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            spring_k: SPRING_K,
            turbulence: TURBULENCE_GAIN,
            speed: BASE_SPEED,
        }
    }
}

/// One live interaction point, at most two per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    /// World-space position of the hand.
    pub position: Vec3,
    /// Which force rule applies.
    pub gesture: Gesture,
    /// Thumb and index pinched together; tightens a grab.
    pub pinch: bool,
    /// Hand tension in 0..1; scales the swirl.
    pub tension: f32,
}

/// A one-shot outward impulse event. Claps fire at full gain between the
/// hands; beat pulses fire at half gain from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockwaveEvent {
    /// World-space center of the blast.
    pub center: Vec3,
    /// Strength multiplier, 1.0 for a clap.
    pub gain: f32,
}

impl ShockwaveEvent {
    pub fn clap(center: Vec3) -> Self {
        Self { center, gain: 1.0 }
    }

    pub fn pulse() -> Self {
        Self {
            center: Vec3::ZERO,
            gain: 0.5,
        }
    }
}

/// Speed multiplier from audio volume (typically 0..2).
#[inline]
pub fn speed_from_volume(volume: f32) -> f32 {
    BASE_SPEED * (1.0 + volume.clamp(0.0, 2.0) * 0.5)
}

/// Spring velocity toward the target.
#[inline]
pub fn spring_velocity(position: Vec3, target: Vec3, k: f32) -> Vec3 {
    (target - position) * k
}

/// Turbulence velocity at a position: the drifting curl field, scaled.
pub fn turbulence_velocity(position: Vec3, time: f32, gain: f32) -> Vec3 {
    if gain <= 0.0 {
        return Vec3::ZERO;
    }
    let sample = position * TURBULENCE_FREQ + Vec3::splat(time * TURBULENCE_DRIFT);
    curl3(sample, CURL_EPS) * gain
}

/// Summed gesture velocity from the live interaction points.
pub fn gesture_velocity(position: Vec3, interactions: &[Interaction]) -> Vec3 {
    let mut vel = Vec3::ZERO;
    for hand in interactions {
        let radial = position - hand.position;
        let dist = radial.length();
        if dist < 1e-3 {
            continue;
        }
        let falloff = 1.0 / dist.max(MIN_DISTANCE);
        let swirl_scale = 1.0 + hand.tension.clamp(0.0, 1.0);
        match hand.gesture {
            Gesture::Fist => {
                if dist < INTERACTION_RADIUS {
                    let boost = if hand.pinch { PINCH_BOOST } else { 1.0 };
                    let tangent = UP.cross(radial) / dist;
                    vel += -(radial / dist) * GRAB_STRENGTH * boost * falloff;
                    vel += tangent * GRAB_SWIRL * swirl_scale * falloff;
                }
            }
            Gesture::Victory => {
                if dist < SWIRL_RADIUS {
                    let tangent = UP.cross(radial) / dist;
                    vel += tangent * SWIRL_STRENGTH * swirl_scale * falloff;
                }
            }
            Gesture::Open | Gesture::Point => {
                if dist < INTERACTION_RADIUS {
                    vel += (radial / dist) * REPEL_STRENGTH * falloff;
                }
            }
        }
    }
    vel
}

/// One-frame outward impulse from a clap at `center`. Applied by the GPU
/// path on the event frame only.
pub fn shockwave_velocity(position: Vec3, center: Vec3) -> Vec3 {
    let radial = position - center;
    let dist = radial.length();
    if dist < 1e-3 || dist > SHOCKWAVE_RADIUS {
        return Vec3::ZERO;
    }
    (radial / dist) * SHOCKWAVE_STRENGTH / dist.max(MIN_DISTANCE)
}

/// Expanding-wavefront displacement, evaluated from time since the clap.
///
/// The CPU engine displays base + stateless per-frame displacement, so a
/// single-frame impulse would be invisible there; instead the shell
/// `|dist - t * speed| < width` pushes particles outward as it travels,
/// dying once it leaves the shockwave radius.
pub fn wavefront_displacement(position: Vec3, center: Vec3, time_since: f32) -> Vec3 {
    if time_since < 0.0 {
        return Vec3::ZERO;
    }
    let wave_radius = time_since * WAVEFRONT_SPEED;
    if wave_radius > SHOCKWAVE_RADIUS + WAVEFRONT_WIDTH {
        return Vec3::ZERO;
    }
    let radial = position - center;
    let dist = radial.length();
    if dist < 1e-3 {
        return Vec3::ZERO;
    }
    let wave_dist = (dist - wave_radius).abs();
    if wave_dist >= WAVEFRONT_WIDTH {
        return Vec3::ZERO;
    }
    (radial / dist) * (1.0 - wave_dist / WAVEFRONT_WIDTH) * WAVEFRONT_PUSH
}

/// Advance one particle by one Euler step, applying the safety clamp.
///
/// `shockwave` is the one-shot event if it fired this frame.
pub fn step_position(
    position: Vec3,
    target: Vec3,
    time: f32,
    interactions: &[Interaction],
    shockwave: Option<ShockwaveEvent>,
    params: &ForceParams,
) -> Vec3 {
    if position.length() > RUNAWAY_DISTANCE {
        return target;
    }
    let mut vel = spring_velocity(position, target, params.spring_k);
    vel += turbulence_velocity(position, time, params.turbulence);
    vel += gesture_velocity(position, interactions);
    if let Some(event) = shockwave {
        vel += shockwave_velocity(position, event.center) * event.gain;
    }
    position + vel * params.speed * FIXED_TIMESTEP
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spring_only() -> ForceParams {
        ForceParams {
            turbulence: 0.0,
            ..ForceParams::default()
        }
    }

    #[test]
    fn test_spring_only_convergence() {
        let params = spring_only();
        let target = Vec3::new(12.0, -7.0, 3.0);
        let mut pos = Vec3::new(100.0, 40.0, -60.0);
        let mut steps = 0;
        while (pos - target).length() > 0.05 {
            pos = step_position(pos, target, 0.0, &[], None, &params);
            steps += 1;
            assert!(steps < 600, "did not converge, still at {pos:?}");
        }
    }

    #[test]
    fn test_runaway_clamp_resets_to_target() {
        let params = ForceParams::default();
        let target = Vec3::new(5.0, 5.0, 5.0);
        let pos = Vec3::new(200.0, 0.0, 0.0);
        let next = step_position(pos, target, 1.0, &[], None, &params);
        assert_eq!(next, target);
    }

    #[test]
    fn test_fist_attracts_with_swirl() {
        let hand = Interaction {
            position: Vec3::ZERO,
            gesture: Gesture::Fist,
            pinch: false,
            tension: 0.0,
        };
        let pos = Vec3::new(10.0, 0.0, 0.0);
        let vel = gesture_velocity(pos, &[hand]);
        // Radial component points at the hand, tangential component is
        // nonzero and perpendicular.
        assert!(vel.x < 0.0, "no attraction: {vel:?}");
        assert!(vel.z.abs() > 1e-4, "no swirl: {vel:?}");
    }

    #[test]
    fn test_pinch_boosts_grab() {
        let mut hand = Interaction {
            position: Vec3::ZERO,
            gesture: Gesture::Fist,
            pinch: false,
            tension: 0.0,
        };
        let pos = Vec3::new(10.0, 0.0, 0.0);
        let plain = gesture_velocity(pos, &[hand]).x;
        hand.pinch = true;
        let pinched = gesture_velocity(pos, &[hand]).x;
        assert!(pinched < plain, "pinch did not tighten: {plain} vs {pinched}");
    }

    #[test]
    fn test_open_hand_repels() {
        let hand = Interaction {
            position: Vec3::ZERO,
            gesture: Gesture::Open,
            pinch: false,
            tension: 0.0,
        };
        let vel = gesture_velocity(Vec3::new(10.0, 0.0, 0.0), &[hand]);
        assert!(vel.x > 0.0);
        // Point behaves like open.
        let pointing = Interaction {
            gesture: Gesture::Point,
            ..hand
        };
        let vel = gesture_velocity(Vec3::new(10.0, 0.0, 0.0), &[pointing]);
        assert!(vel.x > 0.0);
    }

    #[test]
    fn test_victory_is_tangential_only() {
        let hand = Interaction {
            position: Vec3::ZERO,
            gesture: Gesture::Victory,
            pinch: false,
            tension: 0.0,
        };
        let pos = Vec3::new(10.0, 0.0, 0.0);
        let vel = gesture_velocity(pos, &[hand]);
        assert!(vel.length() > 1e-4);
        assert!(vel.dot(pos.normalize()).abs() < 1e-4, "radial leak: {vel:?}");
        // Tighter radius than the other gestures.
        assert_eq!(gesture_velocity(Vec3::new(45.0, 0.0, 0.0), &[hand]), Vec3::ZERO);
    }

    #[test]
    fn test_forces_cut_off_outside_radius() {
        for gesture in [Gesture::Fist, Gesture::Open, Gesture::Point] {
            let hand = Interaction {
                position: Vec3::ZERO,
                gesture,
                pinch: false,
                tension: 0.0,
            };
            let vel = gesture_velocity(Vec3::new(60.0, 0.0, 0.0), &[hand]);
            assert_eq!(vel, Vec3::ZERO, "{gesture:?} leaked past its radius");
        }
    }

    #[test]
    fn test_no_nan_at_hand_position() {
        let hand = Interaction {
            position: Vec3::new(3.0, 1.0, 2.0),
            gesture: Gesture::Fist,
            pinch: true,
            tension: 1.0,
        };
        let vel = gesture_velocity(hand.position, &[hand]);
        assert!(vel.is_finite());
        assert_eq!(vel, Vec3::ZERO);
    }

    #[test]
    fn test_two_hands_superpose() {
        let left = Interaction {
            position: Vec3::new(-10.0, 0.0, 0.0),
            gesture: Gesture::Open,
            pinch: false,
            tension: 0.0,
        };
        let right = Interaction {
            position: Vec3::new(10.0, 0.0, 0.0),
            gesture: Gesture::Open,
            pinch: false,
            tension: 0.0,
        };
        // Centered between two repellers, the x components cancel.
        let vel = gesture_velocity(Vec3::new(0.0, 5.0, 0.0), &[left, right]);
        assert!(vel.x.abs() < 1e-4);
        assert!(vel.y > 0.0);
    }

    #[test]
    fn test_shockwave_pushes_outward() {
        let vel = shockwave_velocity(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);
        assert!(vel.x > 0.0);
        assert_eq!(shockwave_velocity(Vec3::new(60.0, 0.0, 0.0), Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn test_wavefront_travels_and_dies() {
        let pos = Vec3::new(20.0, 0.0, 0.0);
        // Shell far from the particle at t=0.
        assert_eq!(wavefront_displacement(pos, Vec3::ZERO, 0.0), Vec3::ZERO);
        // Shell crosses 20 units at t = 20/80.
        let hit = wavefront_displacement(pos, Vec3::ZERO, 20.0 / WAVEFRONT_SPEED);
        assert!(hit.x > 0.0);
        // Long gone after the shell leaves the radius.
        assert_eq!(wavefront_displacement(pos, Vec3::ZERO, 2.0), Vec3::ZERO);
    }

    #[test]
    fn test_turbulence_disabled_at_zero_gain() {
        assert_eq!(turbulence_velocity(Vec3::new(4.0, 5.0, 6.0), 1.0, 0.0), Vec3::ZERO);
        let on = turbulence_velocity(Vec3::new(4.0, 5.0, 6.0), 1.0, TURBULENCE_GAIN);
        assert!(on.length() > 0.0);
    }

    #[test]
    fn test_speed_scales_with_volume() {
        assert_eq!(speed_from_volume(0.0), BASE_SPEED);
        assert_eq!(speed_from_volume(2.0), BASE_SPEED * 2.0);
        // Clamped above the typical range.
        assert_eq!(speed_from_volume(9.0), BASE_SPEED * 2.0);
    }
}
