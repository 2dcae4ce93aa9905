//! Procedural shape targets.
//!
//! Every particle slot owns a target position derived from the current
//! shape. Targets are pure functions of the slot index: all randomness (the
//! (u, v) draw, discrete face/burst/strand picks, jitter) comes from a hash
//! chain seeded by the slot, so re-evaluating a slot always lands on the
//! same point. The GPU kernel recomputes targets every frame from the same
//! chain (see [`crate::shader_utils`]) without shimmer, while the CPU engine
//! materializes them once per shape command.
//!
//! Text is the one non-procedural shape: its targets come from a rasterized
//! bitmap (see [`crate::text`]) and are baked into a buffer instead.
//!
//! # Example
//!
//! ```ignore
//! use etherial::shape::{procedural_target, Shape};
//!
//! let shape = Shape::parse("galaxy");
//! let target = procedural_target(&shape, 1234);
//! ```

use crate::noise::{rand_f32, rand_range};
use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Nominal shape radius in world units. All formulas span roughly this
/// radius; interaction radii and the runaway bound use the same units.
pub const SHAPE_RADIUS: f32 = 20.0;

/// Radius of the "singularity" ball particles are seeded into at startup.
pub const SINGULARITY_RADIUS: f32 = 1.5;

/// Per-slot seed stride: each slot owns eight consecutive draw seeds.
const DRAWS_PER_SLOT: u32 = 8;

/// The shapes the organism can form.
///
/// Parsed from voice/text tokens with [`Shape::parse`]; unknown tokens fall
/// back to [`Shape::Sphere`].
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Hollow sphere, the resting state.
    Sphere,
    /// Classic heart curve, filled, jittered in z.
    Hearts,
    /// Six-petal rose facing the viewer.
    Flower,
    /// Small sphere plus a flat tilted ring.
    Saturn,
    /// Seated figure from stacked ellipsoid shells.
    Buddha,
    /// Several randomly-centered spherical bursts.
    Fireworks,
    /// Two counter-phase helical strands.
    Dna,
    /// Four-arm spiral disk.
    Galaxy,
    /// Funnel with radius growing with height.
    Tornado,
    /// Six-face hollow cube.
    Cube,
    /// Major/minor ring.
    Torus,
    /// Rippling sheet.
    Wave,
    /// Rasterized text; targets are baked, not procedural.
    Text(String),
}

impl Shape {
    /// Parse a shape token. Unknown tokens default to the sphere, never an
    /// error.
    pub fn parse(token: &str) -> Shape {
        match token.trim().to_ascii_lowercase().as_str() {
            "sphere" => Shape::Sphere,
            "heart" | "hearts" => Shape::Hearts,
            "flower" => Shape::Flower,
            "saturn" => Shape::Saturn,
            "buddha" => Shape::Buddha,
            "firework" | "fireworks" => Shape::Fireworks,
            "dna" => Shape::Dna,
            "galaxy" => Shape::Galaxy,
            "tornado" => Shape::Tornado,
            "cube" => Shape::Cube,
            "torus" => Shape::Torus,
            "wave" => Shape::Wave,
            _ => Shape::Sphere,
        }
    }

    /// Identifier the compute kernel switches on. Text reports the sphere
    /// id; the kernel never evaluates it because text flips the baked-target
    /// mode instead.
    pub fn kernel_id(&self) -> u32 {
        match self {
            Shape::Sphere | Shape::Text(_) => 0,
            Shape::Hearts => 1,
            Shape::Flower => 2,
            Shape::Saturn => 3,
            Shape::Buddha => 4,
            Shape::Fireworks => 5,
            Shape::Dna => 6,
            Shape::Galaxy => 7,
            Shape::Tornado => 8,
            Shape::Cube => 9,
            Shape::Torus => 10,
            Shape::Wave => 11,
        }
    }

    /// Whether targets for this shape come from a baked buffer rather than
    /// the procedural formulas.
    pub fn is_baked(&self) -> bool {
        matches!(self, Shape::Text(_))
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Sphere
    }
}

/// Draws available to one slot: (u, v) plus three extras, all in [0, 1).
struct SlotDraws {
    u: f32,
    v: f32,
    d0: f32,
    d1: f32,
    d2: f32,
}

impl SlotDraws {
    fn new(slot: u32) -> Self {
        let s = slot.wrapping_mul(DRAWS_PER_SLOT);
        Self {
            u: rand_f32(s),
            v: rand_f32(s.wrapping_add(1)),
            d0: rand_f32(s.wrapping_add(2)),
            d1: rand_f32(s.wrapping_add(3)),
            d2: rand_f32(s.wrapping_add(4)),
        }
    }
}

/// Target position for a slot under a procedural shape.
///
/// For [`Shape::Text`] (whose targets are baked elsewhere) this falls back
/// to the sphere formula so callers always get a usable interim position.
pub fn procedural_target(shape: &Shape, slot: u32) -> Vec3 {
    let d = SlotDraws::new(slot);
    let r = SHAPE_RADIUS;
    match shape {
        Shape::Sphere | Shape::Text(_) => sphere_point(d.u, d.v, r * (0.96 + 0.08 * d.d0)),
        Shape::Hearts => {
            let t = d.u * TAU;
            // Fill toward the rim; sqrt keeps the area density even.
            let fill = 0.35 + 0.65 * d.v.sqrt();
            let x = 16.0 * t.sin().powi(3);
            let y = 13.0 * t.cos()
                - 5.0 * (2.0 * t).cos()
                - 2.0 * (3.0 * t).cos()
                - (4.0 * t).cos();
            let k = r / 16.0;
            Vec3::new(k * fill * x, k * fill * (y + 2.5), (d.d0 - 0.5) * 4.0)
        }
        Shape::Flower => {
            let t = d.u * TAU;
            let petal = (3.0 * t).cos().abs();
            let rho = r * (0.18 + 0.82 * petal) * (0.3 + 0.7 * d.v.sqrt());
            Vec3::new(
                rho * t.cos(),
                rho * t.sin(),
                (1.0 - rho / r) * 3.0 + (d.d0 - 0.5) * 2.0,
            )
        }
        Shape::Saturn => {
            let p = if d.d0 < 0.55 {
                sphere_point(d.u, d.v, r * 0.55)
            } else {
                let theta = d.u * TAU;
                let ring_r = r * (1.15 + 0.55 * d.d1);
                Vec3::new(
                    ring_r * theta.cos(),
                    (d.d2 - 0.5) * 1.2,
                    ring_r * theta.sin(),
                )
            };
            tilt_x(p, 0.25)
        }
        Shape::Buddha => {
            let dir = sphere_point(d.u, d.v, 1.0);
            if d.d0 < 0.18 {
                // Head
                Vec3::new(0.0, 0.62 * r, 0.0) + dir * Vec3::new(0.20, 0.22, 0.20) * r
            } else if d.d0 < 0.62 {
                // Torso
                Vec3::new(0.0, 0.10 * r, 0.0) + dir * Vec3::new(0.40, 0.45, 0.33) * r
            } else {
                // Folded legs and base
                Vec3::new(0.0, -0.42 * r, 0.0) + dir * Vec3::new(0.60, 0.22, 0.45) * r
            }
        }
        Shape::Fireworks => {
            let burst = (d.d0 * 6.0) as u32 % 6;
            let center = burst_center(burst) * 0.75 * r;
            let radius = 0.28 * r * (0.3 + 0.7 * d.d1.cbrt());
            center + sphere_point(d.u, d.v, radius)
        }
        Shape::Dna => {
            let strand = if d.d0 < 0.5 { 0.0 } else { 1.0 };
            let ang = d.v * 2.5 * TAU + strand * PI;
            let helix_r = 0.22 * r;
            Vec3::new(
                helix_r * ang.cos() + (d.d1 - 0.5) * 1.2,
                (d.v - 0.5) * 1.7 * r,
                helix_r * ang.sin() + (d.d2 - 0.5) * 1.2,
            )
        }
        Shape::Galaxy => {
            let arm = (d.d0 * 4.0) as u32 % 4;
            let t = d.v;
            let radius = r * (0.10 + 0.90 * t);
            let ang = arm as f32 * (TAU / 4.0) + 2.4 * t.powf(0.7) + (d.d1 - 0.5) * 0.5;
            Vec3::new(
                radius * ang.cos(),
                (d.d2 - 0.5) * 0.12 * r * (1.2 - t),
                radius * ang.sin(),
            )
        }
        Shape::Tornado => {
            let y = (d.v - 0.5) * 1.8 * r;
            let funnel = r * (0.12 + 0.50 * y.abs() / (0.9 * r)) + (d.d0 - 0.5) * 0.12 * r;
            let ang = d.u * TAU + y * 0.25;
            Vec3::new(funnel * ang.cos(), y, funnel * ang.sin())
        }
        Shape::Cube => {
            let s = 0.72 * r;
            let a = (d.u * 2.0 - 1.0) * s;
            let b = (d.v * 2.0 - 1.0) * s;
            let p = match (d.d0 * 6.0) as u32 % 6 {
                0 => Vec3::new(s, a, b),
                1 => Vec3::new(-s, a, b),
                2 => Vec3::new(a, s, b),
                3 => Vec3::new(a, -s, b),
                4 => Vec3::new(a, b, s),
                _ => Vec3::new(a, b, -s),
            };
            p + Vec3::new(d.d1 - 0.5, d.d2 - 0.5, 0.0) * 0.6
        }
        Shape::Torus => {
            let major = 0.68 * r;
            let minor = 0.26 * r + (d.d0 - 0.5) * 0.8;
            let theta = d.u * TAU;
            let phi = d.v * TAU;
            Vec3::new(
                (major + minor * phi.cos()) * theta.cos(),
                minor * phi.sin(),
                (major + minor * phi.cos()) * theta.sin(),
            )
        }
        Shape::Wave => {
            let x = (d.u - 0.5) * 2.3 * r;
            let z = (d.v - 0.5) * 2.3 * r;
            Vec3::new(
                x,
                0.28 * r * (0.32 * x).sin() * (0.32 * z).cos() + (d.d0 - 0.5),
                z,
            )
        }
    }
}

/// Initial "singularity" position for a slot: a point inside a small ball
/// at the origin. Entered exactly once per engine instantiation; the spring
/// pulls the cloud out to the opening sphere from here.
pub fn singularity_seed(slot: u32) -> Vec3 {
    let s = slot.wrapping_mul(DRAWS_PER_SLOT);
    let theta = rand_f32(s.wrapping_add(5)) * TAU;
    let cos_phi = 1.0 - 2.0 * rand_f32(s.wrapping_add(6));
    let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
    // Cube root for uniform volume distribution.
    let radius = SINGULARITY_RADIUS * rand_f32(s.wrapping_add(7)).cbrt();
    Vec3::new(
        radius * sin_phi * theta.cos(),
        radius * cos_phi,
        radius * sin_phi * theta.sin(),
    )
}

/// Uniformly distributed point on a sphere surface from two draws.
fn sphere_point(u: f32, v: f32, radius: f32) -> Vec3 {
    let theta = u * TAU;
    let cos_phi = 1.0 - 2.0 * v;
    let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
    Vec3::new(
        radius * sin_phi * theta.cos(),
        radius * cos_phi,
        radius * sin_phi * theta.sin(),
    )
}

/// Deterministic burst center for the fireworks shape, shared with the
/// kernel: three draws seeded from the burst index, not the slot.
fn burst_center(burst: u32) -> Vec3 {
    let base = 1000u32.wrapping_add(burst.wrapping_mul(3));
    Vec3::new(
        rand_range(base, -1.0, 1.0),
        rand_range(base.wrapping_add(1), -1.0, 1.0),
        rand_range(base.wrapping_add(2), -1.0, 1.0),
    )
}

/// Rotate a point about the x axis.
fn tilt_x(p: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(p.x, p.y * cos - p.z * sin, p.y * sin + p.z * cos)
}
