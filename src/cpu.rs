//! The CPU fallback engine.
//!
//! Runs a smaller cloud than the GPU path and trades the full force
//! integration for a cheaper split: `base` is a spring-only low-pass toward
//! the targets and is the only state that persists, while turbulence,
//! gesture forces, and the shockwave are computed fresh every frame and
//! added on top for display. Transients never feed back into `base`, so the
//! cloud always settles exactly onto the shape no matter what happened to
//! it along the way.
//!
//! This engine also owns particle color, which the GPU path leaves to the
//! renderer: a per-particle blend toward the commanded tint, warmed near a
//! grabbing fist.

use crate::forces::{self, ForceParams, ShockwaveEvent};
use crate::input::{ControlInputs, Gesture};
use crate::noise::rand_f32;
use crate::shape::{self, Shape};
use crate::text;
use crate::time::FIXED_TIMESTEP;
use glam::Vec3;

/// Default particle count for the fallback path.
pub const DEFAULT_CPU_COUNT: usize = 8192;

/// Gain on the per-frame gesture displacement.
const GESTURE_RESPONSE: f32 = 2.0;
/// Gain on the per-frame turbulence displacement.
const WOBBLE_RESPONSE: f32 = 8.0;
/// Per-step blend rate toward the commanded color.
const COLOR_RATE: f32 = 0.08;
/// Peak warm-tint blend for particles sitting on a fist.
const WARMTH_BLEND: f32 = 0.5;

/// Idle tint, a pale ethereal blue.
pub const BASE_COLOR: Vec3 = Vec3::new(0.55, 0.75, 1.0);
/// Tint blended in near a grabbing fist.
const WARM_COLOR: Vec3 = Vec3::new(1.0, 0.78, 0.45);

pub struct CpuEngine {
    count: usize,
    shape: Shape,
    targets: Vec<Vec3>,
    /// Spring-only low-pass state. Transients are never written back here.
    base: Vec<Vec3>,
    /// What the renderer sees: base plus this frame's transients, with
    /// per-particle alpha in the fourth channel.
    displayed: Vec<[f32; 4]>,
    colors: Vec<Vec3>,
    target_color: Vec3,
    params: ForceParams,
    time: f32,
    /// Live wavefront, if one is still expanding: the event and the
    /// simulation time it fired at.
    shockwave: Option<(ShockwaveEvent, f32)>,
}

impl CpuEngine {
    pub fn new(count: usize) -> Self {
        Self::with_params(count, ForceParams::default())
    }

    pub fn with_params(count: usize, params: ForceParams) -> Self {
        let count = count.max(1);
        let shape = Shape::default();
        let targets = (0..count)
            .map(|slot| shape::procedural_target(&shape, slot as u32))
            .collect();
        // Big-bang seeding: everything starts packed around the origin and
        // springs outward into the first shape.
        let base: Vec<Vec3> = (0..count)
            .map(|slot| shape::singularity_seed(slot as u32))
            .collect();
        let displayed = base.iter().map(|p| [p.x, p.y, p.z, 1.0]).collect();
        Self {
            count,
            shape,
            targets,
            base,
            displayed,
            colors: vec![BASE_COLOR; count],
            target_color: BASE_COLOR,
            params,
            time: 0.0,
            shockwave: None,
        }
    }

    /// Advance one fixed step.
    pub fn step(&mut self, inputs: &ControlInputs) {
        self.time += FIXED_TIMESTEP;
        self.params.speed = inputs.speed;
        if let Some(event) = inputs.shockwave {
            self.shockwave = Some((event, self.time));
        }
        if let Some((_, fired)) = self.shockwave {
            let wave_radius = (self.time - fired) * forces::WAVEFRONT_SPEED;
            if wave_radius > forces::SHOCKWAVE_RADIUS + forces::WAVEFRONT_WIDTH {
                self.shockwave = None;
            }
        }

        let morph = (self.params.spring_k * self.params.speed * FIXED_TIMESTEP).min(1.0);
        for i in 0..self.count {
            let mut base = self.base[i];
            if base.length() > forces::RUNAWAY_DISTANCE {
                base = self.targets[i];
            } else {
                base += (self.targets[i] - base) * morph;
            }
            self.base[i] = base;

            let mut shown = base
                + forces::turbulence_velocity(base, self.time, self.params.turbulence)
                    * WOBBLE_RESPONSE
                + forces::gesture_velocity(base, &inputs.interactions) * GESTURE_RESPONSE;
            if let Some((event, fired)) = self.shockwave {
                shown += forces::wavefront_displacement(base, event.center, self.time - fired)
                    * event.gain;
            }
            let phase = rand_f32(!(i as u32));
            let alpha = 0.6 + 0.4 * (phase * std::f32::consts::TAU
                + self.time * (0.8 + 1.4 * phase))
                .sin();
            self.displayed[i] = [shown.x, shown.y, shown.z, alpha];

            let mut color = self.colors[i] + (self.target_color - self.colors[i]) * COLOR_RATE;
            let warmth = grab_warmth(base, inputs);
            if warmth > 0.0 {
                color = color.lerp(WARM_COLOR, warmth * WARMTH_BLEND);
            }
            self.colors[i] = color;
        }
    }

    /// Regenerate targets for a new shape. A text bake that produces
    /// nothing leaves the current shape in place.
    pub fn set_shape(&mut self, shape: Shape) {
        match shape {
            Shape::Text(ref string) => match text::bake(string, self.count) {
                Some(targets) => {
                    self.targets = targets;
                    self.shape = shape;
                }
                None => log::debug!("keeping {:?}: nothing to morph to", self.shape),
            },
            _ => {
                for (slot, target) in self.targets.iter_mut().enumerate() {
                    *target = shape::procedural_target(&shape, slot as u32);
                }
                self.shape = shape;
            }
        }
    }

    /// Retarget the tint. Non-finite components are dropped.
    pub fn set_color(&mut self, rgb: [f32; 3]) {
        let color = Vec3::from(rgb);
        if color.is_finite() {
            self.target_color = color.clamp(Vec3::ZERO, Vec3::ONE);
        } else {
            log::debug!("ignoring non-finite color {rgb:?}");
        }
    }

    pub fn positions(&self) -> &[[f32; 4]] {
        &self.displayed
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Seconds since the live shockwave fired, while its wavefront is
    /// still traveling. `None` once the ripple leaves the blast radius.
    pub fn shockwave_age(&self) -> Option<f32> {
        self.shockwave.map(|(_, fired)| self.time - fired)
    }
}

/// Proximity of `position` to the nearest grabbing fist, 0..1.
fn grab_warmth(position: Vec3, inputs: &ControlInputs) -> f32 {
    let mut warmth: f32 = 0.0;
    for hand in &inputs.interactions {
        if hand.gesture == Gesture::Fist {
            let dist = position.distance(hand.position);
            if dist < forces::INTERACTION_RADIUS {
                warmth = warmth.max(1.0 - dist / forces::INTERACTION_RADIUS);
            }
        }
    }
    warmth
}
