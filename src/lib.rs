//! # Etherial
//!
//! A living particle organism driven by hands, voice, and rhythm.
//!
//! Etherial keeps a fixed cloud of particles in constant motion: spring
//! forces pull every particle toward a per-slot target on the current
//! shape, curl-noise turbulence keeps the cloud breathing, and hand
//! gestures grab, repel, swirl, and blast it in real time. Shapes morph
//! into one another without ever spawning or killing a particle.
//!
//! ## Quick Start
//!
//! ```ignore
//! use etherial::prelude::*;
//!
//! fn main() {
//!     let mut system = ParticleSystem::new(SystemConfig::new());
//!     let bus = system.bus();
//!
//!     bus.send(Command::Shape(Shape::Galaxy));
//!     let mut clock = TickClock::new();
//!     loop {
//!         bus.publish_hands(read_hands());
//!         bus.publish_audio(read_audio());
//!         system.tick();
//!         draw(&system.positions().unwrap());
//!         clock.tick();
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Shapes
//!
//! A [`Shape`] is a deterministic mapping from particle slot to target
//! position. Twelve procedural shapes (sphere, hearts, flower, saturn,
//! buddha, fireworks, dna, galaxy, tornado, cube, torus, wave) are derived
//! from hashed slot draws; [`Shape::Text`] rasterizes a string into an ink
//! cloud. Switching shapes only swaps targets, so the cloud flows from one
//! form to the next.
//!
//! ### Gestures
//!
//! Up to two hands influence the cloud each tick:
//!
//! | Gesture | Effect |
//! |---------|--------|
//! | [`Gesture::Fist`] | Attract plus swirl; pinching tightens the grip |
//! | [`Gesture::Open`] | Push particles away |
//! | [`Gesture::Point`] | Push particles away |
//! | [`Gesture::Victory`] | Pure swirl, no radial force |
//! | Clap | One-shot shockwave from the midpoint |
//!
//! Audio volume scales simulation speed, so the organism dances to sound.
//!
//! ### Engines
//!
//! A [`ParticleSystem`] probes the machine once and commits to one of two
//! engines: a wgpu compute kernel over ping-ponged storage buffers, or a
//! smaller CPU cloud that also carries per-particle color. Software
//! rasterizers route to the CPU path; a GPU fault freezes the last frame.
//!
//! ### Feeding inputs
//!
//! Producers (camera tracker, audio meter, UI) publish into latest-value
//! cells through a cloned [`ControlBus`]; the tick consumes whatever is
//! newest. Nothing queues, nothing blocks, stale frames are simply
//! overwritten.

pub mod config;
pub mod control;
pub mod cpu;
mod error;
pub mod forces;
pub mod gpu;
pub mod input;
pub mod kernel;
pub mod noise;
pub mod selector;
pub mod shader_utils;
pub mod shape;
mod text;
pub mod time;

pub use bytemuck;
pub use config::{EnginePreference, SystemConfig};
pub use control::{Command, ControlBus, Latest};
pub use cpu::CpuEngine;
pub use error::{EngineError, ProbeError};
pub use forces::{ForceParams, Interaction, ShockwaveEvent};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::GpuEngine;
pub use input::{
    AudioDescriptor, ClapDetection, ControlInputs, Gesture, HandDescriptor, InputAdapter,
};
pub use kernel::PositionFormat;
pub use selector::{CapabilityReport, EngineChoice, EngineState, ParticleSystem};
pub use shape::Shape;
pub use time::{TickClock, FIXED_TIMESTEP};

/// Convenient re-exports for common usage.
///
/// # Usage
///
/// ```ignore
/// use etherial::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{EnginePreference, SystemConfig};
    pub use crate::control::{Command, ControlBus};
    pub use crate::input::{AudioDescriptor, ClapDetection, Gesture, HandDescriptor};
    pub use crate::selector::{EngineState, ParticleSystem};
    pub use crate::shape::Shape;
    pub use crate::time::{TickClock, FIXED_TIMESTEP};
    pub use crate::{Vec2, Vec3, Vec4};
}
