//! Input normalization: hand frames, audio level, clap detection.
//!
//! Collaborators (hand tracker, microphone analyzer, speech recognizer)
//! publish raw values at their own rates; this module turns whatever is
//! current at the start of a tick into the control inputs the engines
//! consume: up to two world-space interaction points, the one-shot clap
//! event, and speed/size multipliers from audio volume.
//!
//! # Example
//!
//! ```ignore
//! use etherial::input::{AudioDescriptor, HandDescriptor, Gesture, InputAdapter};
//! use glam::Vec2;
//!
//! let mut adapter = InputAdapter::default();
//! let hands = vec![HandDescriptor::new(Vec2::new(0.2, -0.1), Gesture::Fist)];
//! let inputs = adapter.normalize(&hands, AudioDescriptor { volume: 0.8 });
//! assert_eq!(inputs.interactions.len(), 1);
//! ```

use crate::forces::{self, Interaction, ShockwaveEvent};
use glam::{Vec2, Vec3};

/// Thumb-index distance below which the tracker reports a pinch, in its
/// normalized image units.
pub const PINCH_DISTANCE: f32 = 0.05;

/// Default world-space inter-hand distance that counts as a clap.
pub const CLAP_THRESHOLD: f32 = 3.0;

/// Default scale from centered-normalized hand coordinates to world units.
pub const HAND_REACH: f32 = 30.0;

/// Hand pose classification driving the force rules.
///
/// The tracker's vocabulary is wider (THUMBS_UP, THREE, PINKY, ROCK,
/// PINCH); [`Gesture::parse`] folds the extras into the neutral open hand,
/// with PINCH also implying the pinch flag on the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gesture {
    /// Open palm, also the fallback for unknown tokens. Repels.
    #[default]
    Open,
    /// Closed fist. Attracts with a swirl.
    Fist,
    /// Index finger extended. Repels, like open.
    Point,
    /// Peace sign. Swirl only.
    Victory,
}

impl Gesture {
    /// Parse a tracker token. Unknown tokens are the neutral open hand.
    pub fn parse(token: &str) -> Gesture {
        match token.trim().to_ascii_uppercase().as_str() {
            "FIST" => Gesture::Fist,
            "POINT" => Gesture::Point,
            "VICTORY" | "PEACE" => Gesture::Victory,
            _ => Gesture::Open,
        }
    }

    /// Numeric code the compute kernel switches on.
    pub fn code(&self) -> u32 {
        match self {
            Gesture::Open => 0,
            Gesture::Fist => 1,
            Gesture::Point => 2,
            Gesture::Victory => 3,
        }
    }
}

/// One tracked hand, as published by a producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandDescriptor {
    /// Centered-normalized position: (-1, -1) bottom-left to (1, 1)
    /// top-right of the tracked frame.
    pub position: Vec2,
    /// Pose classification.
    pub gesture: Gesture,
    /// Thumb and index pinched together.
    pub pinch: bool,
    /// Hand tension in 0..1.
    pub tension: f32,
}

impl HandDescriptor {
    /// Descriptor with no pinch and zero tension.
    pub fn new(position: Vec2, gesture: Gesture) -> Self {
        Self {
            position,
            gesture,
            pinch: false,
            tension: 0.0,
        }
    }

    /// Build a descriptor from raw tracker output: palm center in
    /// [0,1]×[0,1] image coordinates (y down), the gesture token, and the
    /// thumb-index distance. Mirrors x for the selfie view and flips y so
    /// up is positive.
    pub fn from_camera(palm: Vec2, token: &str, pinch_distance: f32) -> Self {
        let token = token.trim().to_ascii_uppercase();
        Self {
            position: Vec2::new(-(palm.x * 2.0 - 1.0), 1.0 - palm.y * 2.0),
            gesture: Gesture::parse(&token),
            pinch: pinch_distance < PINCH_DISTANCE || token == "PINCH",
            tension: 0.0,
        }
    }
}

/// Latest audio level from the analyzer. Volume is typically 0..2.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioDescriptor {
    /// Smoothed signal energy.
    pub volume: f32,
}

/// How the clap detector treats repeated closeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClapDetection {
    /// Fire once on the transition into "close"; re-arm only after the
    /// hands separate again.
    #[default]
    Debounced,
    /// Raw threshold test every frame, no memory.
    Stateless,
}

/// Normalized per-tick control inputs, consumed once per step.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInputs {
    /// Up to two live interaction points, world space.
    pub interactions: Vec<Interaction>,
    /// The one-shot blast if a clap (or beat pulse) fired this frame.
    pub shockwave: Option<ShockwaveEvent>,
    /// Speed multiplier, already scaled by audio volume.
    pub speed: f32,
    /// Render size multiplier from audio volume.
    pub size: f32,
}

impl Default for ControlInputs {
    fn default() -> Self {
        Self {
            interactions: Vec::new(),
            shockwave: None,
            speed: forces::BASE_SPEED,
            size: 1.0,
        }
    }
}

/// Turns raw hand/audio values into per-tick control inputs.
///
/// Owns the single piece of input state: the clap detector's previous
/// "was close" flag.
#[derive(Debug)]
pub struct InputAdapter {
    clap_mode: ClapDetection,
    clap_threshold: f32,
    hand_reach: f32,
    was_close: bool,
}

impl InputAdapter {
    pub fn new(clap_mode: ClapDetection, clap_threshold: f32, hand_reach: f32) -> Self {
        Self {
            clap_mode,
            clap_threshold,
            hand_reach,
            was_close: false,
        }
    }

    /// Normalize the latest producer values into this tick's inputs.
    ///
    /// More than two hands: the first two win. Hands with non-finite
    /// positions are dropped. Non-finite volume reads as silence.
    pub fn normalize(&mut self, hands: &[HandDescriptor], audio: AudioDescriptor) -> ControlInputs {
        let mut interactions = Vec::with_capacity(2);
        for hand in hands {
            if interactions.len() == 2 {
                break;
            }
            if !hand.position.is_finite() {
                log::debug!("dropping hand frame with non-finite position");
                continue;
            }
            interactions.push(Interaction {
                position: Vec3::new(
                    hand.position.x * self.hand_reach,
                    hand.position.y * self.hand_reach,
                    0.0,
                ),
                gesture: hand.gesture,
                pinch: hand.pinch,
                tension: if hand.tension.is_finite() {
                    hand.tension.clamp(0.0, 1.0)
                } else {
                    0.0
                },
            });
        }

        let shockwave = self.detect_clap(&interactions);

        let volume = if audio.volume.is_finite() {
            audio.volume.clamp(0.0, 2.0)
        } else {
            0.0
        };

        ControlInputs {
            interactions,
            shockwave,
            speed: forces::speed_from_volume(volume),
            size: 1.0 + volume * 0.25,
        }
    }

    /// World-space clap test over the two interaction points.
    fn detect_clap(&mut self, interactions: &[Interaction]) -> Option<ShockwaveEvent> {
        if interactions.len() < 2 {
            self.was_close = false;
            return None;
        }
        let (a, b) = (interactions[0].position, interactions[1].position);
        let close = a.distance(b) < self.clap_threshold;
        let fired = match self.clap_mode {
            ClapDetection::Debounced => close && !self.was_close,
            ClapDetection::Stateless => close,
        };
        self.was_close = close;
        if fired {
            log::debug!("clap at {:?}", (a + b) * 0.5);
            Some(ShockwaveEvent::clap((a + b) * 0.5))
        } else {
            None
        }
    }
}

impl Default for InputAdapter {
    fn default() -> Self {
        Self::new(ClapDetection::default(), CLAP_THRESHOLD, HAND_REACH)
    }
}
