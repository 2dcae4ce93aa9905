//! Shared control state between asynchronous producers and the tick.
//!
//! The concurrency contract for the whole crate lives here: producers
//! (camera, microphone, speech, UI) overwrite latest-value cells at
//! uncontrolled rates, and the single simulation tick reads each cell once
//! at its start. Last writer wins; there are no queues and no ordering
//! guarantee across producers. The lock inside [`Latest`] is held only for
//! the copy in or out, so nothing ever blocks for longer than that.
//!
//! Shape, text, color, and pulse commands are drained rather than read:
//! the tick takes the newest value and leaves the cell empty, so two shape
//! commands landing between ticks resolve to the newest one only.

use crate::input::{AudioDescriptor, HandDescriptor};
use crate::shape::Shape;
use std::sync::{Arc, Mutex};

/// A shared latest-value cell.
#[derive(Debug, Default)]
pub struct Latest<T> {
    inner: Mutex<T>,
}

impl<T: Clone> Latest<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Overwrite the cell. Last writer wins.
    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Copy the current value out.
    pub fn get(&self) -> T {
        self.lock().clone()
    }

    /// Swap in a new value and return the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.lock(), value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, T> {
        // A poisoned cell still holds a usable latest value.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Latest<Option<T>> {
    /// Drain the cell, leaving it empty.
    pub fn take(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// A command from voice, UI, or text input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Morph the cloud to a shape.
    Shape(Shape),
    /// Rasterize text and morph to it.
    Text(String),
    /// Retint toward an RGB color.
    Color([f32; 3]),
    /// Beat pulse: a centered half-strength shockwave.
    Pulse,
}

/// All shared control state. Clone it freely; clones share the cells.
#[derive(Debug, Clone, Default)]
pub struct ControlBus {
    hands: Arc<Latest<Vec<HandDescriptor>>>,
    audio: Arc<Latest<AudioDescriptor>>,
    shape: Arc<Latest<Option<Shape>>>,
    color: Arc<Latest<Option<[f32; 3]>>>,
    pulse: Arc<Latest<bool>>,
}

impl ControlBus {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Producer side ==========

    /// Publish the latest hand frame (0-2 descriptors; extras are ignored
    /// downstream).
    pub fn publish_hands(&self, hands: Vec<HandDescriptor>) {
        self.hands.set(hands);
    }

    /// Publish the latest audio level.
    pub fn publish_audio(&self, audio: AudioDescriptor) {
        self.audio.set(audio);
    }

    /// Send a command. Shape and text commands share one cell, so the
    /// newest of the two wins; color rides its own cell and is never lost
    /// to a shape change.
    pub fn send(&self, command: Command) {
        log::debug!("command: {:?}", command);
        match command {
            Command::Shape(shape) => self.shape.set(Some(shape)),
            Command::Text(text) => self.shape.set(Some(Shape::Text(text))),
            Command::Color(rgb) => self.color.set(Some(rgb)),
            Command::Pulse => self.pulse.set(true),
        }
    }

    // ========== Consumer side (once per tick) ==========

    /// Current hand frame.
    pub fn snapshot_hands(&self) -> Vec<HandDescriptor> {
        self.hands.get()
    }

    /// Current audio level.
    pub fn snapshot_audio(&self) -> AudioDescriptor {
        self.audio.get()
    }

    /// Newest pending shape/text command, if any.
    pub fn drain_shape(&self) -> Option<Shape> {
        self.shape.take()
    }

    /// Newest pending color command, if any.
    pub fn drain_color(&self) -> Option<[f32; 3]> {
        self.color.take()
    }

    /// Whether a beat pulse fired since the last tick.
    pub fn drain_pulse(&self) -> bool {
        self.pulse.replace(false)
    }
}
