//! Error types for the particle engine.
//!
//! This module provides error types for the capability probe, GPU engine
//! construction, and per-step faults. Policy note: most bad input is not an
//! error at all. Unknown shape names fall back to the sphere, empty text
//! commands are no-ops, and malformed hand frames reuse the previous
//! values. These types cover the cases that genuinely stop an engine.

use std::fmt;

/// Errors that can occur while probing GPU capability.
#[derive(Debug)]
pub enum ProbeError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12 support."),
            ProbeError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for ProbeError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        ProbeError::DeviceCreation(e)
    }
}

/// Errors that can occur while constructing or stepping a simulation engine.
#[derive(Debug)]
pub enum EngineError {
    /// Capability probe failed before an engine could be built.
    Probe(ProbeError),
    /// GPU engine construction raised a validation or allocation error.
    Construction(String),
    /// A compute step raised a fault on the device.
    StepFault(String),
    /// Failed to map a buffer for reading positions back.
    BufferMapping(String),
    /// The half-precision position format failed round-trip validation.
    HalfPrecisionRoundTrip,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Probe(e) => write!(f, "Capability probe failed: {}", e),
            EngineError::Construction(msg) => write!(f, "GPU engine construction failed: {}", msg),
            EngineError::StepFault(msg) => write!(f, "Compute step fault: {}", msg),
            EngineError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            EngineError::HalfPrecisionRoundTrip => write!(f, "Half-precision position format failed round-trip validation and cannot be used."),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Probe(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProbeError> for EngineError {
    fn from(e: ProbeError) -> Self {
        EngineError::Probe(e)
    }
}
