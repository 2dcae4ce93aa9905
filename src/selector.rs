//! Engine probe, selection, and the top-level system handle.
//!
//! Selection runs once: probe for an adapter, classify it, then commit to
//! either the GPU or CPU engine. A machine whose only adapter is a software
//! rasterizer renders the small CPU cloud faster than it would emulate
//! compute shaders, so those adapters route to the CPU path. Once an
//! adapter passes the probe the session is committed to it: a GPU fault,
//! at engine construction or later mid-run, retires the system to
//! [`EngineState::Disabled`] with no downgrade, leaving the last completed
//! frame in the read buffer.

use glam::Vec3;

use crate::config::{EnginePreference, SystemConfig};
use crate::control::ControlBus;
use crate::cpu::{self, CpuEngine};
use crate::error::EngineError;
use crate::forces::{ForceParams, ShockwaveEvent};
use crate::gpu::GpuEngine;
use crate::input::InputAdapter;
use crate::shape::Shape;

/// Adapter-name fragments that identify software rasterizers.
const SOFTWARE_SIGNATURES: [&str; 5] = [
    "llvmpipe",
    "swiftshader",
    "lavapipe",
    "softpipe",
    "microsoft basic render",
];

/// What the probe learned about the best available adapter.
#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub adapter_name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub supports_compute: bool,
}

impl CapabilityReport {
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        Self {
            adapter_name: info.name,
            backend: info.backend,
            device_type: info.device_type,
            supports_compute: downlevel
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        }
    }

    /// True when the adapter is a CPU rasterizer wearing a GPU API.
    pub fn is_software(&self) -> bool {
        if self.device_type == wgpu::DeviceType::Cpu {
            return true;
        }
        let name = self.adapter_name.to_lowercase();
        SOFTWARE_SIGNATURES.iter().any(|sig| name.contains(sig))
    }
}

/// Which engine a probe report routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChoice {
    Gpu,
    Cpu,
}

/// Routing policy over a probe result.
///
/// Pure function of the report so the table is testable without a device.
pub fn choose(report: Option<&CapabilityReport>) -> EngineChoice {
    match report {
        Some(r) if r.supports_compute && !r.is_software() => EngineChoice::Gpu,
        _ => EngineChoice::Cpu,
    }
}

/// Headless adapter request; no surface compatibility required.
pub fn probe() -> Option<wgpu::Adapter> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
}

/// Lifecycle of the engine selection.
///
/// `CpuActive` and `Disabled` are terminal; there is no re-probe path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Probing,
    GpuActive,
    CpuActive,
    /// A fault retired the system; ticks are silent no-ops and the last
    /// completed frame stays readable.
    Disabled,
}

enum ActiveEngine {
    Gpu(GpuEngine),
    Cpu(CpuEngine),
}

/// Where the one-time probe landed.
enum ProbeOutcome {
    Gpu(GpuEngine),
    Cpu,
    Fault(EngineError),
}

/// The particle organism: input bus, engine selection, and tick loop.
///
/// Producers publish through clones of [`ParticleSystem::bus`]; the host
/// calls [`ParticleSystem::tick`] at the fixed rate and reads positions
/// back for rendering.
pub struct ParticleSystem {
    bus: ControlBus,
    adapter: InputAdapter,
    config: SystemConfig,
    state: EngineState,
    engine: Option<ActiveEngine>,
    tint: Vec3,
}

impl ParticleSystem {
    pub fn new(config: SystemConfig) -> Self {
        let adapter = InputAdapter::new(config.clap_mode, config.clap_threshold, config.hand_reach);
        Self {
            bus: ControlBus::new(),
            adapter,
            config,
            state: EngineState::Uninitialized,
            engine: None,
            tint: cpu::BASE_COLOR,
        }
    }

    /// Shared handle for input producers and command senders.
    pub fn bus(&self) -> ControlBus {
        self.bus.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Render tint for engines that leave color to the renderer.
    pub fn tint(&self) -> Vec3 {
        self.tint
    }

    pub fn count(&self) -> usize {
        match &self.engine {
            Some(ActiveEngine::Gpu(engine)) => engine.count() as usize,
            Some(ActiveEngine::Cpu(engine)) => engine.count(),
            None => 0,
        }
    }

    pub fn shape(&self) -> Option<&Shape> {
        match &self.engine {
            Some(ActiveEngine::Gpu(engine)) => Some(engine.shape()),
            Some(ActiveEngine::Cpu(engine)) => Some(engine.shape()),
            None => None,
        }
    }

    /// Probe and commit to an engine. Runs once; later calls are no-ops.
    pub fn initialize(&mut self) {
        if self.state != EngineState::Uninitialized {
            return;
        }
        self.state = EngineState::Probing;
        let params = self.config.force_params();

        let outcome = match self.config.preference {
            EnginePreference::ForceCpu => {
                log::info!("engine preference forces the cpu path");
                ProbeOutcome::Cpu
            }
            EnginePreference::Auto => Self::probe_gpu(self.config.gpu_count(), params),
        };

        match outcome {
            ProbeOutcome::Gpu(engine) => {
                self.engine = Some(ActiveEngine::Gpu(engine));
                self.state = EngineState::GpuActive;
            }
            ProbeOutcome::Cpu => {
                log::info!("cpu engine active: {} particles", self.config.cpu_count);
                self.engine = Some(ActiveEngine::Cpu(CpuEngine::with_params(
                    self.config.cpu_count,
                    params,
                )));
                self.state = EngineState::CpuActive;
            }
            ProbeOutcome::Fault(error) => self.disable(error),
        }
    }

    /// Route through the one-time probe. Missing adapters and software
    /// rasterizers go to the CPU engine; once an adapter passes, a
    /// construction failure disables the session instead of downgrading,
    /// the same fail-static path a live fault takes.
    fn probe_gpu(count: u32, params: ForceParams) -> ProbeOutcome {
        let Some(adapter) = probe() else {
            log::warn!("no compute adapter available");
            return ProbeOutcome::Cpu;
        };
        let report = CapabilityReport::from_adapter(&adapter);
        log::info!(
            "adapter {:?} ({:?}, {:?})",
            report.adapter_name,
            report.device_type,
            report.backend
        );
        if choose(Some(&report)) == EngineChoice::Cpu {
            log::info!("software rasterizer, routing to the cpu engine");
            return ProbeOutcome::Cpu;
        }
        match GpuEngine::new(&adapter, count, params) {
            Ok(engine) => ProbeOutcome::Gpu(engine),
            Err(error) => ProbeOutcome::Fault(error),
        }
    }

    /// Advance the organism by one fixed tick.
    ///
    /// Reads the latest producer values, folds queued commands into the
    /// active engine, and steps it. The first call initializes the system.
    pub fn tick(&mut self) {
        if self.state == EngineState::Uninitialized {
            self.initialize();
        }
        if self.state == EngineState::Disabled {
            return;
        }

        let hands = self.bus.snapshot_hands();
        let audio = self.bus.snapshot_audio();
        let mut inputs = self.adapter.normalize(&hands, audio);

        // A clap from the hands wins over a queued beat pulse; both feed
        // the same one-shot shockwave slot.
        if self.bus.drain_pulse() && inputs.shockwave.is_none() {
            inputs.shockwave = Some(ShockwaveEvent::pulse());
        }

        if let Some(shape) = self.bus.drain_shape() {
            self.apply_shape(shape);
        }
        if let Some(rgb) = self.bus.drain_color() {
            self.apply_color(rgb);
        }
        if self.state == EngineState::Disabled {
            return;
        }

        let result = match self.engine.as_mut() {
            Some(ActiveEngine::Gpu(engine)) => engine.step(&inputs),
            Some(ActiveEngine::Cpu(engine)) => {
                engine.step(&inputs);
                Ok(())
            }
            None => Ok(()),
        };
        if let Err(error) = result {
            self.disable(error);
        }
    }

    /// Latest particle positions (xyz plus alpha), wherever the cloud lives.
    pub fn positions(&self) -> Result<Vec<[f32; 4]>, EngineError> {
        match &self.engine {
            Some(ActiveEngine::Gpu(engine)) => engine.read_positions(),
            Some(ActiveEngine::Cpu(engine)) => Ok(engine.positions().to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Per-particle colors, available only on the CPU engine.
    pub fn colors(&self) -> Option<&[Vec3]> {
        match &self.engine {
            Some(ActiveEngine::Cpu(engine)) => Some(engine.colors()),
            _ => None,
        }
    }

    /// Age of the live shockwave ripple, CPU engine only.
    ///
    /// Renderers use this to flash or bloom on a blast.
    pub fn shockwave_age(&self) -> Option<f32> {
        match &self.engine {
            Some(ActiveEngine::Cpu(engine)) => engine.shockwave_age(),
            _ => None,
        }
    }

    fn apply_shape(&mut self, shape: Shape) {
        let result = match self.engine.as_mut() {
            Some(ActiveEngine::Gpu(engine)) => engine.set_shape(shape),
            Some(ActiveEngine::Cpu(engine)) => {
                engine.set_shape(shape);
                Ok(())
            }
            None => Ok(()),
        };
        if let Err(error) = result {
            self.disable(error);
        }
    }

    fn apply_color(&mut self, rgb: [f32; 3]) {
        let color = Vec3::from(rgb);
        if !color.is_finite() {
            log::warn!("ignoring non-finite color command");
            return;
        }
        self.tint = color.clamp(Vec3::ZERO, Vec3::ONE);
        if let Some(ActiveEngine::Cpu(engine)) = self.engine.as_mut() {
            engine.set_color(rgb);
        }
    }

    fn disable(&mut self, error: EngineError) {
        log::error!("engine fault, output frozen: {error}");
        self.state = EngineState::Disabled;
    }
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Command;
    use crate::input::{AudioDescriptor, HandDescriptor};
    use glam::Vec2;

    fn report(name: &str, device_type: wgpu::DeviceType, compute: bool) -> CapabilityReport {
        CapabilityReport {
            adapter_name: name.to_string(),
            backend: wgpu::Backend::Vulkan,
            device_type,
            supports_compute: compute,
        }
    }

    #[test]
    fn test_no_adapter_routes_to_cpu() {
        assert_eq!(choose(None), EngineChoice::Cpu);
    }

    #[test]
    fn test_hardware_adapter_routes_to_gpu() {
        let r = report("NVIDIA GeForce RTX 3060", wgpu::DeviceType::DiscreteGpu, true);
        assert_eq!(choose(Some(&r)), EngineChoice::Gpu);
        let r = report("Intel Iris Xe", wgpu::DeviceType::IntegratedGpu, true);
        assert_eq!(choose(Some(&r)), EngineChoice::Gpu);
    }

    #[test]
    fn test_software_rasterizers_route_to_cpu() {
        for name in [
            "llvmpipe (LLVM 17.0.6, 256 bits)",
            "SwiftShader Device (Subzero)",
            "lavapipe",
            "Microsoft Basic Render Driver",
        ] {
            let r = report(name, wgpu::DeviceType::DiscreteGpu, true);
            assert_eq!(choose(Some(&r)), EngineChoice::Cpu, "{name}");
        }
    }

    #[test]
    fn test_cpu_device_type_routes_to_cpu() {
        let r = report("Some Driver", wgpu::DeviceType::Cpu, true);
        assert_eq!(choose(Some(&r)), EngineChoice::Cpu);
    }

    #[test]
    fn test_computeless_adapter_routes_to_cpu() {
        let r = report("Old GL Adapter", wgpu::DeviceType::DiscreteGpu, false);
        assert_eq!(choose(Some(&r)), EngineChoice::Cpu);
    }

    #[test]
    fn test_forced_cpu_system_activates_without_probe() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(64));
        assert_eq!(system.state(), EngineState::Uninitialized);
        system.initialize();
        assert_eq!(system.state(), EngineState::CpuActive);
        assert_eq!(system.count(), 64);
    }

    #[test]
    fn test_first_tick_lazily_initializes() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(16));
        system.tick();
        assert_eq!(system.state(), EngineState::CpuActive);
        let positions = system.positions().unwrap();
        assert_eq!(positions.len(), 16);
    }

    #[test]
    fn test_cpu_active_is_terminal() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(8));
        for _ in 0..10 {
            system.tick();
            assert_eq!(system.state(), EngineState::CpuActive);
        }
    }

    #[test]
    fn test_commands_flow_through_the_bus() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(32));
        let bus = system.bus();
        bus.send(Command::Shape(Shape::Cube));
        bus.send(Command::Color([0.9, 0.1, 0.2]));
        system.tick();
        assert_eq!(system.shape(), Some(&Shape::Cube));
        assert_eq!(system.tint(), Vec3::new(0.9, 0.1, 0.2));
    }

    #[test]
    fn test_hand_frames_reach_the_engine() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(32));
        let bus = system.bus();
        bus.publish_hands(vec![HandDescriptor::new(Vec2::new(0.5, 0.0), crate::input::Gesture::Fist)]);
        bus.publish_audio(AudioDescriptor { volume: 1.0 });
        // Smoke: a published frame must not panic or stall the tick.
        for _ in 0..5 {
            system.tick();
        }
        assert_eq!(system.state(), EngineState::CpuActive);
    }

    #[test]
    fn test_disabled_state_is_terminal_and_silent() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(8));
        system.tick();
        let before = system.positions().unwrap();
        system.disable(EngineError::StepFault("injected".into()));
        for _ in 0..5 {
            system.tick();
        }
        assert_eq!(system.state(), EngineState::Disabled);
        // The last frame stays readable and frozen.
        assert_eq!(system.positions().unwrap(), before);
    }

    #[test]
    fn test_non_finite_color_is_ignored() {
        let mut system = ParticleSystem::new(SystemConfig::new().force_cpu().with_cpu_count(8));
        system.tick();
        let before = system.tint();
        system.bus().send(Command::Color([f32::NAN, 0.5, 0.5]));
        system.tick();
        assert_eq!(system.tint(), before);
    }
}
