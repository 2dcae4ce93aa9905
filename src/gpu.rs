//! GPU particle engine.
//!
//! Positions live in two equal storage buffers that ping-pong every tick:
//! the kernel reads the whole cloud from one buffer and writes the next
//! frame into the other, so a particle can sample its neighbours' previous
//! positions without racing the writes. Both buffers are seeded with the
//! same big-bang cloud before the first dispatch, and the read/write roles
//! swap only after a tick completes, so a faulted tick leaves the last good
//! frame in place.
//!
//! Device errors are routed two ways: a validation error scope wraps every
//! dispatch and surfaces synchronously as [`EngineError::StepFault`], while
//! an uncaptured-error handler latches asynchronous faults (device loss,
//! out of memory) into a flag checked on the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::error::{EngineError, ProbeError};
use crate::forces::ForceParams;
use crate::input::ControlInputs;
use crate::kernel::{self, PositionFormat, SimUniforms, WORKGROUP_SIZE};
use crate::shape::{self, Shape};
use crate::text;
use crate::time::FIXED_TIMESTEP;

/// Which of the two particle buffers the next tick reads from.
///
/// The read and write roles are always disjoint; [`PingPong::swapped`]
/// flips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PingPong {
    read_is_b: bool,
}

impl PingPong {
    fn new() -> Self {
        Self { read_is_b: false }
    }

    fn read_index(self) -> usize {
        self.read_is_b as usize
    }

    fn write_index(self) -> usize {
        1 - self.read_index()
    }

    fn swapped(self) -> Self {
        Self {
            read_is_b: !self.read_is_b,
        }
    }
}

/// Compute-only particle engine running the force kernel on a wgpu device.
pub struct GpuEngine {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    buffers: [wgpu::Buffer; 2],
    baked_buffer: wgpu::Buffer,
    /// One bind group per ping-pong direction, indexed by the read slot.
    bind_groups: [wgpu::BindGroup; 2],
    pong: PingPong,
    fault: Arc<AtomicBool>,
    format: PositionFormat,
    count: u32,
    shape: Shape,
    params: ForceParams,
    time: f32,
}

impl GpuEngine {
    /// Builds an engine with full-precision positions.
    pub fn new(
        adapter: &wgpu::Adapter,
        count: u32,
        params: ForceParams,
    ) -> Result<Self, EngineError> {
        Self::with_format(adapter, count, PositionFormat::F32, params)
    }

    /// Builds an engine with an explicit position format.
    ///
    /// The packed-half layout is only accepted once the CPU-side codec
    /// proves it can round-trip representative values, mirroring the check
    /// the kernel's `pack2x16float` path depends on.
    pub fn with_format(
        adapter: &wgpu::Adapter,
        count: u32,
        format: PositionFormat,
        params: ForceParams,
    ) -> Result<Self, EngineError> {
        if format == PositionFormat::F16 {
            kernel::validate_f16_roundtrip()?;
        }
        let count = count.max(1);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Particle Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| EngineError::Probe(ProbeError::DeviceCreation(e)))?;

        let fault = Arc::new(AtomicBool::new(false));
        let flag = fault.clone();
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("uncaptured device error: {error}");
            flag.store(true, Ordering::SeqCst);
        }));

        push_error_scopes(&device);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Step Kernel"),
            source: wgpu::ShaderSource::Wgsl(kernel::generate_kernel(format).into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Step Bind Group Layout"),
                entries: &[
                    storage_entry(0, true),
                    storage_entry(1, false),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_entry(3, true),
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Step Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Step Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // Both buffers start from the same big-bang cloud so the first
        // read, whichever buffer serves it, sees seeded positions.
        let seed_bytes = kernel::encode_positions(format, &seed_cloud(count));
        let make_particle_buffer = |label| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &seed_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            })
        };
        let buffers = [
            make_particle_buffer("Particle Buffer A"),
            make_particle_buffer("Particle Buffer B"),
        ];

        let uniforms = SimUniforms::pack(&ControlInputs::default(), &Shape::Sphere, 0.0, count, &params);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sim Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // The baked-target binding must always be populated, so procedural
        // shapes carry a one-element placeholder.
        let baked_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Baked Target Buffer"),
            contents: &[0u8; 16],
            usage: wgpu::BufferUsages::STORAGE,
        });

        let bind_groups = build_bind_groups(
            &device,
            &bind_group_layout,
            &buffers,
            &uniform_buffer,
            &baked_buffer,
        );

        if let Some(error) = drain_error_scopes(&device) {
            return Err(EngineError::Construction(error.to_string()));
        }

        log::info!(
            "gpu engine ready: {count} particles, {} positions",
            format.label()
        );

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            buffers,
            baked_buffer,
            bind_groups,
            pong: PingPong::new(),
            fault,
            format,
            count,
            shape: Shape::default(),
            params,
            time: 0.0,
        })
    }

    /// Advances the cloud by one fixed tick.
    ///
    /// The write buffer becomes the read buffer only after the dispatch is
    /// submitted cleanly; on any fault the roles stay put and the error
    /// propagates for the caller to retire the engine.
    pub fn step(&mut self, inputs: &ControlInputs) -> Result<(), EngineError> {
        if self.fault.load(Ordering::SeqCst) {
            return Err(EngineError::StepFault("device raised an uncaptured error".into()));
        }

        self.time += FIXED_TIMESTEP;
        self.params.speed = inputs.speed;
        let uniforms = SimUniforms::pack(inputs, &self.shape, self.time, self.count, &self.params);

        push_error_scopes(&self.device);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Step Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Step Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.pong.read_index()], &[]);
            pass.dispatch_workgroups(self.count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(error) = drain_error_scopes(&self.device) {
            return Err(EngineError::StepFault(error.to_string()));
        }
        if self.fault.load(Ordering::SeqCst) {
            return Err(EngineError::StepFault("device raised an uncaptured error".into()));
        }

        self.pong = self.pong.swapped();
        Ok(())
    }

    /// Switches the morph target.
    ///
    /// Procedural shapes are derived inside the kernel from the uniform
    /// shape id; text shapes are rasterized on the CPU and uploaded as a
    /// baked target buffer. An unrenderable string keeps the current shape.
    pub fn set_shape(&mut self, shape: Shape) -> Result<(), EngineError> {
        if let Shape::Text(ref string) = shape {
            let Some(targets) = text::bake(string, self.count as usize) else {
                log::debug!("no glyph coverage for {string:?}, keeping current shape");
                return Ok(());
            };
            let data: Vec<[f32; 4]> = targets.iter().map(|t| [t.x, t.y, t.z, 0.0]).collect();

            push_error_scopes(&self.device);
            self.baked_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Baked Target Buffer"),
                    contents: bytemuck::cast_slice(&data),
                    usage: wgpu::BufferUsages::STORAGE,
                });
            self.bind_groups = build_bind_groups(
                &self.device,
                &self.bind_group_layout,
                &self.buffers,
                &self.uniform_buffer,
                &self.baked_buffer,
            );
            if let Some(error) = drain_error_scopes(&self.device) {
                return Err(EngineError::Construction(error.to_string()));
            }
        }
        self.shape = shape;
        Ok(())
    }

    /// Copies the latest particle positions back to the CPU.
    ///
    /// Returns xyz plus the alpha channel, decoded from whichever storage
    /// format the engine runs with.
    pub fn read_positions(&self) -> Result<Vec<[f32; 4]>, EngineError> {
        let byte_len = self.count as u64 * self.format.bytes_per_particle();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: byte_len,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(self.current_read_buffer(), 0, &staging, 0, byte_len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return Err(EngineError::BufferMapping(error.to_string())),
            Err(_) => {
                return Err(EngineError::BufferMapping(
                    "map callback never resolved".into(),
                ))
            }
        }

        let positions = kernel::decode_positions(self.format, &slice.get_mapped_range());
        staging.unmap();
        Ok(positions)
    }

    /// Buffer holding the most recently written frame.
    ///
    /// Renderers bind this as a read-only vertex source; it is never the
    /// buffer the next dispatch writes to.
    pub fn current_read_buffer(&self) -> &wgpu::Buffer {
        &self.buffers[self.pong.read_index()]
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn format(&self) -> PositionFormat {
        self.format
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Big-bang seed positions for every slot, alpha fully lit.
fn seed_cloud(count: u32) -> Vec<[f32; 4]> {
    (0..count)
        .map(|slot| {
            let p = shape::singularity_seed(slot);
            [p.x, p.y, p.z, 1.0]
        })
        .collect()
}

/// Push the scope pair wrapping fallible device work: validation errors
/// and allocation failures both surface synchronously at the matching
/// [`drain_error_scopes`] instead of through the uncaptured handler.
fn push_error_scopes(device: &wgpu::Device) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
}

/// Pop both scopes in reverse push order and report the first error
/// captured. Always pops both, so the scope stack stays balanced.
fn drain_error_scopes(device: &wgpu::Device) -> Option<wgpu::Error> {
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());
    out_of_memory.or(validation)
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// One bind group per direction, indexed by the read slot: entry `i` reads
/// `buffers[i]` and writes the other buffer.
fn build_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffers: &[wgpu::Buffer; 2],
    uniform_buffer: &wgpu::Buffer,
    baked_buffer: &wgpu::Buffer,
) -> [wgpu::BindGroup; 2] {
    let make = |read: usize, label| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers[read].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers[1 - read].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: baked_buffer.as_entire_binding(),
                },
            ],
        })
    };
    [
        make(0, "Step Bind Group A Read"),
        make(1, "Step Bind Group B Read"),
    ]
}
