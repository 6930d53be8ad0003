use bytemuck::{Pod, Zeroable};
use log::{debug, info};

use crate::density::DensityKernel;
use crate::error::PlotError;
use crate::plot::types::{ParticleRecord, TILE_WIDTH};

// Must match `Params` in neighbour_count.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct KernelParams {
    radius: f32,
    num_bodies: u32,
    _padding: [u32; 2],
}

// Device-side storage sized for one particle count
struct KernelBuffers {
    num_bodies: usize,
    read_buffer: wgpu::Buffer,
    write_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Tiled neighbour count on the GPU, one work group per tile.
pub struct GpuDensityKernel {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    buffers: Option<KernelBuffers>,
}

impl GpuDensityKernel {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Neighbour Count Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/neighbour_count.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Neighbour Count Bind Group Layout"),
            entries: &[
                // read_particles
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // write_particles
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // params
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
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Neighbour Count Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Neighbour Count Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("count_neighbours"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline,
            bind_group_layout,
            buffers: None,
        }
    }

    /// Creates a kernel on its own device, without any window surface.
    pub fn headless() -> Result<Self, PlotError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| PlotError::Gpu(format!("no suitable adapter: {e}")))?;
        info!("Density kernel adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Neighbour Count Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| PlotError::Gpu(format!("failed to create device: {e}")))?;

        Ok(Self::new(&device, &queue))
    }

    fn ensure_buffers(&mut self, num_bodies: usize) {
        let stale = self
            .buffers
            .as_ref()
            .is_none_or(|buffers| buffers.num_bodies != num_bodies);
        if stale {
            debug!("Allocating neighbour count buffers for {num_bodies} particles");
            self.buffers = Some(self.create_buffers(num_bodies));
        }
    }

    fn create_buffers(&self, num_bodies: usize) -> KernelBuffers {
        let size = (num_bodies * std::mem::size_of::<ParticleRecord>()) as wgpu::BufferAddress;

        let read_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Neighbour Read Buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let write_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Neighbour Write Buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Neighbour Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Neighbour Params Buffer"),
            size: std::mem::size_of::<KernelParams>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Neighbour Count Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: read_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: write_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        KernelBuffers {
            num_bodies,
            read_buffer,
            write_buffer,
            staging_buffer,
            params_buffer,
            bind_group,
        }
    }
}

impl DensityKernel for GpuDensityKernel {
    fn count_neighbours(
        &mut self,
        read: &[ParticleRecord],
        write: &mut [ParticleRecord],
        radius: f32,
    ) -> Result<(), PlotError> {
        let num_bodies = read.len();
        if num_bodies != write.len() || num_bodies % TILE_WIDTH != 0 {
            return Err(PlotError::Misaligned { len: write.len() });
        }

        let params = KernelParams {
            radius,
            num_bodies: num_bodies as u32,
            _padding: [0; 2],
        };
        self.ensure_buffers(num_bodies);
        let Some(buffers) = self.buffers.as_ref() else {
            return Err(PlotError::Gpu("neighbour count buffers missing".into()));
        };
        self.queue
            .write_buffer(&buffers.read_buffer, 0, bytemuck::cast_slice(read));
        self.queue
            .write_buffer(&buffers.params_buffer, 0, bytemuck::cast_slice(&[params]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Neighbour Count Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Neighbour Count Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &buffers.bind_group, &[]);
            compute_pass.dispatch_workgroups((num_bodies / TILE_WIDTH) as u32, 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            &buffers.write_buffer,
            0,
            &buffers.staging_buffer,
            0,
            buffers.staging_buffer.size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let readback = read_back(&self.device, &buffers.staging_buffer, write);
        if readback.is_err() {
            // A map may still be pending on the staging buffer
            self.buffers = None;
        }
        readback
    }
}

// Blocks until the pass has landed in `staging`, then copies it out
fn read_back(
    device: &wgpu::Device,
    staging: &wgpu::Buffer,
    write: &mut [ParticleRecord],
) -> Result<(), PlotError> {
    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| PlotError::Gpu(format!("device poll failed: {e}")))?;
    rx.recv()
        .map_err(|e| PlotError::Gpu(format!("map callback dropped: {e}")))?
        .map_err(|e| PlotError::Gpu(format!("staging map failed: {e}")))?;

    {
        let data = slice.get_mapped_range();
        write.copy_from_slice(bytemuck::cast_slice(&data));
    }
    staging.unmap();

    Ok(())
}
