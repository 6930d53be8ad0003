use log::debug;
use wgpu::util::DeviceExt;

use crate::plot::types::{ParticleRecord, TILE_WIDTH};
use crate::presentation::{DoubleBuffer, Frame};

use super::render_config::{RenderConfig, ViewUniforms};

// One GPU copy of the particles and the bind group that draws it
struct ParticleSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

// Ping-pong particle buffers plus the view uniform
pub(crate) struct ParticleResources {
    slots: DoubleBuffer<ParticleSlot>,
    capacity: usize,
    view_buffer: wgpu::Buffer,
    num_particles: u32,
    uploaded_generation: Option<u64>,
}

impl ParticleResources {
    pub(crate) fn new(device: &wgpu::Device, render_config: &RenderConfig, view: &ViewUniforms) -> Self {
        let view_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("View Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*view]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let capacity = TILE_WIDTH;
        let slots = Self::create_slots(device, render_config, &view_buffer, capacity);

        Self {
            slots,
            capacity,
            view_buffer,
            num_particles: 0,
            uploaded_generation: None,
        }
    }

    fn create_slots(
        device: &wgpu::Device,
        render_config: &RenderConfig,
        view_buffer: &wgpu::Buffer,
        capacity: usize,
    ) -> DoubleBuffer<ParticleSlot> {
        let size = (capacity * std::mem::size_of::<ParticleRecord>()) as wgpu::BufferAddress;
        let make_slot = |label: &str| {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = render_config.create_bind_group(device, &buffer, view_buffer);
            ParticleSlot { buffer, bind_group }
        };
        DoubleBuffer::new(make_slot("Particle Buffer 0"), make_slot("Particle Buffer 1"))
    }

    /// Copies a frame into the idle GPU slot and makes it current. Frames
    /// already on the GPU are skipped.
    pub(crate) fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        render_config: &RenderConfig,
        frame: &Frame<'_>,
    ) {
        if self.uploaded_generation == Some(frame.generation) {
            return;
        }

        let len = frame.records.len();
        if len > self.capacity {
            debug!("Growing particle buffers from {} to {len}", self.capacity);
            self.slots = Self::create_slots(device, render_config, &self.view_buffer, len);
            self.capacity = len;
        }

        queue.write_buffer(&self.slots.next().buffer, 0, bytemuck::cast_slice(frame.records));
        self.slots.swap();
        self.num_particles = len as u32;
        self.uploaded_generation = Some(frame.generation);
    }

    /// Forgets the uploaded frame so nothing is drawn until the next upload.
    pub(crate) fn clear(&mut self) {
        self.num_particles = 0;
        self.uploaded_generation = None;
    }

    pub(crate) fn update_view(&self, queue: &wgpu::Queue, view: &ViewUniforms) {
        queue.write_buffer(&self.view_buffer, 0, bytemuck::cast_slice(&[*view]));
    }

    pub(crate) fn current_bind_group(&self) -> &wgpu::BindGroup {
        &self.slots.current().bind_group
    }

    pub(crate) fn num_particles(&self) -> u32 {
        self.num_particles
    }
}
