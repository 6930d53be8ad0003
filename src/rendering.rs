//! Window-side host: owns the wgpu surface and draws whatever frame the
//! plot session presents.

pub mod camera;
pub mod render_config;
mod render_pass;
mod resources;

use std::sync::Arc;

use log::info;
use winit::window::Window;

use crate::error::PlotError;
use crate::presentation::Frame;

use camera::{Camera, START_POSITION};
use render_config::{RenderConfig, ViewUniforms};
use render_pass::{SPACE_COLOR, create_background_render_pass};
use resources::ParticleResources;

pub struct Renderer {
    window: Arc<Window>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: winit::dpi::PhysicalSize<u32>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    render_config: RenderConfig,
    resources: ParticleResources,
    camera: Camera,
    point_size: f32,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, point_size: f32) -> Result<Self, PlotError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| PlotError::Gpu(format!("failed to create surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| PlotError::Gpu(format!("no suitable adapter: {e}")))?;
        info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Flythrough Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| PlotError::Gpu(format!("failed to create device: {e}")))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let surface_format = *caps
            .formats
            .first()
            .ok_or_else(|| PlotError::Gpu("surface reports no formats".into()))?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            // Drawn through an sRGB view of the surface texture
            view_formats: vec![surface_format.add_srgb_suffix()],
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            width: size.width.max(1),
            height: size.height.max(1),
            desired_maximum_frame_latency: 2,
            present_mode: wgpu::PresentMode::AutoVsync,
        };
        surface.configure(&device, &surface_config);

        let mut camera = Camera::new(START_POSITION, 1.0);
        camera.set_aspect(size.width, size.height);

        let render_config = RenderConfig::new(&device, surface_format);
        let view = view_uniforms(&camera, None, point_size);
        let resources = ParticleResources::new(&device, &render_config, &view);

        Ok(Self {
            window,
            device,
            queue,
            size,
            surface,
            surface_config,
            render_config,
            resources,
            camera,
            point_size,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
            self.camera.set_aspect(new_size.width, new_size.height);
        }
    }

    /// Re-applies the current size, for a lost or outdated surface.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    /// Draws `frame`, or just the backdrop when nothing is presented.
    pub fn render(&mut self, frame: Option<Frame<'_>>) -> Result<(), wgpu::SurfaceError> {
        match &frame {
            Some(frame) => {
                self.resources
                    .upload(&self.device, &self.queue, &self.render_config, frame)
            }
            None => self.resources.clear(),
        }
        let view = view_uniforms(&self.camera, frame.as_ref(), self.point_size);
        self.resources.update_view(&self.queue, &view);

        let surface_texture = self.surface.get_current_texture()?;
        let texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor {
                format: Some(self.render_config.surface_format.add_srgb_suffix()),
                ..Default::default()
            });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Command Encoder"),
            });

        {
            let mut render_pass =
                create_background_render_pass(&mut encoder, &texture_view, SPACE_COLOR);
            let num_particles = self.resources.num_particles();
            if num_particles > 0 {
                render_pass.set_pipeline(&self.render_config.render_pipeline);
                render_pass.set_bind_group(0, self.resources.current_bind_group(), &[]);
                // Two triangles per particle
                render_pass.draw(0..6, 0..num_particles);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        surface_texture.present();

        Ok(())
    }
}

fn view_uniforms(camera: &Camera, frame: Option<&Frame<'_>>, point_size: f32) -> ViewUniforms {
    let range = frame.map(|frame| frame.range).unwrap_or_default();
    ViewUniforms {
        view_proj: camera.view_projection().to_cols_array_2d(),
        camera_right: camera.right().extend(0.0).to_array(),
        camera_up: camera.up().extend(0.0).to_array(),
        min_density: range.min,
        density_span: range.span(),
        point_size,
        _padding: 0.0,
    }
}
