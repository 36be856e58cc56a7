use anyhow::Result;
use log::warn;
use std::time::Instant;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{GlowPipeline, QuadVertex, VertexBuffer};
use crate::experience::{MessageStyle, Scene, Side};
use crate::ui::{UiAction, UiFrame, UserInterface};

pub struct GraphicsEngine<'a> {
    pub surface: wgpu::Surface<'a>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,

    glow: GlowPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    vertex_buffer: VertexBuffer,

    started: Instant,
}

/// Layout matches `Uniforms` in shaders/glow.wgsl.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlowUniforms {
    pub time: f32,
    pub glow: f32,
    /// 0 upright, 1 fully bent by breath
    pub lean: f32,
    pub reveal: f32,
    pub resolution: [f32; 2],
    pub lit_left: f32,
    pub lit_right: f32,
}

impl GlowUniforms {
    pub fn from_scene(scene: &Scene) -> Self {
        let flame_strength = |side: Side| {
            let candle = scene.candle(side);
            match (candle.lit && !candle.blown_out, candle.shrinking) {
                (false, _) => 0.0,
                (true, true) => 0.4,
                (true, false) => 1.0,
            }
        };

        Self {
            time: 0.0,
            glow: scene.flame.scale,
            lean: (scene.flame.skew_degrees / -60.0).clamp(0.0, 1.0),
            reveal: if scene.message.style == MessageStyle::Reveal { 1.0 } else { 0.0 },
            resolution: [0.0; 2],
            lit_left: flame_strength(Side::Left),
            lit_right: flame_strength(Side::Right),
        }
    }
}

impl<'a> GraphicsEngine<'a> {
    pub async fn new(window: &'a Window) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find an appropriate adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no texture formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("glow_bind_group_layout"),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Glow Uniform Buffer"),
            contents: bytemuck::cast_slice(&[GlowUniforms::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("glow_bind_group"),
        });

        let glow = GlowPipeline::new(&device, surface_format, &uniform_bind_group_layout);
        let vertex_buffer = VertexBuffer::new(&device, &QuadVertex::fullscreen_quad());

        Ok(Self {
            surface,
            device,
            queue,
            config,
            glow,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            started: Instant::now(),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Draws the glow, then the egui scene on top, and returns what the
    /// user did this frame.
    pub fn render(
        &mut self,
        mut uniforms: GlowUniforms,
        ui: &mut UserInterface,
        frame: &UiFrame,
        window: &Window,
    ) -> Result<Vec<UiAction>> {
        uniforms.time = self.started.elapsed().as_secs_f32();
        uniforms.resolution = [self.config.width as f32, self.config.height as f32];
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Glow Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.glow.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.buffer.slice(..));
            render_pass.draw(0..self.vertex_buffer.vertex_count, 0..1);
        }

        let screen = [self.config.width, self.config.height];
        let (actions, ui_commands) = ui.render(&mut encoder, &view, &self.device, &self.queue, window, screen, frame)?;

        self.queue
            .submit(ui_commands.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experience::{CandleVisual, FlameBend, Message};

    #[test]
    fn test_uniform_layout_is_std140_friendly() {
        assert_eq!(std::mem::size_of::<GlowUniforms>(), 32);
    }

    #[test]
    fn test_uniforms_follow_scene() {
        let mut scene = Scene::default();
        assert_eq!(GlowUniforms::from_scene(&scene).lit_left, 0.0);

        scene.candles = [
            CandleVisual { lit: true, ..Default::default() },
            CandleVisual { lit: true, shrinking: true, ..Default::default() },
        ];
        scene.flame = FlameBend::from_intensity(1.0);
        let uniforms = GlowUniforms::from_scene(&scene);
        assert_eq!(uniforms.lit_left, 1.0);
        assert_eq!(uniforms.lit_right, 0.4);
        assert!((uniforms.lean - 1.0).abs() < 1e-6);
        assert_eq!(uniforms.reveal, 0.0);

        scene.message = Message::reveal("Happy Birthday");
        assert_eq!(GlowUniforms::from_scene(&scene).reveal, 1.0);
    }
}
