pub mod layout;

pub use layout::{Bounds, CandleLayout};

use anyhow::Result;
use egui::{Align2, Color32, FontId, Pos2, Shape, Stroke};
use egui_wgpu::Renderer;
use egui_winit::State;
use glam::Vec2;
use std::f32::consts::TAU;
use std::time::Instant;
use wgpu::{CommandEncoder, Device, Queue, TextureView};
use winit::{event::WindowEvent, window::Window};

use crate::effects::OrbField;
use crate::experience::{
    CandleVisual, ErrorAction, FlameBend, IgniteButton, MessageStyle, Scene, Side,
};
use crate::graphics::GraphicsEngine;

const FLAME_POINTS: usize = 24;
const WAX: Color32 = Color32::from_rgb(246, 232, 214);
const STRIPE: Color32 = Color32::from_rgb(64, 200, 190);
const PLATE: Color32 = Color32::from_rgb(58, 44, 70);
const GOLD: Color32 = Color32::from_rgb(255, 214, 120);

/// Something the user did this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Ignite,
    Retry,
    UseTouch,
    Replay,
    PressBase,
    ReleaseBase,
    TouchFlame(Side),
}

/// Read-only view of the world for one frame.
pub struct UiFrame<'s> {
    pub scene: &'s Scene,
    pub orbs: &'s OrbField,
    pub now: Instant,
    /// Seconds since start, drives flicker
    pub time: f32,
}

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    base_pressed: bool,
}

impl UserInterface {
    pub fn new(window: &Window, graphics_engine: &GraphicsEngine) -> Self {
        let context = egui::Context::default();
        context.set_visuals(egui::Visuals::dark());

        let egui_state = State::new(context.clone(), egui::ViewportId::ROOT, &window, None, None);

        let renderer = Renderer::new(&graphics_engine.device, graphics_engine.config.format, None, 1);

        Self {
            context,
            state: egui_state,
            renderer,
            base_pressed: false,
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) {
        let _ = self.state.on_window_event(window, event);
    }

    /// Runs egui for one frame and records its draw into `encoder`.
    ///
    /// The returned command buffers hold egui's buffer uploads and must be
    /// submitted before `encoder`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        device: &Device,
        queue: &Queue,
        window: &Window,
        size_in_pixels: [u32; 2],
        frame: &UiFrame,
    ) -> Result<(Vec<UiAction>, Vec<wgpu::CommandBuffer>)> {
        let raw_input = self.state.take_egui_input(window);

        let base_pressed = &mut self.base_pressed;
        let mut actions = Vec::new();
        let full_output = self.context.run(raw_input, |ctx| {
            actions = Self::ui_content(ctx, frame, base_pressed);
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: full_output.pixels_per_point,
        };

        let commands = self.renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok((actions, commands))
    }

    fn ui_content(ctx: &egui::Context, frame: &UiFrame, base_pressed: &mut bool) -> Vec<UiAction> {
        let scene = frame.scene;
        let mut actions = Vec::new();
        let screen = ctx.screen_rect();
        let layout = CandleLayout::new(Vec2::new(screen.width(), screen.height()));

        egui::CentralPanel::default().frame(egui::Frame::none()).show(ctx, |ui| {
            let painter = ui.painter().clone();

            draw_orbs(&painter, screen, frame);
            painter.rect_filled(layout.plate.to_rect(), 8.0, PLATE);
            for side in Side::BOTH {
                draw_candle(&painter, &layout, side, scene.candle(side), scene.flame, frame.time);
            }
            if scene.match_animating && scene.lit_count() < 2 {
                draw_match(&painter, &layout, scene, frame.time);
            }
            draw_texts(&painter, &layout, scene);

            let base = ui.interact(
                layout.base.to_rect(),
                egui::Id::new("candle-base"),
                egui::Sense::click_and_drag(),
            );
            let pressed = base.is_pointer_button_down_on();
            match (*base_pressed, pressed) {
                (false, true) => actions.push(UiAction::PressBase),
                (true, false) => actions.push(UiAction::ReleaseBase),
                _ => {}
            }
            *base_pressed = pressed;
        });

        if scene.touch_mode && scene.ready {
            let (down, pos) = ctx.input(|i| (i.pointer.primary_down(), i.pointer.interact_pos()));
            if let (true, Some(pos)) = (down, pos) {
                if let Some(side) = layout.flame_at(Vec2::new(pos.x, pos.y)) {
                    actions.push(UiAction::TouchFlame(side));
                }
            }
        }

        Self::controls(ctx, scene, &mut actions);
        actions
    }

    fn controls(ctx: &egui::Context, scene: &Scene, actions: &mut Vec<UiAction>) {
        let big = |text: &str| egui::RichText::new(text).size(22.0);

        egui::Area::new(egui::Id::new("controls"))
            .anchor(Align2::CENTER_BOTTOM, egui::vec2(0.0, -48.0))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    match scene.ignite_button {
                        IgniteButton::Visible => {
                            if ui.button(big("Ignite")).clicked() {
                                actions.push(UiAction::Ignite);
                            }
                        }
                        IgniteButton::Lighting => {
                            ui.add_enabled(false, egui::Button::new(big("Lighting...")));
                        }
                        IgniteButton::Hidden => {}
                    }

                    if scene.replay_visible && ui.button(big("Replay")).clicked() {
                        actions.push(UiAction::Replay);
                    }
                });
            });

        if let Some(error) = &scene.error {
            egui::Area::new(egui::Id::new("error"))
                .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.set_max_width(320.0);
                        ui.vertical_centered(|ui| {
                            ui.label(egui::RichText::new(&error.message).size(18.0));
                            ui.add_space(8.0);
                            let (label, action) = match error.action {
                                ErrorAction::Retry => ("Try Again", UiAction::Retry),
                                ErrorAction::UseTouch => ("Use Touch Instead", UiAction::UseTouch),
                            };
                            if ui.button(big(label)).clicked() {
                                actions.push(action);
                            }
                        });
                    });
                });
        }
    }
}

fn to_pos(v: Vec2) -> Pos2 {
    Pos2::new(v.x, v.y)
}

fn with_alpha(color: [u8; 4], opacity: f32) -> Color32 {
    let alpha = (color[3] as f32 * opacity.clamp(0.0, 1.0)) as u8;
    Color32::from_rgba_unmultiplied(color[0], color[1], color[2], alpha)
}

fn draw_orbs(painter: &egui::Painter, screen: egui::Rect, frame: &UiFrame) {
    for orb in frame.orbs.frames(frame.now) {
        let center = Pos2::new(
            screen.width() * orb.x + orb.drift_px,
            screen.height() + orb.size_px - orb.rise * (screen.height() + orb.size_px * 2.0),
        );
        painter.circle_filled(center, orb.size_px, with_alpha(orb.color, orb.opacity * 0.25));
        painter.circle_filled(center, orb.size_px * 0.5, with_alpha(orb.color, orb.opacity));
    }
}

/// Teardrop outline, tip up, bent by `bend`.
fn flame_outline(anchor: Vec2, size: Vec2, bend: FlameBend, shrink: f32) -> Vec<Pos2> {
    let height = size.y * bend.scale * shrink;
    let half_width = size.x * 0.5 * shrink;
    let shear = bend.skew_degrees.to_radians().tan();

    (0..FLAME_POINTS)
        .map(|i| {
            let t = i as f32 / FLAME_POINTS as f32 * TAU;
            let x = half_width * t.sin() * (t * 0.5).sin();
            let up = height * 0.5 * (1.0 + t.cos());
            let lean = (up / height.max(1.0)) * bend.offset_px;
            to_pos(Vec2::new(anchor.x + x - up * shear + lean, anchor.y - up))
        })
        .collect()
}

fn draw_candle(
    painter: &egui::Painter,
    layout: &CandleLayout,
    side: Side,
    candle: &CandleVisual,
    bend: FlameBend,
    time: f32,
) {
    let body = layout.candle(side);
    painter.rect_filled(body.to_rect(), 6.0, WAX);

    let stripe = Stroke::new(body.size().x * 0.12, STRIPE);
    let step = body.size().y / 4.0;
    for i in 0..4 {
        let y = body.min.y + step * i as f32;
        painter.line_segment(
            [Pos2::new(body.min.x + 2.0, y + step * 0.7), Pos2::new(body.max.x - 2.0, y + step * 0.2)],
            stripe,
        );
    }

    let anchor = layout.flame_anchor(side);
    painter.line_segment(
        [Pos2::new(anchor.x, body.min.y), to_pos(anchor)],
        Stroke::new(2.0, Color32::from_gray(40)),
    );

    if candle.lit && !candle.blown_out {
        let flicker = 1.0 + 0.05 * (time * 9.0 + side.index() as f32).sin();
        let shrink = if candle.shrinking { 0.2 } else { flicker };
        let outer = flame_outline(anchor, layout.flame_size, bend, shrink);
        let inner = flame_outline(anchor, layout.flame_size, bend, shrink * 0.55);
        painter.add(Shape::convex_polygon(
            outer,
            Color32::from_rgba_unmultiplied(255, 140, 40, 230),
            Stroke::NONE,
        ));
        painter.add(Shape::convex_polygon(
            inner,
            Color32::from_rgb(255, 236, 150),
            Stroke::NONE,
        ));
    } else if candle.blown_out {
        for i in 0..3 {
            let rise = ((time * 0.6 + i as f32 / 3.0) % 1.0) * layout.flame_size.y * 1.5;
            let center = anchor - Vec2::new((time * 2.0 + i as f32).sin() * 4.0, rise);
            painter.circle_filled(to_pos(center), 3.0 + rise * 0.1, Color32::from_white_alpha(18));
        }
    }
}

fn draw_match(painter: &egui::Painter, layout: &CandleLayout, scene: &Scene, time: f32) {
    let target = if scene.candle(Side::Right).lit { Side::Left } else { Side::Right };
    let tip = layout.flame_anchor(target) + Vec2::new(12.0 + (time * 6.0).sin() * 3.0, -6.0);
    painter.line_segment(
        [to_pos(tip), to_pos(tip + Vec2::new(36.0, 28.0))],
        Stroke::new(3.0, Color32::from_rgb(200, 160, 110)),
    );
    painter.circle_filled(to_pos(tip), 5.0, Color32::from_rgb(255, 170, 60));
}

fn draw_texts(painter: &egui::Painter, layout: &CandleLayout, scene: &Scene) {
    match scene.message.style {
        MessageStyle::Hidden => {}
        MessageStyle::Visible => {
            painter.text(
                to_pos(layout.message_pos),
                Align2::CENTER_CENTER,
                &scene.message.text,
                FontId::proportional(30.0),
                Color32::from_gray(235),
            );
        }
        MessageStyle::Reveal => {
            painter.text(
                to_pos(layout.message_pos),
                Align2::CENTER_CENTER,
                &scene.message.text,
                FontId::proportional(46.0),
                GOLD,
            );
        }
    }

    let hint = if scene.touch_hint {
        Some("Swipe across the flames")
    } else if scene.volume_hint {
        Some("Turn your sound on")
    } else {
        None
    };
    if let Some(hint) = hint {
        painter.text(
            to_pos(layout.hint_pos),
            Align2::CENTER_CENTER,
            hint,
            FontId::proportional(16.0),
            Color32::from_gray(170),
        );
    }
}
