use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use candlelight::audio::CpalMicrophone;
use candlelight::config::ExperienceConfig;
use candlelight::effects::{CuePlayer, OrbField};
use candlelight::experience::{Experience, ExperienceEvent};
use candlelight::graphics::{GlowUniforms, GraphicsEngine};
use candlelight::ui::{UiAction, UiFrame, UserInterface};

#[derive(Parser)]
#[command(name = "candlelight")]
#[command(about = "Light two candles, then blow them out")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the microphone and put the flames out by touch
    #[arg(long)]
    touch: bool,

    /// Message revealed once both candles are out
    #[arg(short, long)]
    message: Option<String>,

    /// Offer a replay button after the reveal
    #[arg(long)]
    replay: bool,

    /// Input device name (see `mic-probe --list`)
    #[arg(long)]
    device: Option<String>,
}

fn load_config(args: &Args) -> Result<ExperienceConfig> {
    let mut config = match &args.config {
        Some(path) => ExperienceConfig::load(path)?,
        None => ExperienceConfig::default(),
    };
    if let Some(message) = &args.message {
        config.reveal_message = message.clone();
    }
    if args.replay {
        config.show_replay_button = true;
    }
    if args.device.is_some() {
        config.input_device = args.device.clone();
    }
    config.validate()?;
    Ok(config)
}

fn apply_action(experience: &mut Experience, action: UiAction, touch_only: bool, now: Instant) {
    match action {
        UiAction::Ignite if touch_only => {
            experience.ignite_touch(now);
        }
        UiAction::Ignite => {
            experience.ignite(now);
        }
        UiAction::Retry => {
            experience.retry(now);
        }
        UiAction::UseTouch => {
            experience.use_touch(now);
        }
        UiAction::Replay => {
            info!("Replay requested");
            experience.reset();
        }
        UiAction::PressBase => {
            experience.press_base(now);
        }
        UiAction::ReleaseBase => {
            experience.release_base(now);
        }
        UiAction::TouchFlame(side) => {
            experience.touch_flame(side, now);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    info!("Starting Candlelight");

    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new()
        .with_title("Candlelight")
        .with_inner_size(winit::dpi::LogicalSize::new(900, 700))
        .build(&event_loop)?);

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(&window))?;
    let mut ui = UserInterface::new(&window, &graphics_engine);
    let mut cues = CuePlayer::new(config.loop_cue.clone(), config.blow_cue.clone());

    let microphone = CpalMicrophone::new(config.input_device.clone(), config.fft_size);
    let orb_count = config.orb_count;
    let mut experience = Experience::new(config, Box::new(microphone));
    let mut orbs = OrbField::new();
    let mut rng = rand::thread_rng();
    let touch_only = args.touch;
    let started = Instant::now();

    info!("Candlelight initialized");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested");
                    experience.reset();
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. }
                    if event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                        && event.state == ElementState::Pressed =>
                {
                    info!("Escape pressed");
                    experience.reset();
                    elwt.exit();
                }
                WindowEvent::Resized(physical_size) => {
                    graphics_engine.resize(physical_size);
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    experience.update(now);

                    for event in experience.drain_events() {
                        cues.handle(&event);
                        match event {
                            ExperienceEvent::ReleaseOrbs => orbs.release(orb_count, now, &mut rng),
                            ExperienceEvent::ClearOrbs => orbs.clear(),
                            _ => {}
                        }
                    }
                    orbs.update(now);

                    let frame = UiFrame {
                        scene: experience.scene(),
                        orbs: &orbs,
                        now,
                        time: now.duration_since(started).as_secs_f32(),
                    };
                    let uniforms = GlowUniforms::from_scene(experience.scene());
                    match graphics_engine.render(uniforms, &mut ui, &frame, &window_clone) {
                        Ok(actions) => {
                            for action in actions {
                                apply_action(&mut experience, action, touch_only, now);
                            }
                        }
                        Err(e) => log::error!("Render error: {}", e),
                    }
                }
                other => {
                    ui.handle_event(&other, &window_clone);
                }
            },
            Event::AboutToWait => {
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
