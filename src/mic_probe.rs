use anyhow::Result;
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait};
use log::info;
use std::time::{Duration, Instant};

use candlelight::audio::blow_detector::DEFAULT_GRACE_PERIOD;
use candlelight::audio::{
    AudioSession, BlowDetector, Calibrator, CpalMicrophone, FlameSignal, LevelSampler, MicrophoneSource,
};

#[derive(Parser)]
#[command(name = "candlelight-mic-probe")]
#[command(about = "Check microphone loudness, calibration and blow detection")]
struct Args {
    /// List input devices and exit
    #[arg(long)]
    list: bool,

    /// Input device name; the host default when omitted
    #[arg(long)]
    device: Option<String>,

    /// Ambient calibration window in seconds
    #[arg(long, default_value = "3.0")]
    calibrate_seconds: f32,

    /// How long to watch for a blow after calibrating, in seconds
    #[arg(long, default_value = "15.0")]
    seconds: f32,

    /// Analysis window in samples
    #[arg(long, default_value = "512")]
    fft_size: usize,
}

fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    for device in host.input_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let marker = if Some(&name) == default_name.as_ref() { " (default)" } else { "" };
        println!("{}{}", name, marker);
    }
    Ok(())
}

fn describe(signal: FlameSignal) -> String {
    match signal {
        FlameSignal::Rest => "rest".to_string(),
        FlameSignal::Flicker(intensity) => format!("flicker {:.2}", intensity),
        FlameSignal::Unchanged => "-".to_string(),
    }
}

/// Finalizes and returns the threshold with the number of samples behind it.
fn finish_calibration(calibrator: &mut Calibrator) -> (f32, usize) {
    let sample_count = calibrator.sample_count();
    (calibrator.finalize(), sample_count)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        return list_devices();
    }

    info!("Candlelight microphone probe");
    let mut microphone = CpalMicrophone::new(args.device.clone(), args.fft_size);
    let sampler = match microphone.request().wait().await {
        Ok(sampler) => sampler,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };
    let mut session = AudioSession::new(sampler);
    let mut ticker = tokio::time::interval(Duration::from_millis(16));

    info!("Calibrating for {:.1}s, stay quiet...", args.calibrate_seconds);
    let mut calibrator = Calibrator::new();
    calibrator.start();
    let calibrate_until = Instant::now() + Duration::from_secs_f32(args.calibrate_seconds.max(0.0));
    while Instant::now() < calibrate_until {
        ticker.tick().await;
        calibrator.tick(&mut session);
    }
    let (threshold, sample_count) = finish_calibration(&mut calibrator);
    info!("Blow threshold: {:.1} from {} samples", threshold, sample_count);

    let mut detector = BlowDetector::new(threshold, DEFAULT_GRACE_PERIOD);
    let start = Instant::now();
    detector.arm(start);
    info!("Blow now");

    let watch_for = Duration::from_secs_f32(args.seconds.max(0.0));
    let mut last_report = start;
    while start.elapsed() < watch_for {
        ticker.tick().await;
        let now = Instant::now();
        let Some(reading) = detector.poll(&mut session, now) else {
            break;
        };
        if reading.blown_out {
            info!(
                "Blow detected after {:.2}s (loudness {:.1})",
                now.duration_since(start).as_secs_f32(),
                reading.loudness
            );
            break;
        }
        if now.duration_since(last_report) >= Duration::from_millis(250) {
            info!("loudness {:>6.1}  {}", reading.loudness, describe(reading.signal));
            last_report = now;
        }
    }

    if !detector.has_fired() {
        info!("No blow detected");
    }
    session.release()?;
    Ok(())
}
