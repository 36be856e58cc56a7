use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::thread;

use super::fft::ByteFrequencyAnalyzer;
use super::{AcquisitionResult, LevelSampler, MicrophoneSource, PendingMicrophone};
use crate::error::MicrophoneError;

/// Callback blocks queued between frames; newer blocks are dropped when full.
const CAPTURE_QUEUE_BLOCKS: usize = 4;

/// Opens the microphone through cpal.
///
/// cpal streams cannot move between threads on every platform, so each request
/// spawns a worker that opens the stream, keeps it alive, and forwards mono
/// sample blocks over a channel until told to stop.
pub struct CpalMicrophone {
    device_name: Option<String>,
    fft_size: usize,
}

impl CpalMicrophone {
    pub fn new(device_name: Option<String>, fft_size: usize) -> Self {
        Self {
            device_name,
            fft_size,
        }
    }
}

impl MicrophoneSource for CpalMicrophone {
    fn request(&mut self) -> PendingMicrophone {
        let (result_sender, pending) = PendingMicrophone::channel();
        let device_name = self.device_name.clone();
        let fft_size = self.fft_size;

        let spawned = thread::Builder::new()
            .name("candlelight-mic".to_string())
            .spawn(move || run_capture_worker(device_name, fft_size, result_sender));

        match spawned {
            Ok(_) => pending,
            Err(e) => PendingMicrophone::ready(Err(MicrophoneError::Unknown(format!(
                "could not start capture thread: {}",
                e
            )))),
        }
    }
}

fn run_capture_worker(
    device_name: Option<String>,
    fft_size: usize,
    result_sender: tokio::sync::oneshot::Sender<AcquisitionResult>,
) {
    let (audio_sender, audio_receiver) = crossbeam_channel::bounded(CAPTURE_QUEUE_BLOCKS);
    let (stop_sender, stop_receiver) = crossbeam_channel::bounded::<()>(1);

    let stream = match open_input_stream(device_name.as_deref(), audio_sender) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Microphone acquisition failed: {}", e);
            let _ = result_sender.send(Err(e));
            return;
        }
    };

    let capture = MicrophoneCapture::new(audio_receiver, stop_sender, fft_size);
    if result_sender.send(Ok(Box::new(capture))).is_err() {
        info!("Microphone request abandoned before it completed");
        return;
    }

    // Either an explicit stop or the capture being dropped ends the wait.
    let _ = stop_receiver.recv();
    drop(stream);
    debug!("Microphone stream closed");
}

fn open_input_stream(device_name: Option<&str>, sender: Sender<Vec<f32>>) -> Result<Stream, MicrophoneError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(MicrophoneError::DeviceNotFound)?,
        None => host.default_input_device().ok_or(MicrophoneError::DeviceNotFound)?,
    };

    let config = device.default_input_config()?;

    info!("Using microphone: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));
    info!("Microphone config: {:?}", config);

    let sample_format = config.sample_format();
    let stream_config: StreamConfig = config.into();

    let stream = match sample_format {
        SampleFormat::F32 => build_input_stream::<f32>(&device, &stream_config, sender)?,
        SampleFormat::I16 => build_input_stream::<i16>(&device, &stream_config, sender)?,
        SampleFormat::U16 => build_input_stream::<u16>(&device, &stream_config, sender)?,
        other => {
            return Err(MicrophoneError::MicrophoneUnavailable(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };

    stream.play()?;
    Ok(stream)
}

fn build_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sender: Sender<Vec<f32>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32)
                .collect();

            queue_block(&sender, mono);
        },
        |err| {
            warn!("Microphone stream error: {}", err);
        },
        None,
    )
}

fn queue_block(sender: &Sender<Vec<f32>>, block: Vec<f32>) {
    match sender.try_send(block) {
        Ok(()) | Err(TrySendError::Full(_)) => {}
        Err(TrySendError::Disconnected(_)) => {
            debug!("Microphone samples dropped: capture already released");
        }
    }
}

/// Live microphone sampler: keeps the latest analysis window and reduces it
/// to a loudness value on demand.
pub struct MicrophoneCapture {
    audio_receiver: Receiver<Vec<f32>>,
    stop_sender: Option<Sender<()>>,
    analyzer: ByteFrequencyAnalyzer,
    recent: VecDeque<f32>,
}

impl MicrophoneCapture {
    fn new(audio_receiver: Receiver<Vec<f32>>, stop_sender: Sender<()>, fft_size: usize) -> Self {
        Self {
            audio_receiver,
            stop_sender: Some(stop_sender),
            analyzer: ByteFrequencyAnalyzer::new(fft_size),
            recent: VecDeque::with_capacity(fft_size),
        }
    }

    fn drain_pending(&mut self) {
        let fft_size = self.analyzer.fft_size();
        while let Ok(block) = self.audio_receiver.try_recv() {
            self.recent.extend(block);
        }
        while self.recent.len() > fft_size {
            self.recent.pop_front();
        }
    }
}

impl LevelSampler for MicrophoneCapture {
    fn sample(&mut self) -> f32 {
        if self.stop_sender.is_none() {
            return 0.0;
        }
        self.drain_pending();
        let window = self.recent.make_contiguous();
        self.analyzer.loudness(window)
    }

    fn discard_backlog(&mut self) {
        if self.stop_sender.is_some() {
            self.drain_pending();
        }
    }

    fn release(&mut self) -> Result<(), MicrophoneError> {
        match self.stop_sender.take() {
            Some(stop) => stop
                .send(())
                .map_err(|_| MicrophoneError::Unknown("capture worker already stopped".to_string())),
            None => Ok(()),
        }
    }
}
