use anyhow::Result;
use log::{info, warn};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::experience::ExperienceEvent;

/// Plays the ambient loop and the blow-out cue.
///
/// Playback is decoration: a missing output device, a missing file or a
/// decode failure is logged once and the experience carries on silently.
pub struct CuePlayer {
    #[allow(dead_code)]
    stream: Option<OutputStream>,
    stream_handle: Option<OutputStreamHandle>,
    loop_path: Option<PathBuf>,
    blow_path: Option<PathBuf>,
    loop_sink: Option<Sink>,
    blow_sink: Option<Sink>,
    loop_volume: f32,
}

impl CuePlayer {
    pub fn new(loop_path: Option<PathBuf>, blow_path: Option<PathBuf>) -> Self {
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok((stream, handle)) => (Some(stream), Some(handle)),
            Err(e) => {
                warn!("No audio output, cues disabled: {}", e);
                (None, None)
            }
        };

        Self {
            stream,
            stream_handle,
            loop_path,
            blow_path,
            loop_sink: None,
            blow_sink: None,
            loop_volume: 1.0,
        }
    }

    /// A player that never makes a sound.
    pub fn silent() -> Self {
        Self {
            stream: None,
            stream_handle: None,
            loop_path: None,
            blow_path: None,
            loop_sink: None,
            blow_sink: None,
            loop_volume: 1.0,
        }
    }

    pub fn handle(&mut self, event: &ExperienceEvent) {
        match event {
            ExperienceEvent::PlayLoopCue => self.play_loop(),
            ExperienceEvent::SetLoopVolume(volume) => self.set_loop_volume(*volume),
            ExperienceEvent::StopLoopCue => self.stop_loop(),
            ExperienceEvent::PlayBlowCue => self.play_blow(),
            ExperienceEvent::StopAllCues => {
                self.stop_loop();
                if let Some(sink) = self.blow_sink.take() {
                    sink.stop();
                }
            }
            _ => {}
        }
    }

    pub fn is_loop_playing(&self) -> bool {
        self.loop_sink.as_ref().map_or(false, |sink| !sink.is_paused() && !sink.empty())
    }

    pub fn loop_volume(&self) -> f32 {
        self.loop_volume
    }

    fn play_loop(&mut self) {
        self.stop_loop();
        self.loop_volume = 1.0;
        let (Some(handle), Some(path)) = (&self.stream_handle, &self.loop_path) else {
            return;
        };
        match Self::start_sink(handle, path, true) {
            Ok(sink) => {
                info!("Loop cue started: {:?}", path);
                self.loop_sink = Some(sink);
            }
            Err(e) => warn!("Loop cue failed: {}", e),
        }
    }

    fn play_blow(&mut self) {
        let (Some(handle), Some(path)) = (&self.stream_handle, &self.blow_path) else {
            return;
        };
        match Self::start_sink(handle, path, false) {
            Ok(sink) => self.blow_sink = Some(sink),
            Err(e) => warn!("Blow cue failed: {}", e),
        }
    }

    fn stop_loop(&mut self) {
        if let Some(sink) = self.loop_sink.take() {
            sink.stop();
        }
    }

    fn set_loop_volume(&mut self, volume: f32) {
        self.loop_volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.loop_sink {
            sink.set_volume(self.loop_volume);
        }
    }

    fn start_sink(handle: &OutputStreamHandle, path: &Path, looped: bool) -> Result<Sink> {
        let sink = Sink::try_new(handle)?;
        let file = BufReader::new(File::open(path)?);
        if looped {
            sink.append(Decoder::new_looped(file)?);
        } else {
            sink.append(Decoder::new(file)?);
        }
        sink.play();
        Ok(sink)
    }
}
