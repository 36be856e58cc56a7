pub mod blow_detector;
pub mod calibrator;
pub mod capture;
pub mod fft;

pub use blow_detector::{BlowDetector, DetectorReading, FlameSignal};
pub use calibrator::{CalibrationPhase, Calibrator};
pub use capture::{CpalMicrophone, MicrophoneCapture};
pub use fft::ByteFrequencyAnalyzer;

use log::debug;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::MicrophoneError;

/// Source of one loudness value per frame.
///
/// Loudness is the mean byte magnitude (0–255) over the lower half of the
/// frequency bins of the most recent audio frame.
pub trait LevelSampler: Send {
    fn sample(&mut self) -> f32;

    /// Throw away queued audio without analyzing it, for frames that do not
    /// sample.
    fn discard_backlog(&mut self) {}

    /// Stop the underlying stream. Callers treat failures as non-fatal.
    fn release(&mut self) -> Result<(), MicrophoneError>;
}

pub type AcquisitionResult = Result<Box<dyn LevelSampler>, MicrophoneError>;

/// Something that can be asked for microphone access.
pub trait MicrophoneSource {
    /// Starts acquisition without blocking; the result arrives later.
    fn request(&mut self) -> PendingMicrophone;
}

/// An in-flight microphone request.
///
/// Dropping it abandons the request; a stream opened afterwards is released
/// by its worker as soon as it notices nobody is listening.
pub struct PendingMicrophone {
    receiver: oneshot::Receiver<AcquisitionResult>,
}

impl PendingMicrophone {
    pub fn channel() -> (oneshot::Sender<AcquisitionResult>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// A request that has already finished.
    pub fn ready(result: AcquisitionResult) -> Self {
        let (sender, pending) = Self::channel();
        let _ = sender.send(result);
        pending
    }

    /// Non-blocking check, for the frame loop.
    pub fn poll(&mut self) -> Option<AcquisitionResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(MicrophoneError::Unknown(
                "microphone request was abandoned".to_string(),
            ))),
        }
    }

    pub async fn wait(self) -> AcquisitionResult {
        self.receiver.await.unwrap_or_else(|_| {
            Err(MicrophoneError::Unknown("microphone request was abandoned".to_string()))
        })
    }
}

/// Exclusive owner of one session's microphone capture.
///
/// Sampling after release yields silence instead of touching a dead stream,
/// and release errors are logged and dropped.
pub struct AudioSession {
    sampler: Box<dyn LevelSampler>,
    released: bool,
}

impl AudioSession {
    pub fn new(sampler: Box<dyn LevelSampler>) -> Self {
        Self {
            sampler,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl LevelSampler for AudioSession {
    fn sample(&mut self) -> f32 {
        if self.released {
            return 0.0;
        }
        self.sampler.sample()
    }

    fn discard_backlog(&mut self) {
        if !self.released {
            self.sampler.discard_backlog();
        }
    }

    fn release(&mut self) -> Result<(), MicrophoneError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if let Err(e) = self.sampler.release() {
            debug!("Ignoring microphone teardown error: {}", e);
        }
        Ok(())
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Script {
        queued: VecDeque<f32>,
        level: f32,
        samples: usize,
        discards: usize,
        releases: usize,
        fail_release: bool,
    }

    /// Test double: plays queued levels, then holds a steady level.
    pub struct ScriptedSampler {
        script: Arc<Mutex<Script>>,
    }

    /// Handle for steering a `ScriptedSampler` after it has been boxed away.
    #[derive(Clone)]
    pub struct ScriptHandle {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedSampler {
        pub fn steady(level: f32) -> (Self, ScriptHandle) {
            let script = Arc::new(Mutex::new(Script {
                level,
                ..Default::default()
            }));
            (
                Self {
                    script: Arc::clone(&script),
                },
                ScriptHandle { script },
            )
        }

        pub fn sequence(levels: &[f32], then: f32) -> (Self, ScriptHandle) {
            let (sampler, handle) = Self::steady(then);
            handle.script.lock().unwrap().queued.extend(levels.iter().copied());
            (sampler, handle)
        }
    }

    impl ScriptHandle {
        pub fn set_level(&self, level: f32) {
            self.script.lock().unwrap().level = level;
        }

        pub fn fail_release(&self) {
            self.script.lock().unwrap().fail_release = true;
        }

        pub fn samples(&self) -> usize {
            self.script.lock().unwrap().samples
        }

        pub fn discards(&self) -> usize {
            self.script.lock().unwrap().discards
        }

        pub fn releases(&self) -> usize {
            self.script.lock().unwrap().releases
        }
    }

    impl LevelSampler for ScriptedSampler {
        fn sample(&mut self) -> f32 {
            let mut script = self.script.lock().unwrap();
            script.samples += 1;
            match script.queued.pop_front() {
                Some(level) => level,
                None => script.level,
            }
        }

        fn discard_backlog(&mut self) {
            self.script.lock().unwrap().discards += 1;
        }

        fn release(&mut self) -> Result<(), MicrophoneError> {
            let mut script = self.script.lock().unwrap();
            script.releases += 1;
            if script.fail_release {
                Err(MicrophoneError::Unknown("track already stopped".to_string()))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSampler;
    use super::*;

    #[test]
    fn test_session_release_is_idempotent_and_swallows_errors() {
        let (sampler, handle) = ScriptedSampler::steady(42.0);
        handle.fail_release();
        let mut session = AudioSession::new(Box::new(sampler));

        assert_eq!(session.sample(), 42.0);
        assert!(session.release().is_ok());
        assert!(session.release().is_ok());
        assert!(session.is_released());
        assert_eq!(handle.releases(), 1);

        // Released sessions read as silence without touching the sampler.
        assert_eq!(session.sample(), 0.0);
        assert_eq!(handle.samples(), 1);
    }

    #[test]
    fn test_dropping_session_releases_sampler() {
        let (sampler, handle) = ScriptedSampler::steady(0.0);
        drop(AudioSession::new(Box::new(sampler)));
        assert_eq!(handle.releases(), 1);
    }

    #[test]
    fn test_pending_microphone_resolves_once() {
        let mut pending = PendingMicrophone::ready(Err(MicrophoneError::DeviceNotFound));
        match pending.poll() {
            Some(Err(MicrophoneError::DeviceNotFound)) => {}
            _ => panic!("expected a resolved DeviceNotFound"),
        }
    }

    #[test]
    fn test_pending_microphone_empty_then_abandoned() {
        let (sender, mut pending) = PendingMicrophone::channel();
        assert!(pending.poll().is_none());
        drop(sender);
        assert!(matches!(pending.poll(), Some(Err(MicrophoneError::Unknown(_)))));
    }
}
