pub mod scene;
pub mod timeline;
pub mod touch;

pub use scene::{CandleVisual, ErrorAction, ErrorPrompt, FlameBend, IgniteButton, Message, MessageStyle, Scene};
pub use timeline::{Beat, Timeline};
pub use touch::{Side, TouchFallback};

use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::audio::calibrator::DEFAULT_BLOW_THRESHOLD;
use crate::audio::{
    AcquisitionResult, AudioSession, BlowDetector, Calibrator, FlameSignal, LevelSampler, MicrophoneSource,
    PendingMicrophone,
};
use crate::config::ExperienceConfig;
use crate::error::MicrophoneError;
use scene::{MESSAGE_BREATHE_OUT, MESSAGE_MAKE_A_WISH};

const HOLDING_LOOP_VOLUME: f32 = 0.25;
const FULL_LOOP_VOLUME: f32 = 1.0;
const LEVEL_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Igniting,
    Calibrating,
    Ready,
    Holding,
    BlownOut,
}

/// One-off side effects for the presentation layer to carry out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExperienceEvent {
    PlayLoopCue,
    SetLoopVolume(f32),
    StopLoopCue,
    PlayBlowCue,
    StopAllCues,
    ReleaseOrbs,
    ClearOrbs,
    BlownOut,
}

/// The whole interactive experience: one per window, reset between replays.
///
/// The controller drives it with input calls and one `update` per frame, then
/// draws `scene()` and carries out `drain_events()`.
pub struct Experience {
    config: ExperienceConfig,
    microphone: Box<dyn MicrophoneSource>,
    state: InteractionState,
    pending: Option<PendingMicrophone>,
    session: Option<AudioSession>,
    calibrator: Calibrator,
    detector: BlowDetector,
    timeline: Timeline,
    touch: Option<TouchFallback>,
    touch_mode: bool,
    is_blown_out: bool,
    // Survives reset: some platforms remember a denial for the whole run.
    mic_denied_count: u32,
    scene: Scene,
    events: Vec<ExperienceEvent>,
    last_level_log: Option<Instant>,
}

impl Experience {
    pub fn new(config: ExperienceConfig, microphone: Box<dyn MicrophoneSource>) -> Self {
        let detector = BlowDetector::new(DEFAULT_BLOW_THRESHOLD, config.timing.grace_period());
        Self {
            config,
            microphone,
            state: InteractionState::Idle,
            pending: None,
            session: None,
            calibrator: Calibrator::new(),
            detector,
            timeline: Timeline::new(),
            touch: None,
            touch_mode: false,
            is_blown_out: false,
            mic_denied_count: 0,
            scene: Scene::default(),
            events: Vec::new(),
            last_level_log: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn config(&self) -> &ExperienceConfig {
        &self.config
    }

    pub fn is_blown_out(&self) -> bool {
        self.is_blown_out
    }

    pub fn blow_threshold(&self) -> f32 {
        self.detector.threshold()
    }

    pub fn blow_grace_period(&self, now: Instant) -> bool {
        self.detector.in_grace_period(now)
    }

    pub fn touch_mode(&self) -> bool {
        self.touch_mode
    }

    pub fn flames_extinguished(&self) -> u8 {
        self.touch.as_ref().map_or(0, |t| t.flames_extinguished())
    }

    pub fn mic_denied_count(&self) -> u32 {
        self.mic_denied_count
    }

    pub fn pending_beats(&self) -> usize {
        self.timeline.pending_count()
    }

    pub fn has_audio_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn drain_events(&mut self) -> Vec<ExperienceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Ask for the microphone. Ignored unless idle, which also swallows
    /// double taps on the ignite button.
    pub fn ignite(&mut self, _now: Instant) -> bool {
        if self.state != InteractionState::Idle {
            return false;
        }
        info!("Igniting: requesting microphone");
        self.state = InteractionState::Igniting;
        self.scene.error = None;
        self.scene.ignite_button = IgniteButton::Lighting;
        self.pending = Some(self.microphone.request());
        true
    }

    /// Light the candles without a microphone.
    pub fn ignite_touch(&mut self, now: Instant) -> bool {
        if self.state != InteractionState::Idle {
            return false;
        }
        info!("Igniting in touch mode");
        self.state = InteractionState::Igniting;
        self.touch_mode = true;
        self.touch = Some(TouchFallback::new());
        self.is_blown_out = false;
        self.scene.error = None;
        self.start_sequence(now);
        true
    }

    /// Retry after an error prompt.
    pub fn retry(&mut self, now: Instant) -> bool {
        self.dismiss_error();
        self.ignite(now)
    }

    /// Take the touch fallback offered by the error prompt.
    pub fn use_touch(&mut self, now: Instant) -> bool {
        self.dismiss_error();
        self.ignite_touch(now)
    }

    pub fn dismiss_error(&mut self) {
        if self.scene.error.take().is_some() {
            self.scene.ignite_button = IgniteButton::Visible;
        }
    }

    /// Press on the candle base.
    pub fn press_base(&mut self, now: Instant) -> bool {
        if self.is_blown_out || !self.scene.ready || self.state != InteractionState::Ready || self.touch_mode {
            return false;
        }
        self.state = InteractionState::Holding;
        self.detector.arm(now);
        self.events.push(ExperienceEvent::SetLoopVolume(HOLDING_LOOP_VOLUME));
        self.scene.message = Message::visible(MESSAGE_BREATHE_OUT);
        true
    }

    /// Pointer or touch released anywhere.
    pub fn release_base(&mut self, _now: Instant) -> bool {
        if self.state != InteractionState::Holding || self.is_blown_out {
            return false;
        }
        self.state = InteractionState::Ready;
        self.detector.disarm();
        self.events.push(ExperienceEvent::SetLoopVolume(FULL_LOOP_VOLUME));
        self.scene.message = Message::visible(MESSAGE_MAKE_A_WISH);
        self.scene.flame = FlameBend::REST;
        true
    }

    /// A touch or drag passed over a flame. Only lit candles react.
    pub fn touch_flame(&mut self, side: Side, now: Instant) -> bool {
        if !self.touch_mode || self.is_blown_out || self.state != InteractionState::Ready {
            return false;
        }
        if !self.scene.candle(side).lit {
            return false;
        }
        let first_touch = match self.touch.as_mut() {
            Some(touch) => touch.touch(side),
            None => false,
        };
        if first_touch {
            self.scene.candle_mut(side).shrinking = true;
            self.timeline
                .schedule_after(now, self.config.timing.shrink_delay(), Beat::FlameOut(side));
        }
        first_touch
    }

    /// Advance one frame.
    pub fn update(&mut self, now: Instant) {
        if let Some(result) = self.pending.as_mut().and_then(|p| p.poll()) {
            self.pending = None;
            self.on_acquisition(result, now);
        }

        for beat in self.timeline.drain_due(now) {
            self.apply_beat(beat, now);
        }

        match self.state {
            InteractionState::Calibrating => {
                if let Some(session) = self.session.as_mut() {
                    self.calibrator.tick(session);
                }
            }
            InteractionState::Holding => self.poll_detector(now),
            InteractionState::Ready => {
                if let Some(session) = self.session.as_mut() {
                    session.discard_backlog();
                }
            }
            _ => {}
        }
    }

    /// Back to a freshly started experience.
    pub fn reset(&mut self) {
        info!("Resetting experience");
        self.events.push(ExperienceEvent::StopAllCues);
        self.events.push(ExperienceEvent::ClearOrbs);

        self.release_session();
        self.pending = None;
        let cancelled = self.timeline.cancel_all();
        if cancelled > 0 {
            info!("Cancelled {} scheduled beats", cancelled);
        }

        self.state = InteractionState::Idle;
        self.calibrator.reset();
        self.detector = BlowDetector::new(DEFAULT_BLOW_THRESHOLD, self.config.timing.grace_period());
        self.touch = None;
        self.touch_mode = false;
        self.is_blown_out = false;
        self.last_level_log = None;
        self.scene = Scene::default();
    }

    fn on_acquisition(&mut self, result: AcquisitionResult, now: Instant) {
        match result {
            Ok(sampler) => self.on_microphone_ready(sampler, now),
            Err(e) => self.on_microphone_failed(e),
        }
    }

    fn on_microphone_ready(&mut self, sampler: Box<dyn LevelSampler>, now: Instant) {
        if self.state != InteractionState::Igniting {
            // Dropping the session releases the stale stream.
            drop(AudioSession::new(sampler));
            return;
        }
        info!("Microphone ready, calibrating ambient noise");
        self.session = Some(AudioSession::new(sampler));
        self.state = InteractionState::Calibrating;
        self.calibrator.start();
        self.start_sequence(now);
    }

    fn on_microphone_failed(&mut self, error: MicrophoneError) {
        warn!("Microphone unavailable: {}", error);
        self.state = InteractionState::Idle;

        let mut action = ErrorAction::Retry;
        if error.is_denial() {
            self.mic_denied_count += 1;
            if self.mic_denied_count > 1 {
                action = ErrorAction::UseTouch;
            }
        }

        self.scene.ignite_button = IgniteButton::Hidden;
        self.scene.error = Some(ErrorPrompt {
            message: error.user_message(),
            action,
        });
    }

    fn start_sequence(&mut self, now: Instant) {
        let timing = &self.config.timing;
        self.timeline
            .schedule_after(now, timing.right_candle(), Beat::LightCandle(Side::Right));
        self.timeline
            .schedule_after(now, timing.left_candle(), Beat::LightCandle(Side::Left));
        self.timeline.schedule_after(now, timing.loop_cue(), Beat::StartLoopCue);
        self.timeline.schedule_after(now, timing.ready(), Beat::FinishIgnition);

        self.scene.ignite_button = IgniteButton::Hidden;
        self.scene.message = Message::default();
        self.scene.volume_hint = true;
        self.scene.match_animating = true;
    }

    fn apply_beat(&mut self, beat: Beat, now: Instant) {
        match beat {
            Beat::LightCandle(side) => {
                self.scene.candle_mut(side).lit = true;
                if self.scene.lit_count() == self.scene.candles.len() {
                    self.scene.match_animating = false;
                }
            }
            Beat::StartLoopCue => self.events.push(ExperienceEvent::PlayLoopCue),
            Beat::FinishIgnition => self.finish_ignition(),
            Beat::FlameOut(side) => self.flame_out(side, now),
            Beat::ShowReplay => self.scene.replay_visible = true,
        }
    }

    fn finish_ignition(&mut self) {
        if self.touch_mode {
            self.scene.touch_mode = true;
            self.scene.touch_hint = true;
        } else {
            let threshold = self.calibrator.finalize();
            self.detector.set_threshold(threshold);
        }
        self.state = InteractionState::Ready;
        self.scene.ready = true;
        self.scene.message = Message::visible(MESSAGE_MAKE_A_WISH);
        info!("Candles ready (touch mode: {})", self.touch_mode);
    }

    fn flame_out(&mut self, side: Side, now: Instant) {
        let candle = self.scene.candle_mut(side);
        candle.lit = false;
        candle.blown_out = true;

        let all_out = self.touch.as_mut().map_or(false, |t| t.complete_shrink(side));
        if all_out {
            self.scene.touch_hint = false;
            self.blow_out(now);
        }
    }

    fn poll_detector(&mut self, now: Instant) {
        if self.is_blown_out {
            return;
        }
        let reading = match self.session.as_mut() {
            Some(session) => self.detector.poll(session, now),
            None => None,
        };
        let Some(reading) = reading else {
            return;
        };

        if self
            .last_level_log
            .map_or(true, |last| now.saturating_duration_since(last) >= LEVEL_LOG_INTERVAL)
        {
            debug!(
                "Holding: loudness {:.1}, threshold {:.1}",
                reading.loudness,
                self.detector.threshold()
            );
            self.last_level_log = Some(now);
        }

        match reading.signal {
            FlameSignal::Flicker(intensity) => self.scene.flame = FlameBend::from_intensity(intensity),
            FlameSignal::Rest => self.scene.flame = FlameBend::REST,
            FlameSignal::Unchanged => {}
        }

        if reading.blown_out {
            self.blow_out(now);
        }
    }

    /// The terminal transition. Safe to call repeatedly; only the first call
    /// has any effect.
    fn blow_out(&mut self, now: Instant) {
        if self.is_blown_out {
            return;
        }
        self.is_blown_out = true;
        self.state = InteractionState::BlownOut;
        info!("Candles blown out");

        self.release_session();

        for candle in self.scene.candles.iter_mut() {
            candle.lit = false;
            candle.blown_out = true;
        }
        self.scene.ready = false;
        self.scene.message = Message::reveal(&self.config.reveal_message);
        self.scene.volume_hint = false;
        self.scene.touch_hint = false;

        self.events.push(ExperienceEvent::BlownOut);
        self.events.push(ExperienceEvent::ReleaseOrbs);
        self.events.push(ExperienceEvent::StopLoopCue);
        self.events.push(ExperienceEvent::PlayBlowCue);

        if self.config.show_replay_button {
            self.timeline
                .schedule_after(now, self.config.timing.replay_delay(), Beat::ShowReplay);
        }
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{ScriptHandle, ScriptedSampler};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Hands out scripted outcomes in order, resolving immediately.
    struct ScriptedMicrophone {
        outcomes: VecDeque<AcquisitionResult>,
        requests: usize,
    }

    impl MicrophoneSource for ScriptedMicrophone {
        fn request(&mut self) -> PendingMicrophone {
            self.requests += 1;
            let outcome = self
                .outcomes
                .pop_front()
                .unwrap_or_else(|| Err(MicrophoneError::Unknown("no scripted outcome".into())));
            PendingMicrophone::ready(outcome)
        }
    }

    fn experience_with(outcomes: Vec<AcquisitionResult>) -> Experience {
        experience_with_config(ExperienceConfig::default(), outcomes)
    }

    fn experience_with_config(config: ExperienceConfig, outcomes: Vec<AcquisitionResult>) -> Experience {
        let microphone = ScriptedMicrophone {
            outcomes: outcomes.into(),
            requests: 0,
        };
        Experience::new(config, Box::new(microphone))
    }

    fn sampler(level: f32) -> (AcquisitionResult, ScriptHandle) {
        let (sampler, handle) = ScriptedSampler::steady(level);
        (Ok(Box::new(sampler)), handle)
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    /// Runs frames every 16ms over `[from, to]`.
    fn run_frames(experience: &mut Experience, t0: Instant, from: u64, to: u64) {
        let mut ms = from;
        while ms <= to {
            experience.update(at(t0, ms));
            ms += 16;
        }
        experience.update(at(t0, to));
    }

    fn count_blowouts(events: &[ExperienceEvent]) -> usize {
        events.iter().filter(|e| **e == ExperienceEvent::BlownOut).count()
    }

    fn ready_with_ambient(level: f32, t0: Instant) -> (Experience, ScriptHandle) {
        let (outcome, handle) = sampler(level);
        let mut experience = experience_with(vec![outcome]);
        assert!(experience.ignite(t0));
        run_frames(&mut experience, t0, 0, 3000);
        assert_eq!(experience.state(), InteractionState::Ready);
        experience.drain_events();
        (experience, handle)
    }

    #[test]
    fn test_ready_discards_audio_without_sampling() {
        let t0 = Instant::now();
        let (mut experience, handle) = ready_with_ambient(20.0, t0);
        let samples = handle.samples();
        let discards = handle.discards();

        run_frames(&mut experience, t0, 3100, 60_000);
        assert_eq!(handle.samples(), samples);
        assert!(handle.discards() > discards + 3000);

        assert!(experience.press_base(at(t0, 60_016)));
        experience.update(at(t0, 60_032));
        assert_eq!(handle.samples(), samples + 1);
    }

    #[test]
    fn test_ignite_calibrates_and_reaches_ready() {
        let t0 = Instant::now();
        let (outcome, handle) = sampler(20.0);
        let mut experience = experience_with(vec![outcome]);

        assert!(experience.ignite(t0));
        assert_eq!(experience.state(), InteractionState::Igniting);
        assert_eq!(experience.scene().ignite_button, IgniteButton::Lighting);

        experience.update(t0);
        assert_eq!(experience.state(), InteractionState::Calibrating);
        assert!(experience.scene().volume_hint);

        run_frames(&mut experience, t0, 16, 1500);
        assert!(experience.scene().candle(Side::Right).lit);
        assert!(!experience.scene().candle(Side::Left).lit);
        assert!(experience.scene().match_animating);

        run_frames(&mut experience, t0, 1516, 2000);
        assert!(experience.scene().candle(Side::Left).lit);
        assert!(!experience.scene().match_animating);
        assert!(experience.drain_events().contains(&ExperienceEvent::PlayLoopCue));

        run_frames(&mut experience, t0, 2016, 3000);
        assert_eq!(experience.state(), InteractionState::Ready);
        assert!(experience.scene().ready);
        assert_eq!(experience.scene().message, Message::visible(MESSAGE_MAKE_A_WISH));
        assert_eq!(experience.blow_threshold(), 80.0);
        assert!(handle.samples() > 100);
    }

    #[test]
    fn test_double_ignite_is_ignored() {
        let t0 = Instant::now();
        let (outcome, _) = sampler(20.0);
        let mut experience = experience_with(vec![outcome]);
        assert!(experience.ignite(t0));
        assert!(!experience.ignite(t0));
        assert!(!experience.ignite_touch(t0));
    }

    #[test]
    fn test_blow_past_grace_fires_once() {
        let t0 = Instant::now();
        let (mut experience, handle) = ready_with_ambient(20.0, t0);

        handle.set_level(85.0);
        assert!(experience.press_base(at(t0, 3100)));
        assert_eq!(experience.state(), InteractionState::Holding);
        assert_eq!(experience.scene().message, Message::visible(MESSAGE_BREATHE_OUT));
        assert!(experience.blow_grace_period(at(t0, 3500)));

        run_frames(&mut experience, t0, 3116, 3800);
        assert!(!experience.is_blown_out());

        // Several polls inside one frame still produce a single event.
        for _ in 0..5 {
            experience.update(at(t0, 3860));
        }
        run_frames(&mut experience, t0, 3876, 5000);

        let events = experience.drain_events();
        assert_eq!(count_blowouts(&events), 1);
        assert!(events.contains(&ExperienceEvent::ReleaseOrbs));
        assert!(events.contains(&ExperienceEvent::PlayBlowCue));
        assert_eq!(experience.state(), InteractionState::BlownOut);
        assert!(!experience.has_audio_session());
        assert_eq!(handle.releases(), 1);

        let scene = experience.scene();
        assert!(scene.candles.iter().all(|c| c.blown_out && !c.lit));
        assert_eq!(scene.message.style, MessageStyle::Reveal);
        assert!(!scene.ready);
    }

    #[test]
    fn test_blown_out_is_monotonic() {
        let t0 = Instant::now();
        let (mut experience, handle) = ready_with_ambient(20.0, t0);
        handle.set_level(120.0);
        experience.press_base(at(t0, 3100));
        run_frames(&mut experience, t0, 3100, 4000);
        assert!(experience.is_blown_out());

        assert!(!experience.release_base(at(t0, 4100)));
        assert!(!experience.press_base(at(t0, 4200)));
        assert!(!experience.ignite(at(t0, 4300)));
        handle.set_level(0.0);
        run_frames(&mut experience, t0, 4300, 6000);
        assert!(experience.is_blown_out());
        assert_eq!(count_blowouts(&experience.drain_events()), 1);
    }

    #[test]
    fn test_below_threshold_never_blows_out() {
        let t0 = Instant::now();
        let (mut experience, handle) = ready_with_ambient(20.0, t0);
        handle.set_level(79.0);
        experience.press_base(at(t0, 3100));
        run_frames(&mut experience, t0, 3100, 10000);
        assert!(!experience.is_blown_out());
        assert_eq!(count_blowouts(&experience.drain_events()), 0);
        assert!(experience.scene().flame.scale < 1.0);
    }

    #[test]
    fn test_quiet_room_keeps_flames_at_rest() {
        let t0 = Instant::now();
        let (mut experience, handle) = ready_with_ambient(20.0, t0);
        handle.set_level(5.0);
        experience.press_base(at(t0, 3100));
        run_frames(&mut experience, t0, 3100, 6000);
        assert_eq!(experience.scene().flame, FlameBend::REST);
        assert!(!experience.is_blown_out());
    }

    #[test]
    fn test_release_returns_to_ready() {
        let t0 = Instant::now();
        let (mut experience, handle) = ready_with_ambient(20.0, t0);
        handle.set_level(46.0);
        experience.press_base(at(t0, 3100));
        experience.update(at(t0, 3116));
        assert_eq!(experience.scene().flame, FlameBend::from_intensity(0.5));

        assert!(experience.release_base(at(t0, 3200)));
        assert_eq!(experience.state(), InteractionState::Ready);
        assert_eq!(experience.scene().flame, FlameBend::REST);
        assert_eq!(experience.scene().message, Message::visible(MESSAGE_MAKE_A_WISH));
        assert_eq!(
            experience.drain_events(),
            vec![
                ExperienceEvent::SetLoopVolume(HOLDING_LOOP_VOLUME),
                ExperienceEvent::SetLoopVolume(FULL_LOOP_VOLUME)
            ]
        );

        // Releasing stops sampling.
        let before = handle.samples();
        run_frames(&mut experience, t0, 3216, 4000);
        assert_eq!(handle.samples(), before);
    }

    #[test]
    fn test_press_before_ready_is_ignored() {
        let t0 = Instant::now();
        let (outcome, _) = sampler(20.0);
        let mut experience = experience_with(vec![outcome]);
        experience.ignite(t0);
        run_frames(&mut experience, t0, 0, 1000);
        assert!(!experience.press_base(at(t0, 1000)));
    }

    #[test]
    fn test_reset_restores_defaults_and_allows_replay() {
        let t0 = Instant::now();
        let (second, _) = sampler(20.0);
        let (first, handle) = sampler(30.0);
        let mut experience = experience_with(vec![first, second]);

        experience.ignite(t0);
        run_frames(&mut experience, t0, 0, 3000);
        assert_eq!(experience.blow_threshold(), 120.0);
        handle.set_level(150.0);
        experience.press_base(at(t0, 3100));
        run_frames(&mut experience, t0, 3100, 4000);
        assert!(experience.is_blown_out());

        experience.reset();
        assert_eq!(experience.state(), InteractionState::Idle);
        assert!(!experience.is_blown_out());
        assert_eq!(experience.blow_threshold(), DEFAULT_BLOW_THRESHOLD);
        assert!(!experience.touch_mode());
        assert_eq!(experience.flames_extinguished(), 0);
        assert_eq!(experience.pending_beats(), 0);
        assert_eq!(*experience.scene(), Scene::default());
        let events = experience.drain_events();
        assert!(events.contains(&ExperienceEvent::StopAllCues));
        assert!(events.contains(&ExperienceEvent::ClearOrbs));

        let t1 = at(t0, 5000);
        assert!(experience.ignite(t1));
        run_frames(&mut experience, t1, 0, 3000);
        assert_eq!(experience.state(), InteractionState::Ready);
        assert_eq!(experience.blow_threshold(), 80.0);
    }

    #[test]
    fn test_beats_from_before_reset_do_not_fire() {
        let t0 = Instant::now();
        let (first, _) = sampler(20.0);
        let (second, _) = sampler(20.0);
        let mut experience = experience_with(vec![first, second]);

        experience.ignite(t0);
        experience.update(t0);
        experience.reset();

        let t1 = at(t0, 1000);
        experience.ignite(t1);
        experience.update(t1);

        // The first session would have lit the right candle at 1400ms.
        run_frames(&mut experience, t0, 1016, 2300);
        assert!(!experience.scene().candle(Side::Right).lit);
        experience.update(at(t0, 2400));
        assert!(experience.scene().candle(Side::Right).lit);
    }

    #[test]
    fn test_reset_during_calibration_releases_microphone() {
        let t0 = Instant::now();
        let (outcome, handle) = sampler(20.0);
        let mut experience = experience_with(vec![outcome]);
        experience.ignite(t0);
        run_frames(&mut experience, t0, 0, 500);
        assert!(experience.has_audio_session());

        experience.reset();
        assert!(!experience.has_audio_session());
        assert_eq!(handle.releases(), 1);
    }

    #[test]
    fn test_first_denial_offers_retry() {
        let t0 = Instant::now();
        let mut experience = experience_with(vec![Err(MicrophoneError::PermissionDenied)]);
        experience.ignite(t0);
        experience.update(t0);

        assert_eq!(experience.state(), InteractionState::Idle);
        assert_eq!(experience.mic_denied_count(), 1);
        let prompt = experience.scene().error.clone().unwrap();
        assert_eq!(prompt.action, ErrorAction::Retry);
        assert_eq!(prompt.message, "Microphone permission was denied — please allow access");
        assert_eq!(experience.scene().ignite_button, IgniteButton::Hidden);
    }

    #[test]
    fn test_repeated_denial_offers_touch() {
        let t0 = Instant::now();
        let mut experience = experience_with(vec![
            Err(MicrophoneError::PermissionDenied),
            Err(MicrophoneError::PermissionDenied),
        ]);
        experience.ignite(t0);
        experience.update(t0);
        assert!(experience.retry(at(t0, 100)));
        experience.update(at(t0, 100));

        assert_eq!(experience.mic_denied_count(), 2);
        assert_eq!(experience.scene().error.as_ref().unwrap().action, ErrorAction::UseTouch);

        assert!(experience.use_touch(at(t0, 200)));
        assert!(experience.scene().error.is_none());
        run_frames(&mut experience, t0, 200, 3200);
        assert_eq!(experience.state(), InteractionState::Ready);
        assert!(experience.touch_mode());
        assert!(experience.scene().touch_hint);
    }

    #[test]
    fn test_other_errors_never_offer_touch() {
        let t0 = Instant::now();
        let mut experience = experience_with(vec![
            Err(MicrophoneError::DeviceNotFound),
            Err(MicrophoneError::DeviceNotFound),
        ]);
        experience.ignite(t0);
        experience.update(t0);
        experience.retry(t0);
        experience.update(t0);
        assert_eq!(experience.mic_denied_count(), 0);
        let prompt = experience.scene().error.clone().unwrap();
        assert_eq!(prompt.action, ErrorAction::Retry);
        assert_eq!(prompt.message, "No microphone found on this device");
    }

    #[test]
    fn test_denial_count_survives_reset() {
        let t0 = Instant::now();
        let mut experience = experience_with(vec![
            Err(MicrophoneError::PermissionDenied),
            Err(MicrophoneError::PermissionDenied),
        ]);
        experience.ignite(t0);
        experience.update(t0);
        experience.reset();
        experience.ignite(t0);
        experience.update(t0);
        assert_eq!(experience.scene().error.as_ref().unwrap().action, ErrorAction::UseTouch);
    }

    fn touch_ready(t0: Instant) -> Experience {
        let mut experience = experience_with(vec![]);
        assert!(experience.ignite_touch(t0));
        run_frames(&mut experience, t0, 0, 3000);
        assert_eq!(experience.state(), InteractionState::Ready);
        experience.drain_events();
        experience
    }

    #[test]
    fn test_touch_same_side_twice_counts_once() {
        let t0 = Instant::now();
        let mut experience = touch_ready(t0);

        assert!(experience.touch_flame(Side::Left, at(t0, 3100)));
        assert!(!experience.touch_flame(Side::Left, at(t0, 3200)));
        assert_eq!(experience.flames_extinguished(), 1);
        assert!(experience.scene().candle(Side::Left).shrinking);

        run_frames(&mut experience, t0, 3100, 4000);
        assert!(experience.scene().candle(Side::Left).blown_out);
        assert!(experience.scene().candle(Side::Right).lit);
        assert!(!experience.is_blown_out());
        assert_eq!(count_blowouts(&experience.drain_events()), 0);
    }

    #[test]
    fn test_touch_both_sides_blows_out_once() {
        let t0 = Instant::now();
        let mut experience = touch_ready(t0);

        experience.touch_flame(Side::Left, at(t0, 3100));
        experience.update(at(t0, 3200));
        experience.touch_flame(Side::Right, at(t0, 3300));

        experience.update(at(t0, 3499));
        assert!(!experience.is_blown_out());

        run_frames(&mut experience, t0, 3500, 5000);
        assert!(experience.is_blown_out());
        assert_eq!(experience.state(), InteractionState::BlownOut);
        assert!(!experience.scene().touch_hint);
        assert_eq!(count_blowouts(&experience.drain_events()), 1);
        assert!(!experience.touch_flame(Side::Left, at(t0, 5100)));
    }

    #[test]
    fn test_touch_needs_lit_candle_and_touch_mode() {
        let t0 = Instant::now();
        let mut experience = experience_with(vec![]);
        experience.ignite_touch(t0);
        run_frames(&mut experience, t0, 0, 1500);
        // Right is lit but the candles are not ready yet.
        assert!(!experience.touch_flame(Side::Right, at(t0, 1500)));

        let (mut mic_experience, _) = ready_with_ambient(20.0, t0);
        assert!(!mic_experience.touch_flame(Side::Right, at(t0, 3100)));
    }

    #[test]
    fn test_touch_mode_ignores_base_press() {
        let t0 = Instant::now();
        let mut experience = touch_ready(t0);
        assert!(!experience.press_base(at(t0, 3100)));
    }

    #[test]
    fn test_replay_button_appears_when_enabled() {
        let t0 = Instant::now();
        let config = ExperienceConfig {
            show_replay_button: true,
            ..Default::default()
        };
        let mut experience = experience_with_config(config, vec![]);
        experience.ignite_touch(t0);
        run_frames(&mut experience, t0, 0, 3000);
        experience.touch_flame(Side::Left, at(t0, 3000));
        experience.touch_flame(Side::Right, at(t0, 3000));
        run_frames(&mut experience, t0, 3000, 3500);
        assert!(experience.is_blown_out());
        assert!(!experience.scene().replay_visible);

        experience.update(at(t0, 3500 + 15000));
        assert!(experience.scene().replay_visible);
    }

    #[test]
    fn test_replay_button_stays_hidden_by_default() {
        let t0 = Instant::now();
        let mut experience = touch_ready(t0);
        experience.touch_flame(Side::Left, at(t0, 3000));
        experience.touch_flame(Side::Right, at(t0, 3000));
        run_frames(&mut experience, t0, 3000, 20000);
        assert!(experience.is_blown_out());
        assert!(!experience.scene().replay_visible);
    }
}
