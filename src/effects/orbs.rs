use rand::Rng;
use std::time::{Duration, Instant};

/// Orbs are removed this long after release, whatever their own timing.
pub const ORB_LIFETIME: Duration = Duration::from_secs(9);

const ORB_COLORS: [[u8; 4]; 3] = [
    [64, 224, 208, 153],
    [255, 223, 112, 153],
    [255, 255, 255, 102],
];

/// A glowing orb drifting up the screen after the reveal.
#[derive(Debug, Clone, PartialEq)]
pub struct Orb {
    /// Horizontal start as a fraction of the screen width
    pub x: f32,
    pub color: [u8; 4],
    pub size_px: f32,
    pub duration: Duration,
    pub delay: Duration,
    /// Horizontal drift over the whole rise
    pub drift_px: f32,
    pub released_at: Instant,
}

/// Where an orb is right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbFrame {
    /// 0 at the bottom edge, 1 once it has left through the top
    pub rise: f32,
    pub x: f32,
    pub drift_px: f32,
    pub size_px: f32,
    pub color: [u8; 4],
    pub opacity: f32,
}

impl Orb {
    pub fn random<R: Rng>(rng: &mut R, now: Instant) -> Self {
        Self {
            x: rng.gen_range(0.0..1.0),
            color: ORB_COLORS[rng.gen_range(0..ORB_COLORS.len())],
            size_px: rng.gen_range(5.0..20.0),
            duration: Duration::from_secs_f32(rng.gen_range(4.0..8.0)),
            delay: Duration::from_secs_f32(rng.gen_range(0.0..2.0)),
            drift_px: (rng.gen::<f32>() - 0.5) * 50.0,
            released_at: now,
        }
    }

    /// `None` while waiting out its delay or after finishing the rise.
    pub fn frame(&self, now: Instant) -> Option<OrbFrame> {
        let age = now.saturating_duration_since(self.released_at);
        if age < self.delay {
            return None;
        }
        let progress = (age - self.delay).as_secs_f32() / self.duration.as_secs_f32();
        if progress >= 1.0 {
            return None;
        }

        // Fade in over the first fifth, out over the last fifth.
        let opacity = (progress / 0.2).min(1.0).min((1.0 - progress) / 0.2);

        Some(OrbFrame {
            rise: progress,
            x: self.x,
            drift_px: self.drift_px * progress,
            size_px: self.size_px,
            color: self.color,
            opacity,
        })
    }
}

#[derive(Debug, Default)]
pub struct OrbField {
    orbs: Vec<Orb>,
}

impl OrbField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release<R: Rng>(&mut self, count: usize, now: Instant, rng: &mut R) {
        self.orbs.extend((0..count).map(|_| Orb::random(rng, now)));
    }

    /// Drop orbs past their lifetime.
    pub fn update(&mut self, now: Instant) {
        self.orbs
            .retain(|orb| now.saturating_duration_since(orb.released_at) < ORB_LIFETIME);
    }

    pub fn clear(&mut self) {
        self.orbs.clear();
    }

    pub fn len(&self) -> usize {
        self.orbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orbs.is_empty()
    }

    pub fn frames(&self, now: Instant) -> impl Iterator<Item = OrbFrame> + '_ {
        self.orbs.iter().filter_map(move |orb| orb.frame(now))
    }
}
