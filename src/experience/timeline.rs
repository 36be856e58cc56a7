use log::warn;
use std::time::{Duration, Instant};

use super::touch::Side;

/// A scripted moment in the experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    LightCandle(Side),
    StartLoopCue,
    /// Calibration ends and the candles accept input
    FinishIgnition,
    /// A touched flame has finished shrinking
    FlameOut(Side),
    ShowReplay,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledBeat {
    due: Instant,
    seq: u64,
    beat: Beat,
}

/// Pending beats for the current session.
///
/// Beats only fire through `drain_due`, and `cancel_all` drops everything
/// still pending, so nothing scheduled before a reset can reach the next
/// session.
#[derive(Debug, Default)]
pub struct Timeline {
    pending: Vec<ScheduledBeat>,
    next_seq: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Instant, beat: Beat) {
        self.pending.push(ScheduledBeat {
            due,
            seq: self.next_seq,
            beat,
        });
        self.next_seq += 1;
    }

    /// A delay too large to represent is logged and the beat dropped.
    pub fn schedule_after(&mut self, now: Instant, delay: Duration, beat: Beat) {
        match now.checked_add(delay) {
            Some(due) => self.schedule(due, beat),
            None => warn!("Dropping {:?}: delay {:?} is out of range", beat, delay),
        }
    }

    /// Remove and return every beat due at `now`, earliest first. Beats due
    /// at the same instant keep their scheduling order.
    pub fn drain_due(&mut self, now: Instant) -> Vec<Beat> {
        let mut due: Vec<ScheduledBeat> = Vec::new();
        self.pending.retain(|scheduled| {
            if scheduled.due <= now {
                due.push(*scheduled);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|scheduled| (scheduled.due, scheduled.seq));
        due.into_iter().map(|scheduled| scheduled.beat).collect()
    }

    /// Returns how many beats were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, beat: Beat) -> bool {
        self.pending.iter().any(|scheduled| scheduled.beat == beat)
    }
}
