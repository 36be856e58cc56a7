pub mod cues;
pub mod orbs;

pub use cues::CuePlayer;
pub use orbs::{Orb, OrbField, OrbFrame};
