//! Everything the renderer needs to draw one frame of the experience.

use super::touch::Side;

pub const MESSAGE_MAKE_A_WISH: &str = "Make A Wish";
pub const MESSAGE_BREATHE_OUT: &str = "Breathe Out";

/// How far the flames lean under breath.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlameBend {
    pub scale: f32,
    pub skew_degrees: f32,
    pub offset_px: f32,
}

impl FlameBend {
    pub const REST: FlameBend = FlameBend {
        scale: 1.0,
        skew_degrees: 0.0,
        offset_px: 0.0,
    };

    pub fn from_intensity(intensity: f32) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        Self {
            scale: (1.0 - intensity * 0.7).max(0.3),
            skew_degrees: intensity * -60.0,
            offset_px: intensity * -25.0,
        }
    }
}

impl Default for FlameBend {
    fn default() -> Self {
        Self::REST
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandleVisual {
    pub lit: bool,
    /// Touched and shrinking toward blown out
    pub shrinking: bool,
    pub blown_out: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageStyle {
    #[default]
    Hidden,
    Visible,
    Reveal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub style: MessageStyle,
}

impl Message {
    pub fn visible(text: &str) -> Self {
        Self {
            text: text.to_string(),
            style: MessageStyle::Visible,
        }
    }

    pub fn reveal(text: &str) -> Self {
        Self {
            text: text.to_string(),
            style: MessageStyle::Reveal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IgniteButton {
    #[default]
    Visible,
    Lighting,
    Hidden,
}

/// What the error prompt offers next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    Retry,
    UseTouch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPrompt {
    pub message: String,
    pub action: ErrorAction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub candles: [CandleVisual; 2],
    pub flame: FlameBend,
    pub ready: bool,
    pub touch_mode: bool,
    pub match_animating: bool,
    pub message: Message,
    pub volume_hint: bool,
    pub touch_hint: bool,
    pub replay_visible: bool,
    pub ignite_button: IgniteButton,
    pub error: Option<ErrorPrompt>,
}

impl Scene {
    pub fn candle(&self, side: Side) -> &CandleVisual {
        &self.candles[side.index()]
    }

    pub fn candle_mut(&mut self, side: Side) -> &mut CandleVisual {
        &mut self.candles[side.index()]
    }

    pub fn lit_count(&self) -> usize {
        self.candles.iter().filter(|c| c.lit).count()
    }
}
