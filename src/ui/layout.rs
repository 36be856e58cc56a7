use glam::Vec2;

use crate::experience::Side;

/// Axis-aligned box in egui points, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn to_rect(self) -> egui::Rect {
        egui::Rect::from_min_max(egui::pos2(self.min.x, self.min.y), egui::pos2(self.max.x, self.max.y))
    }
}

/// Where the cake sits for a given screen size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleLayout {
    /// Plate under the candles
    pub plate: Bounds,
    /// Press-and-hold target: both candles and the plate
    pub base: Bounds,
    pub candles: [Bounds; 2],
    /// Width and full height of an upright flame
    pub flame_size: Vec2,
    pub message_pos: Vec2,
    pub hint_pos: Vec2,
}

impl CandleLayout {
    pub fn new(screen: Vec2) -> Self {
        let unit = (screen.x.min(screen.y) / 10.0).max(8.0);
        let center = Vec2::new(screen.x * 0.5, screen.y * 0.55);

        let candle_size = Vec2::new(unit * 1.2, unit * 3.0);
        let gap = unit * 0.8;
        let candle_offset = Vec2::new((gap + candle_size.x) * 0.5, 0.0);
        let candles = [
            Bounds::from_center_size(center - candle_offset, candle_size),
            Bounds::from_center_size(center + candle_offset, candle_size),
        ];

        let plate = Bounds::from_center_size(
            center + Vec2::new(0.0, candle_size.y * 0.5 + unit * 0.25),
            Vec2::new(candle_size.x * 2.0 + gap + unit * 2.0, unit * 0.5),
        );

        Self {
            plate,
            base: candles[0].union(&candles[1]).union(&plate),
            candles,
            flame_size: Vec2::new(unit * 0.7, unit * 1.4),
            message_pos: Vec2::new(center.x, screen.y * 0.16),
            hint_pos: Vec2::new(center.x, screen.y * 0.26),
        }
    }

    pub fn candle(&self, side: Side) -> Bounds {
        self.candles[side.index()]
    }

    /// Bottom of the flame, just above the wick.
    pub fn flame_anchor(&self, side: Side) -> Vec2 {
        let candle = self.candle(side);
        Vec2::new(candle.center().x, candle.min.y - self.flame_size.y * 0.1)
    }

    /// The candle a touch at `point` lands on, flame included.
    pub fn flame_at(&self, point: Vec2) -> Option<Side> {
        Side::BOTH.into_iter().find(|&side| {
            let candle = self.candle(side);
            let target = Bounds {
                min: Vec2::new(candle.min.x, candle.min.y - self.flame_size.y * 1.2),
                max: candle.max,
            };
            target.contains(point)
        })
    }
}
