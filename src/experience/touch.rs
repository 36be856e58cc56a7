/// One of the two candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

const FLAME_COUNT: u8 = 2;

/// Touch-only extinguishing for when the microphone is off limits.
///
/// A side counts the first time it is touched; touching it again while its
/// flame is still shrinking does nothing.
#[derive(Debug, Default, Clone)]
pub struct TouchFallback {
    touched: [bool; 2],
    flames_extinguished: u8,
}

impl TouchFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true on the first touch of `side`; the caller then starts the
    /// shrink delay for that flame.
    pub fn touch(&mut self, side: Side) -> bool {
        let touched = &mut self.touched[side.index()];
        if *touched {
            return false;
        }
        *touched = true;
        self.flames_extinguished = (self.flames_extinguished + 1).min(FLAME_COUNT);
        true
    }

    /// The shrink delay for `side` has passed. Returns true once every flame
    /// has been touched.
    pub fn complete_shrink(&mut self, _side: Side) -> bool {
        self.flames_extinguished >= FLAME_COUNT
    }

    pub fn flames_extinguished(&self) -> u8 {
        self.flames_extinguished
    }
}
