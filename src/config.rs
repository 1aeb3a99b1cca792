use crate::error::GameError;

pub const DEFAULT_WIDTH: usize = 10;
pub const DEFAULT_HEIGHT: usize = 20;
pub const DEFAULT_COLORS: u8 = 7;
/// Largest accepted width or height.
pub const MAX_SIDE: usize = 255;

/// Board dimensions and palette size, fixed for the lifetime of a game.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Palette size including the empty color `0`.
    pub max_colors: u8,
}

impl GameConfig {
    pub fn new(width: usize, height: usize, max_colors: u8) -> Result<Self, GameError> {
        let config = Self {
            width,
            height,
            max_colors,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if !(1..=MAX_SIDE).contains(&self.width) || !(1..=MAX_SIDE).contains(&self.height) {
            return Err(GameError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_colors <= 1 {
            return Err(GameError::TooFewColors(self.max_colors));
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            max_colors: DEFAULT_COLORS,
        }
    }
}
