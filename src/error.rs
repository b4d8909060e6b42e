use thiserror::Error;

use crate::board::Tile;

/// Validates board dimensions before they become a [`crate::Board`], following the same
/// `TryFrom`-based shadow-struct validation pattern used for `GridConfig`.
pub(crate) struct BoardDimensionsValidator {
    pub width: usize,
    pub height: usize,
    pub mine_count: usize,
}

impl TryFrom<BoardDimensionsValidator> for (usize, usize, usize) {
    type Error = EngineError;

    fn try_from(shadow: BoardDimensionsValidator) -> Result<Self, Self::Error> {
        let BoardDimensionsValidator {
            width,
            height,
            mine_count,
        } = shadow;
        if width == 0 || height == 0 || mine_count > width * height {
            return Err(EngineError::DegenerateBoard);
        }
        Ok((width, height, mine_count))
    }
}

/// Caller-contract violations surfaced at the [`crate::Board`] boundary. Deductive dead-ends are
/// not errors; they surface as `suggest_next` returning an empty suggestion set.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("tile ({}, {}) is out of bounds for this board", .tile.x, .tile.y)]
    OutOfBounds { tile: Tile },

    #[error("tile ({}, {}) was already revealed", .tile.x, .tile.y)]
    AlreadyRevealed { tile: Tile },

    #[error("adjacent mine count {number} is outside the valid range [0, 8]")]
    NumberOutOfRange { number: u8 },

    #[error("degenerate board: width and height must be positive and mine_count must not exceed width * height")]
    DegenerateBoard,
}
