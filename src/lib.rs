//! Constraint-propagation engine for a Minesweeper solver.

mod board;
mod chain;
mod chain_map;
mod error;
mod rng;

use board::TileGraph;
use chain_map::ChainMap;
use log::info;

pub use board::{Grid, Tile};
pub use error::EngineError;

pub struct Board {
    graph: TileGraph,
    chain_map: ChainMap,
}

impl Board {
    pub fn new(width: usize, height: usize, mine_count: usize) -> Result<Self, EngineError> {
        let (width, height, mine_count) =
            <(usize, usize, usize)>::try_from(error::BoardDimensionsValidator {
                width,
                height,
                mine_count,
            })?;
        let graph = TileGraph::new(Grid::new(width, height));
        let chain_map = ChainMap::new(&graph, mine_count);
        info!("board {width}x{height} created with {mine_count} mines");
        Ok(Self { graph, chain_map })
    }

    /// Like [`Board::new`], but seeds the suggestion RNG deterministically from `seed`.
    pub fn with_seed(
        width: usize,
        height: usize,
        mine_count: usize,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let (width, height, mine_count) =
            <(usize, usize, usize)>::try_from(error::BoardDimensionsValidator {
                width,
                height,
                mine_count,
            })?;
        let graph = TileGraph::new(Grid::new(width, height));
        let chain_map = ChainMap::seeded(&graph, mine_count, seed);
        info!("board {width}x{height} created with {mine_count} mines (seed {seed})");
        Ok(Self { graph, chain_map })
    }

    pub fn tile_at(&self, x: usize, y: usize) -> Option<Tile> {
        self.graph.grid().tile_at(x, y)
    }

    pub fn neighbors(&self, tile: Tile) -> impl Iterator<Item = Tile> + '_ {
        self.graph.grid().neighbors(tile).into_iter()
    }

    pub fn is_revealed(&self, tile: Tile) -> bool {
        self.graph.is_revealed(tile)
    }

    pub fn number(&self, tile: Tile) -> Option<u8> {
        self.graph.number(tile)
    }

    /// Validates the whole batch against the caller contract before applying any of it; a
    /// rejected batch leaves the board untouched.
    pub fn reveal(&mut self, pairs: &[(Tile, u8)]) -> Result<Vec<Tile>, EngineError> {
        let mut seen = std::collections::HashSet::with_capacity(pairs.len());
        for &(tile, number) in pairs {
            if !self.graph.grid().contains(tile) {
                return Err(EngineError::OutOfBounds { tile });
            }
            if self.graph.is_revealed(tile) || !seen.insert(tile) {
                return Err(EngineError::AlreadyRevealed { tile });
            }
            if number > 8 {
                return Err(EngineError::NumberOutOfRange { number });
            }
        }

        Ok(self.chain_map.reveal(&mut self.graph, pairs))
    }
}
