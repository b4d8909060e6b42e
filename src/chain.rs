use std::collections::BTreeSet;

use itertools::Itertools;

use crate::board::{Tile, TileGraph};

pub(crate) type ChainId = u64;

/// Chains are distinct by identity, never by content; this hands out fresh ids.
#[derive(Debug, Default)]
pub(crate) struct ChainIdGen(ChainId);

impl ChainIdGen {
    pub(crate) fn next(&mut self) -> ChainId {
        let id = self.0;
        self.0 += 1;
        id
    }
}

/// One consistent hypothesis: which hidden tiles are mines, which are safe.
#[derive(Debug, Clone)]
pub(crate) struct Chain {
    id: ChainId,
    mine_budget: usize,
    mines: BTreeSet<Tile>,
    safe: BTreeSet<Tile>,
}

pub(crate) enum Refinement {
    /// Contradicts the revealed tile; caller must discard the chain.
    Impossible,
    Applied {
        applied_mines: BTreeSet<Tile>,
        applied_safes: BTreeSet<Tile>,
        siblings: Vec<Chain>,
    },
}

impl Chain {
    pub(crate) fn new(id: ChainId, mine_budget: usize) -> Self {
        Self {
            id,
            mine_budget,
            mines: BTreeSet::new(),
            safe: BTreeSet::new(),
        }
    }

    pub(crate) fn id(&self) -> ChainId {
        self.id
    }

    pub(crate) fn mines(&self) -> &BTreeSet<Tile> {
        &self.mines
    }

    pub(crate) fn safe(&self) -> &BTreeSet<Tile> {
        &self.safe
    }

    pub(crate) fn drop_safe(&mut self, tile: Tile) {
        self.safe.remove(&tile);
    }

    /// Mutates in place with the first consistent extension found; every other becomes a sibling.
    pub(crate) fn refine_against(
        &mut self,
        graph: &TileGraph,
        tile: Tile,
        number: u8,
        ids: &mut ChainIdGen,
    ) -> Refinement {
        let mut known_mines = 0usize;
        let mut hiddens: Vec<Tile> = Vec::new();

        for neighbor in graph.grid().neighbors(tile) {
            if self.mines.contains(&neighbor) {
                known_mines += 1;
            } else if self.safe.contains(&neighbor) || graph.is_revealed(neighbor) {
                // known safe: no assertion needed
            } else {
                hiddens.push(neighbor);
            }
        }

        let remaining = number as i64 - known_mines as i64;
        if remaining < 0 || remaining as usize > hiddens.len() {
            return Refinement::Impossible;
        }
        let remaining = remaining as usize;

        if remaining + self.mines.len() > self.mine_budget {
            return Refinement::Impossible;
        }

        // `hiddens.combinations(0)` is handled explicitly rather than relying on the library's
        // zero-size-combination behavior: there is exactly one such subset, the empty one.
        let combos: Vec<Vec<Tile>> = if remaining == 0 {
            vec![Vec::new()]
        } else {
            hiddens.iter().copied().combinations(remaining).collect()
        };

        let mut combos = combos.into_iter();
        let first = combos
            .next()
            .expect("at least one combination always exists once the bounds above pass");

        let applied_mines: BTreeSet<Tile> = first.into_iter().collect();
        let applied_safes: BTreeSet<Tile> = hiddens
            .iter()
            .copied()
            .filter(|t| !applied_mines.contains(t))
            .collect();

        let mut siblings = Vec::new();
        for combo in combos {
            let sibling_mines: BTreeSet<Tile> = combo.into_iter().collect();
            let sibling_safes: BTreeSet<Tile> = hiddens
                .iter()
                .copied()
                .filter(|t| !sibling_mines.contains(t))
                .collect();

            let mut sibling = self.clone();
            sibling.id = ids.next();
            sibling.mines.extend(sibling_mines);
            sibling.safe.extend(sibling_safes);
            siblings.push(sibling);
        }

        self.mines.extend(applied_mines.iter().copied());
        self.safe.extend(applied_safes.iter().copied());

        Refinement::Applied {
            applied_mines,
            applied_safes,
            siblings,
        }
    }
}
