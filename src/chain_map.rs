use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, trace};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::board::{Tile, TileGraph};
use crate::chain::{Chain, ChainId, ChainIdGen, Refinement};
use crate::rng::pick_uniform;

/// Owns the live set of chains and the inverted per-tile indices, and exposes the top-level
/// `reveal` / `suggest_next` operations.
pub(crate) struct ChainMap {
    next_id: ChainIdGen,
    chains: BTreeMap<ChainId, Chain>,
    mine_index: HashMap<Tile, BTreeSet<ChainId>>,
    safe_index: HashMap<Tile, BTreeSet<ChainId>>,
    mine_count: HashMap<Tile, usize>,
    unused: BTreeSet<Tile>,
    total_mine_assertions: usize,
    ordered_counts: BTreeMap<usize, BTreeSet<Tile>>,
    prev_counts: HashMap<Tile, usize>,
    pending_update: BTreeSet<Tile>,
    global_mine_count: usize,
    rng: ChaCha20Rng,
}

impl ChainMap {
    pub(crate) fn new(graph: &TileGraph, global_mine_count: usize) -> Self {
        Self::with_rng(graph, global_mine_count, ChaCha20Rng::from_entropy())
    }

    pub(crate) fn seeded(graph: &TileGraph, global_mine_count: usize, seed: u64) -> Self {
        Self::with_rng(graph, global_mine_count, ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(graph: &TileGraph, global_mine_count: usize, rng: ChaCha20Rng) -> Self {
        let mut mine_index = HashMap::new();
        let mut safe_index = HashMap::new();
        let mut mine_count = HashMap::new();
        let mut unused = BTreeSet::new();

        for tile in graph.grid().iter_tiles() {
            mine_index.insert(tile, BTreeSet::new());
            safe_index.insert(tile, BTreeSet::new());
            mine_count.insert(tile, 0);
            unused.insert(tile);
        }

        let mut next_id = ChainIdGen::default();
        let root_id = next_id.next();
        let mut chains = BTreeMap::new();
        chains.insert(root_id, Chain::new(root_id, global_mine_count));

        Self {
            next_id,
            chains,
            mine_index,
            safe_index,
            mine_count,
            unused,
            total_mine_assertions: 0,
            ordered_counts: BTreeMap::new(),
            prev_counts: HashMap::new(),
            pending_update: BTreeSet::new(),
            global_mine_count,
            rng,
        }
    }

    pub(crate) fn chain_count(&self) -> usize {
        self.chains.len()
    }

    #[cfg(test)]
    pub(crate) fn ordered_counts(&self) -> &BTreeMap<usize, BTreeSet<Tile>> {
        &self.ordered_counts
    }

    #[cfg(test)]
    pub(crate) fn unused(&self) -> &BTreeSet<Tile> {
        &self.unused
    }

    #[cfg(test)]
    pub(crate) fn total_mine_assertions(&self) -> usize {
        self.total_mine_assertions
    }

    fn register_mine(&mut self, chain_id: ChainId, tile: Tile) {
        self.mine_index.entry(tile).or_default().insert(chain_id);
        self.total_mine_assertions += 1;
        self.unused.remove(&tile);
        if let Some(count) = self.mine_count.get_mut(&tile) {
            *count += 1;
            self.pending_update.insert(tile);
        }
    }

    fn register_safe(&mut self, chain_id: ChainId, tile: Tile) {
        self.safe_index.entry(tile).or_default().insert(chain_id);
        self.unused.remove(&tile);
        if self.mine_count.contains_key(&tile) {
            self.pending_update.insert(tile);
        }
    }

    fn remove_from_ordered_counts(&mut self, tile: Tile) {
        if let Some(prev) = self.prev_counts.remove(&tile) {
            if let Some(bucket) = self.ordered_counts.get_mut(&prev) {
                bucket.remove(&tile);
                if bucket.is_empty() {
                    self.ordered_counts.remove(&prev);
                }
            }
        }
    }

    fn refresh_ordered_counts(&mut self, tile: Tile) {
        self.remove_from_ordered_counts(tile);
        let Some(&count) = self.mine_count.get(&tile) else {
            return;
        };
        self.ordered_counts.entry(count).or_default().insert(tile);
        self.prev_counts.insert(tile, count);
    }

    fn evict_chain(&mut self, chain_id: ChainId) {
        let Some(chain) = self.chains.remove(&chain_id) else {
            return;
        };
        self.total_mine_assertions -= chain.mines().len();
        for &tile in chain.mines() {
            if let Some(set) = self.mine_index.get_mut(&tile) {
                set.remove(&chain_id);
            }
            if let Some(count) = self.mine_count.get_mut(&tile) {
                *count -= 1;
                self.pending_update.insert(tile);
            }
        }
        for &tile in chain.safe() {
            if let Some(set) = self.safe_index.get_mut(&tile) {
                set.remove(&chain_id);
            }
        }
    }

    /// Assumes each tile already passed caller-contract validation; that's [`crate::Board`]'s job.
    pub(crate) fn reveal(&mut self, graph: &mut TileGraph, pairs: &[(Tile, u8)]) -> Vec<Tile> {
        for &(tile, number) in pairs {
            graph.reveal(tile, number);
            self.unused.remove(&tile);

            let mut to_evict: BTreeSet<ChainId> =
                self.mine_index.get(&tile).cloned().unwrap_or_default();

            if let Some(chain_ids) = self.safe_index.get(&tile).cloned() {
                for chain_id in chain_ids {
                    if let Some(chain) = self.chains.get_mut(&chain_id) {
                        chain.drop_safe(tile);
                    }
                }
            }

            self.mine_count.remove(&tile);
            self.remove_from_ordered_counts(tile);
            self.pending_update.remove(&tile);

            let mut new_chains = Vec::new();
            let live_ids: Vec<ChainId> = self.chains.keys().copied().collect();
            for chain_id in live_ids {
                let refinement = {
                    let chain = self
                        .chains
                        .get_mut(&chain_id)
                        .expect("chain id collected from self.chains moments ago");
                    chain.refine_against(graph, tile, number, &mut self.next_id)
                };
                match refinement {
                    Refinement::Impossible => {
                        to_evict.insert(chain_id);
                    }
                    Refinement::Applied {
                        applied_mines,
                        applied_safes,
                        siblings,
                    } => {
                        for mine_tile in applied_mines {
                            self.register_mine(chain_id, mine_tile);
                        }
                        for safe_tile in applied_safes {
                            self.register_safe(chain_id, safe_tile);
                        }
                        new_chains.extend(siblings);
                    }
                }
            }

            for sibling in new_chains {
                let sibling_id = sibling.id();
                let mines: Vec<Tile> = sibling.mines().iter().copied().collect();
                let safes: Vec<Tile> = sibling.safe().iter().copied().collect();
                self.chains.insert(sibling_id, sibling);
                for mine_tile in mines {
                    self.register_mine(sibling_id, mine_tile);
                }
                for safe_tile in safes {
                    self.register_safe(sibling_id, safe_tile);
                }
            }

            if let Some(set) = self.safe_index.get_mut(&tile) {
                set.clear();
            }

            let evicted = to_evict.len();
            for chain_id in to_evict {
                self.evict_chain(chain_id);
            }
            trace!(
                "reveal({:?}={}): {} chains evicted, {} live",
                tile,
                number,
                evicted,
                self.chains.len()
            );
        }

        let pending: Vec<Tile> = self.pending_update.drain().collect();
        for tile in pending {
            self.refresh_ordered_counts(tile);
        }

        let suggestion = self.suggest_next();
        debug!(
            "reveal batch of {} tiles done: {} chains live, suggesting {} tiles",
            pairs.len(),
            self.chains.len(),
            suggestion.len()
        );
        suggestion
    }

    fn suggest_next(&mut self) -> Vec<Tile> {
        let Some((k_min, tiles_min)) = self
            .ordered_counts
            .iter()
            .next()
            .map(|(&k, tiles)| (k, tiles.iter().copied().collect::<Vec<Tile>>()))
        else {
            return Vec::new();
        };

        if k_min == 0 {
            return tiles_min;
        }

        let chain_count = self.chains.len();
        let used_mines = if chain_count == 0 {
            0.0
        } else {
            self.total_mine_assertions as f64 / chain_count as f64
        };
        let unused_mines = self.global_mine_count as f64 - used_mines;

        if unused_mines == 0.0 && !self.unused.is_empty() {
            return self.unused.iter().copied().collect();
        }

        let unused_prob = if self.unused.is_empty() {
            1.0
        } else {
            unused_mines / self.unused.len() as f64
        };

        if k_min == chain_count && unused_prob == 1.0 {
            return Vec::new();
        }

        let frontier_prob = k_min as f64 / chain_count as f64;

        if frontier_prob <= unused_prob {
            vec![pick_uniform(&mut self.rng, &tiles_min)]
        } else {
            let unused: Vec<Tile> = self.unused.iter().copied().collect();
            vec![pick_uniform(&mut self.rng, &unused)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Grid;

    fn seeded_chain_map(width: usize, height: usize, mines: usize) -> (TileGraph, ChainMap) {
        let grid = Grid::new(width, height);
        let graph = TileGraph::new(grid);
        let map = ChainMap::seeded(&graph, mines, 42);
        (graph, map)
    }

    #[test]
    fn two_by_two_three_mines_single_chain_remains() {
        let (mut graph, mut map) = seeded_chain_map(2, 2, 3);
        let suggestion = map.reveal(&mut graph, &[(Tile::new(0, 0), 3)]);

        assert_eq!(map.chain_count(), 1);
        for tile in [Tile::new(1, 0), Tile::new(0, 1), Tile::new(1, 1)] {
            assert_eq!(map.mine_count[&tile], 1);
        }
        assert!(map.unused().is_empty());
        assert!(suggestion.is_empty());
    }

    fn tiles(coords: &[(usize, usize)]) -> BTreeSet<Tile> {
        coords.iter().map(|&(x, y)| Tile::new(x, y)).collect()
    }

    #[test]
    fn five_by_five_ten_mines_sixteen_chains() {
        let (mut graph, mut map) = seeded_chain_map(5, 5, 10);
        let reveals = [
            (Tile::new(1, 1), 2),
            (Tile::new(2, 1), 1),
            (Tile::new(3, 1), 1),
            (Tile::new(1, 2), 1),
            (Tile::new(2, 2), 0),
            (Tile::new(3, 2), 1),
            (Tile::new(1, 3), 3),
            (Tile::new(2, 3), 1),
            (Tile::new(3, 3), 2),
        ];
        let suggestion = map.reveal(&mut graph, &reveals);

        assert_eq!(map.chain_count(), 16);

        let expected: BTreeMap<usize, BTreeSet<Tile>> = [
            (0, tiles(&[(0, 1), (3, 4)])),
            (2, tiles(&[(3, 0), (4, 1)])),
            (4, tiles(&[(2, 0), (4, 0), (4, 2)])),
            (7, tiles(&[(0, 3), (1, 4)])),
            (9, tiles(&[(0, 0), (0, 2), (2, 4), (4, 4)])),
            (10, tiles(&[(1, 0), (4, 3)])),
            (16, tiles(&[(0, 4)])),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.ordered_counts(), &expected);

        let suggestion_set: BTreeSet<Tile> = suggestion.into_iter().collect();
        assert_eq!(suggestion_set, tiles(&[(0, 1), (3, 4)]));

        let suggestion = map.reveal(
            &mut graph,
            &[(Tile::new(0, 1), 2), (Tile::new(3, 4), 1)],
        );
        assert_eq!(map.chain_count(), 4);

        let expected_next: BTreeMap<usize, BTreeSet<Tile>> = [
            (
                0,
                tiles(&[(2, 0), (3, 0), (4, 0), (4, 1), (4, 3)]),
            ),
            (
                2,
                tiles(&[(0, 0), (0, 2), (0, 3), (1, 4), (2, 4), (4, 4)]),
            ),
            (4, tiles(&[(1, 0), (4, 2), (0, 4)])),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.ordered_counts(), &expected_next);

        let suggestion_set: BTreeSet<Tile> = suggestion.into_iter().collect();
        assert_eq!(
            suggestion_set,
            tiles(&[(2, 0), (3, 0), (4, 0), (4, 1), (4, 3)])
        );
    }

    #[test]
    fn four_by_two_one_mine_too_many_splits_then_narrows() {
        let (mut graph, mut map) = seeded_chain_map(4, 2, 1);
        let suggestion = map.reveal(&mut graph, &[(Tile::new(1, 0), 1)]);
        assert_eq!(map.chain_count(), 4);
        assert!(suggestion.is_empty());

        let suggestion = map.reveal(&mut graph, &[(Tile::new(2, 0), 1)]);
        assert_eq!(map.chain_count(), 2);
        assert!(suggestion.is_empty());
    }

    #[test]
    fn all_unused_returned_when_single_mine_already_pinned() {
        let (mut graph, mut map) = seeded_chain_map(5, 5, 1);
        let suggestion = map.reveal(&mut graph, &[(Tile::new(1, 1), 1)]);
        // 25 - 9 = 16 unused tiles; with only 1 mine and it fully accounted for by the frontier
        // bucket (1 chain asserting exactly 1 mine among the 8 neighbors), the interior is safe.
        assert_eq!(suggestion.len(), 16);
        assert_eq!(map.unused().len(), 16);
        let suggestion_set: BTreeSet<Tile> = suggestion.into_iter().collect();
        assert_eq!(suggestion_set, map.unused().clone());
    }

    #[test]
    fn frontier_tile_returned_when_tied_with_interior_probability() {
        let (mut graph, mut map) = seeded_chain_map(3, 4, 2);
        let suggestion = map.reveal(&mut graph, &[(Tile::new(1, 1), 1)]);
        // frontier probability 1/8 is lower than the interior's 1/3, so the frontier tile wins
        // and it is not one of the 3 untouched interior tiles.
        assert_eq!(suggestion.len(), 1);
        assert!(!map.unused().contains(&suggestion[0]));
        assert_eq!(map.unused().len(), 3);
    }
}
