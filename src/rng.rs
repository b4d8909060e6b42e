use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::board::Tile;

/// Picks one element of `tiles` uniformly at random using `rng`.
///
/// Panics if `tiles` is empty; call sites only reach this after confirming non-emptiness.
pub(crate) fn pick_uniform(rng: &mut ChaCha20Rng, tiles: &[Tile]) -> Tile {
    let idx = rng.gen_range(0..tiles.len());
    tiles[idx]
}
