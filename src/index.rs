//! Spatial indexer mapping continuous coordinates to global bin keys.
//!
//! Each zoom level subdivides the mapped space into tiles of
//! `NUM_BINS x NUM_BINS` bins. A coordinate is resolved to its global bin
//! position at a level, Morton-encoded, and offset so that every level's
//! keys occupy a disjoint numeric range.

use crate::error::{Result, TilemarkError};
use crate::types::{AnnotationIndex, BinIndex, IndexerConfig, TileIndex, NUM_BINS};
use geo::Point;
use once_cell::sync::Lazy;

/// Default number of pyramid levels an annotation is registered at.
pub const LEVELS: u32 = 18;

/// log2 of `NUM_BINS`; sizes the per-level key budget so that level `L`
/// owns `4^(L + LEVELS_EXP)` keys.
pub const LEVELS_EXP: u32 = 3;

/// Hard ceiling on the level count: beyond this the stacked level offsets
/// no longer fit the 64-bit key space.
pub const MAX_LEVELS: u32 = 28;

/// Magic masks for the 5-stage Morton bit spread, coarsest stage first.
const INTERLEAVE_MASKS: [u64; 5] = [
    0x5555_5555_5555_5555,
    0x3333_3333_3333_3333,
    0x0F0F_0F0F_0F0F_0F0F,
    0x00FF_00FF_00FF_00FF,
    0x0000_FFFF_0000_FFFF,
];

const INTERLEAVE_SHIFTS: [u32; 5] = [1, 2, 4, 8, 16];

/// Additive key offsets per level, computed once as a prefix sum.
static LEVEL_OFFSETS: Lazy<[u64; MAX_LEVELS as usize]> = Lazy::new(|| {
    let mut offsets = [0u64; MAX_LEVELS as usize];
    for level in 1..MAX_LEVELS as usize {
        offsets[level] = offsets[level - 1] + 4u64.pow(level as u32 + LEVELS_EXP);
    }
    offsets
});

/// Geometry provider boundary: converts continuous coordinates to tile and
/// bin positions. Supplied externally; this crate treats it as a black box.
pub trait TilePyramid: Send + Sync {
    /// Tile covering `point` at `level` with the given bin grid.
    fn root_to_tile(&self, point: &Point<f64>, level: u32, bins_x: u32, bins_y: u32) -> TileIndex;

    /// Bin of `point` within `tile`. Bin rows use a top-left origin.
    fn root_to_bin(&self, point: &Point<f64>, tile: &TileIndex) -> BinIndex;
}

/// Trivial pyramid over the unit square, mostly useful for tests and
/// examples: level `L` splits `[0, 1)` into `2^L` tiles per axis, tile rows
/// growing upward. Out-of-range coordinates clamp to the edge cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitGridPyramid;

impl UnitGridPyramid {
    pub fn new() -> Self {
        Self
    }
}

impl TilePyramid for UnitGridPyramid {
    fn root_to_tile(&self, point: &Point<f64>, level: u32, bins_x: u32, bins_y: u32) -> TileIndex {
        let n = (1u64 << level) as f64;
        let max = (1u64 << level) as i64 - 1;
        let x = ((point.x() * n).floor() as i64).clamp(0, max) as u32;
        let y = ((point.y() * n).floor() as i64).clamp(0, max) as u32;
        TileIndex {
            level,
            x,
            y,
            bins_x,
            bins_y,
        }
    }

    fn root_to_bin(&self, point: &Point<f64>, tile: &TileIndex) -> BinIndex {
        let n = (1u64 << tile.level) as f64;
        let fx = point.x() * n - tile.x as f64;
        let fy = point.y() * n - tile.y as f64;
        let x = ((fx * tile.bins_x as f64).floor() as i64).clamp(0, tile.bins_x as i64 - 1) as u32;
        let row = ((fy * tile.bins_y as f64).floor() as i64).clamp(0, tile.bins_y as i64 - 1) as u32;
        // rows grow upward in tile space, downward in bin space
        BinIndex::new(x, tile.bins_y - 1 - row)
    }
}

/// A fully resolved annotation location at one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    pub index: AnnotationIndex,
    pub tile: TileIndex,
    pub bin: BinIndex,
}

/// Stateless annotation indexer.
///
/// Pure computation over the supplied [`TilePyramid`]; safe to call from any
/// number of threads without synchronization.
///
/// # Example
///
/// ```rust
/// use geo::Point;
/// use tilemark::{AnnotationIndexer, UnitGridPyramid};
///
/// let indexer = AnnotationIndexer::new(Box::new(UnitGridPyramid::new()));
/// let point = Point::new(0.25, 0.75);
/// let key = indexer.index_at(&point, 3)?;
/// assert_eq!(key, indexer.indices(&point)?[3]);
/// # Ok::<(), tilemark::TilemarkError>(())
/// ```
pub struct AnnotationIndexer {
    pyramid: Box<dyn TilePyramid>,
    levels: u32,
}

impl AnnotationIndexer {
    /// Create an indexer over `pyramid` with the default level count.
    pub fn new(pyramid: Box<dyn TilePyramid>) -> Self {
        Self {
            pyramid,
            levels: LEVELS,
        }
    }

    /// Create an indexer with a validated configuration.
    pub fn with_config(pyramid: Box<dyn TilePyramid>, config: &IndexerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pyramid,
            levels: config.levels,
        })
    }

    /// Number of pyramid levels covered by [`AnnotationIndexer::indices`].
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Global key for `point` at `level`.
    pub fn index_at(&self, point: &Point<f64>, level: u32) -> Result<AnnotationIndex> {
        Ok(self.resolve(point, level)?.index)
    }

    /// Global keys for `point` at every level, coarsest first; entry `i`
    /// equals `index_at(point, i)`.
    pub fn indices(&self, point: &Point<f64>) -> Result<Vec<AnnotationIndex>> {
        (0..self.levels)
            .map(|level| self.index_at(point, level))
            .collect()
    }

    /// Resolve `point` at `level` to its key together with the tile and bin
    /// coordinates needed to address the tile container.
    pub fn resolve(&self, point: &Point<f64>, level: u32) -> Result<TileLocation> {
        if level >= self.levels {
            return Err(TilemarkError::invalid_input(format!(
                "level {level} outside [0, {})",
                self.levels
            )));
        }

        let tile = self
            .pyramid
            .root_to_tile(point, level, NUM_BINS, NUM_BINS);
        let bin = self.pyramid.root_to_bin(point, &tile);
        if bin.x >= tile.bins_x || bin.y >= tile.bins_y {
            return Err(TilemarkError::invalid_input(format!(
                "bin {bin} outside the tile's {}x{} grid",
                tile.bins_x, tile.bins_y
            )));
        }

        let bx = tile.x as u64 * tile.bins_x as u64 + bin.x as u64;
        let by = tile.y as u64 * tile.bins_y as u64 + (tile.bins_y - 1 - bin.y) as u64;

        // level L owns 2^(L + LEVELS_EXP) global bins per axis; anything
        // larger would collide with the next level's key range
        let budget = level + LEVELS_EXP;
        if bx >> budget != 0 || by >> budget != 0 {
            return Err(TilemarkError::invalid_input(format!(
                "global bin ({bx}, {by}) outside the level {level} key budget"
            )));
        }

        let z = spread(bx) | (spread(by) << 1);
        Ok(TileLocation {
            index: AnnotationIndex(z + level_offset(level)),
            tile,
            bin,
        })
    }
}

/// Spread the low 32 bits of `v` into the even bit lanes.
fn spread(mut v: u64) -> u64 {
    v = (v | (v << INTERLEAVE_SHIFTS[4])) & INTERLEAVE_MASKS[4];
    v = (v | (v << INTERLEAVE_SHIFTS[3])) & INTERLEAVE_MASKS[3];
    v = (v | (v << INTERLEAVE_SHIFTS[2])) & INTERLEAVE_MASKS[2];
    v = (v | (v << INTERLEAVE_SHIFTS[1])) & INTERLEAVE_MASKS[1];
    v = (v | (v << INTERLEAVE_SHIFTS[0])) & INTERLEAVE_MASKS[0];
    v
}

/// Additive offset partitioning the key space per level.
fn level_offset(level: u32) -> u64 {
    LEVEL_OFFSETS[level as usize]
}
