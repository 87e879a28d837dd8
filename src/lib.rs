//! Tile-pyramid spatial indexing and per-tile storage for map annotations.
//!
//! ```rust
//! use geo::Point;
//! use tilemark::{AnnotationData, AnnotationIndexer, AnnotationStore, UnitGridPyramid};
//!
//! let indexer = AnnotationIndexer::new(Box::new(UnitGridPyramid::new()));
//! let store = AnnotationStore::new(indexer);
//!
//! let point = Point::new(0.25, 0.75);
//! let note = AnnotationData::new("high", &b"look here"[..]);
//! let keys = store.insert(&point, &note)?;
//!
//! let tile = store.tile(keys[0]).unwrap();
//! assert_eq!(tile.all_references().len(), 1);
//! # Ok::<(), tilemark::TilemarkError>(())
//! ```

pub mod bins;
pub mod error;
pub mod index;
pub mod store;
pub mod tile;
pub mod types;

pub use bins::AnnotationBin;
pub use error::{Result, TilemarkError};
pub use index::{
    AnnotationIndexer, TileLocation, TilePyramid, UnitGridPyramid, LEVELS, LEVELS_EXP, MAX_LEVELS,
};
pub use store::AnnotationStore;
pub use tile::AnnotationTile;
pub use types::{
    AnnotationData, AnnotationIndex, AnnotationReference, BinIndex, IndexerConfig, TileIndex,
    NUM_BINS,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{AnnotationBin, AnnotationTile, Result, TilemarkError};

    pub use crate::{AnnotationIndexer, TilePyramid, UnitGridPyramid};

    pub use crate::{AnnotationData, AnnotationIndex, AnnotationReference, BinIndex, TileIndex};

    pub use crate::{AnnotationStore, IndexerConfig};

    pub use geo::Point;
}
