//! In-memory tile store routing annotations across pyramid levels.
//!
//! A written annotation is registered at every level of the pyramid at once,
//! so coarse tiles aggregate what their finer children hold by spatial
//! proximity. Eviction and persistence stay with the caller; the store only
//! keeps live tiles.

use crate::error::Result;
use crate::index::AnnotationIndexer;
use crate::tile::AnnotationTile;
use crate::types::{AnnotationData, AnnotationIndex};
use geo::Point;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Live tile map keyed by annotation index.
///
/// Tiles are shared as `Arc<AnnotationTile>`; per-tile mutual exclusion
/// lives inside the tile, so operations on different tiles run in parallel
/// and the store lock is only held for map lookups. Tiles emptied by
/// removals are kept in place; dropping them is the caller's concern.
pub struct AnnotationStore {
    indexer: AnnotationIndexer,
    tiles: RwLock<FxHashMap<AnnotationIndex, Arc<AnnotationTile>>>,
}

impl AnnotationStore {
    pub fn new(indexer: AnnotationIndexer) -> Self {
        Self {
            indexer,
            tiles: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn indexer(&self) -> &AnnotationIndexer {
        &self.indexer
    }

    /// Register `data` at every pyramid level, creating tiles on demand.
    /// Returns the touched keys, coarsest level first.
    pub fn insert(&self, point: &Point<f64>, data: &AnnotationData) -> Result<Vec<AnnotationIndex>> {
        let mut touched = Vec::with_capacity(self.indexer.levels() as usize);
        for level in 0..self.indexer.levels() {
            let location = self.indexer.resolve(point, level)?;
            let tile = {
                let mut tiles = self.tiles.write();
                Arc::clone(
                    tiles
                        .entry(location.index)
                        .or_insert_with(|| Arc::new(AnnotationTile::new(location.tile))),
                )
            };
            tile.add(location.bin, data);
            touched.push(location.index);
        }
        log::debug!(
            "registered annotation {} across {} levels",
            data.uuid,
            touched.len()
        );
        Ok(touched)
    }

    /// Remove `data` from every level's tile. Returns how many tiles held
    /// the annotation; an annotation the store never saw removes zero.
    pub fn remove(&self, point: &Point<f64>, data: &AnnotationData) -> Result<usize> {
        let mut removed = 0;
        for level in 0..self.indexer.levels() {
            let location = self.indexer.resolve(point, level)?;
            let Some(tile) = self.tiles.read().get(&location.index).cloned() else {
                continue;
            };
            if tile.remove(location.bin, data) {
                removed += 1;
            }
        }
        log::debug!("removed annotation {} from {} tiles", data.uuid, removed);
        Ok(removed)
    }

    /// Look up the live tile for a key.
    pub fn tile(&self, index: AnnotationIndex) -> Option<Arc<AnnotationTile>> {
        self.tiles.read().get(&index).cloned()
    }

    /// Number of live tiles.
    pub fn len(&self) -> usize {
        self.tiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.read().is_empty()
    }
}
