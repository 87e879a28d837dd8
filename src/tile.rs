//! A single tile's worth of annotations, stored per bin.
//!
//! Tile record JSON format:
//! ```json
//! {
//!     "level": 3, "x": 2, "y": 5,
//!     "[0, 0]": { "high": [ ... ] },
//!     "[4, 7]": { "low": [ ... ] }
//! }
//! ```

use crate::bins::AnnotationBin;
use crate::error::{Result, TilemarkError};
use crate::types::{AnnotationData, AnnotationReference, BinIndex, TileIndex};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};

/// Annotation container for one tile of the pyramid.
///
/// Bins are kept in insertion order so repeated exports stay deterministic,
/// and a bin is dropped the moment its last reference is removed. All
/// operations serialize through one per-instance critical section; callers
/// on different tiles never contend.
///
/// Equality and hashing derive solely from the tile index: two containers
/// for the same tile coordinates are interchangeable as map keys regardless
/// of their current contents.
#[derive(Debug)]
pub struct AnnotationTile {
    index: TileIndex,
    bins: Mutex<Vec<(BinIndex, AnnotationBin)>>,
}

impl AnnotationTile {
    /// Create an empty tile.
    pub fn new(index: TileIndex) -> Self {
        Self {
            index,
            bins: Mutex::new(Vec::new()),
        }
    }

    /// Create a tile seeded with one bin. An empty seed bin is discarded.
    pub fn with_bin(index: TileIndex, bin_index: BinIndex, bin: AnnotationBin) -> Self {
        Self::from_bins(index, vec![(bin_index, bin)])
    }

    /// Bulk-construct a tile from a bin mapping, preserving the given
    /// order. Empty bins are discarded up front.
    pub fn from_bins(index: TileIndex, bins: Vec<(BinIndex, AnnotationBin)>) -> Self {
        let bins = bins.into_iter().filter(|(_, bin)| !bin.is_empty()).collect();
        Self {
            index,
            bins: Mutex::new(bins),
        }
    }

    pub fn index(&self) -> TileIndex {
        self.index
    }

    /// Number of non-empty bins currently held.
    pub fn size(&self) -> usize {
        self.bins.lock().len()
    }

    /// Append `data` to the bin at `bin_index`, creating the bin if needed.
    pub fn add(&self, bin_index: BinIndex, data: &AnnotationData) {
        let mut bins = self.bins.lock();
        match bins.iter_mut().find(|(at, _)| *at == bin_index) {
            Some((_, bin)) => bin.add(data),
            None => bins.push((bin_index, AnnotationBin::with_data(data))),
        }
    }

    /// Remove `data` from the bin at `bin_index`. A bin emptied by the
    /// removal is deleted entirely. Returns false when the bin or the data
    /// is absent; never an error.
    pub fn remove(&self, bin_index: BinIndex, data: &AnnotationData) -> bool {
        let mut bins = self.bins.lock();
        let Some(at) = bins.iter().position(|(at, _)| *at == bin_index) else {
            return false;
        };

        let removed = bins[at].1.remove(data);
        if removed && bins[at].1.is_empty() {
            bins.remove(at);
        }
        removed
    }

    /// Every bin's references, bins in insertion order.
    pub fn all_references(&self) -> Vec<AnnotationReference> {
        self.bins
            .lock()
            .iter()
            .flat_map(|(_, bin)| bin.all_references())
            .collect()
    }

    /// For every bin and every `(priority, max_count)` filter entry, the
    /// `min(max_count, available)` newest references of that priority.
    ///
    /// The cap applies per bin per priority, not tile-wide: a tile with ten
    /// bins and a cap of two can return up to twenty references.
    pub fn filtered_references(
        &self,
        filter: &FxHashMap<String, usize>,
    ) -> Vec<AnnotationReference> {
        let bins = self.bins.lock();
        let mut filtered = Vec::new();
        for (_, bin) in bins.iter() {
            for (priority, count) in filter {
                let refs = bin.references(priority);
                filtered.extend_from_slice(&refs[..(*count).min(refs.len())]);
            }
        }
        filtered
    }

    /// Serialize to the tile record form. A tile with no bins serializes to
    /// just the three coordinate fields.
    pub fn to_json(&self) -> Result<Value> {
        let bins = self.bins.lock();
        let mut record = Map::new();
        record.insert("level".into(), self.index.level.into());
        record.insert("x".into(), self.index.x.into());
        record.insert("y".into(), self.index.y.into());
        for (bin_index, bin) in bins.iter() {
            record.insert(bin_index.to_string(), bin.to_json()?);
        }
        Ok(Value::Object(record))
    }

    /// Parse a tile record.
    ///
    /// Requires numeric `level`, `x`, `y` fields; every other field holding
    /// an object is parsed as a bin key and bin body. Any failure aborts the
    /// whole parse; a partially built tile is never returned.
    pub fn from_json(record: &Value) -> Result<Self> {
        let Value::Object(fields) = record else {
            return Err(TilemarkError::invalid_format(
                "tile record must be an object",
            ));
        };

        let index = TileIndex::new(
            require_coordinate(fields, "level")?,
            require_coordinate(fields, "x")?,
            require_coordinate(fields, "y")?,
        );

        let mut bins = Vec::new();
        for (key, value) in fields {
            if value.is_object() {
                let bin_index = BinIndex::parse(key)?;
                bins.push((bin_index, AnnotationBin::from_json(value)?));
            }
        }

        Ok(Self::from_bins(index, bins))
    }
}

fn require_coordinate(fields: &Map<String, Value>, name: &str) -> Result<u32> {
    fields
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            TilemarkError::invalid_format(format!("missing or non-numeric field {name:?}"))
        })
}

impl PartialEq for AnnotationTile {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for AnnotationTile {}

impl Hash for AnnotationTile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
