//! Shared types and configuration for tilemark.
//!
//! This module defines the tile/bin coordinate types shared by the indexer
//! and the tile container, the annotation payload and reference types, and
//! the indexer configuration.

use crate::error::{Result, TilemarkError};
use bytes::Bytes;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Number of annotation bins per tile axis.
///
/// Shared by the indexer and every tile container; the two must agree or the
/// global bin coordinates stop being injective within a level.
pub const NUM_BINS: u32 = 8;

/// Identifies one tile of the pyramid at a given zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    pub level: u32,
    pub x: u32,
    pub y: u32,
    /// Bins per tile along the x axis.
    pub bins_x: u32,
    /// Bins per tile along the y axis.
    pub bins_y: u32,
}

impl TileIndex {
    /// Create a tile index with the standard `NUM_BINS x NUM_BINS` grid.
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self {
            level,
            x,
            y,
            bins_x: NUM_BINS,
            bins_y: NUM_BINS,
        }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} / {}, {}]", self.level, self.x, self.y)
    }
}

/// Position of a sub-cell within a tile's bin grid.
///
/// Both axes are bounded to `[0, NUM_BINS)`; constructing an out-of-range
/// index is a programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinIndex {
    pub x: u32,
    pub y: u32,
}

impl BinIndex {
    /// Create a bin index, panicking if either axis is out of range.
    pub fn new(x: u32, y: u32) -> Self {
        assert!(
            x < NUM_BINS && y < NUM_BINS,
            "bin index ({x}, {y}) outside [0, {NUM_BINS})"
        );
        Self { x, y }
    }

    /// Fallible constructor used on untrusted input paths.
    pub fn try_new(x: u32, y: u32) -> Result<Self> {
        if x >= NUM_BINS || y >= NUM_BINS {
            return Err(TilemarkError::invalid_input(format!(
                "bin index ({x}, {y}) outside [0, {NUM_BINS})"
            )));
        }
        Ok(Self { x, y })
    }

    /// Parse the canonical `"[x, y]"` string form.
    pub fn parse(s: &str) -> Result<Self> {
        let inner = s
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| TilemarkError::invalid_format(format!("malformed bin key: {s:?}")))?;

        let (x, y) = inner
            .split_once(',')
            .ok_or_else(|| TilemarkError::invalid_format(format!("malformed bin key: {s:?}")))?;

        let parse_axis = |axis: &str| {
            axis.trim()
                .parse::<u32>()
                .map_err(|_| TilemarkError::invalid_format(format!("malformed bin key: {s:?}")))
        };

        Self::try_new(parse_axis(x)?, parse_axis(y)?)
            .map_err(|_| TilemarkError::invalid_format(format!("bin key out of range: {s:?}")))
    }
}

impl fmt::Display for BinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Morton-encoded, level-offset global key for one bin of the pyramid.
///
/// Keys for different levels occupy disjoint numeric ranges; within one level
/// the mapping from (tile, bin) to key is injective.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AnnotationIndex(pub u64);

impl AnnotationIndex {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnnotationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A user-contributed annotation: opaque payload plus routing metadata.
///
/// The core never inspects the payload; identity for remove-by-value is the
/// uuid alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationData {
    pub uuid: Uuid,
    pub priority: String,
    /// Creation time in milliseconds since the epoch, carried as recency
    /// metadata on the annotation's references.
    pub timestamp: u64,
    pub payload: Bytes,
}

impl AnnotationData {
    /// Create a new annotation with a fresh uuid and the current time.
    pub fn new(priority: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            priority: priority.into(),
            timestamp: now_millis(),
            payload: payload.into(),
        }
    }

    /// Reconstruct an annotation from previously stored parts.
    pub fn from_parts(
        uuid: Uuid,
        priority: impl Into<String>,
        timestamp: u64,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            uuid,
            priority: priority.into(),
            timestamp,
            payload: payload.into(),
        }
    }

    /// Lightweight handle to this annotation.
    pub fn reference(&self) -> AnnotationReference {
        AnnotationReference {
            uuid: self.uuid,
            priority: self.priority.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Handle to a stored annotation carrying priority and recency metadata,
/// enough to filter without loading the full payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationReference {
    pub uuid: Uuid,
    pub priority: String,
    pub timestamp: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Indexer configuration.
///
/// Designed to be easily serializable and loadable from JSON while keeping
/// complexity minimal.
///
/// # Example
///
/// ```rust
/// use tilemark::IndexerConfig;
///
/// let config = IndexerConfig::default();
/// assert_eq!(config.levels, 18);
///
/// let config: IndexerConfig = serde_json::from_str(r#"{"levels": 12}"#).unwrap();
/// assert_eq!(config.levels, 12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Number of pyramid levels every annotation is registered at.
    #[serde(default = "IndexerConfig::default_levels")]
    pub levels: u32,
}

impl IndexerConfig {
    const fn default_levels() -> u32 {
        crate::index::LEVELS
    }

    pub fn with_levels(levels: u32) -> Self {
        Self { levels }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.levels == 0 {
            return Err(TilemarkError::invalid_input(
                "level count must be greater than zero",
            ));
        }
        if self.levels > crate::index::MAX_LEVELS {
            return Err(TilemarkError::invalid_input(format!(
                "level count {} exceeds the key-space maximum of {}",
                self.levels,
                crate::index::MAX_LEVELS
            )));
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: IndexerConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            levels: Self::default_levels(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_index_display_round_trip() {
        let bin = BinIndex::new(3, 7);
        assert_eq!(bin.to_string(), "[3, 7]");
        assert_eq!(BinIndex::parse("[3, 7]").unwrap(), bin);
    }

    #[test]
    fn test_bin_index_parse_tolerates_spacing() {
        assert_eq!(BinIndex::parse("[0,0]").unwrap(), BinIndex::new(0, 0));
        assert_eq!(BinIndex::parse("[ 5 , 2 ]").unwrap(), BinIndex::new(5, 2));
    }

    #[test]
    fn test_bin_index_parse_rejects_garbage() {
        assert!(BinIndex::parse("3, 7").is_err());
        assert!(BinIndex::parse("[3; 7]").is_err());
        assert!(BinIndex::parse("[3, seven]").is_err());
        assert!(BinIndex::parse("[]").is_err());
    }

    #[test]
    fn test_bin_index_parse_rejects_out_of_range() {
        assert!(BinIndex::parse("[8, 0]").is_err());
        assert!(BinIndex::parse("[0, 12]").is_err());
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_bin_index_new_out_of_range() {
        BinIndex::new(NUM_BINS, 0);
    }

    #[test]
    fn test_tile_index_defaults_to_standard_grid() {
        let tile = TileIndex::new(3, 2, 5);
        assert_eq!(tile.bins_x, NUM_BINS);
        assert_eq!(tile.bins_y, NUM_BINS);
        assert_eq!(tile.to_string(), "[3 / 2, 5]");
    }

    #[test]
    fn test_annotation_data_reference() {
        let data = AnnotationData::new("urgent", &b"payload"[..]);
        let reference = data.reference();
        assert_eq!(reference.uuid, data.uuid);
        assert_eq!(reference.priority, "urgent");
        assert_eq!(reference.timestamp, data.timestamp);
    }

    #[test]
    fn test_config_default() {
        let config = IndexerConfig::default();
        assert_eq!(config.levels, 18);
        assert_eq!(config.levels, crate::index::LEVELS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(IndexerConfig::with_levels(0).validate().is_err());
        assert!(IndexerConfig::with_levels(28).validate().is_ok());
        assert!(IndexerConfig::with_levels(29).validate().is_err());
    }

    #[test]
    fn test_config_from_json_validates() {
        assert!(IndexerConfig::from_json(r#"{"levels": 4}"#).is_ok());
        assert!(IndexerConfig::from_json(r#"{"levels": 0}"#).is_err());
        assert!(IndexerConfig::from_json(r#"{}"#).is_ok());
    }
}
