use geo::Point;
use rustc_hash::FxHashMap;
use serde_json::json;
use tilemark::{
    AnnotationData, AnnotationIndexer, AnnotationTile, BinIndex, TileIndex, TilemarkError,
    UnitGridPyramid, LEVELS, NUM_BINS,
};

#[test]
fn test_missing_level_fails_deserialization() {
    let record = json!({ "x": 1, "y": 2, "[0, 0]": { "high": [] } });
    let err = AnnotationTile::from_json(&record).unwrap_err();
    assert!(matches!(err, TilemarkError::InvalidFormat(_)));
}

#[test]
fn test_negative_coordinate_fails_deserialization() {
    let record = json!({ "level": 3, "x": -1, "y": 2 });
    assert!(AnnotationTile::from_json(&record).is_err());
}

#[test]
fn test_malformed_bin_body_leaves_no_tile() {
    // a valid bin before the malformed one must not leak out
    let record = json!({
        "level": 1, "x": 0, "y": 0,
        "[0, 0]": { "high": [] },
        "[1, 1]": { "high": "not an array" }
    });
    assert!(AnnotationTile::from_json(&record).is_err());
}

#[test]
fn test_filter_with_unknown_priority() {
    let tile = AnnotationTile::new(TileIndex::new(0, 0, 0));
    tile.add(BinIndex::new(0, 0), &AnnotationData::new("high", &b"x"[..]));

    let filter = FxHashMap::from_iter([("nonexistent".to_string(), 5)]);
    assert!(tile.filtered_references(&filter).is_empty());
}

#[test]
fn test_filter_with_zero_count() {
    let tile = AnnotationTile::new(TileIndex::new(0, 0, 0));
    tile.add(BinIndex::new(0, 0), &AnnotationData::new("high", &b"x"[..]));

    let filter = FxHashMap::from_iter([("high".to_string(), 0)]);
    assert!(tile.filtered_references(&filter).is_empty());
}

#[test]
fn test_empty_filter() {
    let tile = AnnotationTile::new(TileIndex::new(0, 0, 0));
    tile.add(BinIndex::new(0, 0), &AnnotationData::new("high", &b"x"[..]));
    assert!(tile.filtered_references(&FxHashMap::default()).is_empty());
}

#[test]
fn test_same_annotation_in_two_bins() {
    // the container does not police cross-bin duplicates; each bin removes
    // independently
    let tile = AnnotationTile::new(TileIndex::new(0, 0, 0));
    let data = AnnotationData::new("high", &b"x"[..]);
    tile.add(BinIndex::new(0, 0), &data);
    tile.add(BinIndex::new(1, 1), &data);

    assert_eq!(tile.size(), 2);
    assert!(tile.remove(BinIndex::new(0, 0), &data));
    assert!(!tile.remove(BinIndex::new(0, 0), &data));
    assert_eq!(tile.size(), 1);
}

#[test]
fn test_coordinates_outside_unit_square_clamp() {
    let indexer = AnnotationIndexer::new(Box::new(UnitGridPyramid::new()));
    let inside = indexer.index_at(&Point::new(0.999_999_9, 0.999_999_9), 4).unwrap();
    let outside = indexer.index_at(&Point::new(7.5, 123.0), 4).unwrap();
    assert_eq!(inside, outside);
}

#[test]
fn test_highest_level_stays_in_budget() {
    let indexer = AnnotationIndexer::new(Box::new(UnitGridPyramid::new()));
    let corner = Point::new(0.999_999_9, 0.999_999_9);
    let key = indexer.index_at(&corner, LEVELS - 1).unwrap();
    assert!(key.value() > 0);
}

#[test]
fn test_bin_grid_matches_constant() {
    let indexer = AnnotationIndexer::new(Box::new(UnitGridPyramid::new()));
    let location = indexer.resolve(&Point::new(0.5, 0.5), 2).unwrap();
    assert_eq!(location.tile.bins_x, NUM_BINS);
    assert_eq!(location.tile.bins_y, NUM_BINS);
    assert!(location.bin.x < NUM_BINS && location.bin.y < NUM_BINS);
}
