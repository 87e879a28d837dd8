//! Per-bin annotation reference storage.
//!
//! A bin owns the references falling into one sub-tile cell, grouped by
//! priority label. Each group is kept newest-first so that ranked queries
//! can take a prefix of the group.

use crate::error::{Result, TilemarkError};
use crate::types::{AnnotationData, AnnotationReference};
use serde_json::{Map, Value};
use smallvec::SmallVec;

type ReferenceList = SmallVec<[AnnotationReference; 4]>;

/// Ordered collection of annotation references for one sub-tile cell.
///
/// Recency is insertion order: a newly added reference goes to the front of
/// its priority group, so `references(priority)` is always newest-first.
///
/// JSON form: one field per priority label, valued by the group's reference
/// array in stored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationBin {
    groups: Vec<(String, ReferenceList)>,
}

impl AnnotationBin {
    /// Create an empty bin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bin seeded with one annotation.
    pub fn with_data(data: &AnnotationData) -> Self {
        let mut bin = Self::new();
        bin.add(data);
        bin
    }

    /// Total number of references across all priority groups.
    pub fn size(&self) -> usize {
        self.groups.iter().map(|(_, refs)| refs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Record a reference to `data` at the front of its priority group.
    pub fn add(&mut self, data: &AnnotationData) {
        let reference = data.reference();
        match self.groups.iter_mut().find(|(p, _)| *p == data.priority) {
            Some((_, refs)) => refs.insert(0, reference),
            None => {
                let mut refs = ReferenceList::new();
                refs.push(reference);
                self.groups.push((data.priority.clone(), refs));
            }
        }
    }

    /// Remove the reference to `data`, if present. Emptied priority groups
    /// are dropped. Returns false when the reference is absent.
    pub fn remove(&mut self, data: &AnnotationData) -> bool {
        let Some(group) = self
            .groups
            .iter()
            .position(|(p, _)| *p == data.priority)
        else {
            return false;
        };

        let refs = &mut self.groups[group].1;
        let Some(at) = refs.iter().position(|r| r.uuid == data.uuid) else {
            return false;
        };

        refs.remove(at);
        if refs.is_empty() {
            self.groups.remove(group);
        }
        true
    }

    /// All references, priority groups in insertion order.
    pub fn all_references(&self) -> Vec<AnnotationReference> {
        self.groups
            .iter()
            .flat_map(|(_, refs)| refs.iter().cloned())
            .collect()
    }

    /// References for one priority label, newest first. Unknown labels
    /// yield an empty slice.
    pub fn references(&self, priority: &str) -> &[AnnotationReference] {
        self.groups
            .iter()
            .find(|(p, _)| p == priority)
            .map(|(_, refs)| refs.as_slice())
            .unwrap_or(&[])
    }

    /// Serialize to the bin record form.
    pub fn to_json(&self) -> Result<Value> {
        let mut record = Map::new();
        for (priority, refs) in &self.groups {
            let entries = refs
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            record.insert(priority.clone(), Value::Array(entries));
        }
        Ok(Value::Object(record))
    }

    /// Parse a bin record. Any malformed group or reference fails the whole
    /// bin.
    pub fn from_json(record: &Value) -> Result<Self> {
        let Value::Object(fields) = record else {
            return Err(TilemarkError::invalid_format(
                "bin record must be an object",
            ));
        };

        let mut groups = Vec::with_capacity(fields.len());
        for (priority, value) in fields {
            let Value::Array(entries) = value else {
                return Err(TilemarkError::invalid_format(format!(
                    "priority group {priority:?} must be an array"
                )));
            };
            let refs = entries
                .iter()
                .map(|entry| {
                    serde_json::from_value::<AnnotationReference>(entry.clone()).map_err(|e| {
                        TilemarkError::invalid_format(format!(
                            "malformed annotation reference in group {priority:?}: {e}"
                        ))
                    })
                })
                .collect::<Result<ReferenceList>>()?;
            groups.push((priority.clone(), refs));
        }
        Ok(Self { groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(priority: &str) -> AnnotationData {
        AnnotationData::new(priority, &b"payload"[..])
    }

    #[test]
    fn test_add_and_size() {
        let mut bin = AnnotationBin::new();
        assert!(bin.is_empty());

        bin.add(&annotation("high"));
        bin.add(&annotation("high"));
        bin.add(&annotation("low"));
        assert_eq!(bin.size(), 3);
        assert_eq!(bin.references("high").len(), 2);
        assert_eq!(bin.references("low").len(), 1);
        assert!(bin.references("unknown").is_empty());
    }

    #[test]
    fn test_references_are_newest_first() {
        let mut bin = AnnotationBin::new();
        let older = annotation("high");
        let newer = annotation("high");
        bin.add(&older);
        bin.add(&newer);

        let refs = bin.references("high");
        assert_eq!(refs[0].uuid, newer.uuid);
        assert_eq!(refs[1].uuid, older.uuid);
    }

    #[test]
    fn test_remove_by_value() {
        let mut bin = AnnotationBin::new();
        let kept = annotation("high");
        let removed = annotation("high");
        bin.add(&kept);
        bin.add(&removed);

        assert!(bin.remove(&removed));
        assert!(!bin.remove(&removed));
        assert_eq!(bin.size(), 1);
        assert_eq!(bin.references("high")[0].uuid, kept.uuid);
    }

    #[test]
    fn test_remove_drops_empty_group() {
        let mut bin = AnnotationBin::new();
        let only = annotation("low");
        bin.add(&only);
        assert!(bin.remove(&only));
        assert!(bin.is_empty());
        assert!(bin.references("low").is_empty());
    }

    #[test]
    fn test_remove_absent_priority() {
        let mut bin = AnnotationBin::with_data(&annotation("high"));
        assert!(!bin.remove(&annotation("low")));
        assert_eq!(bin.size(), 1);
    }

    #[test]
    fn test_all_references_spans_groups() {
        let mut bin = AnnotationBin::new();
        bin.add(&annotation("a"));
        bin.add(&annotation("b"));
        bin.add(&annotation("a"));
        assert_eq!(bin.all_references().len(), 3);
    }

    #[test]
    fn test_json_round_trip() {
        let mut bin = AnnotationBin::new();
        bin.add(&annotation("high"));
        bin.add(&annotation("high"));
        bin.add(&annotation("low"));

        let record = bin.to_json().unwrap();
        let restored = AnnotationBin::from_json(&record).unwrap();
        assert_eq!(restored, bin);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(AnnotationBin::from_json(&Value::Array(vec![])).is_err());
        assert!(AnnotationBin::from_json(&Value::Null).is_err());
    }

    #[test]
    fn test_from_json_rejects_malformed_group() {
        let record: Value = serde_json::json!({ "high": {"not": "an array"} });
        assert!(AnnotationBin::from_json(&record).is_err());

        let record: Value = serde_json::json!({ "high": [{"uuid": "not-a-uuid"}] });
        assert!(AnnotationBin::from_json(&record).is_err());
    }
}
