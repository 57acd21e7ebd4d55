use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;

use crate::structure::{Position, PositionField, TYPE_ID_KEY, position_of, type_id_of};

/// Largest per-axis difference at which two placements of the same type are
/// reported as the same structure.
pub const DUPLICATE_TOLERANCE: f64 = 0.02;

const TOLERANCE_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint {
    pub type_id: Option<u64>,
    pub position: Option<Position>,
}

type RoundedKey = (Option<u64>, Option<[i64; 3]>);

impl Fingerprint {
    /// `None` when the record carries a TypeID or position that cannot be read.
    pub fn of(record: &Value) -> Option<Self> {
        let type_id = match record.get(TYPE_ID_KEY) {
            None => None,
            Some(_) => Some(type_id_of(record)?),
        };
        let position = match position_of(record) {
            PositionField::Absent => None,
            PositionField::Invalid => return None,
            PositionField::Valid(position) => Some(position),
        };
        Some(Self { type_id, position })
    }

    fn rounded(&self) -> RoundedKey {
        (
            self.type_id,
            self.position
                .map(|position| position.axes().map(|axis| (axis * 100.0).round() as i64)),
        )
    }

    pub fn matches(&self, other: &Fingerprint) -> bool {
        if self.type_id != other.type_id {
            return false;
        }
        match (self.position, other.position) {
            (None, None) => true,
            (Some(a), Some(b)) => a
                .axes()
                .iter()
                .zip(b.axes())
                .all(|(x, y)| (x - y).abs() <= DUPLICATE_TOLERANCE + TOLERANCE_SLACK),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FingerprintSet {
    rounded: HashSet<RoundedKey>,
    by_type: HashMap<Option<u64>, Vec<Fingerprint>>,
}

impl FingerprintSet {
    pub fn build<T: Borrow<Value>>(records: &[T]) -> Self {
        let mut set = Self::default();
        for fingerprint in records
            .iter()
            .filter_map(|record| Fingerprint::of(record.borrow()))
        {
            set.insert(fingerprint);
        }
        set
    }

    pub fn insert(&mut self, fingerprint: Fingerprint) {
        self.rounded.insert(fingerprint.rounded());
        self.by_type
            .entry(fingerprint.type_id)
            .or_default()
            .push(fingerprint);
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        if self.rounded.contains(&fingerprint.rounded()) {
            return true;
        }
        self.by_type
            .get(&fingerprint.type_id)
            .is_some_and(|known| known.iter().any(|other| other.matches(fingerprint)))
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// Flags candidates already present in `existing`. Advisory only.
pub fn annotate<T: Borrow<Value>>(candidates: &[T], existing: &FingerprintSet) -> Vec<bool> {
    candidates
        .iter()
        .map(|record| {
            Fingerprint::of(record.borrow()).is_some_and(|fingerprint| existing.contains(&fingerprint))
        })
        .collect()
}

pub fn count_flagged(flags: &[bool], indices: &BTreeSet<usize>) -> usize {
    indices
        .iter()
        .filter(|&&index| flags.get(index).copied().unwrap_or(false))
        .count()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Value, json};

    use super::{Fingerprint, FingerprintSet, annotate, count_flagged};

    fn at(type_id: u64, x: f64, y: f64, z: f64) -> Value {
        json!({"TypeID": type_id, "Position": {"x": x, "y": y, "z": z}})
    }

    #[test]
    fn within_tolerance_is_a_duplicate() {
        let existing = FingerprintSet::build(&[at(3, 1.00, 2.00, 3.00)]);
        let flags = annotate(
            &[
                at(3, 1.02, 2.00, 3.00),
                at(3, 1.01, 1.99, 3.015),
                at(3, 1.03, 2.00, 3.00),
                at(4, 1.00, 2.00, 3.00),
            ],
            &existing,
        );
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn rounding_boundary_does_not_split_close_positions() {
        let existing = FingerprintSet::build(&[at(1, 0.004, 0.0, 0.0)]);
        let candidate = Fingerprint::of(&at(1, 0.006, 0.0, 0.0)).expect("valid fingerprint");
        assert!(existing.contains(&candidate));
    }

    #[test]
    fn absent_positions_match_each_other_only() {
        let existing = FingerprintSet::build(&[json!({"TypeID": 8})]);
        let flags = annotate(
            &[
                json!({"TypeID": 8, "Position": null}),
                at(8, 0.0, 0.0, 0.0),
            ],
            &existing,
        );
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn unreadable_positions_have_no_fingerprint() {
        assert_eq!(
            Fingerprint::of(&json!({"TypeID": 1, "Position": {"x": "far"}})),
            None
        );
        let existing = FingerprintSet::build(&[json!({"TypeID": 1, "Position": {"x": "far"}})]);
        assert!(existing.is_empty());
    }

    #[test]
    fn count_flagged_only_counts_selected_indices() {
        let flags = vec![true, false, true, true];
        assert_eq!(count_flagged(&flags, &BTreeSet::from([0, 1, 3, 9])), 2);
    }

    #[test]
    fn unreadable_type_ids_are_never_duplicates() {
        let existing = FingerprintSet::build(&[
            json!({"TypeID": "wall", "Position": {"x": 1.0, "y": 0.0, "z": 0.0}}),
            json!({"TypeID": -4, "Position": {"x": 1.0, "y": 0.0, "z": 0.0}}),
        ]);
        assert!(existing.is_empty());

        let candidates = [
            json!({"TypeID": "door", "Position": {"x": 1.0, "y": 0.0, "z": 0.0}}),
            json!({"TypeID": 1.5, "Position": {"x": 1.0, "y": 0.0, "z": 0.0}}),
        ];
        assert_eq!(annotate(&candidates, &existing), vec![false, false]);
        assert!(Fingerprint::of(&candidates[0]).is_none());

        let untyped = json!({"Position": {"x": 1.0, "y": 0.0, "z": 0.0}});
        let fingerprint = Fingerprint::of(&untyped).expect("missing TypeID is still comparable");
        assert_eq!(fingerprint.type_id, None);
    }
}
