use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core_api::CoreError;

pub const TYPE_ID_KEY: &str = "TypeID";
pub const POSITION_KEY: &str = "Position";
pub const LINKED_STRUCTURES_KEY: &str = "LinkedStructures";
pub const STORAGES_KEY: &str = "Storages";
pub const SCALE_KEY: &str = "Scale";

pub const DUPLICATE_MARKER_KEY: &str = "is_duplicate";
pub const GROUP_ANNOTATION_KEYS: [&str; 3] = ["group_id", "group_label", "nearby_indices"];

/// Largest TypeID accepted when a record has to be placed into a bucket.
pub const MAX_TYPE_ID: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionField {
    /// No `Position`, `null`, or an empty object.
    Absent,
    /// Present but not an object of numeric axes.
    Invalid,
    Valid(Position),
}

impl PositionField {
    pub fn valid(self) -> Option<Position> {
        match self {
            Self::Valid(position) => Some(position),
            Self::Absent | Self::Invalid => None,
        }
    }
}

pub fn position_of(record: &Value) -> PositionField {
    let Some(raw) = record.get(POSITION_KEY) else {
        return PositionField::Absent;
    };
    match raw {
        Value::Null => PositionField::Absent,
        Value::Object(axes) if axes.is_empty() => PositionField::Absent,
        Value::Object(axes) => {
            match (axis(axes, "x"), axis(axes, "y"), axis(axes, "z")) {
                (Some(x), Some(y), Some(z)) => PositionField::Valid(Position { x, y, z }),
                _ => PositionField::Invalid,
            }
        }
        _ => PositionField::Invalid,
    }
}

// Missing axes sit at 0; numeric strings are accepted.
fn axis(axes: &Map<String, Value>, name: &str) -> Option<f64> {
    let value = match axes.get(name) {
        None => return Some(0.0),
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(text)) => text.trim().parse::<f64>().ok()?,
        Some(_) => return None,
    };
    value.is_finite().then_some(value)
}

pub fn type_id_of(record: &Value) -> Option<u64> {
    record.get(TYPE_ID_KEY).and_then(Value::as_u64)
}

/// TypeID usable as an index into the bucket array.
pub fn bucket_type_id(record: &Value) -> Option<u64> {
    type_id_of(record).filter(|&id| id <= MAX_TYPE_ID)
}

/// Removes presentation keys written by listing tools. The duplicate marker
/// is removed at any depth, group annotations only on the record itself.
pub fn strip_annotations(record: &mut Value) {
    if let Value::Object(map) = record {
        for key in GROUP_ANNOTATION_KEYS {
            map.remove(key);
        }
    }
    strip_duplicate_markers(record);
}

pub fn strip_duplicate_markers(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(DUPLICATE_MARKER_KEY);
            for nested in map.values_mut() {
                strip_duplicate_markers(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                strip_duplicate_markers(nested);
            }
        }
        _ => {}
    }
}

pub fn apply_import_defaults(record: &mut Map<String, Value>) {
    if !record.contains_key(STORAGES_KEY) {
        record.insert(STORAGES_KEY.to_string(), Value::Array(Vec::new()));
    }
    if !record.contains_key(SCALE_KEY) {
        record.insert(
            SCALE_KEY.to_string(),
            json!({"x": 1.0, "y": 1.0, "z": 1.0}),
        );
    }
}

pub fn check_selection(indices: &BTreeSet<usize>, len: usize) -> Result<(), CoreError> {
    if indices.is_empty() {
        return Err(CoreError::selection("no structures selected"));
    }
    if let Some(&max) = indices.last()
        && max >= len
    {
        return Err(CoreError::selection(format!(
            "structure index {max} is out of range, {len} structures available"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Map, json};

    use super::{
        Position, PositionField, apply_import_defaults, bucket_type_id, check_selection,
        position_of, strip_annotations,
    };

    #[test]
    fn position_defaults_missing_axes_to_zero() {
        let record = json!({"Position": {"x": 1.5, "y": "2"}});
        assert_eq!(
            position_of(&record),
            PositionField::Valid(Position {
                x: 1.5,
                y: 2.0,
                z: 0.0
            })
        );
    }

    #[test]
    fn position_distinguishes_absent_from_invalid() {
        assert_eq!(position_of(&json!({})), PositionField::Absent);
        assert_eq!(position_of(&json!({"Position": null})), PositionField::Absent);
        assert_eq!(position_of(&json!({"Position": {}})), PositionField::Absent);
        assert_eq!(
            position_of(&json!({"Position": {"x": "north"}})),
            PositionField::Invalid
        );
        assert_eq!(
            position_of(&json!({"Position": [1, 2, 3]})),
            PositionField::Invalid
        );
    }

    #[test]
    fn bucket_type_id_rejects_unusable_values() {
        assert_eq!(bucket_type_id(&json!({"TypeID": 4})), Some(4));
        assert_eq!(bucket_type_id(&json!({"TypeID": -1})), None);
        assert_eq!(bucket_type_id(&json!({"TypeID": 2.5})), None);
        assert_eq!(bucket_type_id(&json!({"TypeID": 1_000_000})), None);
        assert_eq!(bucket_type_id(&json!({"Name": "wall"})), None);
    }

    #[test]
    fn strip_annotations_removes_presentation_keys() {
        let mut record = json!({
            "TypeID": 1,
            "group_id": 0,
            "group_label": "Structure Group 1",
            "is_duplicate": true,
            "Storages": [{"is_duplicate": false, "Items": []}]
        });
        strip_annotations(&mut record);
        assert_eq!(record, json!({"TypeID": 1, "Storages": [{"Items": []}]}));
    }

    #[test]
    fn import_defaults_fill_only_missing_fields() {
        let mut record = Map::new();
        record.insert("Scale".to_string(), json!({"x": 2.0, "y": 2.0, "z": 2.0}));
        apply_import_defaults(&mut record);
        assert_eq!(record["Storages"], json!([]));
        assert_eq!(record["Scale"], json!({"x": 2.0, "y": 2.0, "z": 2.0}));
    }

    #[test]
    fn selection_must_be_non_empty_and_in_range() {
        assert!(check_selection(&BTreeSet::new(), 3).is_err());
        assert!(check_selection(&BTreeSet::from([0, 3]), 3).is_err());
        assert!(check_selection(&BTreeSet::from([0, 2]), 3).is_ok());
    }
}
