use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::structure::TYPE_ID_KEY;
use crate::transcode::peel;

const DATA_KEY: &str = "Data";
const CONSTRUCTIONS_KEY: &str = "Constructions";
const STRUCTURES_KEY: &str = "Structures";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureLayout {
    /// `Data.Constructions.Structures`, the layout of a game save entry.
    SaveConstructions,
    /// `Data.Structures`, as written by community base exports.
    DataStructures,
    RootStructures,
    RootList,
    SingleRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintMeta {
    pub name: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub number_of_elements: Option<u64>,
}

impl BlueprintMeta {
    fn from_root(root: &Value) -> Self {
        let text = |key: &str| match root.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) => Some(value.clone()),
            Some(other) => Some(other.to_string()),
        };
        Self {
            name: text("Name"),
            author: text("Author"),
            description: text("Description"),
            number_of_elements: root.get("NumberOfElements").and_then(Value::as_u64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub structures: Vec<Value>,
    pub meta: BlueprintMeta,
    pub layout: Option<StructureLayout>,
}

/// Finds the structure records of a save entry, a base export or a bare
/// record list, and returns them flattened in bucket order.
pub fn extract(document: &Value) -> Extraction {
    let root = peel(document);
    let meta = BlueprintMeta::from_root(&root);

    let slot = locate_slot(&root);
    let located = match &slot {
        Some((structures, layout)) if structures.is_array() || structures.is_object() => {
            Some((flatten(structures), *layout))
        }
        _ => fallback(&root),
    };

    match located {
        Some((records, layout)) => {
            let structures: Vec<Value> = records
                .into_iter()
                .map(|record| Value::Object(record.clone()))
                .collect();
            tracing::debug!(
                "located {} structures ({layout:?} layout)",
                structures.len()
            );
            Extraction {
                structures,
                meta,
                layout: Some(layout),
            }
        }
        None => {
            tracing::debug!("document has no recognizable structure list");
            Extraction {
                structures: Vec::new(),
                meta,
                layout: None,
            }
        }
    }
}

fn locate_slot(root: &Value) -> Option<(Cow<'_, Value>, StructureLayout)> {
    let Value::Object(map) = root else {
        return None;
    };
    if let Some(data) = map.get(DATA_KEY) {
        let data = peel(data);
        if let Some(constructions) = data.get(CONSTRUCTIONS_KEY) {
            let constructions = peel(constructions);
            let structures = constructions.get(STRUCTURES_KEY)?;
            return Some((
                Cow::Owned(peel(structures).into_owned()),
                StructureLayout::SaveConstructions,
            ));
        }
        let structures = data.get(STRUCTURES_KEY)?;
        return Some((
            Cow::Owned(peel(structures).into_owned()),
            StructureLayout::DataStructures,
        ));
    }
    map.get(STRUCTURES_KEY)
        .map(|structures| (peel(structures), StructureLayout::RootStructures))
}

fn fallback(root: &Value) -> Option<(Vec<&Map<String, Value>>, StructureLayout)> {
    match root {
        Value::Array(items) => Some((
            items.iter().filter_map(Value::as_object).collect(),
            StructureLayout::RootList,
        )),
        Value::Object(map) if map.contains_key(TYPE_ID_KEY) => {
            Some((vec![map], StructureLayout::SingleRecord))
        }
        _ => None,
    }
}

/// Flat view over a `Structures` value: buckets of records, bare records
/// among the buckets, or a single record. Other slots are skipped.
pub fn flatten(structures: &Value) -> Vec<&Map<String, Value>> {
    match structures {
        Value::Array(buckets) => buckets
            .iter()
            .flat_map(|bucket| match bucket {
                Value::Array(records) => records.iter().filter_map(Value::as_object).collect(),
                Value::Object(record) => vec![record],
                _ => Vec::new(),
            })
            .collect(),
        Value::Object(record) => vec![record],
        _ => Vec::new(),
    }
}

fn structures_slot(document: &Value) -> Option<&Value> {
    match document.get(DATA_KEY) {
        Some(data) => match data.get(CONSTRUCTIONS_KEY) {
            Some(constructions) => constructions.get(STRUCTURES_KEY),
            None => data.get(STRUCTURES_KEY),
        },
        None => document.get(STRUCTURES_KEY),
    }
}

fn structures_slot_mut(document: &mut Value) -> Option<&mut Value> {
    if document.get(DATA_KEY).is_none() {
        return document.get_mut(STRUCTURES_KEY);
    }
    let data = document.get_mut(DATA_KEY)?;
    if data.get(CONSTRUCTIONS_KEY).is_some() {
        data.get_mut(CONSTRUCTIONS_KEY)?.get_mut(STRUCTURES_KEY)
    } else {
        data.get_mut(STRUCTURES_KEY)
    }
}

/// Bucket array of an unwrapped save document.
pub fn buckets(document: &Value) -> Option<&Vec<Value>> {
    structures_slot(document).and_then(Value::as_array)
}

pub fn buckets_mut(document: &mut Value) -> Result<&mut Vec<Value>, CoreError> {
    let slot = structures_slot_mut(document).ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::Layout,
            "document has no Structures slot to write into",
        )
    })?;
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(buckets) => Ok(buckets),
        other => Err(CoreError::new(
            CoreErrorCode::Layout,
            format!(
                "Structures slot holds {} instead of a bucket array",
                kind_of(other)
            ),
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
