use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::structure::{
    LINKED_STRUCTURES_KEY, apply_import_defaults, bucket_type_id, strip_annotations,
};

pub use crate::structure::MAX_TYPE_ID;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub imported: usize,
    pub dropped_links: usize,
    pub skipped: usize,
    pub touched_type_ids: Vec<u64>,
}

/// Appends `selected` to the per-TypeID buckets of a save, one batch per
/// TypeID in first-seen order. Integer links inside a batch are rewritten to
/// point at the records' new positions in their bucket; links that leave the
/// batch become `null`.
pub fn import_structures<T: Borrow<Value>>(
    buckets: &mut Vec<Value>,
    selected: &[T],
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut batches: Vec<(u64, Vec<Value>)> = Vec::new();

    for record in selected {
        let record = record.borrow();
        let Some(type_id) = bucket_type_id(record) else {
            tracing::warn!("skipping structure without a usable TypeID");
            outcome.skipped += 1;
            continue;
        };
        let mut record = record.clone();
        strip_annotations(&mut record);
        if let Value::Object(map) = &mut record {
            apply_import_defaults(map);
        }
        match batches.iter_mut().find(|(id, _)| *id == type_id) {
            Some((_, batch)) => batch.push(record),
            None => batches.push((type_id, vec![record])),
        }
    }

    for (type_id, mut batch) in batches {
        let index = type_id as usize;
        if buckets.len() <= index {
            buckets.resize(index + 1, Value::Null);
        }
        let mut bucket = match std::mem::take(&mut buckets[index]) {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            other => {
                tracing::warn!("replacing non-array bucket for TypeID {type_id}: {other}");
                Vec::new()
            }
        };

        let existing_len = bucket.len();
        let batch_len = batch.len();
        for record in &mut batch {
            outcome.dropped_links += remap_links(record, existing_len, batch_len);
        }

        outcome.imported += batch_len;
        outcome.touched_type_ids.push(type_id);
        bucket.append(&mut batch);
        buckets[index] = Value::Array(bucket);
    }

    if outcome.dropped_links > 0 {
        tracing::warn!(
            "{} links pointed outside their import batch and were cleared",
            outcome.dropped_links
        );
    }
    tracing::info!(
        "imported {} structures into {} buckets",
        outcome.imported,
        outcome.touched_type_ids.len()
    );
    outcome
}

fn remap_links(record: &mut Value, existing_len: usize, batch_len: usize) -> usize {
    let Some(Value::Array(links)) = record.get_mut(LINKED_STRUCTURES_KEY) else {
        return 0;
    };
    let mut dropped = 0;
    for link in links.iter_mut() {
        let replacement = match link {
            Value::Null | Value::Object(_) => continue,
            Value::Number(n) => match n.as_u64() {
                Some(k) if (k as usize) < batch_len => Some(Value::from(existing_len as u64 + k)),
                _ => None,
            },
            _ => None,
        };
        match replacement {
            Some(value) => *link = value,
            None => {
                *link = Value::Null;
                dropped += 1;
            }
        }
    }
    dropped
}
