use std::collections::BTreeSet;

use serde_json::Value;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::structure::{bucket_type_id, check_selection, strip_annotations};

/// Drops the records at `indices` from a flat structure list and rebuilds
/// the dense per-TypeID bucket array from the survivors. Slots no survivor
/// lands in are `null`.
pub fn delete_and_rebucket(
    flat: Vec<Value>,
    indices: &BTreeSet<usize>,
) -> Result<Vec<Value>, CoreError> {
    check_selection(indices, flat.len())?;

    let mut buckets: Vec<Option<Vec<Value>>> = Vec::new();
    for (index, mut record) in flat.into_iter().enumerate() {
        if indices.contains(&index) {
            continue;
        }
        let type_id = bucket_type_id(&record).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::InvalidStructure,
                format!("structure {index} has no usable TypeID and cannot be re-bucketed"),
            )
        })? as usize;
        strip_annotations(&mut record);
        if buckets.len() <= type_id {
            buckets.resize_with(type_id + 1, || None);
        }
        buckets[type_id].get_or_insert_with(Vec::new).push(record);
    }

    tracing::info!(
        "deleted {} structures, {} buckets remain",
        indices.len(),
        buckets.len()
    );
    Ok(buckets
        .into_iter()
        .map(|bucket| bucket.map_or(Value::Null, Value::Array))
        .collect())
}
