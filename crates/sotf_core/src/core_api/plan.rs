use std::collections::BTreeSet;

use serde_json::Value;

use crate::duplicates::count_flagged;
use crate::grouping::Grouping;
use crate::locate::{BlueprintMeta, StructureLayout};
use crate::structure::{check_selection, position_of, type_id_of};

use super::error::CoreError;
use super::types::StructureSummary;

/// Structures found in a base file, ready to be picked for import.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub(crate) candidates: Vec<Value>,
    pub(crate) meta: BlueprintMeta,
    pub(crate) layout: Option<StructureLayout>,
    pub(crate) duplicate_flags: Vec<bool>,
    pub(crate) grouping: Grouping,
}

impl ImportPlan {
    pub fn candidates(&self) -> &[Value] {
        &self.candidates
    }

    pub fn meta(&self) -> &BlueprintMeta {
        &self.meta
    }

    pub fn layout(&self) -> Option<StructureLayout> {
        self.layout
    }

    pub fn duplicate_flags(&self) -> &[bool] {
        &self.duplicate_flags
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn duplicate_count(&self, indices: &BTreeSet<usize>) -> usize {
        count_flagged(&self.duplicate_flags, indices)
    }

    pub fn all_indices(&self) -> BTreeSet<usize> {
        (0..self.candidates.len()).collect()
    }

    pub fn selection_for_groups(&self, groups: &[usize]) -> Result<BTreeSet<usize>, CoreError> {
        select_groups(&self.grouping, groups)
    }

    pub fn select(&self, indices: &BTreeSet<usize>) -> Result<Vec<&Value>, CoreError> {
        check_selection(indices, self.candidates.len())?;
        Ok(indices.iter().map(|&index| &self.candidates[index]).collect())
    }

    pub fn summaries(&self) -> Vec<StructureSummary> {
        summarize(&self.candidates, &self.grouping, Some(&self.duplicate_flags))
    }
}

/// The structures of a save's constructions entry with their spatial groups.
#[derive(Debug, Clone)]
pub struct StructureListing {
    pub(crate) entry: String,
    pub(crate) structures: Vec<Value>,
    pub(crate) grouping: Grouping,
}

impl StructureListing {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn structures(&self) -> &[Value] {
        &self.structures
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn selection_for_groups(&self, groups: &[usize]) -> Result<BTreeSet<usize>, CoreError> {
        select_groups(&self.grouping, groups)
    }

    pub fn summaries(&self) -> Vec<StructureSummary> {
        summarize(&self.structures, &self.grouping, None)
    }
}

fn select_groups(grouping: &Grouping, groups: &[usize]) -> Result<BTreeSet<usize>, CoreError> {
    if groups.is_empty() {
        return Err(CoreError::selection("no structure groups selected"));
    }
    let mut selected = BTreeSet::new();
    for &group in groups {
        if group >= grouping.group_count() {
            return Err(CoreError::selection(format!(
                "structure group {} does not exist, {} groups available",
                group + 1,
                grouping.group_count()
            )));
        }
        selected.extend(grouping.members(group));
    }
    Ok(selected)
}

pub fn summarize(
    structures: &[Value],
    grouping: &Grouping,
    duplicate_flags: Option<&[bool]>,
) -> Vec<StructureSummary> {
    structures
        .iter()
        .enumerate()
        .map(|(index, record)| StructureSummary {
            index,
            type_id: type_id_of(record),
            position: position_of(record).valid(),
            group: grouping.group_of(index).unwrap_or_default(),
            duplicate: duplicate_flags
                .and_then(|flags| flags.get(index).copied())
                .unwrap_or(false),
        })
        .collect()
}
