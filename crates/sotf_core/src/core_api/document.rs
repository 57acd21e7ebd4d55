use std::borrow::Borrow;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::delete::delete_and_rebucket;
use crate::duplicates::FingerprintSet;
use crate::locate::{self, Extraction};
use crate::merge::{self, MergeOutcome};
use crate::structure::strip_duplicate_markers;
use crate::transcode;

use super::error::{CoreError, CoreErrorCode};

/// One JSON entry of a save: the pristine parse of its text, kept as the
/// re-encoding template, and the fully unwrapped document that edits apply to.
#[derive(Debug, Clone)]
pub struct EntryDocument {
    name: String,
    template: Value,
    document: Value,
}

impl EntryDocument {
    pub fn from_text(name: impl Into<String>, text: &str) -> Result<Self, CoreError> {
        let name = name.into();
        let template: Value = serde_json::from_str(text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("failed to parse entry {name}: {e}"),
            )
        })?;
        let document = transcode::unwrap(template.clone());
        Ok(Self {
            name,
            template,
            document,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Value {
        &mut self.document
    }

    pub fn editable_text(&self) -> Result<String, CoreError> {
        let mut document = self.document.clone();
        strip_duplicate_markers(&mut document);
        transcode::to_editable_string(&document)
    }

    pub fn rewrap_text(&self, edited_text: &str) -> Result<String, CoreError> {
        transcode::rewrap_text(edited_text, &self.template)
    }

    pub fn to_save_text(&self) -> Result<String, CoreError> {
        transcode::to_save_string(&transcode::rewrap(&self.document, &self.template)?)
    }

    pub fn extraction(&self) -> Extraction {
        locate::extract(&self.document)
    }

    pub fn structures(&self) -> Vec<Value> {
        self.extraction().structures
    }

    pub fn fingerprints(&self) -> FingerprintSet {
        FingerprintSet::build(&self.structures())
    }

    pub fn bucket_count(&self) -> usize {
        locate::buckets(&self.document).map_or(0, Vec::len)
    }

    pub fn import<T: Borrow<Value>>(&mut self, selected: &[T]) -> Result<MergeOutcome, CoreError> {
        let buckets = locate::buckets_mut(&mut self.document)?;
        Ok(merge::import_structures(buckets, selected))
    }

    /// Removes the structures at the given flat indices and returns how many
    /// remain.
    pub fn delete(&mut self, indices: &BTreeSet<usize>) -> Result<usize, CoreError> {
        let flat = self.structures();
        let remaining = flat.len().saturating_sub(indices.len());
        let rebuilt = delete_and_rebucket(flat, indices)?;
        *locate::buckets_mut(&mut self.document)? = rebuilt;
        Ok(remaining)
    }
}
