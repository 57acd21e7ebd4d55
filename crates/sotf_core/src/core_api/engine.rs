use std::collections::BTreeSet;

use serde_json::Value;

use crate::archive::SaveArchive;
use crate::duplicates::{FingerprintSet, annotate};
use crate::grouping::group;
use crate::locate::extract;

use super::document::EntryDocument;
use super::error::{CoreError, CoreErrorCode};
use super::plan::{ImportPlan, StructureListing};
use super::types::{DeleteReport, GameStats, ImportOptions, ImportReport};

const DEFAULT_UPLOAD_NAME: &str = "SaveData.zip";
const CONSTRUCTIONS_MARKER: &str = "construction";
const GAME_STATE_MARKER: &str = "gamestatesavedata.json";

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

#[derive(Debug, Clone)]
pub struct Session {
    archive: SaveArchive,
    upload_name: Option<String>,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_archive<B: AsRef<[u8]>>(&self, bytes: B) -> Result<Session, CoreError> {
        self.open_archive_named(bytes, None)
    }

    pub fn open_archive_named<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        upload_name: Option<&str>,
    ) -> Result<Session, CoreError> {
        let archive = SaveArchive::from_bytes(bytes.as_ref().to_vec())?;
        Ok(Session {
            archive,
            upload_name: upload_name.map(str::to_string),
        })
    }
}

impl Session {
    pub fn archive(&self) -> &SaveArchive {
        &self.archive
    }

    pub fn entries(&self) -> &[String] {
        self.archive.entries()
    }

    pub fn json_entries(&self) -> Vec<&str> {
        self.archive.json_entries()
    }

    /// Upload name prefixed with the save slot folder, e.g.
    /// `Multiplayer/123/SaveData.zip`.
    pub fn display_name(&self) -> String {
        let upload = self.upload_name.as_deref().unwrap_or(DEFAULT_UPLOAD_NAME);
        let entries = self.json_entries();
        let folder = entries
            .first()
            .and_then(|name| name.rsplit_once('/'))
            .map(|(folder, _)| folder)
            .filter(|folder| !folder.is_empty());
        match folder {
            Some(folder) => format!("{folder}/{upload}"),
            None => upload.to_string(),
        }
    }

    pub fn constructions_entry(&self) -> Option<&str> {
        self.json_entries()
            .into_iter()
            .find(|name| name.to_lowercase().contains(CONSTRUCTIONS_MARKER))
    }

    pub fn game_state_entry(&self) -> Option<&str> {
        self.json_entries()
            .into_iter()
            .find(|name| name.to_lowercase().contains(GAME_STATE_MARKER))
    }

    /// Headline stats from the game state entry. A missing or unreadable
    /// entry yields `None`.
    pub fn game_stats(&self) -> Option<GameStats> {
        let name = self.game_state_entry()?;
        let document = match self.open_entry(name) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!("could not read game state from {name}: {err}");
                return None;
            }
        };
        let state = document
            .document()
            .get("Data")
            .and_then(|data| data.get("GameState"));
        let field = |key: &str| state.and_then(|state| state.get(key));
        Some(GameStats {
            days: field("GameDays").and_then(Value::as_i64),
            hours: field("GameHours").and_then(Value::as_f64),
            game_type: field("GameType").and_then(display_text),
            crash_site: field("CrashSite")
                .and_then(display_text)
                .map(|site| title_case(&site))
                .unwrap_or_else(|| "N/A".to_string()),
        })
    }

    pub fn open_entry(&self, name: &str) -> Result<EntryDocument, CoreError> {
        let text = self.archive.read_text(name)?;
        EntryDocument::from_text(name, &text)
    }

    pub fn open_constructions(&self) -> Result<EntryDocument, CoreError> {
        let name = self.constructions_entry().ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::Archive,
                "save has no constructions entry",
            )
        })?;
        self.open_entry(name)
    }

    pub fn export_entry(&self, name: &str) -> Result<String, CoreError> {
        self.open_entry(name)?.editable_text()
    }

    pub fn apply_entry_edit(&self, name: &str, edited_text: &str) -> Result<Vec<u8>, CoreError> {
        let text = self.open_entry(name)?.rewrap_text(edited_text)?;
        self.write_entry(name, &text)
    }

    pub fn write_entry(&self, name: &str, text: &str) -> Result<Vec<u8>, CoreError> {
        self.archive.replace_entry(name, text)
    }

    pub fn plan_import(
        &self,
        base_text: &str,
        options: &ImportOptions,
    ) -> Result<ImportPlan, CoreError> {
        if base_text.trim().is_empty() {
            return Err(CoreError::selection("base file is empty"));
        }
        let base: Value = serde_json::from_str(base_text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("failed to parse base file: {e}"),
            )
        })?;
        let extraction = extract(&base);

        let existing = match self.constructions_entry() {
            Some(name) => match self.open_entry(name) {
                Ok(document) => document.fingerprints(),
                Err(err) => {
                    tracing::warn!("skipping duplicate check, could not read {name}: {err}");
                    FingerprintSet::default()
                }
            },
            None => FingerprintSet::default(),
        };
        let duplicate_flags = annotate(&extraction.structures, &existing);
        let grouping = group(&extraction.structures, options.group_threshold);
        tracing::debug!(
            "planned import of {} structures in {} groups",
            extraction.structures.len(),
            grouping.group_count()
        );

        Ok(ImportPlan {
            candidates: extraction.structures,
            meta: extraction.meta,
            layout: extraction.layout,
            duplicate_flags,
            grouping,
        })
    }

    pub fn import_structures(
        &self,
        plan: &ImportPlan,
        indices: &BTreeSet<usize>,
    ) -> Result<(Vec<u8>, ImportReport), CoreError> {
        let selected = plan.select(indices)?;
        let duplicates = plan.duplicate_count(indices);
        if duplicates > 0 {
            tracing::warn!(
                "{duplicates} selected structure(s) look like duplicates of existing ones"
            );
        }

        let mut document = self.open_constructions()?;
        let outcome = document.import(&selected)?;
        let bytes = self.write_entry(document.name(), &document.to_save_text()?)?;

        let report = ImportReport {
            entry: document.name().to_string(),
            imported: outcome.imported,
            duplicates,
            dropped_links: outcome.dropped_links,
            skipped: outcome.skipped,
            touched_type_ids: outcome.touched_type_ids,
        };
        Ok((bytes, report))
    }

    pub fn structure_listing(&self, options: &ImportOptions) -> Result<StructureListing, CoreError> {
        let document = self.open_constructions()?;
        let structures = document.structures();
        let grouping = group(&structures, options.group_threshold);
        Ok(StructureListing {
            entry: document.name().to_string(),
            structures,
            grouping,
        })
    }

    pub fn delete_structures(
        &self,
        indices: &BTreeSet<usize>,
    ) -> Result<(Vec<u8>, DeleteReport), CoreError> {
        let mut document = self.open_constructions()?;
        let remaining = document.delete(indices)?;
        let bytes = self.write_entry(document.name(), &document.to_save_text()?)?;

        let report = DeleteReport {
            entry: document.name().to_string(),
            deleted: indices.len(),
            remaining,
            bucket_count: document.bucket_count(),
        };
        Ok((bytes, report))
    }
}

fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

// Upper-cases the first letter of every run of letters, lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if in_word {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        in_word = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::title_case;

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("beach"), "Beach");
        assert_eq!(title_case("SNOWY mountain"), "Snowy Mountain");
        assert_eq!(title_case("north_east-2b"), "North_East-2B");
    }
}
