use serde::{Deserialize, Serialize};

use crate::grouping::DEFAULT_GROUP_THRESHOLD;
use crate::structure::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub days: Option<i64>,
    pub hours: Option<f64>,
    pub game_type: Option<String>,
    pub crash_site: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub group_threshold: f64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            group_threshold: DEFAULT_GROUP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub index: usize,
    pub type_id: Option<u64>,
    pub position: Option<Position>,
    pub group: usize,
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportReport {
    pub entry: String,
    pub imported: usize,
    pub duplicates: usize,
    pub dropped_links: usize,
    pub skipped: usize,
    pub touched_type_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteReport {
    pub entry: String,
    pub deleted: usize,
    pub remaining: usize,
    pub bucket_count: usize,
}
