mod document;
mod engine;
mod error;
mod plan;
mod types;

pub use document::EntryDocument;
pub use engine::{Engine, Session};
pub use error::{CoreError, CoreErrorCode};
pub use plan::{ImportPlan, StructureListing, summarize};
pub use types::{DeleteReport, GameStats, ImportOptions, ImportReport, StructureSummary};

pub use crate::grouping::Grouping;
pub use crate::locate::{BlueprintMeta, StructureLayout};
pub use crate::structure::Position;
