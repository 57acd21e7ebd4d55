use std::fmt::Write as _;

use serde_json::{Map as JsonMap, Value as JsonValue};
use sotf_core::core_api::{
    BlueprintMeta, DeleteReport, GameStats, Grouping, ImportPlan, ImportReport, Position, Session,
    StructureLayout, StructureSummary,
};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    pub verbose: bool,
}

pub fn render_session_json(session: &Session, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(session_json(session)),
    }
}

pub fn render_session_text(session: &Session) -> String {
    render_session_text_with_options(session, TextRenderOptions::default())
}

pub fn render_session_text_with_options(session: &Session, options: TextRenderOptions) -> String {
    let mut out = String::new();
    let json_entries = session.json_entries();

    writeln!(&mut out, "Save: {}", session.display_name()).expect("writing to String cannot fail");
    writeln!(
        &mut out,
        "Entries: {} ({} JSON)",
        session.entries().len(),
        json_entries.len()
    )
    .expect("writing to String cannot fail");
    if options.verbose {
        for entry in session.entries() {
            writeln!(&mut out, "  {entry}").expect("writing to String cannot fail");
        }
    } else {
        for entry in &json_entries {
            writeln!(&mut out, "  {entry}").expect("writing to String cannot fail");
        }
    }
    writeln!(
        &mut out,
        "Constructions: {}",
        session.constructions_entry().unwrap_or("none")
    )
    .expect("writing to String cannot fail");

    if let Some(stats) = session.game_stats() {
        writeln!(&mut out).expect("writing to String cannot fail");
        writeln!(&mut out, "Game stats:").expect("writing to String cannot fail");
        for (label, value) in stats_rows(&stats) {
            writeln!(&mut out, "  {label:<11} {value}").expect("writing to String cannot fail");
        }
    }
    out
}

pub fn render_structures_json(
    summaries: &[StructureSummary],
    grouping: &Grouping,
    style: JsonStyle,
) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(structures_json(summaries, grouping)),
    }
}

/// Grouped listing, one header per spatial group followed by its members.
pub fn render_structures_text(summaries: &[StructureSummary], grouping: &Grouping) -> String {
    let mut out = String::new();
    for (id, members) in grouping.groups().iter().enumerate() {
        writeln!(&mut out, "{} ({})", grouping.label(id), members.len())
            .expect("writing to String cannot fail");
        for summary in members.iter().filter_map(|&index| summaries.get(index)) {
            writeln!(&mut out, "  {}", structure_line(summary)).expect("writing to String cannot fail");
        }
    }
    out
}

pub fn render_import_plan_json(plan: &ImportPlan, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert("meta".to_string(), meta_json(plan.meta()));
            out.insert(
                "layout".to_string(),
                plan.layout()
                    .map_or(JsonValue::Null, |layout| JsonValue::String(layout_name(layout).to_string())),
            );
            out.insert("structure_count".to_string(), JsonValue::from(plan.len()));
            out.insert(
                "duplicate_count".to_string(),
                JsonValue::from(plan.duplicate_count(&plan.all_indices())),
            );
            out.extend(structures_json(&plan.summaries(), plan.grouping()));
            JsonValue::Object(out)
        }
    }
}

pub fn render_import_plan_text(plan: &ImportPlan) -> String {
    let mut out = String::new();
    let meta = plan.meta();
    if !meta.is_empty() {
        writeln!(
            &mut out,
            "Blueprint: {} by {}",
            meta.name.as_deref().unwrap_or("(unnamed)"),
            meta.author.as_deref().unwrap_or("(unknown)")
        )
        .expect("writing to String cannot fail");
        if let Some(description) = &meta.description {
            writeln!(&mut out, "  {description}").expect("writing to String cannot fail");
        }
    }
    let duplicates = plan.duplicate_count(&plan.all_indices());
    writeln!(
        &mut out,
        "{} structures in {} groups, {} look like duplicates",
        plan.len(),
        plan.grouping().group_count(),
        duplicates
    )
    .expect("writing to String cannot fail");
    if plan.is_empty() {
        return out;
    }
    writeln!(&mut out).expect("writing to String cannot fail");
    out.push_str(&render_structures_text(&plan.summaries(), plan.grouping()));
    out
}

pub fn render_import_report_json(report: &ImportReport, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert("entry".to_string(), JsonValue::String(report.entry.clone()));
            out.insert("imported".to_string(), JsonValue::from(report.imported));
            out.insert("duplicates".to_string(), JsonValue::from(report.duplicates));
            out.insert(
                "dropped_links".to_string(),
                JsonValue::from(report.dropped_links),
            );
            out.insert("skipped".to_string(), JsonValue::from(report.skipped));
            out.insert(
                "touched_type_ids".to_string(),
                JsonValue::Array(
                    report
                        .touched_type_ids
                        .iter()
                        .map(|&id| JsonValue::from(id))
                        .collect(),
                ),
            );
            JsonValue::Object(out)
        }
    }
}

pub fn render_import_report_text(report: &ImportReport) -> String {
    let mut out = String::new();
    writeln!(
        &mut out,
        "Imported {} structures into {}",
        report.imported, report.entry
    )
    .expect("writing to String cannot fail");
    if !report.touched_type_ids.is_empty() {
        let ids: Vec<String> = report
            .touched_type_ids
            .iter()
            .map(u64::to_string)
            .collect();
        writeln!(&mut out, "  TypeIDs: {}", ids.join(", ")).expect("writing to String cannot fail");
    }
    if report.duplicates > 0 {
        writeln!(
            &mut out,
            "  Warning: {} selected structure(s) look like duplicates. Test in-game for stability!",
            report.duplicates
        )
        .expect("writing to String cannot fail");
    }
    if report.dropped_links > 0 {
        writeln!(
            &mut out,
            "  Cleared {} links pointing outside the import",
            report.dropped_links
        )
        .expect("writing to String cannot fail");
    }
    if report.skipped > 0 {
        writeln!(
            &mut out,
            "  Skipped {} structures without a usable TypeID",
            report.skipped
        )
        .expect("writing to String cannot fail");
    }
    out
}

pub fn render_delete_report_json(report: &DeleteReport, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert("entry".to_string(), JsonValue::String(report.entry.clone()));
            out.insert("deleted".to_string(), JsonValue::from(report.deleted));
            out.insert("remaining".to_string(), JsonValue::from(report.remaining));
            out.insert(
                "bucket_count".to_string(),
                JsonValue::from(report.bucket_count),
            );
            JsonValue::Object(out)
        }
    }
}

pub fn render_delete_report_text(report: &DeleteReport) -> String {
    format!(
        "Deleted {} structures from {}, {} remain in {} buckets\n",
        report.deleted, report.entry, report.remaining, report.bucket_count
    )
}

fn session_json(session: &Session) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    out.insert(
        "display_name".to_string(),
        JsonValue::String(session.display_name()),
    );
    out.insert(
        "entries".to_string(),
        JsonValue::Array(
            session
                .entries()
                .iter()
                .map(|entry| JsonValue::String(entry.clone()))
                .collect(),
        ),
    );
    out.insert(
        "json_entries".to_string(),
        JsonValue::Array(
            session
                .json_entries()
                .into_iter()
                .map(|entry| JsonValue::String(entry.to_string()))
                .collect(),
        ),
    );
    out.insert(
        "constructions_entry".to_string(),
        session
            .constructions_entry()
            .map_or(JsonValue::Null, |entry| JsonValue::String(entry.to_string())),
    );
    out.insert(
        "game_stats".to_string(),
        session
            .game_stats()
            .map_or(JsonValue::Null, |stats| game_stats_json(&stats)),
    );
    out
}

fn game_stats_json(stats: &GameStats) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "days".to_string(),
        stats.days.map_or(JsonValue::Null, JsonValue::from),
    );
    out.insert(
        "hours".to_string(),
        stats.hours.map_or(JsonValue::Null, JsonValue::from),
    );
    out.insert(
        "game_type".to_string(),
        stats
            .game_type
            .clone()
            .map_or(JsonValue::Null, JsonValue::String),
    );
    out.insert(
        "crash_site".to_string(),
        JsonValue::String(stats.crash_site.clone()),
    );
    JsonValue::Object(out)
}

fn stats_rows(stats: &GameStats) -> Vec<(&'static str, String)> {
    vec![
        (
            "Days:",
            stats
                .days
                .map_or_else(|| NOT_AVAILABLE.to_string(), |days| days.to_string()),
        ),
        (
            "Hours:",
            stats
                .hours
                .map_or_else(|| NOT_AVAILABLE.to_string(), |hours| hours.to_string()),
        ),
        (
            "Type:",
            stats
                .game_type
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ),
        ("Crash Site:", stats.crash_site.clone()),
    ]
}

fn meta_json(meta: &BlueprintMeta) -> JsonValue {
    let text = |value: &Option<String>| value.clone().map_or(JsonValue::Null, JsonValue::String);
    let mut out = JsonMap::new();
    out.insert("name".to_string(), text(&meta.name));
    out.insert("author".to_string(), text(&meta.author));
    out.insert("description".to_string(), text(&meta.description));
    out.insert(
        "number_of_elements".to_string(),
        meta.number_of_elements.map_or(JsonValue::Null, JsonValue::from),
    );
    JsonValue::Object(out)
}

fn structures_json(
    summaries: &[StructureSummary],
    grouping: &Grouping,
) -> JsonMap<String, JsonValue> {
    let groups = grouping
        .groups()
        .iter()
        .enumerate()
        .map(|(id, members)| {
            let mut group = JsonMap::new();
            group.insert("id".to_string(), JsonValue::from(id + 1));
            group.insert("label".to_string(), JsonValue::String(grouping.label(id)));
            group.insert(
                "structures".to_string(),
                JsonValue::Array(
                    members
                        .iter()
                        .filter_map(|&index| summaries.get(index))
                        .map(structure_json)
                        .collect(),
                ),
            );
            JsonValue::Object(group)
        })
        .collect();

    let mut out = JsonMap::new();
    out.insert(
        "group_count".to_string(),
        JsonValue::from(grouping.group_count()),
    );
    out.insert("groups".to_string(), JsonValue::Array(groups));
    out
}

fn structure_json(summary: &StructureSummary) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("index".to_string(), JsonValue::from(summary.index));
    out.insert(
        "type_id".to_string(),
        summary.type_id.map_or(JsonValue::Null, JsonValue::from),
    );
    out.insert(
        "position".to_string(),
        summary.position.map_or(JsonValue::Null, position_json),
    );
    out.insert("duplicate".to_string(), JsonValue::Bool(summary.duplicate));
    JsonValue::Object(out)
}

fn position_json(position: Position) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("x".to_string(), JsonValue::from(position.x));
    out.insert("y".to_string(), JsonValue::from(position.y));
    out.insert("z".to_string(), JsonValue::from(position.z));
    JsonValue::Object(out)
}

fn structure_line(summary: &StructureSummary) -> String {
    let type_id = summary
        .type_id
        .map_or_else(|| "?".to_string(), |id| id.to_string());
    let position = summary
        .position
        .map_or_else(|| "none".to_string(), |position| position.to_string());
    let mut line = format!("[{}] TypeID={} pos={}", summary.index, type_id, position);
    if summary.duplicate {
        line.push_str(" [duplicate]");
    }
    line
}

fn layout_name(layout: StructureLayout) -> &'static str {
    match layout {
        StructureLayout::SaveConstructions => "save_constructions",
        StructureLayout::DataStructures => "data_structures",
        StructureLayout::RootStructures => "root_structures",
        StructureLayout::RootList => "root_list",
        StructureLayout::SingleRecord => "single_record",
    }
}
