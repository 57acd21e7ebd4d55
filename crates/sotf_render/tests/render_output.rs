use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use sotf_core::core_api::{Engine, ImportOptions, Session};
use sotf_render::{
    JsonStyle, TextRenderOptions, render_delete_report_text, render_import_plan_json,
    render_import_plan_text, render_import_report_json, render_import_report_text,
    render_session_json, render_session_text, render_session_text_with_options,
    render_structures_json, render_structures_text,
};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(name: &str) -> String {
    let path = workspace_root().join("tests/fixtures").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {:?}: {}", path, e))
}

fn session() -> Session {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for name in ["GameStateSaveData.json", "ConstructionsSaveData.json"] {
        writer
            .start_file(format!("Slot7/{name}"), SimpleFileOptions::default())
            .expect("failed to start zip entry");
        writer
            .write_all(fixture(name).as_bytes())
            .expect("failed to write zip entry");
    }
    writer
        .start_file("Slot7/Thumbnail.png", SimpleFileOptions::default())
        .expect("failed to start zip entry");
    writer.write_all(&[0x89, b'P']).expect("failed to write zip entry");
    let bytes = writer.finish().expect("failed to finish zip").into_inner();

    Engine::new()
        .open_archive_named(bytes, Some("SaveData.zip"))
        .expect("fixture should open")
}

#[test]
fn session_json_uses_canonical_key_order() {
    let value = render_session_json(&session(), JsonStyle::CanonicalV1);
    let keys: Vec<&str> = value
        .as_object()
        .expect("json should be an object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(
        keys,
        vec![
            "display_name",
            "entries",
            "json_entries",
            "constructions_entry",
            "game_stats"
        ]
    );
    assert_eq!(value["display_name"], "Slot7/SaveData.zip");
    assert_eq!(value["game_stats"]["crash_site"], "Beach");
    assert_eq!(value["game_stats"]["days"], 12);
}

#[test]
fn session_text_lists_json_entries_and_stats() {
    let session = session();
    let text = render_session_text(&session);
    assert!(text.starts_with("Save: Slot7/SaveData.zip\nEntries: 3 (2 JSON)\n"));
    assert!(text.contains("  Slot7/ConstructionsSaveData.json\n"));
    assert!(!text.contains("Thumbnail.png"));
    assert!(text.contains("Constructions: Slot7/ConstructionsSaveData.json\n"));
    assert!(text.contains("  Crash Site: Beach\n"));

    let verbose = render_session_text_with_options(&session, TextRenderOptions { verbose: true });
    assert!(verbose.contains("  Slot7/Thumbnail.png\n"));
}

#[test]
fn structure_listing_text_groups_members() {
    let listing = session()
        .structure_listing(&ImportOptions::default())
        .expect("listing should succeed");
    let text = render_structures_text(&listing.summaries(), listing.grouping());
    assert_eq!(
        text,
        "Structure Group 1 (2)\n\
         \x20 [0] TypeID=0 pos=(10.00, 5.00, -3.50)\n\
         \x20 [1] TypeID=0 pos=(12.00, 5.00, -3.50)\n\
         Structure Group 2 (1)\n\
         \x20 [2] TypeID=2 pos=(200.00, 3.00, 40.00)\n"
    );
}

#[test]
fn structure_listing_json_numbers_groups_from_one() {
    let listing = session()
        .structure_listing(&ImportOptions::default())
        .expect("listing should succeed");
    let value = render_structures_json(&listing.summaries(), listing.grouping(), JsonStyle::CanonicalV1);
    assert_eq!(value["group_count"], 2);
    assert_eq!(value["groups"][0]["id"], 1);
    assert_eq!(value["groups"][1]["label"], "Structure Group 2");
    assert_eq!(value["groups"][1]["structures"][0]["index"], 2);
    assert_eq!(value["groups"][1]["structures"][0]["type_id"], 2);
    assert_eq!(value["groups"][1]["structures"][0]["duplicate"], false);
}

#[test]
fn import_plan_marks_duplicates() {
    let plan = session()
        .plan_import(&fixture("base_export.json"), &ImportOptions::default())
        .expect("plan should succeed");

    let text = render_import_plan_text(&plan);
    assert!(text.starts_with("Blueprint: Lake Cabin by Kelvin\n  Two walls and a rope\n"));
    assert!(text.contains("4 structures in 3 groups, 1 look like duplicates\n"));
    assert!(text.contains("  [0] TypeID=0 pos=(10.01, 5.00, -3.50) [duplicate]\n"));

    let value = render_import_plan_json(&plan, JsonStyle::CanonicalV1);
    assert_eq!(value["layout"], "data_structures");
    assert_eq!(value["duplicate_count"], 1);
    assert_eq!(value["meta"]["number_of_elements"], 4);
    assert_eq!(value["groups"][0]["structures"][0]["duplicate"], true);
}

#[test]
fn reports_render_counts() {
    let session = session();
    let plan = session
        .plan_import(&fixture("base_export.json"), &ImportOptions::default())
        .expect("plan should succeed");
    let (_, report) = session
        .import_structures(&plan, &plan.all_indices())
        .expect("import should succeed");

    let text = render_import_report_text(&report);
    assert!(text.starts_with("Imported 4 structures into Slot7/ConstructionsSaveData.json\n"));
    assert!(text.contains("  TypeIDs: 0, 3\n"));
    assert!(text.contains("1 selected structure(s) look like duplicates"));
    assert!(text.contains("Cleared 1 links"));

    let value = render_import_report_json(&report, JsonStyle::CanonicalV1);
    assert_eq!(value["touched_type_ids"], serde_json::json!([0, 3]));

    let (_, deleted) = session
        .delete_structures(&BTreeSet::from([0, 1]))
        .expect("delete should succeed");
    assert_eq!(
        render_delete_report_text(&deleted),
        "Deleted 2 structures from Slot7/ConstructionsSaveData.json, 1 remain in 3 buckets\n"
    );
}
