use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sotf_core::core_api::{CoreError, CoreErrorCode, Engine, ImportOptions, Session};
use sotf_core::grouping::DEFAULT_GROUP_THRESHOLD;
use sotf_render::{
    JsonStyle, render_delete_report_json, render_import_plan_json, render_import_report_json,
    render_session_json, render_structures_json,
};
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebOptions {
    pub upload_name: Option<String>,
    pub threshold: f64,
    pub select: Option<Vec<usize>>,
    /// Group numbers as shown in listings, starting at 1.
    pub groups: Option<Vec<usize>>,
    pub all: bool,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            upload_name: None,
            threshold: DEFAULT_GROUP_THRESHOLD,
            select: None,
            groups: None,
            all: false,
        }
    }
}

impl WebOptions {
    fn import_options(&self) -> ImportOptions {
        ImportOptions {
            group_threshold: self.threshold,
        }
    }
}

/// A rewritten save together with the JSON report of what changed.
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct EditedSave {
    bytes: Vec<u8>,
    report: String,
}

#[wasm_bindgen]
impl EditedSave {
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn report(&self) -> String {
        self.report.clone()
    }
}

#[derive(Debug, Clone)]
struct WebError {
    code: &'static str,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct WebErrorPayload {
    code: String,
    message: String,
}

impl WebError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_js_value(&self) -> JsValue {
        let payload = WebErrorPayload {
            code: self.code.to_string(),
            message: self.message.clone(),
        };
        serde_wasm_bindgen::to_value(&payload).unwrap_or_else(|_| {
            JsValue::from_str(&format!("{}: {}", payload.code, payload.message))
        })
    }
}

impl From<CoreError> for WebError {
    fn from(err: CoreError) -> Self {
        let code = match err.code {
            CoreErrorCode::Io | CoreErrorCode::Archive => "unsupported_file",
            CoreErrorCode::Parse => "parse_failed",
            CoreErrorCode::Layout | CoreErrorCode::InvalidStructure => "invalid_save",
            CoreErrorCode::Selection => "invalid_selection",
        };
        Self::new(code, err.message)
    }
}

#[wasm_bindgen]
pub fn inspect_save(save_bytes: &[u8], options: JsValue) -> Result<String, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    inspect_save_impl(save_bytes, &parsed_options).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn list_structures(save_bytes: &[u8], options: JsValue) -> Result<String, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    list_structures_impl(save_bytes, &parsed_options).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn export_entry(save_bytes: &[u8], entry: &str) -> Result<String, JsValue> {
    export_entry_impl(save_bytes, entry).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn apply_entry_edit(
    save_bytes: &[u8],
    entry: &str,
    edited_text: &str,
) -> Result<Vec<u8>, JsValue> {
    apply_entry_edit_impl(save_bytes, entry, edited_text).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn plan_import(save_bytes: &[u8], base_text: &str, options: JsValue) -> Result<String, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    plan_import_impl(save_bytes, base_text, &parsed_options).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn import_structures(
    save_bytes: &[u8],
    base_text: &str,
    options: JsValue,
) -> Result<EditedSave, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    import_structures_impl(save_bytes, base_text, &parsed_options).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn delete_structures(save_bytes: &[u8], options: JsValue) -> Result<EditedSave, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    delete_structures_impl(save_bytes, &parsed_options).map_err(|err| err.to_js_value())
}

fn inspect_save_impl(save_bytes: &[u8], options: &WebOptions) -> Result<String, WebError> {
    let session = open_session(save_bytes, options)?;
    to_json_text(&render_session_json(&session, JsonStyle::CanonicalV1))
}

fn list_structures_impl(save_bytes: &[u8], options: &WebOptions) -> Result<String, WebError> {
    let session = open_session(save_bytes, options)?;
    let listing = session.structure_listing(&options.import_options())?;
    to_json_text(&render_structures_json(
        &listing.summaries(),
        listing.grouping(),
        JsonStyle::CanonicalV1,
    ))
}

fn export_entry_impl(save_bytes: &[u8], entry: &str) -> Result<String, WebError> {
    let session = open_session(save_bytes, &WebOptions::default())?;
    Ok(session.export_entry(entry)?)
}

fn apply_entry_edit_impl(
    save_bytes: &[u8],
    entry: &str,
    edited_text: &str,
) -> Result<Vec<u8>, WebError> {
    let session = open_session(save_bytes, &WebOptions::default())?;
    Ok(session.apply_entry_edit(entry, edited_text)?)
}

fn plan_import_impl(
    save_bytes: &[u8],
    base_text: &str,
    options: &WebOptions,
) -> Result<String, WebError> {
    let session = open_session(save_bytes, options)?;
    let plan = session.plan_import(base_text, &options.import_options())?;
    to_json_text(&render_import_plan_json(&plan, JsonStyle::CanonicalV1))
}

fn import_structures_impl(
    save_bytes: &[u8],
    base_text: &str,
    options: &WebOptions,
) -> Result<EditedSave, WebError> {
    let session = open_session(save_bytes, options)?;
    let plan = session.plan_import(base_text, &options.import_options())?;

    let indices = match (&options.select, &options.groups, options.all) {
        (Some(select), _, _) => select.iter().copied().collect(),
        (None, Some(groups), _) => plan.selection_for_groups(&zero_based_groups(groups)?)?,
        (None, None, true) => plan.all_indices(),
        (None, None, false) => {
            return Err(WebError::new(
                "invalid_options",
                "Choose structures to import with select, groups or all.",
            ));
        }
    };

    let (bytes, report) = session.import_structures(&plan, &indices)?;
    Ok(EditedSave {
        bytes,
        report: to_json_text(&render_import_report_json(&report, JsonStyle::CanonicalV1))?,
    })
}

fn delete_structures_impl(save_bytes: &[u8], options: &WebOptions) -> Result<EditedSave, WebError> {
    let session = open_session(save_bytes, options)?;

    let indices: BTreeSet<usize> = match (&options.select, &options.groups) {
        (Some(select), _) => select.iter().copied().collect(),
        (None, Some(groups)) => session
            .structure_listing(&options.import_options())?
            .selection_for_groups(&zero_based_groups(groups)?)?,
        (None, None) => {
            return Err(WebError::new(
                "invalid_options",
                "Choose structures to delete with select or groups.",
            ));
        }
    };

    let (bytes, report) = session.delete_structures(&indices)?;
    Ok(EditedSave {
        bytes,
        report: to_json_text(&render_delete_report_json(&report, JsonStyle::CanonicalV1))?,
    })
}

fn open_session(save_bytes: &[u8], options: &WebOptions) -> Result<Session, WebError> {
    if save_bytes.is_empty() {
        return Err(WebError::new(
            "unsupported_file",
            "The uploaded file is empty. Please provide a SaveData.zip file.",
        ));
    }
    Ok(Engine::new().open_archive_named(save_bytes, options.upload_name.as_deref())?)
}

fn zero_based_groups(groups: &[usize]) -> Result<Vec<usize>, WebError> {
    groups
        .iter()
        .map(|group| {
            group.checked_sub(1).ok_or_else(|| {
                WebError::new("invalid_options", "Group numbers start at 1.")
            })
        })
        .collect()
}

fn to_json_text(value: &serde_json::Value) -> Result<String, WebError> {
    serde_json::to_string_pretty(value).map_err(|err| {
        WebError::new(
            "render_failed",
            format!("failed to serialize rendered JSON output: {err}"),
        )
    })
}

fn parse_options(options: JsValue) -> Result<WebOptions, WebError> {
    if options.is_null() || options.is_undefined() {
        return Ok(WebOptions::default());
    }

    serde_wasm_bindgen::from_value(options).map_err(|err| {
        WebError::new(
            "invalid_options",
            format!("Failed to parse web options: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Cursor, Write};
    use std::path::Path;

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::{
        WebOptions, apply_entry_edit_impl, delete_structures_impl, export_entry_impl,
        import_structures_impl, inspect_save_impl, list_structures_impl, plan_import_impl,
        zero_based_groups,
    };

    #[test]
    fn inspect_save_reports_upload_name_and_stats() {
        let options = WebOptions {
            upload_name: Some("Upload.zip".to_string()),
            ..WebOptions::default()
        };
        let rendered = inspect_save_impl(&save_bytes(), &options).expect("save should inspect");
        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("json output should parse");
        assert_eq!(parsed["display_name"], "Slot3/Upload.zip");
        assert_eq!(parsed["game_stats"]["game_type"], "Normal");
    }

    #[test]
    fn empty_and_broken_uploads_are_rejected() {
        let err = inspect_save_impl(&[], &WebOptions::default())
            .expect_err("empty payload should fail");
        assert_eq!(err.code, "unsupported_file");

        let err = inspect_save_impl(b"not a zip", &WebOptions::default())
            .expect_err("non-zip payload should fail");
        assert_eq!(err.code, "unsupported_file");
    }

    #[test]
    fn list_structures_numbers_groups_from_one() {
        let rendered = list_structures_impl(&save_bytes(), &WebOptions::default())
            .expect("listing should render");
        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("json output should parse");
        assert_eq!(parsed["group_count"], 2);
        assert_eq!(parsed["groups"][0]["id"], 1);
    }

    #[test]
    fn export_then_apply_keeps_entry_text() {
        let bytes = save_bytes();
        let exported = export_entry_impl(&bytes, "Slot3/ConstructionsSaveData.json")
            .expect("entry should export");
        let rewritten = apply_entry_edit_impl(&bytes, "Slot3/ConstructionsSaveData.json", &exported)
            .expect("edit should apply");
        let again = export_entry_impl(&rewritten, "Slot3/ConstructionsSaveData.json")
            .expect("rewritten entry should export");
        assert_eq!(again, exported);
    }

    #[test]
    fn plan_and_import_by_group() {
        let bytes = save_bytes();
        let base = fixture_text("tests/fixtures/base_export.json");

        let plan = plan_import_impl(&bytes, &base, &WebOptions::default())
            .expect("plan should render");
        let parsed: serde_json::Value =
            serde_json::from_str(&plan).expect("json output should parse");
        assert_eq!(parsed["structure_count"], 4);

        let options = WebOptions {
            groups: Some(vec![3]),
            ..WebOptions::default()
        };
        let edited = import_structures_impl(&bytes, &base, &options).expect("import should run");
        let report: serde_json::Value =
            serde_json::from_str(&edited.report()).expect("report should parse");
        assert_eq!(report["imported"], 1);
        assert!(!edited.bytes().is_empty());
    }

    #[test]
    fn import_without_selection_is_rejected() {
        let base = fixture_text("tests/fixtures/base_export.json");
        let err = import_structures_impl(&save_bytes(), &base, &WebOptions::default())
            .expect_err("missing selection should fail");
        assert_eq!(err.code, "invalid_options");
    }

    #[test]
    fn delete_reports_out_of_range_selection() {
        let options = WebOptions {
            select: Some(vec![9]),
            ..WebOptions::default()
        };
        let err = delete_structures_impl(&save_bytes(), &options)
            .expect_err("out of range index should fail");
        assert_eq!(err.code, "invalid_selection");

        let options = WebOptions {
            select: Some(vec![2]),
            ..WebOptions::default()
        };
        let edited = delete_structures_impl(&save_bytes(), &options).expect("delete should run");
        let report: serde_json::Value =
            serde_json::from_str(&edited.report()).expect("report should parse");
        assert_eq!(report["remaining"], 2);
    }

    #[test]
    fn group_numbers_start_at_one() {
        assert_eq!(zero_based_groups(&[1, 2]).expect("valid groups"), vec![0, 1]);
        let err = zero_based_groups(&[0]).expect_err("group 0 should fail");
        assert_eq!(err.code, "invalid_options");
    }

    fn save_bytes() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for name in ["GameStateSaveData.json", "ConstructionsSaveData.json"] {
            writer
                .start_file(format!("Slot3/{name}"), SimpleFileOptions::default())
                .expect("failed to start zip entry");
            writer
                .write_all(fixture_text(&format!("tests/fixtures/{name}")).as_bytes())
                .expect("failed to write zip entry");
        }
        writer.finish().expect("failed to finish zip").into_inner()
    }

    fn fixture_text(relative_path: &str) -> String {
        let full_path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .join(relative_path);
        fs::read_to_string(full_path).expect("fixture text should be readable")
    }
}
