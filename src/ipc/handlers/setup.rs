use crate::db;
use crate::export::PrintOptions;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_bool, parse_i64_range, parse_string_max};
use crate::ipc::types::{AppState, Request};
use crate::seating::{ArrangementMode, AssignOptions};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Seating,
    Printer,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "seating" => Some(Self::Seating),
            "printer" => Some(Self::Printer),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Seating => "setup.seating",
            Self::Printer => "setup.printer",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Seating => json!({
            "defaultMode": "alphabetical",
            "gapBetweenStudents": 0,
            "blockCornerSeats": false,
            "blockFrontRow": false,
            "allowOverflow": false
        }),
        SetupSection::Printer => json!({
            "title": "Seating Plan",
            "showGeneratedAt": true,
            "showLegend": true,
            "cellWidthPx": 72
        }),
    }
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Seating => match k.as_str() {
                "defaultMode" => {
                    let s = parse_string_max(v, k, 24)?;
                    let Some(mode) = ArrangementMode::parse(&s) else {
                        return Err(
                            "defaultMode must be one of: random, alphabetical, rollNumber, mixedPrograms"
                                .into(),
                        );
                    };
                    obj.insert(k.clone(), Value::String(mode.as_str().to_string()));
                }
                "gapBetweenStudents" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 10)?));
                }
                "blockCornerSeats" | "blockFrontRow" | "allowOverflow" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown seating field: {}", k)),
            },
            SetupSection::Printer => match k.as_str() {
                "title" => {
                    let s = parse_string_max(v, k, 120)?;
                    if s.is_empty() {
                        return Err("title must not be empty".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "showGeneratedAt" | "showLegend" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "cellWidthPx" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 40, 160)?));
                }
                _ => return Err(format!("unknown printer field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Seating defaults used for any option a generate request leaves out.
pub fn seating_defaults(
    conn: &rusqlite::Connection,
) -> anyhow::Result<(ArrangementMode, AssignOptions)> {
    let s = load_section(conn, SetupSection::Seating)?;
    let mode = s
        .get("defaultMode")
        .and_then(|v| v.as_str())
        .and_then(ArrangementMode::parse)
        .unwrap_or(ArrangementMode::Alphabetical);
    let flag = |key: &str| s.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
    let options = AssignOptions {
        gap_between_students: s
            .get("gapBetweenStudents")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        block_corner_seats: flag("blockCornerSeats"),
        block_front_row: flag("blockFrontRow"),
        allow_overflow: flag("allowOverflow"),
    };
    Ok((mode, options))
}

pub fn print_options(conn: &rusqlite::Connection) -> anyhow::Result<PrintOptions> {
    let p = load_section(conn, SetupSection::Printer)?;
    Ok(PrintOptions {
        title: p
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Seating Plan")
            .to_string(),
        show_generated_at: p
            .get("showGeneratedAt")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
        show_legend: p.get("showLegend").and_then(|v| v.as_bool()).unwrap_or(true),
        cell_width_px: p.get("cellWidthPx").and_then(|v| v.as_u64()).unwrap_or(72) as u32,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let seating = match load_section(&state.db, SetupSection::Seating) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let printer = match load_section(&state.db, SetupSection::Printer) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "seating": seating, "printer": printer }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(&state.db, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(&state.db, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true, "section": section_raw, "values": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
