use crate::export::{self, STUDENT_HEADERS};
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_string_max, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::seating::RosterEntry;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 120;
const MAX_ROLL_LEN: usize = 40;
const MAX_REQUIREMENT_LEN: usize = 200;

#[derive(Clone, Debug)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    pub special_requirement: Option<String>,
    pub sort_order: i64,
}

impl StudentRow {
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            roll_no: self.roll_no.clone(),
            special_requirement: self.special_requirement.clone(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "rollNo": self.roll_no,
            "specialRequirement": self.special_requirement,
            "sortOrder": self.sort_order
        })
    }
}

/// Whole roster in insertion order.
pub fn list_students(conn: &Connection) -> Result<Vec<StudentRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, roll_no, special_requirement, sort_order
             FROM students
             ORDER BY sort_order, id",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let students = stmt
        .query_map([], |row| {
            Ok(StudentRow {
                id: row.get(0)?,
                name: row.get(1)?,
                roll_no: row.get(2)?,
                special_requirement: row.get(3)?,
                sort_order: row.get(4)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(students)
}

#[derive(Clone, Copy)]
enum SortBy {
    SortOrder,
    Name,
    RollNo,
}

impl SortBy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "sortOrder" => Some(Self::SortOrder),
            "name" => Some(Self::Name),
            "rollNo" => Some(Self::RollNo),
            _ => None,
        }
    }
}

fn matches_search(s: &StudentRow, needle: &str) -> bool {
    s.name.to_lowercase().contains(needle) || s.roll_no.to_lowercase().contains(needle)
}

fn students_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let search = get_optional_str(&req.params, "search")?.map(|s| s.to_lowercase());
    let sort_by = match get_optional_str(&req.params, "sortBy")? {
        Some(raw) => SortBy::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("sortBy must be one of: sortOrder, name, rollNo")
        })?,
        None => SortBy::SortOrder,
    };

    let all = list_students(&state.db)?;
    let total = all.len();
    let mut students: Vec<StudentRow> = match &search {
        Some(needle) => all.into_iter().filter(|s| matches_search(s, needle)).collect(),
        None => all,
    };
    match sort_by {
        SortBy::SortOrder => {}
        SortBy::Name => students.sort_by(|a, b| a.name.cmp(&b.name)),
        SortBy::RollNo => students.sort_by(|a, b| a.roll_no.cmp(&b.roll_no)),
    }

    Ok(json!({
        "students": students.iter().map(StudentRow::to_json).collect::<Vec<_>>(),
        "total": total,
        "matched": students.len()
    }))
}

fn required_field(v: Option<&Value>, key: &str, max_len: usize) -> Result<String, HandlerErr> {
    let Some(v) = v else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    let s = parse_string_max(v, key, max_len).map_err(HandlerErr::bad_params)?;
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(s)
}

fn optional_requirement(v: Option<&Value>) -> Result<Option<String>, HandlerErr> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let s = parse_string_max(v, "specialRequirement", MAX_REQUIREMENT_LEN)
                .map_err(HandlerErr::bad_params)?;
            Ok(if s.is_empty() { None } else { Some(s) })
        }
    }
}

fn ensure_roll_free(
    conn: &Connection,
    roll_no: &str,
    except_id: Option<&str>,
) -> Result<(), HandlerErr> {
    let holder: Option<String> = conn
        .query_row("SELECT id FROM students WHERE roll_no = ?", [roll_no], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    match holder {
        Some(id) if Some(id.as_str()) != except_id => Err(HandlerErr::new(
            "duplicate_roll_no",
            format!("roll number {} is already in use", roll_no),
        )
        .with_details(json!({ "rollNo": roll_no, "studentId": id }))),
        _ => Ok(()),
    }
}

fn load_student(conn: &Connection, student_id: &str) -> Result<StudentRow, HandlerErr> {
    conn.query_row(
        "SELECT id, name, roll_no, special_requirement, sort_order FROM students WHERE id = ?",
        [student_id],
        |row| {
            Ok(StudentRow {
                id: row.get(0)?,
                name: row.get(1)?,
                roll_no: row.get(2)?,
                special_requirement: row.get(3)?,
                sort_order: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(|e| HandlerErr::db("db_query_failed", e))?
    .ok_or_else(|| {
        HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id }))
    })
}

fn students_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let name = required_field(req.params.get("name"), "name", MAX_NAME_LEN)?;
    let roll_no = required_field(req.params.get("rollNo"), "rollNo", MAX_ROLL_LEN)?;
    let special_requirement = optional_requirement(req.params.get("specialRequirement"))?;
    ensure_roll_free(&state.db, &roll_no, None)?;

    let sort_order: i64 = state
        .db
        .query_row("SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students", [], |r| r.get(0))
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let student = StudentRow {
        id: Uuid::new_v4().to_string(),
        name,
        roll_no,
        special_requirement,
        sort_order,
    };
    state
        .db
        .execute(
            "INSERT INTO students(id, name, roll_no, special_requirement, sort_order, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &student.id,
                &student.name,
                &student.roll_no,
                &student.special_requirement,
                student.sort_order,
                chrono::Utc::now().to_rfc3339(),
            ),
        )
        .map_err(|e| {
            HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "students" }))
        })?;

    Ok(json!({ "studentId": student.id, "student": student.to_json() }))
}

fn students_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let mut student = load_student(&state.db, &student_id)?;

    for (k, v) in patch {
        match k.as_str() {
            "name" => student.name = required_field(Some(v), "name", MAX_NAME_LEN)?,
            "rollNo" => student.roll_no = required_field(Some(v), "rollNo", MAX_ROLL_LEN)?,
            "specialRequirement" => student.special_requirement = optional_requirement(Some(v))?,
            _ => return Err(HandlerErr::bad_params(format!("unknown student field: {}", k))),
        }
    }
    ensure_roll_free(&state.db, &student.roll_no, Some(&student.id))?;

    state
        .db
        .execute(
            "UPDATE students SET name = ?, roll_no = ?, special_requirement = ?, updated_at = ?
             WHERE id = ?",
            (
                &student.name,
                &student.roll_no,
                &student.special_requirement,
                chrono::Utc::now().to_rfc3339(),
                &student.id,
            ),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;

    Ok(json!({ "student": student.to_json() }))
}

fn students_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    load_student(&state.db, &student_id)?;

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    // Generated seats keep their snapshot; only future regenerations lose the student.
    if let Err(e) = tx.execute(
        "DELETE FROM seating_plan_students WHERE student_id = ?",
        [&student_id],
    ) {
        let _ = tx.rollback();
        return Err(HandlerErr::db("db_delete_failed", e)
            .with_details(json!({ "table": "seating_plan_students" })));
    }
    if let Err(e) = tx.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        let _ = tx.rollback();
        return Err(
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "students" }))
        );
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    Ok(json!({ "ok": true }))
}

fn students_export_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let out_dir = get_optional_str(&req.params, "outDir")?;
    let students = list_students(&state.db)?;

    let rows: Vec<Vec<String>> = students
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.name.clone(),
                s.roll_no.clone(),
                s.special_requirement.clone().unwrap_or_default(),
            ]
        })
        .collect();
    let csv = export::build_csv(&STUDENT_HEADERS, &rows);
    let file_name = export::export_file_name("students", chrono::Local::now().date_naive());

    let path = match out_dir {
        Some(dir) => {
            let path = PathBuf::from(dir).join(&file_name);
            export::write_text_file(&path, &csv).map_err(|e| {
                HandlerErr::new("export_failed", e.to_string())
                    .with_details(json!({ "path": path.to_string_lossy() }))
            })?;
            tracing::info!(path = %path.display(), rows = rows.len(), "students exported");
            Some(path.to_string_lossy().to_string())
        }
        None => None,
    };

    Ok(json!({
        "fileName": file_name,
        "csv": csv,
        "rowsExported": rows.len(),
        "path": path
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, req),
        "students.create" => students_create(state, req),
        "students.update" => students_update(state, req),
        "students.delete" => students_delete(state, req),
        "students.exportCsv" => students_export_csv(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
