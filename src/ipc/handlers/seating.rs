use crate::export::{self, PrintPlan, SEATING_HEADERS};
use crate::ipc::error::ok;
use crate::ipc::handlers::halls::{load_hall, HallRow};
use crate::ipc::handlers::setup::{print_options, seating_defaults};
use crate::ipc::handlers::students::list_students;
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::seating::{
    self, ArrangementMode, AssignOptions, Assignment, Occupant, RosterEntry, Seat, SeatCounts,
    SeatState, SeatStatus,
};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

const MAX_PLAN_NAME_LEN: usize = 120;

#[derive(Clone, Debug)]
struct PlanRow {
    id: String,
    name: String,
    hall_id: String,
    mode: ArrangementMode,
    options: AssignOptions,
    seed: Option<u64>,
    generated_at: String,
}

fn seat_json(seat: &Seat) -> Value {
    let occ = seat.occupant();
    json!({
        "label": seat.label,
        "row": seat.row,
        "col": seat.col,
        "status": seat.status().as_str(),
        "studentId": occ.map(|o| o.student_id.as_str()),
        "studentName": occ.map(|o| o.name.as_str()),
        "rollNo": occ.map(|o| o.roll_no.as_str()),
        "specialRequirement": occ.and_then(|o| o.special_requirement.as_deref())
    })
}

fn plan_json(plan: &PlanRow, hall: &HallRow, seats: &[Seat], roster_size: usize) -> Value {
    json!({
        "id": plan.id,
        "name": plan.name,
        "hallId": hall.id,
        "hallName": hall.name,
        "rows": hall.geometry.rows(),
        "cols": hall.geometry.cols(),
        "mode": plan.mode.as_str(),
        "options": plan.options,
        "seed": plan.seed,
        "generatedAt": plan.generated_at,
        "rosterSize": roster_size,
        "counts": SeatCounts::tally(seats),
        "seats": seats.iter().map(seat_json).collect::<Vec<_>>()
    })
}

fn load_plan(conn: &Connection, plan_id: &str) -> Result<PlanRow, HandlerErr> {
    let row = conn
        .query_row(
            "SELECT id, name, hall_id, mode, options_json, seed, generated_at
             FROM seating_plans WHERE id = ?",
            [plan_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<i64>>(5)?,
                    r.get::<_, String>(6)?,
                ))
            },
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let Some((id, name, hall_id, mode_raw, options_json, seed, generated_at)) = row else {
        return Err(HandlerErr::new("not_found", "seating plan not found")
            .with_details(json!({ "planId": plan_id })));
    };
    let mode = ArrangementMode::parse(&mode_raw).ok_or_else(|| {
        HandlerErr::new("db_query_failed", format!("stored plan has unknown mode {}", mode_raw))
    })?;
    let options: AssignOptions = serde_json::from_str(&options_json)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(PlanRow {
        id,
        name,
        hall_id,
        mode,
        options,
        // Stored as the i64 bit pattern.
        seed: seed.map(|s| s as u64),
        generated_at,
    })
}

type SeatColumns = (
    i64,
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn seat_from_columns(cols: SeatColumns) -> Result<Seat, HandlerErr> {
    let (row, col, label, status_raw, student_id, name, roll_no, special_requirement) = cols;
    let status = SeatStatus::parse(&status_raw).ok_or_else(|| {
        HandlerErr::new(
            "db_query_failed",
            format!("seat {} has unknown status {}", label, status_raw),
        )
    })?;
    let state = match status {
        SeatStatus::Available => SeatState::Available,
        SeatStatus::Blocked => SeatState::Blocked,
        SeatStatus::Reserved => SeatState::Reserved,
        SeatStatus::Occupied => {
            let Some(student_id) = student_id else {
                return Err(HandlerErr::new(
                    "db_query_failed",
                    format!("occupied seat {} has no student", label),
                ));
            };
            SeatState::Occupied(Occupant {
                student_id,
                name: name.unwrap_or_default(),
                roll_no: roll_no.unwrap_or_default(),
                special_requirement,
            })
        }
    };
    Ok(Seat {
        label,
        row: row.max(0) as usize,
        col: col.max(0) as usize,
        state,
    })
}

fn load_seats(conn: &Connection, plan_id: &str) -> Result<Vec<Seat>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT row_idx, col_idx, label, status, student_id, student_name, roll_no, special_requirement
             FROM seats
             WHERE plan_id = ?
             ORDER BY seat_index",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let rows = stmt
        .query_map([plan_id], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
                r.get(7)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<SeatColumns>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    rows.into_iter().map(seat_from_columns).collect()
}

/// Students still on the roster, in the order the plan was generated with.
fn load_plan_roster(conn: &Connection, plan_id: &str) -> Result<Vec<RosterEntry>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT s.id, s.name, s.roll_no, s.special_requirement
             FROM seating_plan_students ps
             JOIN students s ON s.id = ps.student_id
             WHERE ps.plan_id = ?
             ORDER BY ps.position",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let roster = stmt
        .query_map([plan_id], |r| {
            Ok(RosterEntry {
                id: r.get(0)?,
                name: r.get(1)?,
                roll_no: r.get(2)?,
                special_requirement: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(roster)
}

fn write_seat(
    tx: &Transaction<'_>,
    plan_id: &str,
    index: usize,
    seat: &Seat,
) -> rusqlite::Result<()> {
    let occ = seat.occupant();
    tx.execute(
        "INSERT INTO seats(plan_id, seat_index, row_idx, col_idx, label, status,
                           student_id, student_name, roll_no, special_requirement)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            plan_id,
            index as i64,
            seat.row as i64,
            seat.col as i64,
            seat.label,
            seat.status().as_str(),
            occ.map(|o| o.student_id.as_str()),
            occ.map(|o| o.name.as_str()),
            occ.map(|o| o.roll_no.as_str()),
            occ.and_then(|o| o.special_requirement.as_deref()),
        ],
    )?;
    Ok(())
}

fn replace_seats(tx: &Transaction<'_>, plan_id: &str, seats: &[Seat]) -> Result<(), HandlerErr> {
    tx.execute("DELETE FROM seats WHERE plan_id = ?", [plan_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "seats" }))
        })?;
    for (i, seat) in seats.iter().enumerate() {
        write_seat(tx, plan_id, i, seat).map_err(|e| {
            HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "seats" }))
        })?;
    }
    Ok(())
}

fn parse_mode(params: &Value, fallback: ArrangementMode) -> Result<ArrangementMode, HandlerErr> {
    match get_optional_str(params, "mode")? {
        Some(raw) => ArrangementMode::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params(
                "mode must be one of: random, alphabetical, rollNumber, mixedPrograms",
            )
        }),
        None => Ok(fallback),
    }
}

fn parse_options(params: &Value, defaults: AssignOptions) -> Result<AssignOptions, HandlerErr> {
    let mut options = defaults;
    let Some(raw) = params.get("options") else {
        return Ok(options);
    };
    if raw.is_null() {
        return Ok(options);
    }
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params("options must be an object"));
    };
    let flag = |k: &str, v: &Value| {
        v.as_bool()
            .ok_or_else(|| HandlerErr::bad_params(format!("options.{} must be boolean", k)))
    };
    for (k, v) in obj {
        match k.as_str() {
            "gapBetweenStudents" => {
                options.gap_between_students = v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        HandlerErr::bad_params(
                            "options.gapBetweenStudents must be a non-negative integer",
                        )
                    })?;
            }
            "blockCornerSeats" => options.block_corner_seats = flag(k.as_str(), v)?,
            "blockFrontRow" => options.block_front_row = flag(k.as_str(), v)?,
            "allowOverflow" => options.allow_overflow = flag(k.as_str(), v)?,
            _ => return Err(HandlerErr::bad_params(format!("unknown option: {}", k))),
        }
    }
    Ok(options)
}

fn parse_seed(params: &Value) -> Result<Option<u64>, HandlerErr> {
    match params.get("seed") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params("seed must be a non-negative integer")),
    }
}

/// Explicit `studentIds` in the given order, or the whole roster.
fn resolve_roster(conn: &Connection, params: &Value) -> Result<Vec<RosterEntry>, HandlerErr> {
    let all = list_students(conn)?;
    let Some(raw) = params.get("studentIds").filter(|v| !v.is_null()) else {
        return Ok(all.iter().map(|s| s.roster_entry()).collect());
    };
    let Some(ids) = raw.as_array() else {
        return Err(HandlerErr::bad_params("studentIds must be an array"));
    };
    let by_id: HashMap<&str, _> = all.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut roster = Vec::with_capacity(ids.len());
    for v in ids {
        let Some(id) = v.as_str() else {
            return Err(HandlerErr::bad_params("studentIds must contain strings"));
        };
        let Some(s) = by_id.get(id) else {
            return Err(HandlerErr::new("not_found", "student not found")
                .with_details(json!({ "studentId": id })));
        };
        roster.push(s.roster_entry());
    }
    Ok(roster)
}

fn run_assigner(
    hall: &HallRow,
    roster: &[RosterEntry],
    mode: ArrangementMode,
    options: &AssignOptions,
    seed: Option<u64>,
) -> Result<Assignment, HandlerErr> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed.unwrap_or_else(rand::random));
    Ok(seating::assign(hall.geometry, roster, mode, options, &mut rng)?)
}

fn seating_generate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let hall_id = get_required_str(&req.params, "hallId")?;
    let hall = load_hall(&state.db, &hall_id)?;
    let (default_mode, default_options) =
        seating_defaults(&state.db).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let mode = parse_mode(&req.params, default_mode)?;
    let options = parse_options(&req.params, default_options)?;
    let seed = parse_seed(&req.params)?;
    let name = match get_optional_str(&req.params, "name")? {
        Some(n) if n.chars().count() > MAX_PLAN_NAME_LEN => {
            return Err(HandlerErr::bad_params(format!(
                "name length must be <= {}",
                MAX_PLAN_NAME_LEN
            )))
        }
        Some(n) => n,
        None => format!("{} plan", hall.name),
    };
    let roster = resolve_roster(&state.db, &req.params)?;

    let assignment = run_assigner(&hall, &roster, mode, &options, seed)?;

    let plan = PlanRow {
        id: Uuid::new_v4().to_string(),
        name,
        hall_id: hall.id.clone(),
        mode,
        options,
        seed,
        generated_at: chrono::Utc::now().to_rfc3339(),
    };
    let options_json =
        serde_json::to_string(&plan.options).map_err(|e| HandlerErr::db("db_insert_failed", e))?;

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "INSERT INTO seating_plans(id, name, hall_id, mode, options_json, seed, generated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &plan.id,
            &plan.name,
            &plan.hall_id,
            plan.mode.as_str(),
            &options_json,
            plan.seed.map(|s| s as i64),
            &plan.generated_at,
        ),
    )
    .map_err(|e| {
        HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "seating_plans" }))
    })?;
    for (pos, s) in roster.iter().enumerate() {
        tx.execute(
            "INSERT INTO seating_plan_students(plan_id, student_id, position) VALUES(?, ?, ?)",
            (&plan.id, &s.id, pos as i64),
        )
        .map_err(|e| {
            HandlerErr::db("db_insert_failed", e)
                .with_details(json!({ "table": "seating_plan_students" }))
        })?;
    }
    replace_seats(&tx, &plan.id, &assignment.seats)?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    let counts = SeatCounts::tally(&assignment.seats);
    tracing::info!(
        plan_id = %plan.id,
        hall_id = %hall.id,
        mode = plan.mode.as_str(),
        occupied = counts.occupied,
        available = counts.available,
        blocked = counts.blocked,
        unseated = assignment.unseated.len(),
        "seating plan generated"
    );

    Ok(json!({
        "planId": plan.id,
        "plan": plan_json(&plan, &hall, &assignment.seats, roster.len()),
        "unseatedStudentIds": assignment.unseated
    }))
}

fn seating_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let hall_filter = get_optional_str(&req.params, "hallId")?;
    let mut stmt = state
        .db
        .prepare(
            "SELECT
               p.id,
               p.name,
               p.hall_id,
               h.name,
               p.mode,
               p.generated_at,
               (SELECT COUNT(*) FROM seats s WHERE s.plan_id = p.id) AS total,
               (SELECT COUNT(*) FROM seats s WHERE s.plan_id = p.id AND s.status = 'occupied') AS occupied,
               (SELECT COUNT(*) FROM seats s WHERE s.plan_id = p.id AND s.status = 'available') AS available,
               (SELECT COUNT(*) FROM seats s WHERE s.plan_id = p.id AND s.status = 'blocked') AS blocked,
               (SELECT COUNT(*) FROM seats s WHERE s.plan_id = p.id AND s.status = 'reserved') AS reserved
             FROM seating_plans p
             JOIN halls h ON h.id = p.hall_id
             WHERE (?1 IS NULL OR p.hall_id = ?1)
             ORDER BY p.generated_at, p.id",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let plans = stmt
        .query_map([&hall_filter], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "hallId": r.get::<_, String>(2)?,
                "hallName": r.get::<_, String>(3)?,
                "mode": r.get::<_, String>(4)?,
                "generatedAt": r.get::<_, String>(5)?,
                "counts": {
                    "total": r.get::<_, i64>(6)?,
                    "occupied": r.get::<_, i64>(7)?,
                    "available": r.get::<_, i64>(8)?,
                    "blocked": r.get::<_, i64>(9)?,
                    "reserved": r.get::<_, i64>(10)?
                }
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "plans": plans }))
}

fn seating_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = get_required_str(&req.params, "planId")?;
    let plan = load_plan(&state.db, &plan_id)?;
    let hall = load_hall(&state.db, &plan.hall_id)?;
    let seats = load_seats(&state.db, &plan.id)?;
    let roster = load_plan_roster(&state.db, &plan.id)?;
    Ok(json!({ "plan": plan_json(&plan, &hall, &seats, roster.len()) }))
}

fn seating_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = get_required_str(&req.params, "planId")?;
    load_plan(&state.db, &plan_id)?;

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    let steps = [
        ("seats", "DELETE FROM seats WHERE plan_id = ?"),
        (
            "seating_plan_students",
            "DELETE FROM seating_plan_students WHERE plan_id = ?",
        ),
        ("seating_plans", "DELETE FROM seating_plans WHERE id = ?"),
    ];
    for (table, sql) in steps {
        if let Err(e) = tx.execute(sql, [&plan_id]) {
            let _ = tx.rollback();
            return Err(
                HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": table }))
            );
        }
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    Ok(json!({ "ok": true }))
}

fn seating_swap(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = get_required_str(&req.params, "planId")?;
    let seat_a = get_required_str(&req.params, "seatA")?;
    let seat_b = get_required_str(&req.params, "seatB")?;
    load_plan(&state.db, &plan_id)?;
    let mut seats = load_seats(&state.db, &plan_id)?;

    seating::swap_seats(&mut seats, &seat_a, &seat_b)?;

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    let mut changed = Vec::new();
    for label in [&seat_a, &seat_b] {
        let Some(seat) = seats.iter().find(|s| &s.label == label) else {
            continue;
        };
        let occ = seat.occupant();
        tx.execute(
            "UPDATE seats
             SET status = ?, student_id = ?, student_name = ?, roll_no = ?, special_requirement = ?
             WHERE plan_id = ? AND label = ?",
            rusqlite::params![
                seat.status().as_str(),
                occ.map(|o| o.student_id.as_str()),
                occ.map(|o| o.name.as_str()),
                occ.map(|o| o.roll_no.as_str()),
                occ.and_then(|o| o.special_requirement.as_deref()),
                plan_id,
                seat.label,
            ],
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
        changed.push(seat_json(seat));
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    tracing::debug!(plan_id = %plan_id, seat_a = %seat_a, seat_b = %seat_b, "seats swapped");
    Ok(json!({
        "seats": changed,
        "counts": SeatCounts::tally(&seats)
    }))
}

fn seating_regenerate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = get_required_str(&req.params, "planId")?;
    let mut plan = load_plan(&state.db, &plan_id)?;
    let hall = load_hall(&state.db, &plan.hall_id)?;
    plan.mode = parse_mode(&req.params, plan.mode)?;
    let roster = load_plan_roster(&state.db, &plan.id)?;

    let assignment = run_assigner(&hall, &roster, plan.mode, &plan.options, plan.seed)?;
    plan.generated_at = chrono::Utc::now().to_rfc3339();

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "UPDATE seating_plans SET mode = ?, generated_at = ? WHERE id = ?",
        (plan.mode.as_str(), &plan.generated_at, &plan.id),
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    replace_seats(&tx, &plan.id, &assignment.seats)?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    tracing::info!(
        plan_id = %plan.id,
        mode = plan.mode.as_str(),
        occupied = SeatCounts::tally(&assignment.seats).occupied,
        "seating plan regenerated"
    );

    Ok(json!({
        "plan": plan_json(&plan, &hall, &assignment.seats, roster.len()),
        "unseatedStudentIds": assignment.unseated
    }))
}

fn seating_export_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = get_required_str(&req.params, "planId")?;
    let out_dir = get_optional_str(&req.params, "outDir")?;
    let plan = load_plan(&state.db, &plan_id)?;
    let seats = load_seats(&state.db, &plan.id)?;

    let rows = export::seating_rows(&seats);
    let csv = export::build_csv(&SEATING_HEADERS, &rows);
    let entity = format!("seating_{}", export::slug(&plan.name));
    let file_name = export::export_file_name(&entity, chrono::Local::now().date_naive());

    let path = match out_dir {
        Some(dir) => {
            let path = PathBuf::from(dir).join(&file_name);
            export::write_text_file(&path, &csv).map_err(|e| {
                HandlerErr::new("export_failed", e.to_string())
                    .with_details(json!({ "path": path.to_string_lossy() }))
            })?;
            tracing::info!(path = %path.display(), rows = rows.len(), "seating layout exported");
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

fn seating_print_layout(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = get_required_str(&req.params, "planId")?;
    let out_path = get_optional_str(&req.params, "outPath")?;
    let plan = load_plan(&state.db, &plan_id)?;
    let hall = load_hall(&state.db, &plan.hall_id)?;
    let seats = load_seats(&state.db, &plan.id)?;
    let opts = print_options(&state.db).map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let html = export::render_print_layout(
        &PrintPlan {
            plan_name: &plan.name,
            hall_name: &hall.name,
            mode: plan.mode.as_str(),
            cols: hall.geometry.cols(),
            seats: &seats,
            generated_at: &plan.generated_at,
        },
        &opts,
    );

    if let Some(p) = &out_path {
        export::write_text_file(&PathBuf::from(p), &html).map_err(|e| {
            HandlerErr::new("export_failed", e.to_string()).with_details(json!({ "path": p }))
        })?;
        tracing::info!(path = %p, "print layout written");
    }

    Ok(json!({ "html": html, "path": out_path }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "seating.generate" => seating_generate(state, req),
        "seating.list" => seating_list(state, req),
        "seating.get" => seating_get(state, req),
        "seating.delete" => seating_delete(state, req),
        "seating.swap" => seating_swap(state, req),
        "seating.regenerate" => seating_regenerate(state, req),
        "seating.exportCsv" => seating_export_csv(state, req),
        "seating.printLayout" => seating_print_layout(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
