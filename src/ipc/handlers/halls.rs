use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::seating::HallGeometry;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use uuid::Uuid;

pub const MAX_HALL_DIMENSION: i64 = 100;

#[derive(Clone, Debug)]
pub struct HallRow {
    pub id: String,
    pub name: String,
    pub geometry: HallGeometry,
}

pub fn load_hall(conn: &Connection, hall_id: &str) -> Result<HallRow, HandlerErr> {
    let row = conn
        .query_row(
            "SELECT id, name, rows, cols FROM halls WHERE id = ?",
            [hall_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let Some((id, name, rows, cols)) = row else {
        return Err(HandlerErr::new("not_found", "hall not found")
            .with_details(json!({ "hallId": hall_id })));
    };
    let geometry = HallGeometry::new(rows.max(0) as usize, cols.max(0) as usize)?;
    Ok(HallRow { id, name, geometry })
}

fn parse_dimension(v: Option<&Value>, key: &str) -> Result<usize, HandlerErr> {
    let Some(v) = v else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    let n = v
        .as_i64()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be integer", key)))?;
    if !(1..=MAX_HALL_DIMENSION).contains(&n) {
        return Err(HandlerErr::new(
            "invalid_hall",
            format!("{} must be in 1..={}", key, MAX_HALL_DIMENSION),
        )
        .with_details(json!({ "field": key, "value": n })));
    }
    Ok(n as usize)
}

fn parse_name(v: Option<&Value>) -> Result<String, HandlerErr> {
    let name = v
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params("missing name"))?;
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    Ok(name)
}

fn plan_count(conn: &Connection, hall_id: &str) -> Result<i64, HandlerErr> {
    conn.query_row(
        "SELECT COUNT(*) FROM seating_plans WHERE hall_id = ?",
        [hall_id],
        |r| r.get(0),
    )
    .map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn hall_json(hall: &HallRow, plans: i64) -> Value {
    json!({
        "id": hall.id,
        "name": hall.name,
        "rows": hall.geometry.rows(),
        "cols": hall.geometry.cols(),
        "capacity": hall.geometry.capacity(),
        "planCount": plans
    })
}

fn halls_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let mut stmt = state
        .db
        .prepare(
            "SELECT
               h.id,
               h.name,
               h.rows,
               h.cols,
               (SELECT COUNT(*) FROM seating_plans p WHERE p.hall_id = h.id) AS plan_count
             FROM halls h
             ORDER BY h.name, h.id",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let halls = stmt
        .query_map([], |row| {
            let rows: i64 = row.get(2)?;
            let cols: i64 = row.get(3)?;
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "rows": rows,
                "cols": cols,
                "capacity": rows * cols,
                "planCount": row.get::<_, i64>(4)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "halls": halls }))
}

fn halls_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let name = parse_name(req.params.get("name"))?;
    let rows = parse_dimension(req.params.get("rows"), "rows")?;
    let cols = parse_dimension(req.params.get("cols"), "cols")?;
    let geometry = HallGeometry::new(rows, cols)?;

    let hall_id = Uuid::new_v4().to_string();
    state
        .db
        .execute(
            "INSERT INTO halls(id, name, rows, cols, updated_at) VALUES(?, ?, ?, ?, ?)",
            (
                &hall_id,
                &name,
                rows as i64,
                cols as i64,
                chrono::Utc::now().to_rfc3339(),
            ),
        )
        .map_err(|e| {
            HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "halls" }))
        })?;

    let hall = HallRow {
        id: hall_id.clone(),
        name,
        geometry,
    };
    Ok(json!({ "hallId": hall_id, "hall": hall_json(&hall, 0) }))
}

fn halls_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let hall_id = get_required_str(&req.params, "hallId")?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let current = load_hall(&state.db, &hall_id)?;

    let mut name = current.name.clone();
    let mut rows = current.geometry.rows();
    let mut cols = current.geometry.cols();
    for (k, v) in patch {
        match k.as_str() {
            "name" => name = parse_name(Some(v))?,
            "rows" => rows = parse_dimension(Some(v), "rows")?,
            "cols" => cols = parse_dimension(Some(v), "cols")?,
            _ => return Err(HandlerErr::bad_params(format!("unknown hall field: {}", k))),
        }
    }

    // Existing plans were generated for the old grid.
    let resized = rows != current.geometry.rows() || cols != current.geometry.cols();
    let plans = plan_count(&state.db, &hall_id)?;
    if resized && plans > 0 {
        return Err(
            HandlerErr::new("hall_in_use", "hall has seating plans; delete them before resizing")
                .with_details(json!({ "hallId": hall_id, "planCount": plans })),
        );
    }
    let geometry = HallGeometry::new(rows, cols)?;

    state
        .db
        .execute(
            "UPDATE halls SET name = ?, rows = ?, cols = ?, updated_at = ? WHERE id = ?",
            (
                &name,
                rows as i64,
                cols as i64,
                chrono::Utc::now().to_rfc3339(),
                &hall_id,
            ),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;

    let hall = HallRow {
        id: hall_id,
        name,
        geometry,
    };
    Ok(json!({ "hall": hall_json(&hall, plans) }))
}

fn halls_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let hall_id = get_required_str(&req.params, "hallId")?;
    load_hall(&state.db, &hall_id)?;

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    // Explicit dependency order (no ON DELETE CASCADE).
    let steps = [
        (
            "seats",
            "DELETE FROM seats WHERE plan_id IN (SELECT id FROM seating_plans WHERE hall_id = ?)",
        ),
        (
            "seating_plan_students",
            "DELETE FROM seating_plan_students
             WHERE plan_id IN (SELECT id FROM seating_plans WHERE hall_id = ?)",
        ),
        ("seating_plans", "DELETE FROM seating_plans WHERE hall_id = ?"),
        ("halls", "DELETE FROM halls WHERE id = ?"),
    ];
    let mut plans_deleted = 0usize;
    for (table, sql) in steps {
        match tx.execute(sql, [&hall_id]) {
            Ok(n) => {
                if table == "seating_plans" {
                    plans_deleted = n;
                }
            }
            Err(e) => {
                let _ = tx.rollback();
                return Err(HandlerErr::db("db_delete_failed", e)
                    .with_details(json!({ "table": table })));
            }
        }
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    Ok(json!({ "ok": true, "plansDeleted": plans_deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "halls.list" => halls_list(state, req),
        "halls.create" => halls_create(state, req),
        "halls.update" => halls_update(state, req),
        "halls.delete" => halls_delete(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
