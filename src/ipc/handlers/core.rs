use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn count(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let counts = (|| -> rusqlite::Result<serde_json::Value> {
        Ok(json!({
            "halls": count(&state.db, "halls")?,
            "students": count(&state.db, "students")?,
            "plans": count(&state.db, "seating_plans")?,
        }))
    })();
    match counts {
        Ok(counts) => ok(
            &req.id,
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "startedAt": state.started_at,
                "counts": counts
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Drops every hall, student and plan, like reloading the page.
fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    match db::open_db() {
        Ok(conn) => {
            state.db = conn;
            state.started_at = chrono::Utc::now().to_rfc3339();
            tracing::info!("session reset");
            ok(&req.id, json!({ "ok": true }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        _ => None,
    }
}
