use rusqlite::{Connection, OptionalExtension};

/// Opens a fresh store. Everything lives in memory and is gone when the
/// connection is dropped.
pub fn open_db() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS halls(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            rows INTEGER NOT NULL,
            cols INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            roll_no TEXT NOT NULL UNIQUE,
            special_requirement TEXT,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seating_plans(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            hall_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            options_json TEXT NOT NULL,
            seed INTEGER,
            generated_at TEXT NOT NULL,
            FOREIGN KEY(hall_id) REFERENCES halls(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seating_plans_hall ON seating_plans(hall_id)",
        [],
    )?;

    // Plan rosters keep the order students were handed to the assigner.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS seating_plan_students(
            plan_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY(plan_id, student_id),
            FOREIGN KEY(plan_id) REFERENCES seating_plans(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    // Seats snapshot the occupant so a plan still reads correctly after the
    // student is edited or removed.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS seats(
            plan_id TEXT NOT NULL,
            seat_index INTEGER NOT NULL,
            row_idx INTEGER NOT NULL,
            col_idx INTEGER NOT NULL,
            label TEXT NOT NULL,
            status TEXT NOT NULL,
            student_id TEXT,
            student_name TEXT,
            roll_no TEXT,
            special_requirement TEXT,
            PRIMARY KEY(plan_id, seat_index),
            UNIQUE(plan_id, label),
            FOREIGN KEY(plan_id) REFERENCES seating_plans(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
