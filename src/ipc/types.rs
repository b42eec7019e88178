use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub db: Connection,
    pub started_at: String,
}

impl AppState {
    pub fn open() -> anyhow::Result<Self> {
        Ok(Self {
            db: crate::db::open_db()?,
            started_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
