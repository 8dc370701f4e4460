use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::core::monitor::{Channel, Reading};
use crate::error::{EnvmonError, Result};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sensor_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    temperature REAL,
    humidity REAL,
    smoke REAL
)";

/// A row of the `sensor_data` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReading {
    pub id: i64,
    pub timestamp: DateTime<Local>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub smoke: Option<f64>,
}

/// SQLite history of every reading shown by the monitor.
///
/// Channels that were offline or failed on a tick are stored as `NULL` rather
/// than as the placeholder value carried in the reading.
pub struct ReadingStore {
    conn: Connection,
}

impl ReadingStore {
    /// Open (or create) the database file and make sure the table exists
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    /// Insert one reading and return its row id
    pub fn persist(&self, reading: &Reading) -> Result<i64> {
        let stored = |channel: Channel| {
            if reading.is_valid(channel) {
                reading.value(channel)
            } else {
                None
            }
        };

        self.conn.execute(
            "INSERT INTO sensor_data (timestamp, temperature, humidity, smoke) VALUES (?1, ?2, ?3, ?4)",
            params![
                reading.timestamp.to_rfc3339(),
                stored(Channel::Temperature),
                stored(Channel::Humidity),
                stored(Channel::Smoke),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most recent rows, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredReading>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, temperature, humidity, smoke FROM sensor_data ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, timestamp, temperature, humidity, smoke)| {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| EnvmonError::storage(format!("bad timestamp {:?} in row {}: {}", timestamp, id, e)))?
                    .with_timezone(&Local);
                Ok(StoredReading {
                    id,
                    timestamp,
                    temperature,
                    humidity,
                    smoke,
                })
            })
            .collect()
    }
}
