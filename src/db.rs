//! SQLite persistence. Every run drops and recreates its tables.

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, params_from_iter};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::schedule::ScheduledStopTime;
use crate::synth::accessibility::StopAccessibility;
use crate::synth::delay::ActualStopTime;
use crate::table::RawTable;

/// A derived row type with a fixed table layout.
///
/// `COLUMNS` must list the fields in serialization order.
pub trait TableRecord: serde::Serialize {
    const TABLE: &'static str;
    const COLUMNS: &'static [(&'static str, &'static str)];

    fn sql_values(&self) -> Vec<Value>;
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: &Option<String>) -> Value {
    s.as_deref().map(text).unwrap_or(Value::Null)
}

fn opt_real(v: Option<f64>) -> Value {
    v.map(Value::Real).unwrap_or(Value::Null)
}

impl TableRecord for ScheduledStopTime {
    const TABLE: &'static str = "scheduled_stop_times";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("stop_name", "TEXT"),
        ("scheduled_time", "TEXT"),
        ("scheduled_time_str", "TEXT"),
        ("route_id", "TEXT"),
        ("stop_id", "TEXT"),
        ("trip_id", "TEXT"),
    ];

    fn sql_values(&self) -> Vec<Value> {
        vec![
            text(&self.stop_name),
            Value::Text(self.scheduled_time.format("%H:%M:%S").to_string()),
            text(&self.scheduled_time_str),
            opt_text(&self.route_id),
            opt_text(&self.stop_id),
            text(&self.trip_id),
        ]
    }
}

impl TableRecord for ActualStopTime {
    const TABLE: &'static str = "actual_stop_times";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("trip_id", "TEXT"),
        ("route_id", "TEXT"),
        ("stop_id", "TEXT"),
        ("stop_name", "TEXT"),
        ("scheduled_time", "TEXT"),
        ("scheduled_time_obj", "TEXT"),
        ("actual_time_str", "TEXT"),
        ("actual_time_obj", "TEXT"),
        ("delay_minutes", "INTEGER"),
        ("stop_lat", "REAL"),
        ("stop_lon", "REAL"),
    ];

    fn sql_values(&self) -> Vec<Value> {
        vec![
            text(&self.trip_id),
            opt_text(&self.route_id),
            opt_text(&self.stop_id),
            text(&self.stop_name),
            text(&self.scheduled_time),
            Value::Text(self.scheduled_time_obj.format("%H:%M:%S").to_string()),
            text(&self.actual_time_str),
            Value::Text(self.actual_time_obj.format("%H:%M:%S").to_string()),
            Value::Integer(self.delay_minutes),
            opt_real(self.stop_lat),
            opt_real(self.stop_lon),
        ]
    }
}

impl TableRecord for StopAccessibility {
    const TABLE: &'static str = "stop_accessibility";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("stop_name", "TEXT"),
        ("wheelchair_accessible", "INTEGER"),
        ("shelter", "INTEGER"),
        ("lighting", "INTEGER"),
        ("stop_id", "TEXT"),
    ];

    fn sql_values(&self) -> Vec<Value> {
        vec![
            text(&self.stop_name),
            Value::Integer(self.wheelchair_accessible.into()),
            Value::Integer(self.shelter.into()),
            Value::Integer(self.lighting.into()),
            opt_text(&self.stop_id),
        ]
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names usable in DDL: blanks get a positional name, duplicates a suffix.
fn sql_column_names(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let base = if h.is_empty() {
                format!("column_{i}")
            } else {
                h.clone()
            };
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.to_lowercase()) {
                name = format!("{base}_{n}");
                n += 1;
            }
            name
        })
        .collect()
}

fn recreate(tx: &Transaction<'_>, table: &str, columns: &[(String, &str)]) -> Result<()> {
    let defs: Vec<String> = columns
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty))
        .collect();
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({});",
        defs.join(", "),
        table = quote_ident(table),
    ))?;
    Ok(())
}

fn insert_sql(table: &str, width: usize) -> String {
    let placeholders: Vec<String> = (1..=width).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(table),
        placeholders.join(", ")
    )
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file, creating its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replaces every output table in a single transaction.
    #[tracing::instrument(skip_all)]
    pub fn replace_all(
        &mut self,
        scheduled: &[ScheduledStopTime],
        actuals: &[ActualStopTime],
        accessibility: &[StopAccessibility],
        stops: &RawTable,
        routes: &RawTable,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        replace_records(&tx, scheduled)?;
        replace_records(&tx, actuals)?;
        replace_records(&tx, accessibility)?;
        replace_raw(&tx, "stops_raw", stops)?;
        replace_raw(&tx, "routes_raw", routes)?;
        tx.commit()?;
        info!("Database tables replaced");
        Ok(())
    }
}

fn replace_records<T: TableRecord>(tx: &Transaction<'_>, rows: &[T]) -> Result<()> {
    let columns: Vec<(String, &str)> = T::COLUMNS
        .iter()
        .map(|&(name, ty)| (name.to_string(), ty))
        .collect();
    recreate(tx, T::TABLE, &columns)?;

    let mut stmt = tx.prepare(&insert_sql(T::TABLE, columns.len()))?;
    for row in rows {
        stmt.execute(params_from_iter(row.sql_values()))?;
    }
    debug!(table = T::TABLE, rows = rows.len(), "Table written");
    Ok(())
}

fn replace_raw(tx: &Transaction<'_>, table: &str, raw: &RawTable) -> Result<()> {
    let columns: Vec<(String, &str)> = sql_column_names(&raw.headers)
        .into_iter()
        .map(|name| (name, "TEXT"))
        .collect();
    if columns.is_empty() {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(table)))?;
        return Ok(());
    }
    recreate(tx, table, &columns)?;

    let mut stmt = tx.prepare(&insert_sql(table, columns.len()))?;
    for row in raw.rendered_rows() {
        stmt.execute(params_from_iter(row))?;
    }
    debug!(table, rows = raw.len(), "Table written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use chrono::NaiveTime;

    fn scheduled(stop: &str) -> ScheduledStopTime {
        ScheduledStopTime {
            stop_name: stop.into(),
            scheduled_time: NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
            scheduled_time_str: "08:05".into(),
            route_id: Some("R1".into()),
            stop_id: None,
            trip_id: "R1__08:05".into(),
        }
    }

    fn raw() -> RawTable {
        RawTable::new(
            vec!["id".into(), "name".into(), "name".into(), "".into()],
            vec![vec![
                Cell::Text("1".into()),
                Cell::Text("Central".into()),
                Cell::List(vec!["x".into()]),
                Cell::Text("".into()),
            ]],
        )
    }

    #[test]
    fn test_actual_times_stored_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("test.db")).unwrap();
        let actual = ActualStopTime {
            trip_id: "R1__23:55".into(),
            route_id: Some("R1".into()),
            stop_id: None,
            stop_name: "Central".into(),
            scheduled_time: "23:55".into(),
            scheduled_time_obj: NaiveTime::from_hms_opt(23, 55, 0).unwrap(),
            actual_time_str: "00:07:00".into(),
            actual_time_obj: NaiveTime::from_hms_opt(0, 7, 0).unwrap(),
            delay_minutes: 12,
            stop_lat: Some(12.97),
            stop_lon: Some(77.59),
        };
        db.replace_all(&[], &[actual], &[], &RawTable::default(), &RawTable::default())
            .unwrap();

        let row: (String, String, String, String, i64, f64) = db
            .connection()
            .query_row(
                "SELECT scheduled_time, scheduled_time_obj, actual_time_str, actual_time_obj, \
                 delay_minutes, stop_lat FROM actual_stop_times",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .unwrap();
        assert_eq!(
            row,
            (
                "23:55".to_string(),
                "23:55:00".to_string(),
                "00:07:00".to_string(),
                "00:07:00".to_string(),
                12,
                12.97
            )
        );
    }

    #[test]
    fn test_sql_column_names() {
        let names = sql_column_names(&["id".into(), "".into(), "ID".into(), "id_2".into()]);
        assert_eq!(names, vec!["id", "column_1", "ID_2", "id_2_2"]);
    }

    #[test]
    fn test_replace_all_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        for n in [3usize, 1] {
            let mut db = Database::open(&path).unwrap();
            let rows: Vec<_> = (0..n).map(|i| scheduled(&format!("S{i}"))).collect();
            db.replace_all(&rows, &[], &[], &raw(), &RawTable::default())
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let conn = db.connection();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM scheduled_stop_times", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let (time, stop_id): (String, Option<String>) = conn
            .query_row(
                "SELECT scheduled_time, stop_id FROM scheduled_stop_times",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(time, "08:05:00");
        assert_eq!(stop_id, None);

        let list: String = conn
            .query_row("SELECT name_2 FROM stops_raw", [], |r| r.get(0))
            .unwrap();
        assert_eq!(list, "['x']");

        let routes_exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'routes_raw'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(routes_exists, 0);
    }
}
