//! Sequence storage - one SQLite table per sequence, ordered by rowid

use actionrec_core::events::{COL_DURATION, COL_TRIGGER};
use actionrec_core::gateway::validate_name;
use actionrec_core::{Error, Event, PersistenceGateway, Result, RowId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

fn db_err(error: rusqlite::Error) -> Error {
    Error::persistence(format!("sqlite: {}", error))
}

impl SqliteGateway {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(db_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    fn require(conn: &Connection, name: &str) -> Result<()> {
        validate_name(name)?;
        if Self::table_exists(conn, name)? {
            Ok(())
        } else {
            Err(Error::persistence(format!(
                "sequence '{}' does not exist",
                name
            )))
        }
    }
}

impl PersistenceGateway for SqliteGateway {
    fn create_sequence(&self, name: &str, columns: &[&str]) -> Result<()> {
        validate_name(name)?;
        for required in [COL_TRIGGER, COL_DURATION] {
            if !columns.contains(&required) {
                return Err(Error::persistence(format!(
                    "sequence '{}' needs a '{}' column",
                    name, required
                )));
            }
        }
        let mut defs = Vec::with_capacity(columns.len());
        for col in columns {
            validate_name(col)?;
            defs.push(format!("\"{}\" INTEGER NOT NULL DEFAULT 0", col));
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            name,
            defs.join(", ")
        );
        self.conn.lock().execute(&sql, []).map_err(db_err)?;
        Ok(())
    }

    fn append_record(&self, name: &str, record: &Event) -> Result<RowId> {
        let conn = self.conn.lock();
        Self::require(&conn, name)?;
        let sql = format!(
            "INSERT INTO \"{}\" (\"{}\", \"{}\") VALUES (?1, ?2)",
            name, COL_TRIGGER, COL_DURATION
        );
        conn.execute(&sql, params![record.triggered, record.elapsed_millis])
            .map_err(db_err)?;
        Ok(RowId(conn.last_insert_rowid()))
    }

    fn read_all(&self, name: &str) -> Result<Vec<Event>> {
        let conn = self.conn.lock();
        Self::require(&conn, name)?;
        let sql = format!(
            "SELECT \"{}\", \"{}\" FROM \"{}\" ORDER BY rowid",
            COL_TRIGGER, COL_DURATION, name
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Event {
                    triggered: row.get(0)?,
                    elapsed_millis: row.get(1)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn clear_sequence(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        Self::require(&conn, name)?;
        conn.execute(&format!("DELETE FROM \"{}\"", name), [])
            .map_err(db_err)?;
        Ok(())
    }

    fn len(&self, name: &str) -> Result<usize> {
        let conn = self.conn.lock();
        Self::require(&conn, name)?;
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", name), [], |row| {
                row.get(0)
            })
            .map_err(db_err)?;
        Ok(n as usize)
    }

    fn list_sequences(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(db_err)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(names)
    }

    fn drop_sequence(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        Self::require(&conn, name)?;
        conn.execute(&format!("DROP TABLE \"{}\"", name), [])
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actionrec_core::COLUMNS;

    #[test]
    fn rowids_follow_insert_order() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        gw.create_sequence("seq", &COLUMNS).unwrap();
        let a = gw.append_record("seq", &Event::triggered(100)).unwrap();
        let b = gw.append_record("seq", &Event::triggered(250)).unwrap();
        assert!(b > a);

        let rows = gw.read_all("seq").unwrap();
        assert_eq!(rows, vec![Event::triggered(100), Event::triggered(250)]);
        assert_eq!(gw.len("seq").unwrap(), 2);
    }

    #[test]
    fn trigger_flag_roundtrips() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        gw.create_sequence("seq", &COLUMNS).unwrap();
        let placeholder = Event {
            triggered: false,
            elapsed_millis: 42,
        };
        gw.append_record("seq", &placeholder).unwrap();
        assert_eq!(gw.read_all("seq").unwrap(), vec![placeholder]);
    }

    #[test]
    fn persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.sqlite");
        {
            let gw = SqliteGateway::open(&path).unwrap();
            gw.create_sequence("seq", &COLUMNS).unwrap();
            gw.append_record("seq", &Event::triggered(5)).unwrap();
        }
        let gw = SqliteGateway::open(&path).unwrap();
        gw.create_sequence("seq", &COLUMNS).unwrap();
        assert_eq!(gw.read_all("seq").unwrap(), vec![Event::triggered(5)]);
    }

    #[test]
    fn clear_list_drop() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        gw.create_sequence("a", &COLUMNS).unwrap();
        gw.create_sequence("b", &COLUMNS).unwrap();
        gw.append_record("a", &Event::triggered(1)).unwrap();
        gw.clear_sequence("a").unwrap();
        assert_eq!(gw.len("a").unwrap(), 0);
        assert_eq!(gw.list_sequences().unwrap(), vec!["a", "b"]);
        gw.drop_sequence("b").unwrap();
        assert_eq!(gw.list_sequences().unwrap(), vec!["a"]);
    }

    #[test]
    fn missing_columns_rejected() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        assert!(gw.create_sequence("seq", &["trigger"]).is_err());
        assert!(gw.append_record("seq", &Event::triggered(1)).is_err());
    }
}
