//! Sequence storage - JSON lines, one file per sequence
//!
//! First line holds metadata, every following line is one event:
//!
//! ```text
//! {"name":"action_record_data_0","columns":["trigger","duration"],"created":"2024-05-01T10:00:00Z"}
//! {"trigger":true,"duration":100}
//! {"trigger":true,"duration":250}
//! ```

use actionrec_core::gateway::validate_name;
use actionrec_core::{Error, Event, PersistenceGateway, Result, RowId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    name: String,
    columns: Vec<String>,
    created: chrono::DateTime<chrono::Utc>,
}

pub struct JsonlGateway {
    dir: PathBuf,
    /// Rows per sequence, filled lazily. Also serializes writers.
    rows: Mutex<HashMap<String, i64>>,
}

impl JsonlGateway {
    /// Store under `~/.actionrec`
    pub fn new() -> anyhow::Result<Self> {
        Self::with_dir(super::default_dir()?)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            rows: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn file(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.jsonl", name)))
    }

    fn existing(&self, name: &str) -> Result<PathBuf> {
        let path = self.file(name)?;
        if !path.exists() {
            return Err(Error::persistence(format!(
                "sequence '{}' does not exist",
                name
            )));
        }
        Ok(path)
    }

    fn write_meta(path: &Path, meta: &Meta) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut w, meta)?;
        writeln!(w)?;
        w.flush()?;
        Ok(())
    }

    fn read_meta(path: &Path) -> Result<Meta> {
        let mut lines = BufReader::new(File::open(path)?).lines();
        let first = lines
            .next()
            .ok_or_else(|| Error::persistence(format!("{} is empty", path.display())))??;
        Ok(serde_json::from_str(&first)?)
    }

    fn count_rows(path: &Path) -> Result<i64> {
        let reader = BufReader::new(File::open(path)?);
        let mut n = 0;
        for line in reader.lines().skip(1) {
            if !line?.is_empty() {
                n += 1;
            }
        }
        Ok(n)
    }
}

impl PersistenceGateway for JsonlGateway {
    fn create_sequence(&self, name: &str, columns: &[&str]) -> Result<()> {
        let path = self.file(name)?;
        let _rows = self.rows.lock();
        if path.exists() {
            return Ok(());
        }
        let meta = Meta {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            created: chrono::Utc::now(),
        };
        Self::write_meta(&path, &meta)
    }

    fn append_record(&self, name: &str, record: &Event) -> Result<RowId> {
        let path = self.existing(name)?;
        let mut rows = self.rows.lock();
        let next = match rows.get(name) {
            Some(n) => *n,
            None => Self::count_rows(&path)?,
        };

        let mut file = OpenOptions::new().append(true).open(&path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;

        rows.insert(name.to_string(), next + 1);
        Ok(RowId(next))
    }

    fn read_all(&self, name: &str) -> Result<Vec<Event>> {
        let path = self.existing(name)?;
        let _rows = self.rows.lock();
        let reader = BufReader::new(File::open(&path)?);

        // First line: metadata
        let mut events = Vec::new();
        for line in reader.lines().skip(1) {
            let line = line?;
            if !line.is_empty() {
                events.push(serde_json::from_str(&line)?);
            }
        }
        Ok(events)
    }

    fn clear_sequence(&self, name: &str) -> Result<()> {
        let path = self.existing(name)?;
        let mut rows = self.rows.lock();
        let meta = Self::read_meta(&path)?;
        Self::write_meta(&path, &meta)?;
        rows.insert(name.to_string(), 0);
        Ok(())
    }

    fn len(&self, name: &str) -> Result<usize> {
        let path = self.existing(name)?;
        let rows = self.rows.lock();
        match rows.get(name) {
            Some(n) => Ok(*n as usize),
            None => Ok(Self::count_rows(&path)? as usize),
        }
    }

    fn list_sequences(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if let Some(s) = file_name.to_str() {
                if let Some(stem) = s.strip_suffix(".jsonl") {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn drop_sequence(&self, name: &str) -> Result<()> {
        let path = self.existing(name)?;
        let mut rows = self.rows.lock();
        fs::remove_file(path)?;
        rows.remove(name);
        Ok(())
    }
}
