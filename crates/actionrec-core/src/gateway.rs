//! Durable storage boundary for recorded sequences

use crate::error::{Error, Result};
use crate::events::Event;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub i64);

/// Table-like store, one record per event.
///
/// Implementations must return records from `read_all` in insertion order;
/// playback relies on it.
pub trait PersistenceGateway: Send + Sync {
    /// Create the sequence if it doesn't exist yet. Existing rows are kept.
    fn create_sequence(&self, name: &str, columns: &[&str]) -> Result<()>;

    fn append_record(&self, name: &str, record: &Event) -> Result<RowId>;

    fn read_all(&self, name: &str) -> Result<Vec<Event>>;

    /// Remove every record, keeping the sequence itself
    fn clear_sequence(&self, name: &str) -> Result<()>;

    fn len(&self, name: &str) -> Result<usize> {
        Ok(self.read_all(name)?.len())
    }

    fn list_sequences(&self) -> Result<Vec<String>>;

    fn drop_sequence(&self, name: &str) -> Result<()>;
}

/// Sequence names end up as file and table names, so keep them boring
pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(Error::persistence(format!("invalid sequence name '{}'", name))
            .with_suggestions(vec!["use only [A-Za-z0-9_-]".to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_registry_names() {
        assert!(validate_name("action_record_data_12").is_ok());
        assert!(validate_name("demo-1").is_ok());
    }

    #[test]
    fn rejects_paths_and_sql() {
        for bad in ["", "../etc", "a b", "x;DROP TABLE y", "name.jsonl"] {
            let err = validate_name(bad).unwrap_err();
            assert!(err.is_persistence(), "{bad}");
        }
    }
}
