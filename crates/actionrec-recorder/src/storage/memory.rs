use actionrec_core::gateway::validate_name;
use actionrec_core::{Error, Event, PersistenceGateway, Result, RowId};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryGateway {
    sequences: Mutex<HashMap<String, Vec<Event>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(name: &str) -> Error {
    Error::persistence(format!("sequence '{}' does not exist", name))
}

impl PersistenceGateway for MemoryGateway {
    fn create_sequence(&self, name: &str, _columns: &[&str]) -> Result<()> {
        validate_name(name)?;
        self.sequences.lock().entry(name.to_string()).or_default();
        Ok(())
    }

    fn append_record(&self, name: &str, record: &Event) -> Result<RowId> {
        let mut sequences = self.sequences.lock();
        let rows = sequences.get_mut(name).ok_or_else(|| missing(name))?;
        rows.push(*record);
        Ok(RowId(rows.len() as i64 - 1))
    }

    fn read_all(&self, name: &str) -> Result<Vec<Event>> {
        self.sequences
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| missing(name))
    }

    fn clear_sequence(&self, name: &str) -> Result<()> {
        let mut sequences = self.sequences.lock();
        sequences.get_mut(name).ok_or_else(|| missing(name))?.clear();
        Ok(())
    }

    fn len(&self, name: &str) -> Result<usize> {
        self.sequences
            .lock()
            .get(name)
            .map(Vec::len)
            .ok_or_else(|| missing(name))
    }

    fn list_sequences(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = self.sequences.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn drop_sequence(&self, name: &str) -> Result<()> {
        self.sequences
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| missing(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actionrec_core::COLUMNS;

    #[test]
    fn rows_come_back_in_insert_order() {
        let gw = MemoryGateway::new();
        gw.create_sequence("s", &COLUMNS).unwrap();
        for ms in [100, 250, 400] {
            gw.append_record("s", &Event::triggered(ms)).unwrap();
        }
        let rows = gw.read_all("s").unwrap();
        let delays: Vec<_> = rows.iter().map(|e| e.elapsed_millis).collect();
        assert_eq!(delays, vec![100, 250, 400]);
        assert_eq!(gw.len("s").unwrap(), 3);
    }

    #[test]
    fn create_is_idempotent() {
        let gw = MemoryGateway::new();
        gw.create_sequence("s", &COLUMNS).unwrap();
        gw.append_record("s", &Event::triggered(1)).unwrap();
        gw.create_sequence("s", &COLUMNS).unwrap();
        assert_eq!(gw.len("s").unwrap(), 1);
    }

    #[test]
    fn unknown_sequence_is_persistence_failure() {
        let gw = MemoryGateway::new();
        assert!(gw.read_all("nope").unwrap_err().is_persistence());
        assert!(gw.append_record("nope", &Event::triggered(1)).is_err());
    }

    #[test]
    fn clear_and_drop() {
        let gw = MemoryGateway::new();
        gw.create_sequence("a", &COLUMNS).unwrap();
        gw.create_sequence("b", &COLUMNS).unwrap();
        gw.append_record("a", &Event::triggered(1)).unwrap();
        gw.clear_sequence("a").unwrap();
        assert_eq!(gw.len("a").unwrap(), 0);

        gw.drop_sequence("b").unwrap();
        assert_eq!(gw.list_sequences().unwrap(), vec!["a"]);
    }
}
