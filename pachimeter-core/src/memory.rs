//! In-memory storage backend.
//!
//! The canonical backend for tests and single-process use; real
//! persistence lives behind the same [`RecordStorage`] trait outside this
//! crate.

use std::convert::Infallible;

use crate::RecordStorage;
use crate::records::{Machine, MachineId, RecordId, SessionRecord, Store, StoreId};
use crate::stats::MachineAggregate;

/// Vec-backed storage with autoincrement ids. Record iteration order is
/// insertion order, as the repository contract requires.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    stores: Vec<Store>,
    machines: Vec<Machine>,
    records: Vec<SessionRecord>,
    next_store_id: StoreId,
    next_machine_id: MachineId,
    next_record_id: RecordId,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn machine_mut(&mut self, machine_id: MachineId) -> Option<&mut Machine> {
        self.machines
            .iter_mut()
            .find(|machine| machine.id == machine_id)
    }
}

impl RecordStorage for MemoryStorage {
    type Error = Infallible;

    fn stores(&self) -> Result<Vec<Store>, Self::Error> {
        Ok(self.stores.clone())
    }

    fn store_by_name(&self, name: &str) -> Result<Option<Store>, Self::Error> {
        Ok(self.stores.iter().find(|store| store.name == name).cloned())
    }

    fn put_store(&mut self, name: &str, exchange_rate: f64) -> Result<Option<Store>, Self::Error> {
        if self.stores.iter().any(|store| store.name == name) {
            return Ok(None);
        }
        self.next_store_id += 1;
        let store = Store {
            id: self.next_store_id,
            name: name.to_string(),
            exchange_rate,
        };
        self.stores.push(store.clone());
        Ok(Some(store))
    }

    fn get_or_create_machine(
        &mut self,
        store_id: StoreId,
        machine_number: u32,
    ) -> Result<Machine, Self::Error> {
        if let Some(machine) = self
            .machines
            .iter()
            .find(|machine| machine.store_id == store_id && machine.machine_number == machine_number)
        {
            return Ok(machine.clone());
        }
        self.next_machine_id += 1;
        let machine = Machine::new(self.next_machine_id, store_id, machine_number);
        self.machines.push(machine.clone());
        Ok(machine)
    }

    fn machines_for_store(&self, store_id: StoreId) -> Result<Vec<Machine>, Self::Error> {
        Ok(self
            .machines
            .iter()
            .filter(|machine| machine.store_id == store_id)
            .cloned()
            .collect())
    }

    fn delete_machine(&mut self, machine_id: MachineId) -> Result<(), Self::Error> {
        self.machines.retain(|machine| machine.id != machine_id);
        self.records.retain(|record| record.machine_id != machine_id);
        Ok(())
    }

    fn record(&self, record_id: RecordId) -> Result<Option<SessionRecord>, Self::Error> {
        Ok(self
            .records
            .iter()
            .find(|record| record.id == record_id)
            .cloned())
    }

    fn records_for_machine(
        &self,
        machine_id: MachineId,
    ) -> Result<Vec<SessionRecord>, Self::Error> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.machine_id == machine_id)
            .cloned()
            .collect())
    }

    fn put_record(&mut self, record: &SessionRecord) -> Result<RecordId, Self::Error> {
        self.next_record_id += 1;
        let mut stored = record.clone();
        stored.id = self.next_record_id;
        self.records.push(stored);
        Ok(self.next_record_id)
    }

    fn delete_record(&mut self, record_id: RecordId) -> Result<bool, Self::Error> {
        let before = self.records.len();
        self.records.retain(|record| record.id != record_id);
        Ok(self.records.len() < before)
    }

    fn put_machine_aggregate(
        &mut self,
        machine_id: MachineId,
        aggregate: &MachineAggregate,
    ) -> Result<(), Self::Error> {
        if let Some(machine) = self.machine_mut(machine_id) {
            machine.aggregate = aggregate.clone();
        }
        Ok(())
    }

    fn put_machine_remarks(
        &mut self,
        machine_id: MachineId,
        remarks: &str,
    ) -> Result<(), Self::Error> {
        if let Some(machine) = self.machine_mut(machine_id) {
            machine.remarks = remarks.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_names_are_unique() {
        let mut storage = MemoryStorage::new();
        let first = storage.put_store("Default Store", 27.0).unwrap();
        assert!(first.is_some());
        assert!(storage.put_store("Default Store", 30.0).unwrap().is_none());
        assert_eq!(storage.stores().unwrap().len(), 1);
        let found = storage.store_by_name("Default Store").unwrap().unwrap();
        assert!((found.exchange_rate - 27.0).abs() < f64::EPSILON);
    }

    #[test]
    fn machines_are_created_lazily_with_default_cache() {
        let mut storage = MemoryStorage::new();
        let store = storage.put_store("s", 27.0).unwrap().unwrap();
        let machine = storage.get_or_create_machine(store.id, 987).unwrap();
        assert_eq!(machine.aggregate, MachineAggregate::default());
        let again = storage.get_or_create_machine(store.id, 987).unwrap();
        assert_eq!(machine.id, again.id);
    }

    #[test]
    fn record_ids_follow_insertion_order() {
        let mut storage = MemoryStorage::new();
        let store = storage.put_store("s", 27.0).unwrap().unwrap();
        let machine = storage.get_or_create_machine(store.id, 990).unwrap();
        let template = SessionRecord::from_inputs(
            0,
            machine.id,
            chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            crate::records::SessionInputs {
                investment_balls: 2500,
                spins: 200,
                hits: 1,
                payout_balls: 1400,
            },
        );
        let a = storage.put_record(&template).unwrap();
        let b = storage.put_record(&template).unwrap();
        assert!(b > a);
        let records = storage.records_for_machine(machine.id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, a);
        assert_eq!(records[1].id, b);
    }

    #[test]
    fn deleting_a_machine_drops_its_records() {
        let mut storage = MemoryStorage::new();
        let store = storage.put_store("s", 27.0).unwrap().unwrap();
        let machine = storage.get_or_create_machine(store.id, 1001).unwrap();
        let template = SessionRecord::from_inputs(
            0,
            machine.id,
            chrono::NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            crate::records::SessionInputs {
                investment_balls: 2500,
                spins: 180,
                hits: 0,
                payout_balls: 0,
            },
        );
        storage.put_record(&template).unwrap();
        storage.delete_machine(machine.id).unwrap();
        assert!(storage.machines_for_store(store.id).unwrap().is_empty());
        assert!(storage.records_for_machine(machine.id).unwrap().is_empty());
    }
}
