//! Session record CRUD with single-slot undo.
//!
//! Every mutation is one synchronous unit: the record-set change and the
//! full aggregate recompute for the owning machine persist together, so
//! the cached aggregate can never diverge from the records beneath it.

use chrono::NaiveDate;

use crate::RecordStorage;
use crate::records::{MachineId, RecordId, SessionInputs, SessionRecord, StoreId};
use crate::stats::{self, MachineAggregate};

/// Snapshot slot for the most recently deleted record.
///
/// Holds at most one record; any new deletion replaces or invalidates
/// the previous snapshot. Only insertion-order deletes store a new one,
/// because "most recent" stops being meaningful once arbitrary records
/// can go; targeted and bulk deletes just drop whatever is pending.
#[derive(Debug, Clone, Default)]
pub struct UndoBuffer {
    slot: Option<SessionRecord>,
}

impl UndoBuffer {
    /// Whether the buffer holds a snapshot for the given machine.
    #[must_use]
    pub fn holds_for(&self, machine_id: MachineId) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|record| record.machine_id == machine_id)
    }

    fn hold(&mut self, record: SessionRecord) {
        self.slot = Some(record);
    }

    fn clear(&mut self) {
        self.slot = None;
    }

    fn take_for(&mut self, machine_id: MachineId) -> Option<SessionRecord> {
        if self.holds_for(machine_id) {
            self.slot.take()
        } else {
            None
        }
    }
}

/// Per-machine status row for the overview listing.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineStatus {
    pub machine_number: u32,
    pub aggregate: MachineAggregate,
    pub remarks: String,
}

/// CRUD over session records, generic over the storage backend.
///
/// Single-writer: mutating operations take `&mut self` and must not run
/// concurrently for the same machine. Reads are pure over materialized
/// state.
#[derive(Debug)]
pub struct SessionRecordRepository<S: RecordStorage> {
    storage: S,
    undo: UndoBuffer,
}

impl<S: RecordStorage> SessionRecordRepository<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            undo: UndoBuffer::default(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    #[must_use]
    pub fn undo(&self) -> &UndoBuffer {
        &self.undo
    }

    /// Append a session record, computing its derived fields, and refresh
    /// the owning machine's aggregate.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn add(
        &mut self,
        machine_id: MachineId,
        date: NaiveDate,
        inputs: SessionInputs,
    ) -> Result<SessionRecord, S::Error> {
        let record = SessionRecord::from_inputs(0, machine_id, date, inputs);
        let id = self.storage.put_record(&record)?;
        let aggregate = self.refresh_aggregate(machine_id)?;
        log::debug!(
            "added record {id} to machine {machine_id}: base {:.1}, {} records total",
            record.base_calculated,
            aggregate.record_count
        );
        Ok(SessionRecord { id, ..record })
    }

    /// Delete the most recently inserted record of a machine, snapshotting
    /// it for undo. Returns the number of records removed (0 or 1).
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn delete_last(&mut self, machine_id: MachineId) -> Result<usize, S::Error> {
        let mut records = self.storage.records_for_machine(machine_id)?;
        let Some(last) = records.pop() else {
            return Ok(0);
        };
        self.storage.delete_record(last.id)?;
        log::debug!("deleted record {} from machine {machine_id}", last.id);
        self.undo.hold(last);
        self.refresh_aggregate(machine_id)?;
        Ok(1)
    }

    /// Delete an arbitrary record by id. Returns the number of records
    /// removed (0 or 1). Never stores a snapshot, and invalidates any
    /// pending one: the record set it was taken against no longer exists.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn delete_by_id(&mut self, record_id: RecordId) -> Result<usize, S::Error> {
        let Some(record) = self.storage.record(record_id)? else {
            return Ok(0);
        };
        self.storage.delete_record(record_id)?;
        self.undo.clear();
        log::debug!(
            "deleted record {record_id} from machine {}",
            record.machine_id
        );
        self.refresh_aggregate(record.machine_id)?;
        Ok(1)
    }

    /// Reinsert the snapshotted record if it belongs to `machine_id`,
    /// clearing the buffer. Returns whether anything was restored.
    ///
    /// The restored record gets a fresh id but identical field values,
    /// derived fields included.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn restore_last(&mut self, machine_id: MachineId) -> Result<bool, S::Error> {
        let Some(snapshot) = self.undo.take_for(machine_id) else {
            return Ok(false);
        };
        let id = self.storage.put_record(&snapshot)?;
        log::debug!("restored record {} as {id} on machine {machine_id}", snapshot.id);
        self.refresh_aggregate(machine_id)?;
        Ok(true)
    }

    /// Delete every record of a machine and reset its aggregate to the
    /// defaults. Returns the number of records removed. Invalidates any
    /// pending undo snapshot so a restore cannot repopulate a machine
    /// that was just wiped.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn clear_machine(&mut self, machine_id: MachineId) -> Result<usize, S::Error> {
        let records = self.storage.records_for_machine(machine_id)?;
        for record in &records {
            self.storage.delete_record(record.id)?;
        }
        self.undo.clear();
        self.refresh_aggregate(machine_id)?;
        log::debug!("cleared {} records from machine {machine_id}", records.len());
        Ok(records.len())
    }

    /// Current aggregate over a machine's live record set.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn machine_aggregate(&self, machine_id: MachineId) -> Result<MachineAggregate, S::Error> {
        let records = self.storage.records_for_machine(machine_id)?;
        Ok(stats::recompute(&records))
    }

    /// Aggregate over the union of several machines' record sets. Same
    /// pure function as the per-machine path, so enumeration order does
    /// not matter.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn recompute_group(&self, machine_ids: &[MachineId]) -> Result<MachineAggregate, S::Error> {
        let mut union = Vec::new();
        for &machine_id in machine_ids {
            union.extend(self.storage.records_for_machine(machine_id)?);
        }
        Ok(stats::recompute(&union))
    }

    /// Status rows for every machine of a store, ordered by machine
    /// number.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn store_overview(&self, store_id: StoreId) -> Result<Vec<MachineStatus>, S::Error> {
        let mut machines = self.storage.machines_for_store(store_id)?;
        machines.sort_by_key(|machine| machine.machine_number);
        Ok(machines
            .into_iter()
            .map(|machine| MachineStatus {
                machine_number: machine.machine_number,
                aggregate: machine.aggregate,
                remarks: machine.remarks,
            })
            .collect())
    }

    /// Replace the free-text remarks of a machine.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn set_remarks(&mut self, machine_id: MachineId, remarks: &str) -> Result<(), S::Error> {
        self.storage.put_machine_remarks(machine_id, remarks)
    }

    fn refresh_aggregate(&mut self, machine_id: MachineId) -> Result<MachineAggregate, S::Error> {
        let records = self.storage.records_for_machine(machine_id)?;
        let aggregate = stats::recompute(&records);
        self.storage.put_machine_aggregate(machine_id, &aggregate)?;
        Ok(aggregate)
    }
}
