//! Pachimeter Core Engine
//!
//! Platform-agnostic expectation and session-statistics engine for
//! pachinko play tracking. This crate provides the expectation model
//! registry, the session record repository with weighted statistics, and
//! the provisioning layer, without UI or persistence-specific
//! dependencies.

pub mod constants;
pub mod interp;
pub mod memory;
pub mod model;
pub mod numbers;
pub mod provision;
pub mod records;
pub mod repository;
pub mod stats;

// Re-export commonly used types
pub use interp::{InterpolationTable, TableConfigError};
pub use memory::MemoryStorage;
pub use model::{ExpectationModel, ModelRegistry, SecondaryPhase};
pub use provision::{
    IslandCfg, MachineNumberSet, MachineRange, ProvisionConfig, ProvisionSummary, StoreSeed,
    provision,
};
pub use records::{
    Machine, MachineId, RecordId, SessionInputs, SessionRecord, Store, StoreId,
};
pub use repository::{MachineStatus, SessionRecordRepository, UndoBuffer};
pub use stats::{MachineAggregate, recompute};

/// Trait for abstracting record persistence operations.
/// Platform-specific implementations should provide this; the in-memory
/// [`MemoryStorage`] backend ships with the crate.
pub trait RecordStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All known stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the stores cannot be read.
    fn stores(&self) -> Result<Vec<Store>, Self::Error>;

    /// Look a store up by display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the stores cannot be read.
    fn store_by_name(&self, name: &str) -> Result<Option<Store>, Self::Error>;

    /// Create a store, returning `None` when the name is already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn put_store(&mut self, name: &str, exchange_rate: f64) -> Result<Option<Store>, Self::Error>;

    /// Fetch a machine by store and number, creating it lazily with the
    /// default aggregate cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine cannot be read or created.
    fn get_or_create_machine(
        &mut self,
        store_id: StoreId,
        machine_number: u32,
    ) -> Result<Machine, Self::Error>;

    /// Every machine owned by a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the machines cannot be read.
    fn machines_for_store(&self, store_id: StoreId) -> Result<Vec<Machine>, Self::Error>;

    /// Remove a machine together with its records.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine cannot be removed.
    fn delete_machine(&mut self, machine_id: MachineId) -> Result<(), Self::Error>;

    /// Look a single record up by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn record(&self, record_id: RecordId) -> Result<Option<SessionRecord>, Self::Error>;

    /// A machine's records in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    fn records_for_machine(
        &self,
        machine_id: MachineId,
    ) -> Result<Vec<SessionRecord>, Self::Error>;

    /// Persist a record, assigning and returning a fresh id. Ids must
    /// follow insertion order; the id on the argument is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn put_record(&mut self, record: &SessionRecord) -> Result<RecordId, Self::Error>;

    /// Remove a record, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    fn delete_record(&mut self, record_id: RecordId) -> Result<bool, Self::Error>;

    /// Write a machine's cached aggregate. Only the statistics recompute
    /// path may call this.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregate cannot be written.
    fn put_machine_aggregate(
        &mut self,
        machine_id: MachineId,
        aggregate: &MachineAggregate,
    ) -> Result<(), Self::Error>;

    /// Replace a machine's free-text remarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the remarks cannot be written.
    fn put_machine_remarks(
        &mut self,
        machine_id: MachineId,
        remarks: &str,
    ) -> Result<(), Self::Error>;
}

/// Main engine tying the repository, model registry, and island
/// configuration together for the display layer.
pub struct Engine<S: RecordStorage> {
    repository: SessionRecordRepository<S>,
    registry: ModelRegistry,
    config: ProvisionConfig,
}

impl<S: RecordStorage> Engine<S> {
    /// Provision storage against the configuration and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an error if provisioning fails.
    pub fn new(
        mut storage: S,
        registry: ModelRegistry,
        config: ProvisionConfig,
    ) -> Result<Self, S::Error> {
        provision::provision(&mut storage, &config)?;
        Ok(Self {
            repository: SessionRecordRepository::new(storage),
            registry,
            config,
        })
    }

    /// Engine over the built-in model catalog and default provisioning.
    ///
    /// # Errors
    ///
    /// Returns an error if provisioning fails.
    pub fn with_defaults(storage: S) -> Result<Self, S::Error> {
        Self::new(
            storage,
            ModelRegistry::builtin(),
            ProvisionConfig::default_config(),
        )
    }

    #[must_use]
    pub fn repository(&self) -> &SessionRecordRepository<S> {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut SessionRecordRepository<S> {
        &mut self.repository
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// EV for a model id, `None` when the model is unknown.
    #[must_use]
    pub fn compute_ev(
        &self,
        model_id: &str,
        efficiency: f64,
        remaining_spins: u32,
        exchange_rate: f64,
        payout_per_hit: f64,
    ) -> Option<i64> {
        self.registry.get(model_id).map(|model| {
            model.compute_ev(efficiency, remaining_spins, exchange_rate, payout_per_hit)
        })
    }

    /// EV for a provisioned machine, resolved end to end: the island
    /// catalog picks the model, the store supplies the exchange rate, and
    /// the cached aggregate supplies efficiency and payout (falling back
    /// to the documented defaults while the machine has no play data).
    ///
    /// Returns `Ok(None)` when the store, machine, or island is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn machine_ev(
        &self,
        store_id: StoreId,
        machine_number: u32,
        remaining_spins: u32,
    ) -> Result<Option<i64>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let Some(island) = self.config.island_for_machine(machine_number) else {
            return Ok(None);
        };
        let Some(model) = self.registry.get(&island.model) else {
            return Ok(None);
        };
        let storage = self.repository.storage();
        let Some(store) = storage
            .stores()
            .map_err(Into::into)?
            .into_iter()
            .find(|store| store.id == store_id)
        else {
            return Ok(None);
        };
        let Some(machine) = storage
            .machines_for_store(store_id)
            .map_err(Into::into)?
            .into_iter()
            .find(|machine| machine.machine_number == machine_number)
        else {
            return Ok(None);
        };
        let aggregate = &machine.aggregate;
        let efficiency = if aggregate.has_data() {
            aggregate.weighted_base
        } else {
            constants::DEFAULT_BASE
        };
        Ok(Some(model.compute_ev(
            efficiency,
            remaining_spins,
            store.exchange_rate,
            aggregate.weighted_avg_payout,
        )))
    }

    /// Aggregate over every machine of an island within a store, `None`
    /// when the island id is unknown.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn island_aggregate(
        &self,
        store_id: StoreId,
        island_id: &str,
    ) -> Result<Option<MachineAggregate>, S::Error> {
        let Some(island) = self.config.island(island_id) else {
            return Ok(None);
        };
        let machines = self.repository.storage().machines_for_store(store_id)?;
        let member_ids: Vec<MachineId> = machines
            .iter()
            .filter(|machine| island.machine_numbers.contains(&machine.machine_number))
            .map(|machine| machine.id)
            .collect();
        self.repository.recompute_group(&member_ids).map(Some)
    }
}
