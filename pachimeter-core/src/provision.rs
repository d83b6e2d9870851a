//! Idempotent provisioning of known stores, machines, and islands.
//!
//! Runs once at process start and is safe to run again: existing rows are
//! left alone, missing ones are created, and machines outside the
//! configured number range are pruned together with their records.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::RecordStorage;
use crate::records::Store;

const DEFAULT_PROVISION_DATA: &str = include_str!("../assets/provision.json");

/// Machine numbers belonging to one island, stored inline.
pub type MachineNumberSet = SmallVec<[u32; 8]>;

/// Inclusive machine-number range a store is provisioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRange {
    pub first: u32,
    pub last: u32,
}

impl MachineRange {
    #[must_use]
    pub const fn contains(&self, machine_number: u32) -> bool {
        self.first <= machine_number && machine_number <= self.last
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + use<> {
        self.first..=self.last
    }
}

/// Seed data for one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSeed {
    pub name: String,
    pub exchange_rate: f64,
    pub machine_numbers: MachineRange,
}

/// A named set of machines sharing one underlying game model.
///
/// Islands are configuration, not stored entities; they only direct
/// group aggregation and model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IslandCfg {
    pub id: String,
    pub name: String,
    /// Expectation model id shared by the island's machines.
    pub model: String,
    pub machine_numbers: MachineNumberSet,
}

/// Process-wide provisioning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub stores: Vec<StoreSeed>,
    #[serde(default)]
    pub islands: Vec<IslandCfg>,
}

impl ProvisionConfig {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_PROVISION_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_config() -> Self {
        Self::load_from_static()
    }

    #[must_use]
    pub fn island(&self, island_id: &str) -> Option<&IslandCfg> {
        self.islands.iter().find(|island| island.id == island_id)
    }

    /// The island a machine number belongs to, if any.
    #[must_use]
    pub fn island_for_machine(&self, machine_number: u32) -> Option<&IslandCfg> {
        self.islands
            .iter()
            .find(|island| island.machine_numbers.contains(&machine_number))
    }
}

/// Outcome counts of one provisioning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub stores_created: usize,
    pub machines_pruned: usize,
}

/// Bring storage in line with the configuration.
///
/// # Errors
///
/// Propagates storage failures; a failed pass can be rerun safely.
pub fn provision<S: RecordStorage>(
    storage: &mut S,
    config: &ProvisionConfig,
) -> Result<ProvisionSummary, S::Error> {
    let mut summary = ProvisionSummary::default();
    for seed in &config.stores {
        let store = match storage.store_by_name(&seed.name)? {
            Some(existing) => existing,
            None => match storage.put_store(&seed.name, seed.exchange_rate)? {
                Some(created) => {
                    summary.stores_created += 1;
                    created
                }
                None => continue,
            },
        };
        summary.machines_pruned += prune_out_of_range(storage, &store, seed)?;
        for machine_number in seed.machine_numbers.iter() {
            storage.get_or_create_machine(store.id, machine_number)?;
        }
    }
    log::info!(
        "provisioned {} stores ({} created, {} machines pruned)",
        config.stores.len(),
        summary.stores_created,
        summary.machines_pruned
    );
    Ok(summary)
}

fn prune_out_of_range<S: RecordStorage>(
    storage: &mut S,
    store: &Store,
    seed: &StoreSeed,
) -> Result<usize, S::Error> {
    let mut pruned = 0;
    for machine in storage.machines_for_store(store.id)? {
        if !seed.machine_numbers.contains(machine.machine_number) {
            storage.delete_machine(machine.id)?;
            pruned += 1;
        }
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    #[test]
    fn default_config_parses() {
        let config = ProvisionConfig::default_config();
        assert_eq!(config.stores.len(), 1);
        assert_eq!(config.stores[0].machine_numbers.first, 987);
        assert_eq!(config.stores[0].machine_numbers.last, 1004);
        assert!(!config.islands.is_empty());
        for island in &config.islands {
            assert!(!island.machine_numbers.is_empty());
        }
    }

    #[test]
    fn provisioning_is_idempotent() {
        let config = ProvisionConfig::default_config();
        let mut storage = MemoryStorage::new();
        let first = provision(&mut storage, &config).unwrap();
        assert_eq!(first.stores_created, 1);
        let store = storage.store_by_name("Default Store").unwrap().unwrap();
        let machines = storage.machines_for_store(store.id).unwrap();
        assert_eq!(machines.len(), 18);

        let second = provision(&mut storage, &config).unwrap();
        assert_eq!(second.stores_created, 0);
        assert_eq!(second.machines_pruned, 0);
        assert_eq!(storage.machines_for_store(store.id).unwrap().len(), 18);
    }

    #[test]
    fn out_of_range_machines_are_pruned() {
        let config = ProvisionConfig::default_config();
        let mut storage = MemoryStorage::new();
        provision(&mut storage, &config).unwrap();
        let store = storage.store_by_name("Default Store").unwrap().unwrap();
        storage.get_or_create_machine(store.id, 500).unwrap();

        let summary = provision(&mut storage, &config).unwrap();
        assert_eq!(summary.machines_pruned, 1);
        let machines = storage.machines_for_store(store.id).unwrap();
        assert!(machines.iter().all(|m| m.machine_number >= 987));
    }

    #[test]
    fn islands_resolve_machines_to_models() {
        let config = ProvisionConfig::default_config();
        let island = config.island_for_machine(987).expect("987 is configured");
        assert_eq!(island.model, "umi4sp");
        assert!(config.island_for_machine(12345).is_none());
    }
}
