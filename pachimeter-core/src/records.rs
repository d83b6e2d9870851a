//! Persisted entities: stores, machines, and session records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::UNIT_BALLS;
use crate::stats::MachineAggregate;

pub type StoreId = u64;
pub type MachineId = u64;
pub type RecordId = u64;

/// A parlor. Owns machines; carries the exchange rate used for EV output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    /// Balls redeemable per 100 yen.
    pub exchange_rate: f64,
}

/// One physical machine, identified by its number within a store.
///
/// The aggregate is a derived view over the machine's records; only the
/// statistics recompute path may write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub store_id: StoreId,
    pub machine_number: u32,
    #[serde(default)]
    pub aggregate: MachineAggregate,
    /// Free-text note kept by the player.
    #[serde(default)]
    pub remarks: String,
}

impl Machine {
    /// A lazily created machine with the default aggregate cache.
    #[must_use]
    pub fn new(id: MachineId, store_id: StoreId, machine_number: u32) -> Self {
        Self {
            id,
            store_id,
            machine_number,
            aggregate: MachineAggregate::default(),
            remarks: String::new(),
        }
    }
}

/// Raw inputs of one play session, as submitted by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInputs {
    pub investment_balls: u32,
    pub spins: u32,
    pub hits: u32,
    pub payout_balls: u32,
}

/// An atomic play session.
///
/// The derived fields are computed once at insert time and never mutated;
/// a record restored after deletion reproduces them exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: RecordId,
    pub machine_id: MachineId,
    pub date: NaiveDate,
    pub investment_balls: u32,
    pub spins: u32,
    pub hits: u32,
    pub payout_balls: u32,
    /// Spins per investment unit for this session alone.
    pub base_calculated: f64,
    /// Payout balls per hit for this session alone.
    pub payout_per_hit_calculated: f64,
}

impl SessionRecord {
    /// Build a record from raw inputs, computing the derived fields.
    ///
    /// Zero investment yields efficiency 0.0 and zero hits yield payout
    /// 0.0; both are documented policy rather than errors.
    #[must_use]
    pub fn from_inputs(
        id: RecordId,
        machine_id: MachineId,
        date: NaiveDate,
        inputs: SessionInputs,
    ) -> Self {
        let investment_units = f64::from(inputs.investment_balls) / UNIT_BALLS;
        let base_calculated = if inputs.investment_balls > 0 {
            f64::from(inputs.spins) / investment_units
        } else {
            0.0
        };
        let payout_per_hit_calculated = if inputs.hits > 0 {
            f64::from(inputs.payout_balls) / f64::from(inputs.hits)
        } else {
            0.0
        };
        Self {
            id,
            machine_id,
            date,
            investment_balls: inputs.investment_balls,
            spins: inputs.spins,
            hits: inputs.hits,
            payout_balls: inputs.payout_balls,
            base_calculated,
            payout_per_hit_calculated,
        }
    }

    /// The raw inputs this record was built from.
    #[must_use]
    pub const fn inputs(&self) -> SessionInputs {
        SessionInputs {
            investment_balls: self.investment_balls,
            spins: self.spins,
            hits: self.hits,
            payout_balls: self.payout_balls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date")
    }

    #[test]
    fn derived_fields_follow_unit_math() {
        let record = SessionRecord::from_inputs(
            7,
            3,
            date(),
            SessionInputs {
                investment_balls: 2500,
                spins: 215,
                hits: 2,
                payout_balls: 2800,
            },
        );
        // 2500 balls is 10 units, so 215 spins give base 21.5.
        assert!((record.base_calculated - 21.5).abs() < 1e-12);
        assert!((record.payout_per_hit_calculated - 1400.0).abs() < 1e-12);
    }

    #[test]
    fn zero_guards_are_policy_not_errors() {
        let record = SessionRecord::from_inputs(
            1,
            1,
            date(),
            SessionInputs {
                investment_balls: 0,
                spins: 0,
                hits: 0,
                payout_balls: 0,
            },
        );
        assert!((record.base_calculated - 0.0).abs() < f64::EPSILON);
        assert!((record.payout_per_hit_calculated - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn derived_fields_are_id_independent() {
        let inputs = SessionInputs {
            investment_balls: 5000,
            spins: 404,
            hits: 3,
            payout_balls: 4200,
        };
        let original = SessionRecord::from_inputs(11, 2, date(), inputs);
        let restored = SessionRecord::from_inputs(99, 2, date(), original.inputs());
        assert!((original.base_calculated - restored.base_calculated).abs() < f64::EPSILON);
        assert!(
            (original.payout_per_hit_calculated - restored.payout_per_hit_calculated).abs()
                < f64::EPSILON
        );
    }
}
