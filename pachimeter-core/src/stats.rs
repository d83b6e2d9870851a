//! Weighted performance statistics recomputed from session records.
//!
//! The aggregate cached on a machine is never patched incrementally; every
//! mutation runs [`recompute`] over the full surviving record set, so the
//! cache cannot drift from the records it summarizes. Group (island)
//! aggregation is the same pure function over the union of the member
//! machines' records, which makes it order independent by construction.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AVG_PAYOUT, DEFAULT_BASE, UNIT_BALLS};
use crate::numbers::u64_to_f64;
use crate::records::SessionRecord;

/// Cached weighted summary of a record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineAggregate {
    /// Weighted efficiency: spins per investment unit across all records.
    pub weighted_base: f64,
    /// Weighted payout balls per hit across all records.
    pub weighted_avg_payout: f64,
    pub total_spins: u64,
    pub total_investment_balls: u64,
    pub total_payout_balls: u64,
    pub total_hits: u64,
    pub record_count: usize,
}

impl Default for MachineAggregate {
    /// The cache a lazily created machine starts with before any record
    /// exists: the model-default efficiency and payout, zero totals.
    fn default() -> Self {
        Self {
            weighted_base: DEFAULT_BASE,
            weighted_avg_payout: DEFAULT_AVG_PAYOUT,
            total_spins: 0,
            total_investment_balls: 0,
            total_payout_balls: 0,
            total_hits: 0,
            record_count: 0,
        }
    }
}

impl MachineAggregate {
    /// Whether any real play backs this aggregate.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.total_spins > 0
    }

    /// Total investment expressed in units rather than balls.
    #[must_use]
    pub fn investment_units(&self) -> f64 {
        u64_to_f64(self.total_investment_balls) / UNIT_BALLS
    }
}

/// Recompute the weighted aggregate over a record set.
///
/// Works identically for a single machine's records or the concatenation
/// of every record across a group of machines. An investment of zero
/// yields efficiency 0.0; zero hits fall back to the default payout.
pub fn recompute<'a, I>(records: I) -> MachineAggregate
where
    I: IntoIterator<Item = &'a SessionRecord>,
{
    let mut total_spins = 0u64;
    let mut total_investment_balls = 0u64;
    let mut total_payout_balls = 0u64;
    let mut total_hits = 0u64;
    let mut record_count = 0usize;
    for record in records {
        total_spins += u64::from(record.spins);
        total_investment_balls += u64::from(record.investment_balls);
        total_payout_balls += u64::from(record.payout_balls);
        total_hits += u64::from(record.hits);
        record_count += 1;
    }

    let weighted_base = if total_investment_balls > 0 {
        u64_to_f64(total_spins) / (u64_to_f64(total_investment_balls) / UNIT_BALLS)
    } else {
        0.0
    };
    let weighted_avg_payout = if total_hits > 0 {
        u64_to_f64(total_payout_balls) / u64_to_f64(total_hits)
    } else {
        DEFAULT_AVG_PAYOUT
    };

    MachineAggregate {
        weighted_base,
        weighted_avg_payout,
        total_spins,
        total_investment_balls,
        total_payout_balls,
        total_hits,
        record_count,
    }
}
