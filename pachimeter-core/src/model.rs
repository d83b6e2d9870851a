//! Expectation models: per-machine-model parameter bundles and the
//! EV / session-duration / hit-count formulas that consume them.
//!
//! Adding a machine model is adding a data record to the registry, not a
//! code branch: the capability set (border lookup, measured duration,
//! measured hit counts, residual value, secondary phase) is expressed
//! through optional fields on [`ExpectationModel`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BORDER_CEILING, BORDER_FLOOR, COERCED_EFFICIENCY, DEFAULT_EXCHANGE_RATE, MIN_SESSION_MINUTES,
    MINUTES_PER_BONUS, SPINS_PER_MINUTE, UNIT_BALLS,
};
use crate::interp::InterpolationTable;
use crate::numbers::trunc_f64_to_i64;

const DEFAULT_MODEL_DATA: &str = include_str!("../assets/models.json");

/// Support phase entered only when normal play exhausts its spin budget
/// without a bonus trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryPhase {
    /// Support spins granted once the ceiling is reached.
    pub duration_spins: f64,
    /// Payout per hit the phase value was calibrated against.
    pub theoretical_payout: f64,
    /// Average spins consumed per hit during support play.
    pub avg_support_spins_per_hit: f64,
}

/// Calibrated parameter bundle for one machine model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationModel {
    pub id: String,
    pub name: String,
    /// Per-spin bonus trigger probability.
    pub trigger_probability: f64,
    /// Payout per hit the border table was calibrated against.
    pub reference_payout: f64,
    /// Exchange rate the border table was calibrated against.
    pub reference_exchange_rate: f64,
    /// Break-even efficiency vs. remaining spins at the reference payout.
    pub border: InterpolationTable,
    /// Measured session minutes vs. remaining spins.
    #[serde(default)]
    pub duration: Option<InterpolationTable>,
    /// Measured hit counts vs. remaining spins.
    #[serde(default)]
    pub hit_count: Option<InterpolationTable>,
    /// Residual ball value left unconsumed at session end, vs. remaining
    /// spins.
    #[serde(default)]
    pub residual: Option<InterpolationTable>,
    #[serde(default)]
    pub secondary: Option<SecondaryPhase>,
    /// Average bonus chain length, used by the closed-form estimates.
    pub avg_chain_length: f64,
}

impl ExpectationModel {
    /// Expected yen value of playing out `remaining_spins`, truncated to a
    /// whole amount.
    ///
    /// Non-positive efficiency is coerced to 1.0 and a non-positive
    /// exchange rate falls back to the default; both are documented
    /// policy, never errors. A zero spin budget is worth exactly zero.
    #[must_use]
    pub fn compute_ev(
        &self,
        efficiency: f64,
        remaining_spins: u32,
        exchange_rate: f64,
        payout_per_hit: f64,
    ) -> i64 {
        if remaining_spins == 0 {
            return 0;
        }
        let efficiency = if efficiency <= 0.0 {
            COERCED_EFFICIENCY
        } else {
            efficiency
        };
        let exchange_rate = if exchange_rate <= 0.0 {
            DEFAULT_EXCHANGE_RATE
        } else {
            exchange_rate
        };
        let spins = f64::from(remaining_spins);

        // Break-even efficiency at this budget, rescaled from the payout
        // the table was calibrated at to the payout actually observed.
        let border = self
            .border
            .interpolate(spins)
            .clamp(BORDER_FLOOR, BORDER_CEILING);
        let border_adjusted = border * (self.reference_payout / payout_per_hit);

        // Expectation of a right-censored geometric variable: the bonus
        // can truncate the session before the budget runs out.
        let prob_no_trigger = self.survival(spins);
        let expected_spins = (1.0 - prob_no_trigger) / self.trigger_probability;

        let revenue_balls = expected_spins / border_adjusted * UNIT_BALLS;
        let invested_balls = expected_spins / efficiency * UNIT_BALLS;
        let yen_per_ball = 100.0 / exchange_rate;
        let mut ev = (revenue_balls - invested_balls) * yen_per_ball;

        if let Some(residual) = &self.residual {
            ev += residual.interpolate(spins) * yen_per_ball;
        }
        if let Some(phase) = &self.secondary {
            let delta_rate =
                (payout_per_hit - phase.theoretical_payout) / phase.avg_support_spins_per_hit;
            let secondary_gain_balls = phase.duration_spins * delta_rate;
            ev += prob_no_trigger * secondary_gain_balls * yen_per_ball;
        }

        trunc_f64_to_i64(ev)
    }

    /// Estimated session length in minutes, floored at the minimum
    /// plausible session.
    ///
    /// Uses the measured table when the model carries one, otherwise a
    /// closed-form estimate from expected spins played (support phase
    /// included) plus bonus time.
    #[must_use]
    pub fn estimated_duration(&self, remaining_spins: u32) -> f64 {
        let spins = f64::from(remaining_spins);
        let minutes = if let Some(table) = &self.duration {
            table.interpolate(spins)
        } else {
            let prob_no_trigger = self.survival(spins);
            let expected_spins = (1.0 - prob_no_trigger) / self.trigger_probability;
            let support_spins = self
                .secondary
                .as_ref()
                .map_or(0.0, |phase| prob_no_trigger * phase.duration_spins);
            (expected_spins + support_spins) / SPINS_PER_MINUTE
                + self.expected_hit_count(remaining_spins) * MINUTES_PER_BONUS
        };
        minutes.max(MIN_SESSION_MINUTES)
    }

    /// Expected number of bonus hits, chains included, within the budget.
    ///
    /// Measured-table lookup when available; otherwise the probability of
    /// triggering in normal play or surviving into (and triggering
    /// within) the support phase, scaled by the average chain length.
    #[must_use]
    pub fn expected_hit_count(&self, remaining_spins: u32) -> f64 {
        let spins = f64::from(remaining_spins);
        if let Some(table) = &self.hit_count {
            return table.interpolate(spins);
        }
        let survive_main = self.survival(spins);
        let survive_secondary = self
            .secondary
            .as_ref()
            .map_or(1.0, |phase| self.survival(phase.duration_spins));
        self.avg_chain_length * (1.0 - survive_main * survive_secondary)
    }

    /// Probability that the bonus never fires within `spins` spins.
    fn survival(&self, spins: f64) -> f64 {
        (1.0 - self.trigger_probability).powf(spins)
    }
}

/// Registry mapping model id to its calibrated parameter bundle.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ExpectationModel>,
}

impl ModelRegistry {
    /// Registry holding the models shipped with the engine.
    ///
    /// Falls back to an empty registry if the embedded catalog cannot be
    /// parsed.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(DEFAULT_MODEL_DATA).unwrap_or_default()
    }

    /// Parse a registry from a JSON array of model bundles.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed or a model carries a
    /// degenerate anchor table.
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        let models: Vec<ExpectationModel> = serde_json::from_str(data)?;
        Ok(models.into_iter().collect())
    }

    /// Register a model, replacing any previous bundle with the same id.
    pub fn register(&mut self, model: ExpectationModel) {
        log::debug!("registering expectation model '{}'", model.id);
        self.models.insert(model.id.clone(), model);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ExpectationModel> {
        self.models.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered model ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

impl FromIterator<ExpectationModel> for ModelRegistry {
    fn from_iter<I: IntoIterator<Item = ExpectationModel>>(iter: I) -> Self {
        let mut registry = Self::default();
        for model in iter {
            registry.register(model);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn umi4sp() -> ExpectationModel {
        ModelRegistry::builtin()
            .get("umi4sp")
            .cloned()
            .expect("builtin model present")
    }

    #[test]
    fn builtin_catalog_parses() {
        let registry = ModelRegistry::builtin();
        assert!(registry.get("umi4sp").is_some());
        assert!(registry.get("umilight99").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn zero_budget_is_worth_nothing() {
        assert_eq!(umi4sp().compute_ev(20.0, 0, 27.0, 1400.0), 0);
    }

    #[test]
    fn non_positive_efficiency_is_coerced_not_rejected() {
        let model = umi4sp();
        assert_eq!(
            model.compute_ev(0.0, 400, 27.0, 1400.0),
            model.compute_ev(COERCED_EFFICIENCY, 400, 27.0, 1400.0)
        );
        assert_eq!(
            model.compute_ev(-3.0, 400, 27.0, 1400.0),
            model.compute_ev(COERCED_EFFICIENCY, 400, 27.0, 1400.0)
        );
    }

    #[test]
    fn non_positive_exchange_rate_defaults_silently() {
        let model = umi4sp();
        assert_eq!(
            model.compute_ev(20.0, 400, 0.0, 1400.0),
            model.compute_ev(20.0, 400, DEFAULT_EXCHANGE_RATE, 1400.0)
        );
    }

    #[test]
    fn higher_payout_raises_ev() {
        let model = umi4sp();
        let low = model.compute_ev(20.0, 400, 27.0, 1380.0);
        let mid = model.compute_ev(20.0, 400, 27.0, 1400.0);
        let high = model.compute_ev(20.0, 400, 27.0, 1420.0);
        assert!(low < mid && mid < high);
    }

    #[test]
    fn duration_floor_applies() {
        let model = umi4sp();
        assert!(model.estimated_duration(0) >= MIN_SESSION_MINUTES);
    }

    #[test]
    fn register_replaces_by_id() {
        let mut registry = ModelRegistry::builtin();
        let mut replacement = umi4sp();
        replacement.name = "replacement".to_string();
        registry.register(replacement);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("umi4sp").map(|m| m.name.as_str()), Some("replacement"));
    }
}
