//! Centralized balance and calibration constants for the Pachimeter engine.
//!
//! These values define the deterministic math for EV estimation and the
//! weighted statistics. Keeping them together ensures the economics can
//! only be adjusted via code changes reviewed in version control.

// Payout economics ---------------------------------------------------------
/// Balls in one investment unit (1,000 yen worth of play at par).
pub const UNIT_BALLS: f64 = 250.0;
/// Efficiency assumed for a machine with no recorded history.
pub const DEFAULT_BASE: f64 = 20.0;
/// Payout per hit assumed for a machine with no recorded hits.
pub const DEFAULT_AVG_PAYOUT: f64 = 1400.0;
/// Balls redeemable per 100 yen when no store rate is configured.
pub const DEFAULT_EXCHANGE_RATE: f64 = 27.0;

// Expectation model guards -------------------------------------------------
/// Lowest break-even efficiency any border table may produce.
pub const BORDER_FLOOR: f64 = 2.0;
/// Highest break-even efficiency any border table may produce.
pub const BORDER_CEILING: f64 = 19.0;
/// Replacement efficiency when a caller passes a non-positive one.
pub const COERCED_EFFICIENCY: f64 = 1.0;

// Session timing -----------------------------------------------------------
/// Spins played per minute of normal play.
pub const SPINS_PER_MINUTE: f64 = 5.0;
/// Minutes consumed by one bonus round, chains included.
pub const MINUTES_PER_BONUS: f64 = 6.0;
/// Floor applied to every duration estimate.
pub const MIN_SESSION_MINUTES: f64 = 10.0;
