//! Piecewise-linear lookup tables with boundary extrapolation.
//!
//! Every empirically calibrated curve in the engine (border thresholds,
//! session durations, hit counts, residual values) is backed by this one
//! primitive rather than a per-curve reimplementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons for anchor tables, surfaced at model-registration
/// time rather than at query time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableConfigError {
    #[error("anchor table needs at least two points, got {0}")]
    TooFewAnchors(usize),
    #[error("anchor x values must be strictly increasing, violated at index {0}")]
    UnsortedAnchors(usize),
}

/// Piecewise-linear curve over strictly x-sorted anchor points.
///
/// Queries inside the anchor range interpolate on the bracketing segment;
/// queries outside extrapolate with the slope of the nearest segment. An
/// exact anchor x returns the stored y with no arithmetic applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct InterpolationTable {
    anchors: Vec<(f64, f64)>,
}

impl InterpolationTable {
    /// Build a table from `(x, y)` anchors.
    ///
    /// # Errors
    ///
    /// Returns an error when fewer than two anchors are supplied or the
    /// x values are not strictly increasing.
    pub fn new(anchors: Vec<(f64, f64)>) -> Result<Self, TableConfigError> {
        if anchors.len() < 2 {
            return Err(TableConfigError::TooFewAnchors(anchors.len()));
        }
        if let Some(index) = anchors.windows(2).position(|pair| pair[0].0 >= pair[1].0) {
            return Err(TableConfigError::UnsortedAnchors(index + 1));
        }
        Ok(Self { anchors })
    }

    /// The anchor points backing this table, in ascending x order.
    #[must_use]
    pub fn anchors(&self) -> &[(f64, f64)] {
        &self.anchors
    }

    /// Evaluate the curve at `x`.
    #[must_use]
    pub fn interpolate(&self, x: f64) -> f64 {
        if let Some(&(_, y)) = self.anchors.iter().find(|&&(anchor_x, _)| anchor_x == x) {
            return y;
        }
        let last = self.anchors.len() - 1;
        let segment = if x < self.anchors[0].0 {
            0
        } else if x > self.anchors[last].0 {
            last - 1
        } else {
            self.anchors
                .windows(2)
                .position(|pair| pair[0].0 <= x && x <= pair[1].0)
                .unwrap_or(last - 1)
        };
        let (x1, y1) = self.anchors[segment];
        let (x2, y2) = self.anchors[segment + 1];
        y1 + (x - x1) * ((y2 - y1) / (x2 - x1))
    }
}

impl TryFrom<Vec<(f64, f64)>> for InterpolationTable {
    type Error = TableConfigError;

    fn try_from(anchors: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::new(anchors)
    }
}

impl From<InterpolationTable> for Vec<(f64, f64)> {
    fn from(table: InterpolationTable) -> Self {
        table.anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InterpolationTable {
        InterpolationTable::new(vec![(200.0, 10.0), (400.0, 16.0), (600.0, 17.0)])
            .expect("valid anchors")
    }

    #[test]
    fn anchors_are_returned_exactly() {
        let table = sample();
        for &(x, y) in table.anchors() {
            assert!(
                (table.interpolate(x) - y).abs() < f64::EPSILON,
                "anchor drifted at x={x}"
            );
        }
    }

    #[test]
    fn interpolates_between_anchors() {
        let table = sample();
        assert!((table.interpolate(300.0) - 13.0).abs() < 1e-12);
        assert!((table.interpolate(500.0) - 16.5).abs() < 1e-12);
    }

    #[test]
    fn extrapolates_with_edge_slopes() {
        let table = sample();
        // First segment slope 6/200, last segment slope 1/200.
        assert!((table.interpolate(100.0) - 7.0).abs() < 1e-12);
        assert!((table.interpolate(800.0) - 18.0).abs() < 1e-12);
    }

    #[test]
    fn monotone_anchors_give_monotone_output() {
        let table = sample();
        let mut previous = f64::NEG_INFINITY;
        let mut x = 0.0;
        while x <= 1000.0 {
            let y = table.interpolate(x);
            assert!(y >= previous, "output decreased at x={x}");
            previous = y;
            x += 12.5;
        }
    }

    #[test]
    fn rejects_degenerate_tables() {
        assert_eq!(
            InterpolationTable::new(vec![(1.0, 1.0)]),
            Err(TableConfigError::TooFewAnchors(1))
        );
        assert_eq!(
            InterpolationTable::new(vec![(2.0, 1.0), (2.0, 3.0)]),
            Err(TableConfigError::UnsortedAnchors(1))
        );
        assert_eq!(
            InterpolationTable::new(vec![(1.0, 1.0), (3.0, 2.0), (2.0, 5.0)]),
            Err(TableConfigError::UnsortedAnchors(2))
        );
    }

    #[test]
    fn survives_json_round_trip() {
        let table = sample();
        let json = serde_json::to_string(&table).expect("serialize");
        let back: InterpolationTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(table, back);
    }

    #[test]
    fn rejects_degenerate_tables_from_json() {
        let result: Result<InterpolationTable, _> = serde_json::from_str("[[1.0, 2.0]]");
        assert!(result.is_err(), "single-anchor table must not deserialize");
    }
}
