use serde::Deserialize;

use crate::parse::Point;

/// First-order RC circuit driven by a voltage step.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitParams {
    /// Step height in volts.
    pub v_max: f64,
    /// Ohms.
    pub resistance: f64,
    /// Farads.
    pub capacitance: f64,
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self {
            v_max: 3.3,
            resistance: 100_000.0,
            capacitance: 3.3e-6,
        }
    }
}

impl CircuitParams {
    /// Seconds.
    pub fn time_constant(&self) -> f64 {
        self.resistance * self.capacitance
    }

    pub fn voltage_at(&self, t: f64) -> f64 {
        self.v_max * (1.0 - (-t / self.time_constant()).exp())
    }
}

/// Sample the model on `[0, span]` (seconds, inclusive when `span` is a multiple of `step`).
pub fn reference_curve(params: &CircuitParams, span: f64, step: f64) -> Vec<Point> {
    if !step.is_finite() || !span.is_finite() || step <= 0.0 || span < 0.0 {
        return Vec::new();
    }
    // Index based, accumulating `step` would drift.
    let n = (span / step + 1e-9).floor() as usize + 1;
    (0..n)
        .map(|i| {
            let t = i as f64 * step;
            Point {
                t,
                v: params.voltage_at(t),
            }
        })
        .collect()
}

/// How far a measured run is from the model.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Comparison {
    pub points: usize,
    pub rms_error: f64,
    pub max_error: f64,
    /// Time of the largest deviation, seconds.
    pub max_error_at: f64,
}

pub fn compare(points: &[Point], params: &CircuitParams) -> Option<Comparison> {
    if points.is_empty() {
        return None;
    }
    let mut sum_sq = 0.0;
    let mut max_error = 0.0;
    let mut max_error_at = points[0].t;
    for p in points {
        let e = (p.v - params.voltage_at(p.t)).abs();
        sum_sq += e * e;
        if e > max_error {
            max_error = e;
            max_error_at = p.t;
        }
    }
    Some(Comparison {
        points: points.len(),
        rms_error: (sum_sq / points.len() as f64).sqrt(),
        max_error,
        max_error_at,
    })
}
