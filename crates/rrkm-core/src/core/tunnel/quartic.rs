use serde::Deserialize;
use std::f64::consts::PI;

use super::{ActionModel, Tunnel, harmonic};
use crate::core::io::block::KeywordBlock;
use crate::core::math::NumericError;
use crate::core::math::quadrature::simpson_fn;
use crate::core::math::roots::RootSearch;
use crate::core::math::spline::CubicSpline;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

const ACTION_QUADRATURE_INTERVALS: usize = 256;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct QuarticInput {
    imaginary_frequency: f64,
    cutoff_energy: f64,
    well_depths: [f64; 2],
}

/// Quartic barrier `-U(x)`, `U(x) = x²(1/2 + v3 x + v4 x²)`, in units where the
/// imaginary frequency, the mass and ħ are one.
///
/// The action below the top is tabulated against the reduced depth `ε = -E/ω`.
#[derive(Debug, Clone)]
pub struct QuarticAction {
    frequency: f64,
    v3: f64,
    v4: f64,
    depth_max: f64,
    table: Option<CubicSpline>,
}

impl QuarticAction {
    pub fn new(
        frequency: f64,
        well_depths: [f64; 2],
        cutoff_depth: f64,
        grid_size: usize,
        search: &RootSearch,
    ) -> Result<Self, NumericError> {
        let d1 = well_depths[0] / frequency;
        let d2 = well_depths[1] / frequency;
        let ratio = d1 / d2;

        // t = r1 / |r2| fixes the ratio of the two extremum heights.
        let target = ratio.ln();
        let t = search.bracketed(
            |t| {
                let value = 3.0 * t.ln() + (t + 2.0).ln() - (2.0 * t + 1.0).ln() - target;
                let slope = 3.0 / t + 1.0 / (t + 2.0) - 2.0 / (2.0 * t + 1.0);
                (value, slope)
            },
            1e-4,
            1e4,
        )?;
        let s = (12.0 * t * d2 / (2.0 * t + 1.0)).sqrt();
        let v4 = -1.0 / (4.0 * t * s * s);
        let v3 = (t - 1.0) / (3.0 * t * s);

        let mut action = Self {
            frequency,
            v3,
            v4,
            depth_max: cutoff_depth / frequency,
            table: None,
        };

        if action.depth_max > 0.0 {
            let (right, left) = (t * s, -s);
            let n = grid_size.max(4);
            let depths: Vec<f64> = (0..n)
                .map(|j| action.depth_max * j as f64 / (n - 1) as f64)
                .collect();
            let values = depths
                .iter()
                .map(|&eps| action.integrate(eps, left, right, search))
                .collect::<Result<Vec<f64>, NumericError>>()?;
            action.table = Some(CubicSpline::new(depths, values)?);
        }
        Ok(action)
    }

    pub fn coefficients(&self) -> (f64, f64) {
        (self.v3, self.v4)
    }

    fn potential(&self, x: f64) -> (f64, f64) {
        let value = x * x * (0.5 + self.v3 * x + self.v4 * x * x);
        let slope = x * (1.0 + 3.0 * self.v3 * x + 4.0 * self.v4 * x * x);
        (value, slope)
    }

    /// Action `2 ∫ sqrt(2(ε - U)) dx` between the turning points at depth `eps`.
    fn integrate(
        &self,
        eps: f64,
        left: f64,
        right: f64,
        search: &RootSearch,
    ) -> Result<f64, NumericError> {
        if eps <= 0.0 {
            return Ok(0.0);
        }
        let level = |x: f64| {
            let (u, du) = self.potential(x);
            (u - eps, du)
        };
        let upper = search.bracketed(level, 0.0, right)?;
        let lower = search.bracketed(level, left, 0.0)?;
        let center = 0.5 * (upper + lower);
        let half = 0.5 * (upper - lower);
        let integral = simpson_fn(
            |theta| {
                let x = center - half * theta.cos();
                let kinetic = 2.0 * (eps - self.potential(x).0);
                kinetic.max(0.0).sqrt() * half * theta.sin()
            },
            0.0,
            PI,
            ACTION_QUADRATURE_INTERVALS,
        );
        Ok(2.0 * integral)
    }

    pub fn action(&self, energy: f64, order: usize) -> Result<f64, NumericError> {
        if energy >= 0.0 {
            return Ok(harmonic::action(self.frequency, energy, order));
        }
        let eps = -energy / self.frequency;
        match &self.table {
            Some(table) if eps <= self.depth_max * (1.0 + 1e-12) => Ok(if order == 0 {
                table.value(eps)
            } else {
                -table.derivative(eps) / self.frequency
            }),
            _ => Err(NumericError::OutOfRange {
                x: energy,
                min: -self.depth_max * self.frequency,
                max: f64::INFINITY,
            }),
        }
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Tunnel, ModelError> {
    let input: QuarticInput = block.parse()?;
    let [v1, v2] = input.well_depths;
    if !(v1 > 0.0 && v2 > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "well-depths",
            format!("both depths must be positive, got [{}, {}]", v1, v2),
        ));
    }
    if input.cutoff_energy >= v1.min(v2) {
        return Err(ModelError::out_of_range(
            block.path(),
            "cutoff-energy",
            format!(
                "cutoff {} must stay above the shallower well ({})",
                input.cutoff_energy,
                v1.min(v2)
            ),
        ));
    }
    if !(input.imaginary_frequency > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "imaginary-frequency",
            format!("must be positive, got {}", input.imaginary_frequency),
        ));
    }
    let model = QuarticAction::new(
        input.imaginary_frequency,
        input.well_depths,
        input.cutoff_energy.max(0.0),
        config.tunnel.action_grid_size,
        &config.root_search(),
    )
    .map_err(|e| ModelError::numeric(block.path(), input.cutoff_energy, e))?;
    tracing::debug!(
        block = block.path(),
        v3 = model.v3,
        v4 = model.v4,
        "Fitted quartic barrier."
    );
    Tunnel::assemble(
        block.path(),
        input.imaginary_frequency,
        input.cutoff_energy,
        config,
        ActionModel::Quartic(model),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;

    #[test]
    fn symmetric_wells_give_pure_quartic_coefficients() {
        let model = QuarticAction::new(1.0, [4.0, 4.0], 1.0, 16, &RootSearch::default()).unwrap();
        let (v3, v4) = model.coefficients();
        assert!(v3.abs() < 1e-9);
        assert_relative_eq!(v4, -1.0 / 64.0, max_relative = 1e-9);
    }

    #[test]
    fn fitted_extrema_reproduce_asymmetric_depths() {
        let model = QuarticAction::new(1.0, [9.0, 3.0], 1.0, 16, &RootSearch::default()).unwrap();
        let (v3, v4) = model.coefficients();
        // U'(x) = x (1 + 3 v3 x + 4 v4 x²); its non-zero roots are the two extrema.
        let disc = (9.0 * v3 * v3 - 16.0 * v4).sqrt();
        let roots = [(-3.0 * v3 + disc) / (8.0 * v4), (-3.0 * v3 - disc) / (8.0 * v4)];
        let mut heights: Vec<f64> = roots.iter().map(|&x| model.potential(x).0).collect();
        heights.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(heights[0], 3.0, max_relative = 1e-8);
        assert_relative_eq!(heights[1], 9.0, max_relative = 1e-8);
    }

    #[test]
    fn action_near_top_matches_parabolic_barrier() {
        let model =
            QuarticAction::new(1000.0, [20000.0, 20000.0], 5000.0, 64, &RootSearch::default())
                .unwrap();
        let energy = -10.0;
        let parabolic = harmonic::action(1000.0, energy, 0);
        assert_relative_eq!(model.action(energy, 0).unwrap(), parabolic, max_relative = 1e-2);
    }

    #[test]
    fn action_grows_with_depth_and_vanishes_at_top() {
        let model =
            QuarticAction::new(1000.0, [15000.0, 8000.0], 6000.0, 64, &RootSearch::default())
                .unwrap();
        assert!(model.action(0.0, 0).unwrap().abs() < 1e-12);
        let shallow = model.action(-1000.0, 0).unwrap();
        let deep = model.action(-5000.0, 0).unwrap();
        assert!(shallow > 0.0 && deep > shallow);
        assert!(model.action(-3000.0, 1).unwrap() < 0.0);
    }

    #[test]
    fn below_tabulated_range_is_reported() {
        let model =
            QuarticAction::new(1000.0, [15000.0, 8000.0], 2000.0, 16, &RootSearch::default())
                .unwrap();
        assert!(matches!(model.action(-2500.0, 0), Err(NumericError::OutOfRange { .. })));
    }

    #[test]
    fn builds_tunnel_with_factor_one_half_at_top() {
        let block = block_from_str(
            "tunnel",
            "imaginary-frequency = 1000.0\ncutoff-energy = 4000.0\nwell-depths = [12000.0, 9000.0]",
        );
        let tunnel = build(&block, &test_config(1.0, 100.0)).unwrap();
        assert_eq!(tunnel.factor(0.0).unwrap(), 0.5);
        assert!(tunnel.factor(-2000.0).unwrap() < 0.5);
    }

    #[test]
    fn factor_rises_monotonically_from_cutoff_past_the_top() {
        let block = block_from_str(
            "tunnel",
            "imaginary-frequency = 1000.0\ncutoff-energy = 4000.0\nwell-depths = [12000.0, 9000.0]",
        );
        let tunnel = build(&block, &test_config(1.0, 100.0)).unwrap();
        let mut previous = 0.0;
        for i in 0..=150 {
            let energy = -4000.0 + 40.0 * i as f64;
            let factor = tunnel.factor(energy).unwrap();
            assert!(factor + 1e-15 >= previous, "factor decreases at {}", energy);
            assert!(tunnel.density(energy).unwrap() >= 0.0, "negative density at {}", energy);
            previous = factor;
        }
        assert!(previous > 0.99);
    }
}
