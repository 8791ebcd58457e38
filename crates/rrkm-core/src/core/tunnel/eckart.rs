use serde::Deserialize;
use std::f64::consts::{LN_2, PI};

use super::{ActionModel, Tunnel};
use crate::core::io::block::KeywordBlock;
use crate::core::math::hyperbolic::{ln_add, ln_cosh, ln_sinh};
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct EckartInput {
    imaginary_frequency: f64,
    cutoff_energy: f64,
    well_depths: [f64; 2],
}

#[derive(Debug, Clone, Copy)]
enum CoupledTerm {
    /// `cosh(2πδ)` stored as `2πδ`.
    Hyperbolic(f64),
    /// `cos(2π|δ|)` for barriers too narrow for a real `δ`.
    Trigonometric(f64),
}

/// Exact transmission through an asymmetric Eckart barrier.
///
/// With `A = 2πα` and `B = 2πβ` the transmission is
/// `P = (cosh(A+B) - cosh(A-B)) / (cosh(A+B) + cosh 2πδ)`, so the action
/// `S = ln(1/P - 1)` is `ln(cosh(A-B) + cosh 2πδ) - ln(2 sinh A sinh B)`.
/// The action is referenced to its value at the barrier top, which vanishes
/// for deep barriers and keeps the transmission at one half there otherwise.
#[derive(Debug, Clone)]
pub struct EckartAction {
    well_depths: [f64; 2],
    amplitude: f64,
    coupled: CoupledTerm,
    top_action: f64,
}

impl EckartAction {
    pub fn new(frequency: f64, well_depths: [f64; 2]) -> Self {
        let [v1, v2] = well_depths;
        let root_product = (v1 * v2).sqrt();
        let amplitude = 4.0 * PI * root_product / (frequency * (v1.sqrt() + v2.sqrt()));
        let discriminant = 16.0 * v1 * v2 / (frequency * frequency) - 1.0;
        let coupled = if discriminant >= 0.0 {
            CoupledTerm::Hyperbolic(PI * discriminant.sqrt())
        } else {
            CoupledTerm::Trigonometric((PI * (-discriminant).sqrt()).cos())
        };
        let mut model = Self {
            well_depths,
            amplitude,
            coupled,
            top_action: 0.0,
        };
        model.top_action = model.exact_action(0.0);
        model
    }

    /// Offset removed from the exact action.
    pub fn top_action(&self) -> f64 {
        self.top_action
    }

    pub fn well_depths(&self) -> [f64; 2] {
        self.well_depths
    }

    fn ln_numerator(&self, u: f64) -> f64 {
        match self.coupled {
            CoupledTerm::Hyperbolic(w) => ln_add(ln_cosh(u), ln_cosh(w)),
            CoupledTerm::Trigonometric(c) => {
                let lc = ln_cosh(u);
                lc + (c * (-lc).exp()).ln_1p()
            }
        }
    }

    fn exact_action(&self, energy: f64) -> f64 {
        self.action(energy, 0) + self.top_action
    }

    pub fn action(&self, energy: f64, order: usize) -> f64 {
        let reactant = energy + self.well_depths[0];
        let product = energy + self.well_depths[1];
        if reactant <= 0.0 || product <= 0.0 {
            return if order == 0 { f64::INFINITY } else { 0.0 };
        }
        let a = self.amplitude * reactant.sqrt();
        let b = self.amplitude * product.sqrt();
        let u = a - b;
        let ln_numerator = self.ln_numerator(u);

        if order == 0 {
            return ln_numerator - LN_2 - ln_sinh(a) - ln_sinh(b) - self.top_action;
        }

        let da = a / (2.0 * reactant);
        let db = b / (2.0 * product);
        // sinh(u) / (cosh(u) + cosh 2πδ), evaluated in log space.
        let ratio = if u == 0.0 {
            0.0
        } else {
            u.signum() * (ln_sinh(u.abs()) - ln_numerator).exp()
        };
        ratio * (da - db) - da / a.tanh() - db / b.tanh()
    }
}

pub fn build(block: &KeywordBlock, config: &ModelConfig) -> Result<Tunnel, ModelError> {
    let input: EckartInput = block.parse()?;
    let [v1, v2] = input.well_depths;
    if !(v1 > 0.0 && v2 > 0.0) {
        return Err(ModelError::out_of_range(
            block.path(),
            "well-depths",
            format!("both depths must be positive, got [{}, {}]", v1, v2),
        ));
    }
    if input.cutoff_energy > v1.min(v2) {
        return Err(ModelError::out_of_range(
            block.path(),
            "cutoff-energy",
            format!(
                "cutoff {} lies below the shallower well ({})",
                input.cutoff_energy,
                v1.min(v2)
            ),
        ));
    }
    let model = EckartAction::new(input.imaginary_frequency, input.well_depths);
    Tunnel::assemble(
        block.path(),
        input.imaginary_frequency,
        input.cutoff_energy,
        config,
        ActionModel::Eckart(model),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::block::block_from_str;
    use crate::engine::config::test_config;
    use approx::assert_relative_eq;

    fn symmetric() -> Tunnel {
        let block = block_from_str(
            "tunnel",
            "imaginary-frequency = 1000.0\ncutoff-energy = 9000.0\nwell-depths = [10000.0, 10000.0]",
        );
        build(&block, &test_config(1.0, 100.0)).unwrap()
    }

    #[test]
    fn transmission_is_one_half_at_the_top() {
        assert_relative_eq!(symmetric().factor(0.0).unwrap(), 0.5, epsilon = 1e-12);
        for (frequency, depths) in [(1500.0, [8000.0, 3000.0]), (1000.0, [1000.0, 1000.0])] {
            let model = EckartAction::new(frequency, depths);
            assert_relative_eq!(model.action(0.0, 0), 0.0, epsilon = 1e-12);
            assert!(model.top_action() < 0.0);
        }
    }

    #[test]
    fn top_offset_vanishes_for_deep_barriers() {
        let shallow = EckartAction::new(1000.0, [1000.0, 1000.0]).top_action();
        let deep = EckartAction::new(1000.0, [10000.0, 10000.0]).top_action();
        assert!(deep.abs() < shallow.abs());
        assert!(deep.abs() < 0.1);
    }

    #[test]
    fn deep_barrier_approaches_parabolic_action_near_top() {
        let tunnel = symmetric();
        let slope = tunnel.action(0.0, 1).unwrap();
        assert_relative_eq!(slope, -2.0 * PI / 1000.0, max_relative = 1e-2);
    }

    #[test]
    fn analytic_derivative_matches_finite_difference() {
        let model = EckartAction::new(800.0, [6000.0, 2500.0]);
        for energy in [-2000.0, -300.0, 0.0, 450.0] {
            let h = 1e-3;
            let numeric = (model.action(energy + h, 0) - model.action(energy - h, 0)) / (2.0 * h);
            assert_relative_eq!(model.action(energy, 1), numeric, max_relative = 1e-5);
        }
    }

    #[test]
    fn factor_is_monotone_for_asymmetric_barrier() {
        let block = block_from_str(
            "tunnel",
            "imaginary-frequency = 1500.0\ncutoff-energy = 3000.0\nwell-depths = [8000.0, 3000.0]",
        );
        let tunnel = build(&block, &test_config(1.0, 100.0)).unwrap();
        let mut previous = 0.0;
        for i in 0..=100 {
            let energy = -3000.0 + 60.0 * i as f64;
            let factor = tunnel.factor(energy).unwrap();
            assert!(factor + 1e-15 >= previous);
            assert!(tunnel.density(energy).unwrap() >= 0.0);
            previous = factor;
        }
    }

    #[test]
    fn narrow_barrier_uses_trigonometric_branch() {
        let model = EckartAction::new(1000.0, [100.0, 100.0]);
        assert!(matches!(model.coupled, CoupledTerm::Trigonometric(_)));
        assert!(model.action(-50.0, 0).is_finite());
    }

    #[test]
    fn rejects_cutoff_below_shallower_well() {
        let block = block_from_str(
            "tunnel",
            "imaginary-frequency = 1000.0\ncutoff-energy = 5000.0\nwell-depths = [10000.0, 4000.0]",
        );
        let result = build(&block, &test_config(1.0, 100.0));
        assert!(matches!(result, Err(ModelError::OutOfRange { keyword: "cutoff-energy", .. })));
    }
}
