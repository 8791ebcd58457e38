use nalgebra::DMatrix;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::f64::consts::PI;

use crate::core::math::NumericError;
use crate::core::math::fourier::{FourierSeries, MultiIndex};
use crate::core::math::gamma::gamma;
use crate::core::math::tabulated::TabulatedFunction;

/// External rotation entering the classical count: factor `sqrt(det I_ext,eff)`
/// and the external symmetry number.
pub(super) struct ExternalRotation<'a> {
    pub factor: &'a FourierSeries,
    pub symmetry: f64,
}

/// Phase-space integral of coupled rotors sampled on a product grid over one
/// symmetry period.
///
/// `N_cl(E) = Σ_p w_p Σ_n (E - V_n(φ_p))^{D/2}` where the point weight `w_p`
/// carries the cell volume, `1/sqrt(det G)`, the external rotation factor and
/// `(2π)^{-D/2} / Γ(D/2 + 1)`.
#[derive(Debug, Clone)]
pub(super) struct PhaseSpaceGrid {
    weights: Vec<f64>,
    potentials: Vec<Vec<f64>>,
    half_dimension: f64,
}

impl PhaseSpaceGrid {
    pub fn new(
        grid: &MultiIndex,
        symmetries: &[u32],
        manifolds: &[Vec<f64>],
        mobility: &[Vec<FourierSeries>],
        external: Option<ExternalRotation<'_>>,
    ) -> Result<Self, NumericError> {
        let rotors = symmetries.len();
        let dimension = rotors + if external.is_some() { 3 } else { 0 };
        let half_dimension = 0.5 * dimension as f64;
        let cell: f64 = grid
            .sizes()
            .iter()
            .zip(symmetries)
            .map(|(&n, &sigma)| 2.0 * PI / (sigma as f64 * n as f64))
            .product();
        let norm = cell / ((2.0 * PI).powf(half_dimension) * gamma(half_dimension + 1.0));

        let mut weights = Vec::with_capacity(grid.len());
        for point in 0..grid.len() {
            let psi = grid.angles(point);
            let g = DMatrix::from_fn(rotors, rotors, |i, j| mobility[i][j].value(&psi));
            let Some(cholesky) = g.cholesky() else {
                return Err(NumericError::IllConditioned(format!(
                    "mobility tensor is not positive definite at {:?}",
                    psi
                )));
            };
            let det: f64 = cholesky.l().diagonal().iter().map(|d| d * d).product();
            let rotation = match &external {
                Some(ext) => {
                    let factor = ext.factor.value(&psi);
                    if !(factor > 0.0) {
                        return Err(NumericError::IllConditioned(format!(
                            "external rotation factor {} is not positive at {:?}",
                            factor, psi
                        )));
                    }
                    8.0 * PI * PI * factor / ext.symmetry
                }
                None => 1.0,
            };
            weights.push(norm * rotation / det.sqrt());
        }

        let potentials = (0..grid.len())
            .map(|p| manifolds.iter().map(|m| m[p]).collect())
            .collect();
        Ok(Self {
            weights,
            potentials,
            half_dimension,
        })
    }

    pub fn number(&self, energy: f64) -> f64 {
        self.weights
            .iter()
            .zip(&self.potentials)
            .map(|(w, potentials)| {
                w * potentials
                    .iter()
                    .filter(|&&v| v < energy)
                    .map(|v| (energy - v).powf(self.half_dimension))
                    .sum::<f64>()
            })
            .sum()
    }

    /// Tabulates the count on `nodes` equally spaced energies up to `energy_max`.
    pub fn tabulate(
        &self,
        energy_max: f64,
        nodes: usize,
        band: f64,
    ) -> Result<TabulatedFunction, NumericError> {
        let energies: Vec<f64> = (1..=nodes)
            .map(|j| energy_max * j as f64 / nodes as f64)
            .collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = energies.iter();

        #[cfg(feature = "parallel")]
        let iterator = energies.par_iter();

        let values: Vec<f64> = iterator.map(|&e| self.number(e)).collect();
        TabulatedFunction::power_law(energies, values, band)
    }
}
