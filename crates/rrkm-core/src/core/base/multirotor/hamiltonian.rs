use itertools::Itertools;
use nalgebra::{Complex, DMatrix, SymmetricEigen};

use super::QuantumLevel;
use crate::core::math::fourier::FourierSeries;

/// Plane-wave Hamiltonian `½ Σ p_i G_ij(φ) p_j + V(φ)` of coupled rotors.
///
/// Basis functions `exp(i m·φ)` only couple through harmonics of the reduced
/// angles `σ_i φ_i`, so quantum numbers sharing the residues `m_i mod σ_i`
/// form independent sectors.
pub(super) struct PlaneWaveProblem<'a> {
    pub symmetries: &'a [u32],
    pub mobility: &'a [Vec<FourierSeries>],
    pub external: Option<&'a FourierSeries>,
    /// Largest `|m_i|` kept per rotor.
    pub bounds: &'a [i32],
}

impl PlaneWaveProblem<'_> {
    /// Quantum-number vectors of one sector inside the basis ellipsoid.
    pub fn sector_basis(&self, residues: &[usize]) -> Vec<Vec<i32>> {
        self.bounds
            .iter()
            .zip(self.symmetries)
            .zip(residues)
            .map(|((&bound, &sigma), &residue)| {
                (-bound..=bound)
                    .filter(move |m| m.rem_euclid(sigma as i32) == residue as i32)
                    .collect::<Vec<i32>>()
            })
            .multi_cartesian_product()
            .filter(|m| {
                m.iter()
                    .zip(self.bounds)
                    .map(|(&q, &b)| (q as f64 / b as f64).powi(2))
                    .sum::<f64>()
                    <= 1.0 + 1e-12
            })
            .collect()
    }

    fn harmonic(&self, m: &[i32], n: &[i32]) -> Vec<i32> {
        m.iter()
            .zip(n)
            .zip(self.symmetries)
            .map(|((a, b), &sigma)| (a - b) / sigma as i32)
            .collect()
    }

    fn matrix<F>(&self, basis: &[Vec<i32>], element: F) -> DMatrix<Complex<f64>>
    where
        F: Fn(&[i32], &[i32], &[i32]) -> Complex<f64>,
    {
        DMatrix::from_fn(basis.len(), basis.len(), |r, c| {
            let k = self.harmonic(&basis[r], &basis[c]);
            element(&basis[r], &basis[c], &k)
        })
    }

    /// Eigenvalues of one sector on the effective potential `potential`, with
    /// the expectation value of the external rotation factor when present.
    pub fn solve(&self, potential: &FourierSeries, residues: &[usize]) -> Vec<QuantumLevel> {
        let basis = self.sector_basis(residues);
        if basis.is_empty() {
            return Vec::new();
        }
        let hamiltonian = self.matrix(&basis, |m, n, k| {
            let mut element = potential.coefficient(k);
            for (i, row) in self.mobility.iter().enumerate() {
                for (j, g) in row.iter().enumerate() {
                    element += g.coefficient(k) * (0.5 * m[i] as f64 * n[j] as f64);
                }
            }
            element
        });
        let eigen = SymmetricEigen::new(hamiltonian);

        let external = self
            .external
            .map(|factor| self.matrix(&basis, |_, _, k| factor.coefficient(k)));

        eigen
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(index, &energy)| {
                let external_factor = match &external {
                    Some(matrix) => {
                        let vector = eigen.eigenvectors.column(index);
                        (vector.adjoint() * matrix * vector)[(0, 0)].re
                    }
                    None => 1.0,
                };
                QuantumLevel {
                    energy,
                    external_factor,
                }
            })
            .collect()
    }
}
