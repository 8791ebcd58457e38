//! Multi-indices over product grids and Fourier series on the N-torus.
//!
//! A [`FourierSeries`] represents a real function of reduced angles
//! `ψ_i ∈ [0, 2π)` as `Σ_k c_k exp(i k·ψ)` with `c_{-k} = conj(c_k)`.

use nalgebra::Complex;
use std::collections::BTreeMap;
use std::f64::consts::PI;

use super::NumericError;

/// Row-major mapping between linear positions and multi-indices of a product grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiIndex {
    sizes: Vec<usize>,
}

impl MultiIndex {
    pub fn new(sizes: Vec<usize>) -> Result<Self, NumericError> {
        if sizes.is_empty() || sizes.contains(&0) {
            return Err(NumericError::InvalidTable(format!(
                "product grid sizes must be non-empty and positive, got {:?}",
                sizes
            )));
        }
        Ok(Self { sizes })
    }

    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_multi(&self, mut linear: usize) -> Vec<usize> {
        let mut multi = vec![0; self.sizes.len()];
        for (slot, size) in multi.iter_mut().zip(&self.sizes).rev() {
            *slot = linear % size;
            linear /= size;
        }
        multi
    }

    pub fn to_linear(&self, multi: &[usize]) -> usize {
        multi
            .iter()
            .zip(&self.sizes)
            .fold(0, |acc, (index, size)| acc * size + index)
    }

    /// Reduced angles `2π j_i / n_i` of a grid position.
    pub fn angles(&self, linear: usize) -> Vec<f64> {
        self.to_multi(linear)
            .iter()
            .zip(&self.sizes)
            .map(|(&j, &n)| 2.0 * PI * j as f64 / n as f64)
            .collect()
    }
}

/// One real term `a cos(k·ψ) + b sin(k·ψ)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RealTerm {
    pub harmonics: Vec<i32>,
    pub cos: f64,
    pub sin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FourierSeries {
    dim: usize,
    terms: BTreeMap<Vec<i32>, Complex<f64>>,
}

impl FourierSeries {
    pub fn constant(dim: usize, value: f64) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(vec![0; dim], Complex::new(value, 0.0));
        Self { dim, terms }
    }

    pub fn from_real_terms(dim: usize, terms: &[RealTerm]) -> Result<Self, NumericError> {
        if let Some(term) = terms.iter().find(|t| t.harmonics.len() != dim) {
            return Err(NumericError::InvalidTable(format!(
                "harmonic vector {:?} does not match dimension {}",
                term.harmonics, dim
            )));
        }
        let mut series = Self::constant(dim, 0.0);
        for term in terms {
            series.push_real_term(term);
        }
        Ok(series)
    }

    /// One-dimensional series from a map where positive keys are cosine
    /// amplitudes, negative keys sine amplitudes and zero the constant.
    pub fn from_signed_map(map: &BTreeMap<i32, f64>) -> Self {
        let mut series = Self::constant(1, 0.0);
        for (&k, &v) in map {
            series.push_real_term(&RealTerm {
                harmonics: vec![k.abs()],
                cos: if k >= 0 { v } else { 0.0 },
                sin: if k < 0 { v } else { 0.0 },
            });
        }
        series
    }

    fn push_real_term(&mut self, term: &RealTerm) {
        if term.harmonics.iter().all(|&k| k == 0) {
            *self.entry(&term.harmonics) += Complex::new(term.cos, 0.0);
            return;
        }
        let half = Complex::new(0.5 * term.cos, -0.5 * term.sin);
        let negated: Vec<i32> = term.harmonics.iter().map(|k| -k).collect();
        *self.entry(&term.harmonics) += half;
        *self.entry(&negated) += half.conj();
    }

    /// Forward discrete Fourier transform of samples on an equally spaced product grid.
    ///
    /// Harmonics are kept up to `(n_i - 1) / 2` per axis so the series stays real.
    pub fn from_samples(index: &MultiIndex, samples: &[f64]) -> Result<Self, NumericError> {
        if samples.len() != index.len() {
            return Err(NumericError::InvalidTable(format!(
                "expected {} samples on a {:?} grid, got {}",
                index.len(),
                index.sizes(),
                samples.len()
            )));
        }
        let bounds: Vec<i32> = index.sizes().iter().map(|&n| ((n - 1) / 2) as i32).collect();
        let harmonic_index =
            MultiIndex::new(bounds.iter().map(|&b| (2 * b + 1) as usize).collect())?;
        let points: Vec<Vec<f64>> = (0..index.len()).map(|j| index.angles(j)).collect();
        let norm = 1.0 / index.len() as f64;

        let mut terms = BTreeMap::new();
        for h in 0..harmonic_index.len() {
            let k: Vec<i32> = harmonic_index
                .to_multi(h)
                .iter()
                .zip(&bounds)
                .map(|(&m, &b)| m as i32 - b)
                .collect();
            let coefficient = points
                .iter()
                .zip(samples)
                .fold(Complex::new(0.0, 0.0), |acc, (psi, &f)| {
                    acc + Complex::from_polar(f, -dot(&k, psi))
                })
                * norm;
            terms.insert(k, coefficient);
        }
        Ok(Self {
            dim: index.rank(),
            terms,
        })
    }

    fn entry(&mut self, k: &[i32]) -> &mut Complex<f64> {
        self.terms
            .entry(k.to_vec())
            .or_insert_with(|| Complex::new(0.0, 0.0))
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Vec<i32>, &Complex<f64>)> {
        self.terms.iter()
    }

    pub fn coefficient(&self, k: &[i32]) -> Complex<f64> {
        self.terms
            .get(k)
            .copied()
            .unwrap_or_else(|| Complex::new(0.0, 0.0))
    }

    pub fn constant_term(&self) -> f64 {
        self.coefficient(&vec![0; self.dim]).re
    }

    /// Drops every non-constant coefficient whose modulus is below `tolerance`.
    pub fn pruned(mut self, tolerance: f64) -> Self {
        self.terms
            .retain(|k, c| k.iter().all(|&v| v == 0) || c.norm() >= tolerance);
        self
    }

    /// Keeps the harmonics with `|k_i| <= bounds[i]` on every axis.
    pub fn truncated(mut self, bounds: &[usize]) -> Self {
        self.terms.retain(|k, _| {
            k.iter()
                .zip(bounds)
                .all(|(&v, &b)| v.unsigned_abs() as usize <= b)
        });
        self
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for c in self.terms.values_mut() {
            *c *= factor;
        }
        self
    }

    pub fn add(&self, other: &FourierSeries) -> FourierSeries {
        let mut sum = self.clone();
        for (k, c) in &other.terms {
            *sum.entry(k) += *c;
        }
        sum
    }

    /// Partial derivative with respect to the reduced angle of `axis`.
    pub fn derivative(&self, axis: usize) -> FourierSeries {
        let terms = self
            .terms
            .iter()
            .map(|(k, c)| (k.clone(), *c * Complex::new(0.0, k[axis] as f64)))
            .collect();
        FourierSeries {
            dim: self.dim,
            terms,
        }
    }

    pub fn value(&self, psi: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(k, c)| (*c * Complex::from_polar(1.0, dot(k, psi))).re)
            .sum()
    }

    /// Values on every point of a product grid, in linear order.
    pub fn on_grid(&self, index: &MultiIndex) -> Vec<f64> {
        (0..index.len())
            .map(|j| self.value(&index.angles(j)))
            .collect()
    }
}

fn dot(k: &[i32], psi: &[f64]) -> f64 {
    k.iter().zip(psi).map(|(&a, &b)| a as f64 * b).sum()
}
