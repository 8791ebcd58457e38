use serde::Deserialize;
use std::collections::BTreeSet;

use crate::engine::error::ModelError;

/// Geometric description of one internal rotation plus its sampling sizes.
///
/// The moving group and axis are atom indices owned by the surrounding
/// geometry; they are validated for consistency but never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalRotation {
    group: BTreeSet<usize>,
    axis: (usize, usize),
    symmetry: u32,
    sampling: RotationSampling,
}

/// Grid and basis sizes used when the rotation takes part in a multi-rotor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RotationSampling {
    #[serde(default = "default_mass_fourier_size")]
    pub mass_fourier_size: usize,
    #[serde(default = "default_potential_fourier_size")]
    pub potential_fourier_size: usize,
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    #[serde(default = "default_quantum_size_min")]
    pub quantum_size_min: usize,
    #[serde(default = "default_quantum_size_max")]
    pub quantum_size_max: usize,
}

fn default_mass_fourier_size() -> usize {
    5
}
fn default_potential_fourier_size() -> usize {
    11
}
fn default_grid_size() -> usize {
    24
}
fn default_quantum_size_min() -> usize {
    5
}
fn default_quantum_size_max() -> usize {
    40
}

impl Default for RotationSampling {
    fn default() -> Self {
        Self {
            mass_fourier_size: default_mass_fourier_size(),
            potential_fourier_size: default_potential_fourier_size(),
            grid_size: default_grid_size(),
            quantum_size_min: default_quantum_size_min(),
            quantum_size_max: default_quantum_size_max(),
        }
    }
}

impl InternalRotation {
    pub fn new(
        block: &str,
        group: Vec<usize>,
        axis: [usize; 2],
        symmetry: u32,
        sampling: RotationSampling,
    ) -> Result<Self, ModelError> {
        validate_symmetry(block, symmetry)?;
        if group.is_empty() {
            return Err(ModelError::input(block, "the moving group is empty"));
        }
        if axis[0] == axis[1] {
            return Err(ModelError::input(
                block,
                format!("axis atoms must differ, got {:?}", axis),
            ));
        }
        let group: BTreeSet<usize> = group.into_iter().collect();
        if group.contains(&axis[0]) && group.contains(&axis[1]) {
            return Err(ModelError::input(
                block,
                "the moving group cannot contain both axis atoms",
            ));
        }
        if sampling.quantum_size_min == 0
            || sampling.quantum_size_min > sampling.quantum_size_max
            || sampling.grid_size == 0
            || sampling.mass_fourier_size == 0
            || sampling.potential_fourier_size == 0
        {
            return Err(ModelError::input(
                block,
                format!("inconsistent sampling sizes {:?}", sampling),
            ));
        }
        Ok(Self {
            group,
            axis: (axis[0], axis[1]),
            symmetry,
            sampling,
        })
    }

    /// Optional descriptor of a one-dimensional rotor: group and axis come together.
    pub fn from_parts(
        block: &str,
        group: Option<Vec<usize>>,
        axis: Option<[usize; 2]>,
        symmetry: u32,
    ) -> Result<Option<Self>, ModelError> {
        validate_symmetry(block, symmetry)?;
        match (group, axis) {
            (Some(group), Some(axis)) => {
                Self::new(block, group, axis, symmetry, RotationSampling::default()).map(Some)
            }
            (None, None) => Ok(None),
            _ => Err(ModelError::input(
                block,
                "'group' and 'axis' must be given together",
            )),
        }
    }

    pub fn group(&self) -> &BTreeSet<usize> {
        &self.group
    }

    pub fn axis(&self) -> (usize, usize) {
        self.axis
    }

    pub fn symmetry(&self) -> u32 {
        self.symmetry
    }

    pub fn sampling(&self) -> &RotationSampling {
        &self.sampling
    }
}

fn validate_symmetry(block: &str, symmetry: u32) -> Result<(), ModelError> {
    if symmetry == 0 {
        return Err(ModelError::out_of_range(
            block,
            "symmetry",
            "symmetry number must be at least 1",
        ));
    }
    Ok(())
}
