use serde::Deserialize;
use tracing::debug;

use super::{Species, SpeciesKind};
use crate::core::io::block::KeywordBlock;
use crate::core::mode::StatesMode;
use crate::engine::config::ModelConfig;
use crate::engine::error::ModelError;
use crate::engine::factory;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct UnionInput {
    members: Vec<toml::Table>,
}

/// Several species counted together, e.g. conformers sharing one well.
///
/// Members keep their own absolute grounds; the union's ground is the lowest
/// of them and every query sums the members at the same absolute energy.
#[derive(Debug, Clone)]
pub struct UnionSpecies {
    members: Vec<Species>,
    /// Index of the first oscillator of every member in the concatenated list.
    offsets: Vec<usize>,
}

impl UnionSpecies {
    pub fn new(members: Vec<Species>) -> Self {
        let offsets = members
            .iter()
            .scan(0, |next, member| {
                let offset = *next;
                *next += member.oscillator_size();
                Some(offset)
            })
            .collect();
        Self { members, offsets }
    }

    pub fn members(&self) -> &[Species] {
        &self.members
    }

    pub fn ground(&self) -> f64 {
        self.members
            .iter()
            .map(Species::ground)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn real_ground(&self) -> f64 {
        self.members
            .iter()
            .map(Species::real_ground)
            .fold(f64::INFINITY, f64::min)
    }

    pub(super) fn shift_ground(&mut self, shift: f64) {
        for member in &mut self.members {
            member.shift_ground(shift);
        }
    }

    /// Sum of the members' states at the absolute `energy`.
    pub fn states(&self, energy: f64) -> Result<f64, ModelError> {
        self.members.iter().map(|m| m.states(energy)).sum()
    }

    /// Members' weights re-referenced to `ground` and summed.
    pub fn weight(&self, temperature: f64, ground: f64) -> Result<f64, ModelError> {
        self.members
            .iter()
            .map(|m| Ok(m.weight(temperature)? * (-(m.ground() - ground) / temperature).exp()))
            .sum()
    }

    pub fn tunnel_weight(&self, temperature: f64, real_ground: f64) -> Result<f64, ModelError> {
        self.members
            .iter()
            .map(|m| {
                Ok(m.tunnel_weight(temperature)?
                    * (-(m.real_ground() - real_ground) / temperature).exp())
            })
            .sum()
    }

    pub fn oscillator_size(&self) -> usize {
        self.members.iter().map(Species::oscillator_size).sum()
    }

    fn locate(&self, index: usize) -> Option<(&Species, usize)> {
        let position = self.offsets.partition_point(|&offset| offset <= index);
        let member = position.checked_sub(1)?;
        let local = index - self.offsets[member];
        let species = &self.members[member];
        (local < species.oscillator_size()).then_some((species, local))
    }

    pub fn oscillator_frequency(&self, index: usize) -> Option<f64> {
        let (member, local) = self.locate(index)?;
        member.oscillator_frequency(local)
    }

    /// Member intensity weighted by the member's share of the states at `energy`.
    pub fn infrared_intensity(&self, energy: f64, index: usize) -> Result<f64, ModelError> {
        let Some((member, local)) = self.locate(index) else {
            return Err(ModelError::Logic(format!(
                "union has no infrared-active oscillator {}",
                index
            )));
        };
        let total = self.states(energy)?;
        if total <= 0.0 {
            return Ok(0.0);
        }
        Ok(member.infrared_intensity(energy, local)? * member.states(energy)? / total)
    }
}

pub fn build(
    block: &KeywordBlock,
    name: &str,
    mode: StatesMode,
    config: &ModelConfig,
) -> Result<Species, ModelError> {
    let input: UnionInput = block.parse()?;
    if input.members.is_empty() {
        return Err(ModelError::input(block.path(), "a union needs at least one member"));
    }
    let members = input
        .members
        .into_iter()
        .enumerate()
        .map(|(i, table)| {
            let child = block.child(&format!("members[{}]", i), table);
            factory::build_species(&child, &format!("{}#{}", name, i), mode, config)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let union = UnionSpecies::new(members);
    let (ground, real_ground) = (union.ground(), union.real_ground());
    debug!(
        species = name,
        members = union.members().len(),
        ground,
        "Built species union."
    );
    Ok(Species::new(name, mode, ground, SpeciesKind::Union(union)).with_real_ground(real_ground))
}
