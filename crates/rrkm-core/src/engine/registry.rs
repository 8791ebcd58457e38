use slotmap::{SlotMap, new_key_type};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::info;

use super::error::ModelError;
use crate::core::species::Species;

new_key_type! {
    pub struct SpeciesId;
}

/// A potential well: one species the master equation resolves in energy.
#[derive(Debug, Clone, PartialEq)]
pub struct Well {
    pub name: String,
    pub species: SpeciesId,
}

/// Product pair entering the master equation as a source or sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Bimolecular {
    pub name: String,
    pub fragments: Vec<SpeciesId>,
    /// Absolute energy of the pair at infinite separation.
    pub ground: f64,
    /// A dummy product only absorbs flux and has no fragments to weigh.
    pub dummy: bool,
}

/// Barrier between two wells.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerBarrier {
    pub name: String,
    pub species: SpeciesId,
    pub wells: (usize, usize),
}

/// Barrier between a well and a bimolecular product.
#[derive(Debug, Clone, PartialEq)]
pub struct OuterBarrier {
    pub name: String,
    pub species: SpeciesId,
    pub well: usize,
    pub bimolecular: usize,
}

/// Owner of every species of a kinetic model and of their connectivity.
///
/// Species live in an arena and are referred to by [`SpeciesId`]. Wells,
/// products and barriers are indexed in insertion order, which is the order the
/// master-equation consumer enumerates them in.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    species: SlotMap<SpeciesId, Species>,
    names: HashMap<String, SpeciesId>,
    wells: Vec<Well>,
    bimolecular: Vec<Bimolecular>,
    inner_barriers: Vec<InnerBarrier>,
    outer_barriers: Vec<OuterBarrier>,
    energy_limit: Option<f64>,
    energy_shift: Option<f64>,
}

static GLOBAL: OnceLock<ModelRegistry> = OnceLock::new();

/// Publishes `registry` as the process-wide read-only model.
pub fn init_global(registry: ModelRegistry) -> Result<&'static ModelRegistry, ModelError> {
    let mut registry = Some(registry);
    let published = GLOBAL.get_or_init(|| registry.take().unwrap_or_default());
    if registry.is_some() {
        return Err(ModelError::Logic(
            "the global model registry is already initialized".to_string(),
        ));
    }
    Ok(published)
}

/// The registry published by [`init_global`].
pub fn global() -> Result<&'static ModelRegistry, ModelError> {
    GLOBAL
        .get()
        .ok_or_else(|| ModelError::Logic("the global model registry is not initialized".to_string()))
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit energy ceiling for the kinetic model, in the shifted frame.
    pub fn set_energy_limit(&mut self, limit: Option<f64>) {
        self.energy_limit = limit;
    }

    fn insert(&mut self, species: Species) -> Result<SpeciesId, ModelError> {
        if self.names.contains_key(species.name()) {
            return Err(ModelError::input(
                species.name(),
                "species name is already in use",
            ));
        }
        let name = species.name().to_string();
        let id = self.species.insert(species);
        self.names.insert(name, id);
        Ok(id)
    }

    pub fn add_well(&mut self, species: Species) -> Result<usize, ModelError> {
        let name = species.name().to_string();
        let species = self.insert(species)?;
        self.wells.push(Well { name, species });
        Ok(self.wells.len() - 1)
    }

    /// Adds a product from its fragments; `ground` defaults to the sum of fragment grounds.
    ///
    /// Every name is checked before any fragment enters the arena, so a
    /// rejected product leaves the registry unchanged.
    pub fn add_bimolecular(
        &mut self,
        name: &str,
        fragments: Vec<Species>,
        ground: Option<f64>,
    ) -> Result<usize, ModelError> {
        self.check_unique(name)?;
        let ground = match ground {
            Some(ground) => ground,
            None if fragments.is_empty() => {
                return Err(ModelError::MissingKeyword {
                    block: name.to_string(),
                    keyword: "ground-energy",
                });
            }
            None => fragments.iter().map(Species::ground).sum(),
        };
        let mut seen = HashSet::new();
        for fragment in &fragments {
            let fragment_name = fragment.name();
            if fragment_name == name || !seen.insert(fragment_name) {
                return Err(ModelError::input(fragment_name, "species name is already in use"));
            }
            self.check_unique(fragment_name)?;
        }
        let dummy = fragments.is_empty();
        let fragments = fragments
            .into_iter()
            .map(|fragment| self.insert(fragment))
            .collect::<Result<Vec<_>, _>>()?;
        self.bimolecular.push(Bimolecular {
            name: name.to_string(),
            fragments,
            ground,
            dummy,
        });
        Ok(self.bimolecular.len() - 1)
    }

    pub fn add_inner_barrier(
        &mut self,
        species: Species,
        wells: (usize, usize),
    ) -> Result<usize, ModelError> {
        for well in [wells.0, wells.1] {
            if well >= self.wells.len() {
                return Err(ModelError::Logic(format!(
                    "barrier '{}' connects unknown well {}",
                    species.name(),
                    well
                )));
            }
        }
        if wells.0 == wells.1 {
            return Err(ModelError::input(
                species.name(),
                "an inner barrier must connect two different wells",
            ));
        }
        let name = species.name().to_string();
        let species = self.insert(species)?;
        self.inner_barriers.push(InnerBarrier {
            name,
            species,
            wells,
        });
        Ok(self.inner_barriers.len() - 1)
    }

    pub fn add_outer_barrier(
        &mut self,
        species: Species,
        well: usize,
        bimolecular: usize,
    ) -> Result<usize, ModelError> {
        if well >= self.wells.len() || bimolecular >= self.bimolecular.len() {
            return Err(ModelError::Logic(format!(
                "barrier '{}' connects unknown well {} or product {}",
                species.name(),
                well,
                bimolecular
            )));
        }
        let name = species.name().to_string();
        let species = self.insert(species)?;
        self.outer_barriers.push(OuterBarrier {
            name,
            species,
            well,
            bimolecular,
        });
        Ok(self.outer_barriers.len() - 1)
    }

    fn check_unique(&self, name: &str) -> Result<(), ModelError> {
        let taken = self.names.contains_key(name) || self.bimolecular.iter().any(|b| b.name == name);
        if taken {
            return Err(ModelError::input(name, "species name is already in use"));
        }
        Ok(())
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id)
    }

    pub fn find_species(&self, name: &str) -> Option<SpeciesId> {
        self.names.get(name).copied()
    }

    pub fn well(&self, index: usize) -> Option<&Well> {
        self.wells.get(index)
    }

    pub fn wells(&self) -> &[Well] {
        &self.wells
    }

    pub fn bimolecular(&self, index: usize) -> Option<&Bimolecular> {
        self.bimolecular.get(index)
    }

    pub fn bimolecular_products(&self) -> &[Bimolecular] {
        &self.bimolecular
    }

    pub fn inner_barrier(&self, index: usize) -> Option<&InnerBarrier> {
        self.inner_barriers.get(index)
    }

    pub fn inner_barriers(&self) -> &[InnerBarrier] {
        &self.inner_barriers
    }

    pub fn outer_barrier(&self, index: usize) -> Option<&OuterBarrier> {
        self.outer_barriers.get(index)
    }

    pub fn outer_barriers(&self) -> &[OuterBarrier] {
        &self.outer_barriers
    }

    pub fn well_index(&self, name: &str) -> Option<usize> {
        self.wells.iter().position(|w| w.name == name)
    }

    pub fn bimolecular_index(&self, name: &str) -> Option<usize> {
        self.bimolecular.iter().position(|b| b.name == name)
    }

    /// Product of the fragment weights, each relative to its own ground.
    pub fn bimolecular_weight(&self, index: usize, temperature: f64) -> Result<f64, ModelError> {
        let product = self
            .bimolecular
            .get(index)
            .ok_or_else(|| ModelError::Logic(format!("unknown bimolecular product {}", index)))?;
        if product.dummy {
            return Err(ModelError::Logic(format!(
                "dummy product '{}' has no weight",
                product.name
            )));
        }
        product
            .fragments
            .iter()
            .map(|&id| self.species_ref(id)?.weight(temperature))
            .product()
    }

    fn species_ref(&self, id: SpeciesId) -> Result<&Species, ModelError> {
        self.species
            .get(id)
            .ok_or_else(|| ModelError::Logic("dangling species key".to_string()))
    }

    /// Re-references every ground to `reference`; allowed once.
    pub fn shift_energy(&mut self, reference: f64) -> Result<(), ModelError> {
        if self.energy_shift.is_some() {
            return Err(ModelError::Logic(
                "the energy shift has already been applied".to_string(),
            ));
        }
        let shift = -reference;
        for (_, species) in self.species.iter_mut() {
            species.shift_ground(shift);
        }
        for product in &mut self.bimolecular {
            product.ground += shift;
        }
        self.energy_shift = Some(reference);
        info!(reference, "Applied energy shift to every species.");
        Ok(())
    }

    /// Shifts the frame so that the named well or product sits at zero.
    pub fn shift_to(&mut self, name: &str) -> Result<(), ModelError> {
        let reference = if let Some(index) = self.well_index(name) {
            self.species_ref(self.wells[index].species)?.ground()
        } else if let Some(index) = self.bimolecular_index(name) {
            self.bimolecular[index].ground
        } else {
            return Err(ModelError::input(
                name,
                "energy reference is neither a well nor a bimolecular product",
            ));
        };
        self.shift_energy(reference)
    }

    /// The energy that was subtracted from every ground, zero before any shift.
    pub fn energy_shift(&self) -> f64 {
        self.energy_shift.unwrap_or(0.0)
    }

    /// Highest barrier top over all inner and outer barriers.
    pub fn maximum_barrier_height(&self) -> Option<f64> {
        self.inner_barriers
            .iter()
            .map(|b| b.species)
            .chain(self.outer_barriers.iter().map(|b| b.species))
            .filter_map(|id| self.species.get(id))
            .map(Species::real_ground)
            .reduce(f64::max)
    }

    /// Explicit ceiling when configured, otherwise the highest barrier top.
    pub fn energy_limit(&self) -> Option<f64> {
        self.energy_limit.or_else(|| self.maximum_barrier_height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::species::tests::atomic;
    use approx::assert_relative_eq;

    fn small_model() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.add_well(atomic("W1", -10.0, &[(0.0, 1)])).unwrap();
        registry.add_well(atomic("W2", -5.0, &[(0.0, 2)])).unwrap();
        registry
            .add_bimolecular("P", vec![atomic("A", 1.0, &[(0.0, 2)]), atomic("B", 2.0, &[(0.0, 3), (1.0, 1)])], None)
            .unwrap();
        registry
            .add_inner_barrier(atomic("B12", 4.0, &[(0.0, 1)]), (0, 1))
            .unwrap();
        registry
            .add_outer_barrier(atomic("B2P", 7.0, &[(0.0, 1)]), 1, 0)
            .unwrap();
        registry
    }

    #[test]
    fn connectivity_is_indexed_in_insertion_order() {
        let registry = small_model();
        assert_eq!(registry.wells().len(), 2);
        assert_eq!(registry.well(1).unwrap().name, "W2");
        assert_eq!(registry.inner_barrier(0).unwrap().wells, (0, 1));
        assert_eq!(registry.outer_barrier(0).unwrap().bimolecular, 0);
        assert_eq!(registry.bimolecular(0).unwrap().ground, 3.0);
        assert!(registry.find_species("B2P").is_some());
        assert!(registry.find_species("P").is_none());
    }

    #[test]
    fn bimolecular_weight_is_product_of_fragments() {
        let registry = small_model();
        let t = 1.0;
        let expected = 2.0 * (3.0 + (-1.0_f64).exp());
        assert_relative_eq!(registry.bimolecular_weight(0, t).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn energy_shift_is_applied_once() {
        let mut registry = small_model();
        registry.shift_to("W1").unwrap();
        assert_eq!(registry.energy_shift(), -10.0);
        let w2 = registry.well(1).unwrap().species;
        assert_eq!(registry.species(w2).unwrap().ground(), 5.0);
        assert_eq!(registry.bimolecular(0).unwrap().ground, 13.0);
        assert_eq!(registry.maximum_barrier_height(), Some(17.0));
        assert!(matches!(registry.shift_energy(0.0), Err(ModelError::Logic(_))));
    }

    #[test]
    fn energy_limit_defaults_to_highest_barrier() {
        let mut registry = small_model();
        assert_eq!(registry.energy_limit(), Some(7.0));
        registry.set_energy_limit(Some(50.0));
        assert_eq!(registry.energy_limit(), Some(50.0));
    }

    #[test]
    fn barrier_to_unknown_well_is_rejected() {
        let mut registry = small_model();
        let result = registry.add_inner_barrier(atomic("B13", 4.0, &[(0.0, 1)]), (0, 2));
        assert!(matches!(result, Err(ModelError::Logic(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = small_model();
        let result = registry.add_well(atomic("W1", 0.0, &[(0.0, 1)]));
        assert!(matches!(result, Err(ModelError::Input { .. })));
    }

    #[test]
    fn dummy_product_has_no_weight() {
        let mut registry = small_model();
        let index = registry.add_bimolecular("Sink", Vec::new(), Some(-50.0)).unwrap();
        assert!(registry.bimolecular(index).unwrap().dummy);
        assert!(registry.bimolecular_weight(index, 1.0).is_err());
    }

    #[test]
    fn global_registry_is_published_once() {
        let first = init_global(small_model());
        let again = init_global(ModelRegistry::new());
        assert!(again.is_err());
        let published = global().unwrap();
        if let Ok(first) = first {
            assert!(std::ptr::eq(first, published));
        }
        assert_eq!(published.wells().len(), 2);
    }

    #[test]
    fn rejected_product_leaves_no_fragments_behind() {
        let mut registry = small_model();
        let result = registry.add_bimolecular(
            "Q",
            vec![atomic("C", 0.0, &[(0.0, 1)]), atomic("W1", 0.0, &[(0.0, 1)])],
            None,
        );
        assert!(matches!(result, Err(ModelError::Input { .. })));
        assert!(registry.find_species("C").is_none());
        assert_eq!(registry.bimolecular_products().len(), 1);

        let repeated = registry.add_bimolecular(
            "Q",
            vec![atomic("D", 0.0, &[(0.0, 1)]), atomic("D", 0.0, &[(0.0, 1)])],
            None,
        );
        assert!(repeated.is_err());
        assert!(registry.find_species("D").is_none());
        assert!(registry.add_bimolecular("Q", vec![atomic("D", 0.0, &[(0.0, 1)])], None).is_ok());
    }
}
