//! Arena of fractures and the simulations running on them.
//!
//! Hosts hold opaque ids instead of references; an id whose entry was
//! removed resolves to [`StoreError::NotFound`].

use slotmap::SlotMap;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::fracture::Fracture;
use crate::links::ComponentChange;
use crate::sim::{InfiltrationSimulation, SimConfig, StepOutcome};

slotmap::new_key_type! {
    /// Unique identifier for a fracture in a [`FractureStore`].
    pub struct FractureId;
    /// Unique identifier for a simulation in a [`FractureStore`].
    pub struct SimulationId;
}

#[derive(Debug, Clone)]
struct SimulationEntry {
    fracture: FractureId,
    sim: InfiltrationSimulation,
}

/// Owns fractures and simulations behind opaque ids.
#[derive(Debug, Clone, Default)]
pub struct FractureStore {
    fractures: SlotMap<FractureId, Fracture>,
    simulations: SlotMap<SimulationId, SimulationEntry>,
}

impl FractureStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Fracture operations ---

    /// Adds a fracture and returns its id.
    pub fn insert_fracture(&mut self, fracture: Fracture) -> FractureId {
        self.fractures.insert(fracture)
    }

    /// Returns a fracture by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is stale.
    pub fn fracture(&self, id: FractureId) -> Result<&Fracture> {
        self.fractures
            .get(id)
            .ok_or_else(|| StoreError::NotFound("fracture").into())
    }

    /// Returns a mutable reference to a fracture by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is stale.
    pub fn fracture_mut(&mut self, id: FractureId) -> Result<&mut Fracture> {
        self.fractures
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound("fracture").into())
    }

    /// Removes a fracture together with every simulation bound to it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is stale.
    pub fn remove_fracture(&mut self, id: FractureId) -> Result<Fracture> {
        let fracture = self
            .fractures
            .remove(id)
            .ok_or(StoreError::NotFound("fracture"))?;
        let before = self.simulations.len();
        self.simulations.retain(|_, entry| entry.fracture != id);
        debug!(dropped = before - self.simulations.len(), "fracture removed");
        Ok(fracture)
    }

    /// Forwards a deletion notification to a fracture.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale or a cell index is out of range.
    pub fn mark_deleted(
        &mut self,
        id: FractureId,
        cells: &[usize],
    ) -> Result<Option<ComponentChange>> {
        self.fracture_mut(id)?.mark_deleted(cells)
    }

    /// Number of fractures.
    #[must_use]
    pub fn fracture_count(&self) -> usize {
        self.fractures.len()
    }

    // --- Simulation operations ---

    /// Creates a simulation on a fracture.
    ///
    /// # Errors
    ///
    /// Returns an error if the fracture id is stale or the simulation
    /// cannot be created.
    pub fn create_simulation(
        &mut self,
        fracture: FractureId,
        config: SimConfig,
        seed: u64,
    ) -> Result<SimulationId> {
        let sim = InfiltrationSimulation::new(self.fracture(fracture)?, config, seed)?;
        Ok(self.simulations.insert(SimulationEntry { fracture, sim }))
    }

    /// Returns a simulation by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is stale.
    pub fn simulation(&self, id: SimulationId) -> Result<&InfiltrationSimulation> {
        self.simulations
            .get(id)
            .map(|entry| &entry.sim)
            .ok_or_else(|| StoreError::NotFound("simulation").into())
    }

    /// Removes a simulation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is stale.
    pub fn remove_simulation(&mut self, id: SimulationId) -> Result<InfiltrationSimulation> {
        self.simulations
            .remove(id)
            .map(|entry| entry.sim)
            .ok_or_else(|| StoreError::NotFound("simulation").into())
    }

    /// Runs one step of a simulation on its fracture.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale or the step fails.
    pub fn step(&mut self, id: SimulationId) -> Result<StepOutcome> {
        let (sim, fracture) = self.parts(id)?;
        sim.step(fracture)
    }

    /// Resets the links of a simulation's fracture.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale.
    pub fn reset(&mut self, id: SimulationId, randomize: bool) -> Result<ComponentChange> {
        let (sim, fracture) = self.parts(id)?;
        sim.reset(fracture, randomize)
    }

    /// Captures a simulation's restorable state.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale.
    pub fn backup_state(&mut self, id: SimulationId) -> Result<()> {
        let (sim, fracture) = self.parts(id)?;
        sim.backup_state(fracture);
        Ok(())
    }

    /// Restores a simulation's backup.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale or there is no usable backup.
    pub fn restore_state(&mut self, id: SimulationId) -> Result<()> {
        let (sim, fracture) = self.parts(id)?;
        sim.restore_state(fracture)
    }

    fn parts(&mut self, id: SimulationId) -> Result<(&mut InfiltrationSimulation, &mut Fracture)> {
        let entry = self
            .simulations
            .get_mut(id)
            .ok_or(StoreError::NotFound("simulation"))?;
        let fracture = self
            .fractures
            .get_mut(entry.fracture)
            .ok_or(StoreError::NotFound("fracture"))?;
        Ok((&mut entry.sim, fracture))
    }
}
