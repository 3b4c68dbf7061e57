use crate::model::Model;
use crate::prelude::{Id, Real};
use crate::tool::Tool;
use crate::virus::Virus;
use getset::CopyGetters;
use std::sync::Arc;

/// Combines the per-tool values of one effect into a single number.
pub type MixerFun = Arc<dyn Fn(&[Real]) -> Real + Send + Sync>;

/// Independent-action product: 1 - prod(1 - v_i).
pub fn independent_action(values: &[Real]) -> Real {
    1.0 - values.iter().fold(1.0, |acc, v| acc * (1.0 - v))
}

/// The four replaceable effect mixers of an agent's tool set.
#[derive(Clone)]
pub struct ToolMixers {
    pub susceptibility: MixerFun,
    pub transmission: MixerFun,
    pub recovery: MixerFun,
    pub death: MixerFun,
}

impl Default for ToolMixers {
    fn default() -> Self {
        let f: MixerFun = Arc::new(independent_action);
        ToolMixers {
            susceptibility: f.clone(),
            transmission: f.clone(),
            recovery: f.clone(),
            death: f,
        }
    }
}

/// A discrete simulated individual: current state, at most one active
/// virus, a set of tools, neighbour ids and entity memberships. Agents
/// are owned by the model and referenced by id everywhere else; they are
/// never destroyed during a run.
#[derive(Clone, CopyGetters)]
pub struct Agent {
    #[getset(get_copy = "pub")]
    id: Id,
    #[getset(get_copy = "pub")]
    state: usize,
    pub(crate) virus: Option<Virus>,
    pub(crate) tools: Vec<Tool>,
    pub(crate) neighbors: Vec<Id>,
    pub(crate) entities: Vec<Id>,
    pub(crate) mixers: ToolMixers,
}

impl Agent {
    pub fn new(id: Id) -> Self {
        Agent {
            id,
            state: 0,
            virus: None,
            tools: Vec::new(),
            neighbors: Vec::new(),
            entities: Vec::new(),
            mixers: ToolMixers::default(),
        }
    }

    pub fn has_virus(&self) -> bool {
        self.virus.is_some()
    }

    pub fn virus(&self) -> Option<&Virus> {
        self.virus.as_ref()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn has_tool(&self, tool_id: usize) -> bool {
        self.tools.iter().any(|t| t.id() == tool_id)
    }

    pub fn neighbors(&self) -> &[Id] {
        &self.neighbors
    }

    pub fn entities(&self) -> &[Id] {
        &self.entities
    }

    pub fn has_entity(&self, entity: Id) -> bool {
        self.entities.contains(&entity)
    }

    /// Replace one of the effect mixers.
    pub fn set_mixer_susceptibility(&mut self, f: MixerFun) {
        self.mixers.susceptibility = f;
    }

    pub fn set_mixer_transmission(&mut self, f: MixerFun) {
        self.mixers.transmission = f;
    }

    pub fn set_mixer_recovery(&mut self, f: MixerFun) {
        self.mixers.recovery = f;
    }

    pub fn set_mixer_death(&mut self, f: MixerFun) {
        self.mixers.death = f;
    }

    pub fn susceptibility_reduction(&self, virus: &Virus, model: &Model) -> Real {
        let values: Vec<Real> = self
            .tools
            .iter()
            .map(|t| t.susceptibility_reduction(self, virus, model))
            .collect();
        (*self.mixers.susceptibility)(&values)
    }

    pub fn transmission_reduction(&self, virus: &Virus, model: &Model) -> Real {
        let values: Vec<Real> = self
            .tools
            .iter()
            .map(|t| t.transmission_reduction(self, virus, model))
            .collect();
        (*self.mixers.transmission)(&values)
    }

    pub fn recovery_enhancement(&self, virus: &Virus, model: &Model) -> Real {
        let values: Vec<Real> = self
            .tools
            .iter()
            .map(|t| t.recovery_enhancement(self, virus, model))
            .collect();
        (*self.mixers.recovery)(&values)
    }

    pub fn death_reduction(&self, virus: &Virus, model: &Model) -> Real {
        let values: Vec<Real> = self
            .tools
            .iter()
            .map(|t| t.death_reduction(self, virus, model))
            .collect();
        (*self.mixers.death)(&values)
    }

    pub(crate) fn set_state(&mut self, state: usize) {
        self.state = state;
    }

    pub(crate) fn add_neighbor(&mut self, nb: Id) {
        self.neighbors.push(nb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn independent_action_mixes_effects() {
        assert_approx_eq!(independent_action(&[]), 0.0);
        assert_approx_eq!(independent_action(&[0.4]), 0.4);
        assert_approx_eq!(independent_action(&[0.5, 0.5]), 0.75);
        assert_approx_eq!(independent_action(&[1.0, 0.2]), 1.0);
    }
}
