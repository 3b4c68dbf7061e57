pub use crate::agent::{independent_action, Agent, MixerFun, ToolMixers};
pub use crate::database::Database;
pub use crate::entity::{distribute_entity_evenly, Entity};
pub use crate::error::{Error, Result};
pub use crate::events::Event;
pub use crate::globals::{set_param_event, tool_rollout_event, GlobalEvent, GlobalFun};
pub use crate::graph::AdjList;
pub use crate::lfmcmc::{
    kernel_gaussian, kernel_uniform, proposal_normal, proposal_norm_reflective, Lfmcmc,
};
pub use crate::mixing::{ContactRates, Mixing};
pub use crate::model::{Model, Prevalence, UpdateFun};
pub use crate::queue::Queue;
pub use crate::rng::{default_rng, EpiRng};
pub use crate::saver::SaveRun;
pub use crate::tool::{Tool, ToolProb};
pub use crate::updates::{default_update_infected, default_update_susceptible, roulette};
pub use crate::virus::{Virus, VirusProb};

/// Type alias describing agent handles.
pub type Id = usize;

/// Simulation time is measured in whole days.
pub type Time = u32;

pub type Real = f64;
