//! Disease-model presets layered on the core: parameterised state
//! tables, viruses and kernels, returned as ready-to-run models.

mod seir;
mod seirconn;
mod seirmixing;
mod sir;
mod sirconn;
mod sis;

pub use seir::seir;
pub use seirconn::seir_connected;
pub use seirmixing::seir_mixing;
pub use sir::sir;
pub use sirconn::sir_connected;
pub use sis::sis;

use crate::agent::Agent;
use crate::events::Event;
use crate::model::{Model, UpdateFun};
use crate::prelude::{Id, Real};
use crate::virus::{Virus, VirusProb};
use std::sync::Arc;

/// Incubation exit: leave the exposed compartment with daily probability
/// 1 / incubation days.
pub(crate) fn update_exposed(incubation_ix: usize, infectious_state: usize) -> UpdateFun {
    Arc::new(move |id: Id, m: &mut Model| {
        let days = m.param_at(incubation_ix).max(1.0);
        if m.runif() < 1.0 / days {
            m.queue_event(Event::SetState {
                agent: id,
                state: infectious_state,
            });
        }
    })
}

/// Transmission probability hook that is only live while the host sits
/// in the infectious compartment; exposed carriers do not transmit.
pub(crate) fn gated_transmission(param_ix: usize, infectious_state: usize) -> VirusProb {
    VirusProb::Fun(Arc::new(move |agent: &Agent, _: &Virus, m: &Model| {
        if agent.state() == infectious_state {
            m.param_at(param_ix)
        } else {
            0.0
        }
    }))
}

/// Move a share of the still-susceptible population into `state` at day
/// zero, e.g. to start with part of the population recovered.
pub fn initial_states(model: &mut Model, state: usize, proportion: Real) {
    model.set_initial_fun(Arc::new(move |m: &mut Model| {
        for agent in 0..m.size() {
            if m.agent(agent).has_virus() || m.agent(agent).state() != 0 {
                continue;
            }
            if m.runif() < proportion {
                m.queue_event(Event::SetState { agent, state });
            }
        }
    }));
}
