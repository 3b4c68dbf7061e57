use crate::agent::Agent;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::model::{Model, UpdateFun};
use crate::prelude::{Id, Real};
use crate::updates::roulette;
use ndarray::Array2;
use std::sync::Arc;

/// Contact-rate configuration for group mixing. When a per-agent vector
/// is supplied it wins over a per-entity vector, which wins over the
/// scalar; a per-entity vector is indexed by the contacted group.
#[derive(Clone)]
pub enum ContactRates {
    Scalar(Real),
    PerEntity(Vec<Real>),
    PerAgent(Vec<Real>),
}

impl ContactRates {
    pub fn resolve(&self, agent: Id, group: usize) -> Real {
        match self {
            ContactRates::Scalar(v) => *v,
            ContactRates::PerEntity(v) => v[group],
            ContactRates::PerAgent(v) => v[agent],
        }
    }

    fn validate(&self, nentities: usize, nagents: usize) -> Result<()> {
        let check = |values: &[Real], what: &str, expected: usize| -> Result<()> {
            if values.len() != expected {
                return Err(Error::InvalidArgument(format!(
                    "{} contact-rate vector has {} entries, expected {}",
                    what,
                    values.len(),
                    expected
                )));
            }
            if let Some(v) = values.iter().find(|v| **v < 0.0) {
                return Err(Error::InvalidArgument(format!(
                    "negative contact rate {}",
                    v
                )));
            }
            Ok(())
        };
        match self {
            ContactRates::Scalar(v) if *v < 0.0 => Err(Error::InvalidArgument(format!(
                "negative contact rate {}",
                v
            ))),
            ContactRates::Scalar(_) => Ok(()),
            ContactRates::PerEntity(v) => check(v, "per-entity", nentities),
            ContactRates::PerAgent(v) => check(v, "per-agent", nagents),
        }
    }
}

/// Group-mixing transmission setup: the entity-by-entity contact matrix,
/// the configured contact rates, the states that transmit, and the
/// compact per-entity index of infectious agents rebuilt each step.
#[derive(Clone)]
pub struct Mixing {
    pub(crate) cmat: Array2<Real>,
    pub(crate) rates: ContactRates,
    pub(crate) infectious_states: Vec<usize>,
    index: Vec<Vec<Id>>,
}

impl Mixing {
    pub fn new(cmat: Array2<Real>, rates: ContactRates, infectious_states: Vec<usize>) -> Self {
        Mixing {
            cmat,
            rates,
            infectious_states,
            index: Vec::new(),
        }
    }

    pub fn contact_matrix(&self) -> &Array2<Real> {
        &self.cmat
    }

    /// Row-stochasticity and shape checks; run at model reset.
    pub(crate) fn validate(
        &self,
        nentities: usize,
        nagents: usize,
        nstates: usize,
    ) -> Result<()> {
        if self.cmat.nrows() != nentities || self.cmat.ncols() != nentities {
            return Err(Error::InvalidArgument(format!(
                "contact matrix is {}x{}, expected {}x{}",
                self.cmat.nrows(),
                self.cmat.ncols(),
                nentities,
                nentities
            )));
        }
        for (i, row) in self.cmat.rows().into_iter().enumerate() {
            let mut sum = 0.0;
            for &v in row.iter() {
                if v < 0.0 {
                    return Err(Error::InvalidArgument(format!(
                        "contact matrix entry ({}, ..) is negative: {}",
                        i, v
                    )));
                }
                sum += v;
            }
            if (sum - 1.0).abs() > 0.001 {
                return Err(Error::InvalidArgument(format!(
                    "contact matrix row {} sums to {}, expected 1",
                    i, sum
                )));
            }
        }
        self.rates.validate(nentities, nagents)?;
        if let Some(s) = self.infectious_states.iter().find(|s| **s >= nstates) {
            return Err(Error::OutOfRange(format!(
                "infectious state {} not in the state table ({} states)",
                s, nstates
            )));
        }
        Ok(())
    }

    /// Refresh the infectious-index array from the current agent states.
    pub(crate) fn rebuild_index(&mut self, agents: &[Agent], entities: &[Entity]) {
        self.index.clear();
        self.index.resize(entities.len(), Vec::new());
        for agent in agents {
            if !agent.has_virus() {
                continue;
            }
            if !self.infectious_states.contains(&agent.state()) {
                continue;
            }
            for &e in agent.entities() {
                self.index[e].push(agent.id());
            }
        }
    }

    fn n_infectious(&self, group: usize) -> usize {
        self.index[group].len()
    }

    fn infectious_at(&self, group: usize, which: usize) -> Id {
        self.index[group][which]
    }
}

/// Group-mixing transmission kernel. Agents with no entity (isolated or
/// quarantined) are skipped. The number of contacts drawn from each group
/// is Binomial over that group's infectious count, with the group's
/// adjusted rate scaled by the contact-matrix entry; sampled agents are
/// drawn uniformly from the infectious index, re-drawing on a self
/// sample.
pub fn update_susceptible_mixing() -> UpdateFun {
    Arc::new(|id: Id, m: &mut Model| {
        let mix = match m.take_mixing() {
            Some(mix) => mix,
            None => return,
        };

        let ego = match m.agent(id).entities().first() {
            Some(&g) => g,
            None => {
                m.restore_mixing(mix);
                return;
            }
        };

        let ngroups = m.entities().len();
        let mut sampled: Vec<Id> = Vec::new();
        for g in 0..ngroups {
            let ninf = mix.n_infectious(g);
            if ninf == 0 {
                continue;
            }
            let gsize = m.entity(g).size();
            if gsize == 0 {
                continue;
            }
            let rate = mix.rates.resolve(id, g);
            let p = (rate / gsize as Real).min(1.0) * mix.cmat[(ego, g)];
            let ndraws = m.rng_mut().rbinom(ninf as u64, p);
            for _ in 0..ndraws {
                // Only this agent to sample from: nothing to contact.
                if ninf == 1 && mix.infectious_at(g, 0) == id {
                    break;
                }
                loop {
                    let which = m.rng_mut().unif_index(ninf);
                    let candidate = mix.infectious_at(g, which);
                    if candidate != id {
                        sampled.push(candidate);
                        break;
                    }
                }
            }
        }

        let mut probs: Vec<Real> = Vec::new();
        let mut sources: Vec<Id> = Vec::new();
        {
            let agent = m.agent(id);
            for &src in &sampled {
                let neighbor = m.agent(src);
                let virus = match neighbor.virus() {
                    Some(v) => v,
                    None => continue,
                };
                let p = (1.0 - agent.susceptibility_reduction(virus, m))
                    * virus.prob_infecting(neighbor, m)
                    * (1.0 - neighbor.transmission_reduction(virus, m));
                probs.push(p);
                sources.push(src);
            }
        }

        if !probs.is_empty() {
            let r = m.runif();
            if let Some(which) = roulette(&probs, r) {
                let source = sources[which];
                if let Some(virus) = m.agent(source).virus().cloned() {
                    let state = virus.state_init();
                    m.queue_event(Event::AddVirus {
                        agent: id,
                        virus,
                        state,
                        source: Some(source),
                    });
                }
            }
        }

        m.restore_mixing(mix);
    })
}
