use crate::agent::Agent;
use crate::model::Model;
use crate::prelude::{Id, Real, Time};
use crate::rng::EpiRng;
use getset::{CopyGetters, Getters, Setters};
use std::sync::Arc;

/// Probability hook evaluated as (agent, virus, model) -> value.
pub type VirusFun = Arc<dyn Fn(&Agent, &Virus, &Model) -> Real + Send + Sync>;

/// Mutation hook. Returning true means the virus changed and must be
/// re-registered as a new variant in the database.
pub type MutationFun = Arc<dyn Fn(&mut Virus, &mut EpiRng) -> bool + Send + Sync>;

/// A virus probability is either a constant, a stable index into the
/// model's parameter table, or an arbitrary function of agent and model.
#[derive(Clone)]
pub enum VirusProb {
    Const(Real),
    Param(usize),
    Fun(VirusFun),
}

impl From<Real> for VirusProb {
    fn from(v: Real) -> Self {
        VirusProb::Const(v)
    }
}

impl VirusProb {
    fn eval(&self, agent: &Agent, virus: &Virus, model: &Model) -> Real {
        match self {
            VirusProb::Const(v) => *v,
            VirusProb::Param(ix) => model.param_at(*ix),
            VirusProb::Fun(f) => (**f)(agent, virus, model),
        }
    }
}

/// A pathogen template and, once attached to an agent, the live instance
/// circulating in the population.
#[derive(Clone, Getters, CopyGetters, Setters)]
pub struct Virus {
    #[getset(get_copy = "pub")]
    id: usize,
    #[getset(get = "pub")]
    name: String,

    /// Owning agent. Templates registered on the model have no owner.
    #[getset(get_copy = "pub")]
    agent: Option<Id>,
    /// Day the owning agent was exposed.
    #[getset(get_copy = "pub")]
    date_exposed: Option<Time>,

    prob_infecting: VirusProb,
    prob_recovery: VirusProb,
    prob_death: VirusProb,
    incubation: VirusProb,

    /// Susceptibility reduction granted on recovery, delivered as a tool.
    #[getset(get_copy = "pub")]
    post_immunity: Option<Real>,
    /// Companion tool id used to deliver post-recovery immunity.
    #[getset(get_copy = "pub")]
    immunity_tool: Option<usize>,

    mutation: Option<MutationFun>,

    /// State set on the target when this virus infects it.
    #[getset(get_copy = "pub")]
    state_init: usize,
    /// State set on the host on recovery.
    #[getset(get_copy = "pub")]
    state_post: usize,
    /// State set on the host on death.
    #[getset(get_copy = "pub")]
    state_removed: usize,
}

impl Virus {
    pub fn new(name: impl Into<String>) -> Self {
        Virus {
            id: 0,
            name: name.into(),
            agent: None,
            date_exposed: None,
            prob_infecting: VirusProb::Const(1.0),
            prob_recovery: VirusProb::Const(1.0 / 7.0),
            prob_death: VirusProb::Const(0.0),
            incubation: VirusProb::Const(7.0),
            post_immunity: None,
            immunity_tool: None,
            mutation: None,
            state_init: 0,
            state_post: 0,
            state_removed: 0,
        }
    }

    /// Post-action states: target state on infection, host state on
    /// recovery, host state on death.
    pub fn set_state(&mut self, init: usize, post: usize, removed: usize) -> &mut Self {
        self.state_init = init;
        self.state_post = post;
        self.state_removed = removed;
        self
    }

    pub fn set_prob_infecting(&mut self, p: impl Into<VirusProb>) -> &mut Self {
        self.prob_infecting = p.into();
        self
    }

    pub fn set_prob_recovery(&mut self, p: impl Into<VirusProb>) -> &mut Self {
        self.prob_recovery = p.into();
        self
    }

    pub fn set_prob_death(&mut self, p: impl Into<VirusProb>) -> &mut Self {
        self.prob_death = p.into();
        self
    }

    pub fn set_incubation(&mut self, p: impl Into<VirusProb>) -> &mut Self {
        self.incubation = p.into();
        self
    }

    pub fn set_post_immunity(&mut self, level: Real) -> &mut Self {
        self.post_immunity = Some(level);
        self
    }

    pub fn set_mutation(&mut self, fun: MutationFun) -> &mut Self {
        self.mutation = Some(fun);
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn prob_infecting(&self, agent: &Agent, model: &Model) -> Real {
        self.prob_infecting.eval(agent, self, model)
    }

    pub fn prob_recovery(&self, agent: &Agent, model: &Model) -> Real {
        self.prob_recovery.eval(agent, self, model)
    }

    pub fn prob_death(&self, agent: &Agent, model: &Model) -> Real {
        self.prob_death.eval(agent, self, model)
    }

    pub fn incubation(&self, agent: &Agent, model: &Model) -> Real {
        self.incubation.eval(agent, self, model)
    }

    pub fn mutation(&self) -> Option<&MutationFun> {
        self.mutation.as_ref()
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    pub(crate) fn set_agent(&mut self, agent: Id, date: Time) {
        self.agent = Some(agent);
        self.date_exposed = Some(date);
    }

    pub(crate) fn set_immunity_tool(&mut self, tool: usize) {
        self.immunity_tool = Some(tool);
    }

    /// Validate the constant hooks. Function hooks are trusted to return
    /// values in range; kernels guard with debug assertions.
    pub(crate) fn validate(&self, nstates: usize, nparams: usize) -> crate::error::Result<()> {
        use crate::error::Error;
        for (label, prob) in [
            ("probability of infecting", &self.prob_infecting),
            ("probability of recovery", &self.prob_recovery),
            ("probability of death", &self.prob_death),
        ]
        .iter()
        {
            match prob {
                VirusProb::Const(v) if *v < 0.0 => {
                    return Err(Error::InvalidArgument(format!(
                        "virus '{}': {} is negative ({})",
                        self.name, label, v
                    )))
                }
                VirusProb::Param(ix) if *ix >= nparams => {
                    return Err(Error::OutOfRange(format!(
                        "virus '{}': {} references parameter {} of {}",
                        self.name, label, ix, nparams
                    )))
                }
                _ => {}
            }
        }
        for (label, s) in [
            ("infection", self.state_init),
            ("recovery", self.state_post),
            ("death", self.state_removed),
        ]
        .iter()
        {
            if *s >= nstates {
                return Err(Error::OutOfRange(format!(
                    "virus '{}': post-{} state {} not in the state table ({} states)",
                    self.name, label, s, nstates
                )));
            }
        }
        Ok(())
    }
}
