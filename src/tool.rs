use crate::agent::Agent;
use crate::model::Model;
use crate::prelude::{Id, Real};
use crate::virus::Virus;
use getset::{CopyGetters, Getters};
use std::sync::Arc;

/// Effect hook evaluated as (tool, owner agent, virus, model) -> value.
pub type ToolFun = Arc<dyn Fn(&Tool, &Agent, &Virus, &Model) -> Real + Send + Sync>;

#[derive(Clone)]
pub enum ToolProb {
    Const(Real),
    Param(usize),
    Fun(ToolFun),
}

impl From<Real> for ToolProb {
    fn from(v: Real) -> Self {
        ToolProb::Const(v)
    }
}

impl ToolProb {
    fn eval(&self, tool: &Tool, agent: &Agent, virus: &Virus, model: &Model) -> Real {
        match self {
            ToolProb::Const(v) => *v,
            ToolProb::Param(ix) => model.param_at(*ix),
            ToolProb::Fun(f) => (**f)(tool, agent, virus, model),
        }
    }
}

/// An intervention or innate characteristic carried by an agent. Each of
/// the four modifiers lies in [0, 1]; defaults are neutral.
#[derive(Clone, Getters, CopyGetters)]
pub struct Tool {
    #[getset(get_copy = "pub")]
    id: usize,
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    agent: Option<Id>,

    susceptibility_reduction: ToolProb,
    transmission_reduction: ToolProb,
    recovery_enhancement: ToolProb,
    death_reduction: ToolProb,
}

impl Tool {
    pub fn new(name: impl Into<String>) -> Self {
        Tool {
            id: 0,
            name: name.into(),
            agent: None,
            susceptibility_reduction: ToolProb::Const(0.0),
            transmission_reduction: ToolProb::Const(0.0),
            recovery_enhancement: ToolProb::Const(0.0),
            death_reduction: ToolProb::Const(0.0),
        }
    }

    pub fn set_susceptibility_reduction(&mut self, p: impl Into<ToolProb>) -> &mut Self {
        self.susceptibility_reduction = p.into();
        self
    }

    pub fn set_transmission_reduction(&mut self, p: impl Into<ToolProb>) -> &mut Self {
        self.transmission_reduction = p.into();
        self
    }

    pub fn set_recovery_enhancement(&mut self, p: impl Into<ToolProb>) -> &mut Self {
        self.recovery_enhancement = p.into();
        self
    }

    pub fn set_death_reduction(&mut self, p: impl Into<ToolProb>) -> &mut Self {
        self.death_reduction = p.into();
        self
    }

    pub fn susceptibility_reduction(&self, agent: &Agent, virus: &Virus, model: &Model) -> Real {
        self.susceptibility_reduction.eval(self, agent, virus, model)
    }

    pub fn transmission_reduction(&self, agent: &Agent, virus: &Virus, model: &Model) -> Real {
        self.transmission_reduction.eval(self, agent, virus, model)
    }

    pub fn recovery_enhancement(&self, agent: &Agent, virus: &Virus, model: &Model) -> Real {
        self.recovery_enhancement.eval(self, agent, virus, model)
    }

    pub fn death_reduction(&self, agent: &Agent, virus: &Virus, model: &Model) -> Real {
        self.death_reduction.eval(self, agent, virus, model)
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    pub(crate) fn set_agent(&mut self, agent: Id) {
        self.agent = Some(agent);
    }

    pub(crate) fn validate(&self, nparams: usize) -> crate::error::Result<()> {
        use crate::error::Error;
        for (label, prob) in [
            ("susceptibility reduction", &self.susceptibility_reduction),
            ("transmission reduction", &self.transmission_reduction),
            ("recovery enhancement", &self.recovery_enhancement),
            ("death reduction", &self.death_reduction),
        ]
        .iter()
        {
            match prob {
                ToolProb::Const(v) if !(0.0..=1.0).contains(v) => {
                    return Err(Error::InvalidArgument(format!(
                        "tool '{}': {} {} outside [0, 1]",
                        self.name, label, v
                    )))
                }
                ToolProb::Param(ix) if *ix >= nparams => {
                    return Err(Error::OutOfRange(format!(
                        "tool '{}': {} references parameter {} of {}",
                        self.name, label, ix, nparams
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }
}
