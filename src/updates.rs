use crate::events::Event;
use crate::model::{Model, UpdateFun};
use crate::prelude::{Id, Real};
use std::sync::Arc;

/// Conditional weighted sampling: given per-option probabilities, pick
/// either no option (None) or exactly one, using a pre-drawn uniform `r`.
/// Options with probability indistinguishable from one short-circuit to a
/// uniform choice among themselves.
pub fn roulette(probs: &[Real], r: Real) -> Option<usize> {
    let mut p_none = 1.0;
    let mut certain: Vec<usize> = Vec::new();
    for (i, &p) in probs.iter().enumerate() {
        p_none *= 1.0 - p;
        if p > 1.0 - 1e-100 {
            certain.push(i);
        }
    }

    if !certain.is_empty() {
        let which = ((r * certain.len() as Real) as usize).min(certain.len() - 1);
        return Some(certain[which]);
    }

    let mut only_p = Vec::with_capacity(probs.len());
    let mut p_none_or_single = p_none;
    for &p in probs {
        let v = p * (p_none / (1.0 - p));
        only_p.push(v);
        p_none_or_single += v;
    }

    let mut cumsum = p_none / p_none_or_single;
    if r < cumsum {
        return None;
    }
    for (i, &v) in only_p.iter().enumerate() {
        cumsum += v / p_none_or_single;
        if r < cumsum {
            return Some(i);
        }
    }
    if probs.is_empty() {
        None
    } else {
        Some(probs.len() - 1)
    }
}

/// Network transmission kernel: visit the agent's neighbours, collect the
/// effective infection probability of every virus carried by them, and
/// draw at most one infection. The uniform is only consumed when there is
/// something to draw on, which keeps the random stream identical whether
/// or not queuing is enabled.
pub fn default_update_susceptible() -> UpdateFun {
    Arc::new(|id: Id, m: &mut Model| {
        let mut probs: Vec<Real> = Vec::new();
        let mut sources: Vec<Id> = Vec::new();
        {
            let agent = m.agent(id);
            for &nb in agent.neighbors() {
                let neighbor = m.agent(nb);
                let virus = match neighbor.virus() {
                    Some(v) => v,
                    None => continue,
                };
                let p = (1.0 - agent.susceptibility_reduction(virus, m))
                    * virus.prob_infecting(neighbor, m)
                    * (1.0 - neighbor.transmission_reduction(virus, m));
                probs.push(p);
                sources.push(nb);
            }
        }
        if probs.is_empty() {
            return;
        }

        let r = m.runif();
        if let Some(which) = roulette(&probs, r) {
            let source = sources[which];
            let virus = match m.agent(source).virus() {
                Some(v) => v.clone(),
                None => return,
            };
            let state = virus.state_init();
            m.queue_event(Event::AddVirus {
                agent: id,
                virus,
                state,
                source: Some(source),
            });
        }
    })
}

/// Disease progression: the host either dies, recovers or stays, drawn
/// through the two-event conditional probabilities so the three outcomes
/// stay exclusive.
pub fn default_update_infected() -> UpdateFun {
    Arc::new(|id: Id, m: &mut Model| {
        let (p_die, p_rec, state_post, state_removed) = {
            let agent = m.agent(id);
            let virus = match agent.virus() {
                Some(v) => v,
                None => return,
            };
            let p_die = virus.prob_death(agent, m) * (1.0 - agent.death_reduction(virus, m));
            let p_rec =
                1.0 - (1.0 - virus.prob_recovery(agent, m))
                    * (1.0 - agent.recovery_enhancement(virus, m));
            (p_die, p_rec, virus.state_post(), virus.state_removed())
        };

        let r = m.runif();
        let denom = 1.0 - p_die * p_rec;
        let mut cumsum = p_die * (1.0 - p_rec) / denom;
        if r < cumsum {
            m.queue_event(Event::RmVirus {
                agent: id,
                state: state_removed,
                immunity: false,
            });
            return;
        }
        cumsum += p_rec * (1.0 - p_die) / denom;
        if r < cumsum {
            m.queue_event(Event::RmVirus {
                agent: id,
                state: state_post,
                immunity: true,
            });
        }
    })
}
