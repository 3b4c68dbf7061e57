use crate::entity::{distribute_entity_evenly, Entity};
use crate::error::Result;
use crate::mixing::{update_susceptible_mixing, ContactRates, Mixing};
use crate::model::{Model, Prevalence};
use crate::prelude::Real;
use crate::updates::default_update_infected;
use crate::virus::{Virus, VirusProb};
use ndarray::Array2;

/// Fully-connected SIR: no contact network, one entity holding the whole
/// population, and contacts drawn through the group-mixing kernel with a
/// trivial 1x1 contact matrix. Queuing is pointless without a network,
/// so it is switched off.
pub fn sir_connected(
    vname: &str,
    n: usize,
    prevalence: Real,
    contact_rate: Real,
    transmission_rate: Real,
    recovery_rate: Real,
) -> Result<Model> {
    let mut model = Model::new();

    model.add_state("Susceptible", Some(update_susceptible_mixing()));
    model.add_state("Infected", Some(default_update_infected()));
    model.add_state("Recovered", None);

    model.add_param(contact_rate, "Contact rate")?;
    let transmission = model.add_param(transmission_rate, "Transmission rate")?;
    let recovery = model.add_param(recovery_rate, "Recovery rate")?;

    let mut virus = Virus::new(vname);
    virus.set_state(1, 2, 2);
    virus.set_prob_infecting(VirusProb::Param(transmission));
    virus.set_prob_recovery(VirusProb::Param(recovery));
    virus.set_prob_death(0.0);
    model.add_virus(virus, Prevalence::Proportion(prevalence))?;

    model.agents_empty_graph(n);
    model.add_entity_with(Entity::new("Population"), distribute_entity_evenly(1));
    model.set_mixing(Mixing::new(
        Array2::ones((1, 1)),
        ContactRates::Scalar(contact_rate),
        vec![1],
    ));
    model.queuing_off();

    model.set_name("Susceptible-Infected-Removed (SIR, connected)");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epidemic_spreads_and_recovery_rate_shows() {
        let mut model = sir_connected("a virus", 10000, 0.01, 4.0, 0.5, 1.0 / 7.0).unwrap();
        model.verbose_off();
        model.run(100, 131).unwrap();

        let n = model.n_states();
        let tmat = model.db().transition_probability();
        assert!(
            (tmat[1 * n + 2] - 1.0 / 7.0).abs() < 0.05,
            "I->R = {}",
            tmat[1 * n + 2]
        );
        assert!(tmat[0 * n + 1] > 0.05, "S->I = {}", tmat[0 * n + 1]);

        let recovered = model.db().hist_total_of(2);
        assert!(*recovered.last().unwrap() > 5000);
    }

    #[test]
    fn contact_rate_zero_stops_transmission() {
        let mut model = sir_connected("a virus", 2000, 0.01, 0.0, 0.5, 1.0 / 7.0).unwrap();
        model.run(20, 9).unwrap();
        let seeds = model
            .db()
            .transmissions()
            .iter()
            .filter(|t| t.source < 0)
            .count();
        assert_eq!(model.db().transmissions().len(), seeds);
    }
}
