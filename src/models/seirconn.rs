use crate::entity::{distribute_entity_evenly, Entity};
use crate::error::Result;
use crate::mixing::{update_susceptible_mixing, ContactRates, Mixing};
use crate::model::{Model, Prevalence};
use crate::models::{gated_transmission, update_exposed};
use crate::prelude::Real;
use crate::updates::default_update_infected;
use crate::virus::{Virus, VirusProb};
use ndarray::Array2;

/// Fully-connected SEIR, sharing the group-mixing kernel of
/// `sir_connected` with an incubation compartment in front.
pub fn seir_connected(
    vname: &str,
    n: usize,
    prevalence: Real,
    contact_rate: Real,
    transmission_rate: Real,
    incubation_days: Real,
    recovery_rate: Real,
) -> Result<Model> {
    let mut model = Model::new();

    model.add_param(contact_rate, "Contact rate")?;
    let transmission = model.add_param(transmission_rate, "Transmission rate")?;
    let incubation = model.add_param(incubation_days, "Incubation days")?;
    let recovery = model.add_param(recovery_rate, "Recovery rate")?;

    model.add_state("Susceptible", Some(update_susceptible_mixing()));
    model.add_state("Exposed", Some(update_exposed(incubation, 2)));
    model.add_state("Infected", Some(default_update_infected()));
    model.add_state("Recovered", None);

    let mut virus = Virus::new(vname);
    virus.set_state(1, 3, 3);
    virus.set_prob_infecting(gated_transmission(transmission, 2));
    virus.set_prob_recovery(VirusProb::Param(recovery));
    virus.set_prob_death(0.0);
    virus.set_incubation(VirusProb::Param(incubation));
    model.add_virus(virus, Prevalence::Proportion(prevalence))?;

    model.agents_empty_graph(n);
    model.add_entity_with(Entity::new("Population"), distribute_entity_evenly(1));
    model.set_mixing(Mixing::new(
        Array2::ones((1, 1)),
        ContactRates::Scalar(contact_rate),
        vec![2],
    ));
    model.queuing_off();

    model.set_name("Susceptible-Exposed-Infected-Removed (SEIR, connected)");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incubation_gates_the_infectious_index() {
        // Carriers never leave the exposed compartment, so the mixing
        // kernel has nobody to sample and the outbreak stays at seeds.
        let mut model = seir_connected("a virus", 1000, 0.05, 4.0, 0.9, 1e9, 0.1).unwrap();
        model.run(20, 5).unwrap();
        let seeds = model
            .db()
            .transmissions()
            .iter()
            .filter(|t| t.source < 0)
            .count();
        assert_eq!(model.db().transmissions().len(), seeds);
    }

    #[test]
    fn connected_seir_reaches_recovered() {
        let mut model = seir_connected("a virus", 5000, 0.01, 4.0, 0.5, 4.0, 1.0 / 7.0).unwrap();
        model.run(100, 13).unwrap();
        let recovered = model.db().hist_total_of(3);
        assert!(*recovered.last().unwrap() > 1000);
    }
}
