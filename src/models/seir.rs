use crate::error::Result;
use crate::model::{Model, Prevalence};
use crate::models::{gated_transmission, update_exposed};
use crate::prelude::Real;
use crate::updates::{default_update_infected, default_update_susceptible};
use crate::virus::{Virus, VirusProb};

/// Network SEIR. Newly infected agents incubate in the exposed
/// compartment, where they carry the virus without transmitting it.
pub fn seir(
    vname: &str,
    prevalence: Real,
    transmission_rate: Real,
    incubation_days: Real,
    recovery_rate: Real,
) -> Result<Model> {
    let mut model = Model::new();

    let transmission = model.add_param(transmission_rate, "Transmission rate")?;
    let incubation = model.add_param(incubation_days, "Incubation days")?;
    let recovery = model.add_param(recovery_rate, "Recovery rate")?;

    model.add_state("Susceptible", Some(default_update_susceptible()));
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

    model.set_name("Susceptible-Exposed-Infected-Recovered (SEIR)");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposed_agents_do_not_transmit() {
        // With an incubation period far longer than the run, carriers
        // stay exposed and the outbreak cannot grow.
        let mut model = seir("a virus", 0.05, 1.0, 1e9, 0.1).unwrap();
        model.seed(4);
        model.agents_smallworld(500, 4, 0.01, false).unwrap();
        model.run(30, 42).unwrap();

        let seeds = model
            .db()
            .transmissions()
            .iter()
            .filter(|t| t.source < 0)
            .count();
        assert_eq!(model.db().transmissions().len(), seeds);
    }

    #[test]
    fn progression_reaches_recovered() {
        let mut model = seir("a virus", 0.05, 0.8, 3.0, 0.3).unwrap();
        model.seed(4);
        model.agents_smallworld(2000, 5, 0.01, false).unwrap();
        model.run(100, 42).unwrap();

        let recovered = model.db().hist_total_of(3);
        assert!(*recovered.last().unwrap() > 500);

        let n = model.n_states();
        let tmat = model.db().transition_probability();
        // Exposed leaves at ~1/3 per day, towards Infected only.
        assert!((tmat[1 * n + 2] - 1.0 / 3.0).abs() < 0.05);
        assert_eq!(tmat[1 * n + 0], 0.0);
        assert_eq!(tmat[1 * n + 3], 0.0);
    }
}
