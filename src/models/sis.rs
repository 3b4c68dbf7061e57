use crate::error::Result;
use crate::model::{Model, Prevalence};
use crate::prelude::Real;
use crate::updates::{default_update_infected, default_update_susceptible};
use crate::virus::{Virus, VirusProb};

/// Network SIS: recovery leads straight back to the susceptible
/// compartment, so agents can be reinfected.
pub fn sis(
    vname: &str,
    prevalence: Real,
    transmission_rate: Real,
    recovery_rate: Real,
) -> Result<Model> {
    let mut model = Model::new();

    model.add_state("Susceptible", Some(default_update_susceptible()));
    model.add_state("Infected", Some(default_update_infected()));

    let recovery = model.add_param(recovery_rate, "Recovery rate")?;
    let transmission = model.add_param(transmission_rate, "Transmission rate")?;

    let mut virus = Virus::new(vname);
    virus.set_state(1, 0, 0);
    virus.set_prob_infecting(VirusProb::Param(transmission));
    virus.set_prob_recovery(VirusProb::Param(recovery));
    virus.set_prob_death(0.0);
    model.add_virus(virus, Prevalence::Proportion(prevalence))?;

    model.set_name("Susceptible-Infected-Susceptible (SIS)");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agents_cycle_back_to_susceptible() {
        let mut model = sis("a virus", 0.05, 0.6, 0.4).unwrap();
        model.seed(21);
        model.agents_smallworld(1000, 4, 0.05, false).unwrap();
        model.run(50, 77).unwrap();

        let n = model.n_states();
        let tmat = model.db().transition_probability();
        // Some infected agents went back to susceptible.
        assert!(tmat[n] > 0.0, "I->S = {}", tmat[n]);

        // Reinfections make outbreak size exceed the distinct carriers.
        let total = model.db().hist_total_of(0).len() as i64;
        assert!(total > 0);
        let last_outbreak = model.db().outbreak_sizes().last().unwrap().count;
        assert_eq!(last_outbreak, model.db().transmissions().len() as i64);
    }
}
