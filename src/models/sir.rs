use crate::error::Result;
use crate::model::{Model, Prevalence};
use crate::prelude::Real;
use crate::updates::{default_update_infected, default_update_susceptible};
use crate::virus::{Virus, VirusProb};

/// Network SIR. Susceptible agents face their neighbours' viruses
/// through the conditional roulette; infected agents recover with the
/// given daily rate.
pub fn sir(
    vname: &str,
    prevalence: Real,
    transmission_rate: Real,
    recovery_rate: Real,
) -> Result<Model> {
    let mut model = Model::new();

    model.add_state("Susceptible", Some(default_update_susceptible()));
    model.add_state("Infected", Some(default_update_infected()));
    model.add_state("Recovered", None);

    let recovery = model.add_param(recovery_rate, "Recovery rate")?;
    let transmission = model.add_param(transmission_rate, "Transmission rate")?;

    let mut virus = Virus::new(vname);
    virus.set_state(1, 2, 2);
    virus.set_prob_infecting(VirusProb::Param(transmission));
    virus.set_prob_recovery(VirusProb::Param(recovery));
    virus.set_prob_death(0.0);
    model.add_virus(virus, Prevalence::Proportion(prevalence))?;

    model.set_name("Susceptible-Infected-Recovered (SIR)");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::initial_states;

    fn smallworld_sir(n: usize, seed: u64) -> Model {
        let mut model = sir("a virus", 0.01, 0.9, 0.3).unwrap();
        model.seed(seed);
        model.agents_smallworld(n, 5, 0.01, false).unwrap();
        model.verbose_off();
        model
    }

    #[test]
    fn queuing_on_and_off_agree() {
        let mut with_queue = smallworld_sir(500, 12);
        with_queue.run(50, 1231).unwrap();

        let mut without_queue = smallworld_sir(500, 12);
        without_queue.queuing_off();
        without_queue.run(50, 1231).unwrap();

        assert_eq!(
            with_queue.db().hist_total(),
            without_queue.db().hist_total()
        );
        assert_eq!(
            with_queue.db().transition_probability(),
            without_queue.db().transition_probability()
        );
    }

    #[test]
    fn transition_matrix_matches_the_rates() {
        let mut model = smallworld_sir(10000, 1231);
        model.run(100, 1231).unwrap();

        let n = model.n_states();
        let tmat = model.db().transition_probability();

        for from in 0..n {
            let row: Real = (0..n).map(|to| tmat[from * n + to]).sum();
            assert!((row - 1.0).abs() < 1e-9 || row == 0.0, "row {} = {}", from, row);
        }
        // Recovered is absorbing.
        assert!((tmat[2 * n + 2] - 1.0).abs() < 1e-9);
        // Daily recovery probability is the configured rate.
        assert!(
            (tmat[1 * n + 2] - 0.3).abs() < 0.025,
            "I->R = {}",
            tmat[1 * n + 2]
        );
        // The epidemic takes off: most of the population ends recovered.
        let recovered = model.db().hist_total_of(2);
        assert!(*recovered.last().unwrap() > 5000);
    }

    #[test]
    fn identical_seeds_reproduce_identical_runs() {
        let mut a = smallworld_sir(1000, 7);
        let mut b = smallworld_sir(1000, 7);
        a.run(50, 99).unwrap();
        b.run(50, 99).unwrap();
        assert_eq!(a.db().hist_total(), b.db().hist_total());
        assert_eq!(a.db().transmissions(), b.db().transmissions());
    }

    #[test]
    fn degenerate_model_stays_susceptible() {
        let mut model = sir("a virus", 0.0, 0.0, 0.3).unwrap();
        model.seed(3);
        model.agents_smallworld(200, 5, 0.01, false).unwrap();
        model.run(20, 55).unwrap();

        for count in model.db().hist_total_of(0) {
            assert_eq!(count, 200);
        }
        assert!(model.db().transmissions().is_empty());
    }

    #[test]
    fn initial_recovered_share_is_respected() {
        let mut model = sir("a virus", 0.01, 0.9, 0.3).unwrap();
        model.seed(3);
        model.agents_smallworld(2000, 5, 0.01, false).unwrap();
        initial_states(&mut model, 2, 0.5);
        model.run(0, 18).unwrap();

        let recovered = model.db().hist_total_of(2)[0];
        assert!(
            (recovered - 1000).abs() < 150,
            "recovered at day 0 = {}",
            recovered
        );
    }
}
