use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::mixing::{update_susceptible_mixing, ContactRates, Mixing};
use crate::model::{Model, Prevalence};
use crate::models::{gated_transmission, update_exposed};
use crate::prelude::Real;
use crate::updates::default_update_infected;
use crate::virus::{Virus, VirusProb};
use ndarray::Array2;
use std::sync::Arc;

/// SEIR over mixing groups: the population is split into consecutive
/// blocks, one per entity, and contacts are routed between groups by the
/// row-stochastic contact matrix.
pub fn seir_mixing(
    vname: &str,
    n: usize,
    prevalence: Real,
    contact_rates: ContactRates,
    transmission_rate: Real,
    incubation_days: Real,
    recovery_rate: Real,
    group_sizes: &[usize],
    contact_matrix: Array2<Real>,
) -> Result<Model> {
    if group_sizes.iter().sum::<usize>() != n {
        return Err(Error::InvalidArgument(format!(
            "group sizes add up to {}, expected the population size {}",
            group_sizes.iter().sum::<usize>(),
            n
        )));
    }

    let mut model = Model::new();

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
    let mut offset = 0;
    for (g, &size) in group_sizes.iter().enumerate() {
        let lo = offset;
        let hi = offset + size;
        model.add_entity_with(
            Entity::new(format!("Group {}", g)),
            Arc::new(move |entity, m: &mut Model| {
                for agent in lo..hi {
                    m.assign_entity(agent, entity);
                }
            }),
        );
        offset = hi;
    }

    model.set_mixing(Mixing::new(contact_matrix, contact_rates, vec![2]));
    model.queuing_off();

    model.set_name("Susceptible-Exposed-Infected-Removed (SEIR, mixing)");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_cmat(k: usize) -> Array2<Real> {
        Array2::from_elem((k, k), 1.0 / k as Real)
    }

    fn mixing_model(rates: ContactRates) -> Model {
        seir_mixing(
            "a virus",
            3000,
            0.01,
            rates,
            0.4,
            4.0,
            1.0 / 7.0,
            &[1000, 1000, 1000],
            uniform_cmat(3),
        )
        .unwrap()
    }

    #[test]
    fn per_entity_vector_of_a_scalar_matches_the_scalar() {
        let mut scalar = mixing_model(ContactRates::Scalar(5.0));
        scalar.run(50, 2077).unwrap();

        let mut vector = mixing_model(ContactRates::PerEntity(vec![5.0, 5.0, 5.0]));
        vector.run(50, 2077).unwrap();

        assert_eq!(scalar.db().hist_total(), vector.db().hist_total());
        assert_eq!(scalar.db().transmissions(), vector.db().transmissions());
    }

    #[test]
    fn per_agent_rates_take_precedence_and_run() {
        let mut model = mixing_model(ContactRates::PerAgent(vec![5.0; 3000]));
        model.run(30, 3).unwrap();
        assert!(!model.db().transmissions().is_empty());
    }

    #[test]
    fn contact_matrix_rows_must_be_stochastic() {
        let mut bad = uniform_cmat(3);
        bad[(0, 0)] = 0.9;
        let mut model = seir_mixing(
            "a virus",
            300,
            0.01,
            ContactRates::Scalar(2.0),
            0.4,
            4.0,
            0.2,
            &[100, 100, 100],
            bad,
        )
        .unwrap();
        assert!(model.run(10, 1).is_err());
    }

    #[test]
    fn group_sizes_must_cover_the_population() {
        let result = seir_mixing(
            "a virus",
            500,
            0.01,
            ContactRates::Scalar(2.0),
            0.4,
            4.0,
            0.2,
            &[100, 100],
            uniform_cmat(2),
        );
        assert!(result.is_err());
    }

    #[test]
    fn blocked_group_stays_clean() {
        // Group 2 contacts only itself and holds no seeds, so it can
        // never be reached.
        let mut cmat = Array2::zeros((2, 2));
        cmat[(0, 0)] = 1.0;
        cmat[(1, 1)] = 1.0;
        let mut model = seir_mixing(
            "a virus",
            1000,
            0.0,
            ContactRates::Scalar(4.0),
            0.9,
            2.0,
            0.1,
            &[500, 500],
            cmat,
        )
        .unwrap();
        // Seed group 0 only.
        model.set_initial_fun(Arc::new(|m: &mut Model| {
            let template = m.viruses()[0].clone();
            let state = template.state_init();
            for agent in 0..10 {
                m.queue_event(crate::events::Event::AddVirus {
                    agent,
                    virus: template.clone(),
                    state,
                    source: None,
                });
            }
        }));
        model.run(40, 11).unwrap();

        for t in model.db().transmissions() {
            assert!(t.target < 500, "agent {} in the blocked group", t.target);
        }
    }
}
