use epiabm::models;
use epiabm::prelude::*;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pop_size: usize,
    n_ties: usize,
    rewire_prob: Real,
    prevalence: Real,
    transmission_rate: Real,
    recovery_rate: Real,
    ndays: Time,
    nreps: usize,
    seed: u64,
    threads: usize,
    output: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pop_size: 10_000,
            n_ties: 5,
            rewire_prob: 0.01,
            prevalence: 0.01,
            transmission_rate: 0.9,
            recovery_rate: 0.3,
            ndays: 100,
            nreps: 4,
            seed: 1231,
            threads: 2,
            output: "sim-out/run_%i".to_string(),
        }
    }
}

pub fn main() {
    use simple_logger::SimpleLogger;
    SimpleLogger::new().init().unwrap();

    let config: Config = match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path).expect("readable config file");
            toml::from_str(&raw).expect("valid TOML config")
        }
        None => Config::default(),
    };
    log::info!("running with {:?}", config);

    let mut model = models::sir(
        "a virus",
        config.prevalence,
        config.transmission_rate,
        config.recovery_rate,
    )
    .expect("valid model parameters");
    model.seed(config.seed);
    model
        .agents_smallworld(config.pop_size, config.n_ties, config.rewire_prob, false)
        .expect("valid graph parameters");

    let saver = SaveRun::new(config.output.clone()).expect("valid output format");
    model
        .run_multiple(
            config.ndays,
            config.nreps,
            config.seed,
            Some(|rep: usize, m: &Model| saver.save(rep, m)),
            true,
            true,
            config.threads,
        )
        .expect("replicates to complete");
}
