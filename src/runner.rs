use crate::error::Result;
use crate::model::Model;
use crate::prelude::Time;
use rayon::prelude::*;
use std::time::Instant;

impl Model {
    /// Run `nreps` independent replicates, `nthreads` at a time.
    ///
    /// Replicate r always executes on its own clone of the model with
    /// seed `seed + r`, so per-replicate trajectories do not depend on
    /// the thread count or on scheduling. The saver is invoked on the
    /// calling thread, in replicate order, once all replicates have
    /// finished; a saver error aborts the sweep.
    pub fn run_multiple<S>(
        &mut self,
        ndays: Time,
        nreps: usize,
        seed: u64,
        saver: Option<S>,
        reset: bool,
        verbose: bool,
        nthreads: usize,
    ) -> Result<&mut Self>
    where
        S: Fn(usize, &Model) -> Result<()>,
    {
        let started = Instant::now();
        let nthreads = nthreads.max(1);

        let runs: Vec<Result<Model>> = if nthreads == 1 {
            (0..nreps)
                .map(|r| self.replicate(r, ndays, seed, reset))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(nthreads)
                .build()
                .map_err(|e| crate::error::Error::InvalidArgument(e.to_string()))?;
            let shared = &*self;
            pool.install(|| {
                (0..nreps)
                    .into_par_iter()
                    .map(|r| shared.clone().replicate_owned(r, ndays, seed, reset))
                    .collect()
            })
        };

        let mut finished = Vec::with_capacity(nreps);
        for run in runs {
            finished.push(run?);
        }

        if let Some(saver) = saver {
            for (r, model) in finished.iter().enumerate() {
                saver(r, model)?;
            }
        }

        if verbose {
            log::info!(
                "{} replicates of {} days on {} thread(s) in {:.2?}",
                nreps,
                ndays,
                nthreads,
                started.elapsed()
            );
        }

        // Leave the driver model holding the last replicate so its
        // database remains inspectable.
        if let Some(last) = finished.pop() {
            *self = last;
        }
        Ok(self)
    }

    fn replicate(&self, r: usize, ndays: Time, seed: u64, reset: bool) -> Result<Model> {
        self.clone().replicate_owned(r, ndays, seed, reset)
    }

    fn replicate_owned(mut self, r: usize, ndays: Time, seed: u64, reset: bool) -> Result<Model> {
        let rep_seed = seed.wrapping_add(r as u64);
        log::debug!("replicate {} running with seed {}", r, rep_seed);
        self.run_with(ndays, rep_seed, reset)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::database::{ReproductiveRow, TotalHistRow};
    use crate::model::Model;
    use crate::models::sir;
    use std::cell::RefCell;

    fn base_model() -> Model {
        let mut model = sir("a virus", 0.01, 0.9, 0.3).unwrap();
        model.seed(112);
        model.agents_smallworld(1000, 5, 0.01, false).unwrap();
        model
    }

    type Capture = Vec<(usize, Vec<TotalHistRow>, Vec<ReproductiveRow>)>;

    fn run_on(nthreads: usize) -> Capture {
        let captured: RefCell<Capture> = RefCell::new(Vec::new());
        let mut model = base_model();
        model
            .run_multiple(
                40,
                4,
                1231,
                Some(|rep: usize, m: &Model| {
                    captured.borrow_mut().push((
                        rep,
                        m.db().hist_total().to_vec(),
                        m.db().reproductive_rows(),
                    ));
                    Ok(())
                }),
                true,
                false,
                nthreads,
            )
            .unwrap();
        captured.into_inner()
    }

    #[test]
    fn replicates_are_thread_count_invariant() {
        let serial = run_on(1);
        let threaded = run_on(2);
        assert_eq!(serial.len(), 4);
        for (a, b) in serial.iter().zip(threaded.iter()) {
            assert_eq!(a.0, b.0);
            assert_eq!(a.1, b.1, "total history differs for replicate {}", a.0);
            assert_eq!(a.2, b.2, "reproductive rows differ for replicate {}", a.0);
        }
    }

    #[test]
    fn replicates_differ_from_each_other() {
        let runs = run_on(1);
        assert_ne!(runs[0].1, runs[1].1);
    }

    #[test]
    fn saver_runs_in_replicate_order() {
        let runs = run_on(2);
        let order: Vec<usize> = runs.iter().map(|r| r.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
