use crate::prelude::{Id, Real, Time};
use crate::virus::Virus;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalHistRow {
    pub date: Time,
    pub state: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirusInfoRow {
    pub virus_id: usize,
    pub name: String,
    pub prevalence: Real,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirusHistRow {
    pub date: Time,
    pub virus_id: usize,
    pub state: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolHistRow {
    pub date: Time,
    pub tool_id: usize,
    pub state: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRow {
    pub date: Time,
    pub from_state: String,
    pub to_state: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmissionRow {
    pub date: Time,
    /// -1 for day-zero seeding.
    pub source: i64,
    pub target: Id,
    pub virus_id: usize,
    /// Day the source was exposed; -1 for seeds.
    pub source_exposure_day: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproductiveRow {
    pub source_exposure_day: i64,
    pub source: i64,
    pub virus_id: usize,
    pub secondary_cases: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRow {
    pub source: Id,
    pub virus_id: usize,
    pub transmission_day: Time,
    pub generation_interval: i64,
}

/// One (date, virus) observation of a running series: active cases,
/// outbreak size or hospitalisations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub date: Time,
    pub virus_id: usize,
    pub count: i64,
}

#[derive(Debug, Clone, Default)]
struct VirusMeta {
    name: String,
    prevalence: Real,
    parent: i64,
    origin_day: Time,
}

/// Per-day counts and transition statistics for one simulation run.
/// Daily scratch counters are folded into the history once per step;
/// everything here is reset between replicates.
#[derive(Clone, Default)]
pub struct Database {
    state_labels: Vec<String>,
    hosp_state: Vec<bool>,
    virus_meta: Vec<VirusMeta>,
    tool_names: Vec<String>,
    nagents: usize,
    today: Time,

    today_total: Vec<i64>,
    today_virus: Vec<i64>,
    today_tool: Vec<i64>,
    today_transition: Vec<u32>,
    today_hosp: Vec<i64>,
    changed_today: Vec<bool>,
    outbreak: Vec<i64>,

    hist_total: Vec<TotalHistRow>,
    hist_virus: Vec<VirusHistRow>,
    hist_tool: Vec<ToolHistRow>,
    hist_transition: Vec<TransitionRow>,
    transmissions: Vec<TransmissionRow>,
    hist_active: Vec<SeriesRow>,
    hist_outbreak: Vec<SeriesRow>,
    hist_hosp: Vec<SeriesRow>,

    /// Secondary-case counters keyed by (virus, source exposure day,
    /// source id). Ordered so that extraction is deterministic.
    rt: BTreeMap<(usize, i64, i64), u32>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipe history and size the scratch counters for a fresh run.
    /// States whose label contains "ospitalized" feed the
    /// hospitalisation series.
    pub fn prepare(
        &mut self,
        state_labels: Vec<String>,
        viruses: Vec<(String, Real)>,
        tool_names: Vec<String>,
        nagents: usize,
    ) {
        let nstates = state_labels.len();
        let nviruses = viruses.len();
        let ntools = tool_names.len();

        self.hosp_state = state_labels.iter().map(|l| l.contains("ospitalized")).collect();
        self.state_labels = state_labels;
        self.virus_meta = viruses
            .into_iter()
            .map(|(name, prevalence)| VirusMeta {
                name,
                prevalence,
                parent: -1,
                origin_day: 0,
            })
            .collect();
        self.tool_names = tool_names;
        self.nagents = nagents;
        self.today = 0;

        self.today_total = vec![0; nstates];
        self.today_virus = vec![0; nviruses * nstates];
        self.today_tool = vec![0; ntools * nstates];
        self.today_transition = vec![0; nstates * nstates];
        self.today_hosp = vec![0; nviruses];
        self.changed_today = vec![false; nagents];
        self.outbreak = vec![0; nviruses];

        self.hist_total.clear();
        self.hist_virus.clear();
        self.hist_tool.clear();
        self.hist_transition.clear();
        self.transmissions.clear();
        self.hist_active.clear();
        self.hist_outbreak.clear();
        self.hist_hosp.clear();
        self.rt.clear();
    }

    pub fn set_today(&mut self, day: Time) {
        self.today = day;
    }

    pub fn today(&self) -> Time {
        self.today
    }

    pub fn n_states(&self) -> usize {
        self.state_labels.len()
    }

    pub fn n_viruses(&self) -> usize {
        self.virus_meta.len()
    }

    pub fn n_tools(&self) -> usize {
        self.tool_names.len()
    }

    /// Seed the per-state counters from the initial agent states.
    pub fn count_initial(&mut self, states: &[usize]) {
        for &s in states {
            self.today_total[s] += 1;
        }
    }

    pub fn attach_virus(&mut self, virus: usize, state: usize) {
        let cell = virus * self.n_states() + state;
        self.today_virus[cell] += 1;
    }

    pub fn detach_virus(&mut self, virus: usize, state: usize) {
        let cell = virus * self.n_states() + state;
        self.today_virus[cell] -= 1;
        debug_assert!(self.today_virus[cell] >= 0);
    }

    pub fn attach_tool(&mut self, tool: usize, state: usize) {
        let cell = tool * self.n_states() + state;
        self.today_tool[cell] += 1;
    }

    pub fn detach_tool(&mut self, tool: usize, state: usize) {
        let cell = tool * self.n_states() + state;
        self.today_tool[cell] -= 1;
        debug_assert!(self.today_tool[cell] >= 0);
    }

    /// One applied state-change event. Self transitions only touch the
    /// transition matrix; everything else moves the per-state counters of
    /// the agent's attachments along.
    pub fn record_transition(
        &mut self,
        agent: Id,
        from: usize,
        to: usize,
        virus: Option<usize>,
        tools: &[usize],
    ) {
        let n = self.n_states();
        self.today_transition[from * n + to] += 1;
        self.changed_today[agent] = true;
        if from == to {
            return;
        }

        self.today_total[from] -= 1;
        self.today_total[to] += 1;
        debug_assert!(self.today_total[from] >= 0);

        if let Some(v) = virus {
            self.today_virus[v * n + from] -= 1;
            self.today_virus[v * n + to] += 1;
            if self.hosp_state[to] && !self.hosp_state[from] {
                self.today_hosp[v] += 1;
            }
        }
        for &t in tools {
            self.today_tool[t * n + from] -= 1;
            self.today_tool[t * n + to] += 1;
        }
    }

    pub fn record_transmission(
        &mut self,
        source: Option<Id>,
        target: Id,
        virus: usize,
        source_exposure_day: Option<Time>,
    ) {
        let src = source.map(|s| s as i64).unwrap_or(-1);
        let exp = source_exposure_day.map(|d| d as i64).unwrap_or(-1);
        self.transmissions.push(TransmissionRow {
            date: self.today,
            source: src,
            target,
            virus_id: virus,
            source_exposure_day: exp,
        });
        self.outbreak[virus] += 1;

        // The target starts its own secondary-case ledger; the source,
        // if any, gets one more.
        self.rt
            .entry((virus, self.today as i64, target as i64))
            .or_insert(0);
        if src >= 0 {
            *self.rt.entry((virus, exp, src)).or_insert(0) += 1;
        }
    }

    /// A mutated virus becomes a new variant: fresh id, counters moved
    /// from the parent at the host's current state.
    pub fn register_variant(&mut self, virus: &mut Virus, host_state: usize) {
        let n = self.n_states();
        let parent = virus.id();
        let new_id = self.virus_meta.len();
        self.virus_meta.push(VirusMeta {
            name: virus.name().clone(),
            prevalence: 0.0,
            parent: parent as i64,
            origin_day: self.today,
        });
        self.today_virus.extend(std::iter::repeat(0).take(n));
        self.today_hosp.push(0);
        self.outbreak.push(1);

        self.today_virus[parent * n + host_state] -= 1;
        self.today_virus[new_id * n + host_state] += 1;
        virus.set_id(new_id);
    }

    /// Close the day: record a "stayed" transition for every agent
    /// without a state-change event, fold the scratch counters into the
    /// history, and clear them for the next step.
    pub fn record_day(&mut self, agent_states: &[usize]) {
        let n = self.n_states();
        for (agent, &s) in agent_states.iter().enumerate() {
            if !self.changed_today[agent] {
                self.today_transition[s * n + s] += 1;
            }
        }

        debug_assert_eq!(
            self.today_total.iter().sum::<i64>(),
            self.nagents as i64,
            "state counts must add up to the population size"
        );

        for (s, &count) in self.today_total.iter().enumerate() {
            self.hist_total.push(TotalHistRow {
                date: self.today,
                state: self.state_labels[s].clone(),
                count,
            });
        }
        for v in 0..self.n_viruses() {
            let mut active = 0;
            for s in 0..n {
                let count = self.today_virus[v * n + s];
                active += count;
                self.hist_virus.push(VirusHistRow {
                    date: self.today,
                    virus_id: v,
                    state: self.state_labels[s].clone(),
                    count,
                });
            }
            self.hist_active.push(SeriesRow {
                date: self.today,
                virus_id: v,
                count: active,
            });
            self.hist_outbreak.push(SeriesRow {
                date: self.today,
                virus_id: v,
                count: self.outbreak[v],
            });
            self.hist_hosp.push(SeriesRow {
                date: self.today,
                virus_id: v,
                count: self.today_hosp[v],
            });
        }
        for t in 0..self.n_tools() {
            for s in 0..n {
                self.hist_tool.push(ToolHistRow {
                    date: self.today,
                    tool_id: t,
                    state: self.state_labels[s].clone(),
                    count: self.today_tool[t * n + s],
                });
            }
        }
        for from in 0..n {
            for to in 0..n {
                self.hist_transition.push(TransitionRow {
                    date: self.today,
                    from_state: self.state_labels[from].clone(),
                    to_state: self.state_labels[to].clone(),
                    count: self.today_transition[from * n + to],
                });
            }
        }

        for c in self.today_transition.iter_mut() {
            *c = 0;
        }
        for c in self.today_hosp.iter_mut() {
            *c = 0;
        }
        for c in self.changed_today.iter_mut() {
            *c = false;
        }
    }

    pub fn hist_total(&self) -> &[TotalHistRow] {
        &self.hist_total
    }

    /// Per-day counts of one state, in day order.
    pub fn hist_total_of(&self, state: usize) -> Vec<i64> {
        self.hist_total
            .iter()
            .filter(|r| r.state == self.state_labels[state])
            .map(|r| r.count)
            .collect()
    }

    pub fn hist_virus(&self) -> &[VirusHistRow] {
        &self.hist_virus
    }

    pub fn hist_tool(&self) -> &[ToolHistRow] {
        &self.hist_tool
    }

    pub fn hist_transition(&self) -> &[TransitionRow] {
        &self.hist_transition
    }

    pub fn transmissions(&self) -> &[TransmissionRow] {
        &self.transmissions
    }

    pub fn active_cases(&self) -> &[SeriesRow] {
        &self.hist_active
    }

    pub fn outbreak_sizes(&self) -> &[SeriesRow] {
        &self.hist_outbreak
    }

    pub fn hospitalizations(&self) -> &[SeriesRow] {
        &self.hist_hosp
    }

    pub fn virus_info(&self) -> Vec<VirusInfoRow> {
        self.virus_meta
            .iter()
            .enumerate()
            .map(|(id, m)| VirusInfoRow {
                virus_id: id,
                name: m.name.clone(),
                prevalence: m.prevalence,
            })
            .collect()
    }

    pub fn reproductive_rows(&self) -> Vec<ReproductiveRow> {
        self.rt
            .iter()
            .map(|(&(virus, exposure, source), &secondary)| ReproductiveRow {
                source_exposure_day: exposure,
                source,
                virus_id: virus,
                secondary_cases: secondary,
            })
            .collect()
    }

    pub fn generation_rows(&self) -> Vec<GenerationRow> {
        self.transmissions
            .iter()
            .filter(|t| t.source >= 0)
            .map(|t| GenerationRow {
                source: t.source as Id,
                virus_id: t.virus_id,
                transmission_day: t.date,
                generation_interval: t.date as i64 - t.source_exposure_day,
            })
            .collect()
    }

    /// Empirical transition probabilities pooled over the whole run,
    /// row-major with rows normalised to one (all-zero rows are left as
    /// zeros).
    pub fn transition_probability(&self) -> Vec<Real> {
        let n = self.n_states();
        let mut counts = vec![0u64; n * n];
        for r in &self.hist_transition {
            let from = self.state_index(&r.from_state);
            let to = self.state_index(&r.to_state);
            counts[from * n + to] += r.count as u64;
        }
        let mut out = vec![0.0; n * n];
        for from in 0..n {
            let row: u64 = (0..n).map(|to| counts[from * n + to]).sum();
            if row == 0 {
                continue;
            }
            for to in 0..n {
                out[from * n + to] = counts[from * n + to] as Real / row as Real;
            }
        }
        out
    }

    fn state_index(&self, label: &str) -> usize {
        self.state_labels
            .iter()
            .position(|l| l == label)
            .expect("state label recorded in history")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db3() -> Database {
        let mut db = Database::new();
        db.prepare(
            vec!["Susceptible".into(), "Infected".into(), "Recovered".into()],
            vec![("flu".into(), 0.1)],
            vec![],
            4,
        );
        db.count_initial(&[0, 0, 0, 0]);
        db
    }

    #[test]
    fn counts_follow_transitions() {
        let mut db = db3();
        db.attach_virus(0, 0);
        db.record_transmission(None, 1, 0, None);
        db.record_transition(1, 0, 1, Some(0), &[]);
        db.record_day(&[0, 1, 0, 0]);

        assert_eq!(db.hist_total_of(0), vec![3]);
        assert_eq!(db.hist_total_of(1), vec![1]);
        // Three stayed, one moved.
        let moves: u32 = db
            .hist_transition()
            .iter()
            .filter(|r| r.from_state != r.to_state)
            .map(|r| r.count)
            .sum();
        assert_eq!(moves, 1);
        assert_eq!(db.active_cases()[0].count, 1);
        assert_eq!(db.outbreak_sizes()[0].count, 1);
    }

    #[test]
    fn multiple_transitions_in_one_day_all_count() {
        let mut db = db3();
        db.record_transition(0, 0, 1, None, &[]);
        db.record_transition(0, 1, 2, None, &[]);
        db.record_day(&[2, 0, 0, 0]);

        let cell = |from: &str, to: &str| {
            db.hist_transition()
                .iter()
                .find(|r| r.from_state == from && r.to_state == to)
                .map(|r| r.count)
                .unwrap()
        };
        assert_eq!(cell("Susceptible", "Infected"), 1);
        assert_eq!(cell("Infected", "Recovered"), 1);
        // The agent changed state, so it contributes no diagonal entry.
        assert_eq!(cell("Recovered", "Recovered"), 0);
        assert_eq!(cell("Susceptible", "Susceptible"), 3);
    }

    #[test]
    fn reproductive_ledger_tracks_secondary_cases() {
        let mut db = db3();
        db.record_transmission(None, 0, 0, None);
        db.set_today(1);
        db.record_transmission(Some(0), 1, 0, Some(0));
        db.record_transmission(Some(0), 2, 0, Some(0));

        let rows = db.reproductive_rows();
        let source0 = rows.iter().find(|r| r.source == 0).unwrap();
        assert_eq!(source0.secondary_cases, 2);
        assert_eq!(source0.source_exposure_day, 0);
        assert_eq!(rows.iter().filter(|r| r.secondary_cases == 0).count(), 2);

        let gen = db.generation_rows();
        assert_eq!(gen.len(), 2);
        assert!(gen.iter().all(|g| g.generation_interval == 1));
    }
}
