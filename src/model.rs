use crate::agent::Agent;
use crate::database::Database;
use crate::entity::{Entity, EntityDistFun};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::globals::{GlobalEvent, GlobalFun};
use crate::graph::AdjList;
use crate::mixing::Mixing;
use crate::prelude::{Id, Real, Time};
use crate::queue::Queue;
use crate::rng::EpiRng;
use crate::tool::Tool;
use crate::virus::Virus;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

/// Per-state update hook, invoked once per day for every agent in the
/// active set whose current state carries one. Effects must go through
/// the event bus.
pub type UpdateFun = Arc<dyn Fn(Id, &mut Model) + Send + Sync>;

/// How many agents receive a virus or tool at day zero.
#[derive(Debug, Clone, Copy)]
pub enum Prevalence {
    /// Each agent draws independently with this probability.
    Proportion(Real),
    /// Exactly this many distinct agents.
    Count(usize),
}

impl Prevalence {
    fn as_real(&self) -> Real {
        match self {
            Prevalence::Proportion(p) => *p,
            Prevalence::Count(k) => *k as Real,
        }
    }

    fn validate(&self, what: &str) -> Result<()> {
        if let Prevalence::Proportion(p) = self {
            if !(0.0..=1.0).contains(p) {
                return Err(Error::InvalidArgument(format!(
                    "{} prevalence {} outside [0, 1]",
                    what, p
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
struct State {
    label: String,
    update: Option<UpdateFun>,
}

#[derive(Clone)]
struct Snapshot {
    agents: Vec<Agent>,
    entities: Vec<Entity>,
}

/// Composition root: owns the population, the pathogen and tool
/// registries, the state table, the event bus, the statistics database
/// and the random engine. Reference integrity between all of them is by
/// integer id, so a plain `clone()` yields the independent deep copy the
/// replicate driver needs.
#[derive(Clone)]
pub struct Model {
    name: String,
    pub(crate) agents: Vec<Agent>,
    snapshot: Option<Snapshot>,
    states: Vec<State>,

    param_values: Vec<Real>,
    param_names: Vec<String>,
    param_lookup: HashMap<String, usize>,

    viruses: Vec<Virus>,
    virus_dist: Vec<Prevalence>,
    tools: Vec<Tool>,
    tool_dist: Vec<Prevalence>,
    pub(crate) entities: Vec<Entity>,
    entity_dist: Vec<Option<EntityDistFun>>,

    db: Database,
    events: EventBus,
    queue: Queue,
    use_queue: bool,
    globals: Vec<GlobalEvent>,
    initial_fun: Option<GlobalFun>,
    mixing: Option<Mixing>,

    rng: EpiRng,
    directed: bool,
    current_day: Time,
    ndays: Time,
    verbose: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Model {
            name: String::new(),
            agents: Vec::new(),
            snapshot: None,
            states: Vec::new(),
            param_values: Vec::new(),
            param_names: Vec::new(),
            param_lookup: HashMap::new(),
            viruses: Vec::new(),
            virus_dist: Vec::new(),
            tools: Vec::new(),
            tool_dist: Vec::new(),
            entities: Vec::new(),
            entity_dist: Vec::new(),
            db: Database::new(),
            events: EventBus::new(),
            queue: Queue::default(),
            use_queue: true,
            globals: Vec::new(),
            initial_fun: None,
            mixing: None,
            rng: EpiRng::seeded(0),
            directed: false,
            current_day: 0,
            ndays: 0,
            verbose: false,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verbose_on(&mut self) -> &mut Self {
        self.verbose = true;
        self
    }

    pub fn verbose_off(&mut self) -> &mut Self {
        self.verbose = false;
        self
    }

    /// Reseed the engine used during population construction. `run`
    /// reseeds again for the simulation itself.
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.rng.reseed(seed);
        self
    }

    // ------------------------------------------------------------------
    // State table and parameters
    // ------------------------------------------------------------------

    pub fn add_state(&mut self, label: impl Into<String>, update: Option<UpdateFun>) -> usize {
        self.states.push(State {
            label: label.into(),
            update,
        });
        self.states.len() - 1
    }

    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    pub fn state_label(&self, state: usize) -> Result<&str> {
        self.states
            .get(state)
            .map(|s| s.label.as_str())
            .ok_or_else(|| Error::OutOfRange(format!("state {} not in the state table", state)))
    }

    /// Register a named parameter cell and return its stable index.
    /// Duplicate names are rejected; use `set_param` to overwrite.
    pub fn add_param(&mut self, value: Real, name: impl Into<String>) -> Result<usize> {
        let name = name.into();
        if self.param_lookup.contains_key(&name) {
            return Err(Error::InvalidArgument(format!(
                "parameter '{}' already exists",
                name
            )));
        }
        let ix = self.param_values.len();
        self.param_values.push(value);
        self.param_lookup.insert(name.clone(), ix);
        self.param_names.push(name);
        Ok(ix)
    }

    pub fn param_index(&self, name: &str) -> Result<usize> {
        self.param_lookup
            .get(name)
            .copied()
            .ok_or_else(|| Error::OutOfRange(format!("no parameter named '{}'", name)))
    }

    pub fn param(&self, name: &str) -> Result<Real> {
        Ok(self.param_values[self.param_index(name)?])
    }

    pub fn param_mut(&mut self, name: &str) -> Result<&mut Real> {
        let ix = self.param_index(name)?;
        Ok(&mut self.param_values[ix])
    }

    pub fn set_param(&mut self, name: &str, value: Real) -> Result<()> {
        *self.param_mut(name)? = value;
        Ok(())
    }

    /// Value at a stable parameter index, used by probability hooks.
    pub fn param_at(&self, ix: usize) -> Real {
        debug_assert!(ix < self.param_values.len());
        self.param_values[ix]
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    pub fn add_virus(&mut self, mut virus: Virus, prevalence: Prevalence) -> Result<()> {
        prevalence.validate("virus")?;
        virus.set_id(self.viruses.len());
        self.viruses.push(virus);
        self.virus_dist.push(prevalence);
        Ok(())
    }

    /// Register a tool template; returns its id.
    pub fn add_tool(&mut self, mut tool: Tool, prevalence: Prevalence) -> Result<usize> {
        prevalence.validate("tool")?;
        let id = self.tools.len();
        tool.set_id(id);
        self.tools.push(tool);
        self.tool_dist.push(prevalence);
        Ok(id)
    }

    pub fn add_entity(&mut self, entity: Entity) -> usize {
        self.add_entity_with_dist(entity, None)
    }

    pub fn add_entity_with(&mut self, entity: Entity, dist: EntityDistFun) -> usize {
        self.add_entity_with_dist(entity, Some(dist))
    }

    fn add_entity_with_dist(&mut self, mut entity: Entity, dist: Option<EntityDistFun>) -> usize {
        let id = self.entities.len();
        entity.set_id(id);
        self.entities.push(entity);
        self.entity_dist.push(dist);
        id
    }

    pub fn viruses(&self) -> &[Virus] {
        &self.viruses
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: Id) -> &Entity {
        &self.entities[id]
    }

    /// Symmetric membership: the agent lists the entity and vice versa.
    pub fn assign_entity(&mut self, agent: Id, entity: Id) {
        if !self.agents[agent].entities.contains(&entity) {
            self.agents[agent].entities.push(entity);
            self.entities[entity].members.push(agent);
        }
    }

    pub fn withdraw_entity(&mut self, agent: Id, entity: Id) {
        if let Some(pos) = self.agents[agent].entities.iter().position(|&e| e == entity) {
            self.agents[agent].entities.remove(pos);
        }
        if let Some(pos) = self.entities[entity].members.iter().position(|&a| a == agent) {
            self.entities[entity].members.remove(pos);
        }
    }

    pub fn add_global_event(&mut self, event: GlobalEvent) -> &mut Self {
        self.globals.push(event);
        self
    }

    /// Hook run once after day-zero seeding, e.g. to move a share of the
    /// population into a recovered state.
    pub fn set_initial_fun(&mut self, fun: GlobalFun) -> &mut Self {
        self.initial_fun = Some(fun);
        self
    }

    pub fn set_mixing(&mut self, mixing: Mixing) -> &mut Self {
        self.mixing = Some(mixing);
        self
    }

    pub(crate) fn take_mixing(&mut self) -> Option<Mixing> {
        self.mixing.take()
    }

    pub(crate) fn restore_mixing(&mut self, mixing: Mixing) {
        self.mixing = Some(mixing);
    }

    pub fn queuing_off(&mut self) -> &mut Self {
        self.use_queue = false;
        self
    }

    pub fn queuing_on(&mut self) -> &mut Self {
        self.use_queue = true;
        self
    }

    pub fn is_queuing(&self) -> bool {
        self.use_queue
    }

    // ------------------------------------------------------------------
    // Population constructors
    // ------------------------------------------------------------------

    pub fn agents_empty_graph(&mut self, n: usize) -> &mut Self {
        self.agents = (0..n).map(Agent::new).collect();
        self.snapshot = None;
        self
    }

    pub fn agents_from_adjlist(&mut self, al: AdjList) -> &mut Self {
        let n = al.vcount();
        self.directed = al.is_directed();
        self.agents = (0..n).map(Agent::new).collect();
        for i in 0..n {
            for &nb in al.neighbors(i) {
                self.agents[i].add_neighbor(nb);
            }
        }
        self.snapshot = None;
        self
    }

    pub fn agents_from_edgelist(
        &mut self,
        n: usize,
        edges: &[(Id, Id)],
        directed: bool,
    ) -> Result<&mut Self> {
        let al = AdjList::from_edgelist(n, edges, directed)?;
        Ok(self.agents_from_adjlist(al))
    }

    /// Watts-Strogatz population of size n with k ties per agent and
    /// rewiring probability p.
    pub fn agents_smallworld(
        &mut self,
        n: usize,
        k: usize,
        p: Real,
        directed: bool,
    ) -> Result<&mut Self> {
        let al = AdjList::smallworld(n, k, p, directed, &mut self.rng)?;
        Ok(self.agents_from_adjlist(al))
    }

    // ------------------------------------------------------------------
    // Accessors used by kernels
    // ------------------------------------------------------------------

    pub fn size(&self) -> usize {
        self.agents.len()
    }

    pub fn today(&self) -> Time {
        self.current_day
    }

    pub fn ndays(&self) -> Time {
        self.ndays
    }

    pub fn agent(&self, id: Id) -> &Agent {
        &self.agents[id]
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn runif(&mut self) -> Real {
        self.rng.runif()
    }

    pub fn rng_mut(&mut self) -> &mut EpiRng {
        &mut self.rng
    }

    pub fn queue_event(&mut self, event: Event) {
        self.events.push(event);
    }

    // ------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------

    /// Run for `ndays` steps after resetting to the initial snapshot and
    /// reseeding with `seed`. Deterministic: one seed, one trajectory.
    pub fn run(&mut self, ndays: Time, seed: u64) -> Result<&mut Self> {
        self.run_with(ndays, seed, true)
    }

    pub(crate) fn run_with(&mut self, ndays: Time, seed: u64, reset: bool) -> Result<&mut Self> {
        let started = Instant::now();
        self.prepare(ndays, seed, reset)?;
        while self.current_day < self.ndays {
            self.step()?;
        }
        if self.verbose {
            log::info!(
                "{}: {} agents, {} days done in {:.2?}",
                if self.name.is_empty() { "model" } else { self.name.as_str() },
                self.size(),
                self.ndays,
                started.elapsed()
            );
        }
        Ok(self)
    }

    /// Restore the initial snapshot, reseed and redistribute viruses and
    /// tools; leaves the model at day zero with its statistics recorded.
    pub fn reset(&mut self, seed: u64) -> Result<()> {
        let ndays = self.ndays;
        self.prepare(ndays, seed, true)
    }

    fn prepare(&mut self, ndays: Time, seed: u64, reset: bool) -> Result<()> {
        if self.states.is_empty() {
            return Err(Error::InvalidState(
                "no states defined; add_state before running".into(),
            ));
        }
        if self.agents.is_empty() {
            return Err(Error::InvalidState(
                "population not constructed; build agents before running".into(),
            ));
        }

        let nstates = self.n_states();
        let nparams = self.param_values.len();
        for virus in &self.viruses {
            virus.validate(nstates, nparams)?;
        }
        for tool in &self.tools {
            tool.validate(nparams)?;
        }

        // Companion tools delivering post-recovery immunity; registered
        // once, then stable across replicates.
        for v in 0..self.viruses.len() {
            if let (Some(level), None) =
                (self.viruses[v].post_immunity(), self.viruses[v].immunity_tool())
            {
                let mut tool = Tool::new(format!("Post-immunity ({})", self.viruses[v].name()));
                tool.set_susceptibility_reduction(level);
                let id = self.add_tool(tool, Prevalence::Count(0))?;
                self.viruses[v].set_immunity_tool(id);
            }
        }

        match &self.snapshot {
            None => {
                self.snapshot = Some(Snapshot {
                    agents: self.agents.clone(),
                    entities: self.entities.clone(),
                });
            }
            Some(snap) if reset => {
                self.agents = snap.agents.clone();
                self.entities = snap.entities.clone();
            }
            Some(_) => {}
        }

        self.rng.reseed(seed);
        self.ndays = ndays;
        self.current_day = 0;
        self.events.clear();
        self.queue.reset(self.size());

        // Entity membership, when driven by distribution functions.
        for e in 0..self.entities.len() {
            if self.entities[e].members().is_empty() {
                if let Some(dist) = self.entity_dist[e].clone() {
                    (*dist)(e, self);
                }
            }
        }

        if let Some(mix) = &self.mixing {
            mix.validate(self.entities.len(), self.size(), nstates)?;
        }

        self.db.prepare(
            self.states.iter().map(|s| s.label.clone()).collect(),
            self.viruses
                .iter()
                .zip(self.virus_dist.iter())
                .map(|(v, d)| (v.name().clone(), d.as_real()))
                .collect(),
            self.tools.iter().map(|t| t.name().clone()).collect(),
            self.size(),
        );
        self.db.set_today(0);
        let states: Vec<usize> = self.agents.iter().map(|a| a.state()).collect();
        self.db.count_initial(&states);

        // Without a reset, agents may still carry attachments from the
        // previous run; the fresh counters must see them.
        for id in 0..self.agents.len() {
            let state = self.agents[id].state();
            if let Some(v) = self.agents[id].virus().map(|v| v.id()) {
                self.db.attach_virus(v, state);
                let (agents, queue) = (&self.agents, &mut self.queue);
                queue.activate(id, &agents[id].neighbors);
            }
            let tool_ids: Vec<usize> = self.agents[id].tools.iter().map(|t| t.id()).collect();
            for t in tool_ids {
                self.db.attach_tool(t, state);
            }
        }

        self.distribute_viruses()?;
        self.distribute_tools()?;
        self.flush_events()?;

        if let Some(fun) = self.initial_fun.clone() {
            (*fun)(self);
            self.flush_events()?;
        }

        self.record_stats();
        Ok(())
    }

    fn distribute_viruses(&mut self) -> Result<()> {
        // Queued seeds are not visible through the agents yet, so track
        // targets locally; an agent holds at most one virus.
        let mut seeded = vec![false; self.size()];
        for v in 0..self.viruses.len() {
            let template = self.viruses[v].clone();
            match self.virus_dist[v] {
                Prevalence::Proportion(p) => {
                    for agent in 0..self.size() {
                        if seeded[agent] || self.agents[agent].has_virus() {
                            continue;
                        }
                        if self.rng.runif() < p {
                            seeded[agent] = true;
                            self.events.push(Event::AddVirus {
                                agent,
                                virus: template.clone(),
                                state: template.state_init(),
                                source: None,
                            });
                        }
                    }
                }
                Prevalence::Count(k) => {
                    if k > self.size() {
                        return Err(Error::InvalidArgument(format!(
                            "cannot seed {} agents with virus '{}' in a population of {}",
                            k,
                            template.name(),
                            self.size()
                        )));
                    }
                    let mut chosen: Vec<Id> = Vec::with_capacity(k);
                    while chosen.len() < k {
                        let agent = self.rng.unif_index(self.size());
                        if chosen.contains(&agent) || seeded[agent] || self.agents[agent].has_virus()
                        {
                            continue;
                        }
                        chosen.push(agent);
                        seeded[agent] = true;
                        self.events.push(Event::AddVirus {
                            agent,
                            virus: template.clone(),
                            state: template.state_init(),
                            source: None,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn distribute_tools(&mut self) -> Result<()> {
        for t in 0..self.tools.len() {
            let template = self.tools[t].clone();
            match self.tool_dist[t] {
                Prevalence::Proportion(p) => {
                    for agent in 0..self.size() {
                        if self.agents[agent].has_tool(template.id()) {
                            continue;
                        }
                        if self.rng.runif() < p {
                            self.events.push(Event::AddTool {
                                agent,
                                tool: template.clone(),
                                state: None,
                            });
                        }
                    }
                }
                Prevalence::Count(k) => {
                    if k > self.size() {
                        return Err(Error::InvalidArgument(format!(
                            "cannot hand tool '{}' to {} agents in a population of {}",
                            template.name(),
                            k,
                            self.size()
                        )));
                    }
                    let mut chosen: Vec<Id> = Vec::with_capacity(k);
                    while chosen.len() < k {
                        let agent = self.rng.unif_index(self.size());
                        if chosen.contains(&agent) || self.agents[agent].has_tool(template.id()) {
                            continue;
                        }
                        chosen.push(agent);
                        self.events.push(Event::AddTool {
                            agent,
                            tool: template.clone(),
                            state: None,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.current_day += 1;
        self.db.set_today(self.current_day);

        if let Some(mut mix) = self.mixing.take() {
            mix.rebuild_index(&self.agents, &self.entities);
            self.mixing = Some(mix);
        }

        self.update_states();
        self.flush_events()?;
        self.mutate_viruses();
        self.run_global_events();
        self.flush_events()?;
        self.record_stats();

        log::debug!(
            "day {}: {} transmissions so far, {} active agents",
            self.current_day,
            self.db.transmissions().len(),
            self.queue.n_active()
        );
        Ok(())
    }

    fn update_states(&mut self) {
        let n = self.size();
        for id in 0..n {
            if self.use_queue && !self.queue.is_active(id) {
                continue;
            }
            let state = self.agents[id].state();
            let fun = match &self.states[state].update {
                Some(f) => f.clone(),
                None => continue,
            };
            (*fun)(id, self);
        }
    }

    fn run_global_events(&mut self) {
        let day = self.current_day;
        let due: Vec<GlobalEvent> = self
            .globals
            .iter()
            .filter(|e| e.matches(day))
            .cloned()
            .collect();
        for event in due {
            log::debug!("day {}: global event '{}'", day, event.name());
            event.run(self);
        }
    }

    fn mutate_viruses(&mut self) {
        for id in 0..self.size() {
            let has_mutation = self
                .agents[id]
                .virus()
                .map(|v| v.mutation().is_some())
                .unwrap_or(false);
            if !has_mutation {
                continue;
            }
            if let Some(mut virus) = self.agents[id].virus.take() {
                let fun = virus.mutation().cloned();
                let mutated = match fun {
                    Some(f) => (*f)(&mut virus, &mut self.rng),
                    None => false,
                };
                if mutated {
                    let state = self.agents[id].state();
                    self.db.register_variant(&mut virus, state);
                }
                self.agents[id].virus = Some(virus);
            }
        }
    }

    pub(crate) fn flush_events(&mut self) -> Result<()> {
        while let Some(event) = self.events.pop() {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::SetState { agent, state } => {
                self.check_agent(agent)?;
                self.check_state(state)?;
                self.change_state(agent, state);
            }
            Event::AddVirus {
                agent,
                mut virus,
                state,
                source,
            } => {
                self.check_agent(agent)?;
                self.check_state(state)?;
                if self.agents[agent].has_virus() {
                    return Err(Error::InvalidState(format!(
                        "agent {} already carries an active virus",
                        agent
                    )));
                }
                let current = self.agents[agent].state();
                let source_exposure = match source {
                    Some(_) => virus.date_exposed(),
                    None => None,
                };
                virus.set_agent(agent, self.current_day);
                self.db.attach_virus(virus.id(), current);
                self.db
                    .record_transmission(source, agent, virus.id(), source_exposure);
                self.queue.activate(agent, &self.agents[agent].neighbors);
                self.agents[agent].virus = Some(virus);
                self.change_state(agent, state);
            }
            Event::RmVirus {
                agent,
                state,
                immunity,
            } => {
                self.check_agent(agent)?;
                self.check_state(state)?;
                let virus = match self.agents[agent].virus.take() {
                    Some(v) => v,
                    None => return Ok(()),
                };
                let current = self.agents[agent].state();
                self.db.detach_virus(virus.id(), current);
                self.queue.deactivate(agent, &self.agents[agent].neighbors);
                if immunity {
                    if let Some(tool_id) = virus.immunity_tool() {
                        let tool = self.tools[tool_id].clone();
                        self.attach_tool(agent, tool);
                    }
                }
                self.change_state(agent, state);
            }
            Event::AddTool { agent, tool, state } => {
                self.check_agent(agent)?;
                self.attach_tool(agent, tool);
                if let Some(s) = state {
                    self.check_state(s)?;
                    self.change_state(agent, s);
                }
            }
            Event::RmTool { agent, tool, state } => {
                self.check_agent(agent)?;
                let pos = self.agents[agent].tools.iter().position(|t| t.id() == tool);
                if let Some(pos) = pos {
                    let removed = self.agents[agent].tools.remove(pos);
                    let current = self.agents[agent].state();
                    self.db.detach_tool(removed.id(), current);
                }
                if let Some(s) = state {
                    self.check_state(s)?;
                    self.change_state(agent, s);
                }
            }
            Event::AddEntity { agent, entity } => {
                self.check_agent(agent)?;
                self.check_entity(entity)?;
                self.assign_entity(agent, entity);
            }
            Event::RmEntity { agent, entity } => {
                self.check_agent(agent)?;
                self.check_entity(entity)?;
                self.withdraw_entity(agent, entity);
            }
        }
        Ok(())
    }

    fn attach_tool(&mut self, agent: Id, mut tool: Tool) {
        tool.set_agent(agent);
        let current = self.agents[agent].state();
        self.db.attach_tool(tool.id(), current);
        self.agents[agent].tools.push(tool);
    }

    fn change_state(&mut self, agent: Id, state: usize) {
        let from = self.agents[agent].state();
        let virus = self.agents[agent].virus().map(|v| v.id());
        let tool_ids: Vec<usize> = self.agents[agent].tools.iter().map(|t| t.id()).collect();
        self.db
            .record_transition(agent, from, state, virus, &tool_ids);
        self.agents[agent].set_state(state);
    }

    fn record_stats(&mut self) {
        let states: Vec<usize> = self.agents.iter().map(|a| a.state()).collect();
        self.db.record_day(&states);
    }

    fn check_agent(&self, agent: Id) -> Result<()> {
        if agent >= self.size() {
            return Err(Error::OutOfRange(format!(
                "agent {} not in the population of {}",
                agent,
                self.size()
            )));
        }
        Ok(())
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state >= self.n_states() {
            return Err(Error::OutOfRange(format!(
                "state {} not in the state table ({} states)",
                state,
                self.n_states()
            )));
        }
        Ok(())
    }

    fn check_entity(&self, entity: Id) -> Result<()> {
        if entity >= self.entities.len() {
            return Err(Error::OutOfRange(format!(
                "entity {} not registered ({} entities)",
                entity,
                self.entities.len()
            )));
        }
        Ok(())
    }

    /// Dump the contact structure as a "source target" edge list.
    pub fn write_edgelist<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "source target")?;
        for agent in &self.agents {
            for &nb in agent.neighbors() {
                if self.directed || agent.id() <= nb {
                    writeln!(out, "{} {}", agent.id(), nb)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::set_param_event;
    use crate::models::sir;
    use crate::updates::{default_update_infected, default_update_susceptible};
    use crate::virus::VirusProb;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn small_sir(n: usize) -> Model {
        let mut model = sir("a virus", 0.02, 0.9, 0.3).unwrap();
        model.seed(112);
        model.agents_smallworld(n, 5, 0.01, false).unwrap();
        model
    }

    #[test]
    fn clone_runs_independently() {
        let base = small_sir(300);
        let mut a = base.clone();
        let mut b = base.clone();
        a.run(30, 5).unwrap();
        b.run(30, 5).unwrap();
        assert_eq!(a.db().hist_total(), b.db().hist_total());

        a.set_param("Recovery rate", 0.99).unwrap();
        assert!((b.param("Recovery rate").unwrap() - 0.3).abs() < 1e-12);

        // The clone's run left the original untouched.
        assert!(base.db().hist_total().is_empty());
    }

    #[test]
    fn parameter_cells_are_stable_and_unique() {
        let mut model = Model::new();
        let ix = model.add_param(0.5, "Rate").unwrap();
        assert!(model.add_param(0.7, "Rate").is_err());
        *model.param_mut("Rate").unwrap() = 0.9;
        assert!((model.param_at(ix) - 0.9).abs() < 1e-12);
        assert!(model.param("Missing").is_err());
    }

    #[test]
    fn run_requires_states_and_population() {
        let mut empty = Model::new();
        assert!(empty.run(10, 1).is_err());

        let mut no_population = sir("a virus", 0.1, 0.5, 0.5).unwrap();
        assert!(no_population.run(10, 1).is_err());
    }

    #[test]
    fn three_states_in_one_day_record_both_transitions() {
        let mut model = Model::new();
        model.add_state("A", None);
        model.add_state("B", None);
        model.add_state("C", None);
        model.agents_empty_graph(1);
        model.add_global_event(GlobalEvent::new(
            "walk",
            1,
            Arc::new(|m: &mut Model| {
                m.queue_event(Event::SetState { agent: 0, state: 1 });
                m.queue_event(Event::SetState { agent: 0, state: 2 });
            }),
        ));
        model.run(1, 1).unwrap();

        let cell = |date: Time, from: &str, to: &str| {
            model
                .db()
                .hist_transition()
                .iter()
                .find(|r| r.date == date && r.from_state == from && r.to_state == to)
                .map(|r| r.count)
                .unwrap()
        };
        assert_eq!(cell(1, "A", "B"), 1);
        assert_eq!(cell(1, "B", "C"), 1);
        assert_eq!(cell(1, "A", "A"), 0);
        assert_eq!(model.agent(0).state(), 2);
    }

    #[test]
    fn global_events_fire_on_schedule() {
        let mut model = Model::new();
        model.add_state("A", None);
        model.agents_empty_graph(1);
        model.add_param(0.0, "Counter").unwrap();
        model.add_param(0.0, "Mark").unwrap();
        model.add_global_event(GlobalEvent::new(
            "count",
            -1,
            Arc::new(|m: &mut Model| {
                let next = m.param("Counter").unwrap() + 1.0;
                m.set_param("Counter", next).unwrap();
            }),
        ));
        model.add_global_event(GlobalEvent::new(
            "mark",
            3,
            Arc::new(|m: &mut Model| {
                let today = m.today() as Real;
                m.set_param("Mark", today).unwrap();
            }),
        ));
        model.run(5, 1).unwrap();

        assert!((model.param("Counter").unwrap() - 5.0).abs() < 1e-12);
        assert!((model.param("Mark").unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zeroing_the_transmission_rate_stops_the_outbreak() {
        let mut model = small_sir(1000);
        model.add_global_event(set_param_event("Transmission rate", 0.0, 10));
        model.run(40, 1231).unwrap();

        assert!(!model.db().transmissions().is_empty());
        for t in model.db().transmissions() {
            assert!(t.date <= 10, "transmission on day {}", t.date);
        }
    }

    #[test]
    fn virus_history_covers_every_day_and_state() {
        let mut model = small_sir(200);
        model.run(10, 3).unwrap();

        let nstates = model.n_states();
        let rows = model.db().hist_virus();
        assert_eq!(rows.len(), 11 * nstates);
        for day in 0..=10u32 {
            for s in 0..nstates {
                let label = model.state_label(s).unwrap();
                assert!(
                    rows.iter().any(|r| r.date == day && r.state == label),
                    "missing ({}, {})",
                    day,
                    label
                );
            }
        }
    }

    #[test]
    fn database_invariants_hold_over_a_run() {
        let mut model = small_sir(2000);
        model.run(14, 1231).unwrap();
        let db = model.db();

        let mut by_day: HashMap<Time, i64> = HashMap::new();
        for row in db.hist_total() {
            *by_day.entry(row.date).or_insert(0) += row.count;
        }
        for (day, total) in by_day {
            assert_eq!(total, 2000, "population leak at day {}", day);
        }

        for row in db.hist_virus() {
            assert!(row.count >= 0);
        }

        // Outbreak size equals all transmissions, seeds included.
        let last_outbreak = db.outbreak_sizes().last().unwrap().count;
        assert_eq!(last_outbreak, db.transmissions().len() as i64);

        // Per day, the virus history adds up to the active cases, and
        // the outbreak equals every agent that left Susceptible.
        for series in db.active_cases() {
            let carried: i64 = db
                .hist_virus()
                .iter()
                .filter(|r| r.date == series.date && r.virus_id == series.virus_id)
                .map(|r| r.count)
                .sum();
            assert_eq!(carried, series.count, "day {}", series.date);
        }
        let ever_infected = db
            .outbreak_sizes()
            .last()
            .unwrap()
            .count;
        let still_susceptible = *db.hist_total_of(0).last().unwrap();
        assert_eq!(ever_infected + still_susceptible, 2000);
    }

    #[test]
    fn entity_membership_stays_symmetric() {
        let mut model = Model::new();
        model.add_state("A", None);
        model.agents_empty_graph(3);
        model.add_entity(Entity::new("left"));
        model.add_entity(Entity::new("right"));
        model.add_global_event(GlobalEvent::new(
            "shuffle",
            1,
            Arc::new(|m: &mut Model| {
                m.queue_event(Event::AddEntity { agent: 0, entity: 0 });
                m.queue_event(Event::AddEntity { agent: 0, entity: 1 });
                m.queue_event(Event::RmEntity { agent: 0, entity: 0 });
            }),
        ));
        model.run(1, 1).unwrap();

        assert_eq!(model.agent(0).entities(), &[1]);
        assert!(model.entity(0).members().is_empty());
        assert_eq!(model.entity(1).members(), &[0]);
    }

    #[test]
    fn recovery_grants_post_immunity() {
        let mut model = Model::new();
        model.add_state("Susceptible", Some(default_update_susceptible()));
        model.add_state("Infected", Some(default_update_infected()));
        model.add_state("Recovered", None);
        let mut virus = Virus::new("pox");
        virus.set_state(1, 2, 2);
        virus.set_prob_infecting(VirusProb::Const(0.0));
        virus.set_prob_recovery(VirusProb::Const(1.0));
        virus.set_post_immunity(0.9);
        model.add_virus(virus, Prevalence::Count(5)).unwrap();
        model.agents_empty_graph(50);
        model.run(2, 8).unwrap();

        let recovered: Vec<&Agent> = model
            .agents()
            .iter()
            .filter(|a| a.state() == 2)
            .collect();
        assert_eq!(recovered.len(), 5);
        for agent in recovered {
            assert_eq!(agent.tools().len(), 1);
            assert!(agent.tools()[0].name().starts_with("Post-immunity"));
        }
        assert!(model
            .db()
            .hist_tool()
            .iter()
            .any(|r| r.state == "Recovered" && r.count == 5));
    }

    #[test]
    fn write_edgelist_lists_every_edge() {
        let mut model = Model::new();
        model.add_state("A", None);
        model
            .agents_from_edgelist(4, &[(0, 1), (1, 2), (2, 3)], false)
            .unwrap();
        let mut out = Vec::new();
        model.write_edgelist(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("source target"));
    }
}
