use crate::prelude::Id;

/// Active-set counters limiting which agents are visited per step. An
/// agent is active while it carries a virus or any neighbour does; the
/// counters track how many such reasons currently apply. Global events
/// may bump an agent in explicitly.
#[derive(Clone, Default)]
pub struct Queue {
    counts: Vec<i32>,
}

impl Queue {
    pub fn reset(&mut self, n: usize) {
        self.counts.clear();
        self.counts.resize(n, 0);
    }

    pub fn is_active(&self, agent: Id) -> bool {
        self.counts[agent] > 0
    }

    pub fn incr(&mut self, agent: Id) {
        self.counts[agent] += 1;
    }

    pub fn decr(&mut self, agent: Id) {
        self.counts[agent] -= 1;
        debug_assert!(self.counts[agent] >= 0);
    }

    /// Mark an agent and its neighbourhood on virus acquisition.
    pub fn activate(&mut self, agent: Id, neighbors: &[Id]) {
        self.incr(agent);
        for &nb in neighbors {
            self.incr(nb);
        }
    }

    /// Inverse of `activate`, on virus loss.
    pub fn deactivate(&mut self, agent: Id, neighbors: &[Id]) {
        self.decr(agent);
        for &nb in neighbors {
            self.decr(nb);
        }
    }

    pub fn n_active(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_is_reversible() {
        let mut q = Queue::default();
        q.reset(5);
        assert_eq!(q.n_active(), 0);
        q.activate(0, &[1, 2]);
        assert!(q.is_active(0) && q.is_active(1) && q.is_active(2));
        assert!(!q.is_active(3));
        q.activate(1, &[0, 2]);
        q.deactivate(0, &[1, 2]);
        // Agent 1 still carries a virus, so 0..=2 stay active.
        assert!(q.is_active(0) && q.is_active(1) && q.is_active(2));
        q.deactivate(1, &[0, 2]);
        assert_eq!(q.n_active(), 0);
    }
}
