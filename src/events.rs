use crate::prelude::Id;
use crate::tool::Tool;
use crate::virus::Virus;
use std::collections::VecDeque;

/// A deferred state change queued during agent updates and applied once
/// all agents have been visited, giving each day snapshot semantics.
#[derive(Clone)]
pub enum Event {
    SetState {
        agent: Id,
        state: usize,
    },
    AddVirus {
        agent: Id,
        virus: Virus,
        state: usize,
        /// Infecting agent; None for seeding at day zero.
        source: Option<Id>,
    },
    RmVirus {
        agent: Id,
        state: usize,
        /// Whether post-recovery immunity applies (false on death).
        immunity: bool,
    },
    AddTool {
        agent: Id,
        tool: Tool,
        state: Option<usize>,
    },
    RmTool {
        agent: Id,
        tool: usize,
        state: Option<usize>,
    },
    AddEntity {
        agent: Id,
        entity: Id,
    },
    RmEntity {
        agent: Id,
        entity: Id,
    },
}

/// FIFO of pending events. Flushed once per step; application order is
/// the enqueue order, which is stable given a fixed agent iteration
/// order.
#[derive(Clone, Default)]
pub struct EventBus {
    queue: VecDeque<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ev: Event) {
        self.queue.push_back(ev);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
