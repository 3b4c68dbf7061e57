use crate::events::Event;
use crate::model::Model;
use crate::prelude::Real;
use crate::tool::Tool;
use getset::{CopyGetters, Getters};
use std::sync::Arc;

pub type GlobalFun = Arc<dyn Fn(&mut Model) + Send + Sync>;

/// A callback run after state updates, either on one scheduled day or,
/// with day -1, on every day of the run.
#[derive(Clone, Getters, CopyGetters)]
pub struct GlobalEvent {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    day: i32,
    fun: GlobalFun,
}

impl GlobalEvent {
    pub fn new(name: impl Into<String>, day: i32, fun: GlobalFun) -> Self {
        GlobalEvent {
            name: name.into(),
            day,
            fun,
        }
    }

    pub fn matches(&self, day: u32) -> bool {
        self.day < 0 || self.day as u32 == day
    }

    pub fn run(&self, model: &mut Model) {
        (*self.fun)(model)
    }
}

/// Event overwriting a model parameter on the scheduled day.
pub fn set_param_event(param: &str, value: Real, day: i32) -> GlobalEvent {
    let name = format!("set {} = {}", param, value);
    let param = param.to_string();
    GlobalEvent::new(
        name,
        day,
        Arc::new(move |m: &mut Model| {
            if let Err(e) = m.set_param(&param, value) {
                log::warn!("global event could not set '{}': {}", param, e);
            }
        }),
    )
}

/// Event handing a tool to each agent that does not yet carry it, with
/// probability `prob` per agent.
pub fn tool_rollout_event(tool: Tool, prob: Real, day: i32) -> GlobalEvent {
    let name = format!("roll out {}", tool.name());
    GlobalEvent::new(
        name,
        day,
        Arc::new(move |m: &mut Model| {
            let tool_id = tool.id();
            for agent in 0..m.size() {
                if m.agent(agent).has_tool(tool_id) {
                    continue;
                }
                if m.runif() < prob {
                    m.queue_event(Event::AddTool {
                        agent,
                        tool: tool.clone(),
                        state: None,
                    });
                }
            }
        }),
    )
}
