//! Synchronous in-process event bus.
//!
//! Stage-completion events are dispatched FIFO to subscribers in
//! registration order. Dispatch is re-entrancy safe: a handler that emits
//! while a dispatch is in flight only enqueues, and the outer dispatch loop
//! drains the queue. Handlers registered mid-dispatch receive later events
//! but not the one being dispatched.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use linkforge_ingest::Warning;
use serde::{Deserialize, Serialize};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingested,
    Typed,
    Normalized,
    Mapped,
    Resolved,
    Analyzed,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingested => "ingested",
            Stage::Typed => "typed",
            Stage::Normalized => "normalized",
            Stage::Mapped => "mapped",
            Stage::Resolved => "resolved",
            Stage::Analyzed => "analyzed",
        }
    }

    pub const ALL: [Stage; 6] = [
        Stage::Ingested,
        Stage::Typed,
        Stage::Normalized,
        Stage::Mapped,
        Stage::Resolved,
        Stage::Analyzed,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload delivered on stage completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    /// The stage's committed output, serialized.
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    pub duration_ms: u64,
}

type Handler = Box<dyn FnMut(&StageEvent)>;

#[derive(Default)]
struct BusState {
    handlers: Vec<(Stage, Handler)>,
    queue: VecDeque<StageEvent>,
    dispatching: bool,
}

/// Single-threaded event bus. Each pipeline owns one; there is no global
/// instance, so two pipelines never observe each other's events.
#[derive(Default)]
pub struct EventBus {
    state: RefCell<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, stage: Stage, handler: impl FnMut(&StageEvent) + 'static) {
        self.state
            .borrow_mut()
            .handlers
            .push((stage, Box::new(handler)));
    }

    /// Enqueue an event and, unless a dispatch is already in flight, drain
    /// the queue in FIFO order.
    pub fn emit(&self, event: StageEvent) {
        {
            let mut state = self.state.borrow_mut();
            state.queue.push_back(event);
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        loop {
            let next = self.state.borrow_mut().queue.pop_front();
            let Some(event) = next else {
                self.state.borrow_mut().dispatching = false;
                return;
            };

            // Handlers are moved out for the duration of the calls so a
            // handler may re-enter the bus without a double borrow.
            let mut handlers = std::mem::take(&mut self.state.borrow_mut().handlers);
            for (stage, handler) in handlers.iter_mut() {
                if *stage == event.stage {
                    handler(&event);
                }
            }
            let mut state = self.state.borrow_mut();
            let added = std::mem::replace(&mut state.handlers, handlers);
            state.handlers.extend(added);
        }
    }
}
