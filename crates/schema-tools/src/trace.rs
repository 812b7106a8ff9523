#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

/// Tags emitted by the behavior tree runtime.
pub mod tags {
    pub const NODE_ENTER: &str = "bt.node.enter";
    pub const NODE_EXIT: &str = "bt.node.exit";
    pub const GATE_FAILED: &str = "bt.node.gate_failed";
    pub const ABORT_SELF: &str = "bt.abort.self";
    pub const ABORT_LOWER: &str = "bt.abort.lower";
    pub const MODIFIER_REPEAT: &str = "bt.modifier.repeat";
    pub const TREE_RESTART: &str = "bt.tree.restart";
}

/// One node transition.
///
/// By convention `a` is the agent's stable id and `b` the compiled node index.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub tag: Cow<'static, str>,
    pub a: u64,
    pub b: u64,
}

impl TraceEvent {
    pub fn new(tick: u64, tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            tag: tag.into(),
            a: 0,
            b: 0,
        }
    }

    pub fn with_a(mut self, a: u64) -> Self {
        self.a = a;
        self
    }

    pub fn with_b(mut self, b: u64) -> Self {
        self.b = b;
        self
    }
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Events carrying `tag`, in emission order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| e.tag == tag)
    }

    /// Node indices (`b`) of the events carrying `tag`.
    pub fn nodes(&self, tag: &str) -> Vec<u64> {
        self.tagged(tag).map(|e| e.b).collect()
    }
}

/// A sink whose log stays readable after the sink is handed to a session.
#[derive(Debug, Default, Clone)]
pub struct SharedTraceLog(Arc<Mutex<TraceLog>>);

impl SharedTraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TraceLog {
        self.0.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.0.lock() {
            log.events.clear();
        }
    }
}

impl TraceSink for SharedTraceLog {
    fn emit(&mut self, event: TraceEvent) {
        if let Ok(mut log) = self.0.lock() {
            log.push(event);
        }
    }
}
