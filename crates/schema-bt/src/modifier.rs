//! Post-processing of a node's terminal result before its parent sees it.

use core::marker::PhantomData;

use schema_core::WorldMut;

use crate::behavior::{Modifier, NodeContext};
use crate::NodeStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Continue,
    /// Exit and immediately re-enter the node; the parent sees `Running`.
    Repeat,
    ForceSuccess,
    ForceFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Propagate(NodeStatus),
    Repeat,
}

/// Fold a modifier's message into the node's raw status.
///
/// `Running` is passed through whatever the message says.
pub(crate) fn apply(message: Message, raw: NodeStatus) -> Resolution {
    if !raw.is_terminal() {
        return Resolution::Propagate(raw);
    }
    match message {
        Message::Continue => Resolution::Propagate(raw),
        Message::Repeat => Resolution::Repeat,
        Message::ForceSuccess => Resolution::Propagate(NodeStatus::Success),
        Message::ForceFailure => Resolution::Propagate(NodeStatus::Failure),
    }
}

pub struct LoopForever<W>(PhantomData<fn(&mut W)>);

impl<W> Default for LoopForever<W> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<W: WorldMut + 'static> Modifier<W> for LoopForever<W> {
    type Memory = ();

    fn modify(&self, _memory: &mut (), _cx: &mut NodeContext<'_, W>, _status: NodeStatus) -> Message {
        Message::Repeat
    }
}

#[derive(Debug, Default)]
pub struct LoopMemory {
    pub iterations: u32,
}

/// Runs the node `count` times in total; the last pass's status propagates.
pub struct Loop<W> {
    count: u32,
    _world: PhantomData<fn(&mut W)>,
}

impl<W> Loop<W> {
    pub fn new(count: u32) -> Self {
        Self {
            count: count.max(1),
            _world: PhantomData,
        }
    }
}

impl<W: WorldMut + 'static> Modifier<W> for Loop<W> {
    type Memory = LoopMemory;

    fn on_node_enter(&self, memory: &mut LoopMemory, _cx: &mut NodeContext<'_, W>) {
        memory.iterations = 0;
    }

    fn modify(
        &self,
        memory: &mut LoopMemory,
        _cx: &mut NodeContext<'_, W>,
        _status: NodeStatus,
    ) -> Message {
        memory.iterations += 1;
        if memory.iterations < self.count {
            Message::Repeat
        } else {
            memory.iterations = 0;
            Message::Continue
        }
    }
}

/// Repeats until the node reports `until`.
pub struct LoopUntil<W> {
    until: NodeStatus,
    _world: PhantomData<fn(&mut W)>,
}

impl<W> LoopUntil<W> {
    pub fn new(until: NodeStatus) -> Self {
        Self {
            until,
            _world: PhantomData,
        }
    }
}

impl<W: WorldMut + 'static> Modifier<W> for LoopUntil<W> {
    type Memory = ();

    fn modify(&self, _memory: &mut (), _cx: &mut NodeContext<'_, W>, status: NodeStatus) -> Message {
        if status == self.until {
            Message::Continue
        } else {
            Message::Repeat
        }
    }
}

pub struct ForceStatus<W> {
    status: NodeStatus,
    _world: PhantomData<fn(&mut W)>,
}

impl<W> ForceStatus<W> {
    pub fn new(status: NodeStatus) -> Self {
        Self {
            status,
            _world: PhantomData,
        }
    }
}

impl<W: WorldMut + 'static> Modifier<W> for ForceStatus<W> {
    type Memory = ();

    fn modify(&self, _memory: &mut (), _cx: &mut NodeContext<'_, W>, _status: NodeStatus) -> Message {
        match self.status {
            NodeStatus::Success => Message::ForceSuccess,
            NodeStatus::Failure => Message::ForceFailure,
            NodeStatus::Running => Message::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_is_never_rewritten() {
        for message in [
            Message::Continue,
            Message::Repeat,
            Message::ForceSuccess,
            Message::ForceFailure,
        ] {
            assert_eq!(
                apply(message, NodeStatus::Running),
                Resolution::Propagate(NodeStatus::Running)
            );
        }
    }

    #[test]
    fn force_overrides_terminal_status() {
        assert_eq!(
            apply(Message::ForceSuccess, NodeStatus::Failure),
            Resolution::Propagate(NodeStatus::Success)
        );
        assert_eq!(
            apply(Message::ForceFailure, NodeStatus::Success),
            Resolution::Propagate(NodeStatus::Failure)
        );
        assert_eq!(apply(Message::Repeat, NodeStatus::Success), Resolution::Repeat);
    }
}
