//! One agent's traversal of a compiled tree for one tick.

use schema_core::{AgentId, BlackboardStore, GlobalBlackboard, TickContext, WorldMut};
use schema_tools::{tags, TraceEvent, TraceSink};
use tracing::{debug, trace};

use crate::compiler::ExecutableKind;
use crate::modifier::{self, Resolution};
use crate::{interrupt, ExecutableTree, ExecutionContext, MemoryArena, NodeStatus, RunMode, RuntimeConfig};

/// Builds a [`crate::NodeContext`] from disjoint fields of an [`Env`], so the
/// memory arena can stay borrowed alongside it.
macro_rules! node_cx {
    ($env:ident, $node:expr, $cursor:expr) => {
        $crate::NodeContext {
            tick: $env.tick,
            agent: $env.agent,
            world: &mut *$env.world,
            blackboard: ::schema_core::BlackboardView::new(
                $env.tree.blackboard(),
                &mut *$env.globals,
                &mut *$env.store,
                $env.agent.stable_id(),
                $cursor,
                $env.tree.dynamic_scope($node),
            ),
            node: $node,
        }
    };
}
pub(crate) use node_cx;

/// Everything one agent's tick borrows from its session.
pub(crate) struct Env<'a, W: WorldMut> {
    pub tree: &'a ExecutableTree<W>,
    pub memory: &'a mut MemoryArena,
    pub store: &'a mut BlackboardStore,
    pub globals: &'a mut GlobalBlackboard,
    pub trace: &'a mut (dyn TraceSink + 'static),
    pub config: &'a RuntimeConfig,
    pub tick: &'a TickContext,
    pub agent: W::Agent,
    pub world: &'a mut W,
}

impl<W: WorldMut> Env<'_, W> {
    pub fn agent_id(&self) -> u64 {
        self.agent.stable_id()
    }

    pub fn emit(&mut self, tag: &'static str, node: usize) {
        let agent = self.agent.stable_id();
        trace!(agent, node, tag, "bt transition");
        self.trace.emit(
            TraceEvent::new(self.tick.tick, tag)
                .with_a(agent)
                .with_b(node as u64),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Gate and enter a node.
    Enter(usize),
    /// Tick an entered leaf, or start an entered composite at its first child.
    Run(usize),
    /// A node produced `raw`; the modifier decides what the parent sees.
    Complete { node: usize, raw: NodeStatus },
    /// Hand `status` to the node's parent. The node is already off the active path.
    Finished { node: usize, status: NodeStatus },
    Yield(NodeStatus),
}

pub(crate) fn tick<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
) -> NodeStatus {
    if let Some(status) = cx.finished {
        return status;
    }

    let mut step = match cx.cursor {
        Some(cursor) => interrupt::check(env, cx, cursor).unwrap_or(Step::Run(cursor)),
        None => Step::Enter(env.tree.root()),
    };
    cx.cursor = None;

    loop {
        step = match step {
            Step::Enter(node) => enter(env, cx, node),
            Step::Run(node) => run(env, cx, node),
            Step::Complete { node, raw } => complete(env, cx, node, raw),
            Step::Finished { node, status } => finished(env, cx, node, status),
            Step::Yield(status) => return status,
        };
    }
}

/// Evaluate every decorator on `node`, recording aborting ones.
/// Creates the node's memory first so decorator records exist.
///
/// `passed` names a decorator already evaluated to true this tick; it is
/// counted as passing without calling its conditional again.
fn gate<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    node: usize,
    passed: Option<usize>,
) -> bool {
    let tree = env.tree;
    let decorators = tree.decorators_of(node);
    if decorators.is_empty() {
        return true;
    }

    let agent = env.agent_id();
    let (memory, _) = env.memory.get_or_create(tree, node, agent);
    let initialize = !memory.decorators_initialized;
    memory.decorators_initialized = true;

    let mut pass = true;
    for decorator in decorators {
        if passed == Some(decorator.ordinal) {
            if let Some(slot) = decorator.guard {
                cx.guards[slot] = Some(true);
            }
            continue;
        }
        let mut ncx = node_cx!(env, node, node);
        if initialize {
            decorator
                .conditional
                .initialize(memory.decorator(decorator.ordinal), &mut ncx);
        }
        let value = decorator
            .conditional
            .evaluate(memory.decorator(decorator.ordinal), &mut ncx)
            != decorator.invert;
        if let Some(slot) = decorator.guard {
            cx.guards[slot] = Some(value);
        }
        pass &= value;
    }
    pass
}

fn enter<W: WorldMut + 'static>(env: &mut Env<'_, W>, cx: &mut ExecutionContext, node: usize) -> Step {
    admit(env, cx, node, None)
}

fn admit<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    node: usize,
    passed: Option<usize>,
) -> Step {
    if !gate(env, cx, node, passed) {
        env.emit(tags::GATE_FAILED, node);
        return Step::Finished {
            node,
            status: NodeStatus::Failure,
        };
    }
    let tree = env.tree;
    if let Some(modifier) = tree.modifier(node) {
        let agent = env.agent_id();
        let (memory, _) = env.memory.get_or_create(tree, node, agent);
        let mut ncx = node_cx!(env, node, node);
        modifier.enter(memory.modifier(), &mut ncx);
    }
    activate(env, cx, node);
    Step::Run(node)
}

/// Enter `target` below `from`, which must be the top of the active path.
/// Composites in between are gated and activated on the way down; the first
/// one whose gate fails reports `Failure` to its parent instead.
///
/// `passed` is the ordinal of a decorator on `target` that already passed
/// this tick.
pub(crate) fn descend<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    from: usize,
    target: usize,
    passed: usize,
) -> Step {
    let tree = env.tree;
    let mut between: Vec<usize> =
        std::iter::successors(tree.node(target).and_then(|n| n.parent), |&p| {
            tree.node(p).and_then(|n| n.parent)
        })
        .take_while(|&p| p != from)
        .collect();
    between.reverse();

    for composite in between {
        if let step @ Step::Finished { .. } = admit(env, cx, composite, None) {
            return step;
        }
    }
    admit(env, cx, target, Some(passed))
}

/// Push `node` onto the active path and run its enter callbacks.
pub(crate) fn activate<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    node: usize,
) {
    let tree = env.tree;
    cx.active.push(node);
    env.emit(tags::NODE_ENTER, node);

    let agent = env.agent_id();
    let (memory, _) = env.memory.get_or_create(tree, node, agent);
    let first = !memory.initialized;
    memory.initialized = true;
    if let Some(action) = tree.action(node) {
        let mut ncx = node_cx!(env, node, node);
        if first {
            action.initialize(memory.record(), &mut ncx);
        }
        action.enter(memory.record(), &mut ncx);
    }
}

/// Pop the top of the active path, which must be `node`, and run its exit callback.
pub(crate) fn exit<W: WorldMut + 'static>(env: &mut Env<'_, W>, cx: &mut ExecutionContext, node: usize) {
    let tree = env.tree;
    let popped = cx.active.pop();
    debug_assert_eq!(popped, Some(node));
    env.emit(tags::NODE_EXIT, node);

    let agent = env.agent_id();
    if let (Some(action), Some(memory)) = (tree.action(node), env.memory.get_mut(node, agent)) {
        let mut ncx = node_cx!(env, node, node);
        action.exit(memory.record(), &mut ncx);
    }
}

/// Exit active nodes bottom-up until `keep` is on top (or the path is empty
/// when `keep` is `None`). Exited nodes lose their recorded status.
pub(crate) fn unwind<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    keep: Option<usize>,
) {
    while let Some(&top) = cx.active.last() {
        if Some(top) == keep {
            break;
        }
        exit(env, cx, top);
        cx.last_status[top] = None;
    }
    cx.cursor = None;
}

fn run<W: WorldMut + 'static>(env: &mut Env<'_, W>, cx: &mut ExecutionContext, node: usize) -> Step {
    let tree = env.tree;
    let Some(compiled) = tree.node(node) else {
        return Step::Yield(NodeStatus::Failure);
    };

    match compiled.kind {
        ExecutableKind::Flow(flow) => match compiled.children.first() {
            Some(&child) => Step::Enter(child),
            None => Step::Complete {
                node,
                raw: flow.empty_status(),
            },
        },
        ExecutableKind::Action => {
            let Some(action) = tree.action(node) else {
                return Step::Complete {
                    node,
                    raw: NodeStatus::Failure,
                };
            };
            let agent = env.agent_id();
            let (memory, _) = env.memory.get_or_create(tree, node, agent);
            let mut ncx = node_cx!(env, node, node);
            let status = action.tick(memory.record(), &mut ncx);
            cx.last_status[node] = Some(status);
            if status == NodeStatus::Running {
                cx.cursor = Some(node);
                Step::Yield(NodeStatus::Running)
            } else {
                Step::Complete { node, raw: status }
            }
        }
    }
}

fn complete<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    node: usize,
    raw: NodeStatus,
) -> Step {
    let tree = env.tree;
    let resolution = match tree.modifier(node) {
        None => Resolution::Propagate(raw),
        Some(modifier) => {
            let agent = env.agent_id();
            let (memory, _) = env.memory.get_or_create(tree, node, agent);
            let mut ncx = node_cx!(env, node, node);
            let message = modifier.modify(memory.modifier(), &mut ncx, raw);
            modifier::apply(message, raw)
        }
    };

    match resolution {
        Resolution::Repeat => {
            exit(env, cx, node);
            env.emit(tags::MODIFIER_REPEAT, node);
            activate(env, cx, node);
            cx.last_status[node] = Some(NodeStatus::Running);
            cx.cursor = Some(node);
            Step::Yield(NodeStatus::Running)
        }
        Resolution::Propagate(status) => {
            exit(env, cx, node);
            Step::Finished { node, status }
        }
    }
}

fn finished<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    node: usize,
    status: NodeStatus,
) -> Step {
    let tree = env.tree;
    cx.last_status[node] = Some(status);

    let Some(parent) = tree.node(node).and_then(|n| n.parent) else {
        return root_completed(env, cx, status);
    };
    let Some(compiled) = tree.node(parent) else {
        return Step::Yield(NodeStatus::Failure);
    };
    let ExecutableKind::Flow(flow) = compiled.kind else {
        return Step::Complete {
            node: parent,
            raw: status,
        };
    };

    let position = tree.node(node).map_or(0, |n| n.position);
    match flow.select_child(status, position, compiled.children.len()) {
        Some(next) => Step::Enter(compiled.children[next]),
        None => Step::Complete {
            node: parent,
            raw: status,
        },
    }
}

fn root_completed<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    status: NodeStatus,
) -> Step {
    let agent = env.agent_id();
    let root = env.tree.root();
    cx.cursor = None;
    if env.config.reset_memory_on_restart {
        env.memory.release(agent);
    }
    match env.config.run_mode {
        RunMode::Looped => env.emit(tags::TREE_RESTART, root),
        RunMode::SingleRun => {
            debug!(agent, ?status, tree = env.tree.name(), "single-run tree finished");
            cx.finished = Some(status);
        }
    }
    Step::Yield(status)
}
