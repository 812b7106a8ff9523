//! Priority aborts: re-checking guards while a branch is suspended.

use schema_core::{AgentId, WorldMut};
use schema_tools::tags;
use tracing::debug;

use crate::compiler::CompiledDecorator;
use crate::engine::{descend, node_cx, unwind, Env, Step};
use crate::{ExecutionContext, NodeStatus};

/// Re-evaluate every aborting decorator relevant to `cursor`, in ascending
/// priority. The first guard whose truth value flips the wrong way redirects
/// the tick; later guards are not evaluated.
///
/// A guard is relevant when
/// - it aborts self and its node's range contains the cursor, or
/// - it aborts lower priority and the cursor lies past the guarded node's own
///   range, under a composite ancestor the two share.
///
/// Guards with no recorded value (their node was never reached) are skipped.
pub(crate) fn check<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    cx: &mut ExecutionContext,
    cursor: usize,
) -> Option<Step> {
    let tree = env.tree;

    for guard in tree.guards() {
        let Some(slot) = guard.guard else {
            continue;
        };
        let Some(recorded) = cx.guards.get(slot).copied().flatten() else {
            continue;
        };
        let Some(node) = tree.node(guard.node) else {
            continue;
        };

        let self_relevant = guard.aborts.aborts_self() && node.contains(cursor);
        let common = if guard.aborts.aborts_lower() && cursor >= node.index + node.breadth {
            std::iter::successors(node.parent, |&p| tree.node(p).and_then(|n| n.parent))
                .find(|&p| tree.node(p).is_some_and(|n| n.contains(cursor)))
        } else {
            None
        };
        if !self_relevant && common.is_none() {
            continue;
        }

        let value = evaluate(env, guard, cursor);
        cx.guards[slot] = Some(value);

        if self_relevant && recorded && !value {
            debug!(agent = env.agent_id(), node = guard.node, cursor, "guard failed, aborting own branch");
            env.emit(tags::ABORT_SELF, guard.node);
            // Exit from the cursor up to and including the guarded node.
            unwind(env, cx, node.parent);
            return Some(Step::Finished {
                node: guard.node,
                status: NodeStatus::Failure,
            });
        }

        if let Some(common) = common.filter(|_| !recorded && value) {
            debug!(agent = env.agent_id(), node = guard.node, cursor, common, "guard passed, aborting lower priority branch");
            env.emit(tags::ABORT_LOWER, guard.node);
            // Exit back to the shared ancestor, then walk down into the guarded node.
            unwind(env, cx, Some(common));
            return Some(descend(env, cx, common, guard.node, guard.ordinal));
        }
    }
    None
}

fn evaluate<W: WorldMut + 'static>(
    env: &mut Env<'_, W>,
    guard: &CompiledDecorator<W>,
    cursor: usize,
) -> bool {
    let tree = env.tree;
    let agent = env.agent.stable_id();
    let (memory, _) = env.memory.get_or_create(tree, guard.node, agent);
    let mut ncx = node_cx!(env, guard.node, cursor);
    guard
        .conditional
        .evaluate(memory.decorator(guard.ordinal), &mut ncx)
        != guard.invert
}
