//! Turns a [`SimConfig`] into a tree model, a behavior registry and a session.

use anyhow::{bail, Context, Result};
use tracing::debug;

use schema_bt::nodes::{
    Compare, DebugLog, IsSet, ReturnStatus, SetDynamic, SetValue, Slot, Subtract, Trigonometry,
    Wait,
};
use schema_bt::{BehaviorRegistry, NodeId, NodeKind, TreeModel};
use schema_core::{Blackboard, EntryId, EntryKey, EntrySelector, WorldMut, WorldView};

use crate::config::{BehaviorSpec, KindSpec, NodeSpec, Operand, SimConfig};

/// The CLI's host world. Leaves only touch the blackboard, so it carries nothing.
#[derive(Debug, Default)]
pub struct SimWorld;

impl WorldView for SimWorld {
    type Agent = u64;
}

impl WorldMut for SimWorld {}

fn selector(operand: &Operand) -> EntrySelector<f32> {
    match operand {
        Operand::Inline(value) => EntrySelector::inline(*value),
        Operand::Entry { entry } => EntrySelector::entry(EntryKey::new(*entry)),
        Operand::Dynamic { dynamic } => EntrySelector::dynamic(dynamic.clone()),
    }
}

fn slot(behavior: &str, entry: Option<u64>, dynamic: Option<&String>) -> Result<Slot> {
    match (entry, dynamic) {
        (Some(id), None) => Ok(Slot::Entry(EntryId(id))),
        (None, Some(name)) => Ok(Slot::Dynamic(name.clone())),
        _ => bail!("behavior {behavior} needs exactly one of `entry` or `dynamic`"),
    }
}

pub fn registry(config: &SimConfig) -> Result<BehaviorRegistry<SimWorld>> {
    let mut registry = BehaviorRegistry::new();
    for (id, spec) in &config.behaviors {
        let id = id.as_str();
        match spec {
            BehaviorSpec::Wait { seconds } => {
                registry.register_action(id, Wait::new(selector(seconds)));
            }
            BehaviorSpec::Subtract { lhs, rhs, output } => {
                registry.register_action(
                    id,
                    Subtract {
                        lhs: selector(lhs),
                        rhs: selector(rhs),
                        output: selector(output),
                    },
                );
            }
            BehaviorSpec::Sin {
                input,
                output,
                degrees,
            } => {
                let mut leaf = Trigonometry::sin(selector(input), selector(output));
                leaf.degrees = *degrees;
                registry.register_action(id, leaf);
            }
            BehaviorSpec::Cos {
                input,
                output,
                degrees,
            } => {
                let mut leaf = Trigonometry::cos(selector(input), selector(output));
                leaf.degrees = *degrees;
                registry.register_action(id, leaf);
            }
            BehaviorSpec::SetValue { entry, value } => {
                registry.register_action(id, SetValue::entry(EntryId(*entry), value.clone()));
            }
            BehaviorSpec::SetDynamic { name, value } => {
                registry.register_action(id, SetDynamic::new(name.clone(), value.clone()));
            }
            BehaviorSpec::DebugLog {
                message,
                entry,
                dynamic,
            } => {
                let mut leaf = DebugLog::new(message.clone());
                if entry.is_some() || dynamic.is_some() {
                    leaf = leaf.with_value(slot(id, *entry, dynamic.as_ref())?);
                }
                registry.register_action(id, leaf);
            }
            BehaviorSpec::Return { status } => {
                registry.register_action(id, ReturnStatus(*status));
            }
            BehaviorSpec::IsSet { entry, dynamic } => {
                registry.register_conditional(
                    id,
                    IsSet {
                        slot: slot(id, *entry, dynamic.as_ref())?,
                    },
                );
            }
            BehaviorSpec::Compare {
                entry,
                dynamic,
                op,
                value,
            } => {
                registry.register_conditional(
                    id,
                    Compare {
                        slot: slot(id, *entry, dynamic.as_ref())?,
                        op: *op,
                        value: value.clone(),
                    },
                );
            }
        }
    }
    Ok(registry)
}

pub fn model(config: &SimConfig) -> Result<TreeModel> {
    let Some(root) = &config.tree else {
        bail!("simulation {} has no tree", config.name);
    };
    let blackboard = Blackboard::with_entries(config.blackboard.iter().cloned())
        .context("invalid tree blackboard")?;
    let mut model = TreeModel::new(config.name.clone()).with_blackboard(blackboard);
    add(&mut model, None, root)?;
    debug!(tree = %config.name, nodes = model.len(), "tree model built");
    Ok(model)
}

fn add(model: &mut TreeModel, parent: Option<&NodeId>, spec: &NodeSpec) -> Result<NodeId> {
    let (kind, children) = match &spec.kind {
        KindSpec::Sequence(children) => (NodeKind::sequence(), children.as_slice()),
        KindSpec::Selector(children) => (NodeKind::selector(), children.as_slice()),
        KindSpec::Action(behavior) => (NodeKind::action(behavior.as_str()), &[][..]),
    };

    let id = match (&spec.id, parent) {
        (Some(id), Some(parent)) => model.add_child(parent, id.as_str(), kind)?,
        (Some(id), None) => model.add_node_with_id(id.as_str(), kind)?,
        (None, Some(parent)) => model.add_child(parent, NodeId::generate(), kind)?,
        (None, None) => model.add_node(kind),
    };
    if let Some(name) = &spec.name {
        model.set_name(&id, name.clone())?;
    }
    for decorator in &spec.decorators {
        model.add_decorator(&id, decorator.clone())?;
    }
    model.set_modifier(&id, spec.modifier.clone())?;

    for child in children {
        add(model, Some(&id), child)?;
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_bt::{compile, NodeStatus, Session};
    use schema_core::{TickContext, Value};

    const PATROL: &str = r#"
name: patrol
agents: [1]
blackboard:
  - { id: 1, name: alarm, ty: bool }
  - { id: 2, name: heading, ty: float }
behaviors:
  alarmed: { kind: is_set, entry: 1 }
  quiet: { kind: compare, entry: 1, op: eq, value: { bool: false } }
  raise: { kind: set_value, entry: 1, value: { bool: true } }
  turn: { kind: cos, input: 0.0, output: { entry: 2 } }
  done: { kind: return, status: success }
tree:
  id: root
  sequence:
    - id: check
      action: done
      decorators: [{ conditional: quiet }]
    - action: turn
    - action: raise
"#;

    #[test]
    fn builds_and_runs_a_described_tree() {
        let config = SimConfig::parse(PATROL).unwrap();
        let registry = registry(&config).unwrap();
        let model = model(&config).unwrap();
        assert_eq!(model.len(), 4);
        assert_eq!(model.root(), Some(&NodeId::from("root")));

        let tree = compile(&model, &registry).unwrap();
        let mut session = Session::new();
        let handle = session.add_tree(tree);
        session.bind(handle, 1).unwrap();

        let mut world = SimWorld;
        let ctx = TickContext::default();
        assert_eq!(session.tick(handle, 1, &ctx, &mut world).unwrap(), NodeStatus::Success);
        assert_eq!(session.get_value(handle, 1, EntryId(2)).unwrap(), Value::Float(1.0));
        // The alarm is now raised, so the guarded first step fails.
        assert_eq!(session.tick(handle, 1, &ctx.next(), &mut world).unwrap(), NodeStatus::Failure);
    }

    #[test]
    fn slots_need_exactly_one_target() {
        let config = SimConfig::parse(
            "behaviors:\n  bad: { kind: is_set }\n",
        )
        .unwrap();
        assert!(registry(&config).is_err());
    }

    #[test]
    fn missing_tree_is_an_error() {
        let config = SimConfig::parse("name: empty").unwrap();
        assert!(model(&config).is_err());
    }
}
