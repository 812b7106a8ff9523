use schema_bt::nodes::{FnCondition, ReturnStatus};
use schema_bt::{
    compile, AbortsType, BehaviorRegistry, BehaviorRole, CompileError, Decorator, FlowKind,
    ModifierKind, Node, NodeContext, NodeId, NodeKind, NodeStatus, TreeModel,
};
use schema_core::{Blackboard, WorldMut, WorldView};

#[derive(Debug, Default)]
struct World;

impl WorldView for World {
    type Agent = u64;
}

impl WorldMut for World {}

fn registry() -> BehaviorRegistry<World> {
    BehaviorRegistry::new()
        .with_action("ok", ReturnStatus(NodeStatus::Success))
        .with_conditional("always", FnCondition::new(|_cx: &mut NodeContext<'_, World>| true))
}

/// root(sel)
/// ├── a(seq)
/// │   ├── a1
/// │   └── a2
/// ├── b
/// └── c(seq)
///     └── c1
fn sample_model() -> TreeModel {
    let mut model = TreeModel::new("sample");
    let root = model
        .add_node_with_id("root", NodeKind::selector())
        .unwrap();
    let a = model.add_child(&root, "a", NodeKind::sequence()).unwrap();
    model.add_child(&a, "a1", NodeKind::action("ok")).unwrap();
    model.add_child(&a, "a2", NodeKind::action("ok")).unwrap();
    model.add_child(&root, "b", NodeKind::action("ok")).unwrap();
    let c = model.add_child(&root, "c", NodeKind::sequence()).unwrap();
    model.add_child(&c, "c1", NodeKind::action("ok")).unwrap();
    model
}

#[test]
fn flattening_is_preorder_with_breadth() {
    let tree = compile(&sample_model(), &registry()).unwrap();

    let order: Vec<&str> = tree.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(order, vec!["root", "a", "a1", "a2", "b", "c", "c1"]);

    let breadth: Vec<usize> = tree.nodes().iter().map(|n| n.breadth).collect();
    assert_eq!(breadth, vec![7, 3, 1, 1, 1, 2, 1]);

    let root = &tree.nodes()[0];
    let children_sum: usize = root.children.iter().map(|&c| tree.nodes()[c].breadth).sum();
    assert_eq!(children_sum + 1, root.breadth);
    assert_eq!(root.breadth, tree.len());

    for node in tree.nodes() {
        assert_eq!(node.priority, node.index as u32 + 1);
    }
}

#[test]
fn range_test_agrees_with_parent_walk() {
    let tree = compile(&sample_model(), &registry()).unwrap();

    for x in 0..tree.len() {
        for y in 0..tree.len() {
            let mut walk = Some(x);
            let mut reached = false;
            while let Some(current) = walk {
                if current == y {
                    reached = true;
                    break;
                }
                walk = tree.nodes()[current].parent;
            }
            assert_eq!(tree.is_descendant(x, y), reached, "x={x} y={y}");
        }
    }
}

#[test]
fn compiling_twice_assigns_identical_indices() {
    let model = sample_model();
    let first = compile(&model, &registry()).unwrap();
    let second = compile(&model, &registry()).unwrap();

    for node in model.nodes() {
        assert_eq!(first.index_of(&node.id), second.index_of(&node.id));
    }
}

#[test]
fn dynamic_scope_is_the_parent_composite() {
    let tree = compile(&sample_model(), &registry()).unwrap();
    let a2 = tree.index_of(&NodeId::from("a2")).unwrap();
    let scope = tree.dynamic_scope(a2);
    assert_eq!((scope.start, scope.breadth), (1, 3));

    let root_scope = tree.dynamic_scope(0);
    assert_eq!((root_scope.start, root_scope.breadth), (0, 7));
}

#[test]
fn cycles_are_rejected() {
    let mut root = Node::new("r".into(), NodeKind::sequence());
    let mut a = Node::new("a".into(), NodeKind::sequence());
    root.children.push("a".into());
    a.parent = Some("r".into());
    a.children.push("r".into());

    let model = TreeModel::from_parts("cyclic", Some("r".into()), vec![root, a], Blackboard::new());
    let err = compile(&model, &registry()).err().unwrap();
    assert_eq!(err, CompileError::Cycle("r".into()));
}

#[test]
fn duplicate_ids_are_rejected() {
    let root = Node::new("r".into(), NodeKind::sequence());
    let twin = Node::new("r".into(), NodeKind::action("ok"));

    let model = TreeModel::from_parts("dup", Some("r".into()), vec![root, twin], Blackboard::new());
    let err = compile(&model, &registry()).err().unwrap();
    assert_eq!(err, CompileError::DuplicateId("r".into()));
}

#[test]
fn shared_children_are_rejected() {
    let mut root = Node::new("r".into(), NodeKind::sequence());
    let mut a = Node::new("a".into(), NodeKind::sequence());
    let leaf = Node::new("leaf".into(), NodeKind::action("ok"));
    root.children = vec!["a".into(), "leaf".into()];
    a.children = vec!["leaf".into()];

    let model = TreeModel::from_parts("shared", Some("r".into()), vec![root, a, leaf], Blackboard::new());
    let err = compile(&model, &registry()).err().unwrap();
    assert_eq!(err, CompileError::SharedNode("leaf".into()));
}

#[test]
fn unregistered_behaviors_are_rejected() {
    let mut model = TreeModel::new("missing");
    let root = model.add_node_with_id("root", NodeKind::sequence()).unwrap();
    let leaf = model.add_child(&root, "leaf", NodeKind::action("nope")).unwrap();

    let err = compile(&model, &registry()).err().unwrap();
    assert_eq!(
        err,
        CompileError::UnknownBehavior {
            node: leaf.clone(),
            role: BehaviorRole::Action,
            behavior: "nope".into(),
        }
    );

    let mut model = TreeModel::new("missing-modifier");
    let root = model.add_node_with_id("root", NodeKind::sequence()).unwrap();
    model
        .set_modifier(&root, Some(ModifierKind::Custom("nope".into())))
        .unwrap();
    assert!(matches!(
        compile(&model, &registry()),
        Err(CompileError::UnknownBehavior {
            role: BehaviorRole::Modifier,
            ..
        })
    ));
}

#[test]
fn lower_priority_abort_needs_a_parent() {
    let mut model = TreeModel::new("abort-root");
    let root = model.add_node_with_id("root", NodeKind::Flow(FlowKind::Selector)).unwrap();
    model
        .add_decorator(&root, Decorator::new("always").aborts(AbortsType::LowerPriority))
        .unwrap();

    let err = compile(&model, &registry()).err().unwrap();
    assert_eq!(err, CompileError::InvalidAbort(root));
}

#[test]
fn empty_model_does_not_compile() {
    let err = compile(&TreeModel::new("empty"), &registry()).err().unwrap();
    assert_eq!(err, CompileError::EmptyTree);
}

#[test]
fn only_aborting_decorators_become_guards() {
    let mut model = sample_model();
    let c = NodeId::from("c");
    let a = NodeId::from("a");
    model
        .add_decorator(&c, Decorator::new("always").aborts(AbortsType::SelfBranch))
        .unwrap();
    model
        .add_decorator(&a, Decorator::new("always"))
        .unwrap();
    model
        .add_decorator(&a, Decorator::new("always").aborts(AbortsType::Both))
        .unwrap();

    let tree = compile(&model, &registry()).unwrap();
    assert_eq!(tree.guard_count(), 2);
    assert_eq!(tree.nodes()[1].decorator_count(), 2);
}
