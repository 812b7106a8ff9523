use std::collections::BTreeSet;

use schema_bt::{ModelError, ModifierKind, NodeId, NodeKind, NodeStatus, TreeModel};

fn priority(model: &TreeModel, id: &str) -> u32 {
    model.node(&NodeId::from(id)).map_or(u32::MAX, |n| n.priority)
}

/// root(sel) -> [a(seq) -> [a1], b]
fn model() -> TreeModel {
    let mut model = TreeModel::new("edit");
    let root = model.add_node_with_id("root", NodeKind::selector()).unwrap();
    let a = model.add_child(&root, "a", NodeKind::sequence()).unwrap();
    model.add_child(&a, "a1", NodeKind::action("noop")).unwrap();
    model.add_child(&root, "b", NodeKind::action("noop")).unwrap();
    model
}

#[test]
fn priorities_follow_preorder_and_track_edits() {
    let mut model = model();
    assert_eq!(
        ["root", "a", "a1", "b"].map(|id| priority(&model, id)),
        [1, 2, 3, 4]
    );

    model
        .reorder(&"root".into(), &"b".into(), 0)
        .unwrap();
    assert_eq!(
        ["root", "b", "a", "a1"].map(|id| priority(&model, id)),
        [1, 2, 3, 4]
    );

    model.disconnect(&"root".into(), &"a".into()).unwrap();
    assert_eq!(priority(&model, "a"), 0);
    assert_eq!(priority(&model, "a1"), 0);
    assert_eq!(priority(&model, "b"), 2);
}

#[test]
fn generated_ids_are_unique_and_first_node_is_root() {
    let mut model = TreeModel::new("ids");
    let ids: Vec<NodeId> = (0..64).map(|_| model.add_node(NodeKind::sequence())).collect();
    let unique: BTreeSet<&str> = ids.iter().map(NodeId::as_str).collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(model.root(), Some(&ids[0]));
}

#[test]
fn connect_rejects_malformed_edges() {
    let mut model = model();
    let root = NodeId::from("root");
    let a = NodeId::from("a");
    let b = NodeId::from("b");
    let loose = model.add_node_with_id("loose", NodeKind::sequence()).unwrap();

    assert_eq!(
        model.connect(&b, &loose),
        Err(ModelError::NotComposite(b.clone()))
    );
    assert_eq!(
        model.connect(&loose, &b),
        Err(ModelError::AlreadyParented(b.clone()))
    );
    assert_eq!(
        model.connect(&a, &root),
        Err(ModelError::RootHasParent(root.clone()))
    );

    model.connect(&a, &loose).unwrap();
    let looser = model.add_node_with_id("looser", NodeKind::sequence()).unwrap();
    model.connect(&loose, &looser).unwrap();
    model.disconnect(&root, &a).unwrap();
    assert_eq!(
        model.connect(&looser, &a),
        Err(ModelError::WouldCreateCycle {
            parent: looser.clone(),
            child: a.clone(),
        })
    );
    assert_eq!(
        model.add_node_with_id("a", NodeKind::sequence()),
        Err(ModelError::DuplicateId(a))
    );
}

#[test]
fn failed_add_child_leaves_no_orphan() {
    let mut model = model();
    let err = model
        .add_child(&"b".into(), "c", NodeKind::action("noop"))
        .unwrap_err();
    assert_eq!(err, ModelError::NotComposite("b".into()));
    assert!(model.node(&"c".into()).is_none());
    assert_eq!(model.len(), 4);
}

#[test]
fn removing_a_node_detaches_its_children() {
    let mut model = model();
    let removed = model.remove_node(&"a".into()).unwrap();
    assert_eq!(removed.children, vec![NodeId::from("a1")]);

    let a1 = model.node(&"a1".into()).unwrap();
    assert_eq!(a1.parent, None);
    assert_eq!(a1.priority, 0);
    assert_eq!(
        model.node(&"root".into()).map(|n| n.children.clone()),
        Some(vec![NodeId::from("b")])
    );

    model.remove_node(&"root".into()).unwrap();
    assert_eq!(model.root(), None);
    assert!(model.set_root(&"a1".into()).is_ok());
    assert_eq!(priority(&model, "a1"), 1);
}

#[test]
fn decorators_and_modifiers_are_editable() {
    let mut model = model();
    let b = NodeId::from("b");

    assert_eq!(
        model.add_decorator(&b, schema_bt::Decorator::new("ready")),
        Ok(0)
    );
    assert!(matches!(
        model.remove_decorator(&b, 3),
        Err(ModelError::PositionOutOfRange { position: 3, .. })
    ));
    assert!(model.remove_decorator(&b, 0).is_ok());

    let old = model
        .set_modifier(&b, Some(ModifierKind::Loop { count: 2 }))
        .unwrap();
    assert_eq!(old, None);
    let old = model
        .set_modifier(
            &b,
            Some(ModifierKind::ForceStatus {
                status: NodeStatus::Success,
            }),
        )
        .unwrap();
    assert_eq!(old, Some(ModifierKind::Loop { count: 2 }));
    assert_eq!(
        model.set_modifier(&"ghost".into(), None),
        Err(ModelError::UnknownNode("ghost".into()))
    );
}
