use schema_bt::nodes::{
    Compare, CompareOp, FnAction, IsSet, SetDynamic, SetValue, Slot, Subtract, Trigonometry, Wait,
};
use schema_bt::{
    compile, Action, BehaviorRegistry, Decorator, NodeContext, NodeKind, NodeStatus, Session,
    TreeHandle, TreeModel,
};
use schema_core::{
    Blackboard, BlackboardEntry, EntryId, EntryKey, EntrySelector, ObjectRef, TickContext, Value,
    ValueType, WorldMut, WorldView,
};

#[derive(Debug, Default)]
struct World {
    log: Vec<&'static str>,
    seen: Vec<Option<Value>>,
}

impl WorldView for World {
    type Agent = u64;
}

impl WorldMut for World {}

const COUNTER: EntryKey<i64> = EntryKey::new(1);
const TOTAL: EntryKey<i64> = EntryKey::new(2);

fn blackboard() -> Blackboard {
    Blackboard::with_entries([
        BlackboardEntry::local(1, "counter", ValueType::Int),
        BlackboardEntry::global(2, "total", ValueType::Int),
        BlackboardEntry::local(3, "lhs", ValueType::Float),
        BlackboardEntry::local(4, "difference", ValueType::Float),
        BlackboardEntry::local(5, "cosine", ValueType::Float),
        BlackboardEntry::local(6, "target", ValueType::Object),
        BlackboardEntry::local(7, "delay", ValueType::Float),
    ])
    .unwrap()
}

/// Bumps the agent's local counter, the shared total and its own memory.
struct Bump;

impl Action<World> for Bump {
    type Memory = u32;

    fn tick(&self, ticks: &mut u32, cx: &mut NodeContext<'_, World>) -> NodeStatus {
        *ticks += 1;
        let counter = cx.blackboard.get(COUNTER).unwrap();
        cx.blackboard.set(COUNTER, counter + 1).unwrap();
        let total = cx.blackboard.get(TOTAL).unwrap();
        cx.blackboard.set(TOTAL, total + 1).unwrap();
        NodeStatus::Success
    }
}

fn mark(tag: &'static str) -> impl Action<World> {
    FnAction::new(move |cx: &mut NodeContext<'_, World>| {
        cx.world.log.push(tag);
        NodeStatus::Success
    })
}

fn peek_dynamic(name: &'static str) -> impl Action<World> {
    FnAction::new(move |cx: &mut NodeContext<'_, World>| {
        let value = cx.blackboard.get_dynamic(name);
        cx.world.seen.push(value);
        NodeStatus::Success
    })
}

fn sequence_of(leaves: &[&str]) -> TreeModel {
    let mut model = TreeModel::new("blackboard").with_blackboard(blackboard());
    let root = model.add_node_with_id("root", NodeKind::sequence()).unwrap();
    for leaf in leaves {
        model.add_child(&root, *leaf, NodeKind::action(*leaf)).unwrap();
    }
    model
}

fn start(
    model: &TreeModel,
    registry: &BehaviorRegistry<World>,
    agents: &[u64],
) -> (Session<World>, TreeHandle) {
    let mut session = Session::new();
    let handle = session.add_tree(compile(model, registry).unwrap());
    for agent in agents {
        session.bind(handle, *agent).unwrap();
    }
    (session, handle)
}

#[test]
fn locals_and_memory_are_per_agent_while_globals_are_shared() {
    let registry = BehaviorRegistry::new().with_action("bump", Bump);
    let (mut session, handle) = start(&sequence_of(&["bump"]), &registry, &[1, 2]);
    let mut world = World::default();
    let mut ctx = TickContext::default();

    for _ in 0..3 {
        session.tick(handle, 1, &ctx, &mut world).unwrap();
        ctx = ctx.next();
    }
    session.tick(handle, 2, &ctx, &mut world).unwrap();

    assert_eq!(session.get_value(handle, 1, COUNTER.id()).unwrap(), Value::Int(3));
    assert_eq!(session.get_value(handle, 2, COUNTER.id()).unwrap(), Value::Int(1));
    assert_eq!(session.get_value(handle, 2, TOTAL.id()).unwrap(), Value::Int(4));

    let ticks = |session: &mut Session<World>, agent| {
        session
            .memory(handle, agent, 1)
            .and_then(|m| m.downcast::<u32>().copied())
    };
    assert_eq!(ticks(&mut session, 1), Some(3));
    assert_eq!(ticks(&mut session, 2), Some(1));
}

#[test]
fn globals_are_visible_across_trees_of_a_session() {
    let registry = BehaviorRegistry::new().with_action("bump", Bump);
    let model = sequence_of(&["bump"]);
    let mut session = Session::new();
    let first = session.add_tree(compile(&model, &registry).unwrap());
    let second = session.add_tree(compile(&model, &registry).unwrap());
    session.bind(first, 1).unwrap();
    session.bind(second, 1).unwrap();

    let mut world = World::default();
    let ctx = TickContext::default();
    session.tick(first, 1, &ctx, &mut world).unwrap();
    session.tick(second, 1, &ctx, &mut world).unwrap();

    assert_eq!(session.get_value(first, 1, TOTAL.id()).unwrap(), Value::Int(2));
    // Locals belong to the tree the agent is bound to.
    assert_eq!(session.get_value(first, 1, COUNTER.id()).unwrap(), Value::Int(1));
    assert_eq!(session.get_value(second, 1, COUNTER.id()).unwrap(), Value::Int(1));
}

#[test]
fn dynamic_variables_live_only_inside_the_declaring_composite() {
    // root(seq) -> [scope(seq) -> [publish, inside], outside]
    let registry = BehaviorRegistry::new()
        .with_action("publish", SetDynamic::new("target", 5_i64))
        .with_action("inside", peek_dynamic("target"))
        .with_action("outside", peek_dynamic("target"));
    let mut model = TreeModel::new("dynamic");
    let root = model.add_node_with_id("root", NodeKind::sequence()).unwrap();
    let scope = model.add_child(&root, "scope", NodeKind::sequence()).unwrap();
    model.add_child(&scope, "publish", NodeKind::action("publish")).unwrap();
    model.add_child(&scope, "inside", NodeKind::action("inside")).unwrap();
    model.add_child(&root, "outside", NodeKind::action("outside")).unwrap();

    let (mut session, handle) = start(&model, &registry, &[1, 2]);
    let mut world = World::default();
    session.tick(handle, 1, &TickContext::default(), &mut world).unwrap();

    assert_eq!(world.seen, vec![Some(Value::Int(5)), None]);
    // The out-of-scope read evicted the binding.
    assert!(session.dynamic_binding(handle, 1, "target").is_none());
    assert!(session.dynamic_binding(handle, 2, "target").is_none());
}

#[test]
fn dynamic_bindings_are_agent_scoped() {
    // root(seq) -> [publish, wait]: the binding stays live while suspended.
    let registry = BehaviorRegistry::new()
        .with_action("publish", SetDynamic::new("alert", true))
        .with_action("wait", Wait::seconds(10.0));
    let (mut session, handle) = start(&sequence_of(&["publish", "wait"]), &registry, &[1, 2]);
    let mut world = World::default();

    session.tick(handle, 1, &TickContext::default(), &mut world).unwrap();
    let binding = session.dynamic_binding(handle, 1, "alert").unwrap();
    assert_eq!(binding.value, Value::Bool(true));
    assert_eq!((binding.scope.start, binding.scope.breadth), (0, 3));
    assert!(session.dynamic_binding(handle, 2, "alert").is_none());
}

#[test]
fn mistyped_write_fails_the_leaf() {
    let registry = BehaviorRegistry::new()
        .with_action("bad", SetValue::entry(COUNTER.id(), 2.5_f32))
        .with_action("after", mark("after"));
    let (mut session, handle) = start(&sequence_of(&["bad", "after"]), &registry, &[1]);
    let mut world = World::default();

    let status = session.tick(handle, 1, &TickContext::default(), &mut world).unwrap();
    assert_eq!(status, NodeStatus::Failure);
    assert!(world.log.is_empty());
    assert_eq!(session.get_value(handle, 1, COUNTER.id()).unwrap(), Value::Int(0));
}

#[test]
fn wait_reads_the_host_clock_on_entry() {
    let registry = BehaviorRegistry::new().with_action("wait", Wait::seconds(0.5));
    let (mut session, handle) = start(&sequence_of(&["wait"]), &registry, &[1]);
    let mut world = World::default();
    let mut ctx = TickContext::new(0, 10.0, 0.2);

    let mut statuses = Vec::new();
    for _ in 0..4 {
        statuses.push(session.tick(handle, 1, &ctx, &mut world).unwrap());
        ctx = ctx.next();
    }
    assert_eq!(
        statuses,
        vec![
            NodeStatus::Running,
            NodeStatus::Running,
            NodeStatus::Running,
            NodeStatus::Success
        ]
    );
}

#[test]
fn wait_duration_can_come_from_the_blackboard() {
    let delay = EntryKey::<f32>::new(7);
    let registry = BehaviorRegistry::new().with_action("wait", Wait::new(EntrySelector::entry(delay)));
    let (mut session, handle) = start(&sequence_of(&["wait"]), &registry, &[1, 2]);
    session.set_value(handle, 2, delay.id(), 1.0_f32).unwrap();
    let mut world = World::default();
    let ctx = TickContext::new(0, 0.0, 0.25);

    // Agent 1 reads 0.0, which clamps to the minimum duration.
    assert_eq!(session.tick(handle, 1, &ctx, &mut world).unwrap(), NodeStatus::Running);
    assert_eq!(session.tick(handle, 1, &ctx.next(), &mut world).unwrap(), NodeStatus::Success);

    assert_eq!(session.tick(handle, 2, &ctx, &mut world).unwrap(), NodeStatus::Running);
    assert_eq!(session.tick(handle, 2, &ctx.next(), &mut world).unwrap(), NodeStatus::Running);
}

#[test]
fn arithmetic_leaves_write_their_output() {
    let lhs = EntryKey::<f32>::new(3);
    let difference = EntryKey::<f32>::new(4);
    let cosine = EntryKey::<f32>::new(5);
    let registry = BehaviorRegistry::new()
        .with_action(
            "subtract",
            Subtract {
                lhs: EntrySelector::entry(lhs),
                rhs: EntrySelector::inline(2.0),
                output: EntrySelector::entry(difference),
            },
        )
        .with_action(
            "cos",
            Trigonometry::cos(EntrySelector::inline(180.0), EntrySelector::entry(cosine)).in_degrees(),
        );
    let (mut session, handle) = start(&sequence_of(&["subtract", "cos"]), &registry, &[1]);
    session.set_value(handle, 1, lhs.id(), 5.0_f32).unwrap();

    let mut world = World::default();
    let status = session.tick(handle, 1, &TickContext::default(), &mut world).unwrap();
    assert_eq!(status, NodeStatus::Success);

    assert_eq!(session.get_value(handle, 1, difference.id()).unwrap(), Value::Float(3.0));
    let Value::Float(cos) = session.get_value(handle, 1, cosine.id()).unwrap() else {
        panic!("cosine entry holds a float");
    };
    assert!((cos + 1.0).abs() < 1e-5, "cos(180deg) = {cos}");
}

#[test]
fn comparison_and_presence_conditions_gate_branches() {
    // root(sel) -> [armed: fire [counter > 2], tracked: track [target set], idle]
    let registry = BehaviorRegistry::new()
        .with_action("fire", mark("fire"))
        .with_action("track", mark("track"))
        .with_action("idle", mark("idle"))
        .with_conditional(
            "loaded",
            Compare {
                slot: Slot::Entry(COUNTER.id()),
                op: CompareOp::Gt,
                value: Value::Int(2),
            },
        )
        .with_conditional("has_target", IsSet::entry(EntryId(6)));

    let mut model = TreeModel::new("gates").with_blackboard(blackboard());
    let root = model.add_node_with_id("root", NodeKind::selector()).unwrap();
    let fire = model.add_child(&root, "fire", NodeKind::action("fire")).unwrap();
    let track = model.add_child(&root, "track", NodeKind::action("track")).unwrap();
    model.add_child(&root, "idle", NodeKind::action("idle")).unwrap();
    model.add_decorator(&fire, Decorator::new("loaded")).unwrap();
    model.add_decorator(&track, Decorator::new("has_target")).unwrap();

    let (mut session, handle) = start(&model, &registry, &[1]);
    let mut world = World::default();
    let mut ctx = TickContext::default();

    session.tick(handle, 1, &ctx, &mut world).unwrap();
    assert_eq!(world.log, vec!["idle"]);

    session
        .set_value(handle, 1, EntryId(6), ObjectRef::new(42))
        .unwrap();
    ctx = ctx.next();
    session.tick(handle, 1, &ctx, &mut world).unwrap();
    assert_eq!(world.log, vec!["idle", "track"]);

    session.set_value(handle, 1, COUNTER.id(), 3_i64).unwrap();
    ctx = ctx.next();
    session.tick(handle, 1, &ctx, &mut world).unwrap();
    assert_eq!(world.log, vec!["idle", "track", "fire"]);
}

#[test]
fn absent_dynamic_variable_counts_as_unset() {
    let registry = BehaviorRegistry::new()
        .with_action("guarded", mark("guarded"))
        .with_action("fallback", mark("fallback"))
        .with_conditional("has_alert", IsSet::dynamic("alert"));
    let mut model = TreeModel::new("unset");
    let root = model.add_node_with_id("root", NodeKind::selector()).unwrap();
    let guarded = model.add_child(&root, "guarded", NodeKind::action("guarded")).unwrap();
    model.add_child(&root, "fallback", NodeKind::action("fallback")).unwrap();
    model.add_decorator(&guarded, Decorator::new("has_alert")).unwrap();

    let (mut session, handle) = start(&model, &registry, &[1]);
    let mut world = World::default();
    session.tick(handle, 1, &TickContext::default(), &mut world).unwrap();
    assert_eq!(world.log, vec!["fallback"]);
}
