use schema_bt::{
    compile, Action, BehaviorRegistry, NodeContext, NodeKind, NodeStatus, RuntimeError, Session,
    TreeHandle, TreeModel,
};
use schema_core::{TickContext, WorldMut, WorldView};

#[derive(Debug, Default)]
struct World {
    log: Vec<String>,
}

impl WorldView for World {
    type Agent = u64;
}

impl WorldMut for World {}

/// Logs enter/exit with the agent id and stays Running.
struct Hold(&'static str);

impl Action<World> for Hold {
    type Memory = u32;

    fn on_node_enter(&self, _memory: &mut u32, cx: &mut NodeContext<'_, World>) {
        cx.world.log.push(format!("enter:{}:{}", self.0, cx.agent));
    }

    fn on_node_exit(&self, _memory: &mut u32, cx: &mut NodeContext<'_, World>) {
        cx.world.log.push(format!("exit:{}:{}", self.0, cx.agent));
    }

    fn tick(&self, ticks: &mut u32, _cx: &mut NodeContext<'_, World>) -> NodeStatus {
        *ticks += 1;
        NodeStatus::Running
    }
}

fn registry() -> BehaviorRegistry<World> {
    BehaviorRegistry::new()
        .with_action("hold", Hold("hold"))
        .with_action("other", Hold("other"))
}

/// root(seq) -> branch(seq) -> leaf
fn nested(leaf: &str) -> TreeModel {
    let mut model = TreeModel::new("lifecycle");
    let root = model.add_node_with_id("root", NodeKind::sequence()).unwrap();
    let branch = model.add_child(&root, "branch", NodeKind::sequence()).unwrap();
    model.add_child(&branch, "leaf", NodeKind::action(leaf)).unwrap();
    model
}

fn session(agents: &[u64]) -> (Session<World>, TreeHandle) {
    let mut session = Session::new();
    let handle = session.add_tree(compile(&nested("hold"), &registry()).unwrap());
    for agent in agents {
        session.bind(handle, *agent).unwrap();
    }
    (session, handle)
}

#[test]
fn binding_twice_is_rejected() {
    let (mut session, handle) = session(&[4]);
    assert_eq!(session.bind(handle, 4), Err(RuntimeError::AlreadyBound(4)));
    assert!(session.is_bound(handle, 4));
    assert!(!session.is_bound(handle, 5));
}

#[test]
fn ticking_an_unbound_agent_is_an_error() {
    let (mut session, handle) = session(&[]);
    let mut world = World::default();
    let err = session
        .tick(handle, 9, &TickContext::default(), &mut world)
        .unwrap_err();
    assert_eq!(err, RuntimeError::UnboundAgent(9));
    assert!(session.context(handle, 9).is_none());
}

#[test]
fn unbind_exits_the_active_path_and_releases_state() {
    let (mut session, handle) = session(&[1, 2]);
    let mut world = World::default();
    let ctx = TickContext::default();

    session.tick(handle, 1, &ctx, &mut world).unwrap();
    session.tick(handle, 2, &ctx, &mut world).unwrap();
    assert_eq!(
        session.context(handle, 1).map(|c| c.active_path().to_vec()),
        Some(vec![0, 1, 2])
    );
    assert!(session.memory_record_count(handle, 1) > 0);
    world.log.clear();

    session.unbind(handle, 1, &ctx, &mut world).unwrap();
    assert_eq!(world.log, vec!["exit:hold:1"]);
    assert!(!session.is_bound(handle, 1));
    assert_eq!(session.memory_record_count(handle, 1), 0);

    // The other agent is untouched.
    assert_eq!(session.cursor(handle, 2), Some(2));
    assert_eq!(
        session.memory(handle, 2, 2).and_then(|m| m.downcast::<u32>().copied()),
        Some(1)
    );

    // Rebinding starts from scratch.
    session.bind(handle, 1).unwrap();
    assert_eq!(session.cursor(handle, 1), None);
    session.tick(handle, 1, &ctx.next(), &mut world).unwrap();
    assert_eq!(world.log, vec!["exit:hold:1", "enter:hold:1"]);
}

#[test]
fn tick_all_visits_agents_in_id_order() {
    let (mut session, handle) = session(&[30, 10, 20]);
    let mut world = World::default();

    let results = session
        .tick_all(handle, &TickContext::default(), &mut world)
        .unwrap();
    assert_eq!(
        results,
        vec![
            (10, NodeStatus::Running),
            (20, NodeStatus::Running),
            (30, NodeStatus::Running)
        ]
    );
    assert_eq!(
        world.log,
        vec!["enter:hold:10", "enter:hold:20", "enter:hold:30"]
    );
}

#[test]
fn restart_exits_and_reenters_from_the_root() {
    let (mut session, handle) = session(&[1]);
    let mut world = World::default();
    let ctx = TickContext::default();

    session.tick(handle, 1, &ctx, &mut world).unwrap();
    session.restart(handle, 1, &ctx, &mut world).unwrap();
    assert_eq!(session.cursor(handle, 1), None);
    assert_eq!(
        session.context(handle, 1).map(|c| c.active_path().len()),
        Some(0)
    );

    session.tick(handle, 1, &ctx.next(), &mut world).unwrap();
    assert_eq!(
        world.log,
        vec!["enter:hold:1", "exit:hold:1", "enter:hold:1"]
    );
    // Memory survives a restart.
    assert_eq!(
        session.memory(handle, 1, 2).and_then(|m| m.downcast::<u32>().copied()),
        Some(2)
    );
}

#[test]
fn replacing_a_tree_unbinds_its_agents() {
    let (mut session, handle) = session(&[1, 2]);
    let mut world = World::default();
    let ctx = TickContext::default();
    session.tick_all(handle, &ctx, &mut world).unwrap();
    world.log.clear();

    let replacement = compile(&nested("other"), &registry()).unwrap();
    let unbound = session
        .replace_tree(handle, replacement, &ctx, &mut world)
        .unwrap();
    assert_eq!(unbound, vec![1, 2]);
    assert_eq!(world.log, vec!["exit:hold:1", "exit:hold:2"]);
    assert!(session.agents(handle).unwrap().is_empty());
    assert_eq!(session.memory_record_count(handle, 1), 0);

    session.bind(handle, 1).unwrap();
    session.tick(handle, 1, &ctx.next(), &mut world).unwrap();
    assert_eq!(world.log.last().map(String::as_str), Some("enter:other:1"));
}
