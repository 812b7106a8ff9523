//! Built-in leaves.
//!
//! These are thin wrappers over blackboard data; anything touching host
//! systems belongs in host-provided behaviors registered next to them.
//! Blackboard errors never escape a leaf: they are logged and the node fails.

use core::marker::PhantomData;

use schema_core::{BlackboardError, EntryId, EntrySelector, Value, WorldMut};
use tracing::{info, warn};

use crate::behavior::{Action, Conditional, NodeContext};
use crate::NodeStatus;

fn failed<W: WorldMut>(cx: &NodeContext<'_, W>, leaf: &'static str, err: BlackboardError) -> NodeStatus {
    warn!(node = cx.node, leaf, error = %err, "blackboard access failed");
    NodeStatus::Failure
}

/// Untyped blackboard location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Entry(EntryId),
    Dynamic(String),
}

impl Slot {
    fn read<W: WorldMut>(&self, cx: &mut NodeContext<'_, W>) -> Result<Option<Value>, BlackboardError> {
        match self {
            Slot::Entry(id) => cx.blackboard.get_value(*id).map(Some),
            Slot::Dynamic(name) => Ok(cx.blackboard.get_dynamic(name)),
        }
    }

    fn write<W: WorldMut>(&self, cx: &mut NodeContext<'_, W>, value: Value) -> Result<(), BlackboardError> {
        match self {
            Slot::Entry(id) => cx.blackboard.set_value(*id, value),
            Slot::Dynamic(name) => cx.blackboard.set_dynamic(name, value),
        }
    }
}

#[derive(Debug, Default)]
pub struct WaitMemory {
    pub started_at: f64,
    pub duration: f64,
}

/// Succeeds once `seconds` of host time have passed since the node was entered.
#[derive(Debug, Clone)]
pub struct Wait {
    seconds: EntrySelector<f32>,
}

impl Wait {
    const MIN_SECONDS: f32 = 0.001;

    pub fn new(seconds: EntrySelector<f32>) -> Self {
        Self { seconds }
    }

    pub fn seconds(seconds: f32) -> Self {
        Self::new(EntrySelector::inline(seconds))
    }
}

impl<W: WorldMut + 'static> Action<W> for Wait {
    type Memory = WaitMemory;

    fn on_node_enter(&self, memory: &mut WaitMemory, cx: &mut NodeContext<'_, W>) {
        let seconds = self.seconds.get(&mut cx.blackboard).unwrap_or_else(|err| {
            warn!(node = cx.node, error = %err, "wait duration unreadable, using minimum");
            Self::MIN_SECONDS
        });
        memory.started_at = cx.tick.time_seconds;
        memory.duration = seconds.max(Self::MIN_SECONDS) as f64;
    }

    fn tick(&self, memory: &mut WaitMemory, cx: &mut NodeContext<'_, W>) -> NodeStatus {
        if cx.tick.time_seconds - memory.started_at >= memory.duration {
            NodeStatus::Success
        } else {
            NodeStatus::Running
        }
    }
}

/// `output = lhs - rhs`
#[derive(Debug, Clone)]
pub struct Subtract {
    pub lhs: EntrySelector<f32>,
    pub rhs: EntrySelector<f32>,
    pub output: EntrySelector<f32>,
}

impl Subtract {
    fn apply<W: WorldMut>(&self, cx: &mut NodeContext<'_, W>) -> Result<(), BlackboardError> {
        let lhs = self.lhs.get(&mut cx.blackboard)?;
        let rhs = self.rhs.get(&mut cx.blackboard)?;
        self.output.set(&mut cx.blackboard, lhs - rhs)
    }
}

impl<W: WorldMut + 'static> Action<W> for Subtract {
    type Memory = ();

    fn tick(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> NodeStatus {
        match self.apply(cx) {
            Ok(()) => NodeStatus::Success,
            Err(err) => failed(cx, "subtract", err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trig {
    Sin,
    Cos,
}

/// `output = sin(input)` or `cos(input)`; `input` in degrees when `degrees` is set.
#[derive(Debug, Clone)]
pub struct Trigonometry {
    pub function: Trig,
    pub input: EntrySelector<f32>,
    pub output: EntrySelector<f32>,
    pub degrees: bool,
}

impl Trigonometry {
    pub fn sin(input: EntrySelector<f32>, output: EntrySelector<f32>) -> Self {
        Self {
            function: Trig::Sin,
            input,
            output,
            degrees: false,
        }
    }

    pub fn cos(input: EntrySelector<f32>, output: EntrySelector<f32>) -> Self {
        Self {
            function: Trig::Cos,
            input,
            output,
            degrees: false,
        }
    }

    pub fn in_degrees(mut self) -> Self {
        self.degrees = true;
        self
    }

    fn apply<W: WorldMut>(&self, cx: &mut NodeContext<'_, W>) -> Result<(), BlackboardError> {
        let mut input = self.input.get(&mut cx.blackboard)?;
        if self.degrees {
            input = input.to_radians();
        }
        let value = match self.function {
            Trig::Sin => input.sin(),
            Trig::Cos => input.cos(),
        };
        self.output.set(&mut cx.blackboard, value)
    }
}

impl<W: WorldMut + 'static> Action<W> for Trigonometry {
    type Memory = ();

    fn tick(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> NodeStatus {
        match self.apply(cx) {
            Ok(()) => NodeStatus::Success,
            Err(err) => failed(cx, "trigonometry", err),
        }
    }
}

/// Writes a constant into an entry or a dynamic variable.
#[derive(Debug, Clone)]
pub struct SetValue {
    pub slot: Slot,
    pub value: Value,
}

impl SetValue {
    pub fn entry(id: EntryId, value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Entry(id),
            value: value.into(),
        }
    }
}

impl<W: WorldMut + 'static> Action<W> for SetValue {
    type Memory = ();

    fn tick(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> NodeStatus {
        match self.slot.write(cx, self.value.clone()) {
            Ok(()) => NodeStatus::Success,
            Err(err) => failed(cx, "set_value", err),
        }
    }
}

/// Publishes a dynamic variable, visible to the node's parent composite
/// subtree for as long as the cursor stays inside it.
#[derive(Debug, Clone)]
pub struct SetDynamic {
    pub name: String,
    pub value: Value,
}

impl SetDynamic {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<W: WorldMut + 'static> Action<W> for SetDynamic {
    type Memory = ();

    fn tick(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> NodeStatus {
        match cx.blackboard.set_dynamic(&self.name, self.value.clone()) {
            Ok(()) => NodeStatus::Success,
            Err(err) => failed(cx, "set_dynamic", err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DebugLog {
    pub message: String,
    pub slot: Option<Slot>,
}

impl DebugLog {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            slot: None,
        }
    }

    pub fn with_value(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }
}

impl<W: WorldMut + 'static> Action<W> for DebugLog {
    type Memory = ();

    fn tick(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> NodeStatus {
        let agent = cx.blackboard.agent();
        match &self.slot {
            None => info!(agent, node = cx.node, "{}", self.message),
            Some(slot) => match slot.read(cx) {
                Ok(value) => info!(agent, node = cx.node, value = ?value, "{}", self.message),
                Err(err) => return failed(cx, "debug_log", err),
            },
        }
        NodeStatus::Success
    }
}

/// Reports a fixed status every tick.
#[derive(Debug, Clone, Copy)]
pub struct ReturnStatus(pub NodeStatus);

impl<W: WorldMut + 'static> Action<W> for ReturnStatus {
    type Memory = ();

    fn tick(&self, _memory: &mut (), _cx: &mut NodeContext<'_, W>) -> NodeStatus {
        self.0
    }
}

/// Passes while the slot holds a non-null value. Absent dynamic variables
/// count as unset.
#[derive(Debug, Clone)]
pub struct IsSet {
    pub slot: Slot,
}

impl IsSet {
    pub fn entry(id: EntryId) -> Self {
        Self {
            slot: Slot::Entry(id),
        }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            slot: Slot::Dynamic(name.into()),
        }
    }
}

impl<W: WorldMut + 'static> Conditional<W> for IsSet {
    type Memory = ();

    fn evaluate(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> bool {
        match self.slot.read(cx) {
            Ok(value) => value.is_some_and(|v| !v.is_null()),
            Err(err) => {
                warn!(node = cx.node, error = %err, "is_set could not read its slot");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v as f64),
        _ => None,
    }
}

impl CompareOp {
    /// Ints and floats compare numerically with each other; other types only
    /// support `Eq`/`Ne`.
    pub fn holds(self, lhs: &Value, rhs: &Value) -> bool {
        if let (Some(l), Some(r)) = (numeric(lhs), numeric(rhs)) {
            return match self {
                CompareOp::Eq => l == r,
                CompareOp::Ne => l != r,
                CompareOp::Lt => l < r,
                CompareOp::Le => l <= r,
                CompareOp::Gt => l > r,
                CompareOp::Ge => l >= r,
            };
        }
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            _ => false,
        }
    }
}

/// `slot <op> value`. An unreadable or absent slot fails the comparison.
#[derive(Debug, Clone)]
pub struct Compare {
    pub slot: Slot,
    pub op: CompareOp,
    pub value: Value,
}

impl<W: WorldMut + 'static> Conditional<W> for Compare {
    type Memory = ();

    fn evaluate(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> bool {
        match self.slot.read(cx) {
            Ok(Some(lhs)) => self.op.holds(&lhs, &self.value),
            Ok(None) => false,
            Err(err) => {
                warn!(node = cx.node, error = %err, "compare could not read its slot");
                false
            }
        }
    }
}

/// Adapts a closure into a memoryless action.
pub struct FnAction<W, F> {
    f: F,
    _world: PhantomData<fn(&mut W)>,
}

impl<W, F> FnAction<W, F>
where
    W: WorldMut + 'static,
    F: Fn(&mut NodeContext<'_, W>) -> NodeStatus + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _world: PhantomData,
        }
    }
}

impl<W, F> Action<W> for FnAction<W, F>
where
    W: WorldMut + 'static,
    F: Fn(&mut NodeContext<'_, W>) -> NodeStatus + Send + Sync + 'static,
{
    type Memory = ();

    fn tick(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> NodeStatus {
        (self.f)(cx)
    }
}

/// Adapts a closure into a memoryless conditional.
pub struct FnCondition<W, F> {
    f: F,
    _world: PhantomData<fn(&mut W)>,
}

impl<W, F> FnCondition<W, F>
where
    W: WorldMut + 'static,
    F: Fn(&mut NodeContext<'_, W>) -> bool + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _world: PhantomData,
        }
    }
}

impl<W, F> Conditional<W> for FnCondition<W, F>
where
    W: WorldMut + 'static,
    F: Fn(&mut NodeContext<'_, W>) -> bool + Send + Sync + 'static,
{
    type Memory = ();

    fn evaluate(&self, _memory: &mut (), cx: &mut NodeContext<'_, W>) -> bool {
        (self.f)(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_mixes_ints_and_floats() {
        assert!(CompareOp::Lt.holds(&Value::Int(1), &Value::Float(1.5)));
        assert!(CompareOp::Ge.holds(&Value::Float(2.0), &Value::Int(2)));
        assert!(CompareOp::Eq.holds(&Value::from("a"), &Value::from("a")));
        assert!(!CompareOp::Lt.holds(&Value::from("a"), &Value::from("b")));
    }
}
