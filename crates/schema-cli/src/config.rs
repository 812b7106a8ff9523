//! Simulation description loaded from YAML.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use schema_bt::nodes::CompareOp;
use schema_bt::{Decorator, ModifierKind, NodeStatus, RuntimeConfig};
use schema_core::{BlackboardEntry, Value};

/// A whole simulation: one tree, the agents running it and the ticks to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub name: String,

    /// Number of ticks `run` executes unless overridden on the command line.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    #[serde(default = "default_dt")]
    pub dt_seconds: f32,

    pub agents: Vec<u64>,

    pub runtime: RuntimeConfig,

    /// Entries of the tree's own blackboard (local or global scope).
    pub blackboard: Vec<BlackboardEntry>,

    /// Global entries declared on the session rather than the tree.
    pub globals: Vec<BlackboardEntry>,

    /// Blackboard writes applied before a given tick.
    pub writes: Vec<ScheduledWrite>,

    /// Built-in leaves by behavior id.
    pub behaviors: BTreeMap<String, BehaviorSpec>,

    pub tree: Option<NodeSpec>,
}

fn default_ticks() -> u64 {
    10
}

fn default_dt() -> f32 {
    0.1
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "simulation".to_owned(),
            ticks: default_ticks(),
            dt_seconds: default_dt(),
            agents: vec![1],
            runtime: RuntimeConfig::default(),
            blackboard: Vec::new(),
            globals: Vec::new(),
            writes: Vec::new(),
            behaviors: BTreeMap::new(),
            tree: None,
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read simulation from {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse simulation from {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledWrite {
    pub tick: u64,
    /// Target agent; `None` writes for every agent (globals only need one).
    #[serde(default)]
    pub agent: Option<u64>,
    pub entry: u64,
    pub value: Value,
}

/// A float input: a constant, an entry id or a dynamic variable name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Inline(f32),
    Entry { entry: u64 },
    Dynamic { dynamic: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSpec {
    Wait {
        seconds: Operand,
    },
    Subtract {
        lhs: Operand,
        rhs: Operand,
        output: Operand,
    },
    Sin {
        input: Operand,
        output: Operand,
        #[serde(default)]
        degrees: bool,
    },
    Cos {
        input: Operand,
        output: Operand,
        #[serde(default)]
        degrees: bool,
    },
    SetValue {
        entry: u64,
        value: Value,
    },
    SetDynamic {
        name: String,
        value: Value,
    },
    DebugLog {
        message: String,
        #[serde(default)]
        entry: Option<u64>,
        #[serde(default)]
        dynamic: Option<String>,
    },
    Return {
        status: NodeStatus,
    },
    IsSet {
        #[serde(default)]
        entry: Option<u64>,
        #[serde(default)]
        dynamic: Option<String>,
    },
    Compare {
        #[serde(default)]
        entry: Option<u64>,
        #[serde(default)]
        dynamic: Option<String>,
        op: CompareOp,
        value: Value,
    },
}

/// Nested tree description; flattened into a `TreeModel` by the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: KindSpec,
    #[serde(default)]
    pub decorators: Vec<Decorator>,
    #[serde(default)]
    pub modifier: Option<ModifierKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindSpec {
    Sequence(Vec<NodeSpec>),
    Selector(Vec<NodeSpec>),
    Action(String),
}
