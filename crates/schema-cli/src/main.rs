//! Schema CLI - headless behavior tree simulator.
//!
//! - `schema run <sim.yaml>` - tick every agent of a described tree
//! - `schema compile <sim.yaml>` - print the flattened tree

mod build;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use schema_bt::{compile, ExecutableKind, Session};
use schema_core::{EntryId, TickContext};
use schema_tools::SharedTraceLog;

use crate::build::SimWorld;
use crate::config::SimConfig;

#[derive(Parser)]
#[command(name = "schema")]
#[command(about = "Behavior tree simulator", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// Simulation file
        config: PathBuf,

        /// Override the number of ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// Write the node transition trace as JSON
        #[arg(long)]
        trace: Option<PathBuf>,
    },

    /// Compile the tree and print its flattened layout
    Compile {
        /// Simulation file
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    if cli.json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    match cli.command {
        Commands::Run {
            config,
            ticks,
            trace,
        } => run(&config, ticks, trace.as_deref()),
        Commands::Compile { config } => show_compiled(&config),
    }
}

fn run(path: &Path, ticks: Option<u64>, trace_path: Option<&Path>) -> Result<()> {
    let config = SimConfig::load(path)?;
    let registry = build::registry(&config)?;
    let model = build::model(&config)?;
    let tree = compile(&model, &registry)
        .with_context(|| format!("Failed to compile tree {}", config.name))?;

    let trace = SharedTraceLog::new();
    let mut session = Session::with_config(config.runtime).with_trace(trace.clone());
    for entry in &config.globals {
        session
            .globals_mut()
            .declare(entry.clone())
            .with_context(|| format!("Invalid global entry {}", entry.name))?;
    }
    let handle = session.add_tree(tree);
    for agent in &config.agents {
        session.bind(handle, *agent)?;
    }

    let ticks = ticks.unwrap_or(config.ticks);
    info!(tree = %config.name, agents = config.agents.len(), ticks, "Starting simulation");

    let mut world = SimWorld;
    let mut ctx = TickContext::start(config.dt_seconds);
    for _ in 0..ticks {
        for write in config.writes.iter().filter(|w| w.tick == ctx.tick) {
            let targets = match write.agent {
                Some(agent) => vec![agent],
                None => config.agents.clone(),
            };
            for agent in targets {
                session
                    .set_value(handle, agent, EntryId(write.entry), write.value.clone())
                    .with_context(|| format!("Scheduled write to entry {} failed", write.entry))?;
            }
        }

        for (agent, status) in session.tick_all(handle, &ctx, &mut world)? {
            let cursor = session.cursor(handle, agent);
            info!(tick = ctx.tick, agent, ?status, ?cursor, "tick");
        }
        ctx = ctx.next();
    }

    let log = trace.snapshot();
    info!(events = log.events.len(), "Simulation finished");
    if let Some(trace_path) = trace_path {
        let json = serde_json::to_string_pretty(&log)?;
        std::fs::write(trace_path, json)
            .with_context(|| format!("Failed to write trace to {}", trace_path.display()))?;
        info!(path = %trace_path.display(), "Trace written");
    }
    Ok(())
}

fn show_compiled(path: &Path) -> Result<()> {
    let config = SimConfig::load(path)?;
    let registry = build::registry(&config)?;
    let model = build::model(&config)?;
    let tree = compile(&model, &registry)
        .with_context(|| format!("Failed to compile tree {}", config.name))?;

    println!("{} ({} nodes, {} guards)", tree.name(), tree.len(), tree.guard_count());
    println!("{:>5} {:>7} {:>8}  {:<10} id", "index", "breadth", "priority", "kind");
    for node in tree.nodes() {
        let kind = match node.kind {
            ExecutableKind::Flow(flow) => format!("{flow:?}"),
            ExecutableKind::Action => "Action".to_owned(),
        };
        let depth = std::iter::successors(node.parent, |&p| tree.node(p).and_then(|n| n.parent)).count();
        println!(
            "{:>5} {:>7} {:>8}  {:<10} {}{}",
            node.index,
            node.breadth,
            node.priority,
            kind,
            "  ".repeat(depth),
            node.id
        );
    }
    Ok(())
}
