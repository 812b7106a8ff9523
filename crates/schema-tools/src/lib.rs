//! Tooling primitives for inspecting behavior tree execution.
//!
//! The runtime reports node transitions (enter, exit, gate failures, aborts)
//! as small [`TraceEvent`] records. Debuggers and the CLI plug in a
//! [`TraceSink`]; the default sink drops everything.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{tags, NullTraceSink, SharedTraceLog, TraceEvent, TraceLog, TraceSink, VecTraceSink};
