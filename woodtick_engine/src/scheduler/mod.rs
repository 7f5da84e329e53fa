//! VM-agnostic scheduling core: completion predicates, the continuation
//! queue and the registry of cooperative script threads.

mod condition;
mod queue;
mod registry;
mod thread;

pub use condition::{Condition, WorldView};
pub use queue::{Continuation, ContinuationQueue, Verdict};
pub use registry::ThreadRegistry;
pub use thread::{
    Coroutine, ExitReason, RunState, ScriptThread, SegmentEnd, ThreadId, ThreadState,
};

#[cfg(test)]
pub(crate) use condition::tests::StubWorld;

use thiserror::Error;

/// Script-facing scheduler failures. They surface in Lua as catchable errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("{0} must be called from inside a script thread")]
    NoCurrentThread(&'static str),
    #[error("thread handle range exhausted")]
    ThreadHandlesExhausted,
    #[error("{function}: unknown actor `{actor}`")]
    UnknownActor {
        function: &'static str,
        actor: String,
    },
    #[error("{function}: `{target}` is neither an actor nor an object")]
    UnknownEntity {
        function: &'static str,
        target: String,
    },
    #[error("{function}: expected {expected}, got {found}")]
    InvalidArgument {
        function: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("{0} is not callable")]
    NotCallable(String),
    #[error("thread {name} failed: {message}")]
    ThreadFailed { name: String, message: String },
}
