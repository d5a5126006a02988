//! Code completion: trigger classification, the caller tables, semantic
//! resolution against the project snapshot, overload insight and ranking

pub mod callers;
pub mod context;
pub mod engine;
pub mod item;
pub mod overload;
pub mod ranking;
pub mod resolver;
pub mod trigger;

use thiserror::Error;

pub use callers::{CallerEntry, CallerPrefix, CallerTables, MODEL_CALLER, POINT_CALLER};
pub use context::{CompletionContext, ScriptInputs, ScriptProvider, ScriptScope, Variable};
pub use engine::{CompletionEngine, CompletionResult};
pub use item::{CandidateKind, CompletionItem};
pub use overload::{OverloadProvider, OverloadSignature};
pub use resolver::{ResolvedCandidate, SemanticResolver, SnapshotResolver};
pub use trigger::{Dispatch, TriggerWord};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion offset {offset} is past the end of the document ({length} characters)")]
    OffsetOutOfRange { offset: usize, length: usize },
}
