use thiserror::Error;

use crate::parse::PathError;

/// Catalog validation failures, surfaced by
/// [`CatalogBuilder::compile`](crate::CatalogBuilder::compile).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog has no rules")]
    Empty,

    #[error("duplicate rule id '{id}'")]
    DuplicateRule { id: String },

    #[error("rule '{rule}' has no trigger field; call on()")]
    MissingTrigger { rule: String },

    #[error("rule '{rule}' has no action")]
    MissingAction { rule: String },

    #[error("rule '{rule}' declares more than one action")]
    ConflictingActions { rule: String },

    #[error("rule '{rule}': {source}")]
    InvalidPath {
        rule: String,
        #[source]
        source: PathError,
    },

    #[error("rule '{rule}' writes to its own trigger field '{field}'")]
    SelfReferential { rule: String, field: String },

    #[error("rule '{rule}' has an incomplete lookup; matching() and copying() are both required")]
    IncompleteLookup { rule: String },

    #[error("rule '{rule}' must declare exactly one of by() or with()")]
    InvalidFilter { rule: String },

    #[error("unconditional rule cycle: {}", path.join(" -> "))]
    UnconditionalCycle { path: Vec<String> },
}

/// Session construction failures, surfaced by
/// [`FormSession::new`](crate::FormSession::new).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("rule '{rule}' references external list '{list}' which was not provided")]
    MissingList { rule: String, list: String },
}
