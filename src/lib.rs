mod compile;
mod debounce;
mod engine;
mod error;
mod execute;
mod parse;
mod types;

pub use debounce::DebounceScheduler;
pub use engine::FormSession;
pub use error::ReformError;
pub use parse::PathError;
pub use types::{
    Action, CatalogBuilder, CatalogError, ChangeReport, Condition, DerivationContext, DeriveError,
    DeriveFn, ExternalData, FieldPath, FilterBy, FilterFn, FilterSpec, FormState, LookupSpec,
    Record, Rule, RuleBuilder, RuleCatalog, Segment, SessionError, Trigger, Value,
};
