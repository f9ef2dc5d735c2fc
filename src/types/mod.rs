pub(crate) mod action;
pub(crate) mod catalog;
pub(crate) mod error;
pub(crate) mod external;
pub(crate) mod path;
pub(crate) mod report;
pub(crate) mod rule;
pub(crate) mod state;
pub(crate) mod value;

pub use action::{
    Action, DerivationContext, DeriveError, DeriveFn, FilterBy, FilterFn, FilterSpec, LookupSpec,
};
pub use catalog::{CatalogBuilder, RuleBuilder, RuleCatalog};
pub use error::{CatalogError, SessionError};
pub use external::{ExternalData, Record};
pub use path::{FieldPath, Segment};
pub use report::ChangeReport;
pub use rule::{Condition, Rule, Trigger};
pub use state::FormState;
pub use value::Value;
