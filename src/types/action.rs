use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::external::{ExternalData, Record};
use super::path::FieldPath;
use super::state::FormState;
use super::value::Value;

/// Everything a derivation closure may read: the form being edited, optional
/// parent form data, and the injected reference lists. Read-only by
/// construction; derivations communicate exclusively through their return
/// value.
#[derive(Clone, Copy)]
pub struct DerivationContext<'a> {
    pub form: &'a FormState,
    pub parent: Option<&'a FormState>,
    pub external: &'a ExternalData,
}

impl DerivationContext<'_> {
    /// Form value at a dotted path, `Null` when missing.
    #[must_use]
    pub fn value(&self, path: &str) -> &Value {
        self.form.value(path)
    }

    /// First record in `list` whose `field` equals `equals`.
    #[must_use]
    pub fn find(&self, list: &str, field: &str, equals: &Value) -> Option<&Record> {
        self.external
            .get(list)?
            .iter()
            .find(|r| r.get(field) == Some(equals))
    }
}

/// Recoverable failure inside a `calculate`/`preset` closure.
///
/// The engine treats it as "no change": the target field keeps its previous
/// value and the failure is logged, never surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeriveError {
    message: String,
}

impl DeriveError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for DeriveError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for DeriveError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// A derivation closure: pure function of the context, fallible.
pub type DeriveFn = Arc<dyn Fn(&DerivationContext<'_>) -> Result<Value, DeriveError> + Send + Sync>;

/// A custom option filter: receives the full unfiltered list.
pub type FilterFn = Arc<dyn Fn(&[Record]) -> Vec<Record> + Send + Sync>;

/// Relation used by a filter-options action: keep records whose
/// `record_field` equals the form's current value at `form_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBy {
    pub record_field: String,
    pub form_field: FieldPath,
}

/// The effect a fired rule has on form state or on another field's option
/// list. A closed sum type: each variant carries exactly what its execution
/// needs, and the executor matches exhaustively.
#[derive(Clone)]
pub enum Action {
    /// Pure derivation written into `target`.
    Calculate { target: FieldPath, derive: DeriveFn },
    /// Same contract as `Calculate`; used for unconditional resets and
    /// clears. The distinction is documentation, not behavior.
    Preset { target: FieldPath, derive: DeriveFn },
    /// Find the record in `list` whose `match_field` equals the triggering
    /// value and copy its `copy_field` into `target`. On a miss the target
    /// keeps its previous value.
    Lookup {
        target: FieldPath,
        list: String,
        match_field: String,
        copy_field: String,
    },
    /// Recompute the selectable options for `target` from `list`. The result
    /// feeds the option-rendering layer, never form state.
    FilterOptions {
        target: FieldPath,
        list: String,
        by: Option<FilterBy>,
        custom: Option<FilterFn>,
    },
}

impl Action {
    pub(crate) fn target(&self) -> &FieldPath {
        match self {
            Action::Calculate { target, .. }
            | Action::Preset { target, .. }
            | Action::Lookup { target, .. }
            | Action::FilterOptions { target, .. } => target,
        }
    }

    /// Whether executing this action can mutate form state. Option lists
    /// live outside the form document.
    pub(crate) fn writes_state(&self) -> bool {
        !matches!(self, Action::FilterOptions { .. })
    }

    pub(crate) fn list_key(&self) -> Option<&str> {
        match self {
            Action::Lookup { list, .. } | Action::FilterOptions { list, .. } => Some(list),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Action::Calculate { .. } => "calculate",
            Action::Preset { .. } => "preset",
            Action::Lookup { .. } => "lookup",
            Action::FilterOptions { .. } => "filter-options",
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Calculate { target, .. } => f
                .debug_struct("Calculate")
                .field("target", target)
                .finish_non_exhaustive(),
            Action::Preset { target, .. } => f
                .debug_struct("Preset")
                .field("target", target)
                .finish_non_exhaustive(),
            Action::Lookup {
                target,
                list,
                match_field,
                copy_field,
            } => f
                .debug_struct("Lookup")
                .field("target", target)
                .field("list", list)
                .field("match_field", match_field)
                .field("copy_field", copy_field)
                .finish(),
            Action::FilterOptions { target, list, by, .. } => f
                .debug_struct("FilterOptions")
                .field("target", target)
                .field("list", list)
                .field("by", by)
                .finish_non_exhaustive(),
        }
    }
}

/// Configures a lookup action inside a
/// [`CatalogBuilder::rule`](crate::CatalogBuilder::rule) closure. Both parts
/// are required; compilation rejects an incomplete spec.
#[derive(Debug, Clone, Default)]
pub struct LookupSpec {
    pub(crate) match_field: Option<String>,
    pub(crate) copy_field: Option<String>,
}

impl LookupSpec {
    /// Record field compared against the triggering value.
    #[must_use]
    pub fn matching(mut self, field: &str) -> Self {
        self.match_field = Some(field.to_owned());
        self
    }

    /// Record field copied into the rule's target.
    #[must_use]
    pub fn copying(mut self, field: &str) -> Self {
        self.copy_field = Some(field.to_owned());
        self
    }
}

/// Configures a filter-options action. Exactly one of
/// [`by`](Self::by) or [`with`](Self::with) must be chosen; compilation
/// rejects a spec with neither or both.
#[derive(Clone, Default)]
pub struct FilterSpec {
    pub(crate) by: Option<(String, String)>,
    pub(crate) custom: Option<FilterFn>,
}

impl FilterSpec {
    /// Keep records whose `record_field` equals the form's current value at
    /// `form_field`. An empty form value yields the full list.
    #[must_use]
    pub fn by(mut self, record_field: &str, form_field: &str) -> Self {
        self.by = Some((record_field.to_owned(), form_field.to_owned()));
        self
    }

    /// Filter with a custom function over the full unfiltered list. Also the
    /// way to express "show all" resets.
    #[must_use]
    pub fn with(mut self, f: impl Fn(&[Record]) -> Vec<Record> + Send + Sync + 'static) -> Self {
        self.custom = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("by", &self.by)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
