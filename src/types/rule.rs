use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::action::Action;
use super::path::FieldPath;
use super::value::Value;

/// Predicate over the triggering field's new value.
pub type Condition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Decides whether a rule fires for a given change: the watched field, an
/// optional predicate on the new value, and an optional debounce window.
#[derive(Clone)]
pub struct Trigger {
    pub field: FieldPath,
    pub condition: Option<Condition>,
    pub debounce: Option<Duration>,
}

impl Trigger {
    /// Evaluate the condition against the new value. Absence of a condition
    /// means "always fires on change".
    ///
    /// Mutually exclusive rule pairs on the same field (populate on select,
    /// clear on deselect) are exclusive by construction of their conditions;
    /// the engine does not enforce it.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        self.condition.as_ref().map_or(true, |c| c(value))
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("field", &self.field)
            .field("conditional", &self.condition.is_some())
            .field("debounce", &self.debounce)
            .finish()
    }
}

/// A static trigger→action binding, one unit of reactive form behavior.
/// Immutable once the catalog is compiled.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub trigger: Trigger,
    pub action: Action,
}
