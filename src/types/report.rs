use std::fmt;

use super::path::FieldPath;
use super::value::Value;

/// What one cascade did: which fields changed (in application order), which
/// rules fired, which were deferred to the debounce scheduler, and which
/// option lists were recomputed.
///
/// Returned by [`FormSession::apply_change`](crate::FormSession::apply_change)
/// and [`FormSession::fire_due`](crate::FormSession::fire_due); purely
/// diagnostic, the resolved state itself lives on the session.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ChangeReport {
    changed: Vec<(FieldPath, Value)>,
    fired: Vec<String>,
    deferred: Vec<String>,
    options_updated: Vec<FieldPath>,
    cycle_limit_hit: bool,
}

impl ChangeReport {
    pub(crate) fn new(
        changed: Vec<(FieldPath, Value)>,
        fired: Vec<String>,
        deferred: Vec<String>,
        options_updated: Vec<FieldPath>,
        cycle_limit_hit: bool,
    ) -> Self {
        Self {
            changed,
            fired,
            deferred,
            options_updated,
            cycle_limit_hit,
        }
    }

    /// Fold another cascade's report into this one (used when several due
    /// debounce entries fire back to back).
    pub(crate) fn merge(&mut self, other: ChangeReport) {
        self.changed.extend(other.changed);
        self.fired.extend(other.fired);
        self.deferred.extend(other.deferred);
        self.options_updated.extend(other.options_updated);
        self.cycle_limit_hit |= other.cycle_limit_hit;
    }

    /// Fields written during the cascade, in application order, including
    /// the seeding edit itself.
    #[must_use]
    pub fn changed(&self) -> &[(FieldPath, Value)] {
        &self.changed
    }

    /// Ids of the rules that fired, in execution order.
    #[must_use]
    pub fn fired(&self) -> &[String] {
        &self.fired
    }

    /// Ids of debounced rules handed to the scheduler instead of running.
    #[must_use]
    pub fn deferred(&self) -> &[String] {
        &self.deferred
    }

    /// Targets whose option lists were recomputed.
    #[must_use]
    pub fn options_updated(&self) -> &[FieldPath] {
        &self.options_updated
    }

    /// Whether the cascade was stopped by the cycle guard instead of
    /// reaching a fixed point.
    #[must_use]
    pub fn cycle_limit_hit(&self) -> bool {
        self.cycle_limit_hit
    }

    /// The value the cascade left at `path`, if it wrote one. Later writes
    /// win when a field changed more than once.
    #[must_use]
    pub fn value_of(&self, path: &str) -> Option<&Value> {
        let parsed = FieldPath::parse(path).ok()?;
        self.changed
            .iter()
            .rev()
            .find(|(p, _)| *p == parsed)
            .map(|(_, v)| v)
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let changed: Vec<String> = self.changed.iter().map(|(p, _)| p.to_string()).collect();
        write!(
            f,
            "changed: [{}], fired: [{}]",
            changed.join(", "),
            self.fired.join(", "),
        )?;
        if !self.deferred.is_empty() {
            write!(f, ", deferred: [{}]", self.deferred.join(", "))?;
        }
        if self.cycle_limit_hit {
            write!(f, ", stopped at cascade limit")?;
        }
        Ok(())
    }
}
