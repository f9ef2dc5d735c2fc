use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::action::{DeriveError, DerivationContext, DeriveFn, FilterSpec, LookupSpec};
use super::error::CatalogError;
use super::path::FieldPath;
use super::rule::{Condition, Rule};
use super::value::Value;

/// Builder for a [`RuleCatalog`].
///
/// Rules are declared via closures and compiled into an immutable,
/// thread-safe catalog that one engine implementation runs for every form
/// type.
///
/// # Example
///
/// ```
/// use reform::{CatalogBuilder, Value};
///
/// let catalog = CatalogBuilder::new()
///     .rule("species-from-barracks", |r| {
///         r.on("barracks").when_set().lookup("species", "cropTypesOptions", |l| {
///             l.matching("_id").copying("cropName")
///         })
///     })
///     .rule("clear-species", |r| {
///         r.on("barracks")
///             .when_empty()
///             .preset("species", |_| Ok(Value::from("")))
///     })
///     .compile()
///     .unwrap();
/// assert_eq!(catalog.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    pub(crate) rules: Vec<DraftRule>,
    pub(crate) cascade_limit: Option<usize>,
}

/// One rule under construction, produced by the closure passed to
/// [`CatalogBuilder::rule`].
#[derive(Default)]
pub struct RuleBuilder {
    pub(crate) field: Option<String>,
    pub(crate) condition: Option<Condition>,
    pub(crate) debounce: Option<Duration>,
    pub(crate) actions: Vec<DraftAction>,
}

pub(crate) struct DraftRule {
    pub(crate) id: String,
    pub(crate) draft: RuleBuilder,
}

pub(crate) enum DraftAction {
    Calculate { target: String, derive: DeriveFn },
    Preset { target: String, derive: DeriveFn },
    Lookup { target: String, list: String, spec: LookupSpec },
    FilterOptions { target: String, list: String, spec: FilterSpec },
}

impl CatalogBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a rule. The closure must pick a trigger field with
    /// [`on`](RuleBuilder::on) and exactly one action; compilation fails
    /// otherwise.
    #[must_use]
    pub fn rule(mut self, id: &str, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        self.rules.push(DraftRule {
            id: id.to_owned(),
            draft: f(RuleBuilder::default()),
        });
        self
    }

    /// Override the cascade event limit (the cycle guard). Defaults to
    /// `max(16, 4 × rules)`.
    #[must_use]
    pub fn cascade_limit(mut self, limit: usize) -> Self {
        self.cascade_limit = Some(limit);
        self
    }

    /// Validate and compile into an immutable [`RuleCatalog`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if validation fails.
    pub fn compile(self) -> Result<RuleCatalog, CatalogError> {
        crate::compile::compile(self)
    }
}

impl RuleBuilder {
    /// Watch this field. Every rule needs exactly one trigger field.
    #[must_use]
    pub fn on(mut self, field: &str) -> Self {
        self.field = Some(field.to_owned());
        self
    }

    /// Gate firing on a predicate over the new value.
    #[must_use]
    pub fn when(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(f));
        self
    }

    /// Fire only when the new value is non-empty (a selection was made).
    #[must_use]
    pub fn when_set(self) -> Self {
        self.when(|v| !v.is_empty())
    }

    /// Fire only when the new value is empty (a selection was removed).
    #[must_use]
    pub fn when_empty(self) -> Self {
        self.when(Value::is_empty)
    }

    /// Delay evaluation until the field has been quiet for `window`,
    /// coalescing rapid successive edits into one evaluation.
    #[must_use]
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// Derive `target` from current state and external data.
    #[must_use]
    pub fn calculate(
        mut self,
        target: &str,
        f: impl Fn(&DerivationContext<'_>) -> Result<Value, DeriveError> + Send + Sync + 'static,
    ) -> Self {
        self.actions.push(DraftAction::Calculate {
            target: target.to_owned(),
            derive: Arc::new(f),
        });
        self
    }

    /// Set or clear `target` unconditionally when the rule fires.
    #[must_use]
    pub fn preset(
        mut self,
        target: &str,
        f: impl Fn(&DerivationContext<'_>) -> Result<Value, DeriveError> + Send + Sync + 'static,
    ) -> Self {
        self.actions.push(DraftAction::Preset {
            target: target.to_owned(),
            derive: Arc::new(f),
        });
        self
    }

    /// Copy a field from the record in `list` matching the triggering value
    /// into `target`.
    #[must_use]
    pub fn lookup(
        mut self,
        target: &str,
        list: &str,
        f: impl FnOnce(LookupSpec) -> LookupSpec,
    ) -> Self {
        self.actions.push(DraftAction::Lookup {
            target: target.to_owned(),
            list: list.to_owned(),
            spec: f(LookupSpec::default()),
        });
        self
    }

    /// Recompute the selectable options for `target` from `list`.
    #[must_use]
    pub fn filter_options(
        mut self,
        target: &str,
        list: &str,
        f: impl FnOnce(FilterSpec) -> FilterSpec,
    ) -> Self {
        self.actions.push(DraftAction::FilterOptions {
            target: target.to_owned(),
            list: list.to_owned(),
            spec: f(FilterSpec::default()),
        });
        self
    }
}

impl fmt::Debug for RuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleBuilder")
            .field("field", &self.field)
            .field("conditional", &self.condition.is_some())
            .field("debounce", &self.debounce)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl fmt::Debug for DraftRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftRule")
            .field("id", &self.id)
            .field("draft", &self.draft)
            .finish()
    }
}

/// A compiled, immutable rule catalog. Thread-safe and designed to live
/// behind `Arc`, shared by every session of the same form type.
#[derive(Debug)]
pub struct RuleCatalog {
    pub(crate) rules: Vec<Rule>,
    /// Trigger-field index: rules to collect when a given field changes.
    pub(crate) by_field: HashMap<FieldPath, Vec<usize>>,
    pub(crate) cascade_limit: usize,
}

impl RuleCatalog {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Maximum number of change events one cascade may process before the
    /// engine stops propagating.
    #[must_use]
    pub fn cascade_limit(&self) -> usize {
        self.cascade_limit
    }

    /// Rule ids in declaration order.
    #[must_use]
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    /// External list keys this catalog reads, deduplicated and sorted.
    /// A session cannot open until every one of them has been supplied.
    #[must_use]
    pub fn required_lists(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .rules
            .iter()
            .filter_map(|r| r.action.list_key())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Ids of the rules that watch `field`. Returns an empty list for an
    /// unknown or malformed path.
    #[must_use]
    pub fn dependents_of(&self, field: &str) -> Vec<&str> {
        FieldPath::parse(field)
            .ok()
            .and_then(|p| self.by_field.get(&p))
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| self.rules[i].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn rules_for(&self, field: &FieldPath) -> &[usize] {
        self.by_field.get(field).map_or(&[], Vec::as_slice)
    }
}

impl fmt::Display for RuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RuleCatalog({} rules, {} trigger fields)",
            self.rules.len(),
            self.by_field.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_rules() {
        let builder = CatalogBuilder::new()
            .rule("hectares-from-barracks", |r| {
                r.on("barracks")
                    .when_set()
                    .lookup("hectares", "cuartelesOptions", |l| {
                        l.matching("_id").copying("totalHa")
                    })
            })
            .rule("clear-hectares", |r| {
                r.on("barracks")
                    .when_empty()
                    .preset("hectares", |_| Ok(Value::Int(0)))
            });

        assert_eq!(builder.rules.len(), 2);
        assert_eq!(builder.rules[0].id, "hectares-from-barracks");
        assert_eq!(builder.rules[1].id, "clear-hectares");
        assert_eq!(builder.rules[0].draft.actions.len(), 1);
    }

    #[test]
    fn compiled_catalog_introspection() {
        let catalog = CatalogBuilder::new()
            .rule("lookup-variety", |r| {
                r.on("barracks")
                    .when_set()
                    .lookup("variety", "cuartelesOptions", |l| {
                        l.matching("_id").copying("variety")
                    })
            })
            .rule("variety-options", |r| {
                r.on("species").filter_options("variety", "varietyOptions", |f| {
                    f.by("varietySpecies", "species")
                })
            })
            .compile()
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.required_lists(),
            vec!["cuartelesOptions", "varietyOptions"]
        );
        assert_eq!(catalog.dependents_of("barracks"), vec!["lookup-variety"]);
        assert_eq!(catalog.dependents_of("species"), vec!["variety-options"]);
        assert!(catalog.dependents_of("hectares").is_empty());
        assert_eq!(catalog.to_string(), "RuleCatalog(2 rules, 2 trigger fields)");
    }

    #[test]
    fn default_cascade_limit_scales_with_rules() {
        let catalog = CatalogBuilder::new()
            .rule("only", |r| {
                r.on("a").preset("b", |_| Ok(Value::Int(1)))
            })
            .compile()
            .unwrap();
        assert_eq!(catalog.cascade_limit(), 16);

        let catalog = CatalogBuilder::new()
            .rule("only", |r| {
                r.on("a").preset("b", |_| Ok(Value::Int(1)))
            })
            .cascade_limit(3)
            .compile()
            .unwrap();
        assert_eq!(catalog.cascade_limit(), 3);
    }
}
