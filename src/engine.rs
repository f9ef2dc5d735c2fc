use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::error;

use crate::debounce::DebounceScheduler;
use crate::execute::{execute, Effect};
use crate::parse::PathError;
use crate::types::action::{Action, DerivationContext};
use crate::types::catalog::RuleCatalog;
use crate::types::error::SessionError;
use crate::types::external::{ExternalData, Record};
use crate::types::path::FieldPath;
use crate::types::report::ChangeReport;
use crate::types::state::FormState;
use crate::types::value::{Value, NULL};

/// One pending debounce per (rule, field) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DebounceKey {
    rule: usize,
    path: FieldPath,
}

/// How a cascade begins.
enum Seed {
    /// A user edit: write the value, then run every rule watching the field.
    Edit { path: FieldPath, value: Value },
    /// A debounce window elapsed: run one specific rule against the recorded
    /// final value. The field itself was already written at edit time.
    Fire { rule: usize, value: Value },
}

struct Deferred {
    rule: usize,
    path: FieldPath,
    value: Value,
    window: Duration,
}

/// Everything one cascade produced from an immutable input snapshot.
struct Resolution {
    state: FormState,
    options: Vec<(FieldPath, Vec<Record>)>,
    changed: Vec<(FieldPath, Value)>,
    fired: Vec<usize>,
    deferred: Vec<Deferred>,
    cycle_limit_hit: bool,
}

/// Drain a work queue of `(field, value)` events against a copy of `state`
/// until no field changes (fixed point) or the catalog's cascade limit is
/// exceeded.
///
/// A follow-up event is enqueued only when an action's candidate value
/// differs from the target's current value, so convergent rule chains
/// terminate on their own; the limit only exists to stop genuinely
/// oscillating catalogs (a development-time defect).
fn resolve(
    catalog: &RuleCatalog,
    state: &FormState,
    parent: Option<&FormState>,
    external: &ExternalData,
    seed: Seed,
) -> Resolution {
    let mut next = state.clone();
    let mut changed: Vec<(FieldPath, Value)> = Vec::new();
    let mut fired: Vec<usize> = Vec::new();
    let mut deferred: Vec<Deferred> = Vec::new();
    let mut options: Vec<(FieldPath, Vec<Record>)> = Vec::new();
    let mut queue: VecDeque<(FieldPath, Value)> = VecDeque::new();
    let mut cycle_limit_hit = false;

    // Applies one rule's effect and feeds any state change back into the queue.
    fn apply(
        effect: Effect,
        next: &mut FormState,
        changed: &mut Vec<(FieldPath, Value)>,
        options: &mut Vec<(FieldPath, Vec<Record>)>,
        queue: &mut VecDeque<(FieldPath, Value)>,
    ) {
        match effect {
            Effect::Set(target, candidate) => {
                // missing counts as Null so clearing an absent field is quiet
                if next.get(&target).unwrap_or(&NULL) != &candidate {
                    next.insert(&target, candidate.clone());
                    changed.push((target.clone(), candidate.clone()));
                    queue.push_back((target, candidate));
                }
            }
            Effect::Options(target, records) => {
                if let Some(slot) = options.iter_mut().find(|(p, _)| *p == target) {
                    slot.1 = records;
                } else {
                    options.push((target, records));
                }
            }
            Effect::None => {}
        }
    }

    match seed {
        Seed::Edit { path, value } => {
            next.insert(&path, value.clone());
            changed.push((path.clone(), value.clone()));
            queue.push_back((path, value));
        }
        Seed::Fire { rule, value } => {
            let r = &catalog.rules[rule];
            if r.trigger.matches(&value) {
                fired.push(rule);
                let ctx = DerivationContext {
                    form: &next,
                    parent,
                    external,
                };
                let effect = execute(r, &value, &ctx);
                apply(effect, &mut next, &mut changed, &mut options, &mut queue);
            }
        }
    }

    let mut events = 0usize;
    while let Some((path, value)) = queue.pop_front() {
        events += 1;
        if events > catalog.cascade_limit() {
            cycle_limit_hit = true;
            error!(
                field = %path,
                limit = catalog.cascade_limit(),
                "cascade limit exceeded, rules are mutating each other's trigger fields; \
                 propagation stopped"
            );
            debug_assert!(
                false,
                "cascade limit {} exceeded at field '{path}'",
                catalog.cascade_limit()
            );
            break;
        }

        for &idx in catalog.rules_for(&path) {
            let rule = &catalog.rules[idx];
            if let Some(window) = rule.trigger.debounce {
                deferred.push(Deferred {
                    rule: idx,
                    path: path.clone(),
                    value: value.clone(),
                    window,
                });
                continue;
            }
            if !rule.trigger.matches(&value) {
                continue;
            }
            fired.push(idx);
            let ctx = DerivationContext {
                form: &next,
                parent,
                external,
            };
            let effect = execute(rule, &value, &ctx);
            apply(effect, &mut next, &mut changed, &mut options, &mut queue);
        }
    }

    Resolution {
        state: next,
        options,
        changed,
        fired,
        deferred,
        cycle_limit_hit,
    }
}

/// One open form: owns the working state, the injected reference data, the
/// per-field option views, and every pending debounce.
///
/// Created when the form dialog opens (seeded from defaults or an existing
/// record) and dropped when it closes; dropping cancels all pending
/// debounces, so deferred rules can never run against a disposed form.
#[derive(Debug)]
pub struct FormSession {
    catalog: Arc<RuleCatalog>,
    state: FormState,
    parent: Option<FormState>,
    external: ExternalData,
    options: HashMap<FieldPath, Vec<Record>>,
    debounce: DebounceScheduler<DebounceKey>,
}

impl FormSession {
    /// Open a session over `initial` state with the reference lists the host
    /// page has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingList`] if any rule references a list
    /// key the external data does not carry. Hosts that fetch reference data
    /// asynchronously must finish before opening the session.
    pub fn new(
        catalog: Arc<RuleCatalog>,
        initial: FormState,
        external: ExternalData,
    ) -> Result<Self, SessionError> {
        for rule in catalog.rules.iter() {
            if let Some(list) = rule.action.list_key() {
                if !external.contains(list) {
                    return Err(SessionError::MissingList {
                        rule: rule.id.clone(),
                        list: list.to_owned(),
                    });
                }
            }
        }
        Ok(Self {
            catalog,
            state: initial,
            parent: None,
            external,
            options: HashMap::new(),
            debounce: DebounceScheduler::new(),
        })
    }

    /// Attach parent form data, readable by derivations on nested subforms.
    #[must_use]
    pub fn with_parent(mut self, parent: FormState) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Ingest one field edit and resolve its cascade before returning.
    ///
    /// All directly and transitively dependent fields are consistent with
    /// the catalog when this returns, except rules carrying a debounce
    /// window, which are handed to the scheduler and resolve via
    /// [`fire_due`](Self::fire_due).
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if `path` is malformed. The form state is
    /// untouched in that case.
    pub fn apply_change(
        &mut self,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<ChangeReport, PathError> {
        self.apply_change_at(Instant::now(), path, value)
    }

    /// [`apply_change`](Self::apply_change) with an explicit clock, for
    /// hosts and tests that drive time themselves.
    pub fn apply_change_at(
        &mut self,
        now: Instant,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<ChangeReport, PathError> {
        let path = FieldPath::parse(path)?;
        let resolution = resolve(
            &self.catalog,
            &self.state,
            self.parent.as_ref(),
            &self.external,
            Seed::Edit {
                path,
                value: value.into(),
            },
        );
        Ok(self.absorb(resolution, now))
    }

    /// Run every debounced rule whose window has elapsed, each against the
    /// most recent value recorded for it, cascading synchronously.
    pub fn fire_due(&mut self, now: Instant) -> ChangeReport {
        let mut report = ChangeReport::default();
        for (key, value) in self.debounce.take_due(now) {
            let resolution = resolve(
                &self.catalog,
                &self.state,
                self.parent.as_ref(),
                &self.external,
                Seed::Fire {
                    rule: key.rule,
                    value,
                },
            );
            report.merge(self.absorb(resolution, now));
        }
        report
    }

    fn absorb(&mut self, resolution: Resolution, now: Instant) -> ChangeReport {
        self.state = resolution.state;

        let options_updated: Vec<FieldPath> =
            resolution.options.iter().map(|(p, _)| p.clone()).collect();
        for (target, records) in resolution.options {
            self.options.insert(target, records);
        }

        let mut deferred_ids = Vec::with_capacity(resolution.deferred.len());
        for d in resolution.deferred {
            deferred_ids.push(self.catalog.rules[d.rule].id.clone());
            self.debounce.schedule(
                DebounceKey {
                    rule: d.rule,
                    path: d.path,
                },
                d.value,
                d.window,
                now,
            );
        }

        let fired = resolution
            .fired
            .iter()
            .map(|&i| self.catalog.rules[i].id.clone())
            .collect();

        ChangeReport::new(
            resolution.changed,
            fired,
            deferred_ids,
            options_updated,
            resolution.cycle_limit_hit,
        )
    }

    /// The resolved working document.
    #[must_use]
    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Consume the session, e.g. to hand the document to a submit call.
    /// Pending debounces are cancelled by the move.
    #[must_use]
    pub fn into_state(self) -> FormState {
        self.state
    }

    /// Current option list for a field.
    ///
    /// Before any rule has filtered it, falls back to the full source list
    /// of the filter-options rule targeting the field, so a fresh form shows
    /// everything until a selection narrows it.
    #[must_use]
    pub fn options_for(&self, path: &str) -> Option<&[Record]> {
        let parsed = FieldPath::parse(path).ok()?;
        if let Some(records) = self.options.get(&parsed) {
            return Some(records);
        }
        self.catalog.rules.iter().find_map(|r| match &r.action {
            Action::FilterOptions { target, list, .. } if *target == parsed => {
                self.external.get(list)
            }
            _ => None,
        })
    }

    /// Earliest pending debounce deadline, for hosts that arm a real timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.next_deadline()
    }

    /// Number of debounced rule evaluations still pending.
    #[must_use]
    pub fn pending_debounces(&self) -> usize {
        self.debounce.len()
    }

    /// Cancel every pending debounce without running it.
    pub fn cancel_pending(&mut self) {
        self.debounce.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatalogBuilder, DeriveError};

    fn harvest_external() -> ExternalData {
        ExternalData::new()
            .list(
                "cuartelesOptions",
                vec![Record::new()
                    .with("_id", "c1")
                    .with("varietySpecies", "s1")
                    .with("variety", "v1")
                    .with("totalHa", "12")],
            )
            .list(
                "cropTypesOptions",
                vec![Record::new().with("_id", "s1").with("cropName", "Manzana")],
            )
    }

    fn species_catalog() -> Arc<RuleCatalog> {
        Arc::new(
            CatalogBuilder::new()
                .rule("species-id-from-barracks", |r| {
                    r.on("barracks")
                        .when_set()
                        .lookup("speciesId", "cuartelesOptions", |l| {
                            l.matching("_id").copying("varietySpecies")
                        })
                })
                .rule("species-name-from-id", |r| {
                    r.on("speciesId")
                        .when_set()
                        .lookup("species", "cropTypesOptions", |l| {
                            l.matching("_id").copying("cropName")
                        })
                })
                .compile()
                .unwrap(),
        )
    }

    #[test]
    fn cascade_chains_through_dependent_fields() {
        let mut session =
            FormSession::new(species_catalog(), FormState::new(), harvest_external()).unwrap();

        let report = session.apply_change("barracks", "c1").unwrap();

        assert_eq!(session.state().value("speciesId"), &Value::from("s1"));
        assert_eq!(session.state().value("species"), &Value::from("Manzana"));
        assert_eq!(
            report.fired(),
            &["species-id-from-barracks", "species-name-from-id"]
        );
        assert_eq!(report.changed().len(), 3);
        assert!(!report.cycle_limit_hit());
    }

    #[test]
    fn unchanged_candidate_does_not_retrigger() {
        let mut session =
            FormSession::new(species_catalog(), FormState::new(), harvest_external()).unwrap();

        session.apply_change("barracks", "c1").unwrap();
        // same edit again: lookups produce identical values, nothing cascades
        let report = session.apply_change("barracks", "c1").unwrap();

        assert_eq!(report.fired(), &["species-id-from-barracks"]);
        assert_eq!(report.changed().len(), 1); // just the seed write
    }

    #[test]
    fn session_requires_every_referenced_list() {
        let result = FormSession::new(species_catalog(), FormState::new(), ExternalData::new());
        match result {
            Err(SessionError::MissingList { rule, list }) => {
                assert_eq!(rule, "species-id-from-barracks");
                assert_eq!(list, "cuartelesOptions");
            }
            Ok(_) => panic!("expected MissingList"),
        }
    }

    #[test]
    fn malformed_path_is_rejected_without_touching_state() {
        let mut session =
            FormSession::new(species_catalog(), FormState::new(), harvest_external()).unwrap();
        assert!(session.apply_change("a..b", 1_i64).is_err());
        assert_eq!(session.state(), &FormState::new());
    }

    #[test]
    fn debounced_rule_defers_and_fires_with_last_value() {
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("applied-from-coverage", |r| {
                    r.on("coverage")
                        .debounce(Duration::from_millis(300))
                        .calculate("appliedHectares", |ctx| {
                            let hectares = ctx.value("hectares").as_f64().unwrap_or(0.0);
                            let coverage = ctx
                                .value("coverage")
                                .as_f64()
                                .ok_or_else(|| DeriveError::new("coverage not numeric"))?;
                            Ok(Value::Float((hectares * coverage / 100.0 * 100.0).round() / 100.0))
                        })
                })
                .compile()
                .unwrap(),
        );
        let t0 = Instant::now();
        let initial = FormState::new().set("hectares", 10.0);
        let mut session = FormSession::new(catalog, initial, ExternalData::new()).unwrap();

        for (i, digit) in ["3", "33", "330"].iter().enumerate() {
            let report = session
                .apply_change_at(t0 + Duration::from_millis(i as u64 * 50), "coverage", *digit)
                .unwrap();
            assert_eq!(report.deferred(), &["applied-from-coverage"]);
            assert!(report.fired().is_empty());
        }
        assert_eq!(session.pending_debounces(), 1);
        // field itself is written immediately, only the rule waits
        assert_eq!(session.state().value("coverage"), &Value::from("330"));
        assert_eq!(session.state().value("appliedHectares"), &Value::Null);

        let report = session.fire_due(t0 + Duration::from_millis(500));
        assert_eq!(report.fired(), &["applied-from-coverage"]);
        assert_eq!(session.state().value("appliedHectares"), &Value::Float(33.0));
        assert_eq!(session.pending_debounces(), 0);
    }

    #[test]
    fn fire_due_checks_condition_at_fire_time() {
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("only-when-set", |r| {
                    r.on("coverage")
                        .when_set()
                        .debounce(Duration::from_millis(100))
                        .preset("touched", |_| Ok(Value::Bool(true)))
                })
                .compile()
                .unwrap(),
        );
        let t0 = Instant::now();
        let mut session = FormSession::new(catalog, FormState::new(), ExternalData::new()).unwrap();

        session.apply_change_at(t0, "coverage", "").unwrap();
        let report = session.fire_due(t0 + Duration::from_millis(200));

        assert!(report.fired().is_empty());
        assert_eq!(session.state().value("touched"), &Value::Null);
    }

    #[test]
    fn cancel_pending_discards_deferred_work() {
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("deferred", |r| {
                    r.on("coverage")
                        .debounce(Duration::from_millis(100))
                        .preset("touched", |_| Ok(Value::Bool(true)))
                })
                .compile()
                .unwrap(),
        );
        let t0 = Instant::now();
        let mut session = FormSession::new(catalog, FormState::new(), ExternalData::new()).unwrap();

        session.apply_change_at(t0, "coverage", "5").unwrap();
        assert_eq!(session.pending_debounces(), 1);

        session.cancel_pending();
        let report = session.fire_due(t0 + Duration::from_secs(1));
        assert!(report.fired().is_empty());
        assert_eq!(session.state().value("touched"), &Value::Null);
    }

    #[test]
    fn parent_data_reaches_derivations() {
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("copy-farm", |r| {
                    r.on("useParentFarm").calculate("farm", |ctx| {
                        let parent = ctx.parent.ok_or_else(|| DeriveError::new("no parent"))?;
                        Ok(parent.value("farm").clone())
                    })
                })
                .compile()
                .unwrap(),
        );
        let parent = FormState::new().set("farm", "El Roble");
        let mut session = FormSession::new(catalog, FormState::new(), ExternalData::new())
            .unwrap()
            .with_parent(parent);

        session.apply_change("useParentFarm", true).unwrap();
        assert_eq!(session.state().value("farm"), &Value::from("El Roble"));
    }

    #[test]
    fn options_fall_back_to_full_source_list() {
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("variety-options", |r| {
                    r.on("species").filter_options("variety", "varietyOptions", |f| {
                        f.by("varietySpecies", "species")
                    })
                })
                .compile()
                .unwrap(),
        );
        let external = ExternalData::new().list(
            "varietyOptions",
            vec![
                Record::new().with("_id", "v1").with("varietySpecies", "s1"),
                Record::new().with("_id", "v2").with("varietySpecies", "s2"),
            ],
        );
        let mut session = FormSession::new(catalog, FormState::new(), external).unwrap();

        // untouched form: everything selectable
        assert_eq!(session.options_for("variety").map(<[Record]>::len), Some(2));
        assert_eq!(session.options_for("species"), None);

        let report = session.apply_change("species", "s1").unwrap();
        assert_eq!(report.options_updated().len(), 1);
        let narrowed = session.options_for("variety").unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].value("_id"), &Value::from("v1"));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "cascade limit")]
    fn oscillating_rules_fail_loudly_in_debug() {
        // conditions hide the cycle from the static check; the runtime guard
        // catches it
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("ping", |r| {
                    r.on("x").when(|_| true).calculate("y", |ctx| {
                        Ok(Value::from(ctx.value("x").as_i64().unwrap_or(0) + 1))
                    })
                })
                .rule("pong", |r| {
                    r.on("y").when(|_| true).calculate("x", |ctx| {
                        Ok(Value::from(ctx.value("y").as_i64().unwrap_or(0) + 1))
                    })
                })
                .compile()
                .unwrap(),
        );
        let mut session = FormSession::new(catalog, FormState::new(), ExternalData::new()).unwrap();
        let _ = session.apply_change("x", 1_i64);
    }
}
