use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::action::{Action, FilterBy};
use crate::types::catalog::{CatalogBuilder, DraftAction, DraftRule, RuleBuilder, RuleCatalog};
use crate::types::error::CatalogError;
use crate::types::path::FieldPath;
use crate::types::rule::{Rule, Trigger};

pub(crate) fn compile(builder: CatalogBuilder) -> Result<RuleCatalog, CatalogError> {
    if builder.rules.is_empty() {
        return Err(CatalogError::Empty);
    }
    check_duplicates(&builder.rules)?;

    let mut rules = Vec::with_capacity(builder.rules.len());
    for DraftRule { id, draft } in builder.rules {
        rules.push(lower(id, draft)?);
    }

    check_unconditional_cycles(&rules)?;

    let mut by_field: HashMap<FieldPath, Vec<usize>> = HashMap::new();
    for (i, rule) in rules.iter().enumerate() {
        by_field
            .entry(rule.trigger.field.clone())
            .or_default()
            .push(i);
    }

    let cascade_limit = builder
        .cascade_limit
        .unwrap_or_else(|| (rules.len() * 4).max(16));

    Ok(RuleCatalog {
        rules,
        by_field,
        cascade_limit,
    })
}

fn check_duplicates(rules: &[DraftRule]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(&rule.id) {
            return Err(CatalogError::DuplicateRule {
                id: rule.id.clone(),
            });
        }
    }
    Ok(())
}

/// Resolve one draft into a compiled [`Rule`]: parse every path, require a
/// trigger field and exactly one complete action, reject self-targeting.
fn lower(id: String, draft: RuleBuilder) -> Result<Rule, CatalogError> {
    let Some(field) = draft.field else {
        return Err(CatalogError::MissingTrigger { rule: id });
    };
    let field = parse_path(&id, &field)?;

    let mut actions = draft.actions;
    if actions.len() > 1 {
        return Err(CatalogError::ConflictingActions { rule: id });
    }
    let Some(action) = actions.pop() else {
        return Err(CatalogError::MissingAction { rule: id });
    };
    let action = lower_action(&id, action)?;

    // FilterOptions is exempt: option lists live outside form state, so a
    // rule may legitimately refilter the options of its own trigger field.
    if action.writes_state() && action.target() == &field {
        return Err(CatalogError::SelfReferential {
            rule: id,
            field: field.to_string(),
        });
    }

    Ok(Rule {
        id,
        trigger: Trigger {
            field,
            condition: draft.condition,
            debounce: draft.debounce,
        },
        action,
    })
}

fn lower_action(rule: &str, draft: DraftAction) -> Result<Action, CatalogError> {
    match draft {
        DraftAction::Calculate { target, derive } => Ok(Action::Calculate {
            target: parse_path(rule, &target)?,
            derive,
        }),
        DraftAction::Preset { target, derive } => Ok(Action::Preset {
            target: parse_path(rule, &target)?,
            derive,
        }),
        DraftAction::Lookup { target, list, spec } => {
            let (Some(match_field), Some(copy_field)) = (spec.match_field, spec.copy_field) else {
                return Err(CatalogError::IncompleteLookup {
                    rule: rule.to_owned(),
                });
            };
            Ok(Action::Lookup {
                target: parse_path(rule, &target)?,
                list,
                match_field,
                copy_field,
            })
        }
        DraftAction::FilterOptions { target, list, spec } => {
            let by = match (spec.by, spec.custom.is_some()) {
                (Some(_), true) | (None, false) => {
                    return Err(CatalogError::InvalidFilter {
                        rule: rule.to_owned(),
                    })
                }
                (by, _) => by,
            };
            let by = match by {
                Some((record_field, form_field)) => Some(FilterBy {
                    record_field,
                    form_field: parse_path(rule, &form_field)?,
                }),
                None => None,
            };
            Ok(Action::FilterOptions {
                target: parse_path(rule, &target)?,
                list,
                by,
                custom: spec.custom,
            })
        }
    }
}

fn parse_path(rule: &str, path: &str) -> Result<FieldPath, CatalogError> {
    FieldPath::parse(path).map_err(|source| CatalogError::InvalidPath {
        rule: rule.to_owned(),
        source,
    })
}

/// Kahn's algorithm with a DFS cycle finder, over the trigger→target graph
/// restricted to unconditional, undebounced, state-writing rules.
///
/// Conditions and debounce windows legitimately break cycles at runtime
/// (populate/clear rule pairs watch the same fields), so only rules that
/// always fire participate. Conditional cycles that survive to runtime are
/// caught by the cascade limit instead.
fn check_unconditional_cycles(rules: &[Rule]) -> Result<(), CatalogError> {
    let eligible: Vec<usize> = rules
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.trigger.condition.is_none() && r.trigger.debounce.is_none() && r.action.writes_state()
        })
        .map(|(i, _)| i)
        .collect();

    // edge a -> b when a's output field is b's trigger field
    let mut adj: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut in_degree: HashMap<usize, usize> = eligible.iter().map(|&i| (i, 0)).collect();
    for &a in &eligible {
        for &b in &eligible {
            if rules[a].action.target() == &rules[b].trigger.field {
                adj.entry(a).or_default().push(b);
                *in_degree.entry(b).or_default() += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(&i, _)| i)
        .collect();

    let mut visited = 0;
    while let Some(node) = queue.pop_front() {
        visited += 1;
        if let Some(next) = adj.get(&node) {
            for &b in next {
                if let Some(deg) = in_degree.get_mut(&b) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(b);
                    }
                }
            }
        }
    }

    if visited != eligible.len() {
        let path = find_cycle(rules, &eligible, &adj);
        return Err(CatalogError::UnconditionalCycle { path });
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}

/// DFS-based cycle finder for error reporting; returns the rule ids along
/// the cycle with the starting rule repeated at the end.
fn find_cycle(rules: &[Rule], eligible: &[usize], adj: &HashMap<usize, Vec<usize>>) -> Vec<String> {
    let mut state: HashMap<usize, DfsState> =
        eligible.iter().map(|&i| (i, DfsState::Unvisited)).collect();
    let mut stack: Vec<usize> = Vec::new();

    for &start in eligible {
        if state.get(&start) == Some(&DfsState::Unvisited) {
            if let Some(cycle) = dfs(start, adj, &mut state, &mut stack) {
                return cycle.into_iter().map(|i| rules[i].id.clone()).collect();
            }
        }
    }

    // Unreachable when called after Kahn's detected a cycle.
    vec![]
}

fn dfs(
    node: usize,
    adj: &HashMap<usize, Vec<usize>>,
    state: &mut HashMap<usize, DfsState>,
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    state.insert(node, DfsState::InStack);
    stack.push(node);

    if let Some(next) = adj.get(&node) {
        for &b in next {
            match state.get(&b) {
                Some(DfsState::InStack) => {
                    let pos = stack.iter().position(|&n| n == b)?;
                    let mut cycle: Vec<usize> = stack[pos..].to_vec();
                    cycle.push(b);
                    return Some(cycle);
                }
                Some(DfsState::Unvisited) | None => {
                    if let Some(cycle) = dfs(b, adj, state, stack) {
                        return Some(cycle);
                    }
                }
                Some(DfsState::Done) => {}
            }
        }
    }

    stack.pop();
    state.insert(node, DfsState::Done);
    None
}
