use tracing::{debug, trace};

use crate::types::action::{Action, DerivationContext, FilterBy};
use crate::types::external::Record;
use crate::types::path::FieldPath;
use crate::types::rule::Rule;
use crate::types::value::{Value, NULL};

/// Result of running one action. Failures are recovered here, never
/// propagated: the engine's contract is that a misbehaving rule leaves its
/// target alone.
pub(crate) enum Effect {
    /// Candidate value for a form field.
    Set(FieldPath, Value),
    /// Recomputed option list for a field.
    Options(FieldPath, Vec<Record>),
    /// Recovered failure or lookup miss; nothing to apply.
    None,
}

pub(crate) fn execute(rule: &Rule, trigger_value: &Value, ctx: &DerivationContext<'_>) -> Effect {
    match &rule.action {
        Action::Calculate { target, derive } | Action::Preset { target, derive } => {
            match derive(ctx) {
                Ok(value) => Effect::Set(target.clone(), value),
                Err(e) => {
                    debug!(
                        rule = %rule.id,
                        kind = rule.action.kind(),
                        target = %target,
                        error = %e,
                        "derivation failed, leaving target unchanged"
                    );
                    Effect::None
                }
            }
        }
        Action::Lookup {
            target,
            list,
            match_field,
            copy_field,
        } => match ctx.find(list, match_field, trigger_value) {
            Some(record) => Effect::Set(target.clone(), record.value(copy_field).clone()),
            None => {
                // Keep-last-value on a miss: the previous target value stays.
                trace!(rule = %rule.id, list, value = %trigger_value, "lookup miss");
                Effect::None
            }
        },
        Action::FilterOptions {
            target,
            list,
            by,
            custom,
        } => {
            let Some(all) = ctx.external.get(list) else {
                debug!(rule = %rule.id, list, "filter source list missing");
                return Effect::None;
            };
            let filtered = match (by, custom) {
                (
                    Some(FilterBy {
                        record_field,
                        form_field,
                    }),
                    _,
                ) => {
                    let current = ctx.form.get(form_field).unwrap_or(&NULL);
                    if current.is_empty() {
                        all.to_vec()
                    } else {
                        all.iter()
                            .filter(|r| r.get(record_field) == Some(current))
                            .cloned()
                            .collect()
                    }
                }
                (None, Some(f)) => f(all),
                // compile() guarantees one of the two is present
                (None, None) => all.to_vec(),
            };
            Effect::Options(target.clone(), filtered)
        }
    }
}
