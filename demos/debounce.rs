//! Debounced recomputation: the applied-area rule waits for the coverage
//! field to go quiet before recomputing, coalescing keystrokes into one
//! evaluation of the final value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reform::{CatalogBuilder, DeriveError, ExternalData, FormSession, FormState, Value};

fn main() {
    let catalog = CatalogBuilder::new()
        .rule("applied-from-coverage", |r| {
            r.on("coverage")
                .debounce(Duration::from_millis(300))
                .calculate("appliedHectares", |ctx| {
                    let hectares = ctx.value("hectares").as_f64().unwrap_or(0.0);
                    let coverage = ctx
                        .value("coverage")
                        .as_f64()
                        .ok_or_else(|| DeriveError::new("coverage is not numeric"))?;
                    Ok(Value::Float(
                        (hectares * coverage / 100.0 * 100.0).round() / 100.0,
                    ))
                })
        })
        .compile()
        .expect("failed to compile catalog");

    let t0 = Instant::now();
    let initial = FormState::new().set("hectares", 10.0);
    let mut session = FormSession::new(Arc::new(catalog), initial, ExternalData::new())
        .expect("no reference lists needed");

    // the user types 2, 25, 255 in quick succession
    for (ms, typed) in [(0, "2"), (80, "25"), (160, "255")] {
        let report = session
            .apply_change_at(t0 + Duration::from_millis(ms), "coverage", typed)
            .expect("valid path");
        println!("typed {typed:>3}  ->  {report}");
    }
    println!("pending debounces: {}", session.pending_debounces());

    // the host polls once the window has elapsed
    let report = session.fire_due(t0 + Duration::from_millis(500));
    println!("after window  ->  {report}");
    println!(
        "appliedHectares = {} (10 ha at 255%)",
        session.state().value("appliedHectares"),
    );
}
