use std::sync::Arc;

use reform::{CatalogBuilder, ExternalData, FormSession, FormState, Record, Value};

fn main() {
    // Declare how fields depend on each other
    let catalog = CatalogBuilder::new()
        .rule("name-from-id", |r| {
            r.on("workerId").when_set().lookup("workerName", "workerOptions", |l| {
                l.matching("_id").copying("fullName")
            })
        })
        .rule("clear-name", |r| {
            r.on("workerId")
                .when_empty()
                .preset("workerName", |_| Ok(Value::from("")))
        })
        .compile()
        .expect("failed to compile catalog");

    println!("{catalog}");

    // Reference data supplied by the host page
    let external = ExternalData::new().list(
        "workerOptions",
        vec![
            Record::new().with("_id", "w1").with("fullName", "Ana Rojas"),
            Record::new().with("_id", "w2").with("fullName", "Luis Soto"),
        ],
    );

    let mut session = FormSession::new(Arc::new(catalog), FormState::new(), external)
        .expect("reference lists supplied");

    let report = session.apply_change("workerId", "w2").expect("valid path");
    println!("after select: {report}");
    println!("workerName = {}", session.state().value("workerName"));

    let report = session.apply_change("workerId", "").expect("valid path");
    println!("after clear:  {report}");
    println!("workerName = {}", session.state().value("workerName"));
}
