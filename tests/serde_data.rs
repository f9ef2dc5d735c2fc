#![cfg(feature = "serde")]

//! Host pages ship reference lists and record seeds as JSON; the `serde`
//! feature deserializes them straight into the engine's data model.

use std::sync::Arc;

use reform::{CatalogBuilder, ExternalData, FormSession, FormState, Value};

const REFERENCE_JSON: &str = r#"{
    "cuartelesOptions": [
        { "_id": "c1", "varietySpecies": "s1", "variety": "v1", "totalHa": "12" }
    ],
    "cropTypesOptions": [
        { "_id": "s1", "cropName": "Manzana" }
    ]
}"#;

#[test]
fn external_data_deserializes_from_host_json() {
    let external: ExternalData = serde_json::from_str(REFERENCE_JSON).unwrap();

    assert!(external.contains("cuartelesOptions"));
    let cuarteles = external.get("cuartelesOptions").unwrap();
    assert_eq!(cuarteles.len(), 1);
    assert_eq!(cuarteles[0].value("totalHa"), &Value::from("12"));
}

#[test]
fn json_loaded_lists_drive_a_session() {
    let external: ExternalData = serde_json::from_str(REFERENCE_JSON).unwrap();
    let initial: FormState =
        serde_json::from_str(r#"{ "barracks": "", "hectares": 0 }"#).unwrap();

    let catalog = Arc::new(
        CatalogBuilder::new()
            .rule("species-from-barracks", |r| {
                r.on("barracks").when_set().calculate("species", |ctx| {
                    let cuartel = ctx
                        .find("cuartelesOptions", "_id", ctx.value("barracks"))
                        .ok_or("unknown cuartel")?;
                    let species_id = cuartel.value("varietySpecies");
                    Ok(match ctx.find("cropTypesOptions", "_id", species_id) {
                        Some(crop) => crop.value("cropName").clone(),
                        None => species_id.clone(),
                    })
                })
            })
            .rule("hectares-from-barracks", |r| {
                r.on("barracks").when_set().calculate("hectares", |ctx| {
                    let cuartel = ctx
                        .find("cuartelesOptions", "_id", ctx.value("barracks"))
                        .ok_or("unknown cuartel")?;
                    Ok(Value::Float(cuartel.value("totalHa").as_f64().unwrap_or(0.0)))
                })
            })
            .compile()
            .unwrap(),
    );
    let mut session = FormSession::new(catalog, initial, external).unwrap();

    session.apply_change("barracks", "c1").unwrap();

    assert_eq!(session.state().value("species"), &Value::from("Manzana"));
    assert_eq!(session.state().value("hectares"), &Value::Float(12.0));
}

#[test]
fn resolved_state_serializes_back_to_json() {
    let state = FormState::new()
        .set("barracks", "c1")
        .set("hectares", 12.0)
        .set("responsibles.applicators.0.userId", "w1");

    let json = serde_json::to_string(&state).unwrap();
    let round: FormState = serde_json::from_str(&json).unwrap();

    assert_eq!(round, state);
    assert_eq!(round.value("responsibles.applicators.0.userId"), &Value::from("w1"));
}
