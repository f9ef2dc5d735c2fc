//! The harvest-application form wired end to end: selecting a cuartel
//! populates species, variety and hectares; deselecting clears them; the
//! variety option list follows the selected species.

use std::sync::Arc;

use reform::{CatalogBuilder, ExternalData, FormSession, FormState, Record, Value};

fn reference_data() -> ExternalData {
    ExternalData::new()
        .list(
            "cuartelesOptions",
            vec![
                Record::new()
                    .with("_id", "c1")
                    .with("varietySpecies", "s1")
                    .with("variety", "v1")
                    .with("totalHa", "12"),
                Record::new()
                    .with("_id", "c2")
                    .with("varietySpecies", "s2")
                    .with("variety", "v3")
                    .with("totalHa", "7.5"),
            ],
        )
        .list(
            "cropTypesOptions",
            vec![
                Record::new().with("_id", "s1").with("cropName", "Manzana"),
                Record::new().with("_id", "s2").with("cropName", "Uva"),
            ],
        )
        .list(
            "varietyTypesOptions",
            vec![
                Record::new()
                    .with("_id", "v1")
                    .with("varietyName", "Fuji")
                    .with("varietySpecies", "s1"),
                Record::new()
                    .with("_id", "v2")
                    .with("varietyName", "Gala")
                    .with("varietySpecies", "s1"),
                Record::new()
                    .with("_id", "v3")
                    .with("varietyName", "Moscatel")
                    .with("varietySpecies", "s2"),
            ],
        )
}

fn main() {
    let catalog = CatalogBuilder::new()
        .rule("species-id-from-barracks", |r| {
            r.on("barracks")
                .when_set()
                .lookup("speciesId", "cuartelesOptions", |l| {
                    l.matching("_id").copying("varietySpecies")
                })
        })
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
        .rule("variety-from-barracks", |r| {
            r.on("barracks").when_set().calculate("variety", |ctx| {
                let cuartel = ctx
                    .find("cuartelesOptions", "_id", ctx.value("barracks"))
                    .ok_or("unknown cuartel")?;
                let variety_id = cuartel.value("variety");
                Ok(match ctx.find("varietyTypesOptions", "_id", variety_id) {
                    Some(variety) => variety.value("varietyName").clone(),
                    None => variety_id.clone(),
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
        .rule("clear-species-id", |r| {
            r.on("barracks")
                .when_empty()
                .preset("speciesId", |_| Ok(Value::from("")))
        })
        .rule("clear-species", |r| {
            r.on("barracks")
                .when_empty()
                .preset("species", |_| Ok(Value::from("")))
        })
        .rule("clear-variety", |r| {
            r.on("barracks")
                .when_empty()
                .preset("variety", |_| Ok(Value::from("")))
        })
        .rule("clear-hectares", |r| {
            r.on("barracks")
                .when_empty()
                .preset("hectares", |_| Ok(Value::Float(0.0)))
        })
        .rule("variety-options-for-species", |r| {
            r.on("speciesId")
                .filter_options("variety", "varietyTypesOptions", |f| {
                    f.by("varietySpecies", "speciesId")
                })
        })
        .compile()
        .expect("failed to compile catalog");

    let mut session = FormSession::new(Arc::new(catalog), FormState::new(), reference_data())
        .expect("reference lists supplied");

    for edit in ["c1", "c2", ""] {
        let report = session.apply_change("barracks", edit).expect("valid path");
        println!("barracks = {edit:?}  ->  {report}");
        println!(
            "  species = {}, variety = {}, hectares = {}",
            session.state().value("species"),
            session.state().value("variety"),
            session.state().value("hectares"),
        );
        let varieties: Vec<String> = session
            .options_for("variety")
            .unwrap_or(&[])
            .iter()
            .map(|r| r.value("varietyName").to_string())
            .collect();
        println!("  selectable varieties: [{}]", varieties.join(", "));
    }
}
