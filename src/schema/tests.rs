use super::*;

#[test]
fn collection_names() {
    let names: Vec<&str> = CollectionKind::ALL.iter().map(|kind| kind.name()).collect();
    assert_eq!(
        names,
        ["pdet_municipalities", "buildings_microsoft", "buildings_google"]
    );
    assert_eq!(
        CollectionKind::Buildings(BuildingSource::Google).to_string(),
        "buildings_google"
    );
}

#[test]
fn collection_kind_parsing() {
    assert_eq!(
        "municipalities".parse::<CollectionKind>(),
        Ok(CollectionKind::Municipalities)
    );
    assert_eq!(
        "buildings_microsoft".parse::<CollectionKind>(),
        Ok(CollectionKind::Buildings(BuildingSource::Microsoft))
    );
    assert_eq!(
        " Google ".parse::<CollectionKind>(),
        Ok(CollectionKind::Buildings(BuildingSource::Google))
    );
    assert_eq!(
        "buildings_osm".parse::<CollectionKind>(),
        Err(UnknownCollection("buildings_osm".to_string()))
    );
}

#[test]
fn municipality_validator_requires_identity_and_geometry() {
    let schema = json_schema(CollectionKind::Municipalities);
    let required: Vec<&str> = schema
        .get_array("required")
        .expect("required list")
        .iter()
        .filter_map(Bson::as_str)
        .collect();
    assert_eq!(
        required,
        ["muni_code", "dept_code", "muni_name", "dept_name", "geom"]
    );

    let geom_types = schema
        .get_document("properties")
        .and_then(|p| p.get_document("geom"))
        .and_then(|g| g.get_document("properties"))
        .and_then(|p| p.get_document("type"))
        .and_then(|t| t.get_array("enum"))
        .expect("geometry type enum");
    assert_eq!(
        geom_types,
        &vec![Bson::from("Polygon"), Bson::from("MultiPolygon")]
    );
}

#[test]
fn building_validators_differ_by_source() {
    let microsoft = json_schema(CollectionKind::Buildings(BuildingSource::Microsoft));
    let google = json_schema(CollectionKind::Buildings(BuildingSource::Google));

    for schema in [&microsoft, &google] {
        assert_eq!(
            schema.get_array("required").expect("required list"),
            &vec![Bson::from("geom"), Bson::from("area_m2")]
        );
    }

    let microsoft_props = microsoft.get_document("properties").expect("properties");
    let google_props = google.get_document("properties").expect("properties");
    assert!(microsoft_props.contains_key("source_date"));
    assert!(!microsoft_props.contains_key("confidence"));
    assert!(google_props.contains_key("confidence"));
    assert!(!google_props.contains_key("source_date"));
}

#[test]
fn validator_wraps_json_schema() {
    let kind = CollectionKind::Municipalities;
    assert_eq!(
        validator(kind).get_document("$jsonSchema").expect("wrapped"),
        &json_schema(kind)
    );
}

#[test]
fn index_names_per_collection() {
    assert_eq!(
        expected_index_names(CollectionKind::Municipalities),
        [
            "_id_",
            "geom_2dsphere",
            "muni_code_unique",
            "dept_code_idx",
            "pdet_region_idx",
            "pdet_subregion_idx"
        ]
    );
    assert_eq!(
        expected_index_names(CollectionKind::Buildings(BuildingSource::Microsoft)),
        [
            "_id_",
            "geom_2dsphere",
            "muni_code_idx",
            "area_m2_idx",
            "muni_code_area_idx"
        ]
    );
    assert_eq!(
        expected_index_names(CollectionKind::Buildings(BuildingSource::Google)),
        [
            "_id_",
            "geom_2dsphere",
            "muni_code_idx",
            "area_m2_idx",
            "confidence_idx",
            "muni_code_area_idx"
        ]
    );
}

#[test]
fn only_muni_code_is_unique() {
    for kind in CollectionKind::ALL {
        for spec in index_specs(kind) {
            assert_eq!(spec.unique, spec.name == "muni_code_unique", "{}", spec.name);
        }
    }
}

#[test]
fn compound_index_keeps_key_order_and_direction() {
    let spec = index_specs(CollectionKind::Buildings(BuildingSource::Google))
        .iter()
        .find(|spec| spec.name == "muni_code_area_idx")
        .expect("compound index declared");

    let keys = spec.keys_document();
    let ordered: Vec<(&String, &Bson)> = keys.iter().collect();
    assert_eq!(ordered.len(), 2);
    assert_eq!(ordered[0], (&"muni_code".to_string(), &Bson::Int32(1)));
    assert_eq!(ordered[1], (&"area_m2".to_string(), &Bson::Int32(-1)));
}

#[test]
fn index_model_carries_name_and_uniqueness() {
    let spec = index_specs(CollectionKind::Municipalities)[1];
    let model = spec.to_model();
    let options = model.options.expect("options set");

    assert_eq!(model.keys, doc! { "muni_code": 1 });
    assert_eq!(options.name.as_deref(), Some("muni_code_unique"));
    assert_eq!(options.unique, Some(true));

    let geo = index_specs(CollectionKind::Municipalities)[0].to_model();
    assert_eq!(geo.keys, doc! { "geom": "2dsphere" });
    assert_eq!(geo.options.and_then(|o| o.unique), None);
}
