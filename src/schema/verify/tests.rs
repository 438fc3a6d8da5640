use super::*;
use crate::schema::{BuildingSource, DEFAULT_ID_INDEX};

fn initialized(kind: CollectionKind) -> CollectionStatus {
    CollectionStatus {
        kind,
        exists: true,
        documents: 12,
        index_names: expected_index_names(kind)
            .into_iter()
            .map(str::to_string)
            .collect(),
        validator: Some(validator(kind)),
    }
}

#[test]
fn index_drift_splits_missing_and_unexpected() {
    let actual = vec![
        "_id_".to_string(),
        "geom_2dsphere".to_string(),
        "legacy_idx".to_string(),
    ];
    let (missing, unexpected) =
        index_drift(&["_id_", "geom_2dsphere", "muni_code_idx"], &actual);

    assert_eq!(missing, vec!["muni_code_idx".to_string()]);
    assert_eq!(unexpected, vec!["legacy_idx".to_string()]);
}

#[test]
fn freshly_initialized_schema_is_consistent() {
    let statuses: Vec<_> = CollectionKind::ALL.into_iter().map(initialized).collect();
    let report = SchemaReport::compare(&statuses);

    assert!(report.is_consistent());
    assert_eq!(report.total_issues(), 0);
    assert!(report.summary().is_empty());
}

#[test]
fn missing_collection_counts_once() {
    let statuses = vec![
        initialized(CollectionKind::Municipalities),
        CollectionStatus::missing(CollectionKind::Buildings(BuildingSource::Google)),
    ];
    let report = SchemaReport::compare(&statuses);

    assert!(!report.is_consistent());
    assert_eq!(report.total_issues(), 1);
    assert_eq!(
        report.summary(),
        vec!["buildings_google: collection is missing".to_string()]
    );
}

#[test]
fn validator_and_index_drift_are_reported() {
    let mut status = initialized(CollectionKind::Buildings(BuildingSource::Microsoft));
    status.validator = None;
    status.index_names.retain(|name| name != "area_m2_idx");
    status.index_names.push("temp_idx".to_string());

    let report = SchemaReport::compare(&[status]);
    let drift = &report.drifts[0];

    assert!(drift.validator_mismatch);
    assert_eq!(drift.missing_indexes, vec!["area_m2_idx".to_string()]);
    assert_eq!(drift.unexpected_indexes, vec!["temp_idx".to_string()]);
    assert_eq!(report.total_issues(), 3);
    assert_eq!(
        report.summary(),
        vec![
            "buildings_microsoft: validator differs from the declared $jsonSchema".to_string(),
            "buildings_microsoft: missing index area_m2_idx".to_string(),
            "buildings_microsoft: unexpected index temp_idx".to_string(),
        ]
    );
}

#[test]
fn id_index_is_expected() {
    let mut status = initialized(CollectionKind::Municipalities);
    status.index_names.retain(|name| name != DEFAULT_ID_INDEX);

    let report = SchemaReport::compare(&[status]);
    assert_eq!(report.drifts[0].missing_indexes, vec!["_id_".to_string()]);
}
