use mongodb::bson::DateTime;

use super::*;
use crate::config::ReportConfig;
use crate::queries::BucketSpec;
use crate::queries::catalog::{count_all, histogram, largest_municipalities};
use crate::schema::BuildingSource;

fn item(section: Section, label: &str, query: Query) -> ReportItem {
    ReportItem {
        section,
        label: label.to_string(),
        query,
    }
}

fn total_item() -> ReportItem {
    item(
        Section::BasicStatistics,
        "Total PDET municipalities",
        Query::Count(count_all(CollectionKind::Municipalities)),
    )
}

#[test]
fn counts_render_on_one_line() {
    let text = render_text(&total_item(), &QueryOutcome::Count(170)).expect("renders");
    assert_eq!(text, "Total PDET municipalities: 170");
}

#[test]
fn documents_render_as_relaxed_extended_json() {
    let outcome = QueryOutcome::Documents(vec![doc! {
        "muni_name": "Tumaco",
        "area_km2": 3760.5,
        "created_at": DateTime::from_millis(0),
    }]);
    let largest = item(
        Section::MunicipalitySpatial,
        "Largest",
        Query::Find(largest_municipalities(1)),
    );

    let value = outcome.to_json();
    assert_eq!(value[0]["muni_name"], json!("Tumaco"));
    assert_eq!(value[0]["area_km2"], json!(3760.5));
    assert!(value[0]["created_at"].get("$date").is_some());

    let text = render_text(&largest, &outcome).expect("renders");
    assert!(text.starts_with("Largest:\n["));
    assert!(text.contains("\"muni_name\": \"Tumaco\""));
}

#[test]
fn json_lines_carry_section_label_and_result() {
    let line = render_json(&total_item(), &QueryOutcome::Count(12));
    assert_eq!(
        line,
        json!({
            "section": "BASIC STATISTICS",
            "label": "Total PDET municipalities",
            "result": 12,
        })
    );
}

#[test]
fn skipped_and_within_outcomes() {
    let sample = item(
        Section::BuildingSpatial,
        "Buildings inside a sample municipality",
        Query::BuildingsInSampleMunicipality {
            source: BuildingSource::Microsoft,
            limit: 5,
        },
    );

    assert_eq!(
        render_text(&sample, &QueryOutcome::Skipped("no municipalities loaded".to_string()))
            .expect("renders"),
        "Buildings inside a sample municipality: skipped (no municipalities loaded)"
    );

    let within = QueryOutcome::Within {
        municipality: "Argelia".to_string(),
        documents: vec![],
    };
    assert!(
        render_text(&sample, &within)
            .expect("renders")
            .starts_with("Buildings inside a sample municipality [Argelia]:")
    );
    assert_eq!(within.to_json()["municipality"], json!("Argelia"));
}

#[test]
fn bucket_results_get_range_labels() {
    let sizes = item(
        Section::BuildingStatistics(BuildingSource::Microsoft),
        "Building size distribution (Microsoft)",
        Query::Aggregate(histogram(
            BuildingSource::Microsoft,
            BucketSpec::area_distribution(),
        )),
    );
    let labelled = label_buckets(
        &sizes,
        vec![
            doc! { "_id": 50.0, "count": 4 },
            doc! { "_id": "10000+", "count": 1 },
        ],
    );

    assert_eq!(labelled[0].get_str("range").ok(), Some("[50, 100)"));
    assert_eq!(labelled[1].get_str("range").ok(), Some("10000+"));
}

#[test]
fn non_bucket_results_are_untouched() {
    let documents = vec![doc! { "_id": "Cauca", "count": 3 }];
    assert_eq!(label_buckets(&total_item(), documents.clone()), documents);
}

#[test]
fn banners_are_numbered() {
    let plan = crate::queries::report_plan(&ReportConfig::default());
    assert_eq!(render_banner(plan[0].section), "1. BASIC STATISTICS");
}
