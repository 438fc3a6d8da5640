use anyhow::{Context, Result};
use mongodb::bson::{self, Document};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

use crate::GeoDbError;
use crate::config::Config;
use crate::database::{Session, with_session};
use crate::queries::report_plan;
use crate::report::{OutputFormat, QueryRunner};
use crate::schema::{
    CollectionKind, CollectionStatus, CreationPolicy, Geometry, SchemaInitializer, SchemaReport,
    ValidationError, check_document, json_to_document, observe,
};

/// Load the configuration from `config_dir`, or from the per-user directory
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    match config_dir {
        Some(dir) => Config::load(dir),
        None => Config::load(
            Config::config_dir().map_err(|e| GeoDbError::Config(e.to_string()))?,
        ),
    }
}

fn print_collections(statuses: &[CollectionStatus]) {
    for status in statuses {
        if status.exists {
            println!(
                "   📁 {}: {} documents, indexes: {}",
                status.kind,
                status.documents,
                status.index_names.join(", ")
            );
        } else {
            println!("   ❌ {}: missing", status.kind);
        }
    }
}

/// Create collections and indexes, then print what the database holds
#[inline]
pub async fn init_database(config: &Config, policy: CreationPolicy) -> Result<()> {
    with_session(&config.mongo, |session| async move {
        println!("{}", "=".repeat(80));
        println!("PDET Solar Analysis - Database Initialization");
        println!("{}", "=".repeat(80));

        let report = SchemaInitializer::new(&session, policy).run().await?;

        for kind in &report.collections_created {
            println!("   ✅ Created collection {kind}");
        }
        for kind in &report.collections_skipped {
            println!("   ⏭️  Collection {kind} already exists");
        }
        for (kind, name) in &report.indexes_created {
            println!("   ✅ Created index {name} on {kind}");
        }
        if !report.indexes_skipped.is_empty() {
            println!(
                "   ⏭️  {} indexes already existed",
                report.indexes_skipped.len()
            );
        }

        println!();
        println!("📊 Database Status ({}):", session.database_name());
        print_collections(&observe(&session).await?);
        println!();
        println!("{}", report.summary());
        Ok(())
    })
    .await
}

/// Run the exploration report and write it to stdout
#[inline]
pub async fn run_report(config: &Config, format: OutputFormat) -> Result<()> {
    let plan = report_plan(&config.report);

    with_session(&config.mongo, |session| async move {
        if format == OutputFormat::Text {
            println!("{}", "=".repeat(80));
            println!("PDET Solar Analysis - Useful Queries");
            println!("{}", "=".repeat(80));
        }

        let summary = QueryRunner::new(&session, format, io::stdout())
            .run(&plan)
            .await?;
        info!(
            "Report finished: {} items executed, {} skipped",
            summary.executed, summary.skipped
        );

        if format == OutputFormat::Text {
            println!();
            println!("{}", "=".repeat(80));
            println!("Query exploration complete!");
            println!("{}", "=".repeat(80));
        }
        Ok(())
    })
    .await
}

/// Show server and collection status
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 PDET GeoDB Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Server:");
    println!("   URI: {}", config.mongo.redacted_uri());
    let session = match Session::connect(&config.mongo).await {
        Ok(session) => session,
        Err(e) => {
            println!("   ❌ Failed to connect - {e:#}");
            return Err(e);
        }
    };

    let result: Result<()> = async {
        let version = session.server_version().await?;
        println!("   ✅ Connected (MongoDB {version})");
        println!("   📋 Database: {}", session.database_name());

        println!();
        println!("📚 Collections:");
        let statuses = observe(&session).await?;
        print_collections(&statuses);

        if statuses.iter().any(|status| !status.exists) {
            println!();
            println!("💡 Next Steps:");
            println!("   • Use 'pdet-geodb init' to create the missing collections");
        }
        Ok(())
    }
    .await;

    session.close().await;
    result
}

/// Compare the live schema against the declared collections and indexes
#[inline]
pub async fn verify_schema(config: &Config) -> Result<()> {
    let report = with_session(&config.mongo, |session| async move {
        Ok(SchemaReport::compare(&observe(&session).await?))
    })
    .await?;

    if report.is_consistent() {
        println!(
            "✅ Schema matches: {} collections with validators and declared indexes",
            CollectionKind::ALL.len()
        );
        return Ok(());
    }

    println!("⚠️  Schema drift found ({} issues):", report.total_issues());
    for line in report.summary() {
        println!("   • {line}");
    }
    Err(GeoDbError::Schema(format!("{} issues found", report.total_issues())).into())
}

/// Validate every document in `value` for `kind`; a single object counts as one document.
#[inline]
pub fn check_json(kind: CollectionKind, value: &Value) -> Vec<Result<Document, ValidationError>> {
    let documents: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    documents
        .into_iter()
        .map(|item| {
            let document = json_to_document(item)?;
            check_document(kind, &document)?;
            Ok(document)
        })
        .collect()
}

fn geometry_type(document: &Document) -> &'static str {
    document
        .get("geom")
        .cloned()
        .and_then(|geom| bson::from_bson::<Geometry>(geom).ok())
        .map_or("unknown", |geom| geom.type_name())
}

/// Check the documents in a JSON file against the rules of `kind`
#[inline]
pub fn check_documents(kind: CollectionKind, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {}", file.display()))?;

    let results = check_json(kind, &value);
    let failures = results.iter().filter(|result| result.is_err()).count();

    println!("🔍 Checking {} document(s) for {kind}", results.len());
    for (index, result) in results.iter().enumerate() {
        match result {
            Ok(document) => println!("   ✅ #{index}: valid ({})", geometry_type(document)),
            Err(e) => println!("   ❌ #{index}: {e}"),
        }
    }

    if failures > 0 {
        warn!("{} of {} documents failed validation", failures, results.len());
        return Err(GeoDbError::Validation(format!(
            "{failures} of {} documents are invalid",
            results.len()
        ))
        .into());
    }

    println!("All documents are valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BuildingSource;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn building(area: Value) -> Value {
        json!({
            "muni_code": "19050",
            "geom": { "type": "Polygon", "coordinates": [[[-75, 5], [-74.9, 5], [-75, 5]]] },
            "area_m2": area,
        })
    }

    #[test]
    fn single_object_is_one_document() {
        let results = check_json(
            CollectionKind::Buildings(BuildingSource::Microsoft),
            &building(json!(80.5)),
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn array_results_keep_document_order() {
        let results = check_json(
            CollectionKind::Buildings(BuildingSource::Microsoft),
            &json!([building(json!(12)), building(json!("large")), json!("text")]),
        );

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1].as_ref().err().and_then(ValidationError::path),
            Some("area_m2")
        );
        assert!(matches!(results[2], Err(ValidationError::Shape(_))));
    }

    #[test]
    fn geometry_type_is_reported() {
        let document = json_to_document(&building(json!(10))).expect("converts");
        assert_eq!(geometry_type(&document), "Polygon");
        assert_eq!(geometry_type(&Document::new()), "unknown");
    }

    #[test]
    fn check_documents_fails_on_invalid_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{}", json!([building(json!(10)), { "area_m2": 3.0 }])).expect("write");

        let err = check_documents(CollectionKind::Buildings(BuildingSource::Google), file.path())
            .expect_err("second document lacks geom");
        assert!(err.to_string().contains("1 of 2 documents are invalid"));
    }

    #[test]
    fn check_documents_accepts_valid_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{}", building(json!(10))).expect("write");

        assert!(
            check_documents(CollectionKind::Buildings(BuildingSource::Google), file.path()).is_ok()
        );
    }

    #[test]
    fn load_config_from_explicit_dir() {
        let temp_dir = tempfile::TempDir::new().expect("temp dir");
        let config = load_config(Some(temp_dir.path())).expect("defaults load");
        assert_eq!(config.get_base_dir(), temp_dir.path());
    }
}
