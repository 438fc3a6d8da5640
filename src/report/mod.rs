// Report runner
// Executes catalog items one after another and renders each result as soon as it arrives.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::ValueEnum;
use console::style;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use serde_json::{Value, json};
use std::io::Write;
use tracing::{debug, info};

use crate::database::Session;
use crate::queries::catalog::{FindQuery, buildings_within};
use crate::queries::{Query, ReportItem, Section};
use crate::schema::CollectionKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Section banners and pretty-printed extended JSON
    #[default]
    Text,
    /// One JSON object per report item
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Count(u64),
    Documents(Vec<Document>),
    /// Buildings found inside the named sample municipality
    Within {
        municipality: String,
        documents: Vec<Document>,
    },
    Skipped(String),
}

impl QueryOutcome {
    /// Result as relaxed extended JSON
    #[inline]
    pub fn to_json(&self) -> Value {
        match self {
            QueryOutcome::Count(n) => json!(n),
            QueryOutcome::Documents(documents) => documents_to_json(documents),
            QueryOutcome::Within {
                municipality,
                documents,
            } => json!({
                "municipality": municipality,
                "buildings": documents_to_json(documents),
            }),
            QueryOutcome::Skipped(reason) => json!({ "skipped": reason }),
        }
    }
}

fn documents_to_json(documents: &[Document]) -> Value {
    Bson::Array(documents.iter().cloned().map(Bson::Document).collect()).into_relaxed_extjson()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub executed: usize,
    pub skipped: usize,
}

/// Add a readable `range` to each `$bucket` result.
#[inline]
pub fn label_buckets(item: &ReportItem, documents: Vec<Document>) -> Vec<Document> {
    let Query::Aggregate(aggregate) = &item.query else {
        return documents;
    };
    let Some(spec) = aggregate.pipeline.bucket_spec() else {
        return documents;
    };

    documents
        .into_iter()
        .map(|mut document| {
            let label = document
                .get("_id")
                .map_or_else(|| spec.default_label.clone(), |id| spec.label_for_id(id));
            document.insert("range", label);
            document
        })
        .collect()
}

#[inline]
pub fn render_banner(section: Section) -> String {
    section.to_string()
}

/// Plain-text rendering of one item
#[inline]
pub fn render_text(item: &ReportItem, outcome: &QueryOutcome) -> Result<String> {
    Ok(match outcome {
        QueryOutcome::Count(n) => format!("{}: {n}", item.label),
        QueryOutcome::Skipped(reason) => format!("{}: skipped ({reason})", item.label),
        QueryOutcome::Documents(_) => format!(
            "{}:\n{}",
            item.label,
            serde_json::to_string_pretty(&outcome.to_json())?
        ),
        QueryOutcome::Within {
            municipality,
            documents,
        } => format!(
            "{} [{municipality}]:\n{}",
            item.label,
            serde_json::to_string_pretty(&documents_to_json(documents))?
        ),
    })
}

#[inline]
pub fn render_json(item: &ReportItem, outcome: &QueryOutcome) -> Value {
    json!({
        "section": item.section.title(),
        "label": item.label,
        "result": outcome.to_json(),
    })
}

async fn run_find(session: &Session, query: &FindQuery) -> Result<Vec<Document>> {
    let collection = session.collection(query.collection);
    let mut find = collection
        .find(query.filter.clone())
        .projection(query.projection.clone());
    if let Some(sort) = &query.sort {
        find = find.sort(sort.clone());
    }
    if let Some(limit) = query.limit {
        find = find.limit(limit);
    }
    Ok(find.await?.try_collect().await?)
}

/// Run a single query against the session.
#[inline]
pub async fn execute(session: &Session, query: &Query) -> Result<QueryOutcome> {
    match query {
        Query::Count(count) => {
            let n = session
                .collection(count.collection)
                .count_documents(count.filter.clone())
                .await?;
            Ok(QueryOutcome::Count(n))
        }
        Query::Find(find) => Ok(QueryOutcome::Documents(run_find(session, find).await?)),
        Query::Aggregate(aggregate) => {
            let stages = aggregate.pipeline.to_documents();
            debug!("Aggregating {} with {:?}", aggregate.collection, stages);
            let documents = session
                .collection(aggregate.collection)
                .aggregate(stages)
                .await?
                .try_collect()
                .await?;
            Ok(QueryOutcome::Documents(documents))
        }
        Query::BuildingsInSampleMunicipality { source, limit } => {
            let sample = session
                .collection(CollectionKind::Municipalities)
                .find_one(doc! {})
                .projection(doc! { "muni_name": 1, "geom": 1 })
                .await?;
            let Some(sample) = sample else {
                return Ok(QueryOutcome::Skipped("no municipalities loaded".to_string()));
            };
            let Some(geometry) = sample.get("geom").cloned() else {
                return Ok(QueryOutcome::Skipped("sample municipality has no geometry".to_string()));
            };
            let municipality = sample.get_str("muni_name").unwrap_or("unnamed").to_string();
            let documents =
                run_find(session, &buildings_within(*source, geometry, *limit)).await?;
            Ok(QueryOutcome::Within {
                municipality,
                documents,
            })
        }
        Query::Indexes(kind) => {
            let response = session
                .database()
                .run_command(doc! { "listIndexes": kind.name() })
                .await?;
            let indexes = response
                .get_document("cursor")
                .and_then(|cursor| cursor.get_array("firstBatch"))
                .context("Malformed listIndexes response")?
                .iter()
                .filter_map(|index| index.as_document().cloned())
                .collect();
            Ok(QueryOutcome::Documents(indexes))
        }
    }
}

/// Executes a report plan in order, writing results to `out`.
pub struct QueryRunner<'a, W: Write> {
    session: &'a Session,
    format: OutputFormat,
    out: W,
    current_section: Option<Section>,
}

impl<'a, W: Write> QueryRunner<'a, W> {
    #[inline]
    pub fn new(session: &'a Session, format: OutputFormat, out: W) -> Self {
        Self {
            session,
            format,
            out,
            current_section: None,
        }
    }

    /// Stops at the first failing item; results already written stay written.
    #[inline]
    pub async fn run(&mut self, plan: &[ReportItem]) -> Result<ReportSummary> {
        info!("Running {} report items", plan.len());
        let mut summary = ReportSummary::default();

        for item in plan {
            let outcome = execute(self.session, &item.query)
                .await
                .with_context(|| {
                    format!(
                        "Report item '{}' failed on {}",
                        item.label,
                        item.query.collection()
                    )
                })?;
            let outcome = match outcome {
                QueryOutcome::Documents(documents) => {
                    QueryOutcome::Documents(label_buckets(item, documents))
                }
                other => other,
            };

            if matches!(outcome, QueryOutcome::Skipped(_)) {
                summary.skipped += 1;
            } else {
                summary.executed += 1;
            }
            self.write(item, &outcome)?;
        }

        self.out.flush()?;
        Ok(summary)
    }

    fn write(&mut self, item: &ReportItem, outcome: &QueryOutcome) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                if self.current_section != Some(item.section) {
                    self.current_section = Some(item.section);
                    writeln!(self.out, "\n{}\n", style(render_banner(item.section)).bold())?;
                }
                writeln!(self.out, "{}", render_text(item, outcome)?)?;
            }
            OutputFormat::Json => {
                writeln!(
                    self.out,
                    "{}",
                    serde_json::to_string(&render_json(item, outcome))?
                )?;
            }
        }
        Ok(())
    }
}
