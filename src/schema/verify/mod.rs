// Schema drift detection
// Compares what the server reports against the declared collections, validators and indexes

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{CollectionKind, expected_index_names, validator};
use crate::database::Session;

/// Live state of one collection as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStatus {
    pub kind: CollectionKind,
    pub exists: bool,
    pub documents: u64,
    pub index_names: Vec<String>,
    pub validator: Option<Document>,
}

impl CollectionStatus {
    #[inline]
    pub fn missing(kind: CollectionKind) -> Self {
        Self {
            kind,
            exists: false,
            documents: 0,
            index_names: Vec::new(),
            validator: None,
        }
    }
}

/// Gather the status of every declared collection.
#[inline]
pub async fn observe(session: &Session) -> Result<Vec<CollectionStatus>> {
    let existing: HashSet<String> = session.collection_names().await?.into_iter().collect();
    let mut statuses = Vec::with_capacity(CollectionKind::ALL.len());

    for kind in CollectionKind::ALL {
        if !existing.contains(kind.name()) {
            debug!("Collection {} does not exist", kind);
            statuses.push(CollectionStatus::missing(kind));
            continue;
        }

        let collection = session.collection(kind);
        let documents = collection
            .count_documents(doc! {})
            .await
            .with_context(|| format!("Failed to count documents in {kind}"))?;
        let mut index_names = collection
            .list_index_names()
            .await
            .with_context(|| format!("Failed to list indexes on {kind}"))?;
        index_names.sort();

        let specs: Vec<_> = session
            .database()
            .list_collections()
            .filter(doc! { "name": kind.name() })
            .await
            .with_context(|| format!("Failed to read options of {kind}"))?
            .try_collect()
            .await
            .with_context(|| format!("Failed to read options of {kind}"))?;
        let validator = specs.into_iter().next().and_then(|spec| spec.options.validator);

        statuses.push(CollectionStatus {
            kind,
            exists: true,
            documents,
            index_names,
            validator,
        });
    }

    Ok(statuses)
}

/// Differences between one live collection and its declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDrift {
    pub collection: String,
    pub missing_collection: bool,
    pub validator_mismatch: bool,
    pub missing_indexes: Vec<String>,
    pub unexpected_indexes: Vec<String>,
}

impl CollectionDrift {
    #[inline]
    pub fn issue_count(&self) -> usize {
        usize::from(self.missing_collection)
            + usize::from(self.validator_mismatch)
            + self.missing_indexes.len()
            + self.unexpected_indexes.len()
    }
}

/// Declared index names absent from `actual`, then names in `actual` nobody declared.
#[inline]
pub fn index_drift(expected: &[&str], actual: &[String]) -> (Vec<String>, Vec<String>) {
    let actual_set: HashSet<&str> = actual.iter().map(String::as_str).collect();
    let expected_set: HashSet<&str> = expected.iter().copied().collect();

    let missing = expected
        .iter()
        .filter(|name| !actual_set.contains(*name))
        .map(|name| (*name).to_string())
        .collect();
    let unexpected = actual
        .iter()
        .filter(|name| !expected_set.contains(name.as_str()))
        .cloned()
        .collect();

    (missing, unexpected)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub drifts: Vec<CollectionDrift>,
}

impl SchemaReport {
    /// Build the report; collections without any drift are left out.
    #[inline]
    pub fn compare(statuses: &[CollectionStatus]) -> Self {
        let drifts = statuses
            .iter()
            .map(|status| {
                let collection = status.kind.name().to_string();
                if !status.exists {
                    return CollectionDrift {
                        collection,
                        missing_collection: true,
                        ..CollectionDrift::default()
                    };
                }

                let (missing_indexes, unexpected_indexes) =
                    index_drift(&expected_index_names(status.kind), &status.index_names);
                CollectionDrift {
                    collection,
                    missing_collection: false,
                    validator_mismatch: status.validator.as_ref() != Some(&validator(status.kind)),
                    missing_indexes,
                    unexpected_indexes,
                }
            })
            .filter(|drift| drift.issue_count() > 0)
            .collect();

        let report = Self { drifts };
        if report.is_consistent() {
            info!("Schema matches the declared collections and indexes");
        } else {
            warn!("Schema drift found: {} issues", report.total_issues());
        }
        report
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty()
    }

    #[inline]
    pub fn total_issues(&self) -> usize {
        self.drifts.iter().map(CollectionDrift::issue_count).sum()
    }

    /// One line per finding
    #[inline]
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for drift in &self.drifts {
            if drift.missing_collection {
                lines.push(format!("{}: collection is missing", drift.collection));
                continue;
            }
            if drift.validator_mismatch {
                lines.push(format!(
                    "{}: validator differs from the declared $jsonSchema",
                    drift.collection
                ));
            }
            for name in &drift.missing_indexes {
                lines.push(format!("{}: missing index {name}", drift.collection));
            }
            for name in &drift.unexpected_indexes {
                lines.push(format!("{}: unexpected index {name}", drift.collection));
            }
        }
        lines
    }
}
