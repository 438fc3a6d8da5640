
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{CollectionKind, index_specs, validator};
use crate::database::Session;

/// What to do when a collection or index name already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreationPolicy {
    /// Leave existing objects untouched and move on
    #[default]
    SkipExisting,
    /// Abort initialization on the first existing object
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Create,
    Skip,
}

/// Decide a single creation step under `policy`.
#[inline]
pub fn plan_step(policy: CreationPolicy, exists: bool, object: &str) -> Result<StepOutcome> {
    match (exists, policy) {
        (false, _) => Ok(StepOutcome::Create),
        (true, CreationPolicy::SkipExisting) => Ok(StepOutcome::Skip),
        (true, CreationPolicy::Strict) => bail!("{object} already exists"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub collections_created: Vec<CollectionKind>,
    pub collections_skipped: Vec<CollectionKind>,
    pub indexes_created: Vec<(CollectionKind, &'static str)>,
    pub indexes_skipped: Vec<(CollectionKind, &'static str)>,
}

impl InitReport {
    #[inline]
    pub fn summary(&self) -> String {
        format!(
            "{} collections created, {} skipped; {} indexes created, {} skipped",
            self.collections_created.len(),
            self.collections_skipped.len(),
            self.indexes_created.len(),
            self.indexes_skipped.len()
        )
    }
}

/// Creates the validated collections and their indexes.
pub struct SchemaInitializer<'a> {
    session: &'a Session,
    policy: CreationPolicy,
}

impl<'a> SchemaInitializer<'a> {
    #[inline]
    pub fn new(session: &'a Session, policy: CreationPolicy) -> Self {
        Self { session, policy }
    }

    /// Create collections first, then indexes; the first error aborts the run.
    #[inline]
    pub async fn run(&self) -> Result<InitReport> {
        info!(
            "Initializing database {} with policy {:?}",
            self.session.database_name(),
            self.policy
        );
        let mut report = InitReport::default();

        let existing: HashSet<String> = self.session.collection_names().await?.into_iter().collect();
        for kind in CollectionKind::ALL {
            self.create_collection(kind, existing.contains(kind.name()), &mut report)
                .await?;
        }

        let total: usize = CollectionKind::ALL
            .iter()
            .map(|kind| index_specs(*kind).len())
            .sum();
        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=> "),
        );

        for kind in CollectionKind::ALL {
            self.create_indexes(kind, &progress, &mut report).await?;
        }
        progress.finish_and_clear();

        info!("Initialization finished: {}", report.summary());
        Ok(report)
    }

    async fn create_collection(
        &self,
        kind: CollectionKind,
        exists: bool,
        report: &mut InitReport,
    ) -> Result<()> {
        match plan_step(self.policy, exists, &format!("Collection {kind}"))? {
            StepOutcome::Skip => {
                warn!("Collection {} already exists, leaving it untouched", kind);
                report.collections_skipped.push(kind);
            }
            StepOutcome::Create => {
                info!("Creating collection {}", kind);
                self.session
                    .database()
                    .create_collection(kind.name())
                    .validator(validator(kind))
                    .await
                    .with_context(|| format!("Failed to create collection {kind}"))?;
                report.collections_created.push(kind);
            }
        }
        Ok(())
    }

    async fn create_indexes(
        &self,
        kind: CollectionKind,
        progress: &ProgressBar,
        report: &mut InitReport,
    ) -> Result<()> {
        let collection = self.session.collection(kind);
        let present: HashSet<String> = collection
            .list_index_names()
            .await
            .with_context(|| format!("Failed to list indexes on {kind}"))?
            .into_iter()
            .collect();

        for spec in index_specs(kind) {
            progress.set_message(format!("{kind}.{}", spec.name));
            let object = format!("Index {} on {kind}", spec.name);
            match plan_step(self.policy, present.contains(spec.name), &object)? {
                StepOutcome::Skip => {
                    debug!("{} already exists, skipping", object);
                    report.indexes_skipped.push((kind, spec.name));
                }
                StepOutcome::Create => {
                    debug!("Creating {} with keys {}", object, spec.keys_document());
                    collection
                        .create_index(spec.to_model())
                        .await
                        .with_context(|| format!("Failed to create {object}"))?;
                    report.indexes_created.push((kind, spec.name));
                }
            }
            progress.inc(1);
        }
        Ok(())
    }
}
