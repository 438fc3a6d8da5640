// Typed aggregation pipeline builder
// Stages are plain values so a report item can be inspected and tested before it runs.


use mongodb::bson::{Bson, Document, doc};

use super::histogram::BucketSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn to_bson(self) -> Bson {
        match self {
            SortOrder::Ascending => Bson::Int32(1),
            SortOrder::Descending => Bson::Int32(-1),
        }
    }
}

/// Group accumulator over a field path (without the leading `$`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulator {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
    /// Sum of the lengths of an array field
    SumSize(String),
}

impl Accumulator {
    #[inline]
    pub fn sum(field: &str) -> Self {
        Self::Sum(field.to_string())
    }

    #[inline]
    pub fn avg(field: &str) -> Self {
        Self::Avg(field.to_string())
    }

    #[inline]
    pub fn to_document(&self) -> Document {
        match self {
            Accumulator::Count => doc! { "$sum": 1 },
            Accumulator::Sum(field) => doc! { "$sum": format!("${field}") },
            Accumulator::Avg(field) => doc! { "$avg": format!("${field}") },
            Accumulator::Min(field) => doc! { "$min": format!("${field}") },
            Accumulator::Max(field) => doc! { "$max": format!("${field}") },
            Accumulator::SumSize(field) => doc! { "$sum": { "$size": format!("${field}") } },
        }
    }
}

/// Named accumulator outputs, in output order
pub type Outputs = Vec<(String, Accumulator)>;

#[inline]
pub fn outputs_document(outputs: &[(String, Accumulator)]) -> Document {
    outputs
        .iter()
        .map(|(name, acc)| (name.clone(), Bson::Document(acc.to_document())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    Field(String),
    /// Group the whole input into a single result
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Left outer join on field equality, matches collected in `as_field`
    Equality {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// Correlated join producing `[{count: n}]`, or `[]` when nothing matches
    CountMatching {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
}

impl Lookup {
    #[inline]
    pub fn to_document(&self) -> Document {
        match self {
            Lookup::Equality {
                from,
                local_field,
                foreign_field,
                as_field,
            } => doc! {
                "$lookup": {
                    "from": from.as_str(),
                    "localField": local_field.as_str(),
                    "foreignField": foreign_field.as_str(),
                    "as": as_field.as_str(),
                }
            },
            Lookup::CountMatching {
                from,
                local_field,
                foreign_field,
                as_field,
            } => doc! {
                "$lookup": {
                    "from": from.as_str(),
                    "let": { "key": format!("${local_field}") },
                    "pipeline": [
                        { "$match": { "$expr": { "$eq": [format!("${foreign_field}"), "$$key"] } } },
                        { "$count": "count" },
                    ],
                    "as": as_field.as_str(),
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Document),
    Group { key: GroupKey, outputs: Outputs },
    Sort(Vec<(String, SortOrder)>),
    Limit(i64),
    Lookup(Lookup),
    Project(Document),
    Bucket(BucketSpec),
}

impl Stage {
    #[inline]
    pub fn to_document(&self) -> Document {
        match self {
            Stage::Match(filter) => doc! { "$match": filter.clone() },
            Stage::Group { key, outputs } => {
                let id = match key {
                    GroupKey::Field(field) => Bson::String(format!("${field}")),
                    GroupKey::All => Bson::Null,
                };
                let mut group = doc! { "_id": id };
                for (name, value) in outputs_document(outputs) {
                    group.insert(name, value);
                }
                doc! { "$group": group }
            }
            Stage::Sort(keys) => {
                let sort: Document = keys
                    .iter()
                    .map(|(field, order)| (field.clone(), order.to_bson()))
                    .collect();
                doc! { "$sort": sort }
            }
            Stage::Limit(n) => doc! { "$limit": *n },
            Stage::Lookup(lookup) => lookup.to_document(),
            Stage::Project(projection) => doc! { "$project": projection.clone() },
            Stage::Bucket(spec) => spec.to_document(),
        }
    }
}

/// Ordered list of stages, built fluently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn matching(mut self, filter: Document) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    #[inline]
    pub fn group(mut self, key: GroupKey, outputs: Outputs) -> Self {
        self.stages.push(Stage::Group { key, outputs });
        self
    }

    #[inline]
    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.stages.push(Stage::Sort(vec![(field.to_string(), order)]));
        self
    }

    #[inline]
    pub fn limit(mut self, n: i64) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    #[inline]
    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.stages.push(Stage::Lookup(lookup));
        self
    }

    #[inline]
    pub fn project(mut self, projection: Document) -> Self {
        self.stages.push(Stage::Project(projection));
        self
    }

    #[inline]
    pub fn bucket(mut self, spec: BucketSpec) -> Self {
        self.stages.push(Stage::Bucket(spec));
        self
    }

    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Render into the form the driver sends to the server.
    #[inline]
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// The `$bucket` stage, if this pipeline produces a histogram
    #[inline]
    pub fn bucket_spec(&self) -> Option<&BucketSpec> {
        self.stages.iter().find_map(|stage| match stage {
            Stage::Bucket(spec) => Some(spec),
            _ => None,
        })
    }
}
