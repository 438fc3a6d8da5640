//! Read-only exploration queries over the PDET collections.

pub mod catalog;
pub mod histogram;
pub mod pipeline;

pub use catalog::{
    AggregateQuery, CountQuery, FindQuery, Query, ReportItem, Section, report_plan,
};
pub use histogram::{BucketSpec, Slot, Tally};
pub use pipeline::{Accumulator, GroupKey, Lookup, Pipeline, SortOrder, Stage};
