//! `$bucket` histograms.
//!
//! Buckets are left-closed and right-open: a value `v` lands in bucket `i` when
//! `boundaries[i] <= v < boundaries[i + 1]`. Anything else, including a value
//! equal to the last boundary, goes to the default bucket. [`BucketSpec::assign`]
//! reproduces the server's placement so results can be labelled and checked locally.


use mongodb::bson::{Bson, Document, doc};

use super::pipeline::{Accumulator, Outputs, outputs_document};

/// Building footprint area classes, square meters
pub const AREA_BOUNDARIES: [f64; 7] = [0.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 10000.0];
pub const AREA_DEFAULT_LABEL: &str = "10000+";

/// Detection confidence classes
pub const CONFIDENCE_BOUNDARIES: [f64; 7] = [0.0, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
pub const CONFIDENCE_DEFAULT_LABEL: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index of the lower boundary
    Bucket(usize),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    pub group_by: String,
    pub boundaries: Vec<f64>,
    pub default_label: String,
    pub outputs: Outputs,
}

/// Per-bucket counts plus the default bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub counts: Vec<u64>,
    pub overflow: u64,
}

impl BucketSpec {
    /// Size distribution of building footprints
    #[inline]
    pub fn area_distribution() -> Self {
        Self {
            group_by: "area_m2".to_string(),
            boundaries: AREA_BOUNDARIES.to_vec(),
            default_label: AREA_DEFAULT_LABEL.to_string(),
            outputs: vec![
                ("count".to_string(), Accumulator::Count),
                ("total_area".to_string(), Accumulator::sum("area_m2")),
            ],
        }
    }

    #[inline]
    pub fn confidence_distribution() -> Self {
        Self {
            group_by: "confidence".to_string(),
            boundaries: CONFIDENCE_BOUNDARIES.to_vec(),
            default_label: CONFIDENCE_DEFAULT_LABEL.to_string(),
            outputs: vec![("count".to_string(), Accumulator::Count)],
        }
    }

    /// Number of regular buckets
    #[inline]
    pub fn len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn to_document(&self) -> Document {
        doc! {
            "$bucket": {
                "groupBy": format!("${}", self.group_by),
                "boundaries": self.boundaries.clone(),
                "default": self.default_label.as_str(),
                "output": outputs_document(&self.outputs),
            }
        }
    }

    #[inline]
    pub fn assign(&self, value: f64) -> Slot {
        self.boundaries
            .windows(2)
            .position(|pair| pair[0] <= value && value < pair[1])
            .map_or(Slot::Default, Slot::Bucket)
    }

    #[inline]
    pub fn tally<I>(&self, values: I) -> Tally
    where
        I: IntoIterator<Item = f64>,
    {
        let mut tally = Tally {
            counts: vec![0; self.len()],
            overflow: 0,
        };
        for value in values {
            match self.assign(value) {
                Slot::Bucket(i) => tally.counts[i] += 1,
                Slot::Default => tally.overflow += 1,
            }
        }
        tally
    }

    /// Human label for a slot, e.g. `[50, 100)`
    #[inline]
    pub fn label(&self, slot: Slot) -> String {
        match slot {
            Slot::Bucket(i) if i < self.len() => {
                format!("[{}, {})", self.boundaries[i], self.boundaries[i + 1])
            }
            _ => self.default_label.clone(),
        }
    }

    /// Label for a bucket `_id` as returned by the server.
    #[inline]
    pub fn label_for_id(&self, id: &Bson) -> String {
        let lower = match id {
            Bson::Double(v) => Some(*v),
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            _ => None,
        };
        lower
            .and_then(|lower| self.boundaries.iter().position(|b| *b == lower))
            .map_or_else(
                || self.default_label.clone(),
                |i| self.label(Slot::Bucket(i)),
            )
    }
}
