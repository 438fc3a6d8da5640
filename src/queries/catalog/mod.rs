// Exploration report catalog
// Every report item is built here as a typed value; the runner in `report` only executes them.


use mongodb::bson::{Bson, Document, doc};
use std::fmt;

use super::histogram::BucketSpec;
use super::pipeline::{Accumulator, GroupKey, Lookup, Pipeline, SortOrder};
use crate::config::ReportConfig;
use crate::schema::{BuildingSource, CollectionKind};

/// Buildings larger than this are implausible footprints
pub const MAX_PLAUSIBLE_AREA_M2: f64 = 100_000.0;

/// Bounding box of continental Colombia, degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

pub const COLOMBIA_BBOX: BoundingBox = BoundingBox {
    min_lon: -82.0,
    max_lon: -66.0,
    min_lat: -5.0,
    max_lat: 14.0,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub collection: CollectionKind,
    pub filter: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub collection: CollectionKind,
    pub filter: Document,
    pub projection: Document,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub collection: CollectionKind,
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Count(CountQuery),
    Find(FindQuery),
    Aggregate(AggregateQuery),
    /// Pick any municipality, then find buildings of `source` inside its geometry
    BuildingsInSampleMunicipality { source: BuildingSource, limit: i64 },
    Indexes(CollectionKind),
}

impl Query {
    #[inline]
    pub fn collection(&self) -> CollectionKind {
        match self {
            Query::Count(q) => q.collection,
            Query::Find(q) => q.collection,
            Query::Aggregate(q) => q.collection,
            Query::BuildingsInSampleMunicipality { source, .. } => {
                CollectionKind::Buildings(*source)
            }
            Query::Indexes(kind) => *kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    BasicStatistics,
    MunicipalityStatistics,
    MunicipalitySpatial,
    BuildingStatistics(BuildingSource),
    BuildingSpatial,
    SourceComparison,
    DataQuality,
    Reporting,
    Indexes,
}

impl Section {
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            Section::BasicStatistics => 1,
            Section::MunicipalityStatistics => 2,
            Section::MunicipalitySpatial => 3,
            Section::BuildingStatistics(BuildingSource::Microsoft) => 4,
            Section::BuildingStatistics(BuildingSource::Google) => 5,
            Section::BuildingSpatial => 6,
            Section::SourceComparison => 7,
            Section::DataQuality => 8,
            Section::Reporting => 9,
            Section::Indexes => 10,
        }
    }

    #[inline]
    pub fn title(self) -> String {
        match self {
            Section::BasicStatistics => "BASIC STATISTICS".to_string(),
            Section::MunicipalityStatistics => "MUNICIPALITY STATISTICS".to_string(),
            Section::MunicipalitySpatial => "SPATIAL QUERIES - MUNICIPALITIES".to_string(),
            Section::BuildingStatistics(source) => {
                format!("BUILDING STATISTICS - {}", source.label().to_uppercase())
            }
            Section::BuildingSpatial => "SPATIAL QUERIES - BUILDINGS".to_string(),
            Section::SourceComparison => "COMPARISON - MICROSOFT VS GOOGLE".to_string(),
            Section::DataQuality => "DATA QUALITY CHECKS".to_string(),
            Section::Reporting => "AGGREGATION FOR REPORTING".to_string(),
            Section::Indexes => "INDEX INFORMATION".to_string(),
        }
    }
}

impl fmt::Display for Section {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub section: Section,
    pub label: String,
    pub query: Query,
}

impl ReportItem {
    fn new(section: Section, label: impl Into<String>, query: Query) -> Self {
        Self {
            section,
            label: label.into(),
            query,
        }
    }
}

fn municipality_projection() -> Document {
    doc! { "muni_name": 1, "dept_name": 1, "area_km2": 1, "_id": 0 }
}

#[inline]
pub fn count_all(collection: CollectionKind) -> CountQuery {
    CountQuery {
        collection,
        filter: doc! {},
    }
}

/// Municipality count and total area per value of `field`
#[inline]
pub fn municipalities_by(field: &str, limit: Option<i64>) -> AggregateQuery {
    let mut pipeline = Pipeline::new()
        .group(
            GroupKey::Field(field.to_string()),
            vec![
                ("count".to_string(), Accumulator::Count),
                ("total_area_km2".to_string(), Accumulator::sum("area_km2")),
            ],
        )
        .sort_by("count", SortOrder::Descending);
    if let Some(limit) = limit {
        pipeline = pipeline.limit(limit);
    }

    AggregateQuery {
        collection: CollectionKind::Municipalities,
        pipeline,
    }
}

#[inline]
pub fn area_statistics() -> AggregateQuery {
    let field = "area_km2".to_string();
    AggregateQuery {
        collection: CollectionKind::Municipalities,
        pipeline: Pipeline::new().group(
            GroupKey::All,
            vec![
                ("total_area".to_string(), Accumulator::Sum(field.clone())),
                ("avg_area".to_string(), Accumulator::Avg(field.clone())),
                ("min_area".to_string(), Accumulator::Min(field.clone())),
                ("max_area".to_string(), Accumulator::Max(field)),
            ],
        ),
    }
}

/// Escape regex metacharacters so the pattern matches literally.
#[inline]
pub fn escape_regex(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match on `pdet_region`
#[inline]
pub fn region_filter(pattern: &str) -> Document {
    doc! { "pdet_region": { "$regex": escape_regex(pattern), "$options": "i" } }
}

#[inline]
pub fn municipalities_in_region(pattern: &str, limit: i64) -> FindQuery {
    FindQuery {
        collection: CollectionKind::Municipalities,
        filter: region_filter(pattern),
        projection: municipality_projection(),
        sort: None,
        limit: Some(limit),
    }
}

#[inline]
pub fn largest_municipalities(limit: i64) -> FindQuery {
    FindQuery {
        collection: CollectionKind::Municipalities,
        filter: doc! {},
        projection: municipality_projection(),
        sort: Some(doc! { "area_km2": -1 }),
        limit: Some(limit),
    }
}

/// Top municipalities by building count for one source, with names joined in
#[inline]
pub fn buildings_per_municipality(source: BuildingSource, limit: i64) -> AggregateQuery {
    let mut outputs = vec![
        ("building_count".to_string(), Accumulator::Count),
        ("total_area_m2".to_string(), Accumulator::sum("area_m2")),
        ("avg_area_m2".to_string(), Accumulator::avg("area_m2")),
    ];
    let mut projection = doc! {
        "muni_code": "$_id",
        "muni_name": { "$arrayElemAt": ["$municipality.muni_name", 0] },
        "dept_name": { "$arrayElemAt": ["$municipality.dept_name", 0] },
        "building_count": 1,
        "total_area_m2": 1,
        "avg_area_m2": 1,
    };
    if source == BuildingSource::Google {
        outputs.push(("avg_confidence".to_string(), Accumulator::avg("confidence")));
        projection.insert("avg_confidence", 1);
    }

    AggregateQuery {
        collection: CollectionKind::Buildings(source),
        pipeline: Pipeline::new()
            .group(GroupKey::Field("muni_code".to_string()), outputs)
            .sort_by("building_count", SortOrder::Descending)
            .limit(limit)
            .lookup(Lookup::Equality {
                from: CollectionKind::Municipalities.name().to_string(),
                local_field: "_id".to_string(),
                foreign_field: "muni_code".to_string(),
                as_field: "municipality".to_string(),
            })
            .project(projection),
    }
}

#[inline]
pub fn histogram(source: BuildingSource, spec: BucketSpec) -> AggregateQuery {
    AggregateQuery {
        collection: CollectionKind::Buildings(source),
        pipeline: Pipeline::new().bucket(spec),
    }
}

/// Buildings of `source` whose geometry lies inside `geometry`
#[inline]
pub fn buildings_within(source: BuildingSource, geometry: Bson, limit: i64) -> FindQuery {
    FindQuery {
        collection: CollectionKind::Buildings(source),
        filter: doc! { "geom": { "$geoWithin": { "$geometry": geometry } } },
        projection: doc! { "area_m2": 1, "muni_code": 1, "_id": 0 },
        sort: None,
        limit: Some(limit),
    }
}

fn count_or_zero(as_field: &str) -> Document {
    doc! { "$ifNull": [{ "$arrayElemAt": [format!("${as_field}.count"), 0] }, 0] }
}

/// Building counts per source for the first `limit` municipalities
#[inline]
pub fn source_comparison(limit: i64) -> AggregateQuery {
    let counting = |source: BuildingSource, as_field: &str| Lookup::CountMatching {
        from: CollectionKind::Buildings(source).name().to_string(),
        local_field: "muni_code".to_string(),
        foreign_field: "muni_code".to_string(),
        as_field: as_field.to_string(),
    };

    AggregateQuery {
        collection: CollectionKind::Municipalities,
        pipeline: Pipeline::new()
            .limit(limit)
            .lookup(counting(BuildingSource::Microsoft, "ms_count"))
            .lookup(counting(BuildingSource::Google, "google_count"))
            .project(doc! {
                "muni_name": 1,
                "dept_name": 1,
                "microsoft_buildings": count_or_zero("ms_count"),
                "google_buildings": count_or_zero("google_count"),
            }),
    }
}

/// `pdet_region` absent, null or empty
#[inline]
pub fn missing_region_filter() -> Document {
    doc! {
        "$or": [
            { "pdet_region": { "$exists": false } },
            { "pdet_region": Bson::Null },
            { "pdet_region": "" },
        ]
    }
}

#[inline]
pub fn missing_muni_code_filter() -> Document {
    doc! { "muni_code": { "$exists": false } }
}

#[inline]
pub fn invalid_area_filter() -> Document {
    doc! {
        "$or": [
            { "area_m2": { "$lt": 0.0 } },
            { "area_m2": { "$gt": MAX_PLAUSIBLE_AREA_M2 } },
        ]
    }
}

/// Polygons whose first vertex falls outside `bbox`
#[inline]
pub fn outside_bbox_filter(bbox: BoundingBox) -> Document {
    let lon = "geom.coordinates.0.0.0";
    let lat = "geom.coordinates.0.0.1";
    doc! {
        "geom.type": "Polygon",
        "$or": [
            { lon: { "$lt": bbox.min_lon } },
            { lon: { "$gt": bbox.max_lon } },
            { lat: { "$lt": bbox.min_lat } },
            { lat: { "$gt": bbox.max_lat } },
        ]
    }
}

/// Per PDET region: municipalities, buildings of `source` and municipal area
#[inline]
pub fn regional_rollup(source: BuildingSource) -> AggregateQuery {
    AggregateQuery {
        collection: CollectionKind::Municipalities,
        pipeline: Pipeline::new()
            .lookup(Lookup::Equality {
                from: CollectionKind::Buildings(source).name().to_string(),
                local_field: "muni_code".to_string(),
                foreign_field: "muni_code".to_string(),
                as_field: "buildings".to_string(),
            })
            .group(
                GroupKey::Field("pdet_region".to_string()),
                vec![
                    ("municipality_count".to_string(), Accumulator::Count),
                    (
                        "total_building_count".to_string(),
                        Accumulator::SumSize("buildings".to_string()),
                    ),
                    ("total_muni_area_km2".to_string(), Accumulator::sum("area_km2")),
                ],
            )
            .sort_by("total_building_count", SortOrder::Descending),
    }
}

/// The full exploration report, in execution order.
#[inline]
pub fn report_plan(config: &ReportConfig) -> Vec<ReportItem> {
    let sample = i64::from(config.sample_limit);
    let top = i64::from(config.top_limit);
    let mut plan = Vec::new();

    plan.push(ReportItem::new(
        Section::BasicStatistics,
        "Total PDET municipalities",
        Query::Count(count_all(CollectionKind::Municipalities)),
    ));
    for source in BuildingSource::ALL {
        plan.push(ReportItem::new(
            Section::BasicStatistics,
            format!("Total buildings ({})", source.label()),
            Query::Count(count_all(CollectionKind::Buildings(source))),
        ));
    }

    plan.push(ReportItem::new(
        Section::MunicipalityStatistics,
        format!("Municipalities by department (top {top})"),
        Query::Aggregate(municipalities_by("dept_name", Some(top))),
    ));
    plan.push(ReportItem::new(
        Section::MunicipalityStatistics,
        "Municipalities by PDET region",
        Query::Aggregate(municipalities_by("pdet_region", None)),
    ));
    plan.push(ReportItem::new(
        Section::MunicipalityStatistics,
        "Area statistics (km²)",
        Query::Aggregate(area_statistics()),
    ));

    plan.push(ReportItem::new(
        Section::MunicipalitySpatial,
        format!(
            "Municipalities in region matching '{}' (first {sample})",
            config.region_pattern
        ),
        Query::Find(municipalities_in_region(&config.region_pattern, sample)),
    ));
    plan.push(ReportItem::new(
        Section::MunicipalitySpatial,
        format!("Top {top} largest municipalities by area"),
        Query::Find(largest_municipalities(top)),
    ));

    for source in BuildingSource::ALL {
        let section = Section::BuildingStatistics(source);
        plan.push(ReportItem::new(
            section,
            format!("Buildings per municipality ({}) - top {top}", source.label()),
            Query::Aggregate(buildings_per_municipality(source, top)),
        ));
        let (label, spec) = match source {
            BuildingSource::Microsoft => (
                "Building size distribution (Microsoft)",
                BucketSpec::area_distribution(),
            ),
            BuildingSource::Google => (
                "Confidence score distribution (Google)",
                BucketSpec::confidence_distribution(),
            ),
        };
        plan.push(ReportItem::new(
            section,
            label,
            Query::Aggregate(histogram(source, spec)),
        ));
    }

    plan.push(ReportItem::new(
        Section::BuildingSpatial,
        format!("Buildings inside a sample municipality (Microsoft - first {sample})"),
        Query::BuildingsInSampleMunicipality {
            source: BuildingSource::Microsoft,
            limit: sample,
        },
    ));

    plan.push(ReportItem::new(
        Section::SourceComparison,
        format!("Building count comparison (first {sample} municipalities)"),
        Query::Aggregate(source_comparison(sample)),
    ));

    plan.push(ReportItem::new(
        Section::DataQuality,
        "Municipalities without PDET region",
        Query::Count(CountQuery {
            collection: CollectionKind::Municipalities,
            filter: missing_region_filter(),
        }),
    ));
    let checks: [(&str, fn() -> Document); 3] = [
        ("Buildings without municipality code", missing_muni_code_filter),
        ("Buildings with invalid areas (< 0 or > 100000 m²)", invalid_area_filter),
        ("Buildings outside the Colombia bounding box", || {
            outside_bbox_filter(COLOMBIA_BBOX)
        }),
    ];
    for (label, filter) in checks {
        for source in BuildingSource::ALL {
            plan.push(ReportItem::new(
                Section::DataQuality,
                format!("{label} ({})", source.label()),
                Query::Count(CountQuery {
                    collection: CollectionKind::Buildings(source),
                    filter: filter(),
                }),
            ));
        }
    }

    plan.push(ReportItem::new(
        Section::Reporting,
        "Summary by PDET region (Microsoft buildings)",
        Query::Aggregate(regional_rollup(BuildingSource::Microsoft)),
    ));

    for kind in CollectionKind::ALL {
        plan.push(ReportItem::new(
            Section::Indexes,
            format!("Indexes on {kind}"),
            Query::Indexes(kind),
        ));
    }

    plan
}
