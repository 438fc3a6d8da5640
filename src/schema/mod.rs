// Schema declarations for the PDET dataset
// Collection names, $jsonSchema validators and index definitions live here as data;
// the initializer and verifier only interpret them.

pub mod guard;
pub mod initializer;
pub mod models;
pub mod verify;

#[cfg(test)]
mod tests;

use mongodb::IndexModel;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use guard::{ValidationError, check_document, check_schema, json_to_document};
pub use initializer::{CreationPolicy, InitReport, SchemaInitializer};
pub use models::{Building, Geometry, Municipality};
pub use verify::{CollectionDrift, CollectionStatus, SchemaReport, observe};

/// Name of the index MongoDB creates on `_id` for every collection
pub const DEFAULT_ID_INDEX: &str = "_id_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingSource {
    Microsoft,
    Google,
}

impl BuildingSource {
    pub const ALL: [BuildingSource; 2] = [BuildingSource::Microsoft, BuildingSource::Google];

    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            BuildingSource::Microsoft => "Microsoft",
            BuildingSource::Google => "Google",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    Municipalities,
    Buildings(BuildingSource),
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Municipalities,
        CollectionKind::Buildings(BuildingSource::Microsoft),
        CollectionKind::Buildings(BuildingSource::Google),
    ];

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::Municipalities => "pdet_municipalities",
            CollectionKind::Buildings(BuildingSource::Microsoft) => "buildings_microsoft",
            CollectionKind::Buildings(BuildingSource::Google) => "buildings_google",
        }
    }

    #[inline]
    pub fn building_source(self) -> Option<BuildingSource> {
        match self {
            CollectionKind::Municipalities => None,
            CollectionKind::Buildings(source) => Some(source),
        }
    }
}

impl fmt::Display for CollectionKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown collection: {0} (expected pdet_municipalities, buildings_microsoft or buildings_google)")]
pub struct UnknownCollection(pub String);

impl FromStr for CollectionKind {
    type Err = UnknownCollection;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdet_municipalities" | "municipalities" | "municipality" => {
                Ok(CollectionKind::Municipalities)
            }
            "buildings_microsoft" | "microsoft" => {
                Ok(CollectionKind::Buildings(BuildingSource::Microsoft))
            }
            "buildings_google" | "google" => Ok(CollectionKind::Buildings(BuildingSource::Google)),
            _ => Err(UnknownCollection(s.to_string())),
        }
    }
}

fn geometry_schema() -> Document {
    doc! {
        "bsonType": "object",
        "required": ["type", "coordinates"],
        "properties": {
            "type": {
                "enum": ["Polygon", "MultiPolygon"],
                "description": "GeoJSON geometry type"
            },
            "coordinates": {
                "bsonType": "array",
                "description": "GeoJSON coordinates array"
            }
        }
    }
}

/// The `$jsonSchema` body enforced for `kind`.
#[inline]
pub fn json_schema(kind: CollectionKind) -> Document {
    match kind {
        CollectionKind::Municipalities => doc! {
            "bsonType": "object",
            "required": ["muni_code", "dept_code", "muni_name", "dept_name", "geom"],
            "properties": {
                "dept_code": { "bsonType": "string", "description": "Department code (2 digits)" },
                "muni_code": { "bsonType": "string", "description": "Municipality code (5 digits DIVIPOLA)" },
                "dept_name": { "bsonType": "string", "description": "Department name" },
                "muni_name": { "bsonType": "string", "description": "Municipality name" },
                "pdet_region": { "bsonType": "string", "description": "PDET region name" },
                "pdet_subregion": { "bsonType": "string", "description": "PDET subregion name" },
                "geom": geometry_schema(),
                "area_km2": { "bsonType": "double", "description": "Municipality area in square kilometers" },
                "data_source": { "bsonType": "string", "description": "Data source (e.g., DANE MGN)" },
                "created_at": { "bsonType": "date", "description": "Document creation timestamp" },
                "updated_at": { "bsonType": "date", "description": "Last update timestamp" }
            }
        },
        CollectionKind::Buildings(source) => {
            let mut properties = doc! {
                "muni_code": { "bsonType": "string", "description": "Municipality code where building is located" },
                "geom": geometry_schema(),
                "area_m2": { "bsonType": "double", "description": "Building footprint area in square meters" },
            };
            match source {
                BuildingSource::Microsoft => {
                    properties.insert(
                        "data_source",
                        doc! { "bsonType": "string", "description": "Data source (Microsoft Building Footprints)" },
                    );
                    properties.insert(
                        "source_date",
                        doc! { "bsonType": "string", "description": "Date when imagery was captured" },
                    );
                }
                BuildingSource::Google => {
                    properties.insert(
                        "confidence",
                        doc! { "bsonType": "double", "description": "Confidence score (0-1)" },
                    );
                    properties.insert(
                        "data_source",
                        doc! { "bsonType": "string", "description": "Data source (Google Open Buildings)" },
                    );
                }
            }
            properties.insert(
                "created_at",
                doc! { "bsonType": "date", "description": "Document creation timestamp" },
            );

            doc! {
                "bsonType": "object",
                "required": ["geom", "area_m2"],
                "properties": properties
            }
        }
    }
}

/// The collection validator, `{ $jsonSchema: ... }`.
#[inline]
pub fn validator(kind: CollectionKind) -> Document {
    doc! { "$jsonSchema": json_schema(kind) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    Ascending,
    Descending,
    Sphere2d,
}

impl IndexKey {
    fn to_bson(self) -> Bson {
        match self {
            IndexKey::Ascending => Bson::Int32(1),
            IndexKey::Descending => Bson::Int32(-1),
            IndexKey::Sphere2d => Bson::String("2dsphere".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub keys: &'static [(&'static str, IndexKey)],
    pub unique: bool,
}

impl IndexSpec {
    const fn new(name: &'static str, keys: &'static [(&'static str, IndexKey)]) -> Self {
        Self {
            name,
            keys,
            unique: false,
        }
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[inline]
    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, key)| ((*field).to_string(), key.to_bson()))
            .collect()
    }

    #[inline]
    pub fn to_model(&self) -> IndexModel {
        let options = if self.unique {
            IndexOptions::builder()
                .name(self.name.to_string())
                .unique(true)
                .build()
        } else {
            IndexOptions::builder().name(self.name.to_string()).build()
        };

        IndexModel::builder()
            .keys(self.keys_document())
            .options(options)
            .build()
    }
}

const GEOM_2DSPHERE: IndexSpec = IndexSpec::new("geom_2dsphere", &[("geom", IndexKey::Sphere2d)]);
const MUNI_CODE_AREA: IndexSpec = IndexSpec::new(
    "muni_code_area_idx",
    &[("muni_code", IndexKey::Ascending), ("area_m2", IndexKey::Descending)],
);

const MUNICIPALITY_INDEXES: &[IndexSpec] = &[
    GEOM_2DSPHERE,
    IndexSpec::new("muni_code_unique", &[("muni_code", IndexKey::Ascending)]).unique(),
    IndexSpec::new("dept_code_idx", &[("dept_code", IndexKey::Ascending)]),
    IndexSpec::new("pdet_region_idx", &[("pdet_region", IndexKey::Ascending)]),
    IndexSpec::new("pdet_subregion_idx", &[("pdet_subregion", IndexKey::Ascending)]),
];

const MICROSOFT_INDEXES: &[IndexSpec] = &[
    GEOM_2DSPHERE,
    IndexSpec::new("muni_code_idx", &[("muni_code", IndexKey::Ascending)]),
    IndexSpec::new("area_m2_idx", &[("area_m2", IndexKey::Ascending)]),
    MUNI_CODE_AREA,
];

const GOOGLE_INDEXES: &[IndexSpec] = &[
    GEOM_2DSPHERE,
    IndexSpec::new("muni_code_idx", &[("muni_code", IndexKey::Ascending)]),
    IndexSpec::new("area_m2_idx", &[("area_m2", IndexKey::Ascending)]),
    IndexSpec::new("confidence_idx", &[("confidence", IndexKey::Ascending)]),
    MUNI_CODE_AREA,
];

/// Indexes built for `kind`, in creation order.
#[inline]
pub fn index_specs(kind: CollectionKind) -> &'static [IndexSpec] {
    match kind {
        CollectionKind::Municipalities => MUNICIPALITY_INDEXES,
        CollectionKind::Buildings(BuildingSource::Microsoft) => MICROSOFT_INDEXES,
        CollectionKind::Buildings(BuildingSource::Google) => GOOGLE_INDEXES,
    }
}

/// Every index name `kind` should report once initialized, `_id_` included.
#[inline]
pub fn expected_index_names(kind: CollectionKind) -> Vec<&'static str> {
    std::iter::once(DEFAULT_ID_INDEX)
        .chain(index_specs(kind).iter().map(|spec| spec.name))
        .collect()
}
