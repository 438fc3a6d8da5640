
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use super::BuildingSource;
use super::guard::ValidationError;

/// GeoJSON position: longitude, latitude and optional extra ordinates
pub type Position = Vec<f64>;
pub type Ring = Vec<Position>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Coordinates must be a non-empty nesting of numeric pairs.
    #[inline]
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        let coordinates = format!("{path}.coordinates");
        match self {
            Geometry::Polygon(rings) => validate_polygon(rings, &coordinates),
            Geometry::MultiPolygon(polygons) => {
                if polygons.is_empty() {
                    return Err(ValidationError::invariant(
                        &coordinates,
                        "MultiPolygon has no polygons",
                    ));
                }
                polygons
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, rings)| validate_polygon(rings, &format!("{coordinates}.{i}")))
            }
        }
    }
}

fn validate_polygon(rings: &[Ring], path: &str) -> Result<(), ValidationError> {
    if rings.is_empty() {
        return Err(ValidationError::invariant(path, "polygon has no rings"));
    }
    for (r, ring) in rings.iter().enumerate() {
        if ring.is_empty() {
            return Err(ValidationError::invariant(
                &format!("{path}.{r}"),
                "ring has no positions",
            ));
        }
        for (p, position) in ring.iter().enumerate() {
            if position.len() < 2 || !position.iter().all(|v| v.is_finite()) {
                return Err(ValidationError::invariant(
                    &format!("{path}.{r}.{p}"),
                    "position must hold at least two finite numbers",
                ));
            }
        }
    }
    Ok(())
}

fn is_code(value: &str, digits: usize) -> bool {
    value.len() == digits && value.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Municipality {
    pub muni_code: String,
    pub dept_code: String,
    pub muni_name: String,
    pub dept_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdet_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdet_subregion: Option<String>,
    pub geom: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Municipality {
    /// DIVIPOLA codes: 5-digit municipality, 2-digit department.
    #[inline]
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_code(&self.muni_code, 5) {
            return Err(ValidationError::invariant(
                "muni_code",
                &format!("expected 5 digits, found {:?}", self.muni_code),
            ));
        }
        if !is_code(&self.dept_code, 2) {
            return Err(ValidationError::invariant(
                "dept_code",
                &format!("expected 2 digits, found {:?}", self.dept_code),
            ));
        }
        self.geom.validate("geom")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muni_code: Option<String>,
    pub geom: Geometry,
    pub area_m2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Building {
    #[inline]
    pub fn validate(&self, source: BuildingSource) -> Result<(), ValidationError> {
        if let Some(code) = &self.muni_code {
            if !is_code(code, 5) {
                return Err(ValidationError::invariant(
                    "muni_code",
                    &format!("expected 5 digits, found {code:?}"),
                ));
            }
        }
        if !self.area_m2.is_finite() {
            return Err(ValidationError::invariant("area_m2", "must be a finite number"));
        }
        if source == BuildingSource::Google {
            if let Some(confidence) = self.confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(ValidationError::invariant(
                        "confidence",
                        &format!("expected a score in [0, 1], found {confidence}"),
                    ));
                }
            }
        }
        self.geom.validate("geom")
    }
}
