#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region, metric and point types shared by the region map pipeline.
//!
//! A [`RegionCollection`] is the single source of truth flowing from the
//! loader through the metric joiner into the renderer. It always holds WGS84
//! longitude/latitude geometry; loaders normalize before constructing one.

pub mod schema;

use std::collections::BTreeMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

pub use schema::{Capabilities, Field, FieldRequirements, MissingFields, Schema};

/// Reserved column holding the numeric region identifier.
pub const REGION_ID_COLUMN: &str = "region_id";

/// Reserved column holding the optional display name.
pub const NAME_COLUMN: &str = "name";

/// A single attribute cell on a region or metrics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A numeric value.
    Number(f64),
    /// Free-form text.
    Text(String),
    /// No value.
    Null,
}

impl AttributeValue {
    /// Coerces a raw CSV cell: empty is [`Self::Null`], anything that parses
    /// as a float is [`Self::Number`], everything else is [`Self::Text`].
    #[must_use]
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Null;
        }
        trimmed
            .parse::<f64>()
            .map_or_else(|_| Self::Text(trimmed.to_owned()), Self::Number)
    }

    /// Like [`Self::from_cell`] but never numeric. Used for key columns.
    #[must_use]
    pub fn from_text_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Null
        } else {
            Self::Text(trimmed.to_owned())
        }
    }

    /// Returns the value as a finite number, if it is one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Whether this is the "no value" marker.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Null => Ok(()),
        }
    }
}

/// Coordinate reference systems the loader knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Geographic WGS84 longitude/latitude in degrees (EPSG:4326 / CRS84).
    Wgs84,
    /// Spherical Web Mercator metres (EPSG:3857).
    WebMercator,
}

/// One geographic region with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    /// Identifier, unique within its collection.
    pub region_id: u64,
    /// Display name, when the source carried one.
    pub name: Option<String>,
    /// Region outline in WGS84 degrees.
    pub geometry: MultiPolygon<f64>,
    /// Every other column, keyed by column name.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl RegionFeature {
    /// Creates a region with no attributes.
    #[must_use]
    pub const fn new(region_id: u64, name: Option<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            region_id,
            name,
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, column: &str, value: AttributeValue) -> Self {
        self.attributes.insert(column.to_owned(), value);
        self
    }

    /// Looks up an attribute cell.
    #[must_use]
    pub fn attribute(&self, column: &str) -> Option<&AttributeValue> {
        self.attributes.get(column)
    }

    /// Looks up an attribute as a finite number.
    #[must_use]
    pub fn number(&self, column: &str) -> Option<f64> {
        self.attribute(column).and_then(AttributeValue::as_number)
    }

    /// The region's name, or `"Region {region_id}"` when it has none.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Region {}", self.region_id))
    }
}

/// Error returned when two regions in one collection share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateRegionIdError {
    /// The id that appeared more than once.
    pub region_id: u64,
}

impl std::fmt::Display for DuplicateRegionIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "duplicate region_id {}", self.region_id)
    }
}

impl std::error::Error for DuplicateRegionIdError {}

/// Ordered regions sharing the WGS84 CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCollection {
    regions: Vec<RegionFeature>,
    columns: Vec<String>,
}

impl RegionCollection {
    /// Builds a collection from WGS84 regions.
    ///
    /// Columns are `region_id`, then `name` when any region carries one,
    /// then attribute columns in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateRegionIdError`] if two regions share an id.
    pub fn new(regions: Vec<RegionFeature>) -> Result<Self, DuplicateRegionIdError> {
        let mut seen = std::collections::BTreeSet::new();
        for region in &regions {
            if !seen.insert(region.region_id) {
                return Err(DuplicateRegionIdError {
                    region_id: region.region_id,
                });
            }
        }

        let mut columns = vec![REGION_ID_COLUMN.to_owned()];
        if regions.iter().any(|r| r.name.is_some()) {
            columns.push(NAME_COLUMN.to_owned());
        }
        for region in &regions {
            for key in region.attributes.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        Ok(Self { regions, columns })
    }

    /// CRS of every geometry in the collection.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        Crs::Wgs84
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the collection holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions in order.
    #[must_use]
    pub fn regions(&self) -> &[RegionFeature] {
        &self.regions
    }

    /// Iterates regions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, RegionFeature> {
        self.regions.iter()
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Capability descriptor for stages negotiating against this collection.
    #[must_use]
    pub fn schema(&self) -> Schema {
        Schema::new(self.columns.iter().cloned())
    }

    /// Whether any region carries a name.
    #[must_use]
    pub fn has_names(&self) -> bool {
        self.columns.iter().any(|c| c == NAME_COLUMN)
    }

    /// Appends a column if the collection does not already expose it.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_owned());
        }
    }

    /// Sets one attribute cell, registering the column if it is new.
    ///
    /// Out-of-range indices are ignored.
    pub fn set_attribute(&mut self, index: usize, column: &str, value: AttributeValue) {
        if let Some(region) = self.regions.get_mut(index) {
            region.attributes.insert(column.to_owned(), value);
            self.ensure_column(column);
        }
    }

    /// The metric column as one entry per region, in index order.
    ///
    /// `None` marks regions whose cell is missing, null, text or non-finite.
    #[must_use]
    pub fn metric_values(&self, column: &str) -> Vec<Option<f64>> {
        self.regions.iter().map(|r| r.number(column)).collect()
    }
}

impl<'a> IntoIterator for &'a RegionCollection {
    type Item = &'a RegionFeature;
    type IntoIter = std::slice::Iter<'a, RegionFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// External tabular metrics, keyed by `name` or `region_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    /// Header row in file order.
    pub headers: Vec<String>,
    /// One map per data row.
    pub rows: Vec<BTreeMap<String, AttributeValue>>,
}

impl MetricsTable {
    /// Capability descriptor of the table's columns.
    #[must_use]
    pub fn schema(&self) -> Schema {
        Schema::new(self.headers.iter().cloned())
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A point of interest for the optional overlay layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    /// Latitude in WGS84 degrees.
    pub latitude: f64,
    /// Longitude in WGS84 degrees.
    pub longitude: f64,
    /// Marker label.
    pub name: String,
    /// Optional free-form description shown in the marker popup.
    pub description: Option<String>,
}

/// Points sharing the WGS84 CRS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCollection {
    /// Points in source order.
    pub points: Vec<PointFeature>,
}

impl PointCollection {
    /// CRS of every point (always EPSG:4326).
    #[must_use]
    pub const fn crs(&self) -> Crs {
        Crs::Wgs84
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the collection holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn square(offset: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: offset, y: 0.0),
            (x: offset + 1.0, y: 0.0),
            (x: offset + 1.0, y: 1.0),
            (x: offset, y: 1.0),
        ]])
    }

    #[test]
    fn cell_coercion() {
        assert_eq!(AttributeValue::from_cell(""), AttributeValue::Null);
        assert_eq!(AttributeValue::from_cell("  "), AttributeValue::Null);
        assert_eq!(AttributeValue::from_cell(" 4.5 "), AttributeValue::Number(4.5));
        assert_eq!(
            AttributeValue::from_cell("Wake"),
            AttributeValue::Text("Wake".to_owned())
        );
    }

    #[test]
    fn nan_is_not_a_number() {
        assert_eq!(AttributeValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn columns_follow_id_name_then_attributes() {
        let regions = vec![
            RegionFeature::new(1, None, square(0.0))
                .with_attribute("crime_rate", AttributeValue::Number(1.0)),
            RegionFeature::new(2, Some("B".to_owned()), square(1.0))
                .with_attribute("area", AttributeValue::Number(2.0)),
        ];
        let collection = RegionCollection::new(regions).unwrap();

        assert_eq!(collection.columns(), ["region_id", "name", "crime_rate", "area"]);
        assert!(collection.has_names());
        assert_eq!(collection.crs(), Crs::Wgs84);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let regions = vec![
            RegionFeature::new(7, None, square(0.0)),
            RegionFeature::new(7, None, square(1.0)),
        ];
        assert_eq!(
            RegionCollection::new(regions).unwrap_err(),
            DuplicateRegionIdError { region_id: 7 }
        );
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let region = RegionFeature::new(12, None, square(0.0));
        assert_eq!(region.display_name(), "Region 12");
    }

    #[test]
    fn metric_values_are_index_aligned() {
        let regions = vec![
            RegionFeature::new(1, None, square(0.0))
                .with_attribute("m", AttributeValue::Number(3.0)),
            RegionFeature::new(2, None, square(1.0)).with_attribute("m", AttributeValue::Null),
            RegionFeature::new(3, None, square(2.0))
                .with_attribute("m", AttributeValue::Text("n/a".to_owned())),
        ];
        let collection = RegionCollection::new(regions).unwrap();

        assert_eq!(collection.metric_values("m"), vec![Some(3.0), None, None]);
    }

    #[test]
    fn attribute_values_serialize_untagged() {
        let json = serde_json::to_string(&vec![
            AttributeValue::Number(1.5),
            AttributeValue::Text("x".to_owned()),
            AttributeValue::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[1.5,"x",null]"#);
    }
}
