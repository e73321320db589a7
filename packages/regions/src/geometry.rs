//! `GeoJSON` region parsing and CRS normalization.
//!
//! Accepts a `FeatureCollection`, a single `Feature`, or a bare polygonal
//! `Geometry`. Only `Polygon` and `MultiPolygon` geometries become regions;
//! anything else is skipped with a warning. Legacy `crs` members naming Web
//! Mercator are inverse-projected to WGS84 so every collection leaving this
//! module is longitude/latitude.

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::io::BufReader;
use std::path::Path;

use geo::{MapCoords as _, MultiPolygon};
use geojson::{GeoJson, JsonObject, JsonValue};
use region_map_regions_models::{
    AttributeValue, Crs, NAME_COLUMN, REGION_ID_COLUMN, RegionCollection, RegionFeature,
};

use crate::RegionError;

/// WGS84 semi-major axis used by spherical Web Mercator, in metres.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Property keys accepted as the region name, in priority order.
const NAME_KEYS: &[&str] = &[NAME_COLUMN, "NAME", "Name"];

/// How region ids are assigned while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Keep source `region_id` properties when every region has a unique
    /// one; otherwise number regions `1..=N`.
    PreserveIfValid,
    /// Always number regions `1..=N` in iteration order.
    Reassign,
}

/// Reads a `GeoJSON` file into a region collection.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] if the file cannot be opened, is not
/// valid `GeoJSON`, or declares an unsupported CRS.
pub fn read_regions(path: &Path, ids: IdPolicy) -> Result<RegionCollection, RegionError> {
    let origin = path.display().to_string();
    log::info!("Loading regions from {origin}...");

    let file = std::fs::File::open(path).map_err(|e| RegionError::data_source(&origin, e))?;
    let geojson = GeoJson::from_reader(BufReader::new(file))
        .map_err(|e| RegionError::data_source(&origin, e))?;

    regions_from_geojson(geojson, &origin, ids)
}

/// Converts a parsed `GeoJSON` document into a region collection.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] if the document declares a CRS other
/// than WGS84 or Web Mercator.
pub fn regions_from_geojson(
    geojson: GeoJson,
    origin: &str,
    ids: IdPolicy,
) -> Result<RegionCollection, RegionError> {
    let (crs_member, raw): (Option<JsonValue>, Vec<(Option<geojson::Geometry>, JsonObject)>) =
        match geojson {
            GeoJson::FeatureCollection(fc) => (
                fc.foreign_members.and_then(|mut m| m.remove("crs")),
                fc.features
                    .into_iter()
                    .map(|f| (f.geometry, f.properties.unwrap_or_default()))
                    .collect(),
            ),
            GeoJson::Feature(f) => (
                f.foreign_members.as_ref().and_then(|m| m.get("crs").cloned()),
                vec![(f.geometry, f.properties.unwrap_or_default())],
            ),
            GeoJson::Geometry(g) => (
                g.foreign_members.as_ref().and_then(|m| m.get("crs").cloned()),
                vec![(Some(g), JsonObject::new())],
            ),
        };

    let crs = detect_crs(crs_member.as_ref(), origin)?;
    if crs == Crs::WebMercator {
        log::info!("{origin} declares EPSG:3857, normalizing to WGS84");
    }

    let mut parsed: Vec<(Option<u64>, RegionFeature)> = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;

    for (index, (geometry, properties)) in raw.into_iter().enumerate() {
        let Some(multi_polygon) = geometry.and_then(to_multipolygon) else {
            log::warn!("{origin}: feature {index} has no polygonal geometry, skipping");
            skipped += 1;
            continue;
        };

        let multi_polygon = match crs {
            Crs::Wgs84 => multi_polygon,
            Crs::WebMercator => mercator_to_wgs84(&multi_polygon),
        };

        let source_id = properties.get(REGION_ID_COLUMN).and_then(parse_region_id);
        let name = NAME_KEYS
            .iter()
            .find_map(|key| properties.get(*key).and_then(JsonValue::as_str))
            .map(str::to_owned);

        let mut region = RegionFeature::new(0, name, multi_polygon);
        for (key, value) in properties {
            if key == REGION_ID_COLUMN || NAME_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(attribute) = json_to_attribute(&value) {
                region.attributes.insert(key, attribute);
            } else {
                log::debug!("{origin}: dropping nested property '{key}'");
            }
        }

        parsed.push((source_id, region));
    }

    if skipped > 0 {
        log::warn!("{origin}: skipped {skipped} non-polygon feature(s)");
    }

    let regions = assign_ids(parsed, ids, origin);
    log::info!("Loaded {} regions from {origin}", regions.len());

    RegionCollection::new(regions).map_err(|e| RegionError::data_source(origin, e))
}

/// Applies the id policy, falling back to sequential ids whenever source ids
/// are missing or collide.
fn assign_ids(
    parsed: Vec<(Option<u64>, RegionFeature)>,
    ids: IdPolicy,
    origin: &str,
) -> Vec<RegionFeature> {
    let keep_source_ids = ids == IdPolicy::PreserveIfValid && {
        let mut seen = BTreeSet::new();
        parsed
            .iter()
            .all(|(id, _)| id.is_some_and(|id| seen.insert(id)))
    };

    if ids == IdPolicy::PreserveIfValid
        && !keep_source_ids
        && parsed.iter().any(|(id, _)| id.is_some())
    {
        log::warn!("{origin}: region_id values are incomplete or duplicated, renumbering 1..=N");
    }

    parsed
        .into_iter()
        .zip(1u64..)
        .map(|((source_id, mut region), sequential)| {
            region.region_id = if keep_source_ids {
                source_id.unwrap_or(sequential)
            } else {
                sequential
            };
            region
        })
        .collect()
}

/// Reads the legacy `crs` member. Absent means RFC 7946 WGS84.
fn detect_crs(member: Option<&JsonValue>, origin: &str) -> Result<Crs, RegionError> {
    let Some(name) = member.and_then(|crs| crs["properties"]["name"].as_str()) else {
        return Ok(Crs::Wgs84);
    };

    let upper = name.to_ascii_uppercase();
    if upper.ends_with("CRS84") || upper.ends_with("EPSG:4326") || upper.ends_with("EPSG::4326")
    {
        Ok(Crs::Wgs84)
    } else if ["EPSG:3857", "EPSG::3857", "EPSG:900913", "EPSG::900913"]
        .iter()
        .any(|code| upper.ends_with(code))
    {
        Ok(Crs::WebMercator)
    } else {
        Err(RegionError::data_source(
            origin,
            format!("unsupported CRS '{name}' (expected WGS84 or EPSG:3857)"),
        ))
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`], if polygonal and
/// non-empty.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    let multi_polygon = match geo_geom {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => return None,
    };

    let has_rings = multi_polygon
        .0
        .iter()
        .any(|p| p.exterior().0.len() >= 3);
    has_rings.then_some(multi_polygon)
}

/// Inverse spherical Web Mercator, metres to degrees.
fn mercator_to_wgs84(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    mp.map_coords(|c| geo::Coord {
        x: (c.x / EARTH_RADIUS_M).to_degrees(),
        y: (2.0f64.mul_add((c.y / EARTH_RADIUS_M).exp().atan(), -PI / 2.0)).to_degrees(),
    })
}

/// Reads a `region_id` property: a non-negative integer or an integral
/// string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn parse_region_id(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Maps a scalar JSON property onto an attribute. Arrays and objects have no
/// tabular representation and are dropped.
fn json_to_attribute(value: &JsonValue) -> Option<AttributeValue> {
    match value {
        JsonValue::Null => Some(AttributeValue::Null),
        JsonValue::Number(n) => n.as_f64().map(AttributeValue::Number),
        JsonValue::String(s) => Some(AttributeValue::Text(s.clone())),
        JsonValue::Bool(b) => Some(AttributeValue::Text(b.to_string())),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}
