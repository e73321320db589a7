//! Interactive web map composition.
//!
//! [`InteractiveMap::compose`] gathers everything the page needs into a
//! serializable [`MapConfig`]; [`InteractiveMap::to_html`] inlines that
//! config into a single self-contained HTML document.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use region_map_regions_models::{NAME_COLUMN, PointCollection, REGION_ID_COLUMN, RegionCollection};
use serde::Serialize;

use crate::html;
use crate::popup::{PopupContent, escape_html};
use crate::scale::ColorScale;

/// Default map centre (`[lat, lon]`), roughly the contiguous US.
pub const DEFAULT_CENTER: [f64; 2] = [39.8283, -98.5795];
pub const DEFAULT_ZOOM: u8 = 4;
pub const DEFAULT_TILES_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_TILES_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

/// Overlay name of the point marker group.
pub const POINTS_LAYER: &str = "Points";

const FILL_OPACITY: f64 = 0.7;

/// Base map and viewpoint settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveOptions {
    pub center: [f64; 2],
    pub zoom: u8,
    pub tiles_url: String,
    pub tiles_attribution: String,
    pub title: String,
}

impl Default for InteractiveOptions {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            tiles_url: DEFAULT_TILES_URL.to_owned(),
            tiles_attribution: DEFAULT_TILES_ATTRIBUTION.to_owned(),
            title: "Region Map".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileConfig {
    pub name: String,
    pub url: String,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendConfig {
    pub title: String,
    pub entries: Vec<LegendEntry>,
}

/// A clustered marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub popup: String,
    pub tooltip: String,
}

/// Everything the page script reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapConfig {
    pub center: [f64; 2],
    pub zoom: u8,
    pub tiles: TileConfig,
    pub choropleth: FeatureCollection,
    pub points: Option<Vec<PointMarker>>,
    /// Overlay names in layer-control order: choropleth first, then points
    /// when present.
    pub overlays: Vec<String>,
    pub search: bool,
    pub legend: LegendConfig,
}

/// A composed interactive map, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveMap {
    title: String,
    config: MapConfig,
}

impl InteractiveMap {
    /// Composes the map from the joined collection.
    ///
    /// `popups` must be index-aligned with `collection`.
    #[must_use]
    pub fn compose(
        collection: &RegionCollection,
        metric: &str,
        scale: &ColorScale,
        popups: &[PopupContent],
        points: Option<&PointCollection>,
        options: &InteractiveOptions,
    ) -> Self {
        let features = collection
            .iter()
            .zip(popups)
            .map(|(region, popup)| {
                let value = region.number(metric);
                let bin = scale.bin_index(value);

                let mut properties = JsonObject::new();
                properties.insert(REGION_ID_COLUMN.to_owned(), region.region_id.into());
                if let Some(name) = &region.name {
                    properties.insert(NAME_COLUMN.to_owned(), name.clone().into());
                }
                properties.insert(
                    metric.to_owned(),
                    value.map_or(JsonValue::Null, JsonValue::from),
                );
                properties.insert("fill".to_owned(), scale.color_for(value).hex().into());
                properties.insert(
                    "fill_opacity".to_owned(),
                    (if bin.is_some() { FILL_OPACITY } else { 0.0 }).into(),
                );
                properties.insert("popup".to_owned(), popup.to_html().into());
                properties.insert("tooltip".to_owned(), escape_html(&popup.title).into());

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let points = points.filter(|p| !p.is_empty()).map(|p| {
            p.points
                .iter()
                .map(|point| {
                    let mut popup = format!("<strong>{}</strong>", escape_html(&point.name));
                    if let Some(description) = &point.description {
                        popup.push_str("<br>");
                        popup.push_str(&escape_html(description));
                    }
                    PointMarker {
                        latitude: point.latitude,
                        longitude: point.longitude,
                        popup,
                        tooltip: escape_html(&point.name),
                    }
                })
                .collect::<Vec<_>>()
        });

        let mut overlays = vec![metric.to_owned()];
        if points.is_some() {
            overlays.push(POINTS_LAYER.to_owned());
        }

        let config = MapConfig {
            center: options.center,
            zoom: options.zoom,
            tiles: TileConfig {
                name: "Base map".to_owned(),
                url: options.tiles_url.clone(),
                attribution: options.tiles_attribution.clone(),
            },
            choropleth: FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
            points,
            overlays,
            search: collection.has_names(),
            legend: legend(metric, scale),
        };

        Self {
            title: options.title.clone(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Names listed in the layer control's overlay section.
    #[must_use]
    pub fn overlay_names(&self) -> &[String] {
        &self.config.overlays
    }

    #[must_use]
    pub const fn has_search(&self) -> bool {
        self.config.search
    }

    #[must_use]
    pub const fn has_points(&self) -> bool {
        self.config.points.is_some()
    }

    /// Renders the self-contained HTML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn to_html(&self) -> Result<String, serde_json::Error> {
        // Raw `<` could end or re-enter the inline script block; `>` is
        // escaped for symmetry. Both only occur inside JSON strings.
        let config = serde_json::to_string(&self.config)?
            .replace('<', "\\u003c")
            .replace('>', "\\u003e");

        let mut head = html::LEAFLET_HEAD.to_owned();
        if self.has_points() {
            head.push_str(html::MARKERCLUSTER_HEAD);
        }
        if self.has_search() {
            head.push_str(html::SEARCH_HEAD);
        }

        Ok(html::MAP_TEMPLATE
            .replace(html::TITLE_SLOT, &escape_html(&self.title))
            .replace(html::HEAD_SLOT, &head)
            .replace(html::CONFIG_SLOT, &config))
    }
}

fn legend(metric: &str, scale: &ColorScale) -> LegendConfig {
    LegendConfig {
        title: metric.to_owned(),
        entries: scale
            .legend_entries()
            .into_iter()
            .map(|(label, color)| LegendEntry {
                label,
                color: color.hex(),
            })
            .collect(),
    }
}
