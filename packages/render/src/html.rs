//! Static HTML fragments for the interactive map document.
//!
//! The page reads all of its data from the inline `map-config` JSON block;
//! nothing in the template is region specific.

pub const LEAFLET_HEAD: &str = r#"  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <link rel="stylesheet" href="https://unpkg.com/leaflet-minimap@3.6.1/dist/Control.MiniMap.min.css" />
  <script src="https://unpkg.com/leaflet-minimap@3.6.1/dist/Control.MiniMap.min.js"></script>
"#;

pub const MARKERCLUSTER_HEAD: &str = r#"  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.4.1/dist/MarkerCluster.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.4.1/dist/MarkerCluster.Default.css" />
  <script src="https://unpkg.com/leaflet.markercluster@1.4.1/dist/leaflet.markercluster.js"></script>
"#;

pub const SEARCH_HEAD: &str = r#"  <link rel="stylesheet" href="https://unpkg.com/leaflet-search@3.0.9/dist/leaflet-search.min.css" />
  <script src="https://unpkg.com/leaflet-search@3.0.9/dist/leaflet-search.min.js"></script>
"#;

pub const TITLE_SLOT: &str = "{{TITLE}}";
pub const HEAD_SLOT: &str = "{{HEAD}}";
pub const CONFIG_SLOT: &str = "{{CONFIG}}";

pub const MAP_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">

<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
{{HEAD}}  <style>
    html, body { height: 100%; margin: 0; }
    #map { position: absolute; inset: 0; }
    .legend {
      background: rgba(255, 255, 255, 0.92);
      padding: 8px 10px;
      border-radius: 4px;
      box-shadow: 0 1px 4px rgba(0, 0, 0, 0.3);
      font: 12px/1.4 sans-serif;
    }
    .legend h4 { margin: 0 0 6px; font-size: 13px; }
    .legend i {
      display: inline-block;
      width: 18px;
      height: 12px;
      margin-right: 6px;
      vertical-align: middle;
      border: 1px solid #999;
    }
  </style>
</head>

<body>
  <div id="map"></div>
  <script type="application/json" id="map-config">{{CONFIG}}</script>
  <script>
    (function () {
      const config = JSON.parse(document.getElementById('map-config').textContent);

      const map = L.map('map').setView(config.center, config.zoom);
      const base = L.tileLayer(config.tiles.url, {
        attribution: config.tiles.attribution,
        maxZoom: 19
      }).addTo(map);

      const choropleth = L.geoJSON(config.choropleth, {
        style: function (feature) {
          return {
            fillColor: feature.properties.fill,
            fillOpacity: feature.properties.fill_opacity,
            color: '#555555',
            weight: 1
          };
        },
        onEachFeature: function (feature, layer) {
          layer.bindPopup(feature.properties.popup);
          layer.bindTooltip(feature.properties.tooltip, { sticky: true });
        }
      }).addTo(map);

      const overlays = {};
      overlays[config.overlays[0]] = choropleth;

      if (config.points) {
        const cluster = L.markerClusterGroup();
        config.points.forEach(function (point) {
          L.marker([point.latitude, point.longitude])
            .bindPopup(point.popup)
            .bindTooltip(point.tooltip)
            .addTo(cluster);
        });
        cluster.addTo(map);
        overlays[config.overlays[1]] = cluster;
      }

      const baseLayers = {};
      baseLayers[config.tiles.name] = base;
      L.control.layers(baseLayers, overlays, { collapsed: false }).addTo(map);

      L.control.scale().addTo(map);

      new L.Control.MiniMap(
        L.tileLayer(config.tiles.url, { attribution: config.tiles.attribution }),
        { toggleDisplay: true, position: 'bottomright' }
      ).addTo(map);

      if (config.search) {
        map.addControl(new L.Control.Search({
          layer: choropleth,
          propertyName: 'name',
          marker: false,
          initial: false,
          moveToLocation: function (latlng, title, map) {
            map.fitBounds(latlng.layer.getBounds());
            latlng.layer.openPopup();
          }
        }));
      }

      const legend = L.control({ position: 'bottomleft' });
      legend.onAdd = function () {
        const div = L.DomUtil.create('div', 'legend');
        const heading = document.createElement('h4');
        heading.textContent = config.legend.title;
        div.appendChild(heading);
        config.legend.entries.forEach(function (entry) {
          const row = document.createElement('div');
          const swatch = document.createElement('i');
          swatch.style.background = entry.color;
          row.appendChild(swatch);
          row.appendChild(document.createTextNode(entry.label));
          div.appendChild(row);
        });
        return div;
      };
      legend.addTo(map);
    })();
  </script>
</body>

</html>
"#;
