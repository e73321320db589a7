//! Per-region popup text.

use region_map_regions_models::{AttributeValue, RegionCollection};

/// Popup lines for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupContent {
    pub title: String,
    pub metric_line: String,
    pub secondary_line: Option<String>,
}

impl PopupContent {
    /// Plain text, one line per entry.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = format!("{}\n{}", self.title, self.metric_line);
        if let Some(line) = &self.secondary_line {
            text.push('\n');
            text.push_str(line);
        }
        text
    }

    /// Escaped HTML for a map popup.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<strong>{}</strong><br>{}",
            escape_html(&self.title),
            escape_html(&self.metric_line)
        );
        if let Some(line) = &self.secondary_line {
            html.push_str("<br>");
            html.push_str(&escape_html(line));
        }
        html
    }
}

/// Builds one popup per region, index-aligned with `collection`.
///
/// The secondary line is present only on regions that carry the
/// `secondary` attribute.
#[must_use]
pub fn build_popups(
    collection: &RegionCollection,
    metric: &str,
    secondary: Option<&str>,
) -> Vec<PopupContent> {
    collection
        .iter()
        .map(|region| PopupContent {
            title: region.display_name(),
            metric_line: value_line(metric, region.attribute(metric)),
            secondary_line: secondary.and_then(|column| {
                region
                    .attribute(column)
                    .map(|value| value_line(column, Some(value)))
            }),
        })
        .collect()
}

fn value_line(label: &str, value: Option<&AttributeValue>) -> String {
    match value.and_then(AttributeValue::as_number) {
        Some(n) => format!("{label}: {n:.1}"),
        None => format!("{label}: no data"),
    }
}

/// Escapes text for insertion into HTML element content or attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};
    use region_map_regions_models::RegionFeature;

    use super::*;

    fn square(offset: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: offset, y: 0.0),
            (x: offset + 1.0, y: 0.0),
            (x: offset + 1.0, y: 1.0),
        ]])
    }

    fn collection() -> RegionCollection {
        RegionCollection::new(vec![
            RegionFeature::new(1, Some("Alpha".to_owned()), square(0.0))
                .with_attribute("crime_rate", AttributeValue::Number(123.456))
                .with_attribute("pollution_index", AttributeValue::Number(12.0)),
            RegionFeature::new(2, None, square(1.0))
                .with_attribute("crime_rate", AttributeValue::Null),
            RegionFeature::new(3, Some("<C&D>".to_owned()), square(2.0))
                .with_attribute("crime_rate", AttributeValue::Number(5.0))
                .with_attribute("pollution_index", AttributeValue::Null),
        ])
        .unwrap()
    }

    #[test]
    fn popups_are_index_aligned() {
        let collection = collection();
        let popups = build_popups(&collection, "crime_rate", Some("pollution_index"));

        assert_eq!(popups.len(), collection.len());
        assert_eq!(popups[0].title, "Alpha");
        assert_eq!(popups[0].metric_line, "crime_rate: 123.5");
        assert_eq!(
            popups[0].secondary_line.as_deref(),
            Some("pollution_index: 12.0")
        );
        assert_eq!(popups[1].title, "Region 2");
        assert_eq!(popups[1].metric_line, "crime_rate: no data");
        assert_eq!(popups[1].secondary_line, None);
        assert_eq!(
            popups[2].secondary_line.as_deref(),
            Some("pollution_index: no data")
        );
    }

    #[test]
    fn html_is_escaped() {
        let popups = build_popups(&collection(), "crime_rate", None);

        assert_eq!(
            popups[2].to_html(),
            "<strong>&lt;C&amp;D&gt;</strong><br>crime_rate: 5.0"
        );
        assert_eq!(popups[2].to_text(), "<C&D>\ncrime_rate: 5.0");
    }
}
