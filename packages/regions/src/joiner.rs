//! Left join of an external metrics table onto a region collection.
//!
//! The join key is negotiated from both schemas: `name` when both sides
//! carry it, otherwise `region_id` from the metrics side. The output always
//! has exactly as many regions as the input.

use std::collections::BTreeMap;

use region_map_regions_models::{
    AttributeValue, Capabilities, Field, FieldRequirements, MetricsTable, NAME_COLUMN, REGION_ID_COLUMN,
    RegionCollection,
};
use strum_macros::{AsRefStr, Display};

const NAME_FIELD: Field = Field::new(NAME_COLUMN, &[NAME_COLUMN]);
const REGION_ID_FIELD: Field = Field::new(REGION_ID_COLUMN, &[REGION_ID_COLUMN]);

/// Key columns the joiner can use. Neither is required.
pub const JOIN_FIELDS: FieldRequirements = FieldRequirements {
    required: &[],
    optional: &[NAME_FIELD, REGION_ID_FIELD],
};

/// Which key the join used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JoinKey {
    /// Matched on region name.
    Name,
    /// Matched on numeric region id.
    RegionId,
    /// The table had no usable key column; nothing was joined.
    None,
    /// No table was supplied.
    Skipped,
}

/// Result of [`join_metrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// The collection with merged columns.
    pub collection: RegionCollection,
    /// Key that was used.
    pub key: JoinKey,
    /// Regions that found a metrics row.
    pub matched: usize,
    /// Human-readable notes about degraded behaviour.
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyValue {
    Name(String),
    Id(u64),
}

/// Left-joins `metrics` onto `collection`.
///
/// Without a table the collection passes through unchanged with
/// [`JoinKey::Skipped`].
#[must_use]
pub fn join_metrics(collection: RegionCollection, metrics: Option<&MetricsTable>) -> JoinOutcome {
    let Some(metrics) = metrics else {
        log::debug!("No metrics table supplied; join skipped");
        return JoinOutcome {
            collection,
            key: JoinKey::Skipped,
            matched: 0,
            diagnostics: vec![],
        };
    };

    // No required fields, so negotiation cannot fail.
    let caps = metrics.schema().negotiate(&JOIN_FIELDS).unwrap_or_default();
    let name_column = caps.column(NAME_COLUMN).filter(|_| collection.has_names());
    let id_column = caps.column(REGION_ID_COLUMN);

    let (key, key_column) = match (name_column, id_column) {
        (Some(column), _) => (JoinKey::Name, column.to_owned()),
        (None, Some(column)) => (JoinKey::RegionId, column.to_owned()),
        (None, None) => {
            let message =
                "metrics table has neither `name` nor `region_id`; join skipped".to_owned();
            log::warn!("{message}");
            return JoinOutcome {
                collection,
                key: JoinKey::None,
                matched: 0,
                diagnostics: vec![message],
            };
        }
    };

    let mut diagnostics = Vec::new();
    let index = index_rows(metrics, key, &key_column, &mut diagnostics);

    let merged: Vec<&String> = metrics
        .headers
        .iter()
        .filter(|h| !is_key_column(h, &caps))
        .collect();

    let mut collection = collection;
    for column in &merged {
        collection.ensure_column(column);
    }

    let mut matched = 0;
    for position in 0..collection.len() {
        let region = &collection.regions()[position];
        let lookup = match key {
            JoinKey::Name => region
                .name
                .as_deref()
                .map(|n| KeyValue::Name(n.trim().to_owned())),
            _ => Some(KeyValue::Id(region.region_id)),
        };

        match lookup.and_then(|k| index.get(&k)) {
            Some(&row_index) => {
                matched += 1;
                let row = &metrics.rows[row_index];
                for column in &merged {
                    let value = row.get(*column).cloned().unwrap_or(AttributeValue::Null);
                    collection.set_attribute(position, column, value);
                }
            }
            None => {
                for column in &merged {
                    if collection.regions()[position].attribute(column).is_none() {
                        collection.set_attribute(position, column, AttributeValue::Null);
                    }
                }
            }
        }
    }

    let unmatched = collection.len() - matched;
    if unmatched > 0 {
        diagnostics.push(format!(
            "{unmatched} of {} regions had no matching metrics row",
            collection.len()
        ));
    }

    log::info!(
        "Joined metrics on {key}: {matched}/{} regions matched, {} column(s) merged",
        collection.len(),
        merged.len()
    );

    JoinOutcome {
        collection,
        key,
        matched,
        diagnostics,
    }
}

fn is_key_column(header: &str, caps: &Capabilities) -> bool {
    header == NAME_COLUMN
        || header == REGION_ID_COLUMN
        || caps.column(NAME_COLUMN) == Some(header)
        || caps.column(REGION_ID_COLUMN) == Some(header)
}

/// Maps key values to the first row carrying them.
fn index_rows(
    metrics: &MetricsTable,
    key: JoinKey,
    column: &str,
    diagnostics: &mut Vec<String>,
) -> BTreeMap<KeyValue, usize> {
    let mut index = BTreeMap::new();
    let mut duplicates = 0_usize;
    let mut unusable = 0_usize;

    for (i, row) in metrics.rows.iter().enumerate() {
        let cell = row.get(column).unwrap_or(&AttributeValue::Null);
        let Some(value) = key_value(cell, key) else {
            unusable += 1;
            continue;
        };
        if index.contains_key(&value) {
            duplicates += 1;
        } else {
            index.insert(value, i);
        }
    }

    if duplicates > 0 {
        let message = format!(
            "{duplicates} metrics row(s) repeat an earlier `{column}` value and were ignored"
        );
        log::warn!("{message}");
        diagnostics.push(message);
    }
    if unusable > 0 {
        let message = format!("{unusable} metrics row(s) have an unusable `{column}` value");
        log::warn!("{message}");
        diagnostics.push(message);
    }

    index
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn key_value(cell: &AttributeValue, key: JoinKey) -> Option<KeyValue> {
    match key {
        JoinKey::Name => match cell {
            AttributeValue::Null => None,
            other => Some(KeyValue::Name(other.to_string().trim().to_owned())),
        },
        _ => match cell {
            AttributeValue::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
                Some(KeyValue::Id(*n as u64))
            }
            AttributeValue::Text(s) => s.trim().parse().ok().map(KeyValue::Id),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};
    use region_map_regions_models::RegionFeature;

    use super::*;
    use crate::tables::{parse_csv, to_metrics_table};

    fn square(offset: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: offset, y: 0.0),
            (x: offset + 1.0, y: 0.0),
            (x: offset + 1.0, y: 1.0),
            (x: offset, y: 1.0),
        ]])
    }

    fn named_regions() -> RegionCollection {
        RegionCollection::new(vec![
            RegionFeature::new(1, Some("A".to_owned()), square(0.0)),
            RegionFeature::new(2, Some("B".to_owned()), square(1.0)),
            RegionFeature::new(3, Some("C".to_owned()), square(2.0)),
        ])
        .unwrap()
    }

    fn unnamed_regions() -> RegionCollection {
        RegionCollection::new(vec![
            RegionFeature::new(1, None, square(0.0)),
            RegionFeature::new(2, None, square(1.0)),
            RegionFeature::new(3, None, square(2.0)),
        ])
        .unwrap()
    }

    fn table(csv: &str) -> MetricsTable {
        to_metrics_table(parse_csv(csv.as_bytes(), "inline").unwrap())
    }

    #[test]
    fn no_table_passes_through() {
        let outcome = join_metrics(named_regions(), None);

        assert_eq!(outcome.key, JoinKey::Skipped);
        assert_eq!(outcome.collection, named_regions());
    }

    #[test]
    fn name_takes_precedence_over_region_id() {
        // Ids point at different regions than names; the name must win.
        let metrics = table("region_id,name,crime_rate\n3,A,100\n1,C,800\n");
        let outcome = join_metrics(named_regions(), Some(&metrics));

        assert_eq!(outcome.key, JoinKey::Name);
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.collection.len(), 3);

        let rates = outcome.collection.metric_values("crime_rate");
        assert_eq!(rates, vec![Some(100.0), None, Some(800.0)]);
        assert_eq!(
            outcome.collection.columns(),
            ["region_id", "name", "crime_rate"]
        );
    }

    #[test]
    fn region_id_is_used_without_names() {
        let metrics = table("region_id,crime_rate\n3.0,800\n1,100\n");
        let outcome = join_metrics(unnamed_regions(), Some(&metrics));

        assert_eq!(outcome.key, JoinKey::RegionId);
        assert_eq!(outcome.collection.len(), 3);
        assert_eq!(
            outcome.collection.metric_values("crime_rate"),
            vec![Some(100.0), None, Some(800.0)]
        );
        assert_eq!(
            outcome.collection.regions()[1].attribute("crime_rate"),
            Some(&AttributeValue::Null)
        );
    }

    #[test]
    fn table_without_key_is_skipped_with_diagnostic() {
        let metrics = table("county,crime_rate\nA,1\n");
        let outcome = join_metrics(named_regions(), Some(&metrics));

        assert_eq!(outcome.key, JoinKey::None);
        assert_eq!(outcome.collection.len(), 3);
        assert!(!outcome.collection.schema().contains("crime_rate"));
        assert!(outcome.diagnostics[0].contains("neither"));
    }

    #[test]
    fn duplicate_keys_never_duplicate_regions() {
        let metrics = table("name,crime_rate\nA,1\nA,2\nB,3\n");
        let outcome = join_metrics(named_regions(), Some(&metrics));

        assert_eq!(outcome.collection.len(), 3);
        assert_eq!(
            outcome.collection.metric_values("crime_rate"),
            vec![Some(1.0), Some(3.0), None]
        );
        assert!(outcome.diagnostics.iter().any(|d| d.contains("repeat")));
    }

    #[test]
    fn numeric_looking_names_match_verbatim() {
        let regions = RegionCollection::new(vec![
            RegionFeature::new(1, Some("007".to_owned()), square(0.0)),
            RegionFeature::new(2, Some("1.50".to_owned()), square(1.0)),
            RegionFeature::new(3, Some("7".to_owned()), square(2.0)),
        ])
        .unwrap();
        let metrics = table("name,crime_rate\n007,100\n1.50,200\n");
        let outcome = join_metrics(regions, Some(&metrics));

        assert_eq!(outcome.key, JoinKey::Name);
        assert_eq!(outcome.matched, 2);
        assert_eq!(
            outcome.collection.metric_values("crime_rate"),
            vec![Some(100.0), Some(200.0), None]
        );
    }

    #[test]
    fn unmatched_regions_keep_existing_attributes() {
        let regions = RegionCollection::new(vec![
            RegionFeature::new(1, Some("A".to_owned()), square(0.0))
                .with_attribute("crime_rate", AttributeValue::Number(5.0)),
            RegionFeature::new(2, Some("B".to_owned()), square(1.0))
                .with_attribute("crime_rate", AttributeValue::Number(6.0)),
        ])
        .unwrap();
        let metrics = table("name,crime_rate,population\nB,60,1000\n");
        let outcome = join_metrics(regions, Some(&metrics));

        assert_eq!(
            outcome.collection.metric_values("crime_rate"),
            vec![Some(5.0), Some(60.0)]
        );
        assert_eq!(
            outcome.collection.metric_values("population"),
            vec![None, Some(1000.0)]
        );
        assert_eq!(outcome.key.as_ref(), "name");
    }
}
