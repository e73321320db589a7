//! Point overlay loading.

use std::path::Path;

use region_map_regions_models::{Field, FieldRequirements, PointCollection, PointFeature};

use crate::RegionError;
use crate::tables::{CsvTable, read_csv};

const LATITUDE: Field = Field::new("latitude", &["latitude", "lat"]);
const LONGITUDE: Field = Field::new("longitude", &["longitude", "lon", "lng"]);
const NAME: Field = Field::new("name", &["name"]);
const DESCRIPTION: Field = Field::new("description", &["description"]);

/// Columns the point loader negotiates for.
pub const POINT_FIELDS: FieldRequirements = FieldRequirements {
    required: &[LATITUDE, LONGITUDE],
    optional: &[NAME, DESCRIPTION],
};

/// Loads the optional point overlay. `None` means no overlay was requested.
///
/// # Errors
///
/// * [`RegionError::DataSource`] if the file cannot be read
/// * [`RegionError::InputValidation`] if a coordinate column is missing
pub fn load_points(path: Option<&Path>) -> Result<Option<PointCollection>, RegionError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let table = read_csv(path)?;
    let points = points_from_table(&table, &path.display().to_string())?;

    log::info!("Loaded {} points from {}", points.len(), path.display());

    Ok(Some(points))
}

/// Builds points from an already-parsed table.
///
/// Rows with unparseable or out-of-range coordinates are skipped with a
/// warning.
///
/// # Errors
///
/// Returns [`RegionError::InputValidation`] if a coordinate column is
/// missing.
pub fn points_from_table(table: &CsvTable, input: &str) -> Result<PointCollection, RegionError> {
    let caps = table
        .schema()
        .negotiate(&POINT_FIELDS)
        .map_err(|e| RegionError::InputValidation {
            input: input.to_owned(),
            missing: e.missing,
            available: table.headers.clone(),
        })?;

    let column = |field: &Field| {
        caps.column(field.name)
            .and_then(|c| table.column_index(c))
    };
    let (Some(lat_idx), Some(lon_idx)) = (column(&LATITUDE), column(&LONGITUDE)) else {
        return Err(RegionError::InputValidation {
            input: input.to_owned(),
            missing: vec![LATITUDE.name.to_owned(), LONGITUDE.name.to_owned()],
            available: table.headers.clone(),
        });
    };
    let name_idx = column(&NAME);
    let description_idx = column(&DESCRIPTION);

    let mut points = Vec::with_capacity(table.rows.len());
    let mut skipped = 0_usize;

    for (i, row) in table.rows.iter().enumerate() {
        let row_number = i + 1;
        let coords = parse_coordinate(&row[lat_idx], 90.0)
            .zip(parse_coordinate(&row[lon_idx], 180.0));
        let Some((latitude, longitude)) = coords else {
            log::warn!(
                "{input}: skipping row {row_number} with invalid coordinates ({}, {})",
                row[lat_idx],
                row[lon_idx]
            );
            skipped += 1;
            continue;
        };

        let name = name_idx
            .map(|idx| row[idx].as_str())
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("Point {row_number}"), str::to_owned);
        let description = description_idx
            .map(|idx| row[idx].clone())
            .filter(|s| !s.is_empty());

        points.push(PointFeature {
            latitude,
            longitude,
            name,
            description,
        });
    }

    if skipped > 0 {
        log::warn!("{input}: skipped {skipped} of {} rows", table.rows.len());
    }

    Ok(PointCollection { points })
}

fn parse_coordinate(cell: &str, limit: f64) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
}

#[cfg(test)]
mod tests {
    use region_map_regions_models::Crs;

    use super::*;
    use crate::tables::parse_csv;

    fn table(csv: &str) -> CsvTable {
        parse_csv(csv.as_bytes(), "points.csv").unwrap()
    }

    #[test]
    fn short_aliases_are_accepted() {
        let points =
            points_from_table(&table("lat,lon,name\n35.7,-78.6,Raleigh\n"), "points.csv").unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points.crs(), Crs::Wgs84);
        assert_eq!(
            points.points[0],
            PointFeature {
                latitude: 35.7,
                longitude: -78.6,
                name: "Raleigh".to_owned(),
                description: None,
            }
        );
    }

    #[test]
    fn missing_longitude_is_an_input_validation_error() {
        let err = points_from_table(&table("lat,name\n35.7,Raleigh\n"), "points.csv").unwrap_err();

        match err {
            RegionError::InputValidation {
                missing, available, ..
            } => {
                assert_eq!(missing, vec!["longitude"]);
                assert_eq!(available, vec!["lat", "name"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_rows_are_skipped_and_names_fall_back() {
        let points = points_from_table(
            &table("latitude,lng,description\n1,2,first\nx,3,\n95,0,\n4,5,\n"),
            "points.csv",
        )
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points.points[0].name, "Point 1");
        assert_eq!(points.points[0].description.as_deref(), Some("first"));
        assert_eq!(points.points[1].name, "Point 4");
        assert_eq!(points.points[1].description, None);
    }

    #[test]
    fn no_path_means_no_overlay() {
        assert_eq!(load_points(None).unwrap(), None);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        std::fs::write(&path, "Latitude,Longitude\n10,20\n").unwrap();

        let points = load_points(Some(&path)).unwrap().unwrap();
        assert!((points.points[0].longitude - 20.0).abs() < f64::EPSILON);
    }
}
