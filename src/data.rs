use crate::config::{AppConfig, ColumnConfig};
use crate::error::LoadError;
use crate::types::{BoundaryGeometry, PopulationRow, PopulationTable, StateBoundary, YEARS};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use geojson::GeoJson;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// Both inputs, loaded once per session and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub table: PopulationTable,
    pub boundaries: BoundaryGeometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(String),
    Path(String),
}

impl SourceLocation {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::Path(location.to_string())
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Path(s) => s,
        }
    }

    /// Lowercased extension, ignoring any URL query or fragment.
    pub fn extension(&self) -> Option<String> {
        let raw = self.as_str();
        let trimmed = match self {
            Self::Url(_) => raw.split(['?', '#']).next().unwrap_or(raw),
            Self::Path(_) => raw,
        };
        Path::new(trimmed)
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
    }
}

pub async fn load_dataset(config: &AppConfig) -> Result<Dataset, LoadError> {
    let client = reqwest::Client::new();

    let csv_location = SourceLocation::parse(&config.input.population_csv);
    info!(source = csv_location.as_str(), "Loading population table");
    let csv_bytes = read_source(&client, &csv_location).await?;
    let table = parse_population_table(csv_bytes.as_slice(), &config.input.columns)?;
    if table.is_empty() {
        warn!("Population table has no rows");
    }
    info!(states = table.len(), "Loaded population table");

    let boundary_location = SourceLocation::parse(&config.input.boundaries);
    info!(source = boundary_location.as_str(), "Loading boundary geometry");
    let boundaries =
        load_boundaries(&client, &boundary_location, &config.input.boundary_name_field).await?;
    info!(boundaries = boundaries.boundaries.len(), "Loaded boundary geometry");

    let unmatched = boundaries.unmatched_names(&table);
    if !unmatched.is_empty() {
        warn!(?unmatched, "Boundary names with no population row");
    }

    Ok(Dataset { table, boundaries })
}

async fn read_source(
    client: &reqwest::Client,
    location: &SourceLocation,
) -> Result<Vec<u8>, LoadError> {
    match location {
        SourceLocation::Url(url) => {
            let http_err = |source| LoadError::Http {
                location: url.clone(),
                source,
            };
            let resp = client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(http_err)?;
            let body = resp.bytes().await.map_err(http_err)?;
            Ok(body.to_vec())
        }
        SourceLocation::Path(path) => tokio::fs::read(path).await.map_err(|source| LoadError::Io {
            location: path.clone(),
            source,
        }),
    }
}

async fn load_boundaries(
    client: &reqwest::Client,
    location: &SourceLocation,
    name_field: &str,
) -> Result<BoundaryGeometry, LoadError> {
    let extension = location
        .extension()
        .ok_or_else(|| LoadError::UnsupportedFormat(location.as_str().to_string()))?;

    match (extension.as_str(), location) {
        ("shp", SourceLocation::Path(path)) => load_shapefile(Path::new(path), name_field),
        ("shp", SourceLocation::Url(url)) => {
            // Attributes live in the .dbf next to the .shp
            let shp = read_source(client, location).await?;
            let dbf = read_source(client, &SourceLocation::Url(sibling_url(url, "dbf"))).await?;
            parse_shapefile_boundaries(shp, dbf, name_field)
        }
        ("json" | "geojson", _) => {
            let bytes = read_source(client, location).await?;
            parse_geojson_boundaries(bytes.as_slice(), name_field)
        }
        _ => Err(LoadError::UnsupportedFormat(location.as_str().to_string())),
    }
}

pub fn parse_population_table<R: Read>(
    reader: R,
    columns: &ColumnConfig,
) -> Result<PopulationTable, LoadError> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };
    let state_idx = column_index(&columns.state_column)?;
    let code_idx = column_index(&columns.code_column)?;

    // Year columns outside YEARS are ignored
    let year_indices: Vec<(u16, usize)> = YEARS
        .map(|year| column_index(&year.to_string()).map(|idx| (year, idx)))
        .collect::<Result<_, _>>()?;

    let mut seen = HashSet::new();
    let mut seen_codes = HashSet::new();
    let mut rows = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let state_name = record.get(state_idx).unwrap_or("").to_string();

        if state_name.is_empty() {
            debug!(line = ?record.position().map(|p| p.line()), "Skipping row without state name");
            continue;
        }
        if !seen.insert(state_name.clone()) {
            return Err(LoadError::DuplicateState(state_name));
        }

        let state_code = record.get(code_idx).unwrap_or("").to_string();
        if !state_code.is_empty() && !seen_codes.insert(state_code.clone()) {
            return Err(LoadError::DuplicateCode(state_code));
        }

        let mut population_by_year = BTreeMap::new();
        for &(year, idx) in &year_indices {
            let cell = record.get(idx).unwrap_or("");
            if cell.is_empty() {
                continue;
            }
            let value = cell.parse::<u64>().map_err(|_| LoadError::InvalidPopulation {
                state: state_name.clone(),
                year,
                value: cell.to_string(),
            })?;
            population_by_year.insert(year, value);
        }

        rows.push(PopulationRow {
            state_code,
            state_name,
            population_by_year,
        });
    }

    Ok(PopulationTable::new(rows))
}

pub fn parse_geojson_boundaries<R: Read>(
    reader: R,
    name_field: &str,
) -> Result<BoundaryGeometry, LoadError> {
    let geojson = GeoJson::from_reader(reader).map_err(geojson::Error::from)?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(LoadError::NotFeatureCollection),
    };

    let mut boundaries = Vec::new();

    for feature in collection.features {
        let name = match feature.property(name_field) {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            _ => {
                debug!(name_field, "Skipping feature without a name");
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let geo_geom: geo::Geometry<f64> = geom.value.try_into()?;
                match geo_geom {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        debug!(%name, "Skipping non-polygon feature");
                        continue;
                    }
                }
            }
            None => continue,
        };

        boundaries.push(StateBoundary { name, geometry });
    }

    Ok(BoundaryGeometry { boundaries })
}

/// `https://host/USA_names.shp?raw=1` -> `https://host/USA_names.dbf?raw=1`
fn sibling_url(url: &str, extension: &str) -> String {
    let (base, rest) = match url.find(['?', '#']) {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
    format!("{stem}.{extension}{rest}")
}

fn load_shapefile(path: &Path, name_field: &str) -> Result<BoundaryGeometry, LoadError> {
    let reader = shapefile::Reader::from_path(path)?;
    read_shapefile(reader, name_field)
}

/// Reads a shapefile held in memory: the `.shp` geometry and its `.dbf` attributes.
pub fn parse_shapefile_boundaries(
    shp: Vec<u8>,
    dbf: Vec<u8>,
    name_field: &str,
) -> Result<BoundaryGeometry, LoadError> {
    let shape_reader = shapefile::ShapeReader::new(Cursor::new(shp))?;
    let dbase_reader =
        shapefile::dbase::Reader::new(Cursor::new(dbf)).map_err(shapefile::Error::from)?;
    read_shapefile(shapefile::Reader::new(shape_reader, dbase_reader), name_field)
}

fn read_shapefile<T: Read + Seek, D: Read + Seek>(
    mut reader: shapefile::Reader<T, D>,
    name_field: &str,
) -> Result<BoundaryGeometry, LoadError> {
    let mut boundaries = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let name = match record.get(name_field) {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) if !s.trim().is_empty() => {
                s.trim().to_string()
            }
            _ => {
                debug!(name_field, "Skipping shape without a name");
                continue;
            }
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| LoadError::Geometry(format!("{e:?}")))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| LoadError::Geometry(format!("{e:?}")))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| LoadError::Geometry(format!("{e:?}")))?,
            _ => {
                debug!(%name, "Skipping non-polygon shape");
                continue;
            }
        };

        boundaries.push(StateBoundary { name, geometry });
    }

    Ok(BoundaryGeometry { boundaries })
}
