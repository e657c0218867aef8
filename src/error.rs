use thiserror::Error;

/// Failure to load either input source. Fatal for the session.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch {location}: {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed population table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Population table has no '{0}' column")]
    MissingColumn(String),

    #[error("Invalid population '{value}' for {state} in {year}")]
    InvalidPopulation {
        state: String,
        year: u16,
        value: String,
    },

    #[error("State '{0}' appears more than once in the population table")]
    DuplicateState(String),

    #[error("State code '{0}' appears more than once in the population table")]
    DuplicateCode(String),

    #[error("Malformed GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("GeoJSON must be a FeatureCollection")]
    NotFeatureCollection,

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("Failed to convert geometry: {0}")]
    Geometry(String),

    #[error("Unsupported geometry source '{0}'")]
    UnsupportedFormat(String),
}

/// A selection that does not resolve against the loaded table.
///
/// Selector options are derived from the table itself, so either variant
/// signals an inconsistency between the page and the data rather than a
/// user mistake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("State '{0}' not found in population table")]
    NotFound(String),

    #[error("Year {year} is outside {first}..={last}")]
    YearOutOfRange { year: u16, first: u16, last: u16 },

    #[error("Population table is empty")]
    EmptyTable,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to draw chart: {0}")]
    Chart(String),
}
