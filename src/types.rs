use geo::MultiPolygon;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

/// Years offered by the year selector and covered by the trend series.
pub const YEARS: RangeInclusive<u16> = 2010..=2019;

pub const RANKING_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationRow {
    pub state_name: String,
    pub state_code: String,
    // Absent year = blank cell in the source
    pub population_by_year: BTreeMap<u16, u64>,
}

impl PopulationRow {
    pub fn population(&self, year: u16) -> Option<u64> {
        self.population_by_year.get(&year).copied()
    }
}

/// Wide-format table, one row per state, in source row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTable {
    pub rows: Vec<PopulationRow>,
}

impl PopulationTable {
    pub fn new(rows: Vec<PopulationRow>) -> Self {
        Self { rows }
    }

    pub fn get(&self, state: &str) -> Option<&PopulationRow> {
        self.rows.iter().find(|row| row.state_name == state)
    }

    /// State selector options, in table order.
    pub fn state_names(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.state_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StateBoundary {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryGeometry {
    pub boundaries: Vec<StateBoundary>,
}

impl BoundaryGeometry {
    /// Display names with no matching row in `table`.
    pub fn unmatched_names<'a>(&'a self, table: &PopulationTable) -> Vec<&'a str> {
        let known: HashSet<&str> = table.rows.iter().map(|r| r.state_name.as_str()).collect();
        self.boundaries
            .iter()
            .map(|b| b.name.as_str())
            .filter(|name| !known.contains(name))
            .collect()
    }

    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        let features = self
            .boundaries
            .iter()
            .map(|boundary| {
                let mut properties = geojson::JsonObject::new();
                properties.insert("name".to_string(), boundary.name.clone().into());
                geojson::Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&boundary.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub year: u16,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "population", rename_all = "snake_case")]
pub enum SingleValue {
    Available(u64),
    /// No data point for a valid state/year; rendered as a notice.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub year: u16,
    pub population: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub state_name: String,
    pub population: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedView {
    pub selection: Selection,
    pub single_value: SingleValue,
    pub trend_series: Vec<TrendPoint>,
    pub ranking: Vec<RankEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn row(name: &str) -> PopulationRow {
        PopulationRow {
            state_name: name.to_string(),
            state_code: name[..2].to_uppercase(),
            population_by_year: BTreeMap::new(),
        }
    }

    fn square(name: &str) -> StateBoundary {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        StateBoundary {
            name: name.to_string(),
            geometry: MultiPolygon::new(vec![poly]),
        }
    }

    #[test]
    fn state_names_keep_table_order() {
        let table = PopulationTable::new(vec![row("Texas"), row("Alabama"), row("Ohio")]);
        assert_eq!(table.state_names(), vec!["Texas", "Alabama", "Ohio"]);
        assert!(table.get("Alabama").is_some());
        assert!(table.get("alabama").is_none());
    }

    #[test]
    fn reports_boundaries_without_table_rows() {
        let table = PopulationTable::new(vec![row("Texas")]);
        let boundaries = BoundaryGeometry {
            boundaries: vec![square("Texas"), square("Puerto Rico")],
        };
        assert_eq!(boundaries.unmatched_names(&table), vec!["Puerto Rico"]);
    }

    #[test]
    fn geojson_export_carries_names() {
        let boundaries = BoundaryGeometry {
            boundaries: vec![square("Utah")],
        };
        let fc = boundaries.to_geojson();
        assert_eq!(fc.features.len(), 1);
        let feature = &fc.features[0];
        assert_eq!(feature.property("name").and_then(|v| v.as_str()), Some("Utah"));
        assert!(matches!(
            feature.geometry.as_ref().map(|g| &g.value),
            Some(geojson::Value::MultiPolygon(_))
        ));
    }

    #[test]
    fn single_value_serializes_with_status() {
        let json = serde_json::to_value(SingleValue::Available(5)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "available", "population": 5}));
        let json = serde_json::to_value(SingleValue::Empty).unwrap();
        assert_eq!(json, serde_json::json!({"status": "empty"}));
    }
}
