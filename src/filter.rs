use crate::error::SelectionError;
use crate::types::{
    DerivedView, PopulationTable, RankEntry, Selection, SingleValue, TrendPoint, RANKING_SIZE,
    YEARS,
};

/// Resolves raw selector input against the table, applying the selector
/// defaults: the first year in range and the first state in table order.
pub fn resolve_selection(
    table: &PopulationTable,
    year: Option<u16>,
    state: Option<&str>,
) -> Result<Selection, SelectionError> {
    let year = year.unwrap_or(*YEARS.start());
    if !YEARS.contains(&year) {
        return Err(SelectionError::YearOutOfRange {
            year,
            first: *YEARS.start(),
            last: *YEARS.end(),
        });
    }

    let state = match state {
        Some(name) => table
            .get(name)
            .ok_or_else(|| SelectionError::NotFound(name.to_string()))?,
        None => table.rows.first().ok_or(SelectionError::EmptyTable)?,
    };

    Ok(Selection {
        year,
        state: state.state_name.clone(),
    })
}

pub fn filter_by_state_and_year(
    table: &PopulationTable,
    state: &str,
    year: u16,
) -> Result<SingleValue, SelectionError> {
    let row = table
        .get(state)
        .ok_or_else(|| SelectionError::NotFound(state.to_string()))?;

    Ok(row
        .population(year)
        .map_or(SingleValue::Empty, SingleValue::Available))
}

/// Long-format (year, population) series for one state, ascending by year.
/// Years without data are left out.
pub fn reshape_to_trend(
    table: &PopulationTable,
    state: &str,
) -> Result<Vec<TrendPoint>, SelectionError> {
    let row = table
        .get(state)
        .ok_or_else(|| SelectionError::NotFound(state.to_string()))?;

    Ok(row
        .population_by_year
        .range(YEARS)
        .map(|(&year, &population)| TrendPoint { year, population })
        .collect())
}

/// Top `n` states by population for `year`, descending. Ties keep table
/// order; states without a value for `year` are skipped.
pub fn rank_top_n(table: &PopulationTable, year: u16, n: usize) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = table
        .rows
        .iter()
        .filter_map(|row| {
            row.population(year).map(|population| RankEntry {
                state_name: row.state_name.clone(),
                population,
            })
        })
        .collect();

    // sort_by is stable
    entries.sort_by(|a, b| b.population.cmp(&a.population));
    entries.truncate(n);
    entries
}

pub fn derive_view(
    table: &PopulationTable,
    selection: &Selection,
) -> Result<DerivedView, SelectionError> {
    Ok(DerivedView {
        single_value: filter_by_state_and_year(table, &selection.state, selection.year)?,
        trend_series: reshape_to_trend(table, &selection.state)?,
        ranking: rank_top_n(table, selection.year, RANKING_SIZE),
        selection: selection.clone(),
    })
}
