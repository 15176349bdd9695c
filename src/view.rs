use std::cmp::Ordering;

use rayon::prelude::*;

use crate::store::{CellValue, ColumnConfig, Row, SortDirection, TableState};

/// The filtered, sorted, paginated subset of the state that the UI
/// actually renders.
#[derive(Debug, Clone)]
pub struct DerivedView {
    pub visible_columns: Vec<ColumnConfig>,
    pub page_rows: Vec<Row>,
    /// Size of the filtered set before pagination, drives the page count.
    pub total_matches: usize,
}

impl DerivedView {
    pub fn page_count(&self, rows_per_page: usize) -> usize {
        self.total_matches.div_ceil(rows_per_page).max(1)
    }
}

/// Pure derivation: filter, then stable sort, then slice one page.
/// Safe to recompute on every state change.
pub fn derive_view(state: &TableState) -> DerivedView {
    // A column is only shown if it is flagged visible AND at least one
    // row carries the field. Guards against inconsistent imports.
    let visible_columns: Vec<ColumnConfig> = state
        .columns
        .iter()
        .filter(|col| col.visible && state.rows.iter().any(|row| row.fields.contains_key(&col.id)))
        .cloned()
        .collect();

    let mut filtered: Vec<Row> = if state.search_query.is_empty() {
        state.rows.clone()
    } else {
        let needle = state.search_query.to_lowercase();
        state
            .rows
            .par_iter()
            .filter(|row| {
                visible_columns.iter().any(|col| {
                    row.get(&col.id)
                        .map(|v| v.to_string().to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect()
    };

    if let Some(sort_column) = &state.sort_column {
        // Vec::sort_by is stable, so equal keys keep their relative order.
        filtered.sort_by(|a, b| {
            let ordering = compare_cells(a.get(sort_column), b.get(sort_column));
            match state.sort_direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    let total_matches = filtered.len();

    let begin = state.current_page * state.rows_per_page;
    let end = std::cmp::min(begin + state.rows_per_page, total_matches);
    let page_rows = if begin < total_matches {
        filtered[begin..end].to_vec()
    } else {
        Vec::new()
    };

    DerivedView {
        visible_columns,
        page_rows,
        total_matches,
    }
}

// Numeric comparison only when both sides are ints; everything else
// compares case-insensitively on the stringified values. Digits stored
// as text deliberately sort lexicographically.
fn compare_cells(a: Option<&CellValue>, b: Option<&CellValue>) -> Ordering {
    match (a, b) {
        (Some(CellValue::Int(x)), Some(CellValue::Int(y))) => x.cmp(y),
        _ => {
            let x = a.map(|v| v.to_string().to_lowercase()).unwrap_or_default();
            let y = b.map(|v| v.to_string().to_lowercase()).unwrap_or_default();
            x.cmp(&y)
        }
    }
}
