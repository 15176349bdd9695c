use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A single cell value. Untagged so snapshots read naturally as JSON
/// (`28` vs `"Developer"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}

/// One record. Identity is `id`, everything else is an open mapping
/// keyed by column id since the column set is user-extensible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    #[serde(flatten)]
    pub fields: HashMap<String, CellValue>,
}

impl Row {
    pub fn new(id: impl Into<String>, fields: HashMap<String, CellValue>) -> Self {
        Row {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, column_id: &str) -> Option<&CellValue> {
        self.fields.get(column_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub sortable: bool,
    pub editable: bool,
}

impl ColumnConfig {
    fn new(id: &str, label: &str) -> Self {
        ColumnConfig {
            id: id.to_string(),
            label: label.to_string(),
            visible: true,
            sortable: true,
            editable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// At most one cell is in edit mode at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellCursor {
    pub row_id: String,
    pub column_id: String,
}

/// The whole mutable application state: rows, column configs and the
/// search/sort/page/edit cursors. Serialized wholesale for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableState {
    pub rows: Vec<Row>,
    pub columns: Vec<ColumnConfig>,
    pub search_query: String,
    pub sort_column: Option<String>,
    pub sort_direction: SortDirection,
    pub current_page: usize,
    pub rows_per_page: usize,
    pub editing_cell: Option<CellCursor>,
}

pub const ROWS_PER_PAGE_CHOICES: [usize; 3] = [5, 10, 25];

impl TableState {
    pub fn column(&self, column_id: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn has_column(&self, column_id: &str) -> bool {
        self.column(column_id).is_some()
    }

    /// Seed state used when no persisted snapshot exists.
    pub fn seed() -> Self {
        let columns = vec![
            ColumnConfig::new("name", "Name"),
            ColumnConfig::new("email", "Email"),
            ColumnConfig::new("age", "Age"),
            ColumnConfig::new("role", "Role"),
        ];

        let users: [(&str, &str, i64, &str); 15] = [
            ("John Doe", "john@example.com", 28, "Developer"),
            ("Jane Smith", "jane@example.com", 32, "Designer"),
            ("Bob Johnson", "bob@example.com", 45, "Manager"),
            ("Alice Brown", "alice@example.com", 29, "Developer"),
            ("Charlie Davis", "charlie@example.com", 35, "Analyst"),
            ("Diana Wilson", "diana@example.com", 27, "Designer"),
            ("Edward Taylor", "edward@example.com", 41, "Manager"),
            ("Fiona Garcia", "fiona@example.com", 33, "Developer"),
            ("George Martinez", "george@example.com", 39, "Analyst"),
            ("Helen Rodriguez", "helen@example.com", 31, "Designer"),
            ("Ivan Hernandez", "ivan@example.com", 26, "Developer"),
            ("Julia Lopez", "julia@example.com", 37, "Manager"),
            ("Kevin Gonzalez", "kevin@example.com", 30, "Analyst"),
            ("Linda Perez", "linda@example.com", 34, "Designer"),
            ("Michael Lee", "michael@example.com", 42, "Developer"),
        ];

        let rows = users
            .iter()
            .enumerate()
            .map(|(i, (name, email, age, role))| {
                let fields = HashMap::from([
                    ("name".to_string(), CellValue::from(*name)),
                    ("email".to_string(), CellValue::from(*email)),
                    ("age".to_string(), CellValue::Int(*age)),
                    ("role".to_string(), CellValue::from(*role)),
                ]);
                Row::new((i + 1).to_string(), fields)
            })
            .collect();

        TableState {
            rows,
            columns,
            search_query: String::new(),
            sort_column: None,
            sort_direction: SortDirection::Asc,
            current_page: 0,
            rows_per_page: 10,
            editing_cell: None,
        }
    }
}

/// Every mutation of the table state. Applied by [`reduce`], dispatched
/// through a [`Store`].
#[derive(Debug, Clone)]
pub enum Action {
    SetSearchQuery(String),
    SetSorting {
        column_id: String,
        direction: SortDirection,
    },
    SetCurrentPage(usize),
    SetRowsPerPage(usize),
    UpdateColumnVisibility {
        column_id: String,
        visible: bool,
    },
    AddColumn {
        id: String,
        label: String,
    },
    UpdateCell {
        row_id: String,
        column_id: String,
        value: CellValue,
    },
    SetEditingCell(Option<CellCursor>),
    DeleteRow(String),
    ImportData(Vec<Row>),
    AddRow(HashMap<String, CellValue>),
}

/// Applies a single action. Never panics for well-formed input; unknown
/// row/column references degrade to no-ops.
pub fn reduce(state: &mut TableState, action: Action) {
    match action {
        Action::SetSearchQuery(query) => {
            state.search_query = query;
            // Any filter change invalidates the page position.
            state.current_page = 0;
        }
        Action::SetSorting {
            column_id,
            direction,
        } => {
            // Set unconditionally; checking `sortable` is the caller's job.
            state.sort_column = Some(column_id);
            state.sort_direction = direction;
        }
        Action::SetCurrentPage(page) => {
            // No clamping; an out-of-range page derives to an empty slice.
            state.current_page = page;
        }
        Action::SetRowsPerPage(n) => {
            state.rows_per_page = n;
            state.current_page = 0;
        }
        Action::UpdateColumnVisibility { column_id, visible } => {
            if let Some(column) = state.columns.iter_mut().find(|c| c.id == column_id) {
                column.visible = visible;
            }
        }
        Action::AddColumn { id, label } => {
            if state.has_column(&id) {
                debug!("Ignoring duplicate column id {id:?}");
                return;
            }
            state.columns.push(ColumnConfig::new(&id, &label));
            // Backfill so every row carries a value for the new column.
            for row in state.rows.iter_mut() {
                row.fields.insert(id.clone(), CellValue::Text(String::new()));
            }
        }
        Action::UpdateCell {
            row_id,
            column_id,
            value,
        } => {
            if let Some(row) = state.rows.iter_mut().find(|r| r.id == row_id) {
                row.fields.insert(column_id, value);
            }
        }
        Action::SetEditingCell(cursor) => {
            state.editing_cell = cursor;
        }
        Action::DeleteRow(row_id) => {
            state.rows.retain(|r| r.id != row_id);
        }
        Action::ImportData(rows) => {
            // Wholesale replacement; the column set is untouched.
            state.rows = rows;
        }
        Action::AddRow(fields) => {
            let id = fresh_row_id(&state.rows);
            state.rows.push(Row::new(id, fields));
        }
    }
}

// Millisecond timestamp, suffixed when several rows land in the same
// millisecond.
fn fresh_row_id(rows: &[Row]) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut id = millis.to_string();
    let mut n = 0;
    while rows.iter().any(|r| r.id == id) {
        n += 1;
        id = format!("{millis}-{n}");
    }
    id
}

type Observer = Box<dyn FnMut(&TableState)>;

/// State container owned by the application root. All mutations go
/// through [`Store::dispatch`]; observers are notified synchronously
/// after each one.
pub struct Store {
    state: TableState,
    observers: Vec<Observer>,
}

impl Store {
    pub fn new(state: TableState) -> Self {
        Store {
            state,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&TableState) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn dispatch(&mut self, action: Action) {
        trace!("Dispatching {action:?}");
        reduce(&mut self.state, action);
        for observer in self.observers.iter_mut() {
            observer(&self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(state: &mut TableState, action: Action) {
        reduce(state, action);
    }

    #[test]
    fn search_query_resets_page() {
        let mut state = TableState::seed();
        state.current_page = 3;
        dispatch(&mut state, Action::SetSearchQuery("dev".to_string()));
        assert_eq!(state.search_query, "dev");
        assert_eq!(state.current_page, 0);
    }

    #[test]
    fn add_column_backfills_empty_string() {
        let mut state = TableState::seed();
        let nrows = state.rows.len();
        dispatch(
            &mut state,
            Action::AddColumn {
                id: "department".to_string(),
                label: "Department".to_string(),
            },
        );
        assert_eq!(state.rows.len(), nrows);
        assert!(state.has_column("department"));
        for row in &state.rows {
            assert_eq!(
                row.get("department"),
                Some(&CellValue::Text(String::new()))
            );
        }
        let added = state.column("department").unwrap();
        assert!(added.visible && added.sortable && added.editable);
    }

    #[test]
    fn add_column_with_duplicate_id_is_a_noop() {
        let mut state = TableState::seed();
        let before = state.clone();
        dispatch(
            &mut state,
            Action::AddColumn {
                id: "name".to_string(),
                label: "Name again".to_string(),
            },
        );
        assert_eq!(state, before);
    }

    #[test]
    fn update_cell_on_unknown_row_is_a_noop() {
        let mut state = TableState::seed();
        let before = state.clone();
        dispatch(
            &mut state,
            Action::UpdateCell {
                row_id: "no-such-row".to_string(),
                column_id: "name".to_string(),
                value: CellValue::from("Nobody"),
            },
        );
        assert_eq!(state, before);
    }

    #[test]
    fn update_cell_sets_value() {
        let mut state = TableState::seed();
        dispatch(
            &mut state,
            Action::UpdateCell {
                row_id: "1".to_string(),
                column_id: "age".to_string(),
                value: CellValue::Int(99),
            },
        );
        assert_eq!(state.rows[0].get("age"), Some(&CellValue::Int(99)));
    }

    #[test]
    fn delete_row_with_unknown_id_leaves_rows_unchanged() {
        let mut state = TableState::seed();
        let before = state.rows.clone();
        dispatch(&mut state, Action::DeleteRow("does-not-exist".to_string()));
        assert_eq!(state.rows, before);
    }

    #[test]
    fn delete_row_removes_matching_row() {
        let mut state = TableState::seed();
        dispatch(&mut state, Action::DeleteRow("3".to_string()));
        assert_eq!(state.rows.len(), 14);
        assert!(!state.rows.iter().any(|r| r.id == "3"));
    }

    #[test]
    fn import_replaces_rows_but_not_columns() {
        let mut state = TableState::seed();
        let columns = state.columns.clone();
        let imported = vec![Row::new(
            "imported-0-0",
            HashMap::from([("name".to_string(), CellValue::from("Zoe"))]),
        )];
        dispatch(&mut state, Action::ImportData(imported.clone()));
        assert_eq!(state.rows, imported);
        assert_eq!(state.columns, columns);
    }

    #[test]
    fn add_row_generates_unique_ids() {
        let mut state = TableState::seed();
        dispatch(&mut state, Action::AddRow(HashMap::new()));
        dispatch(&mut state, Action::AddRow(HashMap::new()));
        dispatch(&mut state, Action::AddRow(HashMap::new()));
        let mut ids: Vec<&str> = state.rows.iter().map(|r| r.id.as_str()).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn rows_per_page_change_resets_page() {
        let mut state = TableState::seed();
        state.current_page = 2;
        dispatch(&mut state, Action::SetRowsPerPage(25));
        assert_eq!(state.rows_per_page, 25);
        assert_eq!(state.current_page, 0);
    }

    #[test]
    fn editing_cell_holds_at_most_one_cursor() {
        let mut state = TableState::seed();
        dispatch(
            &mut state,
            Action::SetEditingCell(Some(CellCursor {
                row_id: "1".to_string(),
                column_id: "name".to_string(),
            })),
        );
        dispatch(
            &mut state,
            Action::SetEditingCell(Some(CellCursor {
                row_id: "2".to_string(),
                column_id: "age".to_string(),
            })),
        );
        assert_eq!(
            state.editing_cell,
            Some(CellCursor {
                row_id: "2".to_string(),
                column_id: "age".to_string(),
            })
        );
        dispatch(&mut state, Action::SetEditingCell(None));
        assert_eq!(state.editing_cell, None);
    }

    #[test]
    fn observers_are_notified_synchronously() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut store = Store::new(TableState::seed());
        store.subscribe(move |state: &TableState| {
            sink.borrow_mut().push(state.search_query.clone());
        });

        store.dispatch(Action::SetSearchQuery("a".to_string()));
        store.dispatch(Action::SetSearchQuery("ab".to_string()));
        assert_eq!(*seen.borrow(), vec!["a".to_string(), "ab".to_string()]);
    }
}
