use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Instant;

use arboard::Clipboard;
use tracing::{debug, info, trace, warn};

use crate::csv_io::{self, ImportOutcome};
use crate::domain::{CmdMode, EditorConfig, Message, TedError};
use crate::inputter::{InputState, LineInput};
use crate::persist;
use crate::store::{
    Action, CellCursor, CellValue, ColumnConfig, ROWS_PER_PAGE_CHOICES, SortDirection, Store,
    TableState,
};
use crate::view::{DerivedView, derive_view};

#[derive(Debug, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    COLUMNS,
    CMDINPUT,
    POPUP,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Popup {
    Help,
    Alert(String),
    ConfirmDelete { row_id: String },
}

/// Everything the UI needs for one frame. Rebuilt after every state
/// change; the rendering layer holds no table state of its own.
pub struct UIData {
    pub view: DerivedView,
    pub sort: Option<(String, SortDirection)>,
    pub selected: (usize, usize),
    pub current_page: usize,
    pub page_count: usize,
    pub total_matches: usize,
    pub rows_per_page: usize,
    pub search_query: String,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub popup: Option<Popup>,
    pub input: Option<(String, InputState)>,
    pub columns_panel: Option<(Vec<ColumnConfig>, usize)>,
    pub loading: bool,
    pub max_column_width: usize,
}

pub struct Model {
    config: EditorConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: Store,
    state_path: PathBuf,
    pending_import: Option<Receiver<ImportOutcome>>,
    cursor_row: usize,
    cursor_col: usize,
    column_cursor: usize,
    input: LineInput,
    cmd_mode: Option<CmdMode>,
    last_input: InputState,
    popup: Option<Popup>,
    clipboard: Option<Clipboard>,
    status_message: String,
    last_status_message_update: Instant,
    uidata: Option<UIData>,
}

impl Model {
    pub fn init(config: &EditorConfig, state_path: PathBuf) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Clipboard unavailable: {e}");
                None
            }
        };
        Model {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store: Store::new(TableState::seed()),
            state_path,
            pending_import: None,
            cursor_row: 0,
            cursor_col: 0,
            column_cursor: 0,
            input: LineInput::default(),
            cmd_mode: None,
            last_input: InputState::default(),
            popup: None,
            clipboard,
            status_message: "Restoring session ...".to_string(),
            last_status_message_update: Instant::now(),
            uidata: None,
        }
    }

    /// Rehydrates the persisted snapshot (unless `fresh`), falls back to
    /// the seed state, and hooks up the snapshot-on-every-change observer.
    pub fn restore(&mut self, fresh: bool) {
        let state = if fresh {
            None
        } else {
            persist::load(&self.state_path)
        };
        let restored = state.is_some();
        self.store = Store::new(state.unwrap_or_else(TableState::seed));

        let snapshot_path = self.state_path.clone();
        self.store.subscribe(move |state: &TableState| {
            if let Err(e) = persist::save(state, &snapshot_path) {
                warn!("Failed to persist snapshot to {snapshot_path:?}: {e}");
            }
        });

        self.status = Status::READY;
        self.set_status_message(if restored {
            "Restored previous session"
        } else {
            "Started with seed data"
        });
        info!("Session ready (restored: {restored})");
        self.refresh();
    }

    pub fn state(&self) -> &TableState {
        self.store.state()
    }

    pub fn uidata(&mut self) -> &UIData {
        if self.uidata.is_none() {
            self.refresh();
        }
        self.uidata.as_ref().expect("refreshed above")
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// True while a line input consumes raw key events.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn popup_active(&self) -> bool {
        self.modus == Modus::POPUP
    }

    /// Polls the import worker. Success is committed through a single
    /// `ImportData` dispatch; failure surfaces as a blocking alert and
    /// leaves the state untouched.
    pub fn tick(&mut self) {
        let Some(rx) = &self.pending_import else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(rows)) => {
                self.pending_import = None;
                let count = rows.len();
                self.store.dispatch(Action::ImportData(rows));
                self.cursor_row = 0;
                self.set_status_message(format!("Imported {count} rows"));
                self.refresh();
            }
            Ok(Err(e)) => {
                self.pending_import = None;
                self.show_popup(Popup::Alert(format!("Import failed: {e}")));
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_import = None;
                self.show_popup(Popup::Alert("Import worker died unexpectedly".to_string()));
            }
        }
    }

    pub fn start_import(&mut self, raw_path: &str) {
        let path = match shellexpand::full(raw_path) {
            Ok(p) => PathBuf::from(p.into_owned()),
            Err(e) => {
                self.show_popup(Popup::Alert(format!("Bad import path: {e}")));
                return;
            }
        };
        self.pending_import = Some(csv_io::spawn_import(path));
        self.set_status_message("Importing ...");
        self.refresh();
    }

    pub fn update(&mut self, message: Message) -> Result<(), TedError> {
        trace!("Update: Modus {:?}, Message {message:?}", self.modus);
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_cursor(-1, 0),
                Message::MoveDown => self.move_cursor(1, 0),
                Message::MoveLeft => self.move_cursor(0, -1),
                Message::MoveRight => self.move_cursor(0, 1),
                Message::NextPage => self.next_page(),
                Message::PrevPage => self.prev_page(),
                Message::CycleRowsPerPage => self.cycle_rows_per_page(),
                Message::Search => {
                    let query = self.store.state().search_query.clone();
                    self.enter_input(CmdMode::Search, &query);
                }
                Message::SortAscending => self.sort_cursor_column(SortDirection::Asc),
                Message::SortDescending => self.sort_cursor_column(SortDirection::Desc),
                Message::Enter => self.begin_cell_edit(),
                Message::DeleteRow => self.ask_delete_confirmation(),
                Message::AddRow => self.add_empty_row(),
                Message::ManageColumns => {
                    self.column_cursor = 0;
                    self.modus = Modus::COLUMNS;
                    self.refresh();
                }
                Message::ImportCsv => self.enter_input(CmdMode::ImportPath, ""),
                Message::ExportCsv => self.export(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.show_popup(Popup::Help),
                Message::Exit => self.clear_search(),
                _ => (),
            },
            Modus::COLUMNS => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_column_cursor(-1),
                Message::MoveDown => self.move_column_cursor(1),
                Message::ToggleVisibility => self.toggle_column_visibility(),
                Message::NewColumn => self.enter_input(CmdMode::NewColumn, ""),
                Message::Help => self.show_popup(Popup::Help),
                Message::Exit | Message::ManageColumns => {
                    self.modus = Modus::TABLE;
                    self.refresh();
                }
                _ => (),
            },
            Modus::POPUP => match message {
                Message::Confirm => self.confirm_popup(),
                _ => self.close_popup(),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = message {
                    self.last_input = self.input.read(key);
                    if self.last_input.finished {
                        self.finish_input();
                    }
                    self.refresh();
                }
            }
        }
        Ok(())
    }

    // -------------------- table mode handlers -------------------- //

    fn move_cursor(&mut self, drow: isize, dcol: isize) {
        let view = derive_view(self.store.state());
        let nrows = view.page_rows.len();
        let ncols = view.visible_columns.len();
        if drow != 0 && nrows > 0 {
            let row = self.cursor_row as isize + drow;
            self.cursor_row = row.clamp(0, nrows as isize - 1) as usize;
        }
        if dcol != 0 && ncols > 0 {
            let col = self.cursor_col as isize + dcol;
            self.cursor_col = col.clamp(0, ncols as isize - 1) as usize;
        }
        self.refresh();
    }

    fn next_page(&mut self) {
        let state = self.store.state();
        let total = derive_view(state).total_matches;
        let next_begin = (state.current_page + 1) * state.rows_per_page;
        if next_begin < total {
            let page = state.current_page + 1;
            self.store.dispatch(Action::SetCurrentPage(page));
            self.cursor_row = 0;
            self.refresh();
        }
    }

    fn prev_page(&mut self) {
        let page = self.store.state().current_page;
        if page > 0 {
            self.store.dispatch(Action::SetCurrentPage(page - 1));
            self.cursor_row = 0;
            self.refresh();
        }
    }

    fn cycle_rows_per_page(&mut self) {
        let current = self.store.state().rows_per_page;
        let idx = ROWS_PER_PAGE_CHOICES
            .iter()
            .position(|&n| n == current)
            .unwrap_or(0);
        let next = ROWS_PER_PAGE_CHOICES[(idx + 1) % ROWS_PER_PAGE_CHOICES.len()];
        self.store.dispatch(Action::SetRowsPerPage(next));
        self.set_status_message(format!("{next} rows per page"));
        self.refresh();
    }

    fn sort_cursor_column(&mut self, direction: SortDirection) {
        let view = derive_view(self.store.state());
        let Some(column) = view.visible_columns.get(self.cursor_col) else {
            return;
        };
        // Non-sortable columns are filtered here, not in the store.
        if !column.sortable {
            self.set_status_message(format!("Column '{}' is not sortable", column.label));
            self.refresh();
            return;
        }
        self.store.dispatch(Action::SetSorting {
            column_id: column.id.clone(),
            direction,
        });
        self.refresh();
    }

    fn begin_cell_edit(&mut self) {
        let view = derive_view(self.store.state());
        let (Some(row), Some(column)) = (
            view.page_rows.get(self.cursor_row),
            view.visible_columns.get(self.cursor_col),
        ) else {
            return;
        };
        if !column.editable {
            self.set_status_message(format!("Column '{}' is not editable", column.label));
            self.refresh();
            return;
        }
        let prefill = row.get(&column.id).map(|v| v.to_string()).unwrap_or_default();
        let cursor = CellCursor {
            row_id: row.id.clone(),
            column_id: column.id.clone(),
        };
        self.store.dispatch(Action::SetEditingCell(Some(cursor.clone())));
        self.enter_input(
            CmdMode::EditCell {
                row_id: cursor.row_id,
                column_id: cursor.column_id,
            },
            &prefill,
        );
    }

    fn ask_delete_confirmation(&mut self) {
        let view = derive_view(self.store.state());
        if let Some(row) = view.page_rows.get(self.cursor_row) {
            self.show_popup(Popup::ConfirmDelete {
                row_id: row.id.clone(),
            });
        }
    }

    fn add_empty_row(&mut self) {
        let fields: HashMap<String, CellValue> = self
            .store
            .state()
            .columns
            .iter()
            .map(|c| (c.id.clone(), CellValue::Text(String::new())))
            .collect();
        self.store.dispatch(Action::AddRow(fields));
        self.set_status_message("Added empty row");
        self.refresh();
    }

    fn clear_search(&mut self) {
        if !self.store.state().search_query.is_empty() {
            self.store.dispatch(Action::SetSearchQuery(String::new()));
            self.cursor_row = 0;
            self.set_status_message("Search cleared");
            self.refresh();
        }
    }

    fn export(&mut self) {
        let (count, result) = {
            let state = self.store.state();
            let path = Path::new(&self.config.export_file);
            (
                state.rows.len(),
                csv_io::export_file(&state.rows, &state.columns, path),
            )
        };
        match result {
            Ok(()) => self.set_status_message(format!(
                "Exported {count} rows to {}",
                self.config.export_file
            )),
            Err(e) => self.set_status_message(format!("Export failed: {e}")),
        }
        self.refresh();
    }

    fn copy_cell(&mut self) {
        let view = derive_view(self.store.state());
        let (Some(row), Some(column)) = (
            view.page_rows.get(self.cursor_row),
            view.visible_columns.get(self.cursor_col),
        ) else {
            return;
        };
        let content = row.get(&column.id).map(|v| v.to_string()).unwrap_or_default();
        self.copy_to_clipboard(content);
    }

    fn copy_row(&mut self) {
        let view = derive_view(self.store.state());
        let Some(row) = view.page_rows.get(self.cursor_row) else {
            return;
        };
        let content = view
            .visible_columns
            .iter()
            .map(|c| row.get(&c.id).map(|v| v.to_string()).unwrap_or_default())
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content);
    }

    fn copy_to_clipboard(&mut self, content: String) {
        match &mut self.clipboard {
            Some(clipboard) => match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied to clipboard"),
                Err(e) => {
                    debug!("Error copying to clipboard: {e:?}");
                    self.set_status_message("Copy failed");
                }
            },
            None => self.set_status_message("Clipboard unavailable"),
        }
        self.refresh();
    }

    // -------------------- column manager handlers -------------------- //

    fn move_column_cursor(&mut self, delta: isize) {
        let ncols = self.store.state().columns.len();
        if ncols > 0 {
            let pos = self.column_cursor as isize + delta;
            self.column_cursor = pos.clamp(0, ncols as isize - 1) as usize;
        }
        self.refresh();
    }

    fn toggle_column_visibility(&mut self) {
        let Some(column) = self.store.state().columns.get(self.column_cursor) else {
            return;
        };
        let action = Action::UpdateColumnVisibility {
            column_id: column.id.clone(),
            visible: !column.visible,
        };
        self.store.dispatch(action);
        self.refresh();
    }

    // -------------------- popup handlers -------------------- //

    fn show_popup(&mut self, popup: Popup) {
        // A popup can replace an open one (an import may fail while the
        // help is shown); previous_modus always names a non-popup mode.
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(popup);
        self.refresh();
    }

    fn confirm_popup(&mut self) {
        if let Some(Popup::ConfirmDelete { row_id }) = self.popup.take() {
            self.store.dispatch(Action::DeleteRow(row_id));
            self.set_status_message("Row deleted");
        }
        self.modus = self.previous_modus;
        self.refresh();
    }

    fn close_popup(&mut self) {
        self.popup = None;
        self.modus = self.previous_modus;
        self.refresh();
    }

    // -------------------- line input handling -------------------- //

    fn enter_input(&mut self, mode: CmdMode, prefill: &str) {
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.start(prefill);
        self.last_input = self.input.state();
        self.refresh();
    }

    fn finish_input(&mut self) {
        self.modus = self.previous_modus;
        let finished = self.last_input.clone();
        let Some(mode) = self.cmd_mode.take() else {
            return;
        };

        if finished.canceled {
            if matches!(mode, CmdMode::EditCell { .. }) {
                self.store.dispatch(Action::SetEditingCell(None));
            }
            return;
        }

        match mode {
            CmdMode::Search => {
                self.store.dispatch(Action::SetSearchQuery(finished.text));
                self.cursor_row = 0;
                let matches = derive_view(self.store.state()).total_matches;
                self.set_status_message(format!("{matches} matching rows"));
            }
            CmdMode::EditCell { row_id, column_id } => {
                let value = coerce_value(&column_id, &finished.text);
                self.store.dispatch(Action::UpdateCell {
                    row_id,
                    column_id,
                    value,
                });
                self.store.dispatch(Action::SetEditingCell(None));
            }
            CmdMode::NewColumn => self.add_column(&finished.text),
            CmdMode::ImportPath => {
                let path = finished.text.trim().to_string();
                if !path.is_empty() {
                    self.start_import(&path);
                }
            }
        }
    }

    fn add_column(&mut self, label: &str) {
        let label = label.trim();
        if label.is_empty() {
            return;
        }
        let id = column_id_from_label(label);
        if self.store.state().has_column(&id) {
            // Duplicate ids are rejected with a notice; the reducer
            // ignores them as well.
            self.set_status_message(format!("Column '{id}' already exists"));
            return;
        }
        self.store.dispatch(Action::AddColumn {
            id: id.clone(),
            label: label.to_string(),
        });
        self.set_status_message(format!("Added column '{label}'"));
    }

    // -------------------- ui data -------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn refresh(&mut self) {
        let state = self.store.state();
        let view = derive_view(state);

        let nrows = view.page_rows.len();
        let ncols = view.visible_columns.len();
        self.cursor_row = self.cursor_row.min(nrows.saturating_sub(1));
        self.cursor_col = self.cursor_col.min(ncols.saturating_sub(1));
        self.column_cursor = self.column_cursor.min(state.columns.len().saturating_sub(1));

        let input = if self.modus == Modus::CMDINPUT {
            let prompt = match &self.cmd_mode {
                Some(CmdMode::Search) => "/",
                Some(CmdMode::EditCell { .. }) => "edit: ",
                Some(CmdMode::NewColumn) => "column: ",
                Some(CmdMode::ImportPath) => "import: ",
                None => "",
            };
            Some((prompt.to_string(), self.last_input.clone()))
        } else {
            None
        };

        let columns_panel = if self.modus == Modus::COLUMNS {
            Some((state.columns.clone(), self.column_cursor))
        } else {
            None
        };

        let page_count = view.page_count(state.rows_per_page);
        self.uidata = Some(UIData {
            sort: state
                .sort_column
                .clone()
                .map(|c| (c, state.sort_direction)),
            selected: (self.cursor_row, self.cursor_col),
            current_page: state.current_page,
            page_count,
            total_matches: view.total_matches,
            rows_per_page: state.rows_per_page,
            search_query: state.search_query.clone(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            popup: self.popup.clone(),
            input,
            columns_panel,
            loading: self.status == Status::LOADING,
            max_column_width: self.config.max_column_width,
            view,
        });
    }
}

/// Caller-side type coercion applied before dispatch: the age column is
/// numeric and keeps the leading integer of the input, defaulting to 0;
/// everything else stays text.
pub fn coerce_value(column_id: &str, text: &str) -> CellValue {
    if column_id == "age" {
        CellValue::Int(csv_io::leading_int(text))
    } else {
        CellValue::Text(text.to_string())
    }
}

/// `"Annual Salary"` becomes the column id `annual_salary`.
pub fn column_id_from_label(label: &str) -> String {
    label
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("_")
}
