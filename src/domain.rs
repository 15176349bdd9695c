use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum TedError {
    IoError(Error),
    CsvError(csv::Error),
    SnapshotError(serde_json::Error),
    ImportEmpty,
    FileNotFound,
    PermissionDenied,
}

impl From<Error> for TedError {
    fn from(err: Error) -> Self {
        TedError::IoError(err)
    }
}

impl From<csv::Error> for TedError {
    fn from(err: csv::Error) -> Self {
        TedError::CsvError(err)
    }
}

impl From<serde_json::Error> for TedError {
    fn from(err: serde_json::Error) -> Self {
        TedError::SnapshotError(err)
    }
}

impl fmt::Display for TedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TedError::IoError(e) => write!(f, "IO error: {e}"),
            TedError::CsvError(e) => write!(f, "CSV parsing failed: {e}"),
            TedError::SnapshotError(e) => write!(f, "Snapshot serialization failed: {e}"),
            TedError::ImportEmpty => write!(f, "CSV is empty or invalid"),
            TedError::FileNotFound => write!(f, "File not found"),
            TedError::PermissionDenied => write!(f, "Permission denied"),
        }
    }
}

#[derive(Clone, Debug, Setters)]
pub struct EditorConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub export_file: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            event_poll_time: 100,
            max_column_width: 32,
            export_file: "table-data.csv".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    CycleRowsPerPage,
    Search,
    SortAscending,
    SortDescending,
    Enter,
    Exit,
    DeleteRow,
    AddRow,
    ManageColumns,
    NewColumn,
    ToggleVisibility,
    ImportCsv,
    ExportCsv,
    CopyCell,
    CopyRow,
    Confirm,
    Help,
    RawKey(KeyEvent),
}

// Determines how a finished line input is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum CmdMode {
    Search,
    EditCell { row_id: String, column_id: String },
    NewColumn,
    ImportPath,
}

pub const HELP_TEXT: &str = "\
 ted - tabular data editor

 Navigation
   h/j/k/l, arrows   move the cell cursor
   [ / ]             previous / next page
   r                 cycle rows per page (5/10/25)

 Data
   /                 search across visible columns
   s / S             sort current column ascending / descending
   Enter             edit the current cell (Enter commits, Esc cancels)
   o                 append an empty row
   d                 delete the current row (asks for confirmation)
   y / Y             copy current cell / row to the clipboard

 Columns
   c                 open the column manager
   Space             toggle visibility of the selected column
   n                 add a new column

 Files
   i                 import a CSV file (replaces all rows)
   x                 export visible columns to table-data.csv

 ?                   this help
 q                   quit";
