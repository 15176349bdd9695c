use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{EditorConfig, Message, TedError};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &EditorConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TedError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.handle_key(model, key));
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: event::KeyEvent) -> Option<Message> {
        // An active line input consumes keys verbatim.
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        // Popups only distinguish confirm from dismiss.
        if model.popup_active() {
            let message = match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Message::Confirm,
                _ => Message::Exit,
            };
            return Some(message);
        }

        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::Char(']') => Some(Message::NextPage),
            KeyCode::Char('[') => Some(Message::PrevPage),
            KeyCode::Char('r') => Some(Message::CycleRowsPerPage),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Char('d') => Some(Message::DeleteRow),
            KeyCode::Char('o') => Some(Message::AddRow),
            KeyCode::Char('c') => Some(Message::ManageColumns),
            KeyCode::Char('n') => Some(Message::NewColumn),
            KeyCode::Char(' ') => Some(Message::ToggleVisibility),
            KeyCode::Char('i') => Some(Message::ImportCsv),
            KeyCode::Char('x') => Some(Message::ExportCsv),
            KeyCode::Char('y') => Some(Message::CopyCell),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
