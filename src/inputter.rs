use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line input editor driving search, cell editing, column names
/// and import paths. Raw key events are fed in while the model is in
/// input mode; `finished` marks commit, `canceled` marks abort.
#[derive(Default)]
pub struct LineInput {
    buffer: String,
    cursor: usize, // In chars, not bytes.
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug)]
pub struct InputState {
    pub text: String,
    pub cursor: usize,
    pub finished: bool,
    pub canceled: bool,
}

impl LineInput {
    pub fn read(&mut self, key: KeyEvent) -> InputState {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.finished = true,
            (KeyCode::Esc, KeyModifiers::NONE) => {
                self.finished = true;
                self.canceled = true;
            }
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Delete, KeyModifiers::NONE) => self.delete(),
            (KeyCode::Left, KeyModifiers::NONE) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, KeyModifiers::NONE) => {
                self.cursor = std::cmp::min(self.cursor + 1, self.char_count());
            }
            (KeyCode::Home, KeyModifiers::NONE) => self.cursor = 0,
            (KeyCode::End, KeyModifiers::NONE) => self.cursor = self.char_count(),
            (code, _) => {
                if let Some(chr) = code.as_char() {
                    let at = self.byte_pos(self.cursor);
                    self.buffer.insert(at, chr);
                    self.cursor += 1;
                }
            }
        }
        self.state()
    }

    /// Starts a fresh input round with the given content (the current
    /// cell value when editing, empty otherwise).
    pub fn start(&mut self, prefill: &str) {
        self.buffer = prefill.to_string();
        self.cursor = self.char_count();
        self.finished = false;
        self.canceled = false;
    }

    pub fn state(&self) -> InputState {
        InputState {
            text: self.buffer.clone(),
            cursor: self.cursor,
            finished: self.finished,
            canceled: self.canceled,
        }
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_pos(self.cursor);
            self.buffer.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let at = self.byte_pos(self.cursor);
            self.buffer.remove(at);
        }
    }

    fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_pos(&self, char_idx: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.buffer.len())
    }
}
