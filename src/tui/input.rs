//! Single-line text field shared by the question, refinement and file prompts.
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    text: String,
    /// Byte offset into `text`, always on a char boundary.
    cursor: usize,
}

impl TextField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the contents and move the cursor to the end.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    /// Apply an editing key. Returns true if the text changed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let before = self.text.len();
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
                self.text.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                return true;
            }
            (KeyModifiers::NONE, KeyCode::Backspace) => self.backspace(),
            (KeyModifiers::NONE, KeyCode::Delete) => self.delete_forward(),
            (KeyModifiers::CONTROL, KeyCode::Backspace) | (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
                self.delete_word()
            }
            (KeyModifiers::NONE, KeyCode::Left) => {
                self.cursor = prev_char_boundary(&self.text, self.cursor);
            }
            (KeyModifiers::NONE, KeyCode::Right) => {
                self.cursor = next_char_boundary(&self.text, self.cursor);
            }
            (KeyModifiers::CONTROL, KeyCode::Left) => {
                self.cursor = word_left(&self.text, self.cursor);
            }
            (KeyModifiers::CONTROL, KeyCode::Right) => {
                self.cursor = word_right(&self.text, self.cursor);
            }
            (KeyModifiers::NONE, KeyCode::Home) | (KeyModifiers::CONTROL, KeyCode::Char('a')) => {
                self.cursor = 0;
            }
            (KeyModifiers::NONE, KeyCode::End) | (KeyModifiers::CONTROL, KeyCode::Char('e')) => {
                self.cursor = self.text.len();
            }
            // Ctrl+U: clear line before cursor
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
                self.text.drain(..self.cursor);
                self.cursor = 0;
            }
            // Ctrl+K: clear from cursor to end
            (KeyModifiers::CONTROL, KeyCode::Char('k')) => {
                self.text.truncate(self.cursor);
            }
            _ => {}
        }
        self.text.len() != before
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char_boundary(&self.text, self.cursor);
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn delete_forward(&mut self) {
        if self.cursor >= self.text.len() {
            return;
        }
        let next = next_char_boundary(&self.text, self.cursor);
        self.text.drain(self.cursor..next);
    }

    fn delete_word(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = word_left(&self.text, self.cursor);
        self.text.drain(start..self.cursor);
        self.cursor = start;
    }
}

/// Previous UTF-8 char boundary before `pos`.
fn prev_char_boundary(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let mut p = pos - 1;
    while !s.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Next UTF-8 char boundary after `pos`.
fn next_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut p = pos + 1;
    while p <= s.len() && !s.is_char_boundary(p) {
        p += 1;
    }
    p.min(s.len())
}

/// Jump to the start of the previous word.
fn word_left(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    while pos > 0 && !bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

/// Jump past the end of the next word.
fn word_right(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    let len = s.len();
    while pos < len && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    while pos < len && !bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn typed(s: &str) -> TextField {
        let mut field = TextField::new();
        for c in s.chars() {
            field.handle_key(key(KeyCode::Char(c)));
        }
        field
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut field = typed("lsx");
        assert!(field.handle_key(key(KeyCode::Backspace)));
        assert_eq!(field.text(), "ls");
        assert_eq!(field.cursor(), 2);
    }

    #[test]
    fn test_multibyte_cursor_movement() {
        let mut field = typed("héllo");
        field.handle_key(key(KeyCode::Home));
        field.handle_key(key(KeyCode::Right));
        field.handle_key(key(KeyCode::Right));
        assert_eq!(field.cursor(), 3);
        field.handle_key(key(KeyCode::Backspace));
        assert_eq!(field.text(), "hllo");
    }

    #[test]
    fn test_delete_word_and_kill_line() {
        let mut field = typed("find all logs");
        field.handle_key(ctrl('w'));
        assert_eq!(field.text(), "find all ");
        field.handle_key(ctrl('a'));
        field.handle_key(ctrl('k'));
        assert_eq!(field.text(), "");
        assert_eq!(field.cursor(), 0);
    }

    #[test]
    fn test_cursor_moves_do_not_report_edits() {
        let mut field = typed("abc");
        assert!(!field.handle_key(key(KeyCode::Left)));
        assert!(!field.handle_key(KeyCode::Tab.into()));
        assert_eq!(field.text(), "abc");
    }

    #[test]
    fn test_set_moves_cursor_to_end() {
        let mut field = typed("x");
        field.set("/etc/hosts");
        assert_eq!(field.cursor(), "/etc/hosts".len());
        assert_eq!(field.text(), "/etc/hosts");
    }
}
