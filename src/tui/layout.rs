/// Turns a model response into one scrollable buffer of lines, remembering
/// where each command box landed so the viewport can keep the active one in
/// sight.
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::extract::{self, Segment};

pub const ACCENT: Color = Color::Rgb(170, 110, 255);
pub const COMMAND_FG: Color = Color::Rgb(80, 220, 120);
const DIM: Color = Color::Rgb(90, 90, 110);

/// Narrowest box we bother drawing.
const MIN_WIDTH: usize = 12;

/// Where one command box sits inside the rendered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLayout {
    pub y: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub lines: Vec<Line<'static>>,
    pub commands: Vec<CommandLayout>,
}

/// Render prose and command boxes in document order.
///
/// `active` highlights one box; the others are dimmed.
pub fn render_suggestion(raw: &str, active: Option<usize>, width: usize) -> Rendered {
    let width = width.max(MIN_WIDTH);
    let mut out = Rendered::default();
    let mut index = 0;

    for seg in extract::segments(raw) {
        match seg {
            Segment::Prose(text) => push_prose(&mut out.lines, text, width),
            Segment::Block(block) => {
                let command = extract::clean_block(block);
                let y = out.lines.len();
                push_command_box(&mut out.lines, &command, width, active == Some(index));
                out.commands.push(CommandLayout {
                    y,
                    height: out.lines.len() - y,
                });
                index += 1;
            }
        }
    }

    if out.commands.len() > 1 {
        out.lines.push(Line::default());
        out.lines.push(Line::from(Span::styled(
            "(Tab to cycle commands)",
            Style::default().fg(DIM),
        )));
    }
    out
}

pub fn render_explanation(text: &str, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    push_prose(&mut lines, text, width.max(MIN_WIDTH));
    lines
}

fn push_prose(lines: &mut Vec<Line<'static>>, text: &str, width: usize) {
    let text = text.trim_matches(|c| c == '\n' || c == '\r');
    if text.trim().is_empty() {
        return;
    }
    for para in text.lines() {
        if para.trim().is_empty() {
            lines.push(Line::default());
            continue;
        }
        for row in wrap_text(para, width) {
            lines.push(Line::from(row));
        }
    }
}

/// Rounded box: border, padding, command rows, padding, border.
fn push_command_box(lines: &mut Vec<Line<'static>>, command: &str, width: usize, active: bool) {
    let (border, body) = if active {
        (
            Style::default().fg(ACCENT),
            Style::default().fg(COMMAND_FG).add_modifier(Modifier::BOLD),
        )
    } else {
        (Style::default().fg(DIM), Style::default().fg(DIM))
    };
    let inner = width - 2;
    let text_width = width - 6;

    let horizontal = "─".repeat(inner);
    let blank = Line::from(vec![
        Span::styled("│", border),
        Span::raw(" ".repeat(inner)),
        Span::styled("│", border),
    ]);

    lines.push(Line::from(Span::styled(format!("╭{horizontal}╮"), border)));
    lines.push(blank.clone());
    for row in command.lines().flat_map(|l| hard_wrap(l, text_width)) {
        let pad = text_width.saturating_sub(row.width());
        lines.push(Line::from(vec![
            Span::styled("│  ", border),
            Span::styled(row, body),
            Span::raw(" ".repeat(pad)),
            Span::styled("  │", border),
        ]));
    }
    lines.push(blank);
    lines.push(Line::from(Span::styled(format!("╰{horizontal}╯"), border)));
}

/// Word-wrap on whitespace. Words longer than a line are left intact.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current_width == 0 {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Break at exactly `max_width` columns; commands must stay byte-exact.
fn hard_wrap(text: &str, max_width: usize) -> Vec<String> {
    let mut rows = vec![String::new()];
    let mut row_width = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if row_width + w > max_width && row_width > 0 {
            rows.push(String::new());
            row_width = 0;
        }
        if let Some(row) = rows.last_mut() {
            row.push(c);
        }
        row_width += w;
    }
    rows
}

// ── Viewport ──────────────────────────────────────────────────────────────────

/// Visible window over the rendered buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    pub height: usize,
    pub max_height: usize,
    pub content_len: usize,
}

impl Viewport {
    /// Terminal space available for content changed.
    pub fn resize(&mut self, max_height: usize) {
        self.max_height = max_height;
        self.set_content_len(self.content_len);
    }

    /// New content: shrink to fit short content, never exceed the terminal.
    pub fn set_content_len(&mut self, len: usize) {
        self.content_len = len;
        self.height = len.min(self.max_height);
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn max_offset(&self) -> usize {
        self.content_len.saturating_sub(self.height)
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.max_offset());
    }

    /// Half a screen, like a pager.
    pub fn page_up(&mut self) {
        self.scroll_up((self.height / 2).max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down((self.height / 2).max(1));
    }

    pub fn at_top(&self) -> bool {
        self.offset == 0
    }

    pub fn at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    /// Scroll the least amount that brings `target` fully into view. A block
    /// taller than the viewport is aligned to the top instead.
    pub fn ensure_visible(&mut self, target: CommandLayout) {
        let bottom = target.y + target.height;
        if target.y < self.offset {
            self.offset = target.y;
        } else if bottom > self.offset + self.height {
            self.offset = if target.height > self.height {
                target.y
            } else {
                bottom - self.height
            };
        }
        self.offset = self.offset.min(self.max_offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_single_command_box_geometry() {
        let r = render_suggestion("Here you go:\n```bash\nls -la\n```\n", Some(0), 30);
        assert_eq!(r.commands, vec![CommandLayout { y: 1, height: 5 }]);
        assert_eq!(text_of(&r.lines[0]), "Here you go:");
        assert!(text_of(&r.lines[1]).starts_with('╭'));
        assert_eq!(text_of(&r.lines[3]).trim_matches(|c| c == '│' || c == ' '), "ls -la");
        assert_eq!(text_of(&r.lines[3]).width(), 30);
        assert!(text_of(&r.lines[5]).starts_with('╰'));
    }

    #[test]
    fn test_boxes_follow_document_order_with_footer() {
        let raw = "a\n```sh\nls\n```\nb\n```bash\nls -la\n```";
        let r = render_suggestion(raw, Some(1), 40);
        assert_eq!(r.commands.len(), 2);
        assert_eq!(r.commands[0].y, 1);
        assert_eq!(r.commands[1].y, 1 + 5 + 1);
        assert_eq!(text_of(r.lines.last().unwrap()), "(Tab to cycle commands)");
    }

    #[test]
    fn test_long_command_wraps_inside_box() {
        let cmd = "x".repeat(50);
        let r = render_suggestion(&format!("```\n{cmd}\n```"), Some(0), 26);
        // 20 columns of text per row → 3 rows
        assert_eq!(r.commands[0].height, 3 + 4);
    }

    #[test]
    fn test_no_commands_is_prose_only() {
        let r = render_suggestion("Use the file manager.", None, 40);
        assert!(r.commands.is_empty());
        assert_eq!(r.lines.len(), 1);
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let rows = wrap_text("one two three four", 9);
        assert_eq!(rows, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_height_clamps_to_terminal_and_content() {
        let mut vp = Viewport::default();
        vp.resize(10);
        vp.set_content_len(4);
        assert_eq!(vp.height, 4);
        vp.set_content_len(40);
        assert_eq!(vp.height, 10);
        vp.scroll_down(100);
        assert_eq!(vp.offset, 30);
        assert!(vp.at_bottom());
        vp.page_up();
        assert_eq!(vp.offset, 25);
        vp.set_content_len(12);
        assert_eq!(vp.offset, 2);
    }

    #[test]
    fn test_ensure_visible_scrolls_minimally() {
        let mut vp = Viewport::default();
        vp.resize(10);
        vp.set_content_len(50);

        vp.ensure_visible(CommandLayout { y: 20, height: 5 });
        assert_eq!(vp.offset, 15);

        vp.ensure_visible(CommandLayout { y: 12, height: 5 });
        assert_eq!(vp.offset, 12);

        // already visible: no movement
        vp.ensure_visible(CommandLayout { y: 14, height: 3 });
        assert_eq!(vp.offset, 12);
    }

    #[test]
    fn test_tall_block_aligns_top() {
        let mut vp = Viewport::default();
        vp.resize(10);
        vp.set_content_len(60);
        vp.ensure_visible(CommandLayout { y: 30, height: 15 });
        assert_eq!(vp.offset, 30);
    }

    #[test]
    fn test_ensure_visible_is_idempotent() {
        let targets = [
            CommandLayout { y: 0, height: 3 },
            CommandLayout { y: 25, height: 4 },
            CommandLayout { y: 40, height: 20 },
            CommandLayout { y: 55, height: 5 },
        ];
        for target in targets {
            for start in [0, 7, 30, 50] {
                let mut vp = Viewport::default();
                vp.resize(10);
                vp.set_content_len(60);
                vp.offset = start;
                vp.ensure_visible(target);
                let once = vp.offset;
                vp.ensure_visible(target);
                assert_eq!(vp.offset, once);
            }
        }
    }
}
