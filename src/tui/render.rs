/// Ratatui draw entry-point for huh. One screen per mode, drawn inside a
/// one-cell margin.
use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use super::layout::{ACCENT, COMMAND_FG};
use super::{Action, AppState, FilePrompt, Focus, LoadingKind, Mode, Prompt, REFINE_PLACEHOLDER};
use crate::error::SessionError;

const SUBTLE: Color = Color::Rgb(110, 110, 130);
const ERROR_FG: Color = Color::Rgb(255, 90, 90);
const DIR_FG: Color = Color::Rgb(90, 150, 255);
const SPARKLE: Color = Color::Rgb(255, 215, 0);

/// Completion candidates shown at once.
const MATCH_WINDOW: usize = 5;

const PROMPT_CHAR: &str = "❯ ";

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area().inner(Margin::new(1, 1));

    match &state.mode {
        Mode::Input(prompt) => draw_prompt(f, state, prompt, false, area),
        Mode::Refining(prompt) => draw_prompt(f, state, prompt, true, area),
        Mode::FilePrompt(file) => draw_file_prompt(f, file, area),
        Mode::PermissionDenied { path, reading, .. } => draw_permission(f, path, *reading, area),
        Mode::Loading(kind) => draw_loading(f, state, *kind, area),
        Mode::SuccessAnim(_) => draw_success(f, state, area),
        Mode::Suggestion => draw_scrollable(f, state, "Suggestion:", true, area),
        Mode::Explained => draw_scrollable(f, state, "Explanation:", false, area),
        Mode::Copied => draw_copied(f, area),
        Mode::Error(e) => draw_error(f, e, area),
    }
}

fn title(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    ))
}

fn subtle(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(SUBTLE)))
}

fn item_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::Black)
            .bg(ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(SUBTLE)
    }
}

/// `❯ text` or `❯ placeholder` when empty.
fn field_line(text: &str, placeholder: &str, focused: bool) -> Line<'static> {
    let prompt_color = if focused { ACCENT } else { SUBTLE };
    let content = if text.is_empty() {
        Span::styled(placeholder.to_string(), Style::default().fg(Color::Rgb(70, 70, 90)))
    } else {
        Span::styled(text.to_string(), Style::default().fg(Color::White))
    };
    Line::from(vec![
        Span::styled(
            PROMPT_CHAR,
            Style::default().fg(prompt_color).add_modifier(Modifier::BOLD),
        ),
        content,
    ])
}

/// Put the terminal cursor at the field's edit position.
fn place_cursor(f: &mut Frame, area: Rect, row: usize, text: &str, cursor: usize) {
    let before = &text[..cursor.min(text.len())];
    let col = PROMPT_CHAR.width() + before.width();
    // Off-screen positions leave the cursor hidden.
    let (Ok(col), Ok(row)) = (u16::try_from(col), u16::try_from(row)) else {
        return;
    };
    if col < area.width && row < area.height {
        f.set_cursor_position((area.x + col, area.y + row));
    }
}

// ── Input / Refining ──────────────────────────────────────────────────────────

fn draw_prompt(f: &mut Frame, state: &AppState, prompt: &Prompt, refining: bool, area: Rect) {
    let mut lines = Vec::new();
    if refining {
        lines.push(title("How should the command be changed?"));
        lines.push(Line::default());
        let current = state.commands.active_command().unwrap_or_default();
        for row in current.lines() {
            lines.push(Line::from(Span::styled(
                row.to_string(),
                Style::default().fg(COMMAND_FG),
            )));
        }
    } else {
        lines.push(title("What would you like to do?"));
        if !state.context.is_empty() {
            lines.push(subtle(format!("(Context: {})", state.context.info())));
        }
    }
    lines.push(Line::default());

    let field_row = lines.len();
    let focused = prompt.focus == Focus::Field;
    let placeholder = if refining { REFINE_PLACEHOLDER } else { state.placeholder };
    lines.push(field_line(prompt.field.text(), placeholder, focused));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "[ Attach File ]",
        item_style(prompt.focus == Focus::Attach),
    )));
    lines.push(Line::default());
    lines.push(subtle(if refining {
        "(Tab to select, Enter to confirm, Esc to cancel)"
    } else {
        "(Tab to select, Enter to confirm, Esc to quit)"
    }));

    f.render_widget(Paragraph::new(lines), area);
    if focused {
        place_cursor(f, area, field_row, prompt.field.text(), prompt.field.cursor());
    }
}

// ── FilePrompt ────────────────────────────────────────────────────────────────

fn draw_file_prompt(f: &mut Frame, file: &FilePrompt, area: Rect) {
    let mut lines = vec![title("File to attach:"), Line::default()];
    let field_row = lines.len();
    lines.push(field_line(file.field.text(), "/path/to/file", true));
    lines.push(Line::default());
    lines.push(subtle("(↑↓ cycle, Tab complete, Enter attach, Esc cancel)"));

    if !file.matches.is_empty() {
        lines.push(Line::default());
        lines.push(title("Suggestions:"));

        let start = file.match_index.saturating_sub(MATCH_WINDOW - 1);
        let end = (start + MATCH_WINDOW).min(file.matches.len());
        for (i, candidate) in file.matches.iter().enumerate().take(end).skip(start) {
            let selected = i == file.match_index;
            let is_dir = candidate.ends_with(std::path::MAIN_SEPARATOR);
            let style = match (selected, is_dir) {
                (true, _) => item_style(true),
                (false, true) => Style::default().fg(DIR_FG),
                (false, false) => Style::default().fg(Color::White),
            };
            lines.push(Line::from(vec![
                Span::styled(if selected { "> " } else { "  " }, Style::default().fg(ACCENT)),
                Span::styled(candidate.clone(), style),
            ]));
        }
        if file.matches.len() > MATCH_WINDOW {
            lines.push(subtle("  ..."));
        }
    }

    f.render_widget(Paragraph::new(lines), area);
    place_cursor(f, area, field_row, file.field.text(), file.field.cursor());
}

// ── PermissionDenied ──────────────────────────────────────────────────────────

fn draw_permission(f: &mut Frame, path: &str, reading: bool, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Permission Denied",
            Style::default().fg(ERROR_FG).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(format!("Could not read '{path}'.")),
    ];
    if reading {
        lines.push(subtle("Reading with elevated privileges…"));
    } else {
        lines.push(Line::from("Try reading with sudo? (y/n)"));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

// ── Loading / success animation ───────────────────────────────────────────────

/// The thinking robot: antenna, head, eyes, chin. Four frames.
fn robot_frame(tick: u32) -> Vec<Line<'static>> {
    let body = Style::default().fg(SUBTLE);
    let eye = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
    let step = tick % 4;

    let antenna = if step % 2 == 0 { "        |" } else { "       \\|/" };
    let eyes: Vec<Span<'static>> = match step {
        0 => vec![Span::styled("O", eye), Span::raw("  "), Span::styled("O", eye)],
        1 => vec![Span::styled("O", eye), Span::raw("   ")],
        2 => vec![Span::raw("   "), Span::styled("O", eye)],
        _ => vec![Span::styled("-", eye), Span::raw("  "), Span::styled("-", eye)],
    };

    let mut eye_row = vec![Span::styled("      |", body)];
    eye_row.extend(eyes);
    eye_row.push(Span::styled("|", body));

    vec![
        Line::from(Span::styled(antenna, body)),
        Line::from(Span::styled("      /----\\", body)),
        Line::from(eye_row),
        Line::from(Span::styled("      \\____/", body)),
    ]
}

fn thinking_header(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!("Thinking about: {}...", state.question))];
    if !state.context.is_empty() {
        lines.push(subtle(format!("(Context: {})", state.context.info())));
    }
    lines
}

fn draw_loading(f: &mut Frame, state: &AppState, kind: LoadingKind, area: Rect) {
    let mut lines = match kind {
        LoadingKind::Suggest | LoadingKind::Refine => thinking_header(state),
        LoadingKind::Explain => vec![Line::from("Explaining...")],
    };
    lines.extend(robot_frame(state.spinner_tick));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_success(f: &mut Frame, state: &AppState, area: Rect) {
    let body = Style::default().fg(SUBTLE);
    let eye = Style::default().fg(COMMAND_FG).add_modifier(Modifier::BOLD);
    let mut lines = thinking_header(state);
    lines.extend([
        Line::from(Span::styled("    !!        !!", Style::default().fg(SPARKLE))),
        Line::from(Span::styled("       /----\\", body)),
        Line::from(vec![
            Span::styled("       |", body),
            Span::styled("^", eye),
            Span::raw("  "),
            Span::styled("^", eye),
            Span::styled("|", body),
        ]),
        Line::from(Span::styled("       \\____/", body)),
    ]);
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

// ── Suggestion / Explained ────────────────────────────────────────────────────

fn draw_scrollable(f: &mut Frame, state: &AppState, heading: &str, with_menu: bool, area: Rect) {
    let vp = &state.viewport;
    let mut lines = vec![title(heading)];
    lines.extend(state.lines.iter().skip(vp.offset).take(vp.height).cloned());

    let mut hints = Vec::new();
    if !vp.at_top() {
        hints.push("↑ More above");
    }
    if !vp.at_bottom() {
        hints.push("↓ More below");
    }
    if hints.is_empty() {
        lines.push(Line::default());
    } else {
        lines.push(subtle(format!("({})", hints.join(" | "))));
    }

    if with_menu {
        lines.push(Line::default());
        let mut menu: Vec<Span<'static>> = Action::ALL
            .iter()
            .flat_map(|action| {
                [
                    Span::styled(format!(" {} ", action.label()), item_style(*action == state.action)),
                    Span::raw(" "),
                ]
            })
            .collect();
        menu.push(Span::styled(
            " (←/→ select, Enter confirm, ↑/↓ scroll)",
            Style::default().fg(SUBTLE),
        ));
        lines.push(Line::from(menu));
    }

    f.render_widget(Paragraph::new(lines), area);
}

// ── Copied / Error ────────────────────────────────────────────────────────────

fn draw_copied(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "  ✓ Copied to clipboard!",
            Style::default().fg(COMMAND_FG).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        subtle("  (Quitting...)"),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_error(f: &mut Frame, err: &SessionError, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            "Error:",
            Style::default().fg(ERROR_FG).add_modifier(Modifier::BOLD),
        )),
        Line::from(err.to_string()),
        Line::default(),
        subtle("(Press q to quit)"),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

#[cfg(test)]
mod tests {
    use super::super::tests::Harness;
    use super::*;
    use ratatui::{
        Terminal,
        backend::{Backend, TestBackend},
    };

    fn screen(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(80)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_robot_cycles_four_frames() {
        let frames: Vec<String> = (0..4)
            .map(|t| {
                robot_frame(t)[2]
                    .spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect()
            })
            .collect();
        assert_eq!(frames[0], "      |O  O|");
        assert_eq!(frames[1], "      |O   |");
        assert_eq!(frames[2], "      |   O|");
        assert_eq!(frames[3], "      |-  -|");
        assert_eq!(robot_frame(4)[2], robot_frame(0)[2]);
    }

    #[tokio::test]
    async fn test_input_screen_shows_title_and_attach_button() {
        let h = Harness::new("", &[]);
        let text = screen(&h.state);
        assert!(text.contains("What would you like to do?"));
        assert!(text.contains("[ Attach File ]"));
    }

    #[tokio::test]
    async fn test_suggestion_screen_shows_command_and_menu() {
        let mut h = Harness::new("list files", &["Try this:\n```bash\nls -la\n```"]);
        h.state.start();
        h.settle().await;
        let text = screen(&h.state);
        assert!(text.contains("Suggestion:"));
        assert!(text.contains("ls -la"));
        assert!(text.contains(" Copy "));
        assert!(text.contains(" Cancel "));
    }

    fn cursor_after_draw(state: &AppState) -> ratatui::layout::Position {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        terminal.backend_mut().get_cursor_position().unwrap()
    }

    fn input_with(text: &str) -> Mode {
        let mut prompt = Prompt::default();
        prompt.field.set(text);
        Mode::Input(prompt)
    }

    #[tokio::test]
    async fn test_cursor_follows_typed_text() {
        let mut h = Harness::new("", &[]);
        h.state.mode = input_with("ls");
        // margin + prompt glyph + two chars; title and gap above the field
        assert_eq!(cursor_after_draw(&h.state), (5, 3).into());
    }

    #[tokio::test]
    async fn test_cursor_past_edge_stays_hidden() {
        let mut h = Harness::new("", &[]);
        // wider than u16 so a narrowing cast would wrap back on screen
        h.state.mode = input_with(&"a".repeat(65_536));
        assert_eq!(cursor_after_draw(&h.state), (0, 0).into());

        h.state.mode = input_with(&"a".repeat(200));
        assert_eq!(cursor_after_draw(&h.state), (0, 0).into());
    }

    #[tokio::test]
    async fn test_error_screen_shows_cause() {
        let mut h = Harness::new("", &[]);
        h.state.mode = Mode::Error(SessionError::NoCommandAvailable);
        let text = screen(&h.state);
        assert!(text.contains("Error:"));
        assert!(text.contains("no executable command found"));
    }
}
