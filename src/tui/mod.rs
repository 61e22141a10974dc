//! Ratatui-based session controller for huh.
//!
//! Architecture:
//!   main loop:   owns `AppState`; crossterm key/resize events + mpsc UiEvent drain
//!   async units: tokio::spawn, each sends exactly one UiEvent back, then ends
//!
//! Layout (every mode draws inside a 1-cell margin):
//!   ┌────────────────────────────────────────────────┐
//!   │  title                                         │
//!   │  body (input, scrollable response, robot, …)   │
//!   │  hints / action menu                           │
//!   └────────────────────────────────────────────────┘
pub mod input;
pub mod keys;
pub mod layout;
pub mod render;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend, text::Line};
use tokio::sync::mpsc;

use crate::assistant::Assistant;
use crate::clipboard::ClipboardSink;
use crate::error::SessionError;
use crate::extract;
use input::TextField;
use layout::{CommandLayout, Viewport};

const SUCCESS_ANIM: Duration = Duration::from_millis(250);
const COPIED_DELAY: Duration = Duration::from_millis(800);

/// Rows around the scrollable region: margins, title, scroll hint, gap, menu.
const CHROME_ROWS: u16 = 6;
const MARGIN_COLS: u16 = 2;

// ── UiEvent: completions from async units → controller ──────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// Answer to an ask or refine dispatch
    Suggestion(Result<String, SessionError>),
    Explanation(Result<String, SessionError>),
    SuccessTimeout,
    CopiedTimeout,
    /// The privileged read finished; the terminal can be taken back
    ElevatedRead {
        path: String,
        result: Result<String, SessionError>,
    },
}

/// What the run loop should do after a key or event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    /// Hand the terminal to a privileged read of this path
    Suspend(String),
    /// Take the terminal back after a suspension
    Resume,
}

// ── Mode: tagged state, each variant carries only its own data ───────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Field,
    Attach,
}

impl Focus {
    pub fn toggle(self) -> Self {
        match self {
            Focus::Field => Focus::Attach,
            Focus::Attach => Focus::Field,
        }
    }
}

/// A text prompt with an `[ Attach File ]` button next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub field: TextField,
    pub focus: Focus,
}

/// Which prompt a file prompt was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Question,
    Refinement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePrompt {
    pub field: TextField,
    pub matches: Vec<String>,
    pub match_index: usize,
    pub return_kind: PromptKind,
    pub parent: Prompt,
}

impl FilePrompt {
    fn new(return_kind: PromptKind, parent: Prompt) -> Self {
        Self {
            field: TextField::new(),
            matches: Vec::new(),
            match_index: 0,
            return_kind,
            parent,
        }
    }

    /// The mode this prompt was opened from, with focus back on the text field.
    fn into_parent(self) -> Mode {
        let prompt = Prompt {
            focus: Focus::Field,
            ..self.parent
        };
        match self.return_kind {
            PromptKind::Question => Mode::Input(prompt),
            PromptKind::Refinement => Mode::Refining(prompt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingKind {
    Suggest,
    Explain,
    Refine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Input(Prompt),
    Refining(Prompt),
    FilePrompt(FilePrompt),
    PermissionDenied {
        file: FilePrompt,
        path: String,
        /// Elevated read in flight; the terminal belongs to it
        reading: bool,
    },
    Loading(LoadingKind),
    /// Holds the answer until the animation ends
    SuccessAnim(String),
    Suggestion,
    Explained,
    Copied,
    Error(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Copy,
    Explain,
    Refine,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Copy, Action::Explain, Action::Refine, Action::Cancel];

    pub fn label(self) -> &'static str {
        match self {
            Action::Copy => "Copy",
            Action::Explain => "Explain",
            Action::Refine => "Refine",
            Action::Cancel => "Cancel",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|a| *a == self).unwrap_or(0)
    }

    pub fn left(self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }

    pub fn right(self) -> Self {
        Self::ALL[(self.index() + 1).min(Self::ALL.len() - 1)]
    }
}

// ── Session data ──────────────────────────────────────────────────────────────

/// Commands pulled from the latest answer and which one is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSet {
    commands: Vec<String>,
    active: Option<usize>,
}

impl CommandSet {
    pub fn from_response(raw: &str) -> Self {
        let commands = extract::extract(raw);
        let active = extract::initial_active(commands.len());
        Self { commands, active }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn active_command(&self) -> Option<&str> {
        self.active.and_then(|i| self.commands.get(i)).map(String::as_str)
    }

    pub fn next(&mut self) {
        if let Some(i) = self.active {
            self.active = Some((i + 1) % self.commands.len());
        }
    }

    pub fn prev(&mut self) {
        if let Some(i) = self.active {
            let n = self.commands.len();
            self.active = Some((i + n - 1) % n);
        }
    }
}

/// Everything attached so far. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachedContext {
    pub sources: Vec<String>,
    pub content: String,
}

impl AttachedContext {
    pub fn attach_file(&mut self, path: &str, content: &str) {
        self.content.push_str(&format!("\n--- File: {path} ---\n{content}\n"));
        self.sources.push(path.to_string());
    }

    pub fn attach_stdin(&mut self, content: &str) {
        self.content.push_str(&format!("\n--- Stdin ---\n{content}\n"));
        self.sources.push("Stdin".to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Attached sources, comma-joined.
    pub fn info(&self) -> String {
        self.sources.join(", ")
    }
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub mode: Mode,
    pub question: String,
    pub context: AttachedContext,
    pub raw_response: String,
    pub commands: CommandSet,
    pub explanation: String,
    pub action: Action,

    /// Rendered scroll buffer for the current response or explanation
    pub lines: Vec<Line<'static>>,
    pub layouts: Vec<CommandLayout>,
    pub viewport: Viewport,
    /// Columns available to rendered content
    pub width: usize,

    pub spinner_tick: u32,
    pub placeholder: &'static str,

    assistant: Arc<Assistant>,
    clipboard: Box<dyn ClipboardSink>,
    elevate_command: Vec<String>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
}

const PLACEHOLDERS: &[&str] = &[
    "e.g. how do I check disk space?",
    "e.g. find files larger than 100MB",
    "e.g. which process is using port 8080?",
    "e.g. undo my last git commit",
    "e.g. extract a .tar.gz archive",
];

pub const REFINE_PLACEHOLDER: &str = "Your follow-up question here...";

fn pick_placeholder() -> &'static str {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0);
    PLACEHOLDERS[nanos % PLACEHOLDERS.len()]
}

impl AppState {
    pub fn new(
        question: String,
        context: AttachedContext,
        assistant: Arc<Assistant>,
        clipboard: Box<dyn ClipboardSink>,
        elevate_command: Vec<String>,
        ui_tx: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        let question = question.trim().to_string();
        let mode = if question.is_empty() {
            Mode::Input(Prompt::default())
        } else {
            Mode::Loading(LoadingKind::Suggest)
        };
        Self {
            mode,
            question,
            context,
            raw_response: String::new(),
            commands: CommandSet::default(),
            explanation: String::new(),
            action: Action::default(),
            lines: Vec::new(),
            layouts: Vec::new(),
            viewport: Viewport::default(),
            width: 80,
            spinner_tick: 0,
            placeholder: pick_placeholder(),
            assistant,
            clipboard,
            elevate_command,
            ui_tx,
        }
    }

    /// Dispatch the startup question, if one was given.
    pub fn start(&mut self) {
        if self.mode == Mode::Loading(LoadingKind::Suggest) {
            self.spawn_ask(self.question.clone());
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.mode, Mode::Loading(_))
    }

    /// Terminal size changed (or is first known).
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.width = cols.saturating_sub(MARGIN_COLS) as usize;
        self.viewport.resize(rows.saturating_sub(CHROME_ROWS) as usize);
        self.relayout();
    }

    /// Re-render the scroll buffer for the current mode.
    pub fn relayout(&mut self) {
        match self.mode {
            Mode::Suggestion => self.layout_suggestion(),
            Mode::Explained => self.layout_explanation(),
            _ => {}
        }
    }

    fn layout_suggestion(&mut self) {
        let rendered =
            layout::render_suggestion(&self.raw_response, self.commands.active(), self.width);
        self.lines = rendered.lines;
        self.layouts = rendered.commands;
        self.viewport.set_content_len(self.lines.len());
    }

    fn layout_explanation(&mut self) {
        self.lines = layout::render_explanation(&self.explanation, self.width);
        self.lines.push(Line::default());
        self.lines.push(Line::from("(Press Esc to go back)"));
        self.layouts.clear();
        self.viewport.set_content_len(self.lines.len());
    }

    /// Scroll so the selected command box is on screen.
    pub fn ensure_active_visible(&mut self) {
        if let Some(target) = self.commands.active().and_then(|i| self.layouts.get(i)) {
            self.viewport.ensure_visible(*target);
        }
    }

    // ── Completion events ─────────────────────────────────────────────────────

    pub fn apply_event(&mut self, ev: UiEvent) -> Flow {
        match ev {
            UiEvent::Suggestion(Ok(raw)) => {
                self.mode = Mode::SuccessAnim(raw);
                self.spawn_timer(SUCCESS_ANIM, UiEvent::SuccessTimeout);
            }
            UiEvent::SuccessTimeout => {
                if let Mode::SuccessAnim(raw) = &mut self.mode {
                    let raw = std::mem::take(raw);
                    self.show_suggestion(raw);
                }
            }
            UiEvent::Explanation(Ok(text)) => {
                self.explanation = text;
                self.mode = Mode::Explained;
                self.viewport.offset = 0;
                self.relayout();
            }
            UiEvent::Suggestion(Err(e)) | UiEvent::Explanation(Err(e)) => {
                tracing::warn!(error = %e, "query failed");
                self.mode = Mode::Error(e);
            }
            UiEvent::CopiedTimeout => return Flow::Quit,
            UiEvent::ElevatedRead { path, result } => {
                let mode = std::mem::replace(&mut self.mode, Mode::Suggestion);
                self.mode = match (mode, result) {
                    (Mode::PermissionDenied { file, .. }, Ok(content)) => {
                        tracing::info!(%path, bytes = content.len(), "attached via elevated read");
                        self.context.attach_file(&path, &content);
                        file.into_parent()
                    }
                    (_, Err(e)) => {
                        tracing::warn!(%path, error = %e, "elevated read failed");
                        Mode::Error(e)
                    }
                    (other, Ok(_)) => other,
                };
                return Flow::Resume;
            }
        }
        Flow::Continue
    }

    /// A fresh answer arrived: extract, select the last command, show it.
    fn show_suggestion(&mut self, raw: String) {
        self.commands = CommandSet::from_response(&raw);
        self.raw_response = raw;
        self.explanation.clear();
        self.action = Action::default();
        self.mode = Mode::Suggestion;
        tracing::info!(commands = self.commands.len(), "suggestion ready");
        self.viewport.offset = 0;
        self.relayout();
        self.ensure_active_visible();
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    fn spawn_ask(&self, question: String) {
        let assistant = Arc::clone(&self.assistant);
        let context = self.context.content.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = assistant.ask(&question, &context).await;
            let _ = tx.send(UiEvent::Suggestion(result));
        });
    }

    fn spawn_explain(&self, target: String) {
        let assistant = Arc::clone(&self.assistant);
        let context = self.context.content.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = assistant.explain(&target, &context).await;
            let _ = tx.send(UiEvent::Explanation(result));
        });
    }

    fn spawn_refine(&self, question: String, command: String, refinement: String) {
        let assistant = Arc::clone(&self.assistant);
        let context = self.context.content.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = assistant
                .refine(&question, &command, &refinement, &context)
                .await;
            let _ = tx.send(UiEvent::Suggestion(result));
        });
    }

    fn spawn_timer(&self, after: Duration, ev: UiEvent) {
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(ev);
        });
    }

    /// Start the privileged read. Call only once the terminal is suspended.
    pub fn spawn_elevated_read(&self, path: String) {
        let prefix = self.elevate_command.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = crate::elevated::read_elevated(&prefix, &path).await;
            let _ = tx.send(UiEvent::ElevatedRead { path, result });
        });
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

/// Give the tty back to the shell so a credential prompt can be answered.
fn suspend_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn resume_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    terminal.clear()?;
    Ok(())
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(
    question: String,
    context: AttachedContext,
    assistant: Arc<Assistant>,
    clipboard: Box<dyn ClipboardSink>,
    elevate_command: Vec<String>,
) -> Result<()> {
    let mut terminal = setup_terminal().context("failed to set up terminal")?;

    // Panic hook: restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(
        &mut terminal,
        question,
        context,
        assistant,
        clipboard,
        elevate_command,
    )
    .await;

    restore_terminal(&mut terminal);
    result
}

/// Next terminal event, or never while the terminal is suspended.
async fn next_event(events: &mut Option<EventStream>) -> Option<io::Result<Event>> {
    match events {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    question: String,
    context: AttachedContext,
    assistant: Arc<Assistant>,
    clipboard: Box<dyn ClipboardSink>,
    elevate_command: Vec<String>,
) -> Result<()> {
    // Channel: async units → controller
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut state = AppState::new(question, context, assistant, clipboard, elevate_command, ui_tx);
    if let Ok((w, h)) = crossterm::terminal::size() {
        state.resize(w, h);
    }
    state.start();

    let mut crossterm_events = Some(EventStream::new());
    let mut ticker = tokio::time::interval(Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.is_animating() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Drain completion events ───────────────────────────────────────
            Some(ev) = ui_rx.recv() => {
                match state.apply_event(ev) {
                    Flow::Quit => break,
                    Flow::Resume => {
                        resume_terminal(terminal)?;
                        crossterm_events = Some(EventStream::new());
                        if let Ok((w, h)) = crossterm::terminal::size() {
                            state.resize(w, h);
                        }
                    }
                    Flow::Continue | Flow::Suspend(_) => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = next_event(&mut crossterm_events) => {
                match ev {
                    Event::Key(key) => match state.handle_key(key) {
                        Flow::Quit => break,
                        Flow::Suspend(path) => {
                            // Stop reading the tty before the credential prompt needs it
                            crossterm_events = None;
                            suspend_terminal(terminal)?;
                            eprintln!("huh: reading {path} with elevated privileges");
                            state.spawn_elevated_read(path);
                            continue;
                        }
                        Flow::Continue | Flow::Resume => {}
                    },
                    Event::Resize(w, h) => state.resize(w, h),
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    Ok(())
}
