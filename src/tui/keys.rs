//! Per-mode key handling. Each handler takes the mode by value and returns
//! the next one, so a mode's data is never reachable from the wrong state.
use std::path::Path;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{
    Action, AppState, FilePrompt, Flow, Focus, LoadingKind, Mode, Prompt, PromptKind,
    COPIED_DELAY, UiEvent,
};
use crate::completion;
use crate::error::SessionError;

impl AppState {
    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind != KeyEventKind::Press {
            return Flow::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        let mode = std::mem::replace(&mut self.mode, Mode::Suggestion);
        let (next, flow) = match mode {
            Mode::Input(prompt) => self.prompt_key(PromptKind::Question, prompt, key),
            Mode::Refining(prompt) => self.prompt_key(PromptKind::Refinement, prompt, key),
            Mode::FilePrompt(file) => self.file_prompt_key(file, key),
            Mode::PermissionDenied {
                file,
                path,
                reading,
            } => permission_key(file, path, reading, key),
            Mode::Suggestion => self.suggestion_key(key),
            Mode::Explained => self.explained_key(key),
            Mode::Error(e) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => (Mode::Error(e), Flow::Quit),
                _ => (Mode::Error(e), Flow::Continue),
            },
            other @ (Mode::Loading(_) | Mode::SuccessAnim(_) | Mode::Copied) => (other, Flow::Continue),
        };
        self.mode = next;
        flow
    }

    // ── Input / Refining ──────────────────────────────────────────────────────

    fn prompt_key(&mut self, kind: PromptKind, mut prompt: Prompt, key: KeyEvent) -> (Mode, Flow) {
        let stay = |prompt| match kind {
            PromptKind::Question => Mode::Input(prompt),
            PromptKind::Refinement => Mode::Refining(prompt),
        };
        match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                prompt.focus = prompt.focus.toggle();
                (stay(prompt), Flow::Continue)
            }
            KeyCode::Esc => match kind {
                PromptKind::Question => (stay(prompt), Flow::Quit),
                PromptKind::Refinement => {
                    self.layout_suggestion();
                    (Mode::Suggestion, Flow::Continue)
                }
            },
            KeyCode::Enter if prompt.focus == Focus::Attach => {
                let mut file = FilePrompt::new(kind, prompt);
                refresh_matches(&mut file);
                (Mode::FilePrompt(file), Flow::Continue)
            }
            KeyCode::Enter => {
                let text = prompt.field.text().trim().to_string();
                if text.is_empty() {
                    return (stay(prompt), Flow::Continue);
                }
                match kind {
                    PromptKind::Question => {
                        self.question = text.clone();
                        self.spawn_ask(text);
                        (Mode::Loading(LoadingKind::Suggest), Flow::Continue)
                    }
                    PromptKind::Refinement => {
                        let original = std::mem::replace(&mut self.question, text.clone());
                        let command = self
                            .commands
                            .active_command()
                            .map(str::to_string)
                            .unwrap_or_else(|| self.raw_response.clone());
                        self.raw_response.clear();
                        self.spawn_refine(original, command, text);
                        (Mode::Loading(LoadingKind::Refine), Flow::Continue)
                    }
                }
            }
            _ => {
                if prompt.focus == Focus::Field {
                    prompt.field.handle_key(key);
                }
                (stay(prompt), Flow::Continue)
            }
        }
    }

    // ── FilePrompt ────────────────────────────────────────────────────────────

    fn file_prompt_key(&mut self, mut file: FilePrompt, key: KeyEvent) -> (Mode, Flow) {
        match key.code {
            KeyCode::Up | KeyCode::Down => {
                if !file.matches.is_empty() {
                    let n = file.matches.len();
                    file.match_index = if key.code == KeyCode::Up {
                        (file.match_index + n - 1) % n
                    } else {
                        (file.match_index + 1) % n
                    };
                    file.field.set(file.matches[file.match_index].clone());
                }
                (Mode::FilePrompt(file), Flow::Continue)
            }
            KeyCode::Tab => {
                if let Some(current) = file.matches.get(file.match_index) {
                    file.field.set(current.clone());
                }
                match completion::complete(file.field.text()) {
                    Ok(matches) => {
                        if let [only] = matches.as_slice() {
                            file.field.set(only.clone());
                        }
                        file.matches = matches;
                        file.match_index = 0;
                        (Mode::FilePrompt(file), Flow::Continue)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "completion failed");
                        (Mode::Error(e), Flow::Continue)
                    }
                }
            }
            KeyCode::Enter => self.attach(file),
            KeyCode::Esc => (file.into_parent(), Flow::Continue),
            _ => {
                if file.field.handle_key(key) {
                    refresh_matches(&mut file);
                }
                (Mode::FilePrompt(file), Flow::Continue)
            }
        }
    }

    /// Read the typed path into the context, or route the failure.
    fn attach(&mut self, file: FilePrompt) -> (Mode, Flow) {
        let typed = file.field.text().trim();
        if typed.is_empty() {
            return (Mode::FilePrompt(file), Flow::Continue);
        }
        let path = completion::expand_tilde(typed);
        if Path::new(&path).is_dir() {
            return (Mode::FilePrompt(file), Flow::Continue);
        }

        match std::fs::read(&path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                tracing::info!(%path, bytes = bytes.len(), "attached file");
                self.context.attach_file(&path, &content);
                (file.into_parent(), Flow::Continue)
            }
            Err(e) => match SessionError::from_read(&path, &e) {
                SessionError::PermissionDenied { path } => {
                    tracing::info!(%path, "permission denied, offering escalation");
                    (
                        Mode::PermissionDenied {
                            file,
                            path,
                            reading: false,
                        },
                        Flow::Continue,
                    )
                }
                other => {
                    tracing::warn!(error = %other, "attach failed");
                    (Mode::Error(other), Flow::Continue)
                }
            },
        }
    }

    // ── Suggestion / Explained ────────────────────────────────────────────────

    fn suggestion_key(&mut self, key: KeyEvent) -> (Mode, Flow) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Char('q')) => return (Mode::Suggestion, Flow::Quit),
            (_, KeyCode::Tab) => self.cycle(true),
            (_, KeyCode::BackTab) => self.cycle(false),
            (_, KeyCode::Left) | (KeyModifiers::NONE, KeyCode::Char('h')) => {
                self.action = self.action.left();
            }
            (_, KeyCode::Right) | (KeyModifiers::NONE, KeyCode::Char('l')) => {
                self.action = self.action.right();
            }
            (_, KeyCode::Enter) => return self.confirm_action(),
            _ => self.scroll_key(key),
        }
        (Mode::Suggestion, Flow::Continue)
    }

    fn explained_key(&mut self, key: KeyEvent) -> (Mode, Flow) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.viewport.offset = 0;
                self.layout_suggestion();
                self.ensure_active_visible();
                (Mode::Suggestion, Flow::Continue)
            }
            _ => {
                self.scroll_key(key);
                (Mode::Explained, Flow::Continue)
            }
        }
    }

    fn scroll_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Up) | (KeyModifiers::NONE, KeyCode::Char('k')) => self.viewport.scroll_up(1),
            (_, KeyCode::Down) | (KeyModifiers::NONE, KeyCode::Char('j')) => self.viewport.scroll_down(1),
            (_, KeyCode::PageUp) | (KeyModifiers::CONTROL, KeyCode::Char('u')) => self.viewport.page_up(),
            (_, KeyCode::PageDown) | (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
                self.viewport.page_down()
            }
            _ => {}
        }
    }

    fn cycle(&mut self, forward: bool) {
        if self.commands.len() < 2 {
            return;
        }
        if forward {
            self.commands.next();
        } else {
            self.commands.prev();
        }
        self.layout_suggestion();
        self.ensure_active_visible();
    }

    fn confirm_action(&mut self) -> (Mode, Flow) {
        match self.action {
            Action::Copy => {
                let Some(command) = self.commands.active_command().map(str::to_string) else {
                    return (Mode::Error(SessionError::NoCommandAvailable), Flow::Continue);
                };
                match self.clipboard.write(&command) {
                    Ok(()) => {
                        tracing::info!("copied command to clipboard");
                        self.spawn_timer(COPIED_DELAY, UiEvent::CopiedTimeout);
                        (Mode::Copied, Flow::Continue)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "clipboard write failed");
                        (Mode::Error(e), Flow::Continue)
                    }
                }
            }
            Action::Explain => {
                let target = self
                    .commands
                    .active_command()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.raw_response.clone());
                self.spawn_explain(target);
                (Mode::Loading(LoadingKind::Explain), Flow::Continue)
            }
            Action::Refine => {
                if self.commands.is_empty() {
                    return (Mode::Error(SessionError::NoCommandAvailable), Flow::Continue);
                }
                (Mode::Refining(Prompt::default()), Flow::Continue)
            }
            Action::Cancel => (Mode::Suggestion, Flow::Quit),
        }
    }
}

// ── PermissionDenied ──────────────────────────────────────────────────────────

fn permission_key(file: FilePrompt, path: String, reading: bool, key: KeyEvent) -> (Mode, Flow) {
    if reading {
        return (
            Mode::PermissionDenied {
                file,
                path,
                reading,
            },
            Flow::Continue,
        );
    }
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            let flow = Flow::Suspend(path.clone());
            (
                Mode::PermissionDenied {
                    file,
                    path,
                    reading: true,
                },
                flow,
            )
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => (Mode::FilePrompt(file), Flow::Continue),
        _ => (
            Mode::PermissionDenied {
                file,
                path,
                reading,
            },
            Flow::Continue,
        ),
    }
}

/// Live completion while typing. An unlistable directory just empties the list.
fn refresh_matches(file: &mut FilePrompt) {
    match completion::complete(file.field.text()) {
        Ok(matches) => file.matches = matches,
        Err(e) => {
            tracing::debug!(error = %e, "no completions");
            file.matches.clear();
        }
    }
    file.match_index = 0;
}
