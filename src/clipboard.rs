use std::io::Write;
use std::process::{Command, Stdio};

use arboard::Clipboard as ArboardClipboard;

use crate::error::SessionError;

/// Where a copied command goes.
pub trait ClipboardSink: Send {
    fn write(&mut self, text: &str) -> Result<(), SessionError>;
}

/// The desktop clipboard: the detected command-line tool first, then arboard.
pub struct SystemClipboard {
    tool: Option<String>,
    /// On X11 and Wayland the copied text is served by its owner, so the
    /// arboard handle lives as long as the session does.
    held: Option<ArboardClipboard>,
}

impl SystemClipboard {
    /// `tool` is the binary name found during context detection, if any.
    pub fn new(tool: Option<String>) -> Self {
        Self { tool, held: None }
    }
}

impl ClipboardSink for SystemClipboard {
    fn write(&mut self, text: &str) -> Result<(), SessionError> {
        if let Some(tool) = &self.tool {
            match pipe_to_tool(tool, text) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(%tool, error = %e, "clipboard tool failed, trying arboard"),
            }
        }
        let clipboard = match self.held.take() {
            Some(clipboard) => clipboard,
            None => ArboardClipboard::new()
                .map_err(|e| SessionError::ClipboardUnavailable(e.to_string()))?,
        };
        self.held
            .insert(clipboard)
            .set_text(text.to_string())
            .map_err(|e| SessionError::ClipboardUnavailable(e.to_string()))
    }
}

fn tool_args(tool: &str) -> &'static [&'static str] {
    match tool {
        "xclip" => &["-selection", "clipboard"],
        _ => &[],
    }
}

fn pipe_to_tool(tool: &str, text: &str) -> std::io::Result<()> {
    let mut child = Command::new(tool)
        .args(tool_args(tool))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("{tool} exited with {status}")))
    }
}
