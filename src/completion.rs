/// Filesystem path completion for the attach-file prompt.
///
/// Stateless: safe to call on every keystroke. The caller keeps the cursor
/// into the returned candidates.
use std::fs;
use std::path::MAIN_SEPARATOR;

use crate::error::SessionError;

/// List candidates for a partially typed path.
///
/// A name matches when it contains the typed fragment, ignoring case. Hidden
/// entries are only offered when the fragment itself starts with `.`.
/// Directories carry a trailing separator so completion can continue inside.
pub fn complete(partial: &str) -> Result<Vec<String>, SessionError> {
    let expanded = expand_tilde(partial);
    let (dir, fragment) = split_partial(&expanded);
    let list_dir = if dir.is_empty() { "." } else { dir };

    let entries = fs::read_dir(list_dir).map_err(|e| SessionError::DirectoryUnreadable {
        path: list_dir.to_string(),
        message: e.to_string(),
    })?;

    let show_hidden = fragment.starts_with('.');
    let needle = fragment.to_lowercase();

    let mut found: Vec<(String, bool)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !show_hidden {
                return None;
            }
            if !name.to_lowercase().contains(&needle) {
                return None;
            }
            Some((name, entry.path().is_dir()))
        })
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(found
        .into_iter()
        .map(|(name, is_dir)| {
            let mut candidate = format!("{dir}{name}");
            if is_dir {
                candidate.push(MAIN_SEPARATOR);
            }
            candidate
        })
        .collect())
}

/// Split into the directory part (with its trailing separator) and the
/// name fragment after it.
fn split_partial(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_tilde(path: &str) -> String {
    let Ok(home) = std::env::var("HOME") else {
        return path.to_string();
    };
    if path == "~" {
        format!("{}/", home.trim_end_matches('/'))
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{rest}", home.trim_end_matches('/'))
    } else {
        path.to_string()
    }
}
