/// Snapshot of the user's environment, taken once at startup and folded into
/// every system prompt.
use std::collections::BTreeMap;
use std::fs;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemContext {
    pub os: String,
    pub distro: String,
    pub shell: String,
    pub package_manager: String,
    /// Clipboard tool found on PATH ("wl-copy", "xclip", "pbcopy"), if any
    pub clipboard: Option<String>,
    /// Free-form `key: value` facts from the `[context]` config table
    pub preferences: Vec<(String, String)>,
}

impl SystemContext {
    /// Detect the environment, then apply config overrides. Called once.
    pub fn detect(overrides: &BTreeMap<String, String>) -> Self {
        let os = std::env::consts::OS.to_string();
        let (distro, package_manager) = if os == "linux" {
            (distro_name(), detect_package_manager())
        } else {
            (os.clone(), "unknown".to_string())
        };
        let shell = shell_name(std::env::var("SHELL").ok().as_deref());

        let detected = Self {
            clipboard: detect_clipboard(),
            os,
            distro,
            shell,
            package_manager,
            preferences: Vec::new(),
        };
        let ctx = detected.with_overrides(overrides);
        tracing::info!(
            os = %ctx.os,
            distro = %ctx.distro,
            shell = %ctx.shell,
            package_manager = %ctx.package_manager,
            "system context"
        );
        ctx
    }

    /// Merge the `[context]` table: `shell` and `distro` replace the detected
    /// values, everything else becomes a preference.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (key, value) in overrides {
            match key.as_str() {
                "shell" => self.shell = value.clone(),
                "distro" => self.distro = value.clone(),
                _ => self.preferences.push((key.clone(), value.clone())),
            }
        }
        self
    }
}

/// `/bin/fish` → `fish`. Falls back to bash when `$SHELL` is unset.
fn shell_name(shell: Option<&str>) -> String {
    let raw = shell.filter(|s| !s.is_empty()).unwrap_or("bash");
    raw.rsplit('/').next().unwrap_or(raw).to_string()
}

fn distro_name() -> String {
    match fs::read_to_string("/etc/os-release") {
        Ok(content) => parse_os_release(&content),
        Err(_) => "linux (unknown)".to_string(),
    }
}

fn parse_os_release(content: &str) -> String {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "linux".to_string())
}

fn detect_package_manager() -> String {
    ["pacman", "apt", "dnf"]
        .into_iter()
        .find(|pm| which_binary(pm))
        .unwrap_or("unknown")
        .to_string()
}

fn detect_clipboard() -> Option<String> {
    if std::env::var("WAYLAND_DISPLAY").is_ok_and(|v| !v.is_empty()) && which_binary("wl-copy") {
        return Some("wl-copy".to_string());
    }
    ["xclip", "pbcopy"]
        .into_iter()
        .find(|tool| which_binary(tool))
        .map(str::to_string)
}

/// Check if a binary exists in PATH.
fn which_binary(name: &str) -> bool {
    std::process::Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
