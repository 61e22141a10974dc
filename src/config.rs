use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use crate::client::ProviderKind;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Which API dialect to speak: "ollama", "openai" or "openrouter"
    #[serde(default)]
    pub provider: ProviderKind,
    /// Base URL. Defaults to the provider's public endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Sent as a Bearer token. Required for openai and openrouter.
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "llama3:8b".to_string()
}

fn default_model_for(provider: ProviderKind) -> String {
    match provider {
        ProviderKind::Ollama => default_model(),
        ProviderKind::OpenAi => "gpt-4-turbo".to_string(),
        ProviderKind::OpenRouter => "openai/gpt-4o-mini".to_string(),
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            endpoint: None,
            model: default_model(),
            api_key: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    /// Command prefix used to read files the current user cannot open
    #[serde(default = "default_elevate_command")]
    pub elevate_command: Vec<String>,

    /// Per-request timeout for model queries
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra facts for the system prompt. `shell` and `distro` override
    /// detection; every other key is passed along as a user preference.
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "local".to_string()
}

fn default_elevate_command() -> Vec<String> {
    vec!["sudo".to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            elevate_command: default_elevate_command(),
            timeout_secs: default_timeout_secs(),
            context: BTreeMap::new(),
            profiles: HashMap::new(),
        }
    }
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
    pub timeout_secs: u64,
    pub elevate_command: Vec<String>,
    pub context: BTreeMap<String, String>,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        provider_override: Option<ProviderKind>,
        endpoint_override: Option<&str>,
        model_override: Option<&str>,
        api_key_override: Option<&str>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        let provider = provider_override.unwrap_or(base.provider);
        let same_provider = provider == base.provider;

        let endpoint = endpoint_override
            .map(str::to_string)
            .or(if same_provider { base.endpoint } else { None })
            .unwrap_or_else(|| provider.default_endpoint().to_string());

        let model = model_override.map(str::to_string).unwrap_or_else(|| {
            if same_provider {
                base.model
            } else {
                default_model_for(provider)
            }
        });

        Self {
            provider,
            endpoint,
            model,
            api_key: api_key_override.map(str::to_string).or(base.api_key),
            profile_name,
            timeout_secs: file.timeout_secs,
            elevate_command: file.elevate_command.clone(),
            context: file.context.clone(),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("huh")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# huh configuration
# Run `huh --init` to regenerate this file.

default_profile = "local"

# Prefix used to read files you lack permission for (after you confirm).
elevate_command = ["sudo"]

# Seconds to wait for a model answer.
timeout_secs = 30

# ── Extra context for every prompt ───────────────────────────────────────────
# `shell` and `distro` override what huh detects; anything else is passed to
# the model as a preference.
[context]
# shell      = "zsh"
# preference = "I hate nano, use vim."

# ── Local Ollama (default) ────────────────────────────────────────────────────
[profiles.local]
provider = "ollama"
endpoint = "http://localhost:11434"
model    = "llama3:8b"

# ── OpenAI ───────────────────────────────────────────────────────────────────
# [profiles.openai]
# provider = "openai"
# model    = "gpt-4-turbo"
# api_key  = "sk-..."

# ── OpenRouter ────────────────────────────────────────────────────────────────
# [profiles.openrouter]
# provider = "openrouter"
# model    = "openai/gpt-4o-mini"
# api_key  = "sk-or-..."
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let file = ConfigFile::parse(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_profile, "local");
        assert_eq!(file.elevate_command, vec!["sudo"]);
        assert_eq!(file.timeout_secs, 30);
        let local = file.resolve_profile(None).unwrap();
        assert_eq!(local.provider, ProviderKind::Ollama);
        assert_eq!(local.model, "llama3:8b");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = ConfigFile::parse("").unwrap();
        assert_eq!(file.default_profile, "local");
        assert!(file.profiles.is_empty());
        let resolved = ResolvedConfig::resolve(&file, None, None, None, None, None);
        assert_eq!(resolved.provider, ProviderKind::Ollama);
        assert_eq!(resolved.endpoint, "http://localhost:11434");
        assert_eq!(resolved.profile_name, "local");
    }

    #[test]
    fn test_cli_overrides_win() {
        let file = ConfigFile::parse(
            r#"
            [profiles.local]
            provider = "ollama"
            endpoint = "http://test:11434"
            model = "test-model"
            "#,
        )
        .unwrap();
        let resolved =
            ResolvedConfig::resolve(&file, None, None, None, Some("other-model"), None);
        assert_eq!(resolved.endpoint, "http://test:11434");
        assert_eq!(resolved.model, "other-model");
    }

    #[test]
    fn test_switching_provider_drops_profile_endpoint() {
        let file = ConfigFile::parse(
            r#"
            [profiles.local]
            endpoint = "http://test:11434"
            "#,
        )
        .unwrap();
        let resolved = ResolvedConfig::resolve(
            &file,
            None,
            Some(ProviderKind::OpenRouter),
            None,
            None,
            Some("sk-or"),
        );
        assert_eq!(resolved.endpoint, "https://openrouter.ai/api/v1");
        assert_eq!(resolved.model, "openai/gpt-4o-mini");
        assert_eq!(resolved.api_key.as_deref(), Some("sk-or"));
    }

    #[test]
    fn test_context_table_is_kept_in_order() {
        let file = ConfigFile::parse(
            r#"
            [context]
            shell = "zsh"
            editor = "vim"
            "#,
        )
        .unwrap();
        let keys: Vec<&String> = file.context.keys().collect();
        assert_eq!(keys, vec!["editor", "shell"]);
    }
}
