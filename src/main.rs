mod assistant;
mod client;
mod clipboard;
mod completion;
mod config;
mod context;
mod elevated;
mod error;
mod extract;
mod tui;

use std::io::{IsTerminal, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use assistant::Assistant;
use client::{Client, ProviderKind, QueryBackend};
use clipboard::SystemClipboard;
use config::{ConfigFile, ResolvedConfig};
use context::SystemContext;
use tui::AttachedContext;

#[derive(Parser, Debug)]
#[command(
    name = "huh",
    about = "Ask for a shell command in plain words, inspect it, refine it, copy it",
    long_about = None,
)]
struct Args {
    /// What you want to do (omit to type it in the prompt)
    question: Vec<String>,

    /// Attach a file as context (repeatable)
    #[arg(short, long = "file", value_name = "PATH")]
    files: Vec<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "HUH_PROFILE")]
    profile: Option<String>,

    /// Override provider: ollama, openai or openrouter
    #[arg(long, env = "HUH_PROVIDER", value_parser = parse_provider)]
    provider: Option<ProviderKind>,

    /// Override endpoint URL
    #[arg(long, env = "HUH_ENDPOINT")]
    endpoint: Option<String>,

    /// Override model name
    #[arg(short, long, env = "HUH_MODEL")]
    model: Option<String>,

    /// Override API key
    #[arg(long, env = "HUH_API_KEY")]
    api_key: Option<String>,

    /// Write a default config file to ~/.config/huh/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(s).ok_or_else(|| format!("unknown provider '{s}' (ollama, openai, openrouter)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: huh");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.provider,
        args.endpoint.as_deref(),
        args.model.as_deref(),
        args.api_key.as_deref(),
    );
    tracing::info!(
        profile = %resolved.profile_name,
        provider = resolved.provider.as_str(),
        model = %resolved.model,
        "starting session"
    );

    let backend = Client::from_config(&resolved)?;
    tracing::debug!(backend = backend.name(), endpoint = %resolved.endpoint, "backend ready");
    let system = SystemContext::detect(&resolved.context);
    let clipboard = SystemClipboard::new(system.clipboard.clone());
    let assistant = Arc::new(Assistant::new(Arc::new(backend), system));

    let context = gather_attachments(&args.files)?;
    let question = args.question.join(" ");

    tui::run(
        question,
        context,
        assistant,
        Box::new(clipboard),
        resolved.elevate_command,
    )
    .await
}

// ── Startup attachments ───────────────────────────────────────────────────────

/// Read `-f` files and piped stdin. Unreadable files are reported and skipped.
fn gather_attachments(files: &[String]) -> Result<AttachedContext> {
    let mut context = AttachedContext::default();

    for path in files {
        match std::fs::read(path) {
            Ok(bytes) => context.attach_file(path, &String::from_utf8_lossy(&bytes)),
            Err(e) => {
                tracing::warn!(%path, error = %e, "skipping attachment");
                eprintln!("huh: skipping {path}: {e}");
            }
        }
    }

    let mut stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut piped = String::new();
        stdin
            .read_to_string(&mut piped)
            .context("failed to read piped stdin")?;
        if !piped.is_empty() {
            context.attach_stdin(&piped);
        }
    }

    Ok(context)
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Log to `<config dir>/huh.log`; the TUI owns the terminal. Never fatal.
fn init_logging() {
    let log_dir = config::config_dir();
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let Ok(log_file) = std::fs::File::create(log_dir.join("huh.log")) else {
        return;
    };

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("HUH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

// ── Profile listing ───────────────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(&String, &config::Profile)> = file.profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    println!();
    println!("  Profiles");
    if entries.is_empty() {
        println!("  (none configured, using built-in ollama defaults; run `huh --init`)");
    }
    for (name, p) in entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        let endpoint = p
            .endpoint
            .as_deref()
            .unwrap_or_else(|| p.provider.default_endpoint());
        println!("  {name}{marker}");
        println!("    provider  {}", p.provider.as_str());
        println!("    endpoint  {endpoint}");
        println!("    model     {}", p.model);
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        _ => anyhow::bail!("unknown shell: {shell_name} (supported: bash, zsh, fish, elvish)"),
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "huh", &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_question_and_files() {
        let args = Args::try_parse_from(["huh", "-f", "a.log", "--file", "b.log", "why", "is", "it", "slow"])
            .unwrap();
        assert_eq!(args.question.join(" "), "why is it slow");
        assert_eq!(args.files, vec!["a.log", "b.log"]);
    }

    #[test]
    fn test_provider_flag_is_validated() {
        let args = Args::try_parse_from(["huh", "--provider", "OpenRouter"]).unwrap();
        assert_eq!(args.provider, Some(ProviderKind::OpenRouter));
        assert!(Args::try_parse_from(["huh", "--provider", "bard"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_unknown_shell_is_error() {
        assert!(generate_completions("powershell-ish").is_err());
    }
}
