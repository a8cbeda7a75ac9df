use anyhow::{bail, Context, Result};
use cadence_conductor::{Echo, EventLog, Orchestrator};
use cadence_content::{ContentProvider, GeminiProvider, LocalProvider};
use cadence_core::config::GITHUB_TOKEN_ENV;
use cadence_core::{load_config, SimulationConfig, SimulationStatus};
use cadence_host::{GitHost, GitHubClient, MemoryHost};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub struct RunParams<'a> {
    pub config_path: &'a Path,
    pub dry_run: bool,
    pub json_events: bool,
    pub events: Option<&'a Path>,
}

/// Execute `cadence run <config>`
pub fn execute(params: RunParams<'_>) -> Result<()> {
    let config = load_config(params.config_path)
        .with_context(|| format!("loading {}", params.config_path.display()))?;

    let host = build_host(&config, params.dry_run)?;
    let content = build_provider(&config)?;

    let echo = if params.json_events {
        Echo::Json
    } else {
        Echo::Console
    };
    let mut log = EventLog::new().with_echo(echo);
    if let Some(path) = params.events {
        log = log.with_jsonl(path);
    }

    // Ctrl-C cancels whichever token the current start/resume is watching.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    ctrlc_cancel(Arc::clone(&current));
    let interactive = std::io::stdin().is_terminal();

    let rt = tokio::runtime::Runtime::new()?;
    let mut orchestrator = Orchestrator::new(host.as_ref(), content.as_ref()).with_event_log(log);

    let cancel = fresh_token(&current);
    let mut status = rt.block_on(orchestrator.start(config, cancel))?;
    while status == SimulationStatus::Paused && interactive {
        match prompt_paused() {
            PausedAction::Resume => {
                let cancel = fresh_token(&current);
                status = rt.block_on(orchestrator.resume(cancel))?;
            }
            PausedAction::Quit => break,
        }
    }

    if !params.json_events {
        let head = orchestrator
            .chain()
            .map(|c| c.short_head().to_string())
            .unwrap_or_default();
        println!(
            "\n{status}: {} commits created, head {head}",
            orchestrator.commits_created()
        );
    }
    Ok(())
}

fn build_host(config: &SimulationConfig, dry_run: bool) -> Result<Box<dyn GitHost>> {
    if dry_run {
        return Ok(Box::new(MemoryHost::with_branch(&config.branch)));
    }
    let Some(token) = config.resolve_github_token() else {
        bail!("no GitHub token: set github_token in the config or {GITHUB_TOKEN_ENV}");
    };
    Ok(Box::new(GitHubClient::from_config(config, &token)?))
}

fn build_provider(config: &SimulationConfig) -> Result<Box<dyn ContentProvider>> {
    if !config.use_ai {
        return Ok(Box::new(LocalProvider));
    }
    match config.resolve_api_key() {
        Some(key) => Ok(Box::new(GeminiProvider::new(&key)?)),
        None => {
            tracing::warn!("use_ai is set but no API key was found; using local content");
            Ok(Box::new(LocalProvider))
        }
    }
}

fn fresh_token(current: &Mutex<CancellationToken>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Ok(mut slot) = current.lock() {
        *slot = token.clone();
    }
    token
}

fn ctrlc_cancel(current: Arc<Mutex<CancellationToken>>) {
    let _ = ctrlc::set_handler(move || {
        if let Ok(token) = current.lock() {
            token.cancel();
        }
    });
}

#[derive(Debug, PartialEq)]
enum PausedAction {
    Resume,
    Quit,
}

fn parse_choice(input: &str) -> Option<PausedAction> {
    match input.trim().to_lowercase().as_str() {
        "r" | "resume" => Some(PausedAction::Resume),
        "q" | "quit" => Some(PausedAction::Quit),
        _ => None,
    }
}

fn prompt_paused() -> PausedAction {
    use std::io::{BufRead, Write};
    println!("\n  Simulation paused.\n");
    println!("  [R] Resume  [Q] Quit");
    loop {
        print!("  > ");
        let _ = std::io::stdout().flush();
        let mut input = String::new();
        match std::io::stdin().lock().read_line(&mut input) {
            Ok(0) | Err(_) => return PausedAction::Quit,
            _ => {}
        }
        match parse_choice(&input) {
            Some(action) => return action,
            None => println!("  Invalid choice. Enter R or Q."),
        }
    }
}
