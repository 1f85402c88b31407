//! Conductor - line-oriented shell for the orchestration core
//!
//! Reads operator input from stdin. Slash commands drive plan mode and
//! workflows; everything else goes to the model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use conductor_core::orchestrator::LanguageModel;
use conductor_core::plan::OperatingMode;
use conductor_core::{paths, ConductorConfig, Session};

mod dry_run;
mod replay;

use dry_run::DryRunExecutor;
use replay::{EchoModel, ReplayModel};

/// Conductor - agent orchestration shell
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Plan mode, gated workflows, tool hooks and review agents", long_about = None)]
struct Cli {
    /// Config file (default ~/.conductor/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Claude-style hooks.json to merge; default searches .claude/hooks
    #[arg(long)]
    hooks_json: Option<PathBuf>,

    /// JSON array of canned model responses
    #[arg(long)]
    replay: Option<PathBuf>,

    #[arg(long)]
    session_id: Option<String>,

    /// Start in plan mode
    #[arg(long)]
    plan: bool,
}

fn init_logging() -> Result<()> {
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join("conductor.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to create log file: {}, falling back to null device", e);
            std::fs::File::create(null_device)?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn load_config(cli: &Cli, working_dir: &Path) -> Result<ConductorConfig> {
    let path = cli.config.clone().unwrap_or_else(paths::config_file);
    let mut config = ConductorConfig::load(&path).await?;

    match &cli.hooks_json {
        Some(path) => {
            if config.merge_hooks_json(path).await? == 0 {
                eprintln!("warning: no command hooks found in {}", path.display());
            }
        }
        None => {
            for candidate in paths::hooks_json_candidates(working_dir) {
                config.merge_hooks_json(&candidate).await?;
            }
        }
    }
    Ok(config)
}

async fn build_model(cli: &Cli) -> Result<Arc<dyn LanguageModel>> {
    Ok(match &cli.replay {
        Some(path) => Arc::new(ReplayModel::load(path).await?),
        None => Arc::new(EchoModel),
    })
}

async fn print_pending(session: &mut Session, out: &mut tokio::io::Stdout) -> Result<()> {
    for note in session.pop_notifications() {
        out.write_all(format!("{note}\n").as_bytes()).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let working_dir = std::env::current_dir()?;
    let config = load_config(&cli, &working_dir).await?;
    let session_id = cli
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let model = build_model(&cli).await?;

    let mut session = Session::from_config(&config, session_id, model, Arc::new(DryRunExecutor))?;
    if cli.plan {
        session = session.with_mode(OperatingMode::Plan);
    }
    let (pre, post) = session.hooks().hook_names();
    tracing::info!(
        session = session.id(),
        pre_hooks = pre.len(),
        post_hooks = post.len(),
        "Session started"
    );

    let mut out = tokio::io::stdout();
    out.write_all(b"conductor ready. /help lists commands, /quit exits.\n")
        .await?;
    out.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if matches!(line, "/quit" | "/exit") {
            break;
        }

        let result = session.handle_input(line).await;
        print_pending(&mut session, &mut out).await?;
        match result {
            Ok(turn) => {
                for reply in turn.replies {
                    out.write_all(format!("{reply}\n").as_bytes()).await?;
                }
            }
            Err(e) => {
                tracing::debug!(kind = ?e.kind(), "Input rejected");
                out.write_all(format!("error: {e}\n").as_bytes()).await?;
            }
        }
        out.flush().await?;
    }

    tracing::info!(session = session.id(), "Session ended");
    Ok(())
}
