//! # troupe-agent
//!
//! Troupe binary. `serve` exposes one script session over HTTP; `play`
//! runs it interactively in the terminal.

#![deny(unsafe_code)]

mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use troupe_llm_openai::{ChatCompletionsConfig, ChatCompletionsFactory};
use troupe_runtime::{RuntimeConfig, ScriptSession, SessionHandle};
use troupe_server::{ServerConfig, TroupeServer};
use troupe_settings::TroupeSettings;

use crate::terminal::TerminalInput;

/// Multi-character scripted conversations.
#[derive(Parser, Debug)]
#[command(name = "troupe-agent", about = "Multi-character scripted conversations")]
struct Cli {
    /// Settings file (defaults to `~/.troupe/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Serve the HTTP bridge.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides settings, 0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Play a scene in the terminal.
    Play {
        /// Rounds to run (clamped to the configured maximum).
        #[arg(long)]
        rounds: Option<u32>,

        /// Scene description; read from stdin when omitted.
        #[arg(long)]
        scene: Option<String>,
    },
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(troupe_settings::settings_path)
    }
}

/// Build the session every surface drives, one generator per credential.
fn build_session(settings: &TroupeSettings) -> Result<SessionHandle> {
    let config = ChatCompletionsConfig {
        base_url: settings.api.base_url.clone(),
        model: settings.api.model.clone(),
        timeout_ms: settings.api.timeout_ms,
    };
    let factory = ChatCompletionsFactory::new(config).context("Failed to build HTTP client")?;
    let session = ScriptSession::new(
        RuntimeConfig::from(settings),
        settings.api.credential_tokens(),
        Arc::new(factory),
    )
    .context("Failed to create session")?;
    Ok(SessionHandle::new(session))
}

async fn serve(
    settings: &TroupeSettings,
    session: SessionHandle,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = ServerConfig::from_settings(settings);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let server = TroupeServer::new(config, session);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Troupe listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.stop(handle).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn play(
    settings: &TroupeSettings,
    session: SessionHandle,
    rounds: Option<u32>,
    scene: Option<String>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input = TerminalInput::new(lines, settings.script.human_name.clone(), cancel.clone());

    let scene = match scene {
        Some(scene) => scene,
        None => {
            println!("请描述场景：");
            input.read_line().await.unwrap_or_default()
        }
    };
    println!("正在生成剧本……");
    let outcome = session
        .build_scenario(&scene)
        .await
        .context("Failed to build scenario")?;
    terminal::print_scenario(&outcome);
    println!("输入台词发言，直接回车跳过，输入 quit 退出。\n");

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let rounds = settings.script.clamp_rounds(rounds);
    let summary = session
        .run_rounds(rounds, &mut input, &cancel)
        .await
        .context("Conversation failed")?;
    watcher.abort();

    terminal::print_summary(&summary);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings first: the log level comes from them.
    let path = cli.settings_path();
    let settings = troupe_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    troupe_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    settings.validate().context("Invalid settings")?;

    let session = build_session(&settings)?;
    tracing::info!(
        session_id = %session.id(),
        model = %settings.api.model,
        credentials = settings.api.credentials.len(),
        "session ready"
    );

    match cli.command {
        Command::Serve { host, port } => serve(&settings, session, host, port).await,
        Command::Play { rounds, scene } => play(&settings, session, rounds, scene).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults_to_settings() {
        let cli = Cli::parse_from(["troupe-agent", "serve"]);
        assert_eq!(cli.command, Command::Serve { host: None, port: None });
        assert!(cli.settings_path().ends_with(".troupe/settings.json"));
    }

    #[test]
    fn serve_overrides() {
        let cli = Cli::parse_from(["troupe-agent", "serve", "--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(
            cli.command,
            Command::Serve {
                host: Some("0.0.0.0".into()),
                port: Some(8080)
            }
        );
    }

    #[test]
    fn play_rounds_and_global_settings() {
        let cli = Cli::parse_from([
            "troupe-agent",
            "play",
            "--rounds",
            "3",
            "--settings",
            "/tmp/troupe.json",
        ]);
        assert_eq!(cli.settings_path(), PathBuf::from("/tmp/troupe.json"));
        assert_eq!(
            cli.command,
            Command::Play {
                rounds: Some(3),
                scene: None
            }
        );
    }

    #[test]
    fn subcommand_required() {
        assert!(Cli::try_parse_from(["troupe-agent"]).is_err());
    }

    #[test]
    fn build_session_from_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"api":{"credentials":["sk-file-1","sk-file-2"]},"script":{"humanName":"旅人"}}"#,
        )
        .unwrap();
        let settings = troupe_settings::loader::read_settings_file(&path).unwrap();
        settings.validate().unwrap();
        assert!(build_session(&settings).is_ok());
    }

    #[test]
    fn build_session_without_credentials_fails() {
        let settings = TroupeSettings::default();
        assert!(build_session(&settings).is_err());
    }
}
