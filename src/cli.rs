//! Command-line entry points: HTTP server, terminal chat and one-off translation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::agent::{TurnController, TurnOutcome};
use crate::catalog::Severity;
use crate::config::Config;
use crate::session::{ChatSession, Role};

/// EvrimaBot: a Twi-speaking assistant backed by hosted LLM and speech services.
#[derive(Parser, Debug)]
#[command(name = "evrimabot", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long = "log-json", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the session API over HTTP.
    Serve {
        /// Address to bind (overrides `server.bind`).
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides `server.port`).
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },
    /// Chat in the terminal.
    Chat,
    /// Translate Twi text once and exit.
    Translate {
        text: String,
        /// Target language (defaults to `chat.translation_target`).
        #[arg(long)]
        to: Option<String>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let controller = Arc::new(TurnController::from_config(&config)?);
            crate::server::serve(&config.server, controller).await
        }
        Command::Chat => {
            let controller = TurnController::from_config(&config)?;
            chat(&controller).await
        }
        Command::Translate { text, to } => {
            let controller = TurnController::from_config(&config)?;
            let target = to.as_deref().unwrap_or(controller.translation_target());
            match controller.translator().try_translate(&text, target).await {
                Ok(translated) => {
                    println!("{translated}");
                    Ok(())
                }
                Err(e) => {
                    eprintln!(
                        "{}",
                        controller
                            .catalog()
                            .message(crate::catalog::ErrorKind::TranslationFailed)
                    );
                    Err(anyhow!(e).context("translation failed"))
                }
            }
        }
    }
}

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Text(String),
    Voice(PathBuf),
    Translate(usize),
    History,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(ReplCommand::Text(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        Some(match name {
            "quit" | "exit" => ReplCommand::Quit,
            "history" => ReplCommand::History,
            "help" => ReplCommand::Help,
            "voice" if !arg.is_empty() => ReplCommand::Voice(PathBuf::from(arg)),
            "voice" => ReplCommand::Invalid("usage: /voice <audio file>".to_string()),
            "translate" => match arg.parse() {
                Ok(index) => ReplCommand::Translate(index),
                Err(_) => ReplCommand::Invalid("usage: /translate <message index>".to_string()),
            },
            other => ReplCommand::Invalid(format!("unknown command /{other} (try /help)")),
        })
    }
}

const HELP: &str = "\
Type a message in Twi or English and press Enter.
  /voice <file>        send a recorded audio file
  /translate <index>   show or hide the translation of a reply
  /history             print the conversation with message indexes
  /quit                leave";

async fn chat(controller: &TurnController) -> Result<()> {
    for kind in controller.speech().warm_up().await {
        eprintln!("! {}", controller.catalog().message(kind));
    }

    let mut session = controller.new_session();
    if let Some(greeting) = controller.greeting() {
        println!("EvrimaBot: {greeting}");
    }
    println!("(/help for commands)");

    let mut rl = DefaultEditor::new().context("failed to start line editor")?;
    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };
        let _ = rl.add_history_entry(line.trim());
        debug!(?command, "repl input");

        match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Invalid(msg) => eprintln!("{msg}"),
            ReplCommand::History => print_history(&session),
            ReplCommand::Text(text) => match controller.submit_text(&mut session, &text).await {
                Ok(outcome) => print_outcome(&session, &outcome),
                Err(e) => eprintln!("{e}"),
            },
            ReplCommand::Voice(path) => {
                let audio = match tokio::fs::read(&path).await {
                    Ok(audio) => audio,
                    Err(e) => {
                        eprintln!("cannot read {}: {e}", path.display());
                        continue;
                    }
                };
                match controller.submit_voice(&mut session, &audio).await {
                    Ok(outcome) => {
                        if let Some(index) = outcome.user_index {
                            let heard = session.conversation().get(index).map(|m| m.content.as_str());
                            println!("You (voice): {}", heard.unwrap_or_default());
                        }
                        print_outcome(&session, &outcome);
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            ReplCommand::Translate(index) => {
                match controller.toggle_translation(&mut session, index).await {
                    Ok(view) => match view.text {
                        Some(text) => println!("[{index}] {text}"),
                        None => println!("[{index}] translation hidden"),
                    },
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }
    session.discard_audio().await;
    Ok(())
}

fn print_outcome(session: &ChatSession, outcome: &TurnOutcome) {
    for notice in &outcome.notices {
        let tag = match notice.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!("! {tag}: {}", notice.message);
    }
    let Some(index) = outcome.reply_index else {
        return;
    };
    if let Some(reply) = session.conversation().get(index) {
        if reply.failure.is_none() {
            println!("EvrimaBot [{index}]: {}", reply.content);
        }
        if let Some(audio) = &reply.audio {
            println!("  audio: {}", audio.display());
        }
    }
}

fn print_history(session: &ChatSession) {
    for (index, message) in session.conversation().messages().iter().enumerate() {
        let who = match message.role {
            Role::User => "You",
            Role::Assistant => "EvrimaBot",
        };
        println!("[{index}] {who}: {}", message.content);
        if session.translations().is_visible(index) {
            if let Some(text) = session.translations().cached(index) {
                println!("      {text}");
            }
        }
    }
}
