//! sqlchat CLI: ask questions about the firm directory in plain English.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sqlchat::telemetry::{init_tracing, LogFormat};
use sqlchat::{ChatSession, Config, EmptyResultPolicy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqlchat")]
#[command(about = "Conversational SQL over the firm directory", long_about = None)]
struct Cli {
    /// Config file (default: ~/.sqlchat/config.json)
    #[arg(long, env = "SQLCHAT_CONFIG")]
    config: Option<String>,

    /// Postgres connection string (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Completion model (overrides SQLCHAT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Conversation entries fed to the SQL prompt
    #[arg(long)]
    history_window: Option<usize>,

    /// What to do when a query returns no rows (synthesize or canned)
    #[arg(long, value_parser = parse_empty_result)]
    empty_result: Option<EmptyResultPolicy>,

    /// Log format (text or json)
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Ask these questions in order and exit instead of starting the prompt
    #[arg(long, short)]
    ask: Vec<String>,

    /// Write the conversation transcript as JSON on exit
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Do not print generated SQL
    #[arg(long)]
    hide_sql: bool,
}

fn parse_empty_result(value: &str) -> std::result::Result<EmptyResultPolicy, String> {
    match value {
        "synthesize" => Ok(EmptyResultPolicy::Synthesize),
        "canned" => Ok(EmptyResultPolicy::Canned),
        other => Err(format!("unknown policy '{}' (expected synthesize or canned)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(model) = cli.model {
        config.set_model(model);
    }
    if let Some(window) = cli.history_window {
        config.history_window = Some(window);
    }
    if let Some(policy) = cli.empty_result {
        config.empty_result = policy;
    }

    let mut session = ChatSession::connect(&config)
        .await
        .context("failed to start session")?;

    if let Some(greeting) = session.conversation().last() {
        println!("{} {}", "assistant>".cyan().bold(), greeting.text());
    }

    let all_ok = if cli.ask.is_empty() {
        interactive(&mut session, !cli.hide_sql).await?;
        true
    } else {
        let mut all_ok = true;
        for question in &cli.ask {
            println!("{} {}", "you>".green().bold(), question);
            all_ok &= ask(&mut session, question, !cli.hide_sql).await;
        }
        all_ok
    };

    if let Some(path) = &cli.transcript {
        std::fs::write(path, session.conversation().to_json()?)
            .with_context(|| format!("failed to write transcript to {}", path.display()))?;
        println!("{} {}", "Transcript written to".dimmed(), path.display());
    }

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn interactive(session: &mut ChatSession, show_sql: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let prompt = format!("{} ", "you>".green().bold());

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "exit" | "quit" | "\\q") {
                    break;
                }
                let _ = rl.add_history_entry(line);
                ask(session, line, show_sql).await;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Run one turn and print it. Returns whether the turn succeeded.
async fn ask(session: &mut ChatSession, question: &str, show_sql: bool) -> bool {
    match session.handle_turn(question).await {
        Ok(turn) => {
            if show_sql {
                println!("{} {}", "sql>".dimmed(), turn.query.as_str().yellow());
            }
            println!("{} {}", "assistant>".cyan().bold(), turn.answer);
            true
        }
        Err(err) => {
            if let (true, Some(sql)) = (show_sql, err.query()) {
                println!("{} {}", "sql>".dimmed(), sql.yellow());
            }
            eprintln!("{} {}", "error:".red().bold(), err);
            false
        }
    }
}
