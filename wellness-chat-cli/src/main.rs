mod render;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use render::{render_result, TranscriptPrinter};
use serde_json::json;
use std::io::Write;
use wellness_sdk_rs::normalize::normalize_markup;
use wellness_sdk_rs::{logger, ChatSession, ClientConfig, TurnOutcome};

/// Wellness assistant chat client
#[derive(Parser)]
#[command(name = "wellness-chat")]
#[command(about = "Ask the multi-agent wellness backend for guidance", long_about = None)]
struct Cli {
    /// Backend base URL [default: http://localhost:5000]
    #[arg(long, global = true, env = "WELLNESS_API_BASE_URL")]
    base_url: Option<String>,

    /// User id sent with every request [default: anonymous]
    #[arg(long, global = true, env = "WELLNESS_USER_ID")]
    user_id: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream guidance for a set of symptoms
    ///
    /// Agent output is printed live as it arrives. Ctrl-C stops the turn
    /// and keeps whatever was received.
    Ask {
        /// Symptoms to describe
        #[arg(short, long)]
        symptoms: String,

        /// Optional medical report text
        #[arg(short, long, default_value = "")]
        report: String,

        /// Print the final state as JSON instead of live output
        #[arg(long)]
        json: bool,
    },

    /// Ask a follow-up question about the latest guidance
    FollowUp {
        #[arg(short, long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logger::init_logging(match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    });

    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config = config.with_api_base_url(base_url);
    }
    if let Some(user_id) = cli.user_id {
        config = config.with_user_id(user_id);
    }
    tracing::info!("Using backend {} as {}", config.api_base_url, config.user_id);

    let session = ChatSession::from_config(&config);
    match cli.command {
        Commands::Ask {
            symptoms,
            report,
            json,
        } => ask(session, symptoms, report, json).await,
        Commands::FollowUp { question } => follow_up(session, &question).await,
    }
}

async fn ask(session: ChatSession, symptoms: String, report: String, json: bool) -> Result<()> {
    let mut updates = session.subscribe().await;
    let mut printer = TranscriptPrinter::new();
    let mut stdout = std::io::stdout();

    let mut turn = tokio::spawn({
        let session = session.clone();
        async move { session.submit(&symptoms, &report).await }
    });

    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome?,
            Some(state) = updates.recv() => {
                if !json {
                    write!(stdout, "{}", printer.render(&state))?;
                    stdout.flush()?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cancelling turn");
                session.cancel().await;
            }
        }
    };

    while let Ok(state) = updates.try_recv() {
        if !json {
            write!(stdout, "{}", printer.render(&state))?;
        }
    }

    let state = session.snapshot().await;
    if json {
        let dump = json!({ "outcome": outcome, "state": state });
        writeln!(stdout, "{}", serde_json::to_string_pretty(&dump)?)?;
    } else {
        writeln!(stdout)?;
        write!(stdout, "{}", render_result(&state))?;
    }
    stdout.flush()?;

    match outcome {
        TurnOutcome::Failed | TurnOutcome::Rejected => bail!("{}", state.status_message),
        TurnOutcome::Cancelled => {
            eprintln!("{}", "Cancelled.".yellow());
            Ok(())
        }
        TurnOutcome::Completed | TurnOutcome::CompletedViaFallback => Ok(()),
    }
}

async fn follow_up(session: ChatSession, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }
    let state = session.ask_follow_up(question).await;
    if !state.status_message.is_empty() {
        bail!("{}", state.status_message);
    }
    println!("{}", normalize_markup(&state.answer));
    Ok(())
}
