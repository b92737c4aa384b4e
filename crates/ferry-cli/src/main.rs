use anyhow::Result;
use clap::{Parser, Subcommand};
use ferry_execution::LogFormat;
use ferry_interaction::ProviderKind;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "FERRY - response policy engine for chat personas", long_about = None)]
struct Cli {
    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSONL transcript through the engine and print one decision per message
    Replay {
        /// Persona configuration (TOML)
        #[arg(long)]
        persona: PathBuf,
        /// Transcript with one JSON message per line
        #[arg(long)]
        transcript: PathBuf,
        /// Scripted replies instead of a model, separated by blank lines
        #[arg(long, conflicts_with = "provider")]
        script: Option<PathBuf>,
        /// Generation backend (deepseek, chatglm, openai, ollama)
        #[arg(long, default_value = "deepseek")]
        provider: ProviderKind,
        /// Decide the whole transcript as one cycle
        #[arg(long)]
        batch: bool,
        /// Print decision events to stderr
        #[arg(long)]
        trace: bool,
    },
    /// Validate a persona configuration and print its effective values
    CheckConfig {
        #[arg(long)]
        persona: PathBuf,
    },
    /// Show how a reply would be classified and formatted
    Style {
        /// Text to classify and enforce
        text: String,
        /// Persona whose rules apply (defaults when omitted)
        #[arg(long)]
        persona: Option<PathBuf>,
        /// Message the reply answers; classification uses it instead of the text
        #[arg(long)]
        incoming: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            persona,
            transcript,
            script,
            provider,
            batch,
            trace,
        } => {
            let options = commands::replay::ReplayOptions {
                persona,
                transcript,
                script,
                provider,
                batch,
            };
            commands::replay::run(options, cli.log_format, trace).await?
        }
        Commands::CheckConfig { persona } => {
            ferry_execution::init_logging(cli.log_format)?;
            commands::check::run(&persona)?
        }
        Commands::Style {
            text,
            persona,
            incoming,
        } => {
            ferry_execution::init_logging(cli.log_format)?;
            commands::style::run(&text, persona.as_deref(), incoming.as_deref())?
        }
    }

    Ok(())
}
