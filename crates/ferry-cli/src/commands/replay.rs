use anyhow::{Context, Result};
use ferry_application::{Outbound, ResponsePolicyEngine};
use ferry_core::config::PersonaConfig;
use ferry_core::{Message, ResponseGenerator};
use ferry_execution::{DecisionEvent, LogFormat};
use ferry_interaction::{ProviderConfig, ProviderKind, ScriptedGenerator, build_generator};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub struct ReplayOptions {
    pub persona: PathBuf,
    pub transcript: PathBuf,
    pub script: Option<PathBuf>,
    pub provider: ProviderKind,
    pub batch: bool,
}

pub async fn run(options: ReplayOptions, log_format: LogFormat, trace: bool) -> Result<()> {
    let mut events = if trace {
        let (sender, receiver) = mpsc::unbounded_channel();
        ferry_execution::init_logging_with_events(log_format, sender)?;
        Some(receiver)
    } else {
        ferry_execution::init_logging(log_format)?;
        None
    };

    let template = PersonaConfig::load(&options.persona)
        .with_context(|| format!("Invalid persona {}", options.persona.display()))?;
    let config = template.for_partner(template.persona.partner.clone());
    let conversation = config.persona.partner.label().to_string();
    let generator = generator_for(&options)?;
    let messages = read_transcript(&options.transcript)?;
    tracing::info!(
        persona = %config.name(),
        generator = generator.name(),
        messages = messages.len(),
        "[Replay] Starting"
    );

    let mut engine = ResponsePolicyEngine::new(config, generator)?;
    if options.batch {
        for (message_id, decision) in engine.handle_batch(messages).await {
            print_outbound(&Outbound {
                conversation: conversation.clone(),
                message_id,
                decision,
            })?;
        }
        drain_events(&mut events)?;
    } else {
        for message in messages {
            let message_id = message.id().clone();
            let decision = engine.handle(message).await;
            print_outbound(&Outbound {
                conversation: conversation.clone(),
                message_id,
                decision,
            })?;
            drain_events(&mut events)?;
        }
    }
    Ok(())
}

fn generator_for(options: &ReplayOptions) -> Result<Arc<dyn ResponseGenerator>> {
    match &options.script {
        Some(path) => {
            let scripted = ScriptedGenerator::from_file(path)
                .with_context(|| format!("Failed to load script {}", path.display()))?;
            Ok(Arc::new(scripted))
        }
        None => {
            let provider = ProviderConfig::resolve(options.provider)?;
            Ok(build_generator(provider)?)
        }
    }
}

/// Parses one message per non-empty line.
pub fn read_transcript(path: &Path) -> Result<Vec<Message>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    parse_transcript(&content).with_context(|| format!("Invalid transcript {}", path.display()))
}

pub fn parse_transcript(content: &str) -> Result<Vec<Message>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

fn print_outbound(outbound: &Outbound) -> Result<()> {
    println!("{}", serde_json::to_string(outbound)?);
    Ok(())
}

fn drain_events(events: &mut Option<UnboundedReceiver<DecisionEvent>>) -> Result<()> {
    if let Some(receiver) = events {
        while let Ok(event) = receiver.try_recv() {
            eprintln!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}
