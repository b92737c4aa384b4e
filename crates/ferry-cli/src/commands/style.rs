use anyhow::{Context, Result};
use ferry_core::candidate::ResponseCandidate;
use ferry_core::config::{ChatPartner, PersonaConfig};
use ferry_core::style::{StyleConstraintEnforcer, StyledReply};
use std::path::Path;

pub fn run(text: &str, persona: Option<&Path>, incoming: Option<&str>) -> Result<()> {
    let config = match persona {
        Some(path) => PersonaConfig::load(path)
            .with_context(|| format!("Invalid persona {}", path.display()))?,
        None => PersonaConfig::new(
            "ferry",
            ChatPartner::Contact {
                label: "preview".to_string(),
            },
        ),
    };

    match preview(&config, text, incoming) {
        Some(reply) => {
            println!("class: {}", reply.class);
            for line in &reply.lines {
                println!("  {}", line);
            }
        }
        None => println!("nothing printable survives"),
    }
    Ok(())
}

/// Classifies by `incoming` when given, otherwise by `text`, then enforces.
pub fn preview(config: &PersonaConfig, text: &str, incoming: Option<&str>) -> Option<StyledReply> {
    let enforcer = StyleConstraintEnforcer::new(&config.rules);
    let class = enforcer.classify_text(incoming.unwrap_or(text));
    enforcer.enforce(&ResponseCandidate::new(text, class))
}
