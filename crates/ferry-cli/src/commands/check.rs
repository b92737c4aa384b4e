use anyhow::{Context, Result};
use ferry_core::config::PersonaConfig;
use std::path::Path;

pub fn run(persona: &Path) -> Result<()> {
    let config = PersonaConfig::load(persona)
        .with_context(|| format!("Invalid persona {}", persona.display()))?;

    println!(
        "✅ {} ({} chat with {})",
        config.name(),
        config.kind(),
        config.persona.partner.label()
    );
    println!();
    print!("{}", config.to_toml_string()?);
    Ok(())
}
