use ferry_core::config::{ChatPartner, ConversationKind, MentionPolicy, PersonaConfig};
use std::fs;
use tempfile::TempDir;

const PERSONA: &str = r#"
[persona]
name = "小渡"
tone = "upbeat"
partner = { kind = "group", label = "后端重构开发群" }

[rules]
window_size = 4
idioms = ["绝了"]
mention_policy = "each"

[cadence]
min_interval_secs = 30
max_ignored = 3
"#;

#[test]
fn test_load_persona_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("persona.toml");
    fs::write(&path, PERSONA).unwrap();

    let config = PersonaConfig::load(&path).unwrap();
    assert_eq!(config.name(), "小渡");
    assert_eq!(config.kind(), ConversationKind::Group);
    assert_eq!(config.rules.window_size, 4);
    assert_eq!(config.rules.idioms, vec!["绝了"]);
    assert_eq!(config.rules.mention_policy, MentionPolicy::Each);
    // untouched fields keep their defaults
    assert_eq!(config.rules.casual_line_length, 10);
    assert_eq!(config.similarity.intent_threshold, 0.6);
    assert_eq!(config.cadence.min_interval_secs, 30);
    assert!(config.chorus.enabled);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = PersonaConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("persona.toml");
    fs::write(&path, PERSONA.replace("window_size = 4", "window_size = 0")).unwrap();

    let err = PersonaConfig::load(&path).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_effective_config_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("persona.toml");
    let config = PersonaConfig::new(
        "小渡",
        ChatPartner::Contact {
            label: "阿强".to_string(),
        },
    );
    fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    assert_eq!(PersonaConfig::load(&path).unwrap(), config);
}
