use ferry_core::config::{ChatPartner, PersonaConfig};
use ferry_core::message::Message;
use ferry_core::style::StyleClass;
use ferry_core::{GenerationRequest, ResponseGenerator};
use ferry_interaction::ScriptedGenerator;
use std::fs;

#[tokio::test]
async fn test_scripted_generator_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.txt");
    fs::write(&path, "小渡: 确实好看\n备选: 好家伙\n\n本轮不发言\n").unwrap();

    let generator = ScriptedGenerator::from_file(&path).unwrap();
    let config = PersonaConfig::new(
        "小渡",
        ChatPartner::Group {
            label: "摄影群".to_string(),
        },
    );
    let incoming = Message::image("阿强", Some("海边日落".to_string()), vec![]);
    let request = GenerationRequest::new(&config, StyleClass::Casual, &incoming);

    let first = generator.generate(&request).await.unwrap().unwrap();
    assert_eq!(first.text, "确实好看");
    assert_eq!(first.alternates, vec!["好家伙"]);
    assert!(generator.generate(&request).await.unwrap().is_none());
}

#[test]
fn test_missing_script_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ScriptedGenerator::from_file(dir.path().join("missing.txt"));
    assert!(matches!(result, Err(ferry_core::FerryError::Io { .. })));
}
