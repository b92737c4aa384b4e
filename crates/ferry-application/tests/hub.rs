use async_trait::async_trait;
use ferry_application::{ConversationHub, Outbound};
use ferry_core::config::{ChatPartner, ConversationOverride, PersonaConfig};
use ferry_core::{Draft, GenerationRequest, Message, ResponseGenerator, Result, SuppressReason};
use ferry_interaction::ScriptedGenerator;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedReceiver;

/// Blocks the first generation until released.
struct GatedGenerator {
    gate: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl ResponseGenerator for GatedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Option<Draft>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.gate.notified().await;
        }
        let replies = ["在的", "来了", "咋了"];
        Ok(Some(Draft::new(replies[call % replies.len()])))
    }
}

/// Counts generation calls and always answers with `reply`.
struct CountingGenerator {
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl ResponseGenerator for CountingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Option<Draft>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Draft::new(self.reply)))
    }
}

fn persona() -> PersonaConfig {
    PersonaConfig::new(
        "小渡",
        ChatPartner::Contact {
            label: "template".to_string(),
        },
    )
}

fn group(label: &str) -> ChatPartner {
    ChatPartner::Group {
        label: label.to_string(),
    }
}

async fn next(receiver: &mut UnboundedReceiver<Outbound>) -> Outbound {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("decision in time")
        .expect("hub still running")
}

#[tokio::test]
async fn test_messages_during_generation_are_coalesced() {
    let generator = Arc::new(GatedGenerator {
        gate: Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let (hub, mut decisions) = ConversationHub::new(persona(), generator.clone());

    let first = Message::text("阿强", "@小渡 在吗");
    hub.submit("dev", group("开发群"), first.clone()).await.unwrap();

    // wait until the first generation is in flight
    for _ in 0..100 {
        if generator.calls.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    let second = Message::text("小美", "@小渡 在不在");
    let third = Message::text("老王", "@小渡 回个话");
    hub.submit("dev", group("开发群"), second.clone()).await.unwrap();
    hub.submit("dev", group("开发群"), third.clone()).await.unwrap();
    generator.gate.notify_one();

    let out = next(&mut decisions).await;
    assert_eq!(out.message_id, *first.id());
    assert!(out.decision.is_emit());

    let out = next(&mut decisions).await;
    assert_eq!(out.message_id, *second.id());
    assert_eq!(out.decision.reason(), Some(SuppressReason::Superseded));

    let out = next(&mut decisions).await;
    assert_eq!(out.message_id, *third.id());
    assert_eq!(out.conversation, "dev");
    assert!(out.decision.is_emit());

    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_conversations_are_independent() {
    let generator = Arc::new(ScriptedGenerator::new(["收到", "收到"]));
    let (hub, mut decisions) = ConversationHub::new(persona(), generator);

    let dm = ChatPartner::Contact {
        label: "阿强".to_string(),
    };
    hub.submit("a", dm.clone(), Message::text("阿强", "在吗"))
        .await
        .unwrap();
    let first = next(&mut decisions).await;
    hub.submit("b", group("开发群"), Message::text("小美", "@小渡 在吗"))
        .await
        .unwrap();
    let second = next(&mut decisions).await;

    // the same reply in another conversation is not a duplicate
    assert_eq!(first.conversation, "a");
    assert_eq!(second.conversation, "b");
    assert_eq!(first.decision.response().map(|r| r.text()), Some("收到".to_string()));
    assert_eq!(second.decision.response().map(|r| r.text()), Some("收到".to_string()));
    assert_eq!(hub.conversation_count().await, 2);

    hub.shutdown().await;
    assert_eq!(hub.conversation_count().await, 0);
}

#[tokio::test]
async fn test_invalid_partner_is_rejected_on_first_contact() {
    let generator = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
    let (hub, _decisions) = ConversationHub::new(persona(), generator);

    let result = hub
        .submit("blank", group(" "), Message::text("阿强", "在吗"))
        .await;
    assert!(result.unwrap_err().is_config());
    assert_eq!(hub.conversation_count().await, 0);
}

#[tokio::test]
async fn test_conversation_overrides_apply_on_first_contact() {
    let mut config = persona();
    let mut muted = ConversationOverride::new("摸鱼群");
    muted.enabled = false;
    let mut terse = ConversationOverride::new("阿强");
    terse.casual_max_lines = Some(1);
    config.conversations = vec![muted, terse];

    let generator = Arc::new(CountingGenerator {
        reply: "好的呀\n马上就来",
        calls: AtomicUsize::new(0),
    });
    let (hub, mut decisions) = ConversationHub::new(config, generator.clone());

    hub.submit("slack", group("摸鱼群"), Message::text("小美", "@小渡 在吗"))
        .await
        .unwrap();
    let out = next(&mut decisions).await;
    assert_eq!(out.conversation, "slack");
    assert_eq!(out.decision.reason(), Some(SuppressReason::Muted));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    let dm = ChatPartner::Contact {
        label: "阿强".to_string(),
    };
    hub.submit("dm", dm, Message::text("阿强", "今天吃啥"))
        .await
        .unwrap();
    let out = next(&mut decisions).await;
    let response = out.decision.response().expect("emit");
    assert_eq!(response.lines, vec!["好的呀".to_string()]);

    // conversations without an entry keep the template rules
    hub.submit("dev", group("开发群"), Message::text("老王", "@小渡 今天吃啥"))
        .await
        .unwrap();
    let out = next(&mut decisions).await;
    assert_eq!(out.decision.response().expect("emit").lines.len(), 2);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_outbound_serializes_decision() {
    let outbound = Outbound {
        conversation: "dev".to_string(),
        message_id: "m-1".into(),
        decision: ferry_core::Decision::suppress(SuppressReason::Throttled),
    };
    let json = serde_json::to_value(&outbound).unwrap();
    assert_eq!(json["message_id"], "m-1");
    assert_eq!(json["decision"]["decision"], "suppress");
    assert_eq!(json["decision"]["reason"], "throttled");
}
