use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ferry_application::ResponsePolicyEngine;
use ferry_core::config::{CadenceConfig, ChatPartner, MentionPolicy, PersonaConfig};
use ferry_core::style::StyleClass;
use ferry_core::text;
use ferry_core::{
    Decision, Draft, FerryError, GenerationRequest, Message, ResponseGenerator, Result,
    SuppressReason,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock generator
// ============================================================================

struct MockGenerator {
    replies: Mutex<VecDeque<Result<Option<Draft>>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    fn new(replies: Vec<Result<Option<Draft>>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn saying(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(Some(Draft::new(*t)))).collect())
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> GenerationRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Draft>> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct SlowGenerator;

#[async_trait]
impl ResponseGenerator for SlowGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Option<Draft>> {
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        Ok(Some(Draft::new("太慢了")))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap() + Duration::seconds(secs)
}

fn say(sender: &str, text: &str, secs: i64) -> Message {
    Message::text(sender, text).at(at(secs))
}

fn group() -> PersonaConfig {
    PersonaConfig::new(
        "小渡",
        ChatPartner::Group {
            label: "后端重构开发群".to_string(),
        },
    )
}

fn direct() -> PersonaConfig {
    PersonaConfig::new(
        "小渡",
        ChatPartner::Contact {
            label: "阿强".to_string(),
        },
    )
}

fn engine(config: PersonaConfig, generator: Arc<MockGenerator>) -> ResponsePolicyEngine {
    ResponsePolicyEngine::new(config, generator).unwrap()
}

fn emitted(decision: &Decision) -> String {
    decision
        .response()
        .map(|r| r.text())
        .unwrap_or_else(|| panic!("expected emit, got {decision:?}"))
}

// ============================================================================
// Duplicate guard
// ============================================================================

#[tokio::test]
async fn test_equivalent_questions_get_at_most_two_phrasings() {
    let generator = MockGenerator::new(vec![
        Ok(Some(Draft::new("用docker部署就行"))),
        Ok(Some(
            Draft::new("用docker部署就好").with_alternates(["先看部署文档"]),
        )),
        Ok(Some(Draft::new("用docker部署就行"))),
    ]);
    let mut engine = engine(group(), generator.clone());

    let first = engine.handle(say("阿强", "@小渡 这个服务怎么部署", 0)).await;
    let second = engine.handle(say("小美", "@小渡 这个服务怎么部署啊", 10)).await;
    let third = engine.handle(say("老王", "@小渡 这个服务怎么部署", 20)).await;

    assert_eq!(emitted(&first), "用docker部署就行");
    // near-identical to the first answer, so the alternate is used
    assert_eq!(emitted(&second), "先看部署文档");
    assert_eq!(third.reason(), Some(SuppressReason::RepeatExhausted));

    let first_key = text::normalize(&emitted(&first));
    let second_key = text::normalize(&emitted(&second));
    assert_ne!(first_key, second_key);
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_truncated_reply_is_checked_against_earlier_answers() {
    let drafts = || {
        MockGenerator::saying(&["docker部署就行", "docker部署就好了吧，记得先备份数据"])
    };

    let mut with_idioms = engine(direct(), drafts());
    let first = with_idioms.handle(say("阿强", "这个服务咋部署", 0)).await;
    let second = with_idioms.handle(say("阿强", "这个服务咋部署啊", 10)).await;
    assert_eq!(emitted(&first), "docker部署就行");
    // the casual cap cuts the draft down to "docker部署就好"
    assert_ne!(emitted(&second), "docker部署就好");
    assert_eq!(emitted(&second), "绝了");

    let mut config = direct();
    config.rules.meme_injection = false;
    let mut without_idioms = engine(config, drafts());
    assert!(without_idioms.handle(say("阿强", "这个服务咋部署", 0)).await.is_emit());
    let second = without_idioms.handle(say("阿强", "这个服务咋部署啊", 10)).await;
    assert_eq!(second.reason(), Some(SuppressReason::NoAlternate));
}

#[tokio::test]
async fn test_exact_duplicate_without_alternate_is_suppressed() {
    let generator = MockGenerator::saying(&["在的", "在的"]);
    let mut config = direct();
    config.rules.meme_injection = false;
    let mut engine = engine(config, generator);

    assert!(engine.handle(say("阿强", "在吗", 0)).await.is_emit());
    let again = engine.handle(say("阿强", "今天加班吗", 5)).await;
    assert_eq!(again.reason(), Some(SuppressReason::NoAlternate));
}

#[tokio::test]
async fn test_exact_duplicate_falls_back_to_idiom() {
    let generator = MockGenerator::saying(&["在的", "在的"]);
    let mut engine = engine(direct(), generator);

    assert!(engine.handle(say("阿强", "在吗", 0)).await.is_emit());
    let again = engine.handle(say("阿强", "今天加班吗", 5)).await;
    assert_eq!(emitted(&again), "绝了");
}

#[tokio::test]
async fn test_recent_responses_are_offered_as_avoid_list() {
    let generator = MockGenerator::saying(&["在的", "加班"]);
    let mut engine = engine(direct(), generator.clone());

    engine.handle(say("阿强", "在吗", 0)).await;
    engine.handle(say("阿强", "今天加班吗", 5)).await;

    assert!(generator.request(0).avoid.is_empty());
    assert_eq!(generator.request(1).avoid, vec!["在的"]);
    assert_eq!(engine.recent_responses().len(), 2);
}

// ============================================================================
// Style
// ============================================================================

#[tokio::test]
async fn test_technical_reply_is_one_line_without_emoji() {
    let generator = MockGenerator::saying(&["先看日志 🔍\n再查配置"]);
    let mut engine = engine(direct(), generator.clone());

    let decision = engine.handle(say("阿强", "这个报错怎么解决", 0)).await;
    let response = decision.response().unwrap();

    assert_eq!(response.class, StyleClass::Technical);
    assert_eq!(response.lines.len(), 1);
    assert!(!response.text().contains('\n'));
    assert!(!response.text().chars().any(text::is_emoji));
    assert_eq!(response.text(), "先看日志 再查配置");
    assert_eq!(generator.request(0).style, StyleClass::Technical);
}

#[tokio::test]
async fn test_casual_reply_is_short() {
    let generator = MockGenerator::saying(&["辛苦了辛苦了今天真的是太累了吧！\n早点休息😴\n明天见"]);
    let mut engine = engine(direct(), generator);

    let decision = engine.handle(say("阿强", "今天好累啊", 0)).await;
    let response = decision.response().unwrap();

    assert_eq!(response.class, StyleClass::Casual);
    assert_eq!(response.lines, vec!["辛苦了辛苦了今天真的", "早点休息"]);
    for line in &response.lines {
        assert!(text::printable_len(line) <= 10);
        assert!(!line.ends_with(text::is_terminal_punctuation));
    }
}

#[tokio::test]
async fn test_emoji_only_reply_is_unsatisfiable() {
    let generator = MockGenerator::saying(&["😀😀"]);
    let mut engine = engine(direct(), generator);

    let decision = engine.handle(say("阿强", "哈哈", 0)).await;
    assert_eq!(decision.reason(), Some(SuppressReason::StyleUnsatisfiable));
}

// ============================================================================
// Mentions
// ============================================================================

#[tokio::test]
async fn test_only_last_of_consecutive_mentions_is_answered() {
    let generator = MockGenerator::saying(&["在的"]);
    let mut engine = engine(group(), generator.clone());

    let decisions = engine
        .handle_batch(vec![
            say("阿强", "@小渡 在吗", 0),
            say("小美", "@小渡 在不在", 1),
            say("老王", "@小渡 回个话", 2),
        ])
        .await;

    let reasons: Vec<Option<SuppressReason>> = decisions.iter().map(|(_, d)| d.reason()).collect();
    assert_eq!(
        reasons,
        vec![Some(SuppressReason::Superseded), Some(SuppressReason::Superseded), None]
    );
    assert_eq!(generator.calls(), 1);
    assert_eq!(generator.request(0).incoming, "@小渡 回个话");
}

#[tokio::test]
async fn test_batch_is_processed_in_timestamp_order() {
    let generator = MockGenerator::saying(&["在的"]);
    let mut engine = engine(group(), generator.clone());

    let late = say("老王", "@小渡 回个话", 2);
    let early = say("阿强", "@小渡 在吗", 0);
    let late_id = late.id().clone();

    let decisions = engine.handle_batch(vec![late, early]).await;
    assert_eq!(decisions[1].0, late_id);
    assert!(decisions[1].1.is_emit());
    assert_eq!(decisions[0].1.reason(), Some(SuppressReason::Superseded));
}

#[tokio::test]
async fn test_each_policy_answers_every_mention() {
    let generator = MockGenerator::saying(&["在的", "来了", "咋了"]);
    let mut config = group();
    config.rules.mention_policy = MentionPolicy::Each;
    let mut engine = engine(config, generator.clone());

    let decisions = engine
        .handle_batch(vec![
            say("阿强", "@小渡 在吗", 0),
            say("小美", "@小渡 在不在", 1),
            say("老王", "@小渡 回个话", 2),
        ])
        .await;

    assert!(decisions.iter().all(|(_, d)| d.is_emit()));
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_mentions_list_addresses_persona() {
    let generator = MockGenerator::saying(&["好"]);
    let mut engine = engine(group(), generator);

    let message = say("阿强", "周末去爬山吗", 0).with_mentions(["小渡"]);
    assert!(engine.handle(message).await.is_emit());
}

// ============================================================================
// Topic relevance
// ============================================================================

#[tokio::test]
async fn test_irrelevant_message_drops_older_context() {
    let generator = MockGenerator::new(vec![Ok(None), Ok(None), Ok(None), Ok(Some(Draft::new("去")))]);
    let mut engine = engine(direct(), generator.clone());

    engine.handle(say("阿强", "这个服务怎么部署到k8s", 0)).await;
    engine.handle(say("阿强", "k8s的部署配置在哪", 10)).await;
    engine.handle(say("阿强", "部署配置里的镜像地址是什么", 20)).await;
    let decision = engine.handle(say("阿强", "周末去爬山吗", 30)).await;

    assert!(decision.is_emit());
    assert_eq!(generator.request(2).context.len(), 2);
    assert!(generator.request(3).context.is_empty());
    // the canonical window still holds the older turns
    assert_eq!(engine.window().len(), 3);
}

#[tokio::test]
async fn test_unprompted_off_topic_group_message_is_low_relevance() {
    let generator = MockGenerator::new(vec![Ok(None), Ok(None), Ok(None)]);
    let mut engine = engine(group(), generator.clone());

    engine.handle(say("阿强", "这个服务怎么部署到k8s", 0)).await;
    engine.handle(say("小美", "k8s的部署配置在哪", 10)).await;
    engine.handle(say("老王", "部署配置里的镜像地址是什么", 20)).await;
    let decision = engine.handle(say("阿强", "周末去爬山吗", 30)).await;

    assert_eq!(decision.reason(), Some(SuppressReason::LowRelevance));
    assert_eq!(generator.calls(), 3);
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_image_compliment_is_emitted_once() {
    let generator = MockGenerator::saying(&["确实好看！", "确实好看"]);
    let mut config = PersonaConfig::new(
        "小渡",
        ChatPartner::Group {
            label: "摄影群".to_string(),
        },
    );
    config.rules.meme_injection = false;
    let mut engine = engine(config, generator.clone());

    let share = Message::image(
        "阿强",
        Some("夕阳下的海边".to_string()),
        vec!["这个图挺好看的".to_string()],
    )
    .at(at(0));
    let first = engine.handle(share).await;
    let second = engine.handle(say("小美", "这个图是真的好看", 10)).await;

    assert_eq!(emitted(&first), "确实好看");
    assert!(text::printable_len(&emitted(&first)) <= 10);
    assert_eq!(second.reason(), Some(SuppressReason::NoAlternate));
    assert_eq!(generator.request(0).incoming, "夕阳下的海边 这个图挺好看的");
}

#[tokio::test]
async fn test_image_without_description_still_uses_commentary() {
    let generator = MockGenerator::saying(&["好看"]);
    let mut engine = engine(direct(), generator.clone());

    let share = Message::image("阿强", None, vec!["看我拍的".to_string()]).at(at(0));
    assert!(engine.handle(share).await.is_emit());
    assert_eq!(generator.request(0).incoming, "看我拍的");
}

#[tokio::test]
async fn test_empty_body_is_suppressed_without_generation() {
    let generator = MockGenerator::saying(&["好看"]);
    let mut engine = engine(direct(), generator.clone());

    let share = Message::image("阿强", None, vec![]).at(at(0));
    let decision = engine.handle(share).await;

    assert_eq!(decision, Decision::suppress(SuppressReason::EmptyBody));
    assert_eq!(generator.calls(), 0);
}

// ============================================================================
// Chorus and cadence
// ============================================================================

#[tokio::test]
async fn test_group_chorus_is_joined_once() {
    let generator = MockGenerator::new(vec![Ok(None), Ok(None)]);
    let mut engine = engine(group(), generator.clone());

    let first = engine.handle(say("阿强", "冲冲冲", 0)).await;
    let echo = engine.handle(say("小美", "冲冲冲！", 1)).await;
    let third = engine.handle(say("老王", "冲冲冲", 2)).await;

    assert_eq!(first.reason(), Some(SuppressReason::ModelDeclined));
    assert_eq!(emitted(&echo), "冲冲冲");
    assert_eq!(third.reason(), Some(SuppressReason::ModelDeclined));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_unprompted_participation_is_throttled() {
    let generator = MockGenerator::new(vec![Ok(None), Ok(None), Ok(Some(Draft::new("好了")))]);
    let mut config = group();
    config.cadence = CadenceConfig {
        min_interval_secs: 60,
        max_ignored: 2,
    };
    let mut engine = engine(config, generator.clone());

    let mut reasons = Vec::new();
    for (sender, body, secs) in [
        ("阿强", "这个服务部署好了吗", 0),
        ("小美", "服务部署还在跑", 10),
        ("老王", "服务部署卡住了", 20),
        ("阿强", "服务部署好了", 70),
    ] {
        reasons.push(engine.handle(say(sender, body, secs)).await.reason());
    }
    assert_eq!(
        reasons,
        vec![
            Some(SuppressReason::ModelDeclined),
            Some(SuppressReason::Throttled),
            Some(SuppressReason::Throttled),
            Some(SuppressReason::ModelDeclined),
        ]
    );

    // addressing the persona is never throttled
    let addressed = engine.handle(say("小美", "@小渡 服务部署好了吗", 75)).await;
    assert!(addressed.is_emit());
    assert_eq!(generator.calls(), 3);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_generation_failure_is_silent() {
    let generator = MockGenerator::new(vec![Err(FerryError::generation("mock", "boom", true))]);
    let mut engine = engine(direct(), generator);

    let decision = engine.handle(say("阿强", "在吗", 0)).await;
    assert_eq!(decision.reason(), Some(SuppressReason::GenerationFailed));
    assert!(engine.recent_responses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_generation_timeout_is_silent() {
    let mut config = direct();
    config.rules.generation_timeout_secs = 1;
    let mut engine = ResponsePolicyEngine::new(config, Arc::new(SlowGenerator)).unwrap();

    let decision = engine.handle(say("阿强", "在吗", 0)).await;
    assert_eq!(decision.reason(), Some(SuppressReason::GenerationTimedOut));
}

#[tokio::test]
async fn test_model_silence_is_distinct_from_empty_reply() {
    let generator = MockGenerator::new(vec![Ok(None)]);
    let mut engine = engine(direct(), generator);

    let decision = engine.handle(say("阿强", "在吗", 0)).await;
    assert_eq!(decision, Decision::suppress(SuppressReason::ModelDeclined));
    assert!(decision.response().is_none());
}

#[tokio::test]
async fn test_redelivered_and_own_messages_are_ignored() {
    let generator = MockGenerator::saying(&["在的", "在的"]);
    let mut engine = engine(direct(), generator.clone());

    let message = say("阿强", "在吗", 0);
    assert!(engine.handle(message.clone()).await.is_emit());
    assert_eq!(
        engine.handle(message).await.reason(),
        Some(SuppressReason::Stale)
    );

    let own = Message::from_persona("小渡", "在的", at(1));
    assert_eq!(
        engine.handle(own).await.reason(),
        Some(SuppressReason::OwnMessage)
    );
    assert_eq!(generator.calls(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = direct();
    config.rules.window_size = 0;
    let result = ResponsePolicyEngine::new(config, MockGenerator::saying(&[]));
    assert!(matches!(result, Err(FerryError::Config(_))));
}
