//! ResponsePolicyEngine - one decision per inbound message.
//!
//! The engine owns the per-conversation state (window, recent responses,
//! cadence) and runs every policy component in order:
//!
//! mention → topic → screen → style class → generate → guard (on the
//! enforced text) → finalize.

use chrono::Duration;
use ferry_core::cadence::CadenceTracker;
use ferry_core::candidate::{ResponseCandidate, SimilarityKey};
use ferry_core::chorus::ChorusDetector;
use ferry_core::config::PersonaConfig;
use ferry_core::duplicate::{DuplicateResponseGuard, GuardInput, GuardVerdict, RecentSelfResponses};
use ferry_core::mention::MentionResolver;
use ferry_core::silence::{SilenceDecider, Signals};
use ferry_core::style::{StyleClass, StyleConstraintEnforcer};
use ferry_core::text;
use ferry_core::topic::{TopicRelevanceFilter, TopicVerdict};
use ferry_core::window::ConversationWindow;
use ferry_core::{
    Decision, Draft, GenerationRequest, Message, MessageId, Response, ResponseGenerator, Result,
    SuppressReason,
};
use std::sync::Arc;

/// Target of the per-message decision events.
pub const DECISION_TARGET: &str = "ferry::decision";

/// Decides, for one conversation, whether and how the persona replies.
pub struct ResponsePolicyEngine {
    config: PersonaConfig,
    generator: Arc<dyn ResponseGenerator>,
    window: ConversationWindow,
    recent: RecentSelfResponses,
    mentions: MentionResolver,
    topic: TopicRelevanceFilter,
    guard: DuplicateResponseGuard,
    style: StyleConstraintEnforcer,
    silence: SilenceDecider,
    chorus: ChorusDetector,
    cadence: CadenceTracker,
}

impl ResponsePolicyEngine {
    /// Creates an engine for the conversation described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: PersonaConfig, generator: Arc<dyn ResponseGenerator>) -> Result<Self> {
        config.validate()?;
        let rules = &config.rules;
        Ok(Self {
            window: ConversationWindow::new(rules.window_size),
            recent: RecentSelfResponses::new(rules.recent_response_depth),
            mentions: MentionResolver::new(config.name(), config.kind(), rules.mention_policy),
            topic: TopicRelevanceFilter::for_window(
                config.similarity.topic_threshold,
                rules.window_size,
            ),
            guard: DuplicateResponseGuard::new(config.similarity.clone(), rules.max_phrasing_variants),
            style: StyleConstraintEnforcer::new(rules),
            silence: SilenceDecider::new(),
            chorus: ChorusDetector::new(config.chorus.clone()),
            cadence: CadenceTracker::new(config.cadence.clone()),
            generator,
            config,
        })
    }

    pub fn config(&self) -> &PersonaConfig {
        &self.config
    }

    pub fn window(&self) -> &ConversationWindow {
        &self.window
    }

    pub fn recent_responses(&self) -> &RecentSelfResponses {
        &self.recent
    }

    /// Runs one cycle for a single message.
    pub async fn handle(&mut self, message: Message) -> Decision {
        self.window_append_and_decide(&message, &[]).await
    }

    /// Runs one cycle for everything that arrived together.
    ///
    /// Messages are ordered by timestamp. Each one is decided with knowledge of
    /// the messages after it, so an addressal followed by another one in the
    /// same batch is superseded. Returns one decision per message, in
    /// chronological order.
    pub async fn handle_batch(&mut self, mut messages: Vec<Message>) -> Vec<(MessageId, Decision)> {
        messages.sort_by_key(Message::timestamp);

        let mut decisions = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let later: Vec<&Message> = messages[index + 1..].iter().collect();
            let decision = self.window_append_and_decide(message, &later).await;
            decisions.push((message.id().clone(), decision));
        }
        decisions
    }

    async fn window_append_and_decide(&mut self, message: &Message, later: &[&Message]) -> Decision {
        let stored = self.window.append(message.clone());
        let decision = self.decide(message, later, stored).await;

        match &decision {
            Decision::Emit(response) => {
                tracing::info!(
                    target: DECISION_TARGET,
                    conversation = %self.config.persona.partner.label(),
                    message_id = %message.id(),
                    decision = "emit",
                    class = %response.class,
                    reply = %response.text(),
                    "[ResponsePolicyEngine] Emitting reply"
                );
                self.remember(message, response);
            }
            Decision::Suppress { reason } => {
                tracing::info!(
                    target: DECISION_TARGET,
                    conversation = %self.config.persona.partner.label(),
                    message_id = %message.id(),
                    decision = "suppress",
                    reason = %reason,
                    "[ResponsePolicyEngine] Staying silent"
                );
            }
        }
        decision
    }

    async fn decide(&mut self, message: &Message, later: &[&Message], stored: bool) -> Decision {
        let addressal = self.mentions.resolve(message, later);

        let context: Vec<Message> = self
            .window
            .context_for(message.id())
            .into_iter()
            .cloned()
            .collect();
        let context_refs: Vec<&Message> = context.iter().collect();
        let verdict = self.topic.assess(&context_refs);
        let chorus = self.chorus.detect(&context_refs);

        let mut signals = Signals {
            from_self: message.is_from_self(),
            stale: !stored,
            muted: !self.config.is_enabled(),
            kind: self.config.kind(),
            addressal,
            shift: verdict.shift,
            empty_body: message.text_content().trim().is_empty(),
            chorus: chorus.is_some(),
            throttled: false,
        };
        if signals.is_unprompted()
            && !signals.chorus
            && !signals.from_self
            && !signals.muted
            && !signals.empty_body
            && stored
        {
            signals.throttled = !self.cadence.admit(message.timestamp());
        }

        tracing::debug!(
            message_id = %message.id(),
            addressal = %addressal,
            topic = %verdict.shift,
            score = verdict.score,
            chorus = signals.chorus,
            throttled = signals.throttled,
            "[ResponsePolicyEngine] Screened message"
        );

        if let Some(reason) = self.silence.screen(&signals) {
            return Decision::suppress(reason);
        }

        let outcome = match chorus {
            // a chorus is joined once; no rephrasing
            Some(phrase) if self.recent.contains_key(&SimilarityKey::of(&phrase)) => {
                Err(SuppressReason::Duplicate)
            }
            Some(phrase) => self.compose(&verdict, StyleClass::Casual, Draft::new(phrase), message),
            None => {
                let class = self.style.classify(message);
                match self.generate(message, class, &verdict).await {
                    Ok(draft) => self.compose(&verdict, class, draft, message),
                    Err(reason) => Err(reason),
                }
            }
        };

        self.silence.finalize(&signals, outcome)
    }

    /// Asks the generator for a draft, bounded by the configured timeout.
    async fn generate(
        &self,
        message: &Message,
        class: StyleClass,
        verdict: &TopicVerdict<'_>,
    ) -> std::result::Result<Draft, SuppressReason> {
        let avoid = self.recent.iter().map(|entry| entry.text.clone()).collect();
        let request = GenerationRequest::new(&self.config, class, message)
            .with_context(verdict.prior().iter().copied())
            .with_avoid(avoid);

        let timeout = self.config.rules.generation_timeout();
        match tokio::time::timeout(timeout, self.generator.generate(&request)).await {
            Err(_) => {
                tracing::warn!(
                    generator = self.generator.name(),
                    timeout_secs = timeout.as_secs(),
                    "[ResponsePolicyEngine] Generation timed out"
                );
                Err(SuppressReason::GenerationTimedOut)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    generator = self.generator.name(),
                    retryable = e.is_retryable(),
                    "[ResponsePolicyEngine] Generation failed: {}",
                    e
                );
                Err(SuppressReason::GenerationFailed)
            }
            Ok(Ok(None)) => Err(SuppressReason::ModelDeclined),
            Ok(Ok(Some(draft))) => Ok(draft),
        }
    }

    /// Runs the guard, which judges every phrasing in its enforced form.
    fn compose(
        &self,
        verdict: &TopicVerdict<'_>,
        class: StyleClass,
        draft: Draft,
        message: &Message,
    ) -> std::result::Result<Response, SuppressReason> {
        let candidate = ResponseCandidate::new(draft.text, class);
        let idioms: &[String] = if self.config.rules.meme_injection {
            &self.config.rules.idioms
        } else {
            &[]
        };

        let reviewed = self.guard.review(
            GuardInput {
                view: &verdict.view,
                candidate: &candidate,
                alternates: &draft.alternates,
                idioms,
            },
            &self.recent,
            |phrasing| self.style.enforce(phrasing),
        );
        match reviewed {
            GuardVerdict::Pass(response) => Ok(response),
            GuardVerdict::Rephrased(response) => {
                tracing::debug!(
                    message_id = %message.id(),
                    rephrased = %response.text(),
                    "[ResponsePolicyEngine] Rephrased to avoid repetition"
                );
                Ok(response)
            }
            GuardVerdict::Exhausted(exhaustion) => Err(exhaustion.into()),
        }
    }

    /// Records an emitted reply and appends it to the window.
    fn remember(&mut self, message: &Message, response: &Response) {
        let text = response.text();
        self.recent.record(
            &ResponseCandidate::new(text.clone(), response.class),
            text::tokens(&message.text_content()),
        );

        let after = self
            .window
            .latest_timestamp()
            .map_or(message.timestamp(), |latest| latest.max(message.timestamp()));
        let reply = Message::from_persona(
            self.config.name(),
            text,
            after + Duration::milliseconds(1),
        );
        self.window.append(reply);
    }
}
