//! ConversationHub - one engine per conversation.
//!
//! Each conversation gets its own worker task and queue. A worker drains
//! everything queued when it wakes and hands it to its engine as one batch, so
//! messages that arrive while a generation is in flight are decided together.
//! Conversations never share state and run in parallel.

use crate::engine::ResponsePolicyEngine;
use ferry_core::config::{ChatPartner, PersonaConfig};
use ferry_core::{Decision, FerryError, Message, MessageId, ResponseGenerator, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A decision published by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outbound {
    pub conversation: String,
    pub message_id: MessageId,
    pub decision: Decision,
}

/// Routes inbound messages to per-conversation engines.
pub struct ConversationHub {
    persona: PersonaConfig,
    generator: Arc<dyn ResponseGenerator>,
    /// Inbox of every running conversation worker
    workers: Arc<RwLock<HashMap<String, UnboundedSender<Message>>>>,
    outbound: UnboundedSender<Outbound>,
}

impl ConversationHub {
    /// Creates a hub and the receiver on which decisions are published.
    ///
    /// `persona` is the template for every conversation. On first contact its
    /// partner is replaced by the given one and the matching
    /// `[[conversations]]` entry is applied.
    pub fn new(
        persona: PersonaConfig,
        generator: Arc<dyn ResponseGenerator>,
    ) -> (Self, UnboundedReceiver<Outbound>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let hub = Self {
            persona,
            generator,
            workers: Arc::new(RwLock::new(HashMap::new())),
            outbound,
        };
        (hub, receiver)
    }

    /// Queues `message` for the conversation `key`, starting its worker on first
    /// contact.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the engine for a new conversation
    /// cannot be built.
    pub async fn submit(&self, key: &str, partner: ChatPartner, message: Message) -> Result<()> {
        {
            let workers = self.workers.read().await;
            if let Some(inbox) = workers.get(key) {
                if inbox.send(message.clone()).is_ok() {
                    return Ok(());
                }
            }
        }

        let mut workers = self.workers.write().await;
        // another submit may have started the worker in the meantime
        if let Some(inbox) = workers.get(key) {
            if !inbox.is_closed() {
                return inbox
                    .send(message)
                    .map_err(|_| FerryError::internal(format!("worker for {} stopped", key)));
            }
        }

        let config = self.persona.for_partner(partner);
        if !config.is_enabled() {
            tracing::info!(conversation = %key, "[ConversationHub] Conversation is muted");
        }
        let engine = ResponsePolicyEngine::new(config, self.generator.clone())?;

        let (inbox, queue) = mpsc::unbounded_channel();
        inbox
            .send(message)
            .map_err(|_| FerryError::internal("new worker inbox closed"))?;
        tokio::spawn(run_worker(
            key.to_string(),
            engine,
            queue,
            self.outbound.clone(),
        ));
        tracing::info!(conversation = %key, "[ConversationHub] Started conversation worker");
        workers.insert(key.to_string(), inbox);
        Ok(())
    }

    /// Number of conversations with a worker.
    pub async fn conversation_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Stops accepting messages. Workers finish their queues and exit.
    pub async fn shutdown(&self) {
        self.workers.write().await.clear();
    }
}

async fn run_worker(
    key: String,
    mut engine: ResponsePolicyEngine,
    mut queue: UnboundedReceiver<Message>,
    outbound: UnboundedSender<Outbound>,
) {
    while let Some(first) = queue.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = queue.try_recv() {
            batch.push(next);
        }
        tracing::debug!(
            conversation = %key,
            batch = batch.len(),
            "[ConversationHub] Processing batch"
        );

        for (message_id, decision) in engine.handle_batch(batch).await {
            let published = outbound.send(Outbound {
                conversation: key.clone(),
                message_id,
                decision,
            });
            if published.is_err() {
                tracing::debug!(conversation = %key, "[ConversationHub] Outbound closed, stopping worker");
                return;
            }
        }
    }
    tracing::debug!(conversation = %key, "[ConversationHub] Worker finished");
}
