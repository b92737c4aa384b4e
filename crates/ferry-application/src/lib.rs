//! Orchestration of the FERRY policy components.

pub mod engine;
pub mod hub;

pub use engine::{DECISION_TARGET, ResponsePolicyEngine};
pub use hub::{ConversationHub, Outbound};
