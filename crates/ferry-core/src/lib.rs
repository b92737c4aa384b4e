//! Domain model and policy components of FERRY.
//!
//! Each component answers one question about an inbound message: does it
//! address the persona, is it on topic, would the reply repeat itself, what
//! shape must the reply take, and should the persona speak at all. The
//! orchestration lives in `ferry-application`.

pub mod cadence;
pub mod candidate;
pub mod chorus;
pub mod config;
pub mod duplicate;
pub mod error;
pub mod generation;
pub mod mention;
pub mod message;
pub mod silence;
pub mod style;
pub mod text;
pub mod topic;
pub mod window;

pub use error::{FerryError, Result};
pub use generation::{ContextLine, Draft, GenerationRequest, ResponseGenerator};
pub use message::{Message, MessageBody, MessageId};
pub use silence::{Decision, Response, SuppressReason};
