//! Runtime plumbing for FERRY binaries: logging setup and the decision event
//! stream.

pub mod decision_layer;
pub mod logging;

pub use decision_layer::{DecisionEvent, DecisionEventLayer};
pub use logging::{LogFormat, init_logging, init_logging_with_events};
