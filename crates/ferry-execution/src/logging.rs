//! Process-wide tracing setup.

use crate::decision_layer::{DecisionEvent, DecisionEventLayer};
use ferry_application::DECISION_TARGET;
use strum::{Display, EnumString};
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global subscriber: `RUST_LOG` filtered logs on stderr.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt_layer(format).with_filter(env_filter()))
        .try_init()
}

/// Like [`init_logging`], and additionally streams every engine decision to
/// `events`, whatever `RUST_LOG` says.
pub fn init_logging_with_events(
    format: LogFormat,
    events: mpsc::UnboundedSender<DecisionEvent>,
) -> Result<(), TryInitError> {
    let decisions = Targets::new().with_target(DECISION_TARGET, LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(fmt_layer(format).with_filter(env_filter()))
        .with(DecisionEventLayer::new(events).with_filter(decisions))
        .try_init()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
