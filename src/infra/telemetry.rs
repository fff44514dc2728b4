//! Process-wide tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

const RENDER_COUNTERS: [(&str, &str); 2] = [
    (
        "quire_render_total",
        "Render tasks that wrote a cache file, labelled by outcome.",
    ),
    (
        "quire_render_fallback_total",
        "Renderer failures replaced by the fallback snippet, labelled by kind.",
    ),
];

static DESCRIBED: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` directives refine `logging.level`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    DESCRIBED.call_once(describe_metrics);

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()
        .map_err(|err| InfraError::Telemetry(format!("subscriber already installed: {err}")))
}

fn describe_metrics() {
    for (name, description) in RENDER_COUNTERS {
        describe_counter!(name, Unit::Count, description);
    }
    describe_histogram!(
        "quire_render_ms",
        Unit::Milliseconds,
        "Render task latency in milliseconds."
    );
}
