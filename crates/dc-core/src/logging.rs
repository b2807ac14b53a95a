//! Process-wide logging setup
//!
//! All crates log through `tracing`. Events go to whatever global subscriber
//! the host application installed; `init_tracing` only installs the fallback
//! subscriber when nothing else is registered.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingSettings};

/// Install the fallback subscriber with human-readable output.
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` when a global
/// subscriber was already set, in which case the host's logger stays active.
pub fn init_tracing(default_filter: &str) -> bool {
    install(default_filter, LogFormat::Pretty)
}

/// Install the fallback subscriber from settings
pub fn init_from_settings(settings: &LoggingSettings) -> bool {
    install(&settings.filter, settings.format)
}

fn install(default_filter: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = format == LogFormat::Json;

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
        }))
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = default_filter, ?format, "Fallback tracing subscriber installed");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_existing_subscriber() {
        // After the first call some global subscriber is always set.
        let _ = init_tracing("info");
        assert!(!init_tracing("debug"));
        let json = LoggingSettings {
            format: LogFormat::Json,
            ..LoggingSettings::default()
        };
        assert!(!init_from_settings(&json));
    }
}
