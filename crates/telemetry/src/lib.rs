//! Tracing subscriber bootstrap.

use anyhow::Context;
use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
///
/// Fails if a global subscriber is already set.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = build_filter(settings)?;

    let result = match settings.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.context("failed to install tracing subscriber")?;

    tracing::debug!(
        target: "bookshelf-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

fn build_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .with_context(|| format!("invalid log filter '{}'", settings.filter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = TelemetrySettings {
            filter: "bookshelf=loud".to_string(),
            ..TelemetrySettings::default()
        };
        assert!(build_filter(&settings).is_err());
    }

    #[test]
    fn accepts_module_directives() {
        let settings = TelemetrySettings {
            filter: "bookshelf_app=debug,tower_http=info".to_string(),
            ..TelemetrySettings::default()
        };
        assert!(build_filter(&settings).is_ok());
    }
}
