//! Tracing subscriber setup with optional OTLP span export.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `CHAINMOVE_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector base URL.  When set, the `move_to_state` and `wait_to_settle` spans are exported. |

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.  Must run before the tokio runtime is
/// built; hold the returned guard until the runtime has shut down.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let use_json = std::env::var("CHAINMOVE_LOG_FORMAT").as_deref() == Ok("json");

    let provider = build_provider(service_name);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("chainmove")));

    // `Option<Layer>` is itself a layer, so the export layer is simply absent
    // without an endpoint.
    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).compact())
            .init();
    }

    TracerProviderGuard(provider)
}

/// Shuts the tracer provider down on drop, flushing queued spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[chainmove] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// `None` when `OTEL_EXPORTER_OTLP_ENDPOINT` is unset or the exporter cannot
/// be built; the subscriber then logs to the console only.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[chainmove] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // The batch processor exports from its own thread, never from a tokio
    // worker, so the blocking HTTP client is safe here.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_provider_without_endpoint() {
        // SAFETY: no other test in this crate reads this variable.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("chainmove-test").is_none());
    }

    #[test]
    fn empty_guard_drops_quietly() {
        drop(TracerProviderGuard(None));
    }
}
