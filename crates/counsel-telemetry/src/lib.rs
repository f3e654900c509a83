//! Telemetry for Counsel
//!
//! Logs always go to stdout through `tracing`. When `[telemetry.otlp]` is
//! configured, spans and chat metrics are also pushed to a collector.

mod metadata;
pub mod metrics;

use counsel_config::{OtlpConfig, OtlpProtocol, TelemetryConfig};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::EnvFilter;

pub use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

/// Instrumentation scope used for every Counsel meter and tracer
const SCOPE: &str = "counsel";

/// Keeps OTLP providers alive and shuts them down on drop
#[derive(Default)]
pub struct TelemetryGuard {
    meter_provider: Option<SdkMeterProvider>,
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Push pending metrics now instead of at the next export interval
    ///
    /// # Errors
    ///
    /// Returns an error if the meter provider fails to flush
    pub fn force_flush(&self) -> anyhow::Result<()> {
        if let Some(provider) = &self.meter_provider {
            provider
                .force_flush()
                .map_err(|e| anyhow::anyhow!("failed to flush metrics: {e}"))?;
        }
        Ok(())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.meter_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown meter provider: {e}");
        }
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown tracer provider: {e}");
        }
    }
}

/// Meter for recording Counsel metrics
///
/// Backed by a no-op provider until [`init`] installs an exporter, so
/// instruments can be created unconditionally.
pub fn meter() -> Meter {
    global::meter(SCOPE)
}

/// Install the global subscriber and, when configured, OTLP export
///
/// The log filter comes from `RUST_LOG` when set, then from the config,
/// then from `default_filter`. Returns a guard that must be held for the
/// lifetime of the application.
///
/// # Errors
///
/// Returns an error if an OTLP exporter cannot be built
pub fn init(config: Option<&TelemetryConfig>, default_filter: &str) -> anyhow::Result<TelemetryGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(config, default_filter)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let mut guard = TelemetryGuard::default();

    if let Some(config) = config
        && let Some(otlp) = &config.otlp
    {
        let resource = metadata::build_resource(config);

        if otlp.metrics {
            let provider = meter_provider(otlp, resource.clone())?;
            global::set_meter_provider(provider.clone());
            guard.meter_provider = Some(provider);
        }

        if otlp.traces {
            let provider = tracer_provider(otlp, resource)?;
            global::set_tracer_provider(provider.clone());
            guard.tracer_provider = Some(provider);
        }
    }

    let otel_layer = guard
        .tracer_provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(SCOPE)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    Ok(guard)
}

fn filter_directive<'a>(config: Option<&'a TelemetryConfig>, default_filter: &'a str) -> &'a str {
    config
        .and_then(|c| c.log_filter.as_deref())
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or(default_filter)
}

fn meter_provider(otlp: &OtlpConfig, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    use opentelemetry_otlp::MetricExporter;
    use opentelemetry_sdk::metrics::PeriodicReader;

    let interval = duration_str::parse(&otlp.export_interval)
        .map_err(|e| anyhow::anyhow!("invalid metrics export interval '{}': {e}", otlp.export_interval))?;

    let exporter = match otlp.protocol {
        OtlpProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(otlp.endpoint.as_str())
            .build(),
        OtlpProtocol::HttpProto => MetricExporter::builder()
            .with_http()
            .with_endpoint(otlp.endpoint.as_str())
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build metrics exporter: {e}"))?;

    let reader = PeriodicReader::builder(exporter).with_interval(interval).build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

fn tracer_provider(otlp: &OtlpConfig, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_otlp::SpanExporter;

    let exporter = match otlp.protocol {
        OtlpProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otlp.endpoint.as_str())
            .build(),
        OtlpProtocol::HttpProto => SpanExporter::builder()
            .with_http()
            .with_endpoint(otlp.endpoint.as_str())
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build span exporter: {e}"))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler(otlp.sampling_rate))
        .with_batch_exporter(exporter)
        .build())
}

/// Ratio sampler for root spans that follows the parent's decision otherwise
fn sampler(rate: f64) -> Sampler {
    let root = if rate >= 1.0 {
        Sampler::AlwaysOn
    } else if rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(rate)
    };

    Sampler::ParentBased(Box::new(root))
}
