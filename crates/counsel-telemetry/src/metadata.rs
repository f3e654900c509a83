use counsel_config::TelemetryConfig;
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource as semconv;

/// Resource describing this process to the collector
///
/// Configured attributes are appended after the service identity, so a
/// configured `service.version` wins over the crate version.
pub fn build_resource(config: &TelemetryConfig) -> Resource {
    let identity = [
        KeyValue::new(semconv::SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(semconv::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ];
    let extra = config
        .resource_attributes
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()));

    Resource::builder().with_attributes(identity.into_iter().chain(extra)).build()
}
