use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

/// Logging and OpenTelemetry export
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name reported with every span and metric
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Log filter directive (`RUST_LOG` syntax), overridden by the environment
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Extra resource attributes, e.g. `deployment.environment`
    #[serde(default)]
    pub resource_attributes: BTreeMap<String, String>,
    /// OTLP export; logs stay local when absent
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: None,
            resource_attributes: BTreeMap::new(),
            otlp: None,
        }
    }
}

/// Collector that receives spans and chat metrics
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub protocol: OtlpProtocol,
    /// How often metrics are pushed (e.g. "30s")
    #[serde(default = "default_export_interval")]
    pub export_interval: String,
    #[serde(default = "default_true")]
    pub traces: bool,
    #[serde(default = "default_true")]
    pub metrics: bool,
    /// Fraction of root spans kept, between 0.0 and 1.0
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    HttpProto,
}

fn default_service_name() -> String {
    "counsel".to_owned()
}

fn default_export_interval() -> String {
    "30s".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_sampling_rate() -> f64 {
    1.0
}
