use std::path::Path;

use crate::{Config, OtlpConfig, PacingConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the answer source address is unusable, a
    /// duration cannot be parsed, or a route path is malformed
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_upstream()?;
        validate_pacing(&self.chat.pacing)?;
        self.validate_server()?;
        if let Some(otlp) = self.telemetry.as_ref().and_then(|t| t.otlp.as_ref()) {
            validate_otlp(otlp)?;
        }
        Ok(())
    }

    /// Ensure both answer source endpoints resolve to valid URLs
    fn validate_upstream(&self) -> anyhow::Result<()> {
        let upstream = &self.chat.upstream;

        upstream.answer_url()?;
        upstream.stream_url()?;

        let timeout = parse_duration("chat.upstream.timeout", &upstream.timeout)?;
        if timeout.is_zero() {
            anyhow::bail!("chat.upstream.timeout must be greater than 0");
        }

        if let Some(ref header) = upstream.identity_header
            && header.trim().is_empty()
        {
            anyhow::bail!("chat.upstream.identity_header must not be empty");
        }

        if self.chat.require_identity && self.server.client_identification.is_none() {
            anyhow::bail!("chat.require_identity requires server.client_identification to be configured");
        }

        Ok(())
    }

    /// Validate server routes and middleware settings
    fn validate_server(&self) -> anyhow::Result<()> {
        let health = &self.server.health;
        if health.enabled && !health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/'");
        }

        if let Some(ref identification) = self.server.client_identification
            && identification.client_id_header.trim().is_empty()
        {
            anyhow::bail!("server.client_identification.client_id_header must not be empty");
        }

        if let Some(ref cors) = self.server.cors
            && cors.has_wildcard_credentials()
        {
            anyhow::bail!("server.cors.credentials cannot be combined with a wildcard origin");
        }

        Ok(())
    }
}

fn validate_pacing(pacing: &PacingConfig) -> anyhow::Result<()> {
    parse_duration("chat.pacing.short_delay", &pacing.short_delay)?;
    parse_duration("chat.pacing.long_delay", &pacing.long_delay)?;
    parse_duration("chat.pacing.close_delay", &pacing.close_delay)?;
    Ok(())
}

fn validate_otlp(otlp: &OtlpConfig) -> anyhow::Result<()> {
    if parse_duration("telemetry.otlp.export_interval", &otlp.export_interval)?.is_zero() {
        anyhow::bail!("telemetry.otlp.export_interval must be greater than 0");
    }
    if !(0.0..=1.0).contains(&otlp.sampling_rate) {
        anyhow::bail!("telemetry.otlp.sampling_rate must be between 0.0 and 1.0");
    }
    Ok(())
}

fn parse_duration(field: &str, value: &str) -> anyhow::Result<std::time::Duration> {
    duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid duration for {field} '{value}': {e}"))
}
