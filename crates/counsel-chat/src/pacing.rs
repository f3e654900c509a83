use std::time::Duration;

use counsel_config::PacingConfig;

use crate::error::ChatError;

/// Timing policy for a simulated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Delay before a token of at most `long_token_threshold` characters
    pub short_delay: Duration,
    /// Delay before a longer token
    pub long_delay: Duration,
    /// Character count above which `long_delay` applies
    pub long_token_threshold: usize,
    /// Delay between the completion chunk and closing the stream
    pub close_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            short_delay: Duration::from_millis(60),
            long_delay: Duration::from_millis(90),
            long_token_threshold: 10,
            close_delay: Duration::from_millis(100),
        }
    }
}

impl Pacing {
    /// Build from configuration
    pub fn from_config(config: &PacingConfig) -> Result<Self, ChatError> {
        Ok(Self {
            short_delay: parse_duration(&config.short_delay)?,
            long_delay: parse_duration(&config.long_delay)?,
            long_token_threshold: config.long_token_threshold,
            close_delay: parse_duration(&config.close_delay)?,
        })
    }

    /// No delays at all, for callers that only want the framing
    pub const fn immediate() -> Self {
        Self {
            short_delay: Duration::ZERO,
            long_delay: Duration::ZERO,
            long_token_threshold: usize::MAX,
            close_delay: Duration::ZERO,
        }
    }

    /// Delay to wait before emitting `token`
    pub fn delay_for(&self, token: &str) -> Duration {
        if token.chars().count() > self.long_token_threshold {
            self.long_delay
        } else {
            self.short_delay
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, ChatError> {
    duration_str::parse(s).map_err(|e| ChatError::Internal(anyhow::anyhow!("invalid pacing duration '{s}': {e}")))
}
