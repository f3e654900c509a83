use std::time::Duration;

use serde::Deserialize;

/// CORS configuration
///
/// Browsers call the chat routes directly from the front end, so the
/// wildcard defaults mirror what that front end has always allowed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub origins: AllowList,
    #[serde(default)]
    pub methods: AllowList,
    #[serde(default)]
    pub headers: AllowList,
    /// Response headers readable from browser scripts
    #[serde(default)]
    pub expose_headers: Vec<String>,
    #[serde(default)]
    pub credentials: bool,
    /// Preflight cache lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

/// `"*"`, a single value, or a list of values
///
/// A `"*"` anywhere in a list allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowList {
    #[default]
    Any,
    Only(Vec<String>),
}

impl<'de> Deserialize<'de> for AllowList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let values = match Raw::deserialize(deserializer)? {
            Raw::One(value) => vec![value],
            Raw::Many(values) => values,
        };

        if values.iter().any(|value| value == "*") {
            Ok(Self::Any)
        } else {
            Ok(Self::Only(values))
        }
    }
}

impl CorsConfig {
    /// Allow any origin, method, and header without credentials
    pub const fn permissive() -> Self {
        Self {
            origins: AllowList::Any,
            methods: AllowList::Any,
            headers: AllowList::Any,
            expose_headers: Vec::new(),
            credentials: false,
            max_age: None,
        }
    }

    /// Whether credentials were requested together with a wildcard origin,
    /// which browsers reject
    pub const fn has_wildcard_credentials(&self) -> bool {
        self.credentials && matches!(self.origins, AllowList::Any)
    }

    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }
}
