use serde::Deserialize;

/// Trusted headers identifying the caller of a chat turn
///
/// Session handling lives in front of this service; it sets these headers
/// after authenticating the user.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientIdentificationConfig {
    /// Header carrying the client ID
    pub client_id_header: String,
    /// Header carrying the client's group, e.g. the firm or team
    #[serde(default)]
    pub group_header: Option<String>,
    /// Groups accepted from `group_header`; empty accepts any
    #[serde(default)]
    pub allowed_groups: Vec<String>,
}

impl ClientIdentificationConfig {
    /// Identify clients by `header` alone
    pub fn by_header(header: impl Into<String>) -> Self {
        Self {
            client_id_header: header.into(),
            group_header: None,
            allowed_groups: Vec::new(),
        }
    }

    /// Whether `group` may be attached to an identity
    pub fn accepts_group(&self, group: &str) -> bool {
        self.allowed_groups.is_empty() || self.allowed_groups.iter().any(|allowed| allowed == group)
    }
}
