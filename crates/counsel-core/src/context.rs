/// Runtime context for a chat turn
///
/// Built once per HTTP request and handed explicitly to the chat
/// operations, so nothing downstream reads identity from ambient state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP request parts (method, URI, headers, extensions)
    pub parts: http::request::Parts,
    /// Identity of the caller, if one was established
    pub client_identity: Option<ClientIdentity>,
}

impl RequestContext {
    /// Create a minimal context for non-HTTP use
    ///
    /// Contains empty headers and no client identity
    pub fn empty() -> Self {
        let (parts, ()) = http::Request::new(()).into_parts();

        Self {
            parts,
            client_identity: None,
        }
    }

    /// Create a minimal context carrying the given identity
    pub fn with_identity(identity: ClientIdentity) -> Self {
        Self {
            client_identity: Some(identity),
            ..Self::empty()
        }
    }

    /// Access request headers
    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }

    /// Client ID of the caller, if known
    pub fn client_id(&self) -> Option<&str> {
        self.client_identity.as_ref().map(|identity| identity.client_id.as_str())
    }
}

/// Identified client and their group membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Client identifier (e.g. user ID)
    pub client_id: String,
    /// Group the client belongs to (e.g. "free", "firm")
    pub group: Option<String>,
}
