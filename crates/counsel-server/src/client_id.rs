use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use counsel_config::ClientIdentificationConfig;
use counsel_core::ClientIdentity;
use http::HeaderMap;

/// Middleware that extracts client identity from trusted request headers
///
/// Requests without the client ID header pass through anonymously; the
/// chat routes decide whether that is acceptable.
pub async fn client_id_middleware(config: ClientIdentificationConfig, mut request: Request, next: Next) -> Response {
    if let Some(identity) = extract_identity(&config, request.headers()) {
        tracing::trace!(client_id = %identity.client_id, group = ?identity.group, "client identified");
        request.extensions_mut().insert(identity);
    }

    next.run(request).await
}

fn extract_identity(config: &ClientIdentificationConfig, headers: &HeaderMap) -> Option<ClientIdentity> {
    let client_id = header_value(headers, &config.client_id_header)?;

    let group = config
        .group_header
        .as_deref()
        .and_then(|name| header_value(headers, name))
        .filter(|group| config.accepts_group(group));

    Some(ClientIdentity { client_id, group })
}

/// Non-empty, trimmed header value
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use http::{HeaderName, HeaderValue};

    use super::*;

    fn config(allowed: &[&str]) -> ClientIdentificationConfig {
        ClientIdentificationConfig {
            group_header: Some("x-client-group".to_owned()),
            allowed_groups: allowed.iter().map(|g| (*g).to_owned()).collect(),
            ..ClientIdentificationConfig::by_header("x-client-id")
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
            .collect()
    }

    #[test]
    fn identity_from_headers() {
        let identity = extract_identity(
            &config(&[]),
            &headers(&[("x-client-id", "firm-42"), ("x-client-group", "partners")]),
        )
        .unwrap();

        assert_eq!(identity.client_id, "firm-42");
        assert_eq!(identity.group.as_deref(), Some("partners"));
    }

    #[test]
    fn missing_or_blank_client_id_is_anonymous() {
        assert!(extract_identity(&config(&[]), &HeaderMap::new()).is_none());
        assert!(extract_identity(&config(&[]), &headers(&[("x-client-id", "  ")])).is_none());
    }

    #[test]
    fn group_outside_allow_list_is_dropped() {
        let identity = extract_identity(
            &config(&["partners"]),
            &headers(&[("x-client-id", "firm-42"), ("x-client-group", "interns")]),
        )
        .unwrap();

        assert_eq!(identity.group, None);
    }
}
