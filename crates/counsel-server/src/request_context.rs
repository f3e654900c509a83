use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use counsel_core::{ClientIdentity, RequestContext};

/// Middleware that constructs a `RequestContext` from the incoming request
///
/// Runs just before the handlers so that any `ClientIdentity` inserted by
/// the client identification layer is already present.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let context = RequestContext {
        client_identity: parts.extensions.get::<ClientIdentity>().cloned(),
        parts: parts.clone(),
    };

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);

    next.run(request).await
}
