use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use castellan_core::{AppError, VerifiedIdentity};

use crate::error::ApiResult;
use crate::state::AppState;

/// Turns the identity header set by the upstream provider into a
/// [`VerifiedIdentity`] request extension.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let subject = request
        .headers()
        .get(&state.identity_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?
        .to_owned();

    request
        .extensions_mut()
        .insert(VerifiedIdentity::new(subject, None));
    Ok(next.run(request).await)
}
