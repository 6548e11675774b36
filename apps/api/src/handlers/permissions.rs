use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Query, State};
use castellan_core::{AppError, VerifiedIdentity};
use castellan_domain::{Action, Resource};

use crate::dto::{PermissionCheckQuery, PermissionCheckResponse};
use crate::error::ApiResult;
use crate::state::AppState;

use super::caller_id;

pub async fn check_permission_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(query): Query<PermissionCheckQuery>,
) -> ApiResult<Json<PermissionCheckResponse>> {
    let actor = caller_id(&identity)?;
    let resource = Resource::from_str(query.resource.as_str())?;
    let action = Action::from_str(query.action.as_str())?;
    if !resource.supports(action) {
        return Err(AppError::InvalidPermissionKey(format!(
            "action '{}' is not defined for resource '{}'",
            query.action, query.resource
        ))
        .into());
    }

    let allowed = state
        .permission_resolver
        .can_admin(actor, resource, action)
        .await;

    Ok(Json(PermissionCheckResponse {
        resource: query.resource,
        action: query.action,
        allowed,
    }))
}
