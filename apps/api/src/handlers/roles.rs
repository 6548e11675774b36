use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use castellan_application::{RoleDraft, RoleQuery, RoleUpdate};
use castellan_core::VerifiedIdentity;
use castellan_domain::{Action, Resource, RoleId};

use crate::dto::{CreateRoleRequest, RoleListQuery, RoleResponse, UpdateRoleRequest};
use crate::error::ApiResult;
use crate::state::AppState;

use super::caller_id;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(query): Query<RoleListQuery>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let actor = caller_id(&identity)?;
    state
        .permission_resolver
        .require(actor, Resource::RoleManagement, Action::Read)
        .await?;

    let roles = state
        .role_catalog_service
        .list_roles(RoleQuery::try_from(query)?, state.list_deadline())
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn list_assignable_roles_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let actor = caller_id(&identity)?;
    let roles = state
        .provisioning_guard
        .list_assignable_roles(actor)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let actor = caller_id(&identity)?;
    let role = state
        .provisioning_guard
        .create_sub_role(actor, RoleDraft::from(payload))
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn get_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let actor = caller_id(&identity)?;
    let role_id = RoleId::from_str(role_id.as_str())?;
    state
        .permission_resolver
        .require(actor, Resource::RoleManagement, Action::Read)
        .await?;

    let role = state.role_catalog_service.get_role(role_id).await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(role_id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let actor = caller_id(&identity)?;
    let role_id = RoleId::from_str(role_id.as_str())?;
    let role = state
        .provisioning_guard
        .update_role(actor, role_id, RoleUpdate::try_from(payload)?)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn deactivate_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let actor = caller_id(&identity)?;
    let role_id = RoleId::from_str(role_id.as_str())?;
    let role = state
        .provisioning_guard
        .deactivate_role(actor, role_id)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn reactivate_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let actor = caller_id(&identity)?;
    let role_id = RoleId::from_str(role_id.as_str())?;
    let role = state
        .provisioning_guard
        .reactivate_role(actor, role_id)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<StatusCode> {
    let actor = caller_id(&identity)?;
    let role_id = RoleId::from_str(role_id.as_str())?;
    state.provisioning_guard.delete_role(actor, role_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
