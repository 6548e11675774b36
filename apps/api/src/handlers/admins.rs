use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use castellan_application::{AdminQuery, DEFAULT_LIST_LIMIT};
use castellan_core::VerifiedIdentity;
use castellan_domain::{Action, AdminDefinitionInput, AdminId, AdminStatus, Resource, RoleId};

use crate::dto::{
    AdminListQuery, AdminResponse, AssignAdminRoleRequest, CreateAdminRequest, PageQuery,
};
use crate::error::ApiResult;
use crate::state::AppState;

use super::caller_id;

pub async fn list_admins_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<Json<Vec<AdminResponse>>> {
    let actor = caller_id(&identity)?;
    state
        .permission_resolver
        .require(actor, Resource::UserManagement, Action::Read)
        .await?;

    let admins = state
        .admin_directory_service
        .list_admins(AdminQuery::try_from(query)?, state.list_deadline())
        .await?
        .into_iter()
        .map(AdminResponse::from)
        .collect();

    Ok(Json(admins))
}

pub async fn create_admin_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(payload): Json<CreateAdminRequest>,
) -> ApiResult<(StatusCode, Json<AdminResponse>)> {
    let actor = caller_id(&identity)?;
    let admin = state
        .provisioning_guard
        .create_admin(actor, AdminDefinitionInput::try_from(payload)?)
        .await?;

    Ok((StatusCode::CREATED, Json(AdminResponse::from(admin))))
}

/// Admins may always read themselves; anyone else needs `userManagement.read`.
pub async fn get_admin_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(admin_id): Path<String>,
) -> ApiResult<Json<AdminResponse>> {
    let actor = caller_id(&identity)?;
    let admin_id = AdminId::from_str(admin_id.as_str())?;
    if admin_id == actor {
        state.permission_resolver.require_active(actor).await?;
    } else {
        state
            .permission_resolver
            .require(actor, Resource::UserManagement, Action::Read)
            .await?;
    }

    let admin = state.admin_directory_service.get_admin(admin_id).await?;

    Ok(Json(AdminResponse::from(admin)))
}

/// Managers may always list their own sub-users; anyone else needs
/// `userManagement.read`.
pub async fn list_sub_users_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(manager_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<AdminResponse>>> {
    let actor = caller_id(&identity)?;
    let manager_id = AdminId::from_str(manager_id.as_str())?;
    if manager_id == actor {
        state.permission_resolver.require_active(actor).await?;
    } else {
        state
            .permission_resolver
            .require(actor, Resource::UserManagement, Action::Read)
            .await?;
    }

    let sub_users = state
        .admin_directory_service
        .list_sub_users(
            manager_id,
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            query.offset.unwrap_or_default(),
            state.list_deadline(),
        )
        .await?
        .into_iter()
        .map(AdminResponse::from)
        .collect();

    Ok(Json(sub_users))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(admin_id): Path<String>,
    Json(payload): Json<AssignAdminRoleRequest>,
) -> ApiResult<Json<AdminResponse>> {
    let actor = caller_id(&identity)?;
    let admin_id = AdminId::from_str(admin_id.as_str())?;
    let role_id = RoleId::from_str(payload.role_id.as_str())?;
    let admin = state
        .provisioning_guard
        .assign_role(actor, admin_id, role_id)
        .await?;

    Ok(Json(AdminResponse::from(admin)))
}

pub async fn suspend_admin_handler(
    state: State<AppState>,
    identity: Extension<VerifiedIdentity>,
    admin_id: Path<String>,
) -> ApiResult<Json<AdminResponse>> {
    change_status(state, identity, admin_id, AdminStatus::Suspended).await
}

pub async fn reactivate_admin_handler(
    state: State<AppState>,
    identity: Extension<VerifiedIdentity>,
    admin_id: Path<String>,
) -> ApiResult<Json<AdminResponse>> {
    change_status(state, identity, admin_id, AdminStatus::Active).await
}

pub async fn deactivate_admin_handler(
    state: State<AppState>,
    identity: Extension<VerifiedIdentity>,
    admin_id: Path<String>,
) -> ApiResult<Json<AdminResponse>> {
    change_status(state, identity, admin_id, AdminStatus::Inactive).await
}

async fn change_status(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(admin_id): Path<String>,
    status: AdminStatus,
) -> ApiResult<Json<AdminResponse>> {
    let actor = caller_id(&identity)?;
    let admin_id = AdminId::from_str(admin_id.as_str())?;
    let admin = state
        .provisioning_guard
        .change_admin_status(actor, admin_id, status)
        .await?;

    Ok(Json(AdminResponse::from(admin)))
}
