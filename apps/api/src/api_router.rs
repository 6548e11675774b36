use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use castellan_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: Option<&str>) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route(
            "/api/roles",
            get(handlers::roles::list_roles_handler).post(handlers::roles::create_role_handler),
        )
        .route(
            "/api/roles/assignable",
            get(handlers::roles::list_assignable_roles_handler),
        )
        .route(
            "/api/roles/{role_id}",
            get(handlers::roles::get_role_handler)
                .patch(handlers::roles::update_role_handler)
                .delete(handlers::roles::delete_role_handler),
        )
        .route(
            "/api/roles/{role_id}/deactivate",
            post(handlers::roles::deactivate_role_handler),
        )
        .route(
            "/api/roles/{role_id}/reactivate",
            post(handlers::roles::reactivate_role_handler),
        )
        .route(
            "/api/admins",
            get(handlers::admins::list_admins_handler).post(handlers::admins::create_admin_handler),
        )
        .route(
            "/api/admins/{admin_id}",
            get(handlers::admins::get_admin_handler),
        )
        .route(
            "/api/admins/{admin_id}/sub-users",
            get(handlers::admins::list_sub_users_handler),
        )
        .route(
            "/api/admins/{admin_id}/role",
            put(handlers::admins::assign_role_handler),
        )
        .route(
            "/api/admins/{admin_id}/suspend",
            post(handlers::admins::suspend_admin_handler),
        )
        .route(
            "/api/admins/{admin_id}/reactivate",
            post(handlers::admins::reactivate_admin_handler),
        )
        .route(
            "/api/admins/{admin_id}/deactivate",
            post(handlers::admins::deactivate_admin_handler),
        )
        .route(
            "/api/permissions/check",
            get(handlers::permissions::check_permission_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_identity,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http());

    if let Some(frontend_url) = frontend_url {
        router = router.layer(cors::build_cors_layer(
            frontend_url,
            app_state.identity_header.clone(),
        )?);
    }

    Ok(router.with_state(app_state))
}
