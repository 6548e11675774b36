use castellan_core::AppError;
use castellan_domain::{Action, AdminId, AdminStatus, AuditStamp, PermissionMatrix, Resource};
use chrono::Utc;
use proptest::prelude::*;

use crate::test_support::{FakeDirectory, custom_role, role_input, root_admin, system_role};

use super::PermissionResolver;

fn resource_strategy() -> impl Strategy<Value = Resource> {
    proptest::sample::select(Resource::all().to_vec())
}

fn action_strategy() -> impl Strategy<Value = Action> {
    proptest::sample::select(Action::all().to_vec())
}

fn grants_strategy() -> impl Strategy<Value = Vec<(Resource, Action)>> {
    proptest::collection::vec((resource_strategy(), action_strategy()), 0..24)
}

fn matrix(grants: &[(Resource, Action)]) -> PermissionMatrix {
    PermissionMatrix::from_grants(
        grants
            .iter()
            .copied()
            .filter(|(resource, action)| resource.supports(*action)),
    )
    .unwrap_or_default()
}

proptest! {
    #[test]
    fn super_admin_is_allowed_regardless_of_role_content(
        grants in grants_strategy(),
        resource in resource_strategy(),
        action in action_strategy(),
    ) {
        let mut input = role_input("super_admin", 0);
        input.permissions = matrix(&grants);
        let role = system_role(input);
        let admin = root_admin("root@example.com", &role);

        prop_assert!(PermissionResolver::can(&admin, Some(&role), resource, action));
        prop_assert!(PermissionResolver::can(&admin, None, resource, action));
    }

    #[test]
    fn regular_admin_gets_exactly_the_matrix(
        grants in grants_strategy(),
        level in 1_i64..=100,
        resource in resource_strategy(),
        action in action_strategy(),
    ) {
        let mut input = role_input("operator", level);
        input.permissions = matrix(&grants);
        let role = custom_role(input);
        let admin = root_admin("ops@example.com", &role);

        prop_assert_eq!(
            PermissionResolver::can(&admin, Some(&role), resource, action),
            role.permissions().allows(resource, action)
        );
    }
}

#[test]
fn suspended_super_admin_is_denied() {
    let role = system_role(role_input("super_admin", 0));
    let admin = root_admin("root@example.com", &role);
    let suspended = admin.transitioned(AdminStatus::Suspended, AuditStamp::new(Utc::now(), None));

    let suspended = match suspended {
        Ok(admin) => admin,
        Err(error) => panic!("unexpected error: {error}"),
    };
    assert!(!PermissionResolver::can(
        &suspended,
        Some(&role),
        Resource::SystemConfig,
        Action::Read
    ));
}

#[test]
fn foreign_or_inactive_role_is_denied() {
    let mut input = role_input("operator", 20);
    input.permissions = PermissionMatrix::full();
    let role = custom_role(input.clone());
    let admin = root_admin("ops@example.com", &role);
    input.name = "other".to_owned();
    let other = custom_role(input);
    let inactive = role.deactivated(AuditStamp::new(Utc::now(), None));

    assert!(!PermissionResolver::can(&admin, Some(&other), Resource::Pricing, Action::Read));
    assert!(!PermissionResolver::can(&admin, Some(&inactive), Resource::Pricing, Action::Read));
    assert!(!PermissionResolver::can(&admin, None, Resource::Pricing, Action::Read));
    assert!(PermissionResolver::can(&admin, Some(&role), Resource::Pricing, Action::Read));
}

#[test]
fn stale_super_admin_projection_does_not_bypass() {
    let super_role = system_role(role_input("super_admin", 0));
    let admin = root_admin("root@example.com", &super_role);
    let mut input = role_input("finance", 30);
    input.permissions = PermissionMatrix::full();
    let demoted = custom_role(input);

    assert!(!PermissionResolver::can(
        &admin,
        Some(&demoted),
        Resource::SystemConfig,
        Action::Delete
    ));
}

#[tokio::test]
async fn unknown_admin_is_denied_without_error() {
    let directory = FakeDirectory::new();
    let resolver = PermissionResolver::new(directory.clone(), directory);

    let allowed = resolver
        .can_admin(AdminId::new(), Resource::AuditLogs, Action::Read)
        .await;

    assert!(!allowed);
}

#[tokio::test]
async fn require_maps_denial_to_forbidden() {
    let directory = FakeDirectory::new();
    let mut input = role_input("auditor", 50);
    input.permissions =
        PermissionMatrix::from_grants([(Resource::AuditLogs, Action::Read)]).unwrap_or_default();
    let role = directory.seed_role(custom_role(input)).await;
    let admin = directory.seed_admin(root_admin("audit@example.com", &role)).await;
    let resolver = PermissionResolver::new(directory.clone(), directory);

    let allowed = resolver
        .require(admin.admin_id(), Resource::AuditLogs, Action::Read)
        .await;
    let denied = resolver
        .require(admin.admin_id(), Resource::AuditLogs, Action::Export)
        .await;
    let unknown = resolver
        .require(AdminId::new(), Resource::AuditLogs, Action::Read)
        .await;

    assert!(allowed.is_ok());
    assert!(matches!(denied, Err(AppError::Forbidden(_))));
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
}
