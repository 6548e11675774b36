use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::task::JoinSet;

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    AccessLevel, Action, Admin, AdminStatus, AuditAction, PermissionMatrix, Resource, Role,
};

use crate::test_support::{
    FakeDirectory, custom_role, role_input, root_admin, sub_user_input, system_role,
};
use crate::{
    AdminDirectoryService, PermissionResolver, ProvisionedSubUser, ProvisioningRepository,
    RoleAssignmentCommit, RoleCatalogService, RoleHierarchyValidator, RoleUpdate,
};

use super::ProvisioningGuard;

fn guard_with(
    directory: &Arc<FakeDirectory>,
    provisioning: Arc<dyn ProvisioningRepository>,
    audit: Arc<FakeDirectory>,
    retries: u32,
) -> ProvisioningGuard {
    let catalog = RoleCatalogService::new(
        directory.clone(),
        RoleHierarchyValidator::new(directory.clone(), 64),
    );
    ProvisioningGuard::new(
        catalog,
        AdminDirectoryService::new(directory.clone(), directory.clone()),
        PermissionResolver::new(directory.clone(), directory.clone()),
        provisioning,
        audit,
        retries,
    )
}

fn guard(directory: &Arc<FakeDirectory>) -> ProvisioningGuard {
    guard_with(directory, directory.clone(), directory.clone(), 3)
}

async fn seeded_role(
    directory: &FakeDirectory,
    name: &str,
    level: i64,
    grants: &[(Resource, Action)],
    max_sub_users: Option<u32>,
) -> Role {
    let mut input = role_input(name, level);
    input.permissions = PermissionMatrix::from_grants(grants.iter().copied()).unwrap_or_default();
    input.max_sub_users = max_sub_users;
    directory.seed_role(system_role(input)).await
}

fn unwrap_ok<T>(result: AppResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("unexpected error: {error}"),
    }
}

#[tokio::test]
async fn super_admin_demotion_recomputes_access_level() {
    let directory = FakeDirectory::new();
    let root_role = seeded_role(&directory, "super_admin", 0, &[], None).await;
    let system = seeded_role(&directory, "system_admin", 10, &[], None).await;
    let agent = seeded_role(&directory, "merchant_support_agent", 70, &[], None).await;
    let root = directory.seed_admin(root_admin("root@example.com", &root_role)).await;
    let target = directory.seed_admin(root_admin("sys@example.com", &system)).await;
    let guard = guard(&directory);

    let assigned = unwrap_ok(
        guard
            .assign_role(root.admin_id(), target.admin_id(), agent.role_id())
            .await,
    );

    assert_eq!(assigned.role_id(), agent.role_id());
    assert_eq!(assigned.access_level(), AccessLevel::MerchantSupportAgent);
    let system_after = directory.role(system.role_id()).await;
    let agent_after = directory.role(agent.role_id()).await;
    assert_eq!(
        system_after.map(|role| role.usage_stats().assigned_users_count),
        Some(0)
    );
    assert_eq!(
        agent_after.map(|role| role.usage_stats().assigned_users_count),
        Some(1)
    );
}

#[tokio::test]
async fn support_admin_assigning_finance_role_is_escalation() {
    let directory = FakeDirectory::new();
    let assign = [(Resource::RoleManagement, Action::Assign)];
    let support = seeded_role(&directory, "support_admin", 40, &assign, None).await;
    let finance = seeded_role(&directory, "finance_admin", 30, &[], None).await;
    let agent = seeded_role(&directory, "merchant_support_agent", 70, &[], None).await;
    let assigner = directory.seed_admin(root_admin("support@example.com", &support)).await;
    let target = directory.seed_admin(root_admin("agent@example.com", &agent)).await;
    let guard = guard(&directory);

    let result = guard
        .assign_role(assigner.admin_id(), target.admin_id(), finance.role_id())
        .await;

    assert!(matches!(result, Err(AppError::PrivilegeEscalation(_))));
    let unchanged = directory.admin(target.admin_id()).await;
    assert_eq!(unchanged.map(|admin| admin.role_id()), Some(agent.role_id()));
}

#[tokio::test]
async fn assignment_without_assign_permission_is_forbidden() {
    let directory = FakeDirectory::new();
    let support = seeded_role(&directory, "support_admin", 40, &[], None).await;
    let agent = seeded_role(&directory, "merchant_support_agent", 70, &[], None).await;
    let assigner = directory.seed_admin(root_admin("support@example.com", &support)).await;
    let target = directory.seed_admin(root_admin("agent@example.com", &agent)).await;
    let guard = guard(&directory);

    let result = guard
        .assign_role(assigner.admin_id(), target.admin_id(), agent.role_id())
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sub_user_creation_never_overshoots_quota() {
    const QUOTA: u32 = 3;
    const ATTEMPTS: usize = 12;

    let directory = FakeDirectory::new();
    let lead = seeded_role(&directory, "lead", 60, &[], Some(QUOTA)).await;
    let agent = seeded_role(&directory, "agent", 70, &[], None).await;
    let creator = directory.seed_admin(root_admin("lead@example.com", &lead)).await;
    let guard = Arc::new(guard(&directory));

    let mut tasks = JoinSet::new();
    for index in 0..ATTEMPTS {
        let guard = Arc::clone(&guard);
        let input = sub_user_input(&format!("agent{index}@example.com"), &agent);
        let creator_id = creator.admin_id();
        tasks.spawn(async move { guard.create_admin(creator_id, input).await });
    }

    let mut succeeded = 0;
    let mut quota_exceeded = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(_)) => succeeded += 1,
            Ok(Err(AppError::QuotaExceeded(_))) => quota_exceeded += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(succeeded, QUOTA as usize);
    assert_eq!(quota_exceeded, ATTEMPTS - QUOTA as usize);
    let creator_after = directory.admin(creator.admin_id()).await;
    assert_eq!(
        creator_after.map(|admin| admin.created_sub_users_count()),
        Some(QUOTA)
    );
}

#[tokio::test]
async fn created_sub_user_is_audited() {
    let directory = FakeDirectory::new();
    let lead = seeded_role(&directory, "lead", 60, &[], Some(2)).await;
    let agent = seeded_role(&directory, "agent", 70, &[], None).await;
    let creator = directory.seed_admin(root_admin("lead@example.com", &lead)).await;
    let guard = guard(&directory);

    let created = unwrap_ok(
        guard
            .create_admin(creator.admin_id(), sub_user_input("agent@example.com", &agent))
            .await,
    );

    let events = directory.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::AdminCreated);
    assert_eq!(events[0].actor, Some(creator.admin_id()));
    assert_eq!(events[0].resource_id, created.admin_id().to_string());
    assert!(events[0].before.is_none());
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_mutation() {
    let directory = FakeDirectory::new();
    let lead = seeded_role(&directory, "lead", 60, &[], None).await;
    let agent = seeded_role(&directory, "agent", 70, &[], None).await;
    let creator = directory.seed_admin(root_admin("lead@example.com", &lead)).await;
    let guard = guard_with(
        &directory,
        directory.clone(),
        FakeDirectory::with_failing_audit(),
        3,
    );

    let result = guard
        .create_admin(creator.admin_id(), sub_user_input("agent@example.com", &agent))
        .await;

    assert!(result.is_ok());
}

struct ConflictingProvisioning {
    inner: Arc<FakeDirectory>,
    conflicts_left: AtomicU32,
    calls: AtomicU32,
}

#[async_trait]
impl ProvisioningRepository for ConflictingProvisioning {
    async fn commit_sub_user_creation(&self, sub_user: Admin) -> AppResult<ProvisionedSubUser> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::Conflict("simulated write conflict".to_owned()));
        }
        self.inner.commit_sub_user_creation(sub_user).await
    }

    async fn commit_role_assignment(&self, commit: RoleAssignmentCommit) -> AppResult<Admin> {
        self.inner.commit_role_assignment(commit).await
    }
}

#[tokio::test]
async fn conflicts_are_retried_up_to_the_limit() {
    let directory = FakeDirectory::new();
    let lead = seeded_role(&directory, "lead", 60, &[], None).await;
    let agent = seeded_role(&directory, "agent", 70, &[], None).await;
    let creator = directory.seed_admin(root_admin("lead@example.com", &lead)).await;

    let recovering = Arc::new(ConflictingProvisioning {
        inner: directory.clone(),
        conflicts_left: AtomicU32::new(2),
        calls: AtomicU32::new(0),
    });
    let guard = guard_with(&directory, recovering.clone(), directory.clone(), 3);
    let recovered = guard
        .create_admin(creator.admin_id(), sub_user_input("one@example.com", &agent))
        .await;
    assert!(recovered.is_ok());
    assert_eq!(recovering.calls.load(Ordering::SeqCst), 3);

    let stuck = Arc::new(ConflictingProvisioning {
        inner: directory.clone(),
        conflicts_left: AtomicU32::new(10),
        calls: AtomicU32::new(0),
    });
    let guard = guard_with(&directory, stuck.clone(), directory.clone(), 3);
    let surfaced = guard
        .create_admin(creator.admin_id(), sub_user_input("two@example.com", &agent))
        .await;
    assert!(matches!(surfaced, Err(AppError::Conflict(_))));
    assert_eq!(stuck.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn assignable_roles_are_strictly_below_requester() {
    let directory = FakeDirectory::new();
    let root_role = seeded_role(&directory, "super_admin", 0, &[], None).await;
    let ops = seeded_role(&directory, "ops_admin", 20, &[], None).await;
    seeded_role(&directory, "finance_admin", 30, &[], None).await;
    let agent = seeded_role(&directory, "agent", 70, &[], None).await;
    let retired = directory
        .seed_role(custom_role(role_input("retired", 80)).deactivated(
            castellan_domain::AuditStamp::new(chrono::Utc::now(), None),
        ))
        .await;
    let root = directory.seed_admin(root_admin("root@example.com", &root_role)).await;
    let operator = directory.seed_admin(root_admin("ops@example.com", &ops)).await;
    let guard = guard(&directory);

    let for_root = unwrap_ok(guard.list_assignable_roles(root.admin_id()).await);
    let for_ops = unwrap_ok(guard.list_assignable_roles(operator.admin_id()).await);

    assert_eq!(for_root.len(), 4);
    let ops_names: Vec<&str> = for_ops.iter().map(|role| role.name().as_str()).collect();
    assert_eq!(ops_names, vec!["finance_admin", "agent"]);
    assert!(for_ops.iter().all(|role| role.role_id() != retired.role_id()));
    assert!(for_ops.iter().any(|role| role.role_id() == agent.role_id()));
}

#[tokio::test]
async fn role_changes_require_outranking_the_role() {
    let directory = FakeDirectory::new();
    let manage = [
        (Resource::RoleManagement, Action::Update),
        (Resource::RoleManagement, Action::Delete),
    ];
    let lead = seeded_role(&directory, "lead", 60, &manage, None).await;
    let peer = directory.seed_role(custom_role(role_input("peer", 60))).await;
    let below = directory.seed_role(custom_role(role_input("below", 65))).await;
    let actor = directory.seed_admin(root_admin("lead@example.com", &lead)).await;
    let guard = guard(&directory);

    let peer_result = guard.delete_role(actor.admin_id(), peer.role_id()).await;
    let below_result = guard.deactivate_role(actor.admin_id(), below.role_id()).await;

    assert!(matches!(peer_result, Err(AppError::PrivilegeEscalation(_))));
    assert_eq!(below_result.ok().map(|role| role.is_active()), Some(false));
    let events = directory.events().await;
    assert_eq!(
        events.iter().map(|event| event.action).collect::<Vec<_>>(),
        vec![AuditAction::RoleDeactivated]
    );
}

#[tokio::test]
async fn role_update_cannot_lift_a_role_to_or_above_the_actor() {
    let directory = FakeDirectory::new();
    let update = [(Resource::RoleManagement, Action::Update)];
    let ops = seeded_role(&directory, "ops_admin", 20, &update, None).await;
    let system = seeded_role(&directory, "system_admin", 10, &[], None).await;
    let helper = directory.seed_role(custom_role(role_input("helper", 50))).await;
    let actor = directory.seed_admin(root_admin("ops@example.com", &ops)).await;
    let holder = directory.seed_admin(root_admin("helper@example.com", &helper)).await;
    let guard = guard(&directory);

    let to_root = guard
        .update_role(
            actor.admin_id(),
            helper.role_id(),
            RoleUpdate {
                level: Some(0),
                parent_role_id: Some(None),
                ..RoleUpdate::default()
            },
        )
        .await;
    let to_peer = guard
        .update_role(
            actor.admin_id(),
            helper.role_id(),
            RoleUpdate {
                level: Some(20),
                ..RoleUpdate::default()
            },
        )
        .await;
    let under_system = guard
        .update_role(
            actor.admin_id(),
            helper.role_id(),
            RoleUpdate {
                parent_role_id: Some(Some(system.role_id())),
                ..RoleUpdate::default()
            },
        )
        .await;

    assert!(matches!(to_root, Err(AppError::PrivilegeEscalation(_))));
    assert!(matches!(to_peer, Err(AppError::PrivilegeEscalation(_))));
    assert!(matches!(under_system, Err(AppError::PrivilegeEscalation(_))));
    let holder_after = directory.admin(holder.admin_id()).await;
    assert_eq!(
        holder_after.map(|admin| admin.access_level()),
        Some(AccessLevel::AuditAdmin)
    );
    let resolver = PermissionResolver::new(directory.clone(), directory.clone());
    assert!(
        !resolver
            .can_admin(holder.admin_id(), Resource::SystemConfig, Action::Delete)
            .await
    );
}

#[tokio::test]
async fn role_update_below_the_actor_is_applied() {
    let directory = FakeDirectory::new();
    let update = [(Resource::RoleManagement, Action::Update)];
    let ops = seeded_role(&directory, "ops_admin", 20, &update, None).await;
    let helper = directory.seed_role(custom_role(role_input("helper", 50))).await;
    let actor = directory.seed_admin(root_admin("ops@example.com", &ops)).await;
    let holder = directory.seed_admin(root_admin("helper@example.com", &helper)).await;
    let guard = guard(&directory);

    let updated = unwrap_ok(
        guard
            .update_role(
                actor.admin_id(),
                helper.role_id(),
                RoleUpdate {
                    level: Some(25),
                    parent_role_id: Some(Some(ops.role_id())),
                    ..RoleUpdate::default()
                },
            )
            .await,
    );

    assert_eq!(updated.level().value(), 25);
    assert_eq!(updated.parent_role_id(), Some(ops.role_id()));
    let holder_after = directory.admin(holder.admin_id()).await;
    assert_eq!(
        holder_after.map(|admin| admin.access_level()),
        Some(AccessLevel::FinanceAdmin)
    );
}

#[tokio::test]
async fn admins_cannot_change_their_own_status() {
    let directory = FakeDirectory::new();
    let update = [(Resource::UserManagement, Action::Update)];
    let lead = seeded_role(&directory, "lead", 60, &update, None).await;
    let agent = seeded_role(&directory, "agent", 70, &[], None).await;
    let actor = directory.seed_admin(root_admin("lead@example.com", &lead)).await;
    let target = directory.seed_admin(root_admin("agent@example.com", &agent)).await;
    let guard = guard(&directory);

    let own = guard
        .change_admin_status(actor.admin_id(), actor.admin_id(), AdminStatus::Suspended)
        .await;
    let other = guard
        .change_admin_status(actor.admin_id(), target.admin_id(), AdminStatus::Suspended)
        .await;

    assert!(matches!(own, Err(AppError::Forbidden(_))));
    assert_eq!(
        other.ok().map(|admin| admin.status()),
        Some(AdminStatus::Suspended)
    );
}
