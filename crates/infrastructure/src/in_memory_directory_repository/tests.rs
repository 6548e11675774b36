use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;

use castellan_application::{
    AdminRepository, ProvisioningRepository, RoleAssignmentCommit, RoleRepository, SubRoleQuota,
};
use castellan_core::AppError;
use castellan_domain::{
    AccessLevel, Admin, AdminDefinitionInput, AdminStatus, AuditStamp, PermissionMatrix, Role,
    RoleDefinitionInput, RolePatch,
};

use super::InMemoryDirectoryRepository;

fn role_input(name: &str, level: i64) -> RoleDefinitionInput {
    RoleDefinitionInput {
        name: name.to_owned(),
        display_name: name.to_owned(),
        description: None,
        level,
        can_create_sub_roles: false,
        max_sub_roles: None,
        can_manage_users: true,
        max_sub_users: None,
        parent_role_id: None,
        permissions: PermissionMatrix::empty(),
    }
}

fn role(input: RoleDefinitionInput) -> Role {
    match Role::new_custom(input, None, Utc::now()) {
        Ok(role) => role,
        Err(error) => panic!("invalid role: {error}"),
    }
}

async fn insert_role(repository: &InMemoryDirectoryRepository, input: RoleDefinitionInput) -> Role {
    match repository.insert_role(role(input), SubRoleQuota::Skip).await {
        Ok(role) => role,
        Err(error) => panic!("failed to insert role: {error}"),
    }
}

async fn insert_root(repository: &InMemoryDirectoryRepository, email: &str, role: &Role) -> Admin {
    let admin = match Admin::new_root(email, role, Utc::now()) {
        Ok(admin) => admin,
        Err(error) => panic!("invalid admin: {error}"),
    };
    match repository.insert_root_admin(admin).await {
        Ok(admin) => admin,
        Err(error) => panic!("failed to insert admin: {error}"),
    }
}

fn sub_user(email: &str, role: &Role, manager: &Admin) -> Admin {
    let input = AdminDefinitionInput {
        email: email.to_owned(),
        role_id: role.role_id(),
        can_create_sub_users: false,
        max_sub_users: None,
        team_id: None,
    };
    match Admin::new_sub_user(input, role, manager, Utc::now()) {
        Ok(admin) => admin,
        Err(error) => panic!("invalid sub-user: {error}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_stop_exactly_at_quota() {
    const QUOTA: u32 = 5;
    const ATTEMPTS: usize = 20;

    let repository = Arc::new(InMemoryDirectoryRepository::new());
    let mut lead_input = role_input("lead", 60);
    lead_input.max_sub_users = Some(QUOTA);
    let lead = insert_role(&repository, lead_input).await;
    let agent = insert_role(&repository, role_input("agent", 70)).await;
    let manager = insert_root(&repository, "lead@example.com", &lead).await;

    let mut tasks = JoinSet::new();
    for index in 0..ATTEMPTS {
        let repository = Arc::clone(&repository);
        let candidate = sub_user(&format!("agent{index}@example.com"), &agent, &manager);
        tasks.spawn(async move { repository.commit_sub_user_creation(candidate).await });
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
    let manager = repository.find_admin(manager.admin_id()).await.ok().flatten();
    assert_eq!(manager.map(|admin| admin.created_sub_users_count()), Some(QUOTA));
    let agent = repository.find_role(agent.role_id()).await.ok().flatten();
    assert_eq!(
        agent.map(|role| role.usage_stats().assigned_users_count),
        Some(QUOTA)
    );
}

#[tokio::test]
async fn enforced_insert_rechecks_sub_role_quota() {
    let repository = InMemoryDirectoryRepository::new();
    let mut parent_input = role_input("ops_lead", 20);
    parent_input.can_create_sub_roles = true;
    parent_input.max_sub_roles = Some(1);
    let parent = insert_role(&repository, parent_input).await;

    let mut first = role_input("ops_one", 30);
    first.parent_role_id = Some(parent.role_id());
    let mut second = role_input("ops_two", 40);
    second.parent_role_id = Some(parent.role_id());

    let first = repository.insert_role(role(first), SubRoleQuota::Enforce).await;
    let second = repository.insert_role(role(second), SubRoleQuota::Enforce).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::QuotaExceeded(_))));
}

#[tokio::test]
async fn level_change_rederives_access_level_of_holders() {
    let repository = InMemoryDirectoryRepository::new();
    let auditor = insert_role(&repository, role_input("auditor", 50)).await;
    let holder = insert_root(&repository, "audit@example.com", &auditor).await;

    let patched = auditor.patched(
        &RolePatch {
            level: Some(15),
            ..RolePatch::default()
        },
        AuditStamp::new(Utc::now(), None),
    );
    let patched = match patched {
        Ok(role) => role,
        Err(error) => panic!("invalid patch: {error}"),
    };
    let saved = repository.save_role(patched, auditor.version()).await;

    assert_eq!(saved.ok().map(|role| role.version()), Some(2));
    let holder = repository.find_admin(holder.admin_id()).await.ok().flatten();
    assert_eq!(
        holder.as_ref().map(|admin| admin.access_level()),
        Some(AccessLevel::OpsAdmin)
    );
    assert_eq!(holder.map(|admin| admin.version()), Some(2));
}

fn level_patched(role: &Role, level: i64) -> Role {
    let patch = RolePatch {
        level: Some(level),
        ..RolePatch::default()
    };
    match role.patched(&patch, AuditStamp::new(Utc::now(), None)) {
        Ok(role) => role,
        Err(error) => panic!("invalid patch: {error}"),
    }
}

#[tokio::test]
async fn interleaved_level_changes_cannot_invert_parent_and_child() {
    let repository = InMemoryDirectoryRepository::new();
    let parent = insert_role(&repository, role_input("ops", 20)).await;
    let mut child_input = role_input("finance", 30);
    child_input.parent_role_id = Some(parent.role_id());
    let child = insert_role(&repository, child_input).await;

    let raised_parent = level_patched(&parent, 25);
    let lowered_child = level_patched(&child, 22);
    let first = repository.save_role(raised_parent, parent.version()).await;
    let second = repository.save_role(lowered_child, child.version()).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::InvalidHierarchy(_))));
    let stored = repository.find_role(child.role_id()).await.ok().flatten();
    assert_eq!(stored.map(|role| role.level().value()), Some(30));
}

#[tokio::test]
async fn parent_cannot_sink_below_an_existing_child() {
    let repository = InMemoryDirectoryRepository::new();
    let parent = insert_role(&repository, role_input("ops", 20)).await;
    let mut child_input = role_input("finance", 30);
    child_input.parent_role_id = Some(parent.role_id());
    insert_role(&repository, child_input).await;

    let result = repository
        .save_role(level_patched(&parent, 30), parent.version())
        .await;

    assert!(matches!(result, Err(AppError::InvalidHierarchy(_))));
}

#[tokio::test]
async fn stale_role_save_is_a_conflict() {
    let repository = InMemoryDirectoryRepository::new();
    let auditor = insert_role(&repository, role_input("auditor", 50)).await;

    let deactivated = auditor.deactivated(AuditStamp::new(Utc::now(), None));
    let first = repository.save_role(deactivated.clone(), auditor.version()).await;
    let second = repository.save_role(deactivated, auditor.version()).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn delete_follows_assignment_counter() {
    let repository = InMemoryDirectoryRepository::new();
    let held = insert_role(&repository, role_input("held", 50)).await;
    let spare = insert_role(&repository, role_input("spare", 55)).await;
    insert_root(&repository, "held@example.com", &held).await;

    let held_result = repository.delete_role(held.role_id(), held.version()).await;
    let spare_result = repository.delete_role(spare.role_id(), spare.version()).await;

    assert!(matches!(held_result, Err(AppError::RoleInUse(_))));
    assert!(spare_result.is_ok());
    assert!(matches!(repository.find_role(spare.role_id()).await, Ok(None)));
}

#[tokio::test]
async fn role_assignment_swaps_counters_and_guards_versions() {
    let repository = InMemoryDirectoryRepository::new();
    let root_role = insert_role(&repository, role_input("root_role", 0)).await;
    let system = insert_role(&repository, role_input("system", 10)).await;
    let agent = insert_role(&repository, role_input("agent", 70)).await;
    let root = insert_root(&repository, "root@example.com", &root_role).await;
    let target = insert_root(&repository, "target@example.com", &system).await;

    let commit = RoleAssignmentCommit {
        admin_id: target.admin_id(),
        expected_admin_version: target.version(),
        role_id: agent.role_id(),
        expected_role_version: agent.version(),
        assigner_id: root.admin_id(),
        expected_assigner_role_id: root_role.role_id(),
        stamp: AuditStamp::new(Utc::now(), Some(root.admin_id())),
    };
    let assigned = repository.commit_role_assignment(commit.clone()).await;
    let replayed = repository.commit_role_assignment(commit).await;

    assert_eq!(
        assigned.ok().map(|admin| admin.access_level()),
        Some(AccessLevel::MerchantSupportAgent)
    );
    assert!(matches!(replayed, Err(AppError::Conflict(_))));
    let system = repository.find_role(system.role_id()).await.ok().flatten();
    let agent = repository.find_role(agent.role_id()).await.ok().flatten();
    assert_eq!(system.map(|role| role.usage_stats().assigned_users_count), Some(0));
    assert_eq!(agent.map(|role| role.usage_stats().assigned_users_count), Some(1));
}

#[tokio::test]
async fn status_save_rejects_leaving_inactive() {
    let repository = InMemoryDirectoryRepository::new();
    let lead = insert_role(&repository, role_input("lead", 60)).await;
    let admin = insert_root(&repository, "lead@example.com", &lead).await;
    let stamp = AuditStamp::new(Utc::now(), None);

    let retired = match admin.transitioned(AdminStatus::Inactive, stamp) {
        Ok(admin) => admin,
        Err(error) => panic!("invalid transition: {error}"),
    };
    let saved = match repository.save_admin_status(retired, admin.version()).await {
        Ok(admin) => admin,
        Err(error) => panic!("failed to save status: {error}"),
    };

    // A caller holding a stale active copy cannot revive the admin.
    let revived = admin.with_version(saved.version());
    let result = repository.save_admin_status(revived, saved.version()).await;

    assert_eq!(saved.status(), AdminStatus::Inactive);
    assert!(matches!(result, Err(AppError::Validation(_))));
}
