use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    Admin, AdminDefinitionInput, AdminId, EmailAddress, PermissionMatrix, Role,
    RoleDefinitionInput, RoleId, RoleName, RoleUsageStats,
};

use crate::{
    AdminQuery, AdminRepository, AuditEvent, AuditRepository, ProvisionedSubUser,
    ProvisioningRepository, RoleAssignmentCommit, RoleQuery, RoleRepository, SubRoleQuota,
};

#[derive(Default)]
struct FakeState {
    roles: HashMap<RoleId, Role>,
    admins: HashMap<AdminId, Admin>,
    events: Vec<AuditEvent>,
}

/// Single-lock fake implementing every directory port.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    state: Mutex<FakeState>,
    fail_audit: bool,
}

impl FakeDirectory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_failing_audit() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            fail_audit: true,
        })
    }

    pub(crate) async fn seed_role(&self, role: Role) -> Role {
        let role = role.with_version(1);
        self.state
            .lock()
            .await
            .roles
            .insert(role.role_id(), role.clone());
        role
    }

    pub(crate) async fn seed_admin(&self, admin: Admin) -> Admin {
        let admin = admin.with_version(1);
        let mut state = self.state.lock().await;
        bump_assigned(&mut state, admin.role_id(), 1);
        state.admins.insert(admin.admin_id(), admin.clone());
        admin
    }

    pub(crate) async fn role(&self, role_id: RoleId) -> Option<Role> {
        self.state.lock().await.roles.get(&role_id).cloned()
    }

    pub(crate) async fn admin(&self, admin_id: AdminId) -> Option<Admin> {
        self.state.lock().await.admins.get(&admin_id).cloned()
    }

    pub(crate) async fn events(&self) -> Vec<AuditEvent> {
        self.state.lock().await.events.clone()
    }
}

fn bump_assigned(state: &mut FakeState, role_id: RoleId, delta: i64) {
    if let Some(role) = state.roles.remove(&role_id) {
        let count = i64::from(role.usage_stats().assigned_users_count) + delta;
        let role = role.with_usage_stats(RoleUsageStats {
            assigned_users_count: u32::try_from(count.max(0)).unwrap_or_default(),
        });
        state.roles.insert(role_id, role);
    }
}

fn name_taken(state: &FakeState, role: &Role) -> bool {
    role.is_active()
        && state.roles.values().any(|other| {
            other.role_id() != role.role_id() && other.is_active() && other.name() == role.name()
        })
}

#[async_trait]
impl RoleRepository for FakeDirectory {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.role(role_id).await)
    }

    async fn find_active_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .values()
            .find(|role| role.is_active() && role.name() == name)
            .cloned())
    }

    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|role| query.matches(role))
            .cloned()
            .collect();
        roles.sort_by(|left, right| {
            left.level()
                .cmp(&right.level())
                .then_with(|| left.name().cmp(right.name()))
        });
        Ok(roles
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn list_child_roles(&self, parent_role_id: RoleId) -> AppResult<Vec<Role>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .values()
            .filter(|role| role.parent_role_id() == Some(parent_role_id))
            .cloned()
            .collect())
    }

    async fn insert_role(&self, role: Role, quota: SubRoleQuota) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if name_taken(&state, &role) {
            return Err(AppError::DuplicateName(format!(
                "role name '{}' is taken",
                role.name()
            )));
        }

        if let Some(parent) = role
            .parent_role_id()
            .and_then(|parent_role_id| state.roles.get(&parent_role_id))
        {
            parent.ensure_outranks_child(&role)?;
        }

        if quota == SubRoleQuota::Enforce
            && let Some(parent_role_id) = role.parent_role_id()
        {
            let parent = state
                .roles
                .get(&parent_role_id)
                .ok_or_else(|| AppError::NotFound(format!("role '{parent_role_id}'")))?;
            let children = state
                .roles
                .values()
                .filter(|child| child.parent_role_id() == Some(parent_role_id))
                .count();
            let full = parent
                .max_sub_roles()
                .is_some_and(|max| children >= max as usize);
            if !parent.can_create_sub_roles() || full {
                return Err(AppError::QuotaExceeded(format!(
                    "role '{}' cannot take more sub-roles",
                    parent.name()
                )));
            }
        }

        let role = role.with_version(1);
        state.roles.insert(role.role_id(), role.clone());
        Ok(role)
    }

    async fn save_role(&self, role: Role, expected_version: u64) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        let current = state
            .roles
            .get(&role.role_id())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{}'", role.role_id())))?;
        if current.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "role '{}' changed concurrently",
                role.role_id()
            )));
        }
        if name_taken(&state, &role) {
            return Err(AppError::DuplicateName(format!(
                "role name '{}' is taken",
                role.name()
            )));
        }
        if role.hierarchy_differs(&current) {
            if let Some(parent) = role
                .parent_role_id()
                .and_then(|parent_role_id| state.roles.get(&parent_role_id))
            {
                parent.ensure_outranks_child(&role)?;
            }
            for child in state
                .roles
                .values()
                .filter(|child| child.parent_role_id() == Some(role.role_id()))
            {
                role.ensure_outranks_child(child)?;
            }
        }

        let role = role
            .with_usage_stats(current.usage_stats())
            .with_version(expected_version + 1);
        if role.level() != current.level() {
            for admin in state.admins.values_mut() {
                if admin.role_id() == role.role_id() {
                    *admin = admin.with_access_level_of(&role);
                }
            }
        }
        state.roles.insert(role.role_id(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId, expected_version: u64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let current = state
            .roles
            .get(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}'")))?;
        if current.version() != expected_version {
            return Err(AppError::Conflict(format!("role '{role_id}' changed")));
        }
        let has_children = state
            .roles
            .values()
            .any(|role| role.parent_role_id() == Some(role_id));
        if current.usage_stats().assigned_users_count > 0 || has_children {
            return Err(AppError::RoleInUse(format!("role '{role_id}' is in use")));
        }
        state.roles.remove(&role_id);
        Ok(())
    }
}

#[async_trait]
impl AdminRepository for FakeDirectory {
    async fn find_admin(&self, admin_id: AdminId) -> AppResult<Option<Admin>> {
        Ok(self.admin(admin_id).await)
    }

    async fn find_admin_by_email(&self, email: &EmailAddress) -> AppResult<Option<Admin>> {
        Ok(self
            .state
            .lock()
            .await
            .admins
            .values()
            .find(|admin| admin.email() == email)
            .cloned())
    }

    async fn list_admins(&self, query: &AdminQuery) -> AppResult<Vec<Admin>> {
        let state = self.state.lock().await;
        let mut admins: Vec<Admin> = state
            .admins
            .values()
            .filter(|admin| query.matches(admin))
            .cloned()
            .collect();
        admins.sort_by(|left, right| left.email().as_str().cmp(right.email().as_str()));
        Ok(admins
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn insert_root_admin(&self, admin: Admin) -> AppResult<Admin> {
        Ok(self.seed_admin(admin).await)
    }

    async fn save_admin_status(&self, admin: Admin, expected_version: u64) -> AppResult<Admin> {
        let mut state = self.state.lock().await;
        let current = state
            .admins
            .get(&admin.admin_id())
            .ok_or_else(|| AppError::NotFound(format!("admin '{}'", admin.admin_id())))?;
        if current.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "admin '{}' changed",
                admin.admin_id()
            )));
        }
        let admin = admin.with_version(expected_version + 1);
        state.admins.insert(admin.admin_id(), admin.clone());
        Ok(admin)
    }
}

#[async_trait]
impl ProvisioningRepository for FakeDirectory {
    async fn commit_sub_user_creation(&self, sub_user: Admin) -> AppResult<ProvisionedSubUser> {
        let mut state = self.state.lock().await;
        let manager_id = sub_user
            .manager_id()
            .ok_or_else(|| AppError::Validation("sub-user needs a manager".to_owned()))?;
        let mut manager = state
            .admins
            .get(&manager_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("admin '{manager_id}'")))?;
        if state
            .admins
            .values()
            .any(|admin| admin.email() == sub_user.email())
        {
            return Err(AppError::Validation("email already registered".to_owned()));
        }

        manager.record_sub_user_created(sub_user.created())?;
        let next_version = manager.version() + 1;
        let manager = manager.with_version(next_version);
        let sub_user = sub_user.with_version(1);
        bump_assigned(&mut state, sub_user.role_id(), 1);
        state.admins.insert(manager.admin_id(), manager.clone());
        state.admins.insert(sub_user.admin_id(), sub_user.clone());

        Ok(ProvisionedSubUser { sub_user, manager })
    }

    async fn commit_role_assignment(&self, commit: RoleAssignmentCommit) -> AppResult<Admin> {
        let mut state = self.state.lock().await;
        let admin = state
            .admins
            .get(&commit.admin_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("admin '{}'", commit.admin_id)))?;
        let role = state
            .roles
            .get(&commit.role_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{}'", commit.role_id)))?;
        let assigner_matches = state.admins.get(&commit.assigner_id).is_some_and(|assigner| {
            assigner.is_active() && assigner.role_id() == commit.expected_assigner_role_id
        });
        if admin.version() != commit.expected_admin_version
            || role.version() != commit.expected_role_version
            || !assigner_matches
        {
            return Err(AppError::Conflict("assignment inputs changed".to_owned()));
        }

        let previous_role_id = admin.role_id();
        let admin = admin
            .with_role(&role, commit.stamp)
            .with_version(admin.version() + 1);
        if previous_role_id != role.role_id() {
            bump_assigned(&mut state, previous_role_id, -1);
            bump_assigned(&mut state, role.role_id(), 1);
        }
        state.admins.insert(admin.admin_id(), admin.clone());
        Ok(admin)
    }
}

#[async_trait]
impl AuditRepository for FakeDirectory {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail_audit {
            return Err(AppError::Internal("audit sink offline".to_owned()));
        }
        self.state.lock().await.events.push(event);
        Ok(())
    }
}

pub(crate) fn role_input(name: &str, level: i64) -> RoleDefinitionInput {
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

pub(crate) fn custom_role(input: RoleDefinitionInput) -> Role {
    match Role::new_custom(input, None, Utc::now()) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role: {error}"),
    }
}

pub(crate) fn system_role(input: RoleDefinitionInput) -> Role {
    match Role::new_system(input, Utc::now()) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role: {error}"),
    }
}

pub(crate) fn root_admin(email: &str, role: &Role) -> Admin {
    match Admin::new_root(email, role, Utc::now()) {
        Ok(admin) => admin,
        Err(error) => panic!("invalid test admin: {error}"),
    }
}

pub(crate) fn sub_user_input(email: &str, role: &Role) -> AdminDefinitionInput {
    AdminDefinitionInput {
        email: email.to_owned(),
        role_id: role.role_id(),
        can_create_sub_users: false,
        max_sub_users: None,
        team_id: None,
    }
}
