//! Resource/action permission matrix.
//!
//! Every resource owns one canonical action set. A role grants an action by
//! listing it under the resource; anything not listed is denied.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use castellan_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Console resources guarded by the permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    /// Platform-wide configuration.
    SystemConfig,
    /// API keys and integrations.
    ApiManagement,
    /// Pricing plans and fees.
    Pricing,
    /// Merchant accounts.
    MerchantManagement,
    /// Analytics dashboards.
    Analytics,
    /// System health probes.
    SystemHealth,
    /// Compliance reviews.
    Compliance,
    /// Audit trail.
    AuditLogs,
    /// Admin accounts.
    UserManagement,
    /// Roles and permission matrices.
    RoleManagement,
    /// Message and document templates.
    Templates,
    /// Support tickets.
    SupportTickets,
    /// AI prompt library.
    AiPrompts,
    /// Merchant payouts.
    Payouts,
}

impl Resource {
    /// Returns the stable transport key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemConfig => "systemConfig",
            Self::ApiManagement => "apiManagement",
            Self::Pricing => "pricing",
            Self::MerchantManagement => "merchantManagement",
            Self::Analytics => "analytics",
            Self::SystemHealth => "systemHealth",
            Self::Compliance => "compliance",
            Self::AuditLogs => "auditLogs",
            Self::UserManagement => "userManagement",
            Self::RoleManagement => "roleManagement",
            Self::Templates => "templates",
            Self::SupportTickets => "supportTickets",
            Self::AiPrompts => "aiPrompts",
            Self::Payouts => "payouts",
        }
    }

    /// Returns all known resources.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Resource] = &[
            Resource::SystemConfig,
            Resource::ApiManagement,
            Resource::Pricing,
            Resource::MerchantManagement,
            Resource::Analytics,
            Resource::SystemHealth,
            Resource::Compliance,
            Resource::AuditLogs,
            Resource::UserManagement,
            Resource::RoleManagement,
            Resource::Templates,
            Resource::SupportTickets,
            Resource::AiPrompts,
            Resource::Payouts,
        ];

        ALL
    }

    /// Returns the canonical action set for this resource.
    #[must_use]
    pub fn allowed_actions(&self) -> &'static [Action] {
        use Action::{
            Approve, Assign, Close, Create, Delete, Export, Manage, Process, Publish, Read,
            Suspend, Terminate, Update, Write,
        };

        match self {
            Self::SystemConfig | Self::ApiManagement | Self::AiPrompts => {
                &[Read, Write, Delete]
            }
            Self::Pricing | Self::Compliance => &[Read, Write, Approve],
            Self::MerchantManagement => &[Read, Write, Delete, Suspend, Terminate],
            Self::Analytics | Self::AuditLogs => &[Read, Export],
            Self::SystemHealth => &[Read, Manage],
            Self::UserManagement => &[Read, Create, Update, Delete],
            Self::RoleManagement => &[Read, Create, Update, Delete, Assign],
            Self::Templates => &[Read, Write, Delete, Publish],
            Self::SupportTickets => &[Read, Write, Assign, Close],
            Self::Payouts => &[Read, Approve, Process],
        }
    }

    /// Returns whether the action belongs to this resource's action set.
    #[must_use]
    pub fn supports(&self, action: Action) -> bool {
        self.allowed_actions().contains(&action)
    }
}

impl FromStr for Resource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|resource| resource.as_str() == value)
            .ok_or_else(|| AppError::InvalidPermissionKey(format!("unknown resource '{value}'")))
    }
}

/// Actions that may appear in a resource's action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// View records.
    Read,
    /// Create or edit records.
    Write,
    /// Create records.
    Create,
    /// Edit records.
    Update,
    /// Remove records.
    Delete,
    /// Temporarily block a merchant.
    Suspend,
    /// Permanently close a merchant.
    Terminate,
    /// Approve pending changes.
    Approve,
    /// Export data.
    Export,
    /// Operate health tooling.
    Manage,
    /// Assign to a person.
    Assign,
    /// Publish content.
    Publish,
    /// Close tickets.
    Close,
    /// Execute payouts.
    Process,
}

impl Action {
    /// Returns the stable transport key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Suspend => "suspend",
            Self::Terminate => "terminate",
            Self::Approve => "approve",
            Self::Export => "export",
            Self::Manage => "manage",
            Self::Assign => "assign",
            Self::Publish => "publish",
            Self::Close => "close",
            Self::Process => "process",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::Read,
            Action::Write,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::Suspend,
            Action::Terminate,
            Action::Approve,
            Action::Export,
            Action::Manage,
            Action::Assign,
            Action::Publish,
            Action::Close,
            Action::Process,
        ];

        ALL
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::InvalidPermissionKey(format!("unknown action '{value}'")))
    }
}

/// Wire shape of a permission matrix: resource key → action key → granted.
pub type PermissionMatrixTransport = BTreeMap<String, BTreeMap<String, bool>>;

/// Granted actions per resource.
///
/// Empty action sets are never stored, so two matrices granting the same
/// actions always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMatrix {
    grants: BTreeMap<Resource, BTreeSet<Action>>,
}

impl PermissionMatrix {
    /// Creates a matrix that grants nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a matrix granting every action of every resource.
    #[must_use]
    pub fn full() -> Self {
        let grants = Resource::all()
            .iter()
            .map(|resource| {
                (
                    *resource,
                    resource.allowed_actions().iter().copied().collect(),
                )
            })
            .collect();

        Self { grants }
    }

    /// Builds a matrix from resource/action pairs, rejecting pairs outside
    /// the resource's action set.
    pub fn from_grants(grants: impl IntoIterator<Item = (Resource, Action)>) -> AppResult<Self> {
        let mut matrix = Self::empty();
        for (resource, action) in grants {
            matrix.grant(resource, action)?;
        }

        Ok(matrix)
    }

    /// Grants one action on a resource.
    pub fn grant(&mut self, resource: Resource, action: Action) -> AppResult<()> {
        if !resource.supports(action) {
            return Err(AppError::InvalidPermissionKey(format!(
                "action '{}' is not defined for resource '{}'",
                action.as_str(),
                resource.as_str()
            )));
        }

        self.grants.entry(resource).or_default().insert(action);
        Ok(())
    }

    /// Returns whether the matrix grants the action on the resource.
    #[must_use]
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.grants
            .get(&resource)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Returns the granted actions for a resource, if any.
    #[must_use]
    pub fn actions(&self, resource: Resource) -> Option<&BTreeSet<Action>> {
        self.grants.get(&resource)
    }

    /// Returns every granted pair in stable order.
    #[must_use]
    pub fn grants(&self) -> Vec<(Resource, Action)> {
        self.grants
            .iter()
            .flat_map(|(resource, actions)| actions.iter().map(|action| (*resource, *action)))
            .collect()
    }

    /// Returns whether nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Parses the wire shape. `false` entries are treated as absent.
    pub fn from_transport(value: &PermissionMatrixTransport) -> AppResult<Self> {
        let mut matrix = Self::empty();
        for (resource_key, actions) in value {
            let resource = Resource::from_str(resource_key)?;
            for (action_key, granted) in actions {
                let action = Action::from_str(action_key)?;
                if !resource.supports(action) {
                    return Err(AppError::InvalidPermissionKey(format!(
                        "action '{action_key}' is not defined for resource '{resource_key}'"
                    )));
                }
                if *granted {
                    matrix.grant(resource, action)?;
                }
            }
        }

        Ok(matrix)
    }

    /// Renders the wire shape with every allowed action spelled out.
    #[must_use]
    pub fn to_transport(&self) -> PermissionMatrixTransport {
        self.grants
            .iter()
            .map(|(resource, granted)| {
                let actions = resource
                    .allowed_actions()
                    .iter()
                    .map(|action| (action.as_str().to_owned(), granted.contains(action)))
                    .collect();
                (resource.as_str().to_owned(), actions)
            })
            .collect()
    }

    /// Migrates a stored matrix that may still use bare booleans per resource.
    ///
    /// A bare `true` becomes `{read}`; a bare `false` grants nothing; objects
    /// are parsed like the wire shape.
    pub fn from_legacy_json(value: &Value) -> AppResult<Self> {
        let Some(entries) = value.as_object() else {
            return Err(AppError::Validation(
                "legacy permission matrix must be a JSON object".to_owned(),
            ));
        };

        let mut matrix = Self::empty();
        for (resource_key, entry) in entries {
            let resource = Resource::from_str(resource_key)?;
            match entry {
                Value::Bool(true) => matrix.grant(resource, Action::Read)?,
                Value::Bool(false) | Value::Null => {}
                Value::Object(actions) => {
                    for (action_key, granted) in actions {
                        let action = Action::from_str(action_key)?;
                        if !resource.supports(action) {
                            return Err(AppError::InvalidPermissionKey(format!(
                                "action '{action_key}' is not defined for resource '{resource_key}'"
                            )));
                        }
                        if granted.as_bool().unwrap_or(false) {
                            matrix.grant(resource, action)?;
                        }
                    }
                }
                _ => {
                    return Err(AppError::Validation(format!(
                        "legacy permission value for '{resource_key}' must be a boolean or object"
                    )));
                }
            }
        }

        Ok(matrix)
    }
}
