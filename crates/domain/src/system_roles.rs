//! Built-in role catalog seeded at bootstrap.

use castellan_core::AppResult;

use crate::{Action, PermissionMatrix, Resource, RoleDefinitionInput};

/// Name of the level-0 system role.
pub const SUPER_ADMIN_ROLE_NAME: &str = "super_admin";

/// Seed row for one system role; `parent_name` refers to the previous seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRoleSeed {
    /// Role definition; `parent_role_id` is resolved by the seeder.
    pub definition: RoleDefinitionInput,
    /// Name of the parent system role.
    pub parent_name: Option<&'static str>,
}

struct SeedSpec {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    level: i64,
    can_create_sub_roles: bool,
    max_sub_roles: Option<u32>,
    can_manage_users: bool,
    max_sub_users: Option<u32>,
    grants: &'static [(Resource, &'static [Action])],
}

const READ: &[Action] = &[Action::Read];

const SEEDS: &[SeedSpec] = &[
    SeedSpec {
        name: SUPER_ADMIN_ROLE_NAME,
        display_name: "Super Admin",
        description: "Unrestricted platform owner",
        level: 0,
        can_create_sub_roles: true,
        max_sub_roles: None,
        can_manage_users: true,
        max_sub_users: None,
        grants: &[],
    },
    SeedSpec {
        name: "system_admin",
        display_name: "System Admin",
        description: "Platform configuration and role management",
        level: 10,
        can_create_sub_roles: true,
        max_sub_roles: Some(20),
        can_manage_users: true,
        max_sub_users: Some(50),
        grants: &[
            (Resource::SystemConfig, &[Action::Read, Action::Write]),
            (Resource::ApiManagement, &[Action::Read, Action::Write, Action::Delete]),
            (Resource::SystemHealth, &[Action::Read, Action::Manage]),
            (Resource::AuditLogs, &[Action::Read, Action::Export]),
            (
                Resource::UserManagement,
                &[Action::Read, Action::Create, Action::Update, Action::Delete],
            ),
            (
                Resource::RoleManagement,
                &[
                    Action::Read,
                    Action::Create,
                    Action::Update,
                    Action::Delete,
                    Action::Assign,
                ],
            ),
            (Resource::Templates, &[Action::Read, Action::Write, Action::Publish]),
            (Resource::AiPrompts, &[Action::Read, Action::Write]),
            (Resource::Analytics, &[Action::Read, Action::Export]),
        ],
    },
    SeedSpec {
        name: "ops_admin",
        display_name: "Operations Admin",
        description: "Merchant operations and support oversight",
        level: 20,
        can_create_sub_roles: true,
        max_sub_roles: Some(10),
        can_manage_users: true,
        max_sub_users: Some(25),
        grants: &[
            (
                Resource::MerchantManagement,
                &[Action::Read, Action::Write, Action::Suspend],
            ),
            (Resource::SupportTickets, &[Action::Read, Action::Write, Action::Assign, Action::Close]),
            (Resource::SystemHealth, READ),
            (Resource::Analytics, READ),
            (Resource::Templates, &[Action::Read, Action::Write]),
            (
                Resource::UserManagement,
                &[Action::Read, Action::Create, Action::Update],
            ),
            (
                Resource::RoleManagement,
                &[Action::Read, Action::Create, Action::Assign],
            ),
        ],
    },
    SeedSpec {
        name: "finance_admin",
        display_name: "Finance Admin",
        description: "Pricing and payout approvals",
        level: 30,
        can_create_sub_roles: false,
        max_sub_roles: Some(0),
        can_manage_users: true,
        max_sub_users: Some(10),
        grants: &[
            (Resource::Pricing, &[Action::Read, Action::Write, Action::Approve]),
            (Resource::Payouts, &[Action::Read, Action::Approve, Action::Process]),
            (Resource::Analytics, &[Action::Read, Action::Export]),
            (Resource::MerchantManagement, READ),
            (Resource::UserManagement, &[Action::Read, Action::Create]),
            (Resource::RoleManagement, &[Action::Read, Action::Assign]),
        ],
    },
    SeedSpec {
        name: "support_admin",
        display_name: "Support Admin",
        description: "Support desk management",
        level: 40,
        can_create_sub_roles: false,
        max_sub_roles: Some(0),
        can_manage_users: true,
        max_sub_users: Some(10),
        grants: &[
            (Resource::SupportTickets, &[Action::Read, Action::Write, Action::Assign, Action::Close]),
            (Resource::MerchantManagement, &[Action::Read, Action::Write]),
            (Resource::Templates, READ),
            (Resource::UserManagement, &[Action::Read, Action::Create]),
            (Resource::RoleManagement, &[Action::Read, Action::Assign]),
        ],
    },
    SeedSpec {
        name: "audit_admin",
        display_name: "Audit Admin",
        description: "Read-only compliance review",
        level: 50,
        can_create_sub_roles: false,
        max_sub_roles: Some(0),
        can_manage_users: false,
        max_sub_users: Some(0),
        grants: &[
            (Resource::AuditLogs, &[Action::Read, Action::Export]),
            (Resource::Compliance, &[Action::Read, Action::Approve]),
            (Resource::Analytics, READ),
        ],
    },
    SeedSpec {
        name: "merchant_support_lead",
        display_name: "Merchant Support Lead",
        description: "Leads a merchant support team",
        level: 60,
        can_create_sub_roles: false,
        max_sub_roles: Some(0),
        can_manage_users: true,
        max_sub_users: Some(5),
        grants: &[
            (Resource::SupportTickets, &[Action::Read, Action::Write, Action::Assign, Action::Close]),
            (Resource::MerchantManagement, READ),
            (Resource::UserManagement, &[Action::Read, Action::Create]),
            (Resource::RoleManagement, &[Action::Read, Action::Assign]),
        ],
    },
    SeedSpec {
        name: "merchant_support_agent",
        display_name: "Merchant Support Agent",
        description: "Handles merchant tickets",
        level: 70,
        can_create_sub_roles: false,
        max_sub_roles: Some(0),
        can_manage_users: false,
        max_sub_users: Some(0),
        grants: &[
            (Resource::SupportTickets, &[Action::Read, Action::Write]),
            (Resource::MerchantManagement, READ),
        ],
    },
];

/// Returns the system role seeds ordered from most to least privileged.
///
/// The super admin seed carries the full matrix even though its holders
/// bypass permission checks.
pub fn system_role_seeds() -> AppResult<Vec<SystemRoleSeed>> {
    let mut parent_name = None;
    let mut seeds = Vec::with_capacity(SEEDS.len());

    for seed in SEEDS {
        let permissions = if seed.level == 0 {
            PermissionMatrix::full()
        } else {
            PermissionMatrix::from_grants(seed.grants.iter().flat_map(|(resource, actions)| {
                actions.iter().map(move |action| (*resource, *action))
            }))?
        };

        seeds.push(SystemRoleSeed {
            definition: RoleDefinitionInput {
                name: seed.name.to_owned(),
                display_name: seed.display_name.to_owned(),
                description: Some(seed.description.to_owned()),
                level: seed.level,
                can_create_sub_roles: seed.can_create_sub_roles,
                max_sub_roles: seed.max_sub_roles,
                can_manage_users: seed.can_manage_users,
                max_sub_users: seed.max_sub_users,
                parent_role_id: None,
                permissions,
            },
            parent_name,
        });
        parent_name = Some(seed.name);
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::{SUPER_ADMIN_ROLE_NAME, system_role_seeds};
    use crate::{Action, Resource};

    #[test]
    fn seeds_are_strictly_ordered_and_chained() {
        let seeds = system_role_seeds().unwrap_or_default();
        assert_eq!(seeds.len(), 8);
        assert_eq!(seeds[0].definition.name, SUPER_ADMIN_ROLE_NAME);
        assert_eq!(seeds[0].parent_name, None);

        for pair in seeds.windows(2) {
            assert!(pair[0].definition.level < pair[1].definition.level);
            assert_eq!(pair[1].parent_name, Some(pair[0].definition.name.as_str()));
        }
    }

    #[test]
    fn agent_matrix_is_narrow() {
        let seeds = system_role_seeds().unwrap_or_default();
        let agent = seeds.last().map(|seed| seed.definition.permissions.clone());
        let agent = agent.unwrap_or_default();

        assert!(agent.allows(Resource::SupportTickets, Action::Write));
        assert!(!agent.allows(Resource::SupportTickets, Action::Close));
        assert!(!agent.allows(Resource::Payouts, Action::Read));
    }
}
