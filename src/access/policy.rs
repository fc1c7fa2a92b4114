// Cadence — Access Policy Resolver
//
// Maps a caller's role set to the knowledge tiers it may read and the
// capability flags handlers use to gate actions. Both mappings are static
// tables matched exhaustively on `Role`, so adding a role forces a decision
// here. Unknown or empty role sets resolve to least privilege: `public` only,
// every flag false.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::role::{Role, RoleSet, Tier};

/// Tiers every caller may read, whatever their roles.
const BASELINE_TIERS: &[Tier] = &[Tier::Public];

fn tier_grants(role: Role) -> &'static [Tier] {
    match role {
        Role::Student => &[Tier::Intermediate],
        Role::Educator => &[Tier::Intermediate, Tier::Advanced],
        Role::Admin => &[Tier::Intermediate, Tier::Advanced, Tier::Admin],
    }
}

/// Capability flags derived from a role set. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub can_view_all_courses: bool,
    pub can_view_students: bool,
    pub can_manage_courses: bool,
    pub can_view_analytics: bool,
    pub can_manage_users: bool,
    pub can_configure_integrations: bool,
    pub can_view_own_progress: bool,
    /// Permitted knowledge tiers, least sensitive first.
    pub tiers: Vec<Tier>,
}

impl PermissionGrant {
    fn for_role(role: Role) -> Self {
        let staff = matches!(role, Role::Educator | Role::Admin);
        let admin = role == Role::Admin;
        Self {
            can_view_all_courses: staff,
            can_view_students: staff,
            can_manage_courses: staff,
            can_view_analytics: staff,
            can_manage_users: admin,
            can_configure_integrations: admin,
            can_view_own_progress: true,
            tiers: Vec::new(),
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            can_view_all_courses: self.can_view_all_courses || other.can_view_all_courses,
            can_view_students: self.can_view_students || other.can_view_students,
            can_manage_courses: self.can_manage_courses || other.can_manage_courses,
            can_view_analytics: self.can_view_analytics || other.can_view_analytics,
            can_manage_users: self.can_manage_users || other.can_manage_users,
            can_configure_integrations: self.can_configure_integrations
                || other.can_configure_integrations,
            can_view_own_progress: self.can_view_own_progress || other.can_view_own_progress,
            tiers: Vec::new(),
        }
    }

    pub fn allows_tier(&self, tier: Tier) -> bool {
        self.tiers.contains(&tier)
    }
}

/// Stateless resolver; cheap to copy into any handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicyResolver;

impl AccessPolicyResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve_tiers(&self, roles: &RoleSet) -> BTreeSet<Tier> {
        let mut tiers: BTreeSet<Tier> = BASELINE_TIERS.iter().copied().collect();
        for role in roles.iter() {
            tiers.extend(tier_grants(role).iter().copied());
        }
        tiers
    }

    pub fn resolve_permissions(&self, roles: &RoleSet) -> PermissionGrant {
        let mut grant = roles
            .iter()
            .map(PermissionGrant::for_role)
            .fold(PermissionGrant::default(), PermissionGrant::union);
        grant.tiers = self.resolve_tiers(roles).into_iter().collect();
        grant
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
