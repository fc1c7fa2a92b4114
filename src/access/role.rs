// Cadence — Roles and knowledge tiers

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AccessError;

/// A role tag issued by the identity provider. Closed set: a new role must be
/// added here and to the grant tables in `policy.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Educator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Educator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Educator => "educator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "educator" => Ok(Role::Educator),
            "admin" => Ok(Role::Admin),
            _ => Err(AccessError::UnknownRole(s.to_string())),
        }
    }
}

/// Knowledge sensitivity level, ordered from least to most sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Intermediate,
    Advanced,
    Admin,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Intermediate => "intermediate",
            Tier::Advanced => "advanced",
            Tier::Admin => "admin",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Tier::Public),
            "intermediate" => Ok(Tier::Intermediate),
            "advanced" => Ok(Tier::Advanced),
            "admin" => Ok(Tier::Admin),
            _ => Err(AccessError::UnknownTier(s.to_string())),
        }
    }
}

/// The roles attached to a caller for the duration of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(roles: &[Role]) -> Self {
        Self(roles.iter().copied().collect())
    }

    /// Build a role set from raw tags supplied by a transport. Unknown tags are
    /// dropped, so an unrecognized caller falls back to least privilege.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roles = BTreeSet::new();
        for tag in tags {
            let tag = tag.as_ref();
            if tag.trim().is_empty() {
                continue;
            }
            match tag.parse::<Role>() {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(_) => tracing::warn!(tag = %tag, "Ignoring unknown role tag"),
            }
        }
        Self(roles)
    }

    /// Parse a comma-separated list such as `"student,educator"`.
    pub fn from_csv(csv: &str) -> Self {
        Self::from_tags(csv.split(','))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Role names, for audit scopes.
    pub fn tags(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_strict_and_case_insensitive() {
        assert_eq!("Student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!(
            "instructor".parse::<Role>(),
            Err(AccessError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_tiers_are_ordered_by_sensitivity() {
        assert!(Tier::Public < Tier::Intermediate);
        assert!(Tier::Intermediate < Tier::Advanced);
        assert!(Tier::Advanced < Tier::Admin);
        assert_eq!("advanced".parse::<Tier>().unwrap(), Tier::Advanced);
        assert!("secret".parse::<Tier>().is_err());
    }

    #[test]
    fn test_from_tags_drops_unknown_roles() {
        let roles = RoleSet::from_tags(["student", "superuser", ""]);
        assert_eq!(roles, RoleSet::of(&[Role::Student]));
        assert!(RoleSet::from_tags(["nobody"]).is_empty());
    }

    #[test]
    fn test_from_csv() {
        let roles = RoleSet::from_csv("educator, admin");
        assert!(roles.contains(Role::Educator));
        assert!(roles.contains(Role::Admin));
        assert!(!roles.contains(Role::Student));
        assert!(RoleSet::from_csv("").is_empty());
    }

    #[test]
    fn test_serde_uses_lowercase_tags() {
        let roles = RoleSet::of(&[Role::Admin, Role::Student]);
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["student","admin"]"#);
        assert_eq!(serde_json::to_string(&Tier::Intermediate).unwrap(), r#""intermediate""#);
        assert_eq!(roles.tags(), vec!["student", "admin"]);
    }
}
