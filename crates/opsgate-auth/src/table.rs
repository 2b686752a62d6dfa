//! Role policy loaded from configuration.
//!
//! A [`PolicySpec`] is the serde shape of the `[policy]` configuration
//! section:
//!
//! ```toml
//! exclusive = ["admin_controls"]
//!
//! [roles.operator]
//! unconditional = ["view_hmi", "launch_wincc", "launch_hminavi"]
//! forbidden = ["edit_configuration", "admin_controls"]
//! ```
//!
//! [`PolicyTable::from_spec`] refuses any table that leaves a pair
//! unclassified, classifies a pair twice, or violates monotonicity.

use crate::policy::{validate_policy, Access, PolicyError, RolePolicy};
use opsgate_types::{Capability, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Capability lists for one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleEntry {
    pub unconditional: Vec<Capability>,
    pub elevatable: Vec<Capability>,
    pub forbidden: Vec<Capability>,
}

/// Serializable policy description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySpec {
    /// Role-exclusive capabilities.
    pub exclusive: Vec<Capability>,
    /// Entries keyed by role name.
    pub roles: BTreeMap<String, RoleEntry>,
}

impl PolicySpec {
    /// Describes an existing policy as a spec.
    #[must_use]
    pub fn describe(policy: &dyn RolePolicy) -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| {
                let mut entry = RoleEntry::default();
                for cap in Capability::ALL {
                    match policy.classify(role, cap) {
                        Access::Unconditional => entry.unconditional.push(cap),
                        Access::Elevatable => entry.elevatable.push(cap),
                        Access::Forbidden => entry.forbidden.push(cap),
                    }
                }
                (role.as_str().to_string(), entry)
            })
            .collect();
        Self {
            exclusive: Capability::ALL
                .into_iter()
                .filter(|&c| policy.is_exclusive(c))
                .collect(),
            roles,
        }
    }
}

/// A complete, validated role policy.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    access: HashMap<(Role, Capability), Access>,
    exclusive: HashSet<Capability>,
}

impl PolicyTable {
    /// Builds a table, checking completeness and monotonicity.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::UnknownRole`] for a role key outside the vocabulary
    /// - [`PolicyError::Duplicate`] for a pair listed twice
    /// - [`PolicyError::Unclassified`] for a pair not listed at all
    /// - [`PolicyError::NotMonotone`] if a higher rank loses access
    pub fn from_spec(spec: &PolicySpec) -> Result<Self, PolicyError> {
        let mut access = HashMap::new();

        for (name, entry) in &spec.roles {
            let role: Role = name
                .parse()
                .map_err(|_| PolicyError::UnknownRole(name.clone()))?;
            let lists = [
                (Access::Unconditional, &entry.unconditional),
                (Access::Elevatable, &entry.elevatable),
                (Access::Forbidden, &entry.forbidden),
            ];
            for (kind, caps) in lists {
                for &capability in caps {
                    if access.insert((role, capability), kind).is_some() {
                        return Err(PolicyError::Duplicate { role, capability });
                    }
                }
            }
        }

        for role in Role::ALL {
            for capability in Capability::ALL {
                if !access.contains_key(&(role, capability)) {
                    return Err(PolicyError::Unclassified { role, capability });
                }
            }
        }

        let table = Self {
            access,
            exclusive: spec.exclusive.iter().copied().collect(),
        };
        validate_policy(&table)?;
        Ok(table)
    }
}

impl RolePolicy for PolicyTable {
    fn classify(&self, role: Role, capability: Capability) -> Access {
        // from_spec guarantees every pair is present.
        self.access
            .get(&(role, capability))
            .copied()
            .unwrap_or(Access::Forbidden)
    }

    fn is_exclusive(&self, capability: Capability) -> bool {
        self.exclusive.contains(&capability)
    }
}
