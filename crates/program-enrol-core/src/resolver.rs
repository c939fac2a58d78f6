use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ports::RoleDirectory;
use crate::{ProgramError, RoleId};

/// The single role remapping applied during propagation, by shortname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleSubstitution {
    pub from: String,
    pub to: String,
}

impl Default for RoleSubstitution {
    fn default() -> Self {
        Self {
            from: "editingteacher".to_string(),
            to: "teacher".to_string(),
        }
    }
}

impl RoleSubstitution {
    /// # Errors
    /// Returns [`ProgramError::Configuration`] when a side is blank or both
    /// sides name the same role.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(ProgramError::Configuration(
                "substitution roles MUST be non-empty shortnames".to_string(),
            ));
        }
        if self.from == self.to {
            return Err(ProgramError::Configuration(
                "substitution MUST map to a different role".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maps a role id to the role that is propagated into child courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleResolver {
    mapping: Option<(RoleId, RoleId)>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(from: RoleId, to: RoleId) -> Self {
        Self {
            mapping: Some((from, to)),
        }
    }

    #[must_use]
    pub fn identity() -> Self {
        Self { mapping: None }
    }

    /// Resolves the substitution shortnames to role ids. A missing role
    /// leaves the resolver as the identity.
    pub fn load(roles: &dyn RoleDirectory, substitution: &RoleSubstitution) -> Result<Self> {
        let from = roles.role_by_shortname(&substitution.from)?;
        let to = roles.role_by_shortname(&substitution.to)?;

        match (from, to) {
            (Some(from), Some(to)) => Ok(Self::new(from.id, to.id)),
            (from, to) => {
                warn!(
                    from = %substitution.from,
                    to = %substitution.to,
                    from_found = from.is_some(),
                    to_found = to.is_some(),
                    "role substitution disabled: role not found"
                );
                Ok(Self::identity())
            }
        }
    }

    #[must_use]
    pub fn resolve(&self, role: RoleId) -> RoleId {
        match self.mapping {
            Some((from, to)) if role == from => to,
            _ => role,
        }
    }
}
