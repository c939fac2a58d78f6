use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resolver::RoleSubstitution;
use crate::ProgramError;

/// How host mirroring is switched on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HostIntegration {
    #[default]
    Disabled,
    Enabled,
    /// Enabled when the integration marker file exists at startup.
    Detect { marker: PathBuf },
}

impl HostIntegration {
    /// Resolves the switch once. The result is not re-evaluated afterwards.
    #[must_use]
    pub fn resolve(&self) -> HostMirroring {
        let enabled = match self {
            Self::Disabled => false,
            Self::Enabled => true,
            Self::Detect { marker } => marker.exists(),
        };
        if enabled {
            HostMirroring::Enabled
        } else {
            HostMirroring::Disabled
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostMirroring {
    Enabled,
    Disabled,
}

impl HostMirroring {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PluginSettings {
    pub host_integration: HostIntegration,
    pub substitution: RoleSubstitution,
}

impl PluginSettings {
    /// # Errors
    /// Returns [`ProgramError::Configuration`] for an empty detection marker or
    /// an invalid substitution rule.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if let HostIntegration::Detect { marker } = &self.host_integration {
            if marker.as_os_str().is_empty() {
                return Err(ProgramError::Configuration(
                    "host_integration.marker MUST be a non-empty path".to_string(),
                ));
            }
        }
        self.substitution.validate()
    }

    /// Decodes and validates settings from JSON.
    ///
    /// # Errors
    /// Returns [`ProgramError::Configuration`] when decoding or validation
    /// fails.
    pub fn from_json(value: &Value) -> Result<Self, ProgramError> {
        let settings: Self = serde_json::from_value(value.clone()).map_err(|err| {
            ProgramError::Configuration(format!("invalid settings JSON payload: {err}"))
        })?;
        settings.validate()?;
        Ok(settings)
    }
}
