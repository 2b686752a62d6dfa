//! Gated actions and launchable tools.
//!
//! [`Capability`] is the closed, versioned vocabulary shared by the role
//! policy, the elevation broker and the console. Adding a variant forces
//! every exhaustive policy table to be updated; see `opsgate-auth`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a single gated action.
///
/// String ids are stable and appear in configuration files, audit logs
/// and console commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// View the HMI screens.
    ViewHmi,
    /// Start the WinCC runtime.
    LaunchWincc,
    /// Start HmiNavi.
    #[serde(rename = "launch_hminavi")]
    LaunchHmiNavi,
    /// Edit plant configuration.
    EditConfiguration,
    /// Use administrative controls.
    AdminControls,
}

impl Capability {
    /// Vocabulary revision. Bump when a variant is added or removed.
    pub const VOCABULARY_VERSION: u32 = 1;

    /// Every capability in declaration order.
    pub const ALL: [Capability; 5] = [
        Capability::ViewHmi,
        Capability::LaunchWincc,
        Capability::LaunchHmiNavi,
        Capability::EditConfiguration,
        Capability::AdminControls,
    ];

    /// Stable string id.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewHmi => "view_hmi",
            Self::LaunchWincc => "launch_wincc",
            Self::LaunchHmiNavi => "launch_hminavi",
            Self::EditConfiguration => "edit_configuration",
            Self::AdminControls => "admin_controls",
        }
    }

    /// Short label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ViewHmi => "View HMI",
            Self::LaunchWincc => "Launch WinCC runtime",
            Self::LaunchHmiNavi => "Launch HmiNavi",
            Self::EditConfiguration => "Edit configuration",
            Self::AdminControls => "Administrative controls",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown capability id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// External desktop tool the console can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Siemens WinCC runtime.
    Wincc,
    /// HmiNavi.
    HmiNavi,
}

impl Tool {
    /// Every launchable tool.
    pub const ALL: [Tool; 2] = [Tool::Wincc, Tool::HmiNavi];

    /// Stable string id.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wincc => "wincc",
            Self::HmiNavi => "hminavi",
        }
    }

    /// Capability that must be held to launch this tool.
    #[must_use]
    pub const fn required_capability(self) -> Capability {
        match self {
            Self::Wincc => Capability::LaunchWincc,
            Self::HmiNavi => Capability::LaunchHmiNavi,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown tool id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wincc" => Ok(Self::Wincc),
            "hminavi" => Ok(Self::HmiNavi),
            _ => Err(UnknownTool(s.to_string())),
        }
    }
}
