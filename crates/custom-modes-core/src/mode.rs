//! Mode data model
//!
//! A mode is a named behavior profile for the coding agent: a role definition
//! plus the tool groups the agent may use while the mode is active.
//!
//! On disk every field is camelCase:
//!
//! ```yaml
//! slug: reviewer
//! name: Reviewer
//! roleDefinition: You review pull requests.
//! groups:
//!   - read
//!   - - edit
//!     - fileRegex: \.md$
//!       description: Markdown only
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Configuration scope a mode was loaded from (or is written to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSource {
    /// Repository-local configuration
    Project,
    /// User-wide configuration
    Global,
}

impl ModeSource {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
        }
    }

    pub fn all() -> &'static [ModeSource] {
        &[ModeSource::Project, ModeSource::Global]
    }
}

impl fmt::Display for ModeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for ModeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "global" => Ok(Self::Global),
            _ => Err(format!("Unknown mode source: {}", s)),
        }
    }
}

/// Capability class granted to the agent while a mode is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolGroup {
    Read,
    Edit,
    Browser,
    Command,
    Mcp,
    Modes,
}

impl ToolGroup {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Browser => "browser",
            Self::Command => "command",
            Self::Mcp => "mcp",
            Self::Modes => "modes",
        }
    }

    pub fn all() -> &'static [ToolGroup] {
        &[
            ToolGroup::Read,
            ToolGroup::Edit,
            ToolGroup::Browser,
            ToolGroup::Command,
            ToolGroup::Mcp,
            ToolGroup::Modes,
        ]
    }
}

impl fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for ToolGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolGroup::all()
            .iter()
            .find(|g| g.id() == s)
            .copied()
            .ok_or_else(|| format!("Unknown tool group: {}", s))
    }
}

/// Restrictions attached to a tool group entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOptions {
    /// Only files matching this pattern may be touched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_regex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One element of `groups`: either `read` or `[edit, {fileRegex: ...}]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupEntry {
    Plain(ToolGroup),
    WithOptions(ToolGroup, GroupOptions),
}

impl GroupEntry {
    pub fn group(&self) -> ToolGroup {
        match self {
            Self::Plain(group) | Self::WithOptions(group, _) => *group,
        }
    }

    pub fn options(&self) -> Option<&GroupOptions> {
        match self {
            Self::Plain(_) => None,
            Self::WithOptions(_, options) => Some(options),
        }
    }
}

impl From<ToolGroup> for GroupEntry {
    fn from(group: ToolGroup) -> Self {
        Self::Plain(group)
    }
}

/// A rule text file carried inside an import/export bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFile {
    /// Path relative to the mode's rules directory
    pub relative_path: String,
    pub content: String,
}

/// A custom mode as exposed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeConfig {
    pub slug: String,
    pub name: String,
    pub role_definition: String,
    pub groups: Vec<GroupEntry>,

    /// Provenance. Recomputed on every load, advisory when read from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ModeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_to_use: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,

    /// Inline policy snippets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,

    /// Only populated inside import/export bundles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules_files: Vec<RuleFile>,
}

impl ModeConfig {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        role_definition: impl Into<String>,
        groups: Vec<GroupEntry>,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            role_definition: role_definition.into(),
            groups,
            source: None,
            when_to_use: None,
            description: None,
            custom_instructions: None,
            rules: Vec::new(),
            rules_files: Vec::new(),
        }
    }

    /// Stamp provenance
    pub fn with_source(mut self, source: ModeSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn has_group(&self, group: ToolGroup) -> bool {
        self.groups.iter().any(|g| g.group() == group)
    }

    /// Copy suitable for writing into a mode file (bundle-only data removed)
    pub fn to_persisted(&self) -> Self {
        let mut persisted = self.clone();
        persisted.rules_files.clear();
        persisted
    }
}
