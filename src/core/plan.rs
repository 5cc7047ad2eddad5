//! Workflow plan definitions and loading.
//!
//! A plan is the declarative description of one guided procedure: what to
//! fetch, what to unpack, which external tools to launch, and which manual
//! checkpoints to walk the user through. Plans are defined in YAML and
//! validated once at load; the step registry is built from a validated plan.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// YAML for the plan shipped with the binary.
const BUILTIN_PLAN: &str = include_str!("../../plans/demo.yaml");

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Plan name (used in logs and the menu banner).
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Environment requirements checked by the precondition battery.
    #[serde(default)]
    pub requirements: Requirements,

    /// Ordered list of steps.
    pub steps: Vec<StepSpec>,
}

impl Plan {
    /// Load a plan from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a plan from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: Self = serde_yaml::from_str(content).context("failed to parse plan YAML")?;
        plan.validate()?;
        Ok(plan)
    }

    /// The plan embedded in the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_PLAN)
    }

    /// Validate the plan definition. Resource references are checked here,
    /// once, so step actions can assume a well-formed catalog.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("plan name cannot be empty");
        }
        if self.steps.is_empty() {
            anyhow::bail!("plan must have at least one step");
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let id = step.id();
            if id.is_empty() {
                anyhow::bail!("step {} has an empty id", i);
            }
            if seen.contains(&id) {
                anyhow::bail!("duplicate step id '{}'", id);
            }

            match step {
                StepSpec::Extract { archive, .. } => {
                    let target = self.steps.iter().position(|s| s.id() == archive.as_str());
                    match target {
                        Some(idx) if idx >= i => anyhow::bail!(
                            "step '{}' references later step '{}' (forward references not allowed)",
                            id,
                            archive
                        ),
                        Some(idx) if !self.steps[idx].is_fetch() => anyhow::bail!(
                            "step '{}' references '{}', which is not a fetch step",
                            id,
                            archive
                        ),
                        None => {
                            anyhow::bail!("step '{}' references unknown step '{}'", id, archive)
                        }
                        _ => {}
                    }
                }
                StepSpec::Launch { resource, .. } => {
                    let target = self.steps.iter().position(|s| s.id() == resource.as_str());
                    match target {
                        Some(idx) if idx >= i => anyhow::bail!(
                            "step '{}' references later step '{}' (forward references not allowed)",
                            id,
                            resource
                        ),
                        None => {
                            anyhow::bail!("step '{}' references unknown step '{}'", id, resource)
                        }
                        _ => {}
                    }
                }
                StepSpec::FetchRelease { choices, .. } => {
                    if choices.is_empty() {
                        anyhow::bail!("step '{}' declares no release choices", id);
                    }
                }
                _ => {}
            }

            seen.push(id);
        }

        Ok(())
    }

    /// Get a step spec by id.
    pub fn get_step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id() == id)
    }
}

/// Environment requirements declared by a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirements {
    /// Expected `std::env::consts::OS` value, if the plan is
    /// platform-specific.
    #[serde(default)]
    pub platform: Option<String>,

    /// Minimum free space in the workspace filesystem, in gigabytes.
    #[serde(default = "default_min_free_space_gb")]
    pub min_free_space_gb: u64,

    /// URL probed for network reachability.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Whether the workflow needs elevated privileges.
    #[serde(default)]
    pub elevated: bool,
}

fn default_min_free_space_gb() -> u64 {
    1
}

fn default_probe_url() -> String {
    "https://github.com".to_string()
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            platform: None,
            min_free_space_gb: default_min_free_space_gb(),
            probe_url: default_probe_url(),
            elevated: false,
        }
    }
}

/// One step in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepSpec {
    /// Download a file into the staging directory.
    Fetch {
        id: String,
        label: String,
        url: String,
        /// File name under the staging directory.
        file: String,
    },

    /// Download one of an enumerated set of releases, selected by a
    /// user parameter.
    FetchRelease {
        id: String,
        label: String,
        /// Parameter holding the selected choice id.
        param: String,
        choices: Vec<ReleaseChoice>,
        file: String,
    },

    /// Unpack an archive fetched by an earlier step.
    Extract {
        id: String,
        label: String,
        /// Id of the fetch step whose artifact this unpacks.
        archive: String,
        /// Destination directory, relative to the workspace.
        dest: String,
        /// Subdirectory of the destination that becomes the resolved root.
        #[serde(default)]
        subdir: Option<String>,
    },

    /// Launch a program from an extracted tree and wait for the user to
    /// confirm completion.
    Launch {
        id: String,
        label: String,
        /// Id of the extract step whose tree holds the program.
        resource: String,
        /// File name of the program, located anywhere under the tree.
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        instructions: Vec<String>,
    },

    /// A manual checkpoint: instructions plus a single confirmation.
    Guide {
        id: String,
        label: String,
        instructions: Vec<String>,
    },
}

impl StepSpec {
    pub fn id(&self) -> &str {
        match self {
            Self::Fetch { id, .. }
            | Self::FetchRelease { id, .. }
            | Self::Extract { id, .. }
            | Self::Launch { id, .. }
            | Self::Guide { id, .. } => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Fetch { label, .. }
            | Self::FetchRelease { label, .. }
            | Self::Extract { label, .. }
            | Self::Launch { label, .. }
            | Self::Guide { label, .. } => label,
        }
    }

    fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::FetchRelease { .. })
    }
}

/// One member of an enumerated release set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseChoice {
    pub id: String,
    pub url: String,
}
