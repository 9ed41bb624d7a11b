/*
 * settings.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Compile settings.
//!
//! Settings carry the project priority lists for transclusion and
//! instruction resolution, plus the unordered set of annotation projects.
//! They are threaded explicitly through every call in the traversal, so
//! concurrent compiles with different settings cannot interfere.
//!
//! ```yaml
//! priority:
//!   transclusion: [wlc, jps1917]
//!   instructions: [nusach-ashkenaz]
//! annotations: [rashi]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::index::ProjectIndex;

/// Ordered project priority lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priorities {
    /// Projects tried in order when resolving unqualified transclusion
    /// targets. Empty means "the project owning the current document".
    #[serde(default)]
    pub transclusion: Vec<String>,

    /// Projects tried in order when selecting an instruction-note
    /// variant. Empty means "the variant native to the document".
    #[serde(default)]
    pub instructions: Vec<String>,
}

/// Settings for one compile invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub priority: Priorities,

    /// Projects whose commentary notes are merged into the output.
    /// Unordered: every matching note is kept.
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl Settings {
    /// Parse settings from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Default settings for a compile rooted in the given project: the
    /// project is its own priority list and annotation source.
    pub fn default_for(project: &str) -> Self {
        Self {
            priority: Priorities {
                transclusion: vec![project.to_string()],
                instructions: vec![project.to_string()],
            },
            annotations: vec![project.to_string()],
        }
    }

    /// Every named project must exist in the index.
    pub fn validate(&self, index: &ProjectIndex) -> Result<()> {
        let named = self
            .priority
            .transclusion
            .iter()
            .chain(&self.priority.instructions)
            .chain(&self.annotations);
        for project in named {
            if !index.has_project(project) {
                return Err(CompileError::UnknownProject {
                    project: project.clone(),
                });
            }
        }
        Ok(())
    }
}
