/*
 * urn.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! `urn:x-opensiddur:` reference parsing.
//!
//! A URN names a passage or section, optionally qualified by project:
//!
//! ```text
//! urn:x-opensiddur:text:bible:genesis/1/1-2/3@wlc
//! └┬┘ └────┬─────┘ └┬─┘ └────┬────┘ └┬┘ └┬┘ └┬┘
//! scheme namespace kind    work    path range project
//! ```
//!
//! The colon-separated head identifies the work; slash-separated segments
//! address into its hierarchy. A dash inside the last dash-bearing *path*
//! segment denotes a range: the part after the dash (plus any following
//! segments) replaces the last N segments of the start path, so
//! `genesis/1/1-2/3` spans `genesis/1/1` through `genesis/2/3`. Dashes in
//! the colon head (`x-opensiddur`) are never range indicators. Because the
//! end spec replaces a suffix of the start path, start and end always
//! resolve at the same hierarchical depth; an end spec deeper than the
//! start path is malformed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing or decomposing a URN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrnParseError {
    /// The string does not start with `urn:<namespace>:<kind>:`.
    #[error("not a URN: {0}")]
    NotAUrn(String),

    /// The range end spec has more segments than the start path.
    #[error("malformed range in {urn}: end spec is deeper than the start path")]
    RangeTooDeep { urn: String },

    /// An empty path or head segment.
    #[error("empty segment in URN: {0}")]
    EmptySegment(String),
}

/// A structured reference to a passage or section.
///
/// Serialized as its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Urn {
    /// Namespace, e.g. `x-opensiddur`.
    pub namespace: String,
    /// Resource kind, e.g. `text`.
    pub kind: String,
    /// Colon-separated work segments after the kind, e.g. `["bible", "genesis"]`.
    pub work: Vec<String>,
    /// Slash-separated hierarchical path segments, e.g. `["1", "1"]`.
    pub path: Vec<String>,
    /// Range end spec: replaces the last N segments of `path`.
    pub range_end: Option<Vec<String>>,
    /// Explicit project qualifier (`@project`).
    pub project: Option<String>,
}

impl Urn {
    /// Parse a URN string. Range and project notation are recognized here;
    /// range depth is validated eagerly.
    pub fn parse(input: &str) -> Result<Self, UrnParseError> {
        // Split off the @project qualifier first; it applies to the whole URN.
        let (body, project) = match input.rsplit_once('@') {
            Some((body, project)) if !project.is_empty() => (body, Some(project.to_string())),
            _ => (input, None),
        };

        let mut slash_parts = body.split('/');
        let head = slash_parts
            .next()
            .ok_or_else(|| UrnParseError::NotAUrn(input.to_string()))?;

        let head_parts: Vec<&str> = head.split(':').collect();
        if head_parts.len() < 3 || head_parts[0] != "urn" {
            return Err(UrnParseError::NotAUrn(input.to_string()));
        }
        if head_parts.iter().any(|p| p.is_empty()) {
            return Err(UrnParseError::EmptySegment(input.to_string()));
        }
        let namespace = head_parts[1].to_string();
        let kind = head_parts[2].to_string();
        let work: Vec<String> = head_parts[3..].iter().map(|s| s.to_string()).collect();

        let raw_path: Vec<&str> = slash_parts.collect();
        if raw_path.iter().any(|p| p.is_empty()) {
            return Err(UrnParseError::EmptySegment(input.to_string()));
        }

        // Search backwards through the path segments for the range dash.
        // The head is already consumed, so dashes there cannot match.
        let mut path: Vec<String> = Vec::new();
        let mut range_end: Option<Vec<String>> = None;
        if let Some(idx) = raw_path.iter().rposition(|p| p.contains('-')) {
            let (start_value, end_first) = raw_path[idx]
                .split_once('-')
                .unwrap_or((raw_path[idx], ""));
            if start_value.is_empty() || end_first.is_empty() {
                return Err(UrnParseError::EmptySegment(input.to_string()));
            }
            path.extend(raw_path[..idx].iter().map(|s| s.to_string()));
            path.push(start_value.to_string());
            let mut end: Vec<String> = vec![end_first.to_string()];
            end.extend(raw_path[idx + 1..].iter().map(|s| s.to_string()));
            range_end = Some(end);
        } else {
            path.extend(raw_path.iter().map(|s| s.to_string()));
        }

        let urn = Urn {
            namespace,
            kind,
            work,
            path,
            range_end,
            project,
        };
        if let Some(end) = &urn.range_end {
            if end.len() > urn.path.len() {
                return Err(UrnParseError::RangeTooDeep {
                    urn: input.to_string(),
                });
            }
        }
        Ok(urn)
    }

    /// True if this URN addresses a range rather than a single point.
    pub fn is_range(&self) -> bool {
        self.range_end.is_some()
    }

    /// The start of the range (or the URN itself if not a range).
    pub fn start(&self) -> Urn {
        Urn {
            range_end: None,
            ..self.clone()
        }
    }

    /// The end of the range: the end spec replaces the last N segments of
    /// the start path. Returns the URN itself if not a range.
    pub fn end(&self) -> Result<Urn, UrnParseError> {
        let Some(end_spec) = &self.range_end else {
            return Ok(self.start());
        };
        if end_spec.len() > self.path.len() {
            return Err(UrnParseError::RangeTooDeep {
                urn: self.to_string(),
            });
        }
        let keep = self.path.len() - end_spec.len();
        let mut path: Vec<String> = self.path[..keep].to_vec();
        path.extend(end_spec.iter().cloned());
        Ok(Urn {
            path,
            range_end: None,
            ..self.clone()
        })
    }

    /// Canonical index key: the URN string without range or project
    /// qualifier. Two references to the same point share a key.
    pub fn key(&self) -> String {
        self.start().unqualified().to_string()
    }

    /// The same URN without a project qualifier.
    pub fn unqualified(&self) -> Urn {
        Urn {
            project: None,
            ..self.clone()
        }
    }

    /// The same URN qualified by the given project.
    pub fn qualified(&self, project: impl Into<String>) -> Urn {
        Urn {
            project: Some(project.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:{}", self.namespace, self.kind)?;
        for seg in &self.work {
            write!(f, ":{seg}")?;
        }
        for (i, seg) in self.path.iter().enumerate() {
            write!(f, "/{seg}")?;
            // The range dash joins the last start segment to the end spec.
            if i == self.path.len() - 1 {
                if let Some(end) = &self.range_end {
                    write!(f, "-{}", end.join("/"))?;
                }
            }
        }
        if let Some(project) = &self.project {
            write!(f, "@{project}")?;
        }
        Ok(())
    }
}

impl FromStr for Urn {
    type Err = UrnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Urn::parse(s)
    }
}

impl Serialize for Urn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Urn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Urn::parse(&s).map_err(serde::de::Error::custom)
    }
}
