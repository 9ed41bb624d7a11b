/*
 * resolver.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! URN resolution against the project index.
//!
//! A pure function over the immutable index: no side effects, safe to
//! call concurrently. A URN with an explicit `@project` qualifier
//! resolves to at most one location; an unqualified URN resolves to every
//! project defining it, in index order, and the caller decides priority.

use opensiddur_jlptei::document::NodeAddr;
use opensiddur_jlptei::urn::{Urn, UrnParseError};
use thiserror::Error;

use crate::index::ProjectIndex;

/// A URN resolved to a concrete location.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUrn {
    pub project: String,
    pub document: String,
    /// The resolved point URN (unqualified, no range).
    pub urn: Urn,
    pub addr: NodeAddr,
}

/// A resolved range: start and end locations, always within the same
/// project and document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSpan {
    pub start: ResolvedUrn,
    pub end: ResolvedUrn,
}

impl ResolvedSpan {
    /// A single point treated as a degenerate span.
    fn point(at: ResolvedUrn) -> Self {
        Self {
            end: at.clone(),
            start: at,
        }
    }
}

/// Structural failures during range resolution. The caller attaches the
/// offending node's location and maps these into the compile taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RangeError {
    #[error("{0}")]
    Malformed(#[from] UrnParseError),

    #[error("range start and end resolve to different documents ({start} vs {end})")]
    SplitRange { start: String, end: String },
}

/// Resolver over one index generation.
#[derive(Debug, Clone, Copy)]
pub struct UrnResolver<'a> {
    index: &'a ProjectIndex,
}

impl<'a> UrnResolver<'a> {
    pub fn new(index: &'a ProjectIndex) -> Self {
        Self { index }
    }

    /// Resolve a point URN. With an explicit project qualifier the result
    /// has at most one element; unqualified, one element per defining
    /// project in index order.
    pub fn resolve(&self, urn: &Urn) -> Vec<ResolvedUrn> {
        let key = urn.key();
        let point = urn.start().unqualified();
        match &urn.project {
            Some(project) => self
                .index
                .lookup_in(project, &key)
                .map(|entry| {
                    vec![ResolvedUrn {
                        project: project.clone(),
                        document: entry.document.clone(),
                        urn: point.clone(),
                        addr: entry.addr.clone(),
                    }]
                })
                .unwrap_or_default(),
            None => self
                .index
                .lookup(&key)
                .into_iter()
                .map(|(project, entry)| ResolvedUrn {
                    project: project.to_string(),
                    document: entry.document.clone(),
                    urn: point.clone(),
                    addr: entry.addr.clone(),
                })
                .collect(),
        }
    }

    /// Resolve a URN that may carry range notation. A non-range URN
    /// yields degenerate spans (start == end). For ranges, start and end
    /// must resolve within the same project and document; candidates
    /// where only one endpoint resolves are dropped.
    pub fn resolve_span(&self, urn: &Urn) -> Result<Vec<ResolvedSpan>, RangeError> {
        if !urn.is_range() {
            return Ok(self.resolve(urn).into_iter().map(ResolvedSpan::point).collect());
        }

        let start_urn = urn.start();
        let end_urn = urn.end()?;
        let starts = self.resolve(&start_urn);
        let ends = self.resolve(&end_urn);

        let mut spans = Vec::new();
        for start in starts {
            let Some(end) = ends.iter().find(|e| e.project == start.project) else {
                continue;
            };
            if end.document != start.document {
                return Err(RangeError::SplitRange {
                    start: format!("{}/{}", start.project, start.document),
                    end: format!("{}/{}", end.project, end.document),
                });
            }
            spans.push(ResolvedSpan {
                start,
                end: end.clone(),
            });
        }
        Ok(spans)
    }

    /// First candidate whose project appears earliest in the priority
    /// list. Candidates from projects outside the list are ignored.
    pub fn prioritize<'s>(
        spans: &'s [ResolvedSpan],
        priority: &[String],
    ) -> Option<&'s ResolvedSpan> {
        priority
            .iter()
            .find_map(|project| spans.iter().find(|s| s.start.project == *project))
    }
}
