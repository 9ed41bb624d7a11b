/*
 * error.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Error and warning types for the compiler.
//!
//! Structural defects in the source (unbalanced scopes, malformed ranges,
//! transclusion cycles, unresolved required references) abort the compile
//! for the offending document; every such error names the project,
//! document, and node path of the offending element. Dangling annotation
//! targets are recoverable and surface as warnings.

use std::fmt;

use opensiddur_jlptei::document::{DocRef, NodeAddr};
use thiserror::Error;

/// Location of an offending node: project, document, and node path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSite {
    pub doc: DocRef,
    pub addr: NodeAddr,
}

impl ErrorSite {
    pub fn new(doc: DocRef, addr: NodeAddr) -> Self {
        Self { doc, addr }
    }
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.doc, self.addr)
    }
}

/// Unrecoverable compile errors.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A required reference did not resolve to any project.
    #[error("unresolved URN {urn} at {at}")]
    UnresolvedUrn { urn: String, at: ErrorSite },

    /// A range reference is structurally invalid.
    #[error("malformed range {urn} at {at}: {reason}")]
    MalformedRange {
        urn: String,
        reason: String,
        at: ErrorSite,
    },

    /// A transclusion re-entered a (project, URN) already on the
    /// expansion stack. The cycle lists the references in order.
    #[error("cyclic transclusion at {at}: {}", cycle.join(" -> "))]
    CyclicTransclusion { cycle: Vec<String>, at: ErrorSite },

    /// An end-declare with no matching open declare, or a declare scope
    /// left open, in the same document.
    #[error("unbalanced declare scope '{id}' at {at}")]
    UnbalancedScope { id: String, at: ErrorSite },

    /// A conditional block with no matching end (or vice versa) in the
    /// same document.
    #[error("unmatched conditional '{id}' at {at}")]
    UnmatchedConditional { id: String, at: ErrorSite },

    /// Settings name a project absent from the index.
    #[error("unknown project '{project}'")]
    UnknownProject { project: String },

    /// The starting reference names a document absent from the index.
    #[error("unknown document {doc}")]
    UnknownDocument { doc: DocRef },

    /// The compile was cancelled at a transclusion boundary.
    #[error("compile cancelled")]
    Cancelled,

    /// Invariant violation inside the engine itself.
    #[error("internal compiler error: {0}")]
    Internal(String),

    #[error("settings error: {0}")]
    Settings(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("emit error: {0}")]
    Emit(#[from] std::io::Error),
}

/// Recoverable problems reported alongside a successful compile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileWarning {
    /// A standoff note targets an anchor absent from the compiled tree.
    /// The note is dropped and the compile continues.
    #[error(
        "dangling annotation target {target} in {target_doc}: note from project '{note_project}' dropped"
    )]
    DanglingAnnotationTarget {
        target: String,
        target_doc: DocRef,
        note_project: String,
    },
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;
