/*
 * document.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Documents and node addressing.
//!
//! A [`Document`] is an immutable input to the compiler: the compiler
//! never mutates a source tree in place, it builds a new compiled tree.
//! [`NodeAddr`] is a child-index path from the root, used to name nodes
//! in diagnostics and in the project index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Identifies a document within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub project: String,
    pub document: String,
}

impl DocRef {
    pub fn new(project: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            document: document.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.document)
    }
}

/// A source or compiled document: a named tree of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Owning project id.
    pub project: String,
    /// Document name within the project.
    pub name: String,
    /// Root node (conventionally an element).
    pub root: Node,
}

impl Document {
    pub fn new(project: impl Into<String>, name: impl Into<String>, root: Node) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            root,
        }
    }

    /// Reference to this document.
    pub fn doc_ref(&self) -> DocRef {
        DocRef::new(self.project.clone(), self.name.clone())
    }

    /// Node at the given address, if it exists.
    pub fn node_at(&self, addr: &NodeAddr) -> Option<&Node> {
        let mut node = &self.root;
        for &idx in &addr.0 {
            node = node.children()?.get(idx)?;
        }
        Some(node)
    }
}

/// Child-index path from the document root. The empty address is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr(pub Vec<usize>);

impl NodeAddr {
    /// Address of the document root.
    pub fn root() -> Self {
        NodeAddr(Vec::new())
    }

    /// Address of the `idx`-th child of this node.
    pub fn child(&self, idx: usize) -> Self {
        let mut path = self.0.clone();
        path.push(idx);
        NodeAddr(path)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for idx in &self.0 {
            write!(f, "/{idx}")?;
        }
        Ok(())
    }
}
