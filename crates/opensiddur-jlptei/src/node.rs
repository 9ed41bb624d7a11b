/*
 * node.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Node types for JLPTEI document trees.
//!
//! A document is a tree of [`Node`]s. Besides ordinary content nodes
//! (elements, text, milestones, anchors), the tree may contain
//! *scaffolding* nodes: transclusion references, declare/end-declare
//! markers, and conditional/end-conditional markers. Scaffolding is
//! resolved away by the compiler and never appears in compiled output.
//!
//! Declare and conditional regions are delimited by paired marker nodes
//! matched by explicit id, not by nesting: a region may open inside one
//! element and close inside another.

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::feature::Assignment;
use crate::urn::Urn;

/// Ordered element attributes, preserving source order.
pub type Attrs = LinkedHashMap<String, String>;

/// A node in a JLPTEI document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Ordinary markup element with attributes and children.
    Element(Element),

    /// Text content.
    Text(String),

    /// Empty marker opening an addressable span. The span ends at the
    /// next milestone of the same unit or at the end of the container.
    Milestone(Milestone),

    /// Empty marker denoting a single addressable point.
    Anchor(Anchor),

    /// Scaffolding: include another document's content by reference.
    Transclusion(Transclusion),

    /// Scaffolding: open a feature-settings scope.
    Declare(Declare),

    /// Scaffolding: close the declare scope with the matching id.
    EndDeclare(EndDeclare),

    /// Scaffolding: open a conditional region.
    Conditional(Conditional),

    /// Scaffolding: close the conditional region with the matching id.
    EndConditional(EndConditional),
}

/// Markup element: tag, attributes, children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    pub attrs: Attrs,
    pub children: Vec<Node>,
}

/// Milestone marker opening an addressable span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Unit of the span (e.g. "verse", "chapter").
    pub unit: String,
    /// Number or label within the unit.
    pub n: String,
    /// Canonical URN this milestone corresponds to, if any.
    pub corresp: Option<Urn>,
}

/// Whether an anchor is addressable from outside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    /// Referenced only within the owning document.
    Internal,
    /// Referenced by standoff annotations in other documents. External
    /// anchors are never deleted or reordered by the compiler.
    External,
}

/// Anchor marker denoting a single addressable point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Id, unique within the owning document.
    pub id: String,
    pub kind: AnchorKind,
}

/// How a transcluded fragment is spliced into the including document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransclusionMode {
    /// Splice only the fragment's content, discarding its own top-level
    /// paragraph or line-group wrapper (descendant wrappers are kept).
    Inline,
    /// Splice the fragment with its full internal hierarchy intact.
    External,
}

/// Transclusion reference to be resolved by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transclusion {
    pub target: Urn,
    pub mode: TransclusionMode,
}

/// Declare marker opening a feature-settings scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declare {
    /// Id matched by the corresponding [`EndDeclare`].
    pub id: String,
    /// Feature assignments pushed while the scope is open.
    pub assignments: Vec<Assignment>,
}

/// End marker for the declare scope with the matching id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndDeclare {
    pub target: String,
}

/// Conditional marker opening a conditionally-included region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    /// Id matched by the corresponding [`EndConditional`].
    pub id: String,
    /// Condition deciding inclusion of the guarded content.
    pub condition: Condition,
    /// Instruction note shown to the reader when the condition cannot be
    /// resolved (and dropped when it can).
    pub instruction: Option<Box<Node>>,
}

/// End marker for the conditional region with the matching id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndConditional {
    pub target: String,
}

impl Element {
    /// Create an element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attrs::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Builder-style child insertion.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Builder-style children insertion.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

impl Node {
    /// True for nodes the compiler must resolve away: transclusion
    /// references and declare/conditional markers.
    pub fn is_scaffolding(&self) -> bool {
        matches!(
            self,
            Node::Transclusion(_)
                | Node::Declare(_)
                | Node::EndDeclare(_)
                | Node::Conditional(_)
                | Node::EndConditional(_)
        )
    }

    /// Children of this node, if it can have any.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Element(el) => Some(&el.children),
            _ => None,
        }
    }

    /// Short variant name for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Node::Element(_) => "element",
            Node::Text(_) => "text",
            Node::Milestone(_) => "milestone",
            Node::Anchor(_) => "anchor",
            Node::Transclusion(_) => "transclusion",
            Node::Declare(_) => "declare",
            Node::EndDeclare(_) => "endDeclare",
            Node::Conditional(_) => "conditional",
            Node::EndConditional(_) => "endConditional",
        }
    }

    /// Convenience constructor for a text node.
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    /// True if no scaffolding remains anywhere in this subtree.
    pub fn is_fully_compiled(&self) -> bool {
        if self.is_scaffolding() {
            return false;
        }
        match self.children() {
            Some(children) => children.iter().all(Node::is_fully_compiled),
            None => true,
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}
