/*
 * lib.rs
 * Copyright (c) 2025 the Open Siddur Project
 *
 * JLPTEI document model for the Open Siddur compiler.
 *
 * This crate provides pure data type definitions for JLPTEI documents:
 * the node tree, URN references, feature-structure values, and condition
 * expressions. It has minimal dependencies (serde, hashlink) and is
 * consumed by the loader, the compiler, and the output renderers alike.
 */

pub mod condition;
pub mod document;
pub mod feature;
pub mod node;
pub mod urn;

// Re-export commonly used types at the crate root
pub use condition::Condition;
pub use document::{DocRef, Document, NodeAddr};
pub use feature::{Assignment, FeatureKey, Value};
pub use node::{
    Anchor, AnchorKind, Attrs, Conditional, Declare, Element, EndConditional, EndDeclare,
    Milestone, Node, Transclusion, TransclusionMode,
};
pub use urn::{Urn, UrnParseError};
