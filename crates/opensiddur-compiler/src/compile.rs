/*
 * compile.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! The compile pipeline.
//!
//! One compile = validate settings, expand the starting reference
//! against a pinned index generation, merge standoff annotations, and
//! hand back a compiled document plus any warnings. Compiling an
//! already-compiled document is the identity: it contains no
//! scaffolding, so expansion passes it through unchanged.

use std::sync::Arc;

use opensiddur_jlptei::document::{DocRef, Document};
use opensiddur_jlptei::node::{Element, Node, Transclusion, TransclusionMode};
use opensiddur_jlptei::urn::Urn;
use tokio_util::sync::CancellationToken;

use crate::annotate::merge_annotations;
use crate::emit;
use crate::error::{CompileError, CompileWarning, Result};
use crate::expand::Expander;
use crate::index::ProjectIndex;
use crate::settings::Settings;

/// Where a compile starts: a whole document, or any URN-addressable
/// passage.
#[derive(Debug, Clone, PartialEq)]
pub enum StartRef {
    Document(DocRef),
    Urn(Urn),
}

/// A compiled document and the warnings produced along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub document: Document,
    pub warnings: Vec<CompileWarning>,
}

impl Compiled {
    pub fn to_xml(&self) -> Result<String> {
        emit::to_xml(&self.document.root)
    }

    pub fn to_json(&self) -> Result<String> {
        emit::to_json(&self.document.root)
    }
}

/// Run one compile against a pinned index generation.
pub fn compile(
    index: &ProjectIndex,
    start: &StartRef,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<Compiled> {
    settings.validate(index)?;
    tracing::debug!(?start, "starting compile");

    let mut expander = Expander::new(index, settings, cancel.clone());
    let (project, name, mut root) = match start {
        StartRef::Document(doc_ref) => {
            let doc = index
                .document(&doc_ref.project, &doc_ref.document)
                .ok_or_else(|| CompileError::UnknownDocument {
                    doc: doc_ref.clone(),
                })?
                .clone();
            let nodes = expander.expand_document(&doc)?;
            (doc_ref.project.clone(), doc_ref.document.clone(), gather(nodes))
        }
        StartRef::Urn(urn) => {
            // A synthetic one-transclusion document reuses the whole
            // resolution path, including error sites and cycle keys.
            let wrapper = Arc::new(Document::new(
                "input",
                "start",
                Element::new("div")
                    .with_attr("type", "compilation")
                    .with_child(Node::Transclusion(Transclusion {
                        target: urn.clone(),
                        mode: TransclusionMode::External,
                    }))
                    .into(),
            ));
            let nodes = expander.expand_document(&wrapper)?;
            ("compiled".to_string(), urn.key(), gather(nodes))
        }
    };

    let expansion = expander.into_expansion();
    tracing::debug!(
        documents = expansion.documents.len(),
        anchors = expansion.anchors.len(),
        "expansion finished"
    );

    let warnings = merge_annotations(&mut root, &expansion, index, settings);

    if !root.is_fully_compiled() {
        return Err(CompileError::Internal(
            "scaffolding survived expansion".to_string(),
        ));
    }

    Ok(Compiled {
        document: Document::new(project, name, root),
        warnings,
    })
}

/// A compile yields one root; stray sequences are wrapped.
fn gather(mut nodes: Vec<Node>) -> Node {
    if nodes.len() == 1 {
        return nodes.remove(0);
    }
    Element::new("div").with_children(nodes).into()
}
