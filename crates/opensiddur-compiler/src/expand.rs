/*
 * expand.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Transclusion expansion and conditional resolution.
//!
//! The expander walks a source document and produces compiled nodes:
//! transclusion references are replaced by the (recursively expanded)
//! fragments they point at, declare markers push and pop feature scopes
//! on a [`ScopeTracker`] shared across document boundaries, and
//! conditional markers gate emission through three-valued evaluation.
//!
//! Range transclusion traverses the entire target document with an
//! emission window: markers outside the window are still processed, so
//! a declare opened before the requested passage applies within it, but
//! only nodes inside the window are emitted. Ancestors of the window
//! endpoints are copied as shells to preserve the fragment's hierarchy.
//! An Undefined conditional still open when the window starts emits its
//! instruction at window entry, ahead of the retained content.
//!
//! A False conditional suppresses emission without suppressing marker
//! processing. External anchors are emitted even under suppression;
//! standoff notes in other documents may target them.

use std::sync::Arc;

use opensiddur_jlptei::document::{DocRef, Document, NodeAddr};
use opensiddur_jlptei::node::{
    Anchor, AnchorKind, Element, Node, Transclusion, TransclusionMode,
};
use tokio_util::sync::CancellationToken;

use crate::error::{CompileError, ErrorSite, Result};
use crate::index::{NoteTarget, ProjectIndex};
use crate::resolver::{RangeError, ResolvedSpan, UrnResolver};
use crate::scope::ScopeTracker;
use crate::settings::Settings;
use crate::truth::{self, Truth};

/// Container tags whose top-level wrapper is discarded by inline-mode
/// transclusion.
const INLINE_WRAPPERS: [&str; 2] = ["p", "lg"];

/// Provenance of one emitted anchor, for annotation merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRecord {
    /// Id carried by the anchor in the compiled tree.
    pub compiled_id: String,
    /// Anchor's identity in its source document.
    pub source: NoteTarget,
}

/// Everything the expander learned during one compile, beyond the tree.
#[derive(Debug, Default)]
pub struct Expansion {
    pub anchors: Vec<AnchorRecord>,
    /// Documents whose content participated in the compile.
    pub documents: Vec<DocRef>,
}

/// Emission window for a range fragment: half-open `[start, stop)` over
/// node addresses, `stop: None` meaning the end of the document.
#[derive(Debug, Clone)]
struct Window {
    start: NodeAddr,
    stop: Option<NodeAddr>,
}

/// Position of a node relative to the frame's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    /// Inside the window: emit (subject to conditional suppression).
    In,
    /// Outside the window: process markers only.
    Out,
    /// Ancestor of a window endpoint: emit a filtered shell copy.
    Shell,
}

#[derive(Debug)]
struct OpenDeclare {
    id: String,
    qualified: String,
    at: ErrorSite,
}

#[derive(Debug)]
struct OpenConditional {
    id: String,
    suppressing: bool,
    /// Instruction of an Undefined conditional opened outside the
    /// emission window, held until the window is entered. Dropped if the
    /// conditional closes before the window starts.
    pending: Option<Node>,
    at: ErrorSite,
}

/// One document instance on the expansion stack.
struct Frame<'d> {
    doc: &'d Document,
    /// Instance serial, used to qualify declare ids and remap anchors.
    serial: usize,
    window: Option<Window>,
    open_declares: Vec<OpenDeclare>,
    open_conditionals: Vec<OpenConditional>,
}

impl Frame<'_> {
    fn site(&self, addr: &NodeAddr) -> ErrorSite {
        ErrorSite::new(self.doc.doc_ref(), addr.clone())
    }

    fn visibility(&self, addr: &NodeAddr) -> Visibility {
        let Some(window) = &self.window else {
            return Visibility::In;
        };
        let addr = addr.0.as_slice();
        let start = window.start.0.as_slice();
        if is_proper_prefix(addr, start) {
            return Visibility::Shell;
        }
        if addr < start {
            return Visibility::Out;
        }
        match &window.stop {
            None => Visibility::In,
            Some(stop) => {
                let stop = stop.0.as_slice();
                if is_proper_prefix(addr, stop) {
                    Visibility::Shell
                } else if addr < stop {
                    Visibility::In
                } else {
                    Visibility::Out
                }
            }
        }
    }
}

fn is_proper_prefix(a: &[usize], b: &[usize]) -> bool {
    a.len() < b.len() && b[..a.len()] == *a
}

/// Walks documents and produces compiled node sequences.
pub struct Expander<'a> {
    index: &'a ProjectIndex,
    settings: &'a Settings,
    cancel: CancellationToken,
    scope: ScopeTracker,
    /// (project, unqualified urn) pairs currently being expanded.
    visited: Vec<(String, String)>,
    next_serial: usize,
    suppress: usize,
    anchors: Vec<AnchorRecord>,
    documents: Vec<DocRef>,
}

impl<'a> Expander<'a> {
    pub fn new(index: &'a ProjectIndex, settings: &'a Settings, cancel: CancellationToken) -> Self {
        Self {
            index,
            settings,
            cancel,
            scope: ScopeTracker::new(),
            visited: Vec::new(),
            next_serial: 0,
            suppress: 0,
            anchors: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Expand a whole document. Returns the compiled top-level nodes
    /// (normally one element; empty when everything was excluded).
    pub fn expand_document(&mut self, doc: &Arc<Document>) -> Result<Vec<Node>> {
        tracing::debug!(doc = %doc.doc_ref(), "expanding document");
        self.record_document(doc);
        let mut frame = self.frame(doc, None);
        let mut out = Vec::new();
        self.node(&mut frame, &doc.root, NodeAddr::root(), &mut out)?;
        finish_frame(frame)?;
        Ok(out)
    }

    /// Results accumulated across every document expanded so far.
    pub fn into_expansion(self) -> Expansion {
        Expansion {
            anchors: self.anchors,
            documents: self.documents,
        }
    }

    fn frame<'d>(&mut self, doc: &'d Document, window: Option<Window>) -> Frame<'d> {
        let serial = self.next_serial;
        self.next_serial += 1;
        Frame {
            doc,
            serial,
            window,
            open_declares: Vec::new(),
            open_conditionals: Vec::new(),
        }
    }

    fn record_document(&mut self, doc: &Document) {
        let doc_ref = doc.doc_ref();
        if !self.documents.contains(&doc_ref) {
            self.documents.push(doc_ref);
        }
    }

    fn node(
        &mut self,
        frame: &mut Frame<'_>,
        node: &Node,
        addr: NodeAddr,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        let visibility = frame.visibility(&addr);
        if frame.window.is_some() && visibility == Visibility::In && self.suppress == 0 {
            for open in &mut frame.open_conditionals {
                if let Some(instruction) = open.pending.take() {
                    out.push(instruction);
                }
            }
        }
        match node {
            Node::Element(el) => {
                let entry_suppress = self.suppress;
                let mut children = Vec::new();
                for (i, child) in el.children.iter().enumerate() {
                    self.node(frame, child, addr.child(i), &mut children)?;
                }
                let emit = match visibility {
                    Visibility::Out => false,
                    Visibility::Shell => !children.is_empty(),
                    Visibility::In => entry_suppress == 0 || !children.is_empty(),
                };
                if emit {
                    out.push(Node::Element(Element {
                        tag: el.tag.clone(),
                        attrs: el.attrs.clone(),
                        children,
                    }));
                }
            }

            Node::Text(_) | Node::Milestone(_) => {
                if visibility != Visibility::Out && self.suppress == 0 {
                    out.push(node.clone());
                }
            }

            Node::Anchor(anchor) => {
                // External anchors survive suppression: a standoff note
                // elsewhere may target them.
                let keep = visibility != Visibility::Out
                    && (self.suppress == 0 || anchor.kind == AnchorKind::External);
                if keep {
                    out.push(self.emit_anchor(frame, anchor));
                }
            }

            Node::Transclusion(t) => {
                // Skipped entirely when not emitting: the target's own
                // markers are balanced within the target document.
                if visibility == Visibility::In && self.suppress == 0 {
                    if self.cancel.is_cancelled() {
                        return Err(CompileError::Cancelled);
                    }
                    let nodes = self.transclude(t, frame.doc, frame.site(&addr))?;
                    out.extend(nodes);
                }
            }

            Node::Declare(declare) => {
                let qualified = format!("{}:{}", frame.serial, declare.id);
                self.scope.push_declare(&qualified, &declare.assignments);
                frame.open_declares.push(OpenDeclare {
                    id: declare.id.clone(),
                    qualified,
                    at: frame.site(&addr),
                });
            }

            Node::EndDeclare(end) => {
                let Some(pos) = frame
                    .open_declares
                    .iter()
                    .rposition(|d| d.id == end.target)
                else {
                    return Err(CompileError::UnbalancedScope {
                        id: end.target.clone(),
                        at: frame.site(&addr),
                    });
                };
                let open = frame.open_declares.remove(pos);
                self.scope.pop_declare(&open.qualified);
            }

            Node::Conditional(conditional) => {
                let truth = truth::evaluate(&conditional.condition, &|key| self.scope.current(key));
                tracing::debug!(
                    id = conditional.id,
                    result = ?truth,
                    doc = %frame.doc.doc_ref(),
                    "evaluated conditional"
                );
                let suppressing = truth == Truth::False;
                if suppressing {
                    self.suppress += 1;
                }
                // The reader decides an Undefined conditional, so its
                // instruction stays in the output ahead of the content.
                // Opened before a range window, the instruction is held
                // and emitted when the window is entered.
                let mut pending = None;
                if truth == Truth::Undefined && self.suppress == 0 {
                    if let Some(instruction) = &conditional.instruction {
                        if visibility == Visibility::In {
                            out.push((**instruction).clone());
                        } else {
                            pending = Some((**instruction).clone());
                        }
                    }
                }
                frame.open_conditionals.push(OpenConditional {
                    id: conditional.id.clone(),
                    suppressing,
                    pending,
                    at: frame.site(&addr),
                });
            }

            Node::EndConditional(end) => {
                let Some(pos) = frame
                    .open_conditionals
                    .iter()
                    .rposition(|c| c.id == end.target)
                else {
                    return Err(CompileError::UnmatchedConditional {
                        id: end.target.clone(),
                        at: frame.site(&addr),
                    });
                };
                let open = frame.open_conditionals.remove(pos);
                if open.suppressing {
                    self.suppress -= 1;
                }
            }
        }
        Ok(())
    }

    fn emit_anchor(&mut self, frame: &Frame<'_>, anchor: &Anchor) -> Node {
        let compiled_id = if frame.serial == 0 {
            anchor.id.clone()
        } else {
            format!("t{}.{}", frame.serial, anchor.id)
        };
        self.anchors.push(AnchorRecord {
            compiled_id: compiled_id.clone(),
            source: NoteTarget {
                doc: frame.doc.doc_ref(),
                id: anchor.id.clone(),
            },
        });
        Node::Anchor(Anchor {
            id: compiled_id,
            kind: anchor.kind,
        })
    }

    /// Resolve a transclusion target, pick a project, and expand the
    /// selected fragment.
    fn transclude(
        &mut self,
        transclusion: &Transclusion,
        from: &Document,
        site: ErrorSite,
    ) -> Result<Vec<Node>> {
        let target = &transclusion.target;
        let resolver = UrnResolver::new(self.index);
        let spans = resolver.resolve_span(target).map_err(|err| match err {
            RangeError::Malformed(inner) => CompileError::MalformedRange {
                urn: target.to_string(),
                reason: inner.to_string(),
                at: site.clone(),
            },
            RangeError::SplitRange { .. } => CompileError::MalformedRange {
                urn: target.to_string(),
                reason: err.to_string(),
                at: site.clone(),
            },
        })?;
        if spans.is_empty() {
            return Err(CompileError::UnresolvedUrn {
                urn: target.to_string(),
                at: site,
            });
        }

        let span = self.choose(&spans, &from.project).clone();
        tracing::debug!(
            urn = %target,
            project = span.start.project,
            document = span.start.document,
            "resolved transclusion"
        );

        let key = (span.start.project.clone(), target.unqualified().to_string());
        if self.visited.contains(&key) {
            let mut cycle: Vec<String> = self
                .visited
                .iter()
                .map(|(project, urn)| format!("{urn}@{project}"))
                .collect();
            cycle.push(format!("{}@{}", key.1, key.0));
            return Err(CompileError::CyclicTransclusion { cycle, at: site });
        }

        let doc = self
            .index
            .document(&span.start.project, &span.start.document)
            .ok_or_else(|| {
                CompileError::Internal(format!(
                    "index entry for {} points at missing document {}/{}",
                    target, span.start.project, span.start.document
                ))
            })?
            .clone();

        self.visited.push(key);
        let result = self.fragment(&doc, &span, transclusion.mode);
        self.visited.pop();
        result
    }

    /// Priority order: explicit qualifier, then the settings priority
    /// list, then the including document's own project, then index order.
    fn choose<'s>(&self, spans: &'s [ResolvedSpan], from_project: &str) -> &'s ResolvedSpan {
        UrnResolver::prioritize(spans, &self.settings.priority.transclusion)
            .or_else(|| spans.iter().find(|s| s.start.project == from_project))
            .unwrap_or(&spans[0])
    }

    /// Expand the windowed region of a target document and splice out
    /// the shell chain above the fragment.
    fn fragment(
        &mut self,
        doc: &Arc<Document>,
        span: &ResolvedSpan,
        mode: TransclusionMode,
    ) -> Result<Vec<Node>> {
        self.record_document(doc);
        let start = span.start.addr.clone();
        let stop = self.stop_of(doc, span)?;
        let window = Window {
            start: start.clone(),
            stop,
        };
        let mut frame = self.frame(doc, Some(window));
        let mut top = Vec::new();
        self.node(&mut frame, &doc.root, NodeAddr::root(), &mut top)?;
        finish_frame(frame)?;
        Ok(splice(top, &start, mode))
    }

    /// Exclusive end address of the fragment. A milestone endpoint spans
    /// to the next milestone of the same unit among its following
    /// siblings, else to the end of its container; any other endpoint
    /// spans its own subtree.
    fn stop_of(&self, doc: &Document, span: &ResolvedSpan) -> Result<Option<NodeAddr>> {
        let end = &span.end.addr;
        let node = doc.node_at(end).ok_or_else(|| {
            CompileError::Internal(format!(
                "index entry for {} points at missing node {}:{}",
                span.end.urn,
                doc.doc_ref(),
                end
            ))
        })?;

        let Node::Milestone(milestone) = node else {
            return Ok(successor(end));
        };

        let Some((&last, parent_path)) = end.0.split_last() else {
            // A milestone as document root spans nothing beyond itself.
            return Ok(None);
        };
        let parent_addr = NodeAddr(parent_path.to_vec());
        let siblings = doc
            .node_at(&parent_addr)
            .and_then(Node::children)
            .unwrap_or(&[]);
        for (offset, sibling) in siblings.iter().enumerate().skip(last + 1) {
            if let Node::Milestone(m) = sibling {
                if m.unit == milestone.unit {
                    return Ok(Some(parent_addr.child(offset)));
                }
            }
        }
        Ok(successor(&parent_addr))
    }
}

/// Address immediately after this node's subtree, None for the root.
fn successor(addr: &NodeAddr) -> Option<NodeAddr> {
    let (&last, rest) = addr.0.split_last()?;
    let mut path = rest.to_vec();
    path.push(last + 1);
    Some(NodeAddr(path))
}

/// Drop single-child shells above the fragment, then apply the
/// transclusion mode to the innermost wrapper.
fn splice(mut top: Vec<Node>, start: &NodeAddr, mode: TransclusionMode) -> Vec<Node> {
    let Some(mut node) = top.pop() else {
        return Vec::new();
    };
    let mut depth = 0;
    while depth < start.0.len() {
        match node {
            Node::Element(mut el) if el.children.len() == 1 => {
                node = el.children.remove(0);
                depth += 1;
            }
            other => {
                node = other;
                break;
            }
        }
    }
    match mode {
        TransclusionMode::External => vec![node],
        TransclusionMode::Inline => match node {
            Node::Element(el) if INLINE_WRAPPERS.contains(&el.tag.as_str()) => el.children,
            other => vec![other],
        },
    }
}

/// Every region opened in a frame must close in the same document.
fn finish_frame(frame: Frame<'_>) -> Result<()> {
    if let Some(open) = frame.open_declares.into_iter().next() {
        return Err(CompileError::UnbalancedScope {
            id: open.id,
            at: open.at,
        });
    }
    if let Some(open) = frame.open_conditionals.into_iter().next() {
        return Err(CompileError::UnmatchedConditional {
            id: open.id,
            at: open.at,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensiddur_jlptei::condition::Condition;
    use opensiddur_jlptei::feature::{Assignment, FeatureKey, Value};
    use opensiddur_jlptei::node::{Conditional, Declare, EndConditional, EndDeclare, Milestone};
    use opensiddur_jlptei::urn::Urn;
    use pretty_assertions::assert_eq;

    fn verse(n: &str, urn: &str) -> Node {
        Node::Milestone(Milestone {
            unit: "verse".to_string(),
            n: n.to_string(),
            corresp: Some(Urn::parse(urn).unwrap()),
        })
    }

    fn transclude(urn: &str, mode: TransclusionMode) -> Node {
        Node::Transclusion(Transclusion {
            target: Urn::parse(urn).unwrap(),
            mode,
        })
    }

    fn conditional(id: &str, key: FeatureKey, value: Value) -> Node {
        Node::Conditional(Conditional {
            id: id.to_string(),
            condition: Condition::compare(key, value),
            instruction: Some(Box::new(
                Element::new("note")
                    .with_attr("type", "instruction")
                    .with_child(Node::text("if applicable"))
                    .into(),
            )),
        })
    }

    fn end_conditional(id: &str) -> Node {
        Node::EndConditional(EndConditional {
            target: id.to_string(),
        })
    }

    fn declare(id: &str, key: FeatureKey, value: Value) -> Node {
        Node::Declare(Declare {
            id: id.to_string(),
            assignments: vec![Assignment::new(key, value)],
        })
    }

    fn end_declare(id: &str) -> Node {
        Node::EndDeclare(EndDeclare {
            target: id.to_string(),
        })
    }

    fn genesis(project: &str, text1: &str, text2: &str) -> Document {
        Document::new(
            project,
            "genesis",
            Element::new("body")
                .with_child(
                    Element::new("p")
                        .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                        .with_child(Node::text(text1))
                        .with_child(verse("2", "urn:x-opensiddur:text:bible:genesis/1/2"))
                        .with_child(Node::text(text2))
                        .into(),
                )
                .into(),
        )
    }

    fn expand(index: &ProjectIndex, doc: &Arc<Document>) -> Result<Vec<Node>> {
        let settings = Settings::default_for(&doc.project);
        let mut expander = Expander::new(index, &settings, CancellationToken::new());
        expander.expand_document(doc)
    }

    #[test]
    fn test_plain_document_passes_through() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(genesis("wlc", "one", "two"));
        let index = builder.build();
        let doc = index.document("wlc", "genesis").unwrap().clone();

        let out = expand(&index, &doc).unwrap();
        assert_eq!(out, vec![doc.root.clone()]);
    }

    #[test]
    fn test_external_transclusion_of_single_verse() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(genesis("wlc", "one", "two"));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        // Verse 1 spans up to (excluding) the verse 2 milestone, wrapped
        // in the source paragraph shell.
        let expected: Node = Element::new("body")
            .with_child(
                Element::new("p")
                    .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                    .with_child(Node::text("one"))
                    .into(),
            )
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_inline_transclusion_unwraps_paragraph() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(genesis("wlc", "one", "two"));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("p")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1",
                    TransclusionMode::Inline,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        let expected: Node = Element::new("p")
            .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
            .with_child(Node::text("one"))
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_range_spans_both_verses() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(genesis("wlc", "one", "two"));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1-2",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        let expected: Node = Element::new("body")
            .with_child(
                Element::new("p")
                    .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                    .with_child(Node::text("one"))
                    .with_child(verse("2", "urn:x-opensiddur:text:bible:genesis/1/2"))
                    .with_child(Node::text("two"))
                    .into(),
            )
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_priority_selects_project() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(genesis("wlc", "hebrew", "x"));
        builder.add_document(genesis("jps1917", "english", "y"));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [jps1917, wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        let Node::Element(body) = &out[0] else {
            panic!("expected body element")
        };
        let Node::Element(p) = &body.children[0] else {
            panic!("expected paragraph shell")
        };
        assert_eq!(p.children[1], Node::text("english"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "a",
            Element::new("div")
                .with_attr("corresp", "urn:x-opensiddur:liturgy:a")
                .with_child(transclude(
                    "urn:x-opensiddur:liturgy:b",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        builder.add_document(Document::new(
            "siddur",
            "b",
            Element::new("div")
                .with_attr("corresp", "urn:x-opensiddur:liturgy:b")
                .with_child(transclude(
                    "urn:x-opensiddur:liturgy:a",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "a").unwrap().clone();

        let err = expand(&index, &doc).unwrap_err();
        match err {
            CompileError::CyclicTransclusion { cycle, .. } => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.len() >= 3);
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn test_range_split_across_documents_is_malformed() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "wlc",
            "part1",
            Element::new("body")
                .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                .into(),
        ));
        builder.add_document(Document::new(
            "wlc",
            "part2",
            Element::new("body")
                .with_child(verse("2", "urn:x-opensiddur:text:bible:genesis/1/2"))
                .into(),
        ));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1-2",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let err = expander.expand_document(&doc).unwrap_err();
        assert!(matches!(err, CompileError::MalformedRange { .. }));
    }

    #[test]
    fn test_unresolved_urn_is_an_error() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:nowhere/9/9",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let err = expand(&index, &doc).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedUrn { .. }));
    }

    #[test]
    fn test_false_conditional_suppresses_content() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(declare("d1", key.clone(), Value::str("sefard")))
                .with_child(conditional("c1", key.clone(), Value::str("ashkenaz")))
                .with_child(Node::text("ashkenaz only"))
                .with_child(end_conditional("c1"))
                .with_child(Node::text("everyone"))
                .with_child(end_declare("d1"))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let out = expand(&index, &doc).unwrap();
        let expected: Node = Element::new("body")
            .with_child(Node::text("everyone"))
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_true_conditional_keeps_content_drops_instruction() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(declare("d1", key.clone(), Value::str("ashkenaz")))
                .with_child(conditional("c1", key.clone(), Value::str("ashkenaz")))
                .with_child(Node::text("ashkenaz only"))
                .with_child(end_conditional("c1"))
                .with_child(end_declare("d1"))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let out = expand(&index, &doc).unwrap();
        let expected: Node = Element::new("body")
            .with_child(Node::text("ashkenaz only"))
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_undefined_conditional_keeps_content_and_instruction() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(conditional("c1", key, Value::str("ashkenaz")))
                .with_child(Node::text("ashkenaz only"))
                .with_child(end_conditional("c1"))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let out = expand(&index, &doc).unwrap();
        let Node::Element(body) = &out[0] else {
            panic!("expected body")
        };
        assert_eq!(body.children.len(), 2);
        assert!(matches!(&body.children[0], Node::Element(el) if el.tag == "note"));
        assert_eq!(body.children[1], Node::text("ashkenaz only"));
    }

    #[test]
    fn test_undefined_conditional_open_at_window_start_keeps_instruction() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "wlc",
            "genesis",
            Element::new("body")
                .with_child(
                    Element::new("p")
                        .with_child(conditional("c1", key, Value::str("ashkenaz")))
                        .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                        .with_child(Node::text("one"))
                        .with_child(end_conditional("c1"))
                        .with_child(verse("2", "urn:x-opensiddur:text:bible:genesis/1/2"))
                        .with_child(Node::text("two"))
                        .into(),
                )
                .into(),
        ));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        // The conditional opens before the requested verse; its
        // instruction is emitted at window entry, before the verse.
        let expected: Node = Element::new("body")
            .with_child(
                Element::new("p")
                    .with_child(
                        Element::new("note")
                            .with_attr("type", "instruction")
                            .with_child(Node::text("if applicable"))
                            .into(),
                    )
                    .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                    .with_child(Node::text("one"))
                    .into(),
            )
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_conditional_closed_before_window_drops_instruction() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "wlc",
            "genesis",
            Element::new("body")
                .with_child(
                    Element::new("p")
                        .with_child(conditional("c1", key, Value::str("ashkenaz")))
                        .with_child(end_conditional("c1"))
                        .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                        .with_child(Node::text("one"))
                        .into(),
                )
                .into(),
        ));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        // The conditional region ends before the fragment; no fragment
        // content is contingent on it, so no instruction appears.
        let expected: Node = Element::new("body")
            .with_child(
                Element::new("p")
                    .with_child(verse("1", "urn:x-opensiddur:text:bible:genesis/1/1"))
                    .with_child(Node::text("one"))
                    .into(),
            )
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_external_anchor_survives_suppression() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(declare("d1", key.clone(), Value::str("sefard")))
                .with_child(conditional("c1", key, Value::str("ashkenaz")))
                .with_child(Node::Anchor(Anchor {
                    id: "a1".to_string(),
                    kind: AnchorKind::External,
                }))
                .with_child(Node::Anchor(Anchor {
                    id: "a2".to_string(),
                    kind: AnchorKind::Internal,
                }))
                .with_child(end_conditional("c1"))
                .with_child(end_declare("d1"))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let out = expand(&index, &doc).unwrap();
        let Node::Element(body) = &out[0] else {
            panic!("expected body")
        };
        assert_eq!(
            body.children,
            vec![Node::Anchor(Anchor {
                id: "a1".to_string(),
                kind: AnchorKind::External,
            })]
        );
    }

    #[test]
    fn test_unbalanced_declare_is_an_error() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(declare("d1", key, Value::str("ashkenaz")))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let err = expand(&index, &doc).unwrap_err();
        assert!(matches!(err, CompileError::UnbalancedScope { id, .. } if id == "d1"));
    }

    #[test]
    fn test_stray_end_conditional_is_an_error() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body").with_child(end_conditional("c9")).into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let err = expand(&index, &doc).unwrap_err();
        assert!(matches!(err, CompileError::UnmatchedConditional { id, .. } if id == "c9"));
    }

    #[test]
    fn test_declared_scope_crosses_into_transclusion() {
        let key = FeatureKey::new("liturgy", "rite");
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "wlc",
            "psalm",
            Element::new("p")
                .with_attr("corresp", "urn:x-opensiddur:text:psalms/23")
                .with_child(conditional("c1", key.clone(), Value::str("ashkenaz")))
                .with_child(Node::text("variant"))
                .with_child(end_conditional("c1"))
                .into(),
        ));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(declare("d1", key, Value::str("ashkenaz")))
                .with_child(transclude(
                    "urn:x-opensiddur:text:psalms/23",
                    TransclusionMode::External,
                ))
                .with_child(end_declare("d1"))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();

        // The rite declared in the including document resolves the
        // conditional inside the transcluded psalm.
        let expected: Node = Element::new("body")
            .with_child(
                Element::new("p")
                    .with_attr("corresp", "urn:x-opensiddur:text:psalms/23")
                    .with_child(Node::text("variant"))
                    .into(),
            )
            .into();
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_transcluded_anchors_are_remapped() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(Document::new(
            "wlc",
            "psalm",
            Element::new("p")
                .with_attr("corresp", "urn:x-opensiddur:text:psalms/23")
                .with_child(Node::Anchor(Anchor {
                    id: "a1".to_string(),
                    kind: AnchorKind::External,
                }))
                .into(),
        ));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:psalms/23",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::from_yaml("priority: {transclusion: [wlc]}").unwrap();
        let mut expander = Expander::new(&index, &settings, CancellationToken::new());
        let out = expander.expand_document(&doc).unwrap();
        let expansion = expander.into_expansion();

        let Node::Element(body) = &out[0] else {
            panic!("expected body")
        };
        let Node::Element(p) = &body.children[0] else {
            panic!("expected p")
        };
        let Node::Anchor(anchor) = &p.children[0] else {
            panic!("expected anchor")
        };
        assert_eq!(anchor.id, "t1.a1");
        assert_eq!(
            expansion.anchors,
            vec![AnchorRecord {
                compiled_id: "t1.a1".to_string(),
                source: NoteTarget {
                    doc: DocRef::new("wlc", "psalm"),
                    id: "a1".to_string(),
                },
            }]
        );
    }

    #[test]
    fn test_cancellation_stops_at_transclusion_boundary() {
        let mut builder = ProjectIndex::builder();
        builder.add_document(genesis("wlc", "one", "two"));
        builder.add_document(Document::new(
            "siddur",
            "service",
            Element::new("body")
                .with_child(transclude(
                    "urn:x-opensiddur:text:bible:genesis/1/1",
                    TransclusionMode::External,
                ))
                .into(),
        ));
        let index = builder.build();
        let doc = index.document("siddur", "service").unwrap().clone();

        let settings = Settings::default_for("siddur");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut expander = Expander::new(&index, &settings, cancel);
        let err = expander.expand_document(&doc).unwrap_err();
        assert!(matches!(err, CompileError::Cancelled));
    }
}
