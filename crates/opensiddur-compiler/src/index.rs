/*
 * index.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! The read-only project index.
//!
//! The index maps canonical URNs to (project, document, node) locations
//! and carries each project's standoff notes. It is built out-of-band by
//! the loader, once per generation, and shared immutably by every compile
//! in flight. [`IndexHandle`] publishes a new generation atomically
//! (copy-and-swap): a compile clones the `Arc` once at the start and can
//! never observe a partially-rebuilt index.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use opensiddur_jlptei::document::{DocRef, Document, NodeAddr};
use opensiddur_jlptei::node::Node;
use opensiddur_jlptei::urn::Urn;
use serde::{Deserialize, Serialize};

/// Location of a URN within a project.
#[derive(Debug, Clone, PartialEq)]
pub struct UrnEntry {
    /// Canonical URN key (no range, no project qualifier).
    pub urn: String,
    /// Document name within the project.
    pub document: String,
    /// Address of the node carrying the corresponding `corresp`.
    pub addr: NodeAddr,
}

/// Kind of a standoff note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Instructional note tied to conditional content; selected by
    /// priority when multiple projects define the same canonical note.
    Instruction,
    /// Commentary/editorial note; unioned across annotation projects.
    Commentary,
}

/// An anchor-targeted note within a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteTarget {
    /// Document containing the target anchor.
    pub doc: DocRef,
    /// Anchor id within that document.
    pub id: String,
}

/// A standoff note contributed by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandoffNote {
    pub kind: NoteKind,
    /// Canonical URN identifying the note across projects, if any.
    /// Instruction notes sharing a `corresp` are variants of one note.
    pub corresp: Option<Urn>,
    /// Anchor the note attaches to.
    pub target: NoteTarget,
    /// End anchor for ranged notes.
    pub target_end: Option<NoteTarget>,
    /// Note body.
    pub content: Vec<Node>,
}

/// One project's contribution to the index.
#[derive(Debug, Clone, Default)]
pub struct ProjectEntry {
    documents: IndexMap<String, Arc<Document>>,
    urns: IndexMap<String, UrnEntry>,
    notes: Vec<StandoffNote>,
}

impl ProjectEntry {
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    pub fn notes(&self) -> &[StandoffNote] {
        &self.notes
    }
}

/// Immutable index over every project of the current generation.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    projects: IndexMap<String, ProjectEntry>,
}

impl ProjectIndex {
    /// Start building a new generation.
    pub fn builder() -> ProjectIndexBuilder {
        ProjectIndexBuilder::default()
    }

    pub fn has_project(&self, project: &str) -> bool {
        self.projects.contains_key(project)
    }

    /// Project ids in insertion order.
    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn document(&self, project: &str, name: &str) -> Option<&Arc<Document>> {
        self.projects.get(project)?.documents.get(name)
    }

    /// All notes contributed by a project.
    pub fn notes(&self, project: &str) -> &[StandoffNote] {
        self.projects
            .get(project)
            .map(ProjectEntry::notes)
            .unwrap_or(&[])
    }

    /// Every (project, entry) defining the canonical URN key, in project
    /// insertion order. The caller decides priority among them.
    pub fn lookup(&self, key: &str) -> Vec<(&str, &UrnEntry)> {
        self.projects
            .iter()
            .filter_map(|(project, entry)| {
                entry.urns.get(key).map(|e| (project.as_str(), e))
            })
            .collect()
    }

    /// The entry for the canonical URN key within a single project.
    pub fn lookup_in(&self, project: &str, key: &str) -> Option<&UrnEntry> {
        self.projects.get(project)?.urns.get(key)
    }
}

/// Builder for a new index generation.
#[derive(Debug, Default)]
pub struct ProjectIndexBuilder {
    index: ProjectIndex,
}

impl ProjectIndexBuilder {
    /// Register a project, even if it contributes no documents yet.
    pub fn project(&mut self, project: &str) -> &mut Self {
        self.index.projects.entry(project.to_string()).or_default();
        self
    }

    /// Add a document and index every `corresp` URN it defines.
    pub fn add_document(&mut self, doc: Document) -> &mut Self {
        let project = doc.project.clone();
        let name = doc.name.clone();
        let entry = self.index.projects.entry(project).or_default();
        index_node(&doc.root, &NodeAddr::root(), &name, &mut entry.urns);
        entry.documents.insert(name, Arc::new(doc));
        self
    }

    /// Add a standoff note contributed by a project.
    pub fn add_note(&mut self, project: &str, note: StandoffNote) -> &mut Self {
        self.index
            .projects
            .entry(project.to_string())
            .or_default()
            .notes
            .push(note);
        self
    }

    pub fn build(self) -> ProjectIndex {
        self.index
    }
}

/// Record `corresp` URNs carried by this node, then recurse. Attribute
/// values are canonicalized through [`Urn::key`] like milestone URNs;
/// values that do not parse as URNs are not indexed.
fn index_node(node: &Node, addr: &NodeAddr, document: &str, urns: &mut IndexMap<String, UrnEntry>) {
    let corresp = match node {
        Node::Milestone(m) => m.corresp.as_ref().map(|u| u.key()),
        Node::Element(el) => el
            .attrs
            .get("corresp")
            .and_then(|value| Urn::parse(value).ok())
            .map(|urn| urn.key()),
        _ => None,
    };
    if let Some(key) = corresp {
        urns.entry(key.clone()).or_insert_with(|| UrnEntry {
            urn: key,
            document: document.to_string(),
            addr: addr.clone(),
        });
    }
    if let Node::Element(el) = node {
        for (i, child) in el.children.iter().enumerate() {
            index_node(child, &addr.child(i), document, urns);
        }
    }
}

/// Handle to the current index generation.
///
/// Rebuilds happen out-of-band: the loader builds a fresh [`ProjectIndex`]
/// and calls [`IndexHandle::swap`]. Compiles already running keep their
/// `Arc` to the old generation.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<ProjectIndex>>,
}

impl IndexHandle {
    pub fn new(index: ProjectIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The current generation. Cloning the `Arc` pins it for the caller.
    pub fn load(&self) -> Arc<ProjectIndex> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publish a new generation atomically.
    pub fn swap(&self, index: ProjectIndex) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(index);
    }
}
