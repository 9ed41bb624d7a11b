/*
 * annotate.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Standoff annotation merging.
//!
//! After expansion, notes are attached to the compiled tree at the
//! anchors they target. Instruction notes sharing a canonical `corresp`
//! are variants of one note: exactly one variant is inserted, chosen by
//! the instruction priority list, falling back to the variant native to
//! the target document's project. Commentary notes are a union over the
//! settings' annotation projects. A note whose target anchor did not
//! survive compilation is dropped with a warning.

use std::collections::HashMap;

use indexmap::IndexMap;
use opensiddur_jlptei::node::{Element, Node};

use crate::error::CompileWarning;
use crate::expand::Expansion;
use crate::index::{NoteKind, NoteTarget, ProjectIndex, StandoffNote};
use crate::settings::Settings;

/// Insert matching standoff notes into the compiled tree. Returns
/// warnings for notes whose targets are gone.
pub fn merge_annotations(
    root: &mut Node,
    expansion: &Expansion,
    index: &ProjectIndex,
    settings: &Settings,
) -> Vec<CompileWarning> {
    let mut compiled_ids: HashMap<&NoteTarget, Vec<&str>> = HashMap::new();
    for record in &expansion.anchors {
        compiled_ids
            .entry(&record.source)
            .or_default()
            .push(&record.compiled_id);
    }

    let mut warnings = Vec::new();
    let mut pending: HashMap<String, Vec<Node>> = HashMap::new();

    for (project, note) in select_instructions(index, settings, expansion) {
        attach(note, project, &compiled_ids, &mut pending, &mut warnings);
    }
    for project in &settings.annotations {
        for note in index.notes(project) {
            if note.kind == NoteKind::Commentary
                && expansion.documents.contains(&note.target.doc)
            {
                attach(note, project, &compiled_ids, &mut pending, &mut warnings);
            }
        }
    }

    insert_pending(root, &mut pending);
    warnings
}

/// One instruction variant per canonical note, in index project order.
fn select_instructions<'a>(
    index: &'a ProjectIndex,
    settings: &'a Settings,
    expansion: &Expansion,
) -> Vec<(&'a str, &'a StandoffNote)> {
    let mut groups: IndexMap<String, Vec<(&str, &StandoffNote)>> = IndexMap::new();
    for project in index.projects() {
        for note in index.notes(project) {
            if note.kind != NoteKind::Instruction
                || !expansion.documents.contains(&note.target.doc)
            {
                continue;
            }
            let key = match &note.corresp {
                Some(urn) => urn.key(),
                // No canonical identity: the note stands alone.
                None => format!("{}#{}", note.target.doc, note.target.id),
            };
            groups.entry(key).or_default().push((project, note));
        }
    }

    groups
        .into_iter()
        .filter_map(|(key, variants)| {
            let picked = settings
                .priority
                .instructions
                .iter()
                .find_map(|p| variants.iter().find(|(project, _)| *project == p.as_str()))
                .or_else(|| {
                    variants
                        .iter()
                        .find(|(project, note)| *project == note.target.doc.project)
                })
                .copied();
            if picked.is_none() {
                tracing::debug!(note = key, "no instruction variant selected");
            }
            picked
        })
        .collect()
}

fn attach(
    note: &StandoffNote,
    project: &str,
    compiled_ids: &HashMap<&NoteTarget, Vec<&str>>,
    pending: &mut HashMap<String, Vec<Node>>,
    warnings: &mut Vec<CompileWarning>,
) {
    let Some(ids) = compiled_ids.get(&note.target) else {
        tracing::warn!(
            target = note.target.id,
            doc = %note.target.doc,
            project,
            "dropping note with dangling target"
        );
        warnings.push(CompileWarning::DanglingAnnotationTarget {
            target: note.target.id.clone(),
            target_doc: note.target.doc.clone(),
            note_project: project.to_string(),
        });
        return;
    };
    // A ranged note keeps its end reference when the end anchor survived.
    let end_id = note
        .target_end
        .as_ref()
        .and_then(|end| compiled_ids.get(end))
        .and_then(|ids| ids.first());

    for id in ids {
        let mut el = Element::new("note")
            .with_attr(
                "type",
                match note.kind {
                    NoteKind::Instruction => "instruction",
                    NoteKind::Commentary => "commentary",
                },
            )
            .with_attr("source", project);
        if let Some(end) = end_id {
            el = el.with_attr("targetEnd", format!("#{end}"));
        }
        let el = el.with_children(note.content.iter().cloned());
        pending.entry((*id).to_string()).or_default().push(el.into());
    }
}

/// Splice pending notes in directly after the anchors that carry their
/// target ids.
fn insert_pending(node: &mut Node, pending: &mut HashMap<String, Vec<Node>>) {
    let Node::Element(el) = node else { return };
    let mut children = Vec::with_capacity(el.children.len());
    for mut child in std::mem::take(&mut el.children) {
        insert_pending(&mut child, pending);
        let anchor_id = match &child {
            Node::Anchor(anchor) => Some(anchor.id.clone()),
            _ => None,
        };
        children.push(child);
        if let Some(id) = anchor_id {
            if let Some(notes) = pending.remove(&id) {
                children.extend(notes);
            }
        }
    }
    el.children = children;
}
