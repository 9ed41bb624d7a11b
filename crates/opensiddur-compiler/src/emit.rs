/*
 * emit.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Output serialization for compiled trees.
//!
//! A compiled tree contains only elements, text, milestones, and
//! anchors; any scaffolding node left over is an internal error, never
//! silently serialized.

use opensiddur_jlptei::node::{AnchorKind, Node};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{CompileError, Result};

/// Serialize a compiled tree as an XML fragment.
pub fn to_xml(root: &Node) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, root)?;
    String::from_utf8(writer.into_inner())
        .map_err(|err| CompileError::Internal(format!("emitted XML is not UTF-8: {err}")))
}

/// Serialize a compiled tree as JSON.
pub fn to_json(root: &Node) -> Result<String> {
    ensure_compiled(root)?;
    Ok(serde_json::to_string_pretty(root)?)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Element(el) => {
            let mut start = BytesStart::new(el.tag.as_str());
            for (key, value) in &el.attrs {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if el.children.is_empty() {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for child in &el.children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(el.tag.as_str())))?;
            }
        }

        Node::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }

        Node::Milestone(m) => {
            let mut start = BytesStart::new("milestone");
            start.push_attribute(("unit", m.unit.as_str()));
            start.push_attribute(("n", m.n.as_str()));
            if let Some(corresp) = &m.corresp {
                start.push_attribute(("corresp", corresp.to_string().as_str()));
            }
            writer.write_event(Event::Empty(start))?;
        }

        Node::Anchor(anchor) => {
            let mut start = BytesStart::new("anchor");
            start.push_attribute(("xml:id", anchor.id.as_str()));
            let kind = match anchor.kind {
                AnchorKind::Internal => "internal",
                AnchorKind::External => "external",
            };
            start.push_attribute(("type", kind));
            writer.write_event(Event::Empty(start))?;
        }

        scaffolding => {
            return Err(CompileError::Internal(format!(
                "{} node survived compilation",
                scaffolding.describe()
            )));
        }
    }
    Ok(())
}

fn ensure_compiled(root: &Node) -> Result<()> {
    if root.is_fully_compiled() {
        Ok(())
    } else {
        Err(CompileError::Internal(
            "scaffolding survived compilation".to_string(),
        ))
    }
}
