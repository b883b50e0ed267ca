// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Textual views of a finished compilation, used to compare builds.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::{
    graph::{FieldInclusion, TypeTraversal},
    node::{EmitMode, NodeKey},
    NodeFactory,
    NodeId,
};

fn hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Lists the GC and EH info of every compiled method.
pub struct XmlDumper<'a> {
    factory: &'a NodeFactory,
}

impl<'a> XmlDumper<'a> {
    #[must_use]
    pub fn new(factory: &'a NodeFactory) -> Self {
        Self { factory }
    }

    #[must_use]
    pub fn dump(&self, nodes: &[NodeId]) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<ObjectNodes>\n");

        for node in nodes {
            let NodeKey::MethodCode(..) = self.factory.key(*node) else {
                continue;
            };

            let node_ref = self.factory.node(*node);
            let Some(code) = node_ref.code() else {
                continue;
            };

            let name = self.factory.mangled_name(*node).unwrap_or_default();
            out.push_str(&format!("  <MethodWithGCInfo Name=\"{}\" Length=\"{}\">\n", escape(&name), code.data.len()));
            out.push_str(&format!("    <GCInfo Length=\"{}\" Hash=\"{}\" />\n", code.gc_info.len(), hash(&code.gc_info)));

            if let Some(eh_info) = &code.eh_info {
                out.push_str(&format!("    <EHInfo Length=\"{}\" Hash=\"{}\" />\n", eh_info.len(), hash(eh_info)));
            }

            out.push_str("  </MethodWithGCInfo>\n");
        }

        out.push_str("</ObjectNodes>\n");
        out
    }
}

/// Attribute-safe: markup characters become entities, control characters
/// become numeric references.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => out.push_str(&format!("&#x{:X};", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}

/// Every emitted node in emission order, followed by the types in the order
/// their layouts depend on each other.
pub struct MapDumper<'a> {
    factory: &'a NodeFactory,
    marked: &'a HashSet<NodeId>,
}

impl<'a> MapDumper<'a> {
    #[must_use]
    pub fn new(factory: &'a NodeFactory, marked: &'a HashSet<NodeId>) -> Self {
        Self { factory, marked }
    }

    #[must_use]
    pub fn dump(&self, nodes: &[NodeId]) -> String {
        let os = self.factory.platform().operating_system();
        let mut out = String::from("# Nodes\n");

        for node in nodes {
            let Some(section) = self.factory.section(*node) else {
                continue;
            };

            let Ok(Some(data)) = self.factory.object_data(*node, EmitMode::Final(self.marked)) else {
                continue;
            };

            let name = self.factory.mangled_name(*node).unwrap_or_else(|| self.factory.display_name(*node));
            out.push_str(&format!("{}\t{name}\t{}\n", section.name(os), data.len()));
        }

        out.push_str("\n# Types\n");
        let ctx = self.factory.type_system();

        let mut traversal = TypeTraversal::new(ctx, FieldInclusion::ValueTypesOnly);
        for node in nodes {
            if let NodeKey::NecessaryType(ty) | NodeKey::ConstructedType(ty) = self.factory.key(*node) {
                traversal.visit(ty);
            }
        }

        for ty in traversal.finish() {
            let form = if self.is_marked(NodeKey::ConstructedType(ty)) {
                "constructed"
            } else if self.is_marked(NodeKey::NecessaryType(ty)) {
                "necessary"
            } else {
                "layout"
            };

            out.push_str(&format!("{}\t{form}\t{}\n", ctx.type_name(ty), ctx.base_size(ty)));
        }

        out
    }

    fn is_marked(&self, key: NodeKey) -> bool {
        self.factory.existing(&key).is_some_and(|node| self.marked.contains(&node))
    }
}
