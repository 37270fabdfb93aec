//! Symbol tree: one root per uploaded symbol, in upload order, each expanded
//! through the datatype catalog on demand.

use std::collections::HashMap;

use log::debug;

use super::datatypes::DatatypeCatalog;
use super::protocol::AdsDatatypeId;
use super::record::SymbolView;
use super::resolver::{NodeId, TypeNode, TypeTree, DEFAULT_MAX_ALIAS_DEPTH};
use super::symbols::SymbolCatalog;
use crate::domain::model::NodeInfo;
use crate::error::Diagnostic;

#[derive(Debug)]
pub struct SymbolTree {
    datatypes: DatatypeCatalog,
    symbols: SymbolCatalog,
    types: TypeTree,
    roots: Vec<NodeId>,
    by_name: HashMap<String, NodeId>,
}

impl SymbolTree {
    pub fn new(datatypes: DatatypeCatalog, symbols: SymbolCatalog) -> Self {
        Self::with_alias_depth(datatypes, symbols, DEFAULT_MAX_ALIAS_DEPTH)
    }

    pub fn with_alias_depth(datatypes: DatatypeCatalog, symbols: SymbolCatalog, max_alias_depth: usize) -> Self {
        let mut types = TypeTree::with_alias_depth(max_alias_depth);
        let mut roots = Vec::with_capacity(symbols.len());
        let mut by_name = HashMap::with_capacity(symbols.len());

        for (index, (name, view)) in symbols.entries().enumerate() {
            let id = types.add_symbol_root(&view, index, symbols.codec());
            let type_name = view.type_name(symbols.codec());
            if !type_name.is_empty() && !datatypes.contains(&type_name) {
                // 符号保留，但没有子节点
                types.report(Diagnostic::UnresolvedType {
                    type_name,
                    context: name.to_string(),
                });
            }
            roots.push(id);
            by_name.insert(name.to_string(), id);
        }
        debug!(
            "symbol tree: {} symbols over {} datatypes",
            roots.len(),
            datatypes.len()
        );

        Self {
            datatypes,
            symbols,
            types,
            roots,
            by_name,
        }
    }

    /// Symbol roots in upload order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn datatypes(&self) -> &DatatypeCatalog {
        &self.datatypes
    }

    pub fn symbols(&self) -> &SymbolCatalog {
        &self.symbols
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.types.diagnostics()
    }

    pub fn node(&self, id: NodeId) -> &TypeNode {
        self.types.node(id)
    }

    pub fn symbol_root(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Record of the symbol that owns `id`.
    pub fn symbol_of(&self, id: NodeId) -> Option<SymbolView<'_>> {
        let root = self.types.node(self.types.root_of(id));
        self.symbols.get(root.symbol_index()?)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.types.child_count(id, &self.datatypes)
    }

    pub fn children(&mut self, id: NodeId) -> Vec<NodeId> {
        self.types.children(id, &self.datatypes).to_vec()
    }

    pub fn absolute_offset(&self, id: NodeId) -> u32 {
        self.types.absolute_offset(id)
    }

    pub fn group(&self, id: NodeId) -> u32 {
        self.types.group(id)
    }

    pub fn full_path(&self, id: NodeId) -> String {
        self.types.full_path(id)
    }

    pub fn qualified_name(&self, id: NodeId) -> String {
        self.types.qualified_name(id)
    }

    pub fn describe(&self, id: NodeId) -> NodeInfo {
        let node = self.types.node(id);
        NodeInfo {
            name: node.name().to_string(),
            kind: node.kind(),
            type_name: node.type_name().to_string(),
            comment: node.comment().to_string(),
            qualified_name: self.qualified_name(id),
            group: self.group(id),
            offset: self.absolute_offset(id),
            size: node.size(),
            data_type: node.data_type(),
            data_type_name: AdsDatatypeId::from_raw(node.data_type()).label().to_string(),
            child_count: self.child_count(id),
        }
    }

    /// Resolve `MAIN.stAxis.aPos[2]` back to its node, expanding along the
    /// way. Symbol names may contain dots; the longest matching one wins.
    pub fn find(&mut self, qualified: &str) -> Option<NodeId> {
        let qualified = qualified.trim();
        let cuts = qualified
            .char_indices()
            .filter(|(_, c)| *c == '.' || *c == '[')
            .map(|(i, _)| i)
            .chain(std::iter::once(qualified.len()));
        let mut cuts: Vec<usize> = cuts.collect();
        cuts.reverse();

        for cut in cuts {
            let Some(root) = self.symbol_root(&qualified[..cut]) else {
                continue;
            };
            let Some(segments) = split_path(&qualified[cut..]) else {
                continue;
            };
            if let Some(found) = self.walk(root, &segments) {
                return Some(found);
            }
        }
        None
    }

    fn walk(&mut self, root: NodeId, segments: &[String]) -> Option<NodeId> {
        let mut current = root;
        for segment in segments {
            let children = self.children(current);
            current = children
                .into_iter()
                .find(|child| self.types.node(*child).name() == segment)?;
        }
        Some(current)
    }
}

/// Split `.a.b[1, 2].c` into `a`, `b`, `[1,2]`, `c`. Whitespace inside
/// brackets is dropped so labels match the generated ones.
pub fn split_path(path: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut rest = path;
    while let Some(first) = rest.chars().next() {
        match first {
            '.' => {
                let body = &rest[1..];
                let end = body.find(['.', '[']).unwrap_or(body.len());
                if end == 0 {
                    return None;
                }
                segments.push(body[..end].to_string());
                rest = &body[end..];
            }
            '[' => {
                let close = rest.find(']')?;
                let label: String = rest[..=close].chars().filter(|c| !c.is_whitespace()).collect();
                segments.push(label);
                rest = &rest[close + 1..];
            }
            _ => return None,
        }
    }
    Some(segments)
}
