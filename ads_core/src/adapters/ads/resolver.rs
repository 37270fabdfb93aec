//! Type tree resolution.
//!
//! Nodes live in an arena owned by [`TypeTree`]; a node keeps the id of its
//! parent and, once expanded, the ids of its children. Expansion happens the
//! first time children are requested and is memoized on the node.
//!
//! Children of a node are its declaration's sub-items (in stored order)
//! followed by one element per array index. The declaration is the record the
//! node's type reference names, or the node's own record when the reference
//! is empty.

use std::collections::HashSet;

use log::{debug, warn};
use serde::Serialize;

use super::datatypes::DatatypeCatalog;
use super::protocol::{ArrayInfo, DATATYPE_FLAG_REFERENCETO};
use super::record::{DatatypeView, RecordSpan, SymbolView};
use crate::error::Diagnostic;
use crate::ports::TextCodec;

pub use crate::domain::model::NodeKind;

pub const DEFAULT_MAX_ALIAS_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TypeNode {
    name: String,
    kind: NodeKind,
    local_offset: u32,
    record: Option<RecordSpan>,
    type_name: String,
    comment: String,
    size: u32,
    data_type: u32,
    group: u32,
    symbol: Option<usize>,
    parent: Option<NodeId>,
    children: Option<Vec<NodeId>>,
}

impl TypeNode {
    /// Field name, array label such as `[3,1]`, or the root's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Offset relative to the parent node. For a symbol root this is the
    /// symbol's base offset.
    pub fn local_offset(&self) -> u32 {
        self.local_offset
    }

    /// Datatype record describing this node, if any (symbol roots have none).
    pub fn record(&self) -> Option<RecordSpan> {
        self.record
    }

    /// Name of the type this node refers to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data_type(&self) -> u32 {
        self.data_type
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Upload position of the symbol, for symbol roots.
    pub fn symbol_index(&self) -> Option<usize> {
        self.symbol
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }
}

#[derive(Debug, Clone)]
struct ArrayPlan {
    dims: Vec<ArrayInfo>,
    count: u64,
    element_size: u32,
    base: u32,
}

/// What a node expands into, before any node is allocated.
struct Plan<'c> {
    declaration: DatatypeView<'c>,
    fields: Vec<DatatypeView<'c>>,
    array: Option<ArrayPlan>,
}

impl Plan<'_> {
    fn child_count(&self) -> usize {
        self.fields.len() + self.array.as_ref().map_or(0, |a| a.count as usize)
    }
}

/// Row-major index labels, last dimension varying fastest: `[0,0]`, `[0,1]`, ...
#[derive(Debug, Clone)]
pub struct ArrayIndices {
    dims: Vec<ArrayInfo>,
    current: Vec<u32>,
    done: bool,
}

impl ArrayIndices {
    pub fn new(dims: &[ArrayInfo]) -> Self {
        let done = dims.is_empty() || dims.iter().any(|d| d.elements == 0);
        Self {
            dims: dims.to_vec(),
            current: vec![0; dims.len()],
            done,
        }
    }
}

impl Iterator for ArrayIndices {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let parts: Vec<String> = self
            .dims
            .iter()
            .zip(&self.current)
            .map(|(dim, i)| (dim.lower_bound as i64 + *i as i64).to_string())
            .collect();
        let label = format!("[{}]", parts.join(","));

        let mut axis = self.dims.len();
        loop {
            if axis == 0 {
                self.done = true;
                break;
            }
            axis -= 1;
            self.current[axis] += 1;
            if self.current[axis] < self.dims[axis].elements {
                break;
            }
            self.current[axis] = 0;
        }
        Some(label)
    }
}

/// 类型树：节点竞技场 + 懒加载子节点。
#[derive(Debug, Clone)]
pub struct TypeTree {
    nodes: Vec<TypeNode>,
    diagnostics: Vec<Diagnostic>,
    reported: HashSet<Diagnostic>,
    max_alias_depth: usize,
}

impl Default for TypeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTree {
    pub fn new() -> Self {
        Self::with_alias_depth(DEFAULT_MAX_ALIAS_DEPTH)
    }

    pub fn with_alias_depth(max_alias_depth: usize) -> Self {
        Self {
            nodes: Vec::new(),
            diagnostics: Vec::new(),
            reported: HashSet::new(),
            max_alias_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Everything reported so far, each condition once.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        if self.reported.insert(diagnostic.clone()) {
            warn!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&TypeNode> {
        self.nodes.get(id.0)
    }

    /// Ids only come from this tree, so indexing cannot miss.
    pub fn node(&self, id: NodeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    fn push(&mut self, node: TypeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Open a root on a catalog datatype. The type's own name is the
    /// reference, so the record itself (after aliases) is the declaration.
    pub fn add_type_root(&mut self, catalog: &DatatypeCatalog, name: &str) -> Option<NodeId> {
        let view = catalog.lookup(name)?;
        let codec = catalog.codec();
        Some(self.push(TypeNode {
            name: name.to_string(),
            kind: NodeKind::Type,
            local_offset: 0,
            record: Some(view.span()),
            type_name: name.to_string(),
            comment: view.comment(codec),
            size: view.size(),
            data_type: view.data_type(),
            group: 0,
            symbol: None,
            parent: None,
            children: None,
        }))
    }

    /// Open a root for a symbol; its base offset becomes the root's local offset.
    pub fn add_symbol_root(&mut self, symbol: &SymbolView<'_>, index: usize, codec: &dyn TextCodec) -> NodeId {
        self.push(TypeNode {
            name: symbol.name(codec),
            kind: NodeKind::Symbol,
            local_offset: symbol.offset(),
            record: None,
            type_name: symbol.type_name(codec),
            comment: symbol.comment(codec),
            size: symbol.size(),
            data_type: symbol.data_type(),
            group: symbol.group(),
            symbol: Some(index),
            parent: None,
            children: None,
        })
    }

    fn declaration<'c>(
        &self,
        node: &TypeNode,
        catalog: &'c DatatypeCatalog,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<DatatypeView<'c>> {
        let codec = catalog.codec();
        // 引用成员只占指针大小，不展开被引用的类型
        if node.kind == NodeKind::Field {
            let own = node.record.and_then(|span| catalog.view(span));
            if own.is_some_and(|view| view.flags() & DATATYPE_FLAG_REFERENCETO != 0) {
                return None;
            }
        }
        let mut decl = if !node.type_name.is_empty() {
            match catalog.lookup(&node.type_name) {
                Some(view) => view,
                None => {
                    diags.push(Diagnostic::UnresolvedType {
                        type_name: node.type_name.clone(),
                        context: node.name.clone(),
                    });
                    return None;
                }
            }
        } else {
            match node.kind {
                // an element without an element type has nothing below it
                NodeKind::Element => return None,
                NodeKind::Symbol => {
                    diags.push(Diagnostic::UnresolvedType {
                        type_name: String::new(),
                        context: node.name.clone(),
                    });
                    return None;
                }
                NodeKind::Type | NodeKind::Field => catalog.view(node.record?)?,
            }
        };

        // An alias only stands for its target when it has the same storage;
        // references and pointers keep their own size and stay leaves.
        let mut depth = 0;
        while decl.sub_item_count() == 0 && decl.array_dim() == 0 {
            if decl.flags() & DATATYPE_FLAG_REFERENCETO != 0 {
                break;
            }
            let target = decl.type_name(codec);
            if target.is_empty() || target == decl.name(codec) {
                break;
            }
            let Some(next) = catalog.lookup(&target) else {
                debug!("alias target '{}' not in catalog, '{}' stays a leaf", target, node.name);
                break;
            };
            if next.size() != decl.size() {
                debug!(
                    "'{}' ({} bytes) is not an alias of '{}' ({} bytes)",
                    decl.name(codec),
                    decl.size(),
                    target,
                    next.size()
                );
                break;
            }
            depth += 1;
            if depth > self.max_alias_depth {
                diags.push(Diagnostic::AliasDepthExceeded {
                    type_name: node.type_name.clone(),
                    depth: self.max_alias_depth,
                });
                return None;
            }
            decl = next;
        }
        Some(decl)
    }

    /// `inline` marks a declaration that is the node's own record; its `offs`
    /// is then the node's position in the parent and elements start at 0.
    fn array_plan(
        decl: &DatatypeView<'_>,
        inline: bool,
        catalog: &DatatypeCatalog,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<ArrayPlan> {
        if decl.array_dim() == 0 {
            return None;
        }
        let codec = catalog.codec();
        let type_name = decl.name(codec);
        let dims: Vec<ArrayInfo> = decl.array_info().collect();
        let count = dims
            .iter()
            .fold(1u64, |acc, dim| acc.saturating_mul(dim.elements as u64));
        if count == 0 || decl.size() == 0 {
            return None;
        }

        let element_type = decl.type_name(codec);
        if !element_type.is_empty() {
            match catalog.lookup(&element_type) {
                Some(element) => {
                    if count.saturating_mul(element.size() as u64) != decl.size() as u64 {
                        diags.push(Diagnostic::ArraySizeMismatch {
                            type_name,
                            elements: count,
                            element_size: element.size(),
                            size: decl.size(),
                        });
                        return None;
                    }
                }
                None => diags.push(Diagnostic::UnresolvedType {
                    type_name: element_type,
                    context: type_name.clone(),
                }),
            }
        }

        if decl.size() as u64 % count != 0 {
            diags.push(Diagnostic::NonDivisibleArray {
                type_name,
                size: decl.size(),
                count,
            });
            return None;
        }
        let element_size = (decl.size() as u64 / count) as u32;
        let base = if inline { 0 } else { decl.offs() };
        if base != 0 {
            warn!("array '{}' declares non-zero offset {}", type_name, base);
        }
        let end = base as u64 + count * element_size as u64;
        let expected = base as u64 + decl.size() as u64;
        if end != expected || expected > u32::MAX as u64 {
            diags.push(Diagnostic::ArrayLayoutMismatch {
                type_name,
                end,
                expected,
            });
            return None;
        }
        Some(ArrayPlan {
            dims,
            count,
            element_size,
            base,
        })
    }

    fn plan<'c>(&self, id: NodeId, catalog: &'c DatatypeCatalog, diags: &mut Vec<Diagnostic>) -> Option<Plan<'c>> {
        let node = self.node(id);
        let declaration = self.declaration(node, catalog, diags)?;
        let mut fields = Vec::with_capacity(declaration.sub_item_count());
        for (index, item) in declaration.sub_items().enumerate() {
            match item {
                Ok(field) => fields.push(field),
                Err(err) => {
                    diags.push(Diagnostic::CorruptSubItem {
                        type_name: declaration.name(catalog.codec()),
                        index,
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }
        let inline = node.record == Some(declaration.span());
        let array = Self::array_plan(&declaration, inline, catalog, diags);
        Some(Plan {
            declaration,
            fields,
            array,
        })
    }

    /// Number of children without allocating them.
    pub fn child_count(&self, id: NodeId, catalog: &DatatypeCatalog) -> usize {
        if let Some(children) = &self.node(id).children {
            return children.len();
        }
        let mut diags = Vec::new();
        let count = self.plan(id, catalog, &mut diags).map_or(0, |plan| plan.child_count());
        for diag in diags {
            debug!("{}", diag);
        }
        count
    }

    /// Children in order: struct members, then array elements. Computed once.
    pub fn children(&mut self, id: NodeId, catalog: &DatatypeCatalog) -> &[NodeId] {
        if self.node(id).children.is_none() {
            let mut diags = Vec::new();
            let built = self
                .plan(id, catalog, &mut diags)
                .map(|plan| Self::build_children(id, &plan, catalog.codec()))
                .unwrap_or_default();
            for diag in diags {
                self.report(diag);
            }
            let ids: Vec<NodeId> = built.into_iter().map(|node| self.push(node)).collect();
            self.nodes[id.0].children = Some(ids);
        }
        self.nodes[id.0].children.as_deref().unwrap_or(&[])
    }

    fn build_children(parent: NodeId, plan: &Plan<'_>, codec: &dyn TextCodec) -> Vec<TypeNode> {
        let mut out = Vec::with_capacity(plan.child_count());
        for field in &plan.fields {
            out.push(TypeNode {
                name: field.name(codec),
                kind: NodeKind::Field,
                local_offset: field.offs(),
                record: Some(field.span()),
                type_name: field.type_name(codec),
                comment: field.comment(codec),
                size: field.size(),
                data_type: field.data_type(),
                group: 0,
                symbol: None,
                parent: Some(parent),
                children: None,
            });
        }
        if let Some(array) = &plan.array {
            let decl = &plan.declaration;
            let element_type = decl.type_name(codec);
            let mut offset = array.base;
            for label in ArrayIndices::new(&array.dims) {
                out.push(TypeNode {
                    name: label,
                    kind: NodeKind::Element,
                    local_offset: offset,
                    record: Some(decl.span()),
                    type_name: element_type.clone(),
                    comment: String::new(),
                    size: array.element_size,
                    data_type: decl.data_type(),
                    group: 0,
                    symbol: None,
                    parent: Some(parent),
                    children: None,
                });
                offset = offset.wrapping_add(array.element_size);
            }
        }
        out
    }

    /// Topmost ancestor (a symbol or type root).
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            current = parent;
        }
        current
    }

    /// Sum of local offsets up to and including the root. A symbol root
    /// contributes its base offset, a type root zero.
    pub fn absolute_offset(&self, id: NodeId) -> u32 {
        let mut offset = 0u32;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            offset = offset.wrapping_add(node.local_offset);
            current = node.parent;
        }
        offset
    }

    /// Index group of the owning symbol; zero for type roots.
    pub fn group(&self, id: NodeId) -> u32 {
        self.node(self.root_of(id)).group
    }

    /// Dotted path below the root. Array labels attach without a dot and the
    /// root's own name is left out.
    pub fn full_path(&self, id: NodeId) -> String {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            chain.push(current);
            current = parent;
        }
        let mut path = String::new();
        for node_id in chain.into_iter().rev() {
            let node = self.node(node_id);
            if !path.is_empty() && node.kind != NodeKind::Element {
                path.push('.');
            }
            path.push_str(&node.name);
        }
        path
    }

    /// Root name joined with [`full_path`](Self::full_path), e.g. `MAIN.stAxis.aPos[2]`.
    pub fn qualified_name(&self, id: NodeId) -> String {
        let root = self.node(self.root_of(id));
        let path = self.full_path(id);
        if path.is_empty() {
            root.name.clone()
        } else if path.starts_with('[') {
            format!("{}{}", root.name, path)
        } else {
            format!("{}.{}", root.name, path)
        }
    }
}
