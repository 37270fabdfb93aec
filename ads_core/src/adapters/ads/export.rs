//! JSON 导出：把记录视图转成可序列化文档，保持上传顺序。

use super::datatypes::DatatypeCatalog;
use super::protocol::{datatype_flags_label, symbol_flags_label, AdsDatatypeId};
use super::record::{DatatypeView, SymbolView};
use super::symbols::SymbolCatalog;
use crate::domain::model::{ArrayBound, DatatypeDocument, SymbolDocument};
use crate::ports::TextCodec;

pub fn datatype_document(view: &DatatypeView<'_>, codec: &dyn TextCodec) -> DatatypeDocument {
    let header = view.header();
    DatatypeDocument {
        name: view.name(codec),
        type_name: view.type_name(codec),
        comment: view.comment(codec),
        hash_value: header.hash_value,
        type_hash_value: header.type_hash_value,
        size: view.size(),
        offs: view.offs(),
        data_type: view.data_type(),
        data_type_name: AdsDatatypeId::from_raw(view.data_type()).label().to_string(),
        flags: view.flags(),
        flags_hex: format!("{:x}", view.flags()),
        flags_string: datatype_flags_label(view.flags()),
        array_info: view
            .array_info()
            .map(|dim| ArrayBound {
                lower_bound: dim.lower_bound,
                elements: dim.elements,
            })
            .collect(),
        // a corrupt sub-item ends the list; what came before is still exported
        sub_items: view
            .sub_items()
            .map_while(Result::ok)
            .map(|item| datatype_document(&item, codec))
            .collect(),
    }
}

pub fn symbol_document(view: &SymbolView<'_>, codec: &dyn TextCodec) -> SymbolDocument {
    SymbolDocument {
        name: view.name(codec),
        type_name: view.type_name(codec),
        comment: view.comment(codec),
        group: view.group(),
        offset: view.offset(),
        size: view.size(),
        data_type: view.data_type(),
        data_type_name: AdsDatatypeId::from_raw(view.data_type()).label().to_string(),
        flags: view.flags(),
        flags_hex: format!("{:x}", view.flags()),
        flags_string: symbol_flags_label(view.flags()),
    }
}

/// Every catalog datatype, in upload order.
pub fn export_datatypes(catalog: &DatatypeCatalog) -> Vec<DatatypeDocument> {
    catalog
        .entries()
        .map(|(_, view)| datatype_document(&view, catalog.codec()))
        .collect()
}

/// Every symbol, in upload order.
pub fn export_symbols(catalog: &SymbolCatalog) -> Vec<SymbolDocument> {
    catalog
        .entries()
        .map(|(_, view)| symbol_document(&view, catalog.codec()))
        .collect()
}
