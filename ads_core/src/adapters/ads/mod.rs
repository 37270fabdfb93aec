//! ADS 符号上传解码（TwinCAT 符号/数据类型上传格式）
//!
//! Layers, bottom-up: `record` walks and views raw records, `datatypes` and
//! `symbols` index them by name, `resolver` expands types into offset-bearing
//! nodes and `tree` hangs one root per symbol on top. `value` decodes the
//! bytes read for a leaf.

pub mod datatypes;
pub mod export;
pub mod protocol;
pub mod record;
pub mod resolver;
pub mod serializer;
pub mod symbols;
pub mod tree;
pub mod value;

pub use datatypes::DatatypeCatalog;
pub use protocol::{AdsDatatypeId, ArrayInfo, UploadInfo};
pub use record::{DatatypeView, RawRecord, RecordCursor, RecordSpan, SymbolView};
pub use resolver::{NodeId, TypeNode, TypeTree};
pub use serializer::{DatatypeRecordBuilder, SymbolRecordBuilder};
pub use symbols::SymbolCatalog;
pub use tree::SymbolTree;
pub use value::decode_value;
