use std::fmt;

use serde::Serialize;

/// 树节点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// Root opened on a catalog datatype.
    Type,
    /// Root standing for one uploaded symbol.
    Symbol,
    /// Struct member.
    Field,
    /// Synthesized array element.
    Element,
}

/// 节点描述（供 UI / 导出使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub name: String,
    pub kind: NodeKind,
    #[serde(rename = "type")]
    pub type_name: String,
    pub comment: String,
    /// 符号名 + 路径，例如 `MAIN.stAxis.aPos[2]`
    pub qualified_name: String,
    pub group: u32,
    /// Absolute byte offset inside the index group.
    pub offset: u32,
    pub size: u32,
    pub data_type: u32,
    pub data_type_name: String,
    pub child_count: usize,
}

/// Decoded value of one primitive span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum ScalarValue {
    Void,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Real32(f32),
    Real64(f64),
    /// 80 位扩展精度，转换为 f64（可能丢精度）
    Real80(f64),
    String(String),
    WString(String),
    /// 聚合或未知类型：原始字节的十六进制
    Raw { type_id: u32, hex: String },
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Void => write!(f, "<void>"),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int8(v) => write!(f, "{}", v),
            ScalarValue::UInt8(v) => write!(f, "{}", v),
            ScalarValue::Int16(v) => write!(f, "{}", v),
            ScalarValue::UInt16(v) => write!(f, "{}", v),
            ScalarValue::Int32(v) => write!(f, "{}", v),
            ScalarValue::UInt32(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::UInt64(v) => write!(f, "{}", v),
            ScalarValue::Real32(v) => write!(f, "{}", v),
            ScalarValue::Real64(v) | ScalarValue::Real80(v) => write!(f, "{}", v),
            ScalarValue::String(v) | ScalarValue::WString(v) => write!(f, "{}", v),
            ScalarValue::Raw { hex, .. } => write!(f, "hex dump: {}", hex),
        }
    }
}

/// One array dimension as exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArrayBound {
    #[serde(rename = "lBound")]
    pub lower_bound: i32,
    pub elements: u32,
}

/// Datatype record as a JSON document. Sub-items nest recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatatypeDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub comment: String,
    pub hash_value: u32,
    pub type_hash_value: u32,
    pub size: u32,
    pub offs: u32,
    pub data_type: u32,
    pub data_type_name: String,
    pub flags: u32,
    pub flags_hex: String,
    pub flags_string: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub array_info: Vec<ArrayBound>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_items: Vec<DatatypeDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub comment: String,
    #[serde(rename = "iGroup")]
    pub group: u32,
    #[serde(rename = "iOffs")]
    pub offset: u32,
    pub size: u32,
    pub data_type: u32,
    pub data_type_name: String,
    pub flags: u32,
    pub flags_hex: String,
    pub flags_string: String,
}
