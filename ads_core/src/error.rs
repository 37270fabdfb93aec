//! 结构化错误：记录遍历、值解码与类型解析诊断。

use serde::Serialize;
use thiserror::Error;

/// Structural failure while walking an upload buffer or one record inside it.
/// Offsets are absolute positions within the upload buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record at {offset} needs {needed} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("record at {offset} declares zero length")]
    EmptyRecord { offset: usize },

    #[error("record at {offset} is shorter than its header: need {needed} got {available}")]
    HeaderTooShort {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("record at {offset} declares fields up to byte {needed} but is only {record_len} long")]
    FieldOverrun {
        offset: usize,
        needed: usize,
        record_len: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("span too short for {type_name}: expected {expected} got {got}")]
    SpanTooShort {
        type_name: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Non-fatal condition found while expanding a node. The affected node
/// degrades (fewer or no children); nothing else is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    #[error("unresolved type '{type_name}' in '{context}'")]
    UnresolvedType { type_name: String, context: String },

    #[error("array '{type_name}': {elements} elements x {element_size} bytes != declared size {size}")]
    ArraySizeMismatch {
        type_name: String,
        elements: u64,
        element_size: u32,
        size: u32,
    },

    #[error("size {size} of '{type_name}' is not divisible by {count} array indices")]
    NonDivisibleArray {
        type_name: String,
        size: u32,
        count: u64,
    },

    #[error("array '{type_name}' ends at {end}, expected {expected}")]
    ArrayLayoutMismatch {
        type_name: String,
        end: u64,
        expected: u64,
    },

    #[error("sub item {index} of '{type_name}' is corrupt: {reason}")]
    CorruptSubItem {
        type_name: String,
        index: usize,
        reason: String,
    },

    #[error("alias chain starting at '{type_name}' exceeds depth {depth}")]
    AliasDepthExceeded { type_name: String, depth: usize },
}
